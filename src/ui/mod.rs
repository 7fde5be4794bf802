pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::api::{ApiError, Entry};
use crate::form::{FieldErrors, FormState};
use crate::query::Status;
use ratatui::widgets::{ListState, TableState};
use view::ViewContext;

/// Clamp a list selection to the current number of rows
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  state.select(clamp_selection(state.selected(), len));
}

pub fn ensure_valid_table_selection(state: &mut TableState, len: usize) {
  state.select(clamp_selection(state.selected(), len));
}

fn clamp_selection(selected: Option<usize>, len: usize) -> Option<usize> {
  if len == 0 {
    None
  } else {
    Some(selected.unwrap_or(0).min(len - 1))
  }
}

/// Block title for a cached resource: `" Networks (12, refreshing...) "`.
///
/// `summary` describes the data; the fetch state of the entry is appended.
pub fn entry_title(label: &str, summary: Option<String>, entry: Option<&Entry>) -> String {
  let activity = match entry {
    None => Some("loading...".to_string()),
    Some(entry) => match entry.status() {
      Status::Loading if entry.retained_data().is_some() => Some("refreshing...".to_string()),
      Status::Idle | Status::Loading => Some("loading...".to_string()),
      Status::Stale => Some("stale".to_string()),
      Status::Errored => entry.error().map(|e| format!("error: {}", e)),
      Status::Fresh => None,
    },
  };

  let parts: Vec<String> = summary.into_iter().chain(activity).collect();
  if parts.is_empty() {
    format!(" {} ", label)
  } else {
    format!(" {} ({}) ", label, parts.join(", "))
  }
}

/// Route the outcome of a form's write.
///
/// Success closes the form and reports `done`. A rejection carrying field
/// messages goes back into the form; any other failure reopens the form for
/// editing and lands in the status line. Returns whether the write succeeded.
pub fn settle_form<T: Clone>(
  form: &mut Option<FormState<T>>,
  result: Result<(), ApiError>,
  ctx: &mut ViewContext,
  action: &str,
  done: &str,
) -> bool {
  match result {
    Ok(()) => {
      *form = None;
      ctx.report(done);
      true
    }
    Err(error) => {
      match (form.as_mut(), error.field_errors()) {
        (Some(form), Some(fields)) => form.set_errors(FieldErrors::from(fields)),
        (Some(form), None) => {
          form.finish_submit();
          ctx.report_error(action, &error);
        }
        (None, _) => ctx.report_error(action, &error),
      }
      ctx.request_redraw();
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{Cache, Query, Resource};
  use crate::query::{loader, QueryConfig, ResourceKey};

  #[test]
  fn test_selection_clamps() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));

    state.select(Some(7));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }

  #[test]
  fn test_title_without_entry_is_loading() {
    assert_eq!(entry_title("VMs", None, None), " VMs (loading...) ");
  }

  #[tokio::test]
  async fn test_title_follows_entry_state() {
    let mut cache = Cache::new(QueryConfig::default());
    let query = Query {
      key: ResourceKey::new("ssh-keys"),
      loader: loader(|| async { Ok::<_, ApiError>(Resource::SshKeys(Vec::new())) }),
    };
    let _sub = cache.subscribe(query.key.clone(), query.loader, |_, _| {});

    let entry = cache.get(&query.key);
    assert_eq!(entry_title("Keys", None, entry), " Keys (loading...) ");

    cache.until_idle().await;
    let entry = cache.get(&query.key);
    assert_eq!(entry_title("Keys", Some("0".to_string()), entry), " Keys (0) ");

    cache.refetch(&query.key);
    let entry = cache.get(&query.key);
    assert_eq!(
      entry_title("Keys", Some("0".to_string()), entry),
      " Keys (0, refreshing...) "
    );
    cache.until_idle().await;
  }

  #[tokio::test]
  async fn test_title_shows_fetch_error() {
    let mut cache = Cache::new(QueryConfig::default());
    let key = ResourceKey::new("vm").with("web-1");
    let _sub = cache.subscribe(
      key.clone(),
      loader(|| async { Err::<Resource, _>(ApiError::NotFound("vm web-1".to_string())) }),
      |_, _| {},
    );
    cache.until_idle().await;

    let title = entry_title("web-1", None, cache.get(&key));
    assert!(title.starts_with(" web-1 (error: "), "{}", title);
  }
}
