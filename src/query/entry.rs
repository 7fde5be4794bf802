//! Cache entries and their status.

use chrono::{DateTime, Utc};

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  /// Entry exists but no fetch has started
  Idle,
  /// A loader is in flight
  Loading,
  /// Data arrived and has not been invalidated since
  Fresh,
  /// Data was invalidated; still servable while a refresh is pending
  Stale,
  /// The last loader failed
  Errored,
}

impl Status {
  pub fn label(&self) -> &'static str {
    match self {
      Status::Idle => "idle",
      Status::Loading => "loading",
      Status::Fresh => "fresh",
      Status::Stale => "stale",
      Status::Errored => "error",
    }
  }
}

/// Cached state for one resource key.
///
/// The entry keeps its last good data through `Loading` and `Errored` so a
/// view can keep rendering it, but [`CacheEntry::data`] only reports it while
/// the entry is `Fresh` or `Stale`. The same goes for the error, which is only
/// reported while `Errored`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V, E> {
  status: Status,
  data: Option<V>,
  error: Option<E>,
  fetched_at: Option<DateTime<Utc>>,
  /// Set when an invalidation hits the entry mid-fetch
  pub(crate) invalidated_in_flight: bool,
}

impl<V, E> Default for CacheEntry<V, E> {
  fn default() -> Self {
    Self {
      status: Status::Idle,
      data: None,
      error: None,
      fetched_at: None,
      invalidated_in_flight: false,
    }
  }
}

impl<V, E> CacheEntry<V, E> {
  pub fn status(&self) -> Status {
    self.status
  }

  /// Current data, present only when the entry is Fresh or Stale.
  pub fn data(&self) -> Option<&V> {
    match self.status {
      Status::Fresh | Status::Stale => self.data.as_ref(),
      _ => None,
    }
  }

  /// Last good data regardless of status, for rendering during a refresh.
  pub fn retained_data(&self) -> Option<&V> {
    self.data.as_ref()
  }

  /// Error of the last fetch, present only when the entry is Errored.
  pub fn error(&self) -> Option<&E> {
    match self.status {
      Status::Errored => self.error.as_ref(),
      _ => None,
    }
  }

  /// Last error, kept while a retry is loading.
  pub fn retained_error(&self) -> Option<&E> {
    self.error.as_ref()
  }

  /// When data was last stored.
  pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
    self.fetched_at
  }

  pub fn is_loading(&self) -> bool {
    self.status == Status::Loading
  }

  pub fn is_errored(&self) -> bool {
    self.status == Status::Errored
  }

  /// Check if fresh data is older than `stale_time`.
  pub fn is_expired(&self, stale_time: chrono::Duration) -> bool {
    match (self.status, self.fetched_at) {
      (Status::Fresh, Some(at)) => Utc::now() - at > stale_time,
      _ => false,
    }
  }

  pub(crate) fn begin_loading(&mut self) {
    self.status = Status::Loading;
  }

  pub(crate) fn store(&mut self, data: V, status: Status) {
    self.data = Some(data);
    self.error = None;
    self.status = status;
    self.fetched_at = Some(Utc::now());
  }

  pub(crate) fn fail(&mut self, error: E) {
    self.error = Some(error);
    self.status = Status::Errored;
  }

  pub(crate) fn mark_stale(&mut self) {
    self.status = Status::Stale;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_entry_is_idle_and_empty() {
    let entry: CacheEntry<u32, String> = CacheEntry::default();
    assert_eq!(entry.status(), Status::Idle);
    assert!(entry.data().is_none());
    assert!(entry.error().is_none());
    assert!(entry.fetched_at().is_none());
  }

  #[test]
  fn test_data_hidden_while_loading_but_retained() {
    let mut entry: CacheEntry<u32, String> = CacheEntry::default();
    entry.store(7, Status::Fresh);
    entry.mark_stale();
    assert_eq!(entry.data(), Some(&7));

    entry.begin_loading();
    assert!(entry.data().is_none());
    assert_eq!(entry.retained_data(), Some(&7));
  }

  #[test]
  fn test_failure_keeps_data_and_sets_error() {
    let mut entry: CacheEntry<u32, String> = CacheEntry::default();
    entry.store(7, Status::Fresh);
    entry.begin_loading();
    entry.fail("boom".to_string());

    assert_eq!(entry.status(), Status::Errored);
    assert_eq!(entry.error().map(String::as_str), Some("boom"));
    assert!(entry.data().is_none());
    assert_eq!(entry.retained_data(), Some(&7));
  }

  #[test]
  fn test_success_clears_error() {
    let mut entry: CacheEntry<u32, String> = CacheEntry::default();
    entry.fail("boom".to_string());
    entry.begin_loading();
    assert!(entry.error().is_none());
    assert!(entry.retained_error().is_some());

    entry.store(1, Status::Fresh);
    assert!(entry.retained_error().is_none());
  }

  #[test]
  fn test_expiry_only_applies_to_fresh() {
    let mut entry: CacheEntry<u32, String> = CacheEntry::default();
    entry.store(1, Status::Fresh);
    assert!(entry.is_expired(chrono::Duration::milliseconds(-1)));
    assert!(!entry.is_expired(chrono::Duration::minutes(5)));

    entry.mark_stale();
    assert!(!entry.is_expired(chrono::Duration::milliseconds(-1)));
  }
}
