use crate::api::{ApiClient, ApiError, Cache, Entry, Query};
use crate::api::types::Pagination;
use crate::query::Subscription;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// One line of feedback shown in the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
  pub text: String,
  pub is_error: bool,
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Swap the current view for another one (e.g. after a rename)
  Replace(Box<dyn View>),
}

/// What a view gets to work with while handling input or ticking.
///
/// Borrowed from the `App` for the duration of one call. The cache is the
/// session's single `QueryClient`; views never own one.
pub struct ViewContext<'a> {
  pub cache: &'a mut Cache,
  pub api: &'a ApiClient,
  pub page_size: u32,
  redraw: &'a Arc<AtomicBool>,
  status: &'a mut Option<StatusMessage>,
}

impl<'a> ViewContext<'a> {
  pub fn new(
    cache: &'a mut Cache,
    api: &'a ApiClient,
    page_size: u32,
    redraw: &'a Arc<AtomicBool>,
    status: &'a mut Option<StatusMessage>,
  ) -> Self {
    Self {
      cache,
      api,
      page_size,
      redraw,
      status,
    }
  }

  /// Subscribe to a query; every change to its entry schedules a redraw.
  pub fn watch(&mut self, query: Query) -> Subscription {
    let redraw = Arc::clone(self.redraw);
    self.cache.subscribe(query.key, query.loader, move |_, _| {
      redraw.store(true, Ordering::Relaxed);
    })
  }

  pub fn pagination(&self) -> Pagination {
    Pagination::first(self.page_size)
  }

  pub fn request_redraw(&self) {
    self.redraw.store(true, Ordering::Relaxed);
  }

  /// Show an informational message in the footer.
  pub fn report(&mut self, text: impl Into<String>) {
    *self.status = Some(StatusMessage {
      text: text.into(),
      is_error: false,
    });
    self.request_redraw();
  }

  /// Show a failed action in the footer.
  pub fn report_error(&mut self, action: &str, error: &ApiError) {
    *self.status = Some(StatusMessage {
      text: format!("{} failed: {}", action, error),
      is_error: true,
    });
    self.request_redraw();
  }
}

/// Look up the entry a subscription points at.
pub fn entry<'c>(cache: &'c Cache, subscription: &Subscription) -> Option<&'c Entry> {
  cache.get(subscription.key())
}

/// Trait for view behavior
///
/// Views subscribe to the cache through the `ViewContext`, render whatever
/// the cache holds, and return actions for the App to execute. Views that
/// run writes keep a `Mutation` and poll it in `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect, cache: &Cache);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to poll pending writes
  fn tick(&mut self, _ctx: &mut ViewContext) -> ViewAction {
    ViewAction::None
  }

  /// Whether a dialog owns the keyboard, so global keys must pass through
  fn captures_input(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(80),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
