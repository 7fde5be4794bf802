use crate::api::keys;
use crate::api::types::{Network, NetworkDraft, Page, Pagination};
use crate::api::{ApiError, Cache, Entry, Query, Resource};
use crate::form::{network_fields, validate_network, FormEvent, FormState};
use crate::query::{Mutation, Subscription};
use crate::ui::components::{render_form, ConfirmDialog, ConfirmEvent, KeyResult};
use crate::ui::renderfns::truncate;
use crate::ui::view::{entry, ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::NetworkDetailView;
use crate::ui::{ensure_valid_selection, entry_title, settle_form};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

enum PendingWrite {
  Create,
  Delete(String),
}

/// Paged list of IPAM networks
pub struct NetworkListView {
  pagination: Pagination,
  subscription: Subscription,
  list_state: ListState,
  form: Option<FormState<NetworkDraft>>,
  confirm: ConfirmDialog<String>,
  mutation: Mutation<(), ApiError>,
  pending: Option<PendingWrite>,
}

fn page<'c>(cache: &'c Cache, subscription: &Subscription) -> Option<&'c Page<Network>> {
  entry(cache, subscription)
    .and_then(Entry::retained_data)
    .and_then(Resource::as_networks)
}

impl NetworkListView {
  pub fn new(ctx: &mut ViewContext) -> Self {
    let pagination = ctx.pagination();
    let subscription = ctx.watch(Query::network_list(ctx.api, pagination));

    Self {
      pagination,
      subscription,
      list_state: ListState::default(),
      form: None,
      confirm: ConfirmDialog::new(),
      mutation: Mutation::new(),
      pending: None,
    }
  }

  fn selected_code(&self, cache: &Cache) -> Option<String> {
    let index = self.list_state.selected()?;
    page(cache, &self.subscription)?
      .items
      .get(index)
      .map(|network| network.code().to_string())
  }

  fn go_to(&mut self, pagination: Pagination, ctx: &mut ViewContext) {
    self.pagination = pagination;
    // Replacing the handle releases the previous page
    self.subscription = ctx.watch(Query::network_list(ctx.api, pagination));
    self.list_state.select(Some(0));
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    let entry = entry(cache, &self.subscription);
    let page = page(cache, &self.subscription);
    let len = page.map_or(0, |p| p.items.len());
    ensure_valid_selection(&mut self.list_state, len);

    let summary = page.map(|p| {
      format!(
        "{} total, page {}",
        p.total,
        self.pagination.page_number()
      )
    });
    let mut title = entry_title("Networks", summary, entry);
    if self.mutation.is_pending() {
      title.push_str("[saving...] ");
    }

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(page) = page.filter(|p| !p.items.is_empty()) else {
      let content = match entry {
        Some(e) if e.is_errored() => "Failed to load networks. Press 'r' to retry.",
        Some(e) if e.retained_data().is_some() => "No networks. Press 'c' to create one.",
        _ => "",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let header = ListItem::new(Line::from(Span::styled(
      format!(
        "  {:<24} {:<20} {:<16} {:<6} {}",
        "NAME", "NETWORK", "GATEWAY", "VLAN", "DHCP"
      ),
      Style::default().fg(Color::DarkGray),
    )));

    let items: Vec<ListItem> = std::iter::once(header)
      .chain(page.items.iter().map(|network| {
        let vlan = network.vlan_id.map(|v| v.to_string()).unwrap_or_default();
        let dhcp = if network.dhcp_enabled { "on" } else { "off" };
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<24}", truncate(&network.name, 24)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<20}", network.cidr())),
          Span::raw(" "),
          Span::raw(format!("{:<16}", network.gateway)),
          Span::raw(" "),
          Span::styled(format!("{:<6}", vlan), Style::default().fg(Color::Yellow)),
          Span::raw(" "),
          Span::raw(dhcp),
        ]))
      }))
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    // Row 0 is the column header
    let mut state = ListState::default().with_selected(self.list_state.selected().map(|i| i + 1));
    frame.render_stateful_widget(list, area, &mut state);
  }

  // Key handling helpers for or_else chain pattern
  fn handle_overlays(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> Option<ViewAction> {
    if let Some(form) = self.form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submit(draft)) => {
          let api = ctx.api.clone();
          let started = self.mutation.start(
            ctx.cache,
            async move { api.create_network(&draft).await },
            keys::after_network_created(),
          );
          if started {
            self.pending = Some(PendingWrite::Create);
          } else {
            form.finish_submit();
            ctx.report("Another change is still being saved");
          }
        }
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return Some(ViewAction::None);
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(code)) => {
        let api = ctx.api.clone();
        let target = code.clone();
        let started = self.mutation.start(
          ctx.cache,
          async move { api.delete_network(&target).await },
          keys::after_network_deleted(&code),
        );
        if started {
          self.pending = Some(PendingWrite::Delete(code));
        } else {
          ctx.report("Another change is still being saved");
        }
        Some(ViewAction::None)
      }
      KeyResult::Event(ConfirmEvent::Cancelled) | KeyResult::Handled => Some(ViewAction::None),
      KeyResult::NotHandled => None,
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
        Some(ViewAction::None)
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
        Some(ViewAction::None)
      }
      KeyCode::Char('n') | KeyCode::PageDown => {
        let has_more = page(ctx.cache, &self.subscription)
          .is_some_and(|p| p.has_more(self.pagination));
        if has_more {
          self.go_to(self.pagination.next(), ctx);
        }
        Some(ViewAction::None)
      }
      KeyCode::Char('p') | KeyCode::PageUp => {
        if self.pagination.offset > 0 {
          self.go_to(self.pagination.previous(), ctx);
        }
        Some(ViewAction::None)
      }
      _ => None,
    }
  }

  fn handle_actions(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        ctx.cache.retry(self.subscription.key());
        Some(ViewAction::None)
      }
      KeyCode::Char('c') => {
        self.form = Some(FormState::new(
          "New network",
          NetworkDraft::default(),
          network_fields(),
          validate_network,
        ));
        Some(ViewAction::None)
      }
      KeyCode::Char('d') => {
        if let Some(code) = self.selected_code(ctx.cache) {
          self
            .confirm
            .show(format!("Delete network {}?", code), code);
        }
        Some(ViewAction::None)
      }
      KeyCode::Enter => {
        let code = self.selected_code(ctx.cache)?;
        Some(ViewAction::Push(Box::new(NetworkDetailView::new(ctx, &code))))
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for NetworkListView {
  fn handle_key(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> ViewAction {
    self
      .handle_overlays(key, ctx)
      .or_else(|| self.handle_navigation(key, ctx))
      .or_else(|| self.handle_actions(key, ctx))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    self.render_list(frame, area, cache);
    if let Some(form) = &self.form {
      render_form(frame, area, form);
    }
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Networks".to_string()
  }

  fn tick(&mut self, ctx: &mut ViewContext) -> ViewAction {
    let Some(result) = self.mutation.poll(ctx.cache) else {
      return ViewAction::None;
    };

    match self.pending.take() {
      Some(PendingWrite::Create) => {
        settle_form(&mut self.form, result, ctx, "Create network", "Network created");
      }
      Some(PendingWrite::Delete(code)) => match result {
        Ok(()) => {
          ctx.report(format!("Network {} deleted", code));
          // Step back if the last row of a later page went away
          let emptied = page(ctx.cache, &self.subscription)
            .is_some_and(|p| p.items.len() == 1 && self.pagination.offset > 0);
          if emptied {
            self.go_to(self.pagination.previous(), ctx);
          }
        }
        Err(error) => ctx.report_error("Delete network", &error),
      },
      None => {}
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.form.is_some() || self.confirm.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("enter", "open").with_priority(20),
      ShortcutInfo::new("c", "create").with_priority(30),
      ShortcutInfo::new("d", "delete").with_priority(40),
      ShortcutInfo::new("n/p", "page").with_priority(50),
      ShortcutInfo::new("r", "refresh").with_priority(80),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
