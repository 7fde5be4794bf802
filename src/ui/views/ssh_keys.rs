use crate::api::keys;
use crate::api::types::{SshKey, SshKeyDraft};
use crate::api::{ApiError, Cache, Entry, Query, Resource};
use crate::form::{ssh_key_fields, validate_ssh_key, FormEvent, FormState};
use crate::query::{Mutation, Subscription};
use crate::ui::components::{render_form, KeyResult};
use crate::ui::renderfns::truncate;
use crate::ui::view::{entry, ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::{ensure_valid_selection, entry_title, settle_form};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

/// SSH keys registered with the backend, with key generation
pub struct SshKeysView {
  subscription: Subscription,
  list_state: ListState,
  form: Option<FormState<SshKeyDraft>>,
  mutation: Mutation<(), ApiError>,
}

fn ssh_keys<'c>(cache: &'c Cache, subscription: &Subscription) -> &'c [SshKey] {
  entry(cache, subscription)
    .and_then(Entry::retained_data)
    .and_then(Resource::as_ssh_keys)
    .unwrap_or(&[])
}

impl SshKeysView {
  pub fn new(ctx: &mut ViewContext) -> Self {
    let subscription = ctx.watch(Query::ssh_keys(ctx.api));
    Self {
      subscription,
      list_state: ListState::default(),
      form: None,
      mutation: Mutation::new(),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    let entry = entry(cache, &self.subscription);
    let keys = ssh_keys(cache, &self.subscription);
    ensure_valid_selection(&mut self.list_state, keys.len());

    let mut title = entry_title("SSH keys", Some(keys.len().to_string()), entry);
    if self.mutation.is_pending() {
      title.push_str("[generating...] ");
    }

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if keys.is_empty() {
      let content = match entry {
        Some(e) if e.is_errored() => "Failed to load SSH keys. Press 'r' to retry.",
        Some(e) if e.retained_data().is_some() => "No SSH keys. Press 'g' to generate one.",
        _ => "",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = keys
      .iter()
      .map(|key| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<28}", truncate(&key.name, 28)), Style::default().fg(Color::Cyan)),
          Span::raw(" "),
          Span::styled(format!("{:<10}", key.key_type), Style::default().fg(Color::Yellow)),
          Span::styled(truncate(&key.public_key, 48), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  /// Full public key of the selected entry, wrapped
  fn render_public_key(&self, frame: &mut Frame, area: Rect, cache: &Cache) {
    let selected = self
      .list_state
      .selected()
      .and_then(|i| ssh_keys(cache, &self.subscription).get(i));

    let block = Block::default()
      .title(" Public key ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));
    let text = selected.map_or_else(String::new, |key| key.public_key.clone());
    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
  }
}

impl View for SshKeysView {
  fn handle_key(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> ViewAction {
    if let Some(form) = self.form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submit(draft)) => {
          let api = ctx.api.clone();
          let started = self.mutation.start(
            ctx.cache,
            async move { api.generate_ssh_key(&draft).await },
            keys::after_ssh_key_generated(),
          );
          if !started {
            form.finish_submit();
            ctx.report("Another key is still being generated");
          }
        }
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('g') => {
        self.form = Some(FormState::new(
          "Generate SSH key",
          SshKeyDraft::default(),
          ssh_key_fields(),
          validate_ssh_key,
        ));
      }
      KeyCode::Char('r') => {
        ctx.cache.retry(self.subscription.key());
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(3), Constraint::Length(6)])
      .split(area);

    self.render_list(frame, chunks[0], cache);
    self.render_public_key(frame, chunks[1], cache);

    if let Some(form) = &self.form {
      render_form(frame, area, form);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "SSH keys".to_string()
  }

  fn tick(&mut self, ctx: &mut ViewContext) -> ViewAction {
    if let Some(result) = self.mutation.poll(ctx.cache) {
      settle_form(&mut self.form, result, ctx, "Generate SSH key", "SSH key generated");
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.form.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("g", "generate").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(80),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
