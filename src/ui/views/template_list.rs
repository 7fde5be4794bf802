use crate::api::types::{Page, Pagination, Template};
use crate::api::{Cache, Entry, Query, Resource};
use crate::query::Subscription;
use crate::ui::view::{entry, ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::{ensure_valid_selection, entry_title};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Read-only list of VM templates
pub struct TemplateListView {
  pagination: Pagination,
  subscription: Subscription,
  list_state: ListState,
}

fn page<'c>(cache: &'c Cache, subscription: &Subscription) -> Option<&'c Page<Template>> {
  entry(cache, subscription)
    .and_then(Entry::retained_data)
    .and_then(Resource::as_templates)
}

impl TemplateListView {
  pub fn new(ctx: &mut ViewContext) -> Self {
    let pagination = ctx.pagination();
    let subscription = ctx.watch(Query::template_list(ctx.api, pagination));
    Self {
      pagination,
      subscription,
      list_state: ListState::default(),
    }
  }

  fn go_to(&mut self, pagination: Pagination, ctx: &mut ViewContext) {
    self.pagination = pagination;
    self.subscription = ctx.watch(Query::template_list(ctx.api, pagination));
    self.list_state.select(Some(0));
  }
}

impl View for TemplateListView {
  fn handle_key(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('n') | KeyCode::PageDown => {
        if page(ctx.cache, &self.subscription).is_some_and(|p| p.has_more(self.pagination)) {
          self.go_to(self.pagination.next(), ctx);
        }
      }
      KeyCode::Char('p') | KeyCode::PageUp => {
        if self.pagination.offset > 0 {
          self.go_to(self.pagination.previous(), ctx);
        }
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
    let entry = entry(cache, &self.subscription);
    let page = page(cache, &self.subscription);
    ensure_valid_selection(&mut self.list_state, page.map_or(0, |p| p.items.len()));

    let summary = page.map(|p| format!("{} total, page {}", p.total, self.pagination.page_number()));
    let block = Block::default()
      .title(entry_title("Templates", summary, entry))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(page) = page.filter(|p| !p.items.is_empty()) else {
      let content = match entry {
        Some(e) if e.is_errored() => "Failed to load templates. Press 'r' to retry.",
        Some(e) if e.retained_data().is_some() => "No templates found.",
        _ => "",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let items: Vec<ListItem> = page
      .items
      .iter()
      .map(|template| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<36}", template.name), Style::default().fg(Color::Cyan)),
          Span::raw(" "),
          Span::styled(format!("{:<16}", template.os_type), Style::default().fg(Color::Yellow)),
          Span::styled(template.id.clone(), Style::default().fg(Color::DarkGray)),
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

  fn breadcrumb_label(&self) -> String {
    "Templates".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("n/p", "page").with_priority(50),
      ShortcutInfo::new("r", "refresh").with_priority(80),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
