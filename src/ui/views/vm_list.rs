use crate::api::types::{Page, Pagination, VirtualMachine};
use crate::api::{Cache, Entry, Query, Resource};
use crate::query::Subscription;
use crate::ui::renderfns::{power_color, truncate};
use crate::ui::view::{entry, ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::VmDetailView;
use crate::ui::{ensure_valid_selection, entry_title};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Paged list of virtual machines
pub struct VmListView {
  pagination: Pagination,
  subscription: Subscription,
  list_state: ListState,
}

fn page<'c>(cache: &'c Cache, subscription: &Subscription) -> Option<&'c Page<VirtualMachine>> {
  entry(cache, subscription)
    .and_then(Entry::retained_data)
    .and_then(Resource::as_vms)
}

impl VmListView {
  pub fn new(ctx: &mut ViewContext) -> Self {
    let pagination = ctx.pagination();
    let subscription = ctx.watch(Query::vm_list(ctx.api, pagination));
    Self {
      pagination,
      subscription,
      list_state: ListState::default(),
    }
  }

  fn go_to(&mut self, pagination: Pagination, ctx: &mut ViewContext) {
    self.pagination = pagination;
    self.subscription = ctx.watch(Query::vm_list(ctx.api, pagination));
    self.list_state.select(Some(0));
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    let entry = entry(cache, &self.subscription);
    let page = page(cache, &self.subscription);
    ensure_valid_selection(&mut self.list_state, page.map_or(0, |p| p.items.len()));

    let summary = page.map(|p| format!("{} total, page {}", p.total, self.pagination.page_number()));

    let block = Block::default()
      .title(entry_title("Virtual machines", summary, entry))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(page) = page.filter(|p| !p.items.is_empty()) else {
      let content = match entry {
        Some(e) if e.is_errored() => "Failed to load virtual machines. Press 'r' to retry.",
        Some(e) if e.retained_data().is_some() => "No virtual machines found.",
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
      .map(|vm| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<28}", truncate(&vm.name, 28)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<8}", vm.power_state.label()),
            Style::default().fg(power_color(vm.power_state)),
          ),
          Span::raw(format!(" {:>3} vCPU {:>7} MB  ", vm.num_cpus, vm.memory_mb)),
          Span::styled(format!("{:<16}", vm.ip_address), Style::default().fg(Color::Yellow)),
          Span::styled(vm.network.clone(), Style::default().fg(Color::DarkGray)),
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
        if page(ctx.cache, &self.subscription).is_some_and(|p| p.has_more(self.pagination)) {
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
      KeyCode::Enter => {
        let index = self.list_state.selected()?;
        let name = page(ctx.cache, &self.subscription)?.items.get(index)?.name.clone();
        Some(ViewAction::Push(Box::new(VmDetailView::new(ctx, &name))))
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for VmListView {
  fn handle_key(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> ViewAction {
    self
      .handle_navigation(key, ctx)
      .or_else(|| self.handle_actions(key, ctx))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    self.render_list(frame, area, cache);
  }

  fn breadcrumb_label(&self) -> String {
    "VMs".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("enter", "open").with_priority(20),
      ShortcutInfo::new("n/p", "page").with_priority(50),
      ShortcutInfo::new("r", "refresh").with_priority(80),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
