use crate::api::keys;
use crate::api::types::{IpAddress, IpAddressDraft, Network, NetworkDraft};
use crate::api::{ApiError, Cache, Entry, Query, Resource};
use crate::form::{
  ip_address_fields, network_fields, validate_ip_address, validate_network, FormEvent, FormState,
};
use crate::query::{Mutation, Status, Subscription};
use crate::ui::components::{render_form, ConfirmDialog, ConfirmEvent, KeyResult};
use crate::ui::renderfns::{truncate, usage_color};
use crate::ui::view::{entry, ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::{ensure_valid_table_selection, entry_title, settle_form};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, TableState};

#[derive(Debug, Clone)]
enum DeleteTarget {
  Ip(String),
  Network,
}

enum PendingWrite {
  CreateIp,
  DeleteIp(String),
  Update { new_code: String },
  DeleteNetwork,
}

/// One network: its settings, address usage and assigned IPs
pub struct NetworkDetailView {
  code: String,
  network_sub: Subscription,
  ips_sub: Subscription,
  /// Held only while the add-address dialog is open
  free_ip_sub: Option<Subscription>,
  table_state: TableState,
  network_form: Option<FormState<NetworkDraft>>,
  ip_form: Option<FormState<IpAddressDraft>>,
  /// Set once the add-address dialog has taken the suggested address (or given up on it)
  ip_form_prefilled: bool,
  confirm: ConfirmDialog<DeleteTarget>,
  mutation: Mutation<(), ApiError>,
  pending: Option<PendingWrite>,
}

fn network<'c>(cache: &'c Cache, subscription: &Subscription) -> Option<&'c Network> {
  entry(cache, subscription)
    .and_then(Entry::retained_data)
    .and_then(Resource::as_network)
}

fn addresses<'c>(cache: &'c Cache, subscription: &Subscription) -> &'c [IpAddress] {
  entry(cache, subscription)
    .and_then(Entry::retained_data)
    .and_then(Resource::as_ip_addresses)
    .unwrap_or(&[])
}

impl NetworkDetailView {
  pub fn new(ctx: &mut ViewContext, code: &str) -> Self {
    let network_sub = ctx.watch(Query::network(ctx.api, code));
    let ips_sub = ctx.watch(Query::ip_addresses(ctx.api, code));

    Self {
      code: code.to_string(),
      network_sub,
      ips_sub,
      free_ip_sub: None,
      table_state: TableState::default(),
      network_form: None,
      ip_form: None,
      ip_form_prefilled: false,
      confirm: ConfirmDialog::new(),
      mutation: Mutation::new(),
      pending: None,
    }
  }

  fn selected_address(&self, cache: &Cache) -> Option<String> {
    let index = self.table_state.selected()?;
    addresses(cache, &self.ips_sub)
      .get(index)
      .map(|ip| ip.address.clone())
  }

  fn open_ip_form(&mut self, ctx: &mut ViewContext) {
    let subscription = ctx.watch(Query::free_ip(ctx.api, &self.code));
    // The suggestion goes out of date whenever anyone assigns an address,
    // so always ask again unless subscribing already started a fetch
    if !ctx.cache.is_fetching(subscription.key()) {
      ctx.cache.retry(subscription.key());
    }
    self.free_ip_sub = Some(subscription);
    self.ip_form_prefilled = false;
    self.ip_form = Some(new_ip_form(IpAddressDraft::default()));
  }

  fn close_ip_form(&mut self) {
    self.ip_form = None;
    self.free_ip_sub = None;
  }

  /// Take the suggested free address once it arrives, unless the user has
  /// started typing already.
  fn prefill_ip_form(&mut self, cache: &Cache) {
    if self.ip_form_prefilled {
      return;
    }
    let (Some(form), Some(subscription)) = (self.ip_form.as_ref(), self.free_ip_sub.as_ref()) else {
      return;
    };
    let Some(entry) = entry(cache, subscription) else {
      return;
    };

    match entry.status() {
      Status::Fresh => {
        let untouched = *form.draft() == IpAddressDraft::default() && form.focused() == 0;
        if let (true, Some(free)) = (untouched, entry.data().and_then(Resource::as_free_ip)) {
          self.ip_form = Some(new_ip_form(IpAddressDraft::from_free_ip(free)));
        }
        self.ip_form_prefilled = true;
      }
      Status::Errored => self.ip_form_prefilled = true,
      _ => {}
    }
  }

  fn start(&mut self, ctx: &mut ViewContext, write: PendingWrite, started: bool) {
    if started {
      self.pending = Some(write);
    } else {
      ctx.report("Another change is still being saved");
      if let Some(form) = self.ip_form.as_mut() {
        form.finish_submit();
      }
      if let Some(form) = self.network_form.as_mut() {
        form.finish_submit();
      }
    }
  }

  fn render_info(&self, frame: &mut Frame, area: Rect, network: Option<&Network>, title: String) {
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(network) = network else {
      frame.render_widget(Paragraph::new("").block(block), area);
      return;
    };

    let label = |text: &'static str| Span::styled(format!("{:<14}", text), Style::default().fg(Color::DarkGray));
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };

    let dhcp = if network.dhcp_enabled {
      format!("{} - {}", or_dash(&network.dhcp_start), or_dash(&network.dhcp_end))
    } else {
      "disabled".to_string()
    };

    let left = vec![
      Line::from(vec![label("Network"), Span::styled(network.cidr(), Style::default().fg(Color::Cyan))]),
      Line::from(vec![label("Gateway"), Span::raw(or_dash(&network.gateway))]),
      Line::from(vec![
        label("VLAN"),
        Span::raw(network.vlan_id.map_or_else(|| "-".to_string(), |v| v.to_string())),
      ]),
      Line::from(vec![label("DHCP"), Span::raw(dhcp)]),
    ];
    let right = vec![
      Line::from(vec![label("Domain"), Span::raw(or_dash(&network.domain))]),
      Line::from(vec![label("DNS servers"), Span::raw(or_dash(&network.dns_servers.join(", ")))]),
      Line::from(vec![label("Port group"), Span::raw(or_dash(&network.port_group_id))]),
      Line::from(vec![label("ID"), Span::styled(or_dash(&network.id), Style::default().fg(Color::DarkGray))]),
    ];

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let columns = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(inner);
    frame.render_widget(Paragraph::new(left), columns[0]);
    frame.render_widget(Paragraph::new(right), columns[1]);
  }

  fn render_usage(&self, frame: &mut Frame, area: Rect, network: &Network, taken: usize) {
    let percent = network.usage_percent(taken);
    let gauge = Gauge::default()
      .block(Block::default().title(" Usage ").borders(Borders::ALL))
      .gauge_style(Style::default().fg(usage_color(percent)).bg(Color::Black))
      .percent(u16::from(percent))
      .label(format!(
        "{} / {} addresses ({}%)",
        taken,
        network.usable_addresses(),
        percent
      ));
    frame.render_widget(gauge, area);
  }

  fn render_addresses(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    let entry = entry(cache, &self.ips_sub);
    let ips = addresses(cache, &self.ips_sub);
    ensure_valid_table_selection(&mut self.table_state, ips.len());

    let block = Block::default()
      .title(entry_title("IP addresses", Some(ips.len().to_string()), entry))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if ips.is_empty() {
      let content = match entry {
        Some(e) if e.is_errored() => "Failed to load addresses. Press 'r' to retry.",
        Some(e) if e.retained_data().is_some() => "No addresses assigned. Press 'a' to add one.",
        _ => "",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let header = Row::new(["ADDRESS", "HOSTNAME", "DESCRIPTION", "STATE"])
      .style(Style::default().fg(Color::DarkGray));

    let rows: Vec<Row> = ips
      .iter()
      .map(|ip| {
        Row::new(vec![
          Cell::from(ip.cidr()).style(Style::default().fg(Color::Cyan)),
          Cell::from(truncate(&ip.hostname, 30)),
          Cell::from(truncate(&ip.description, 40)),
          Cell::from(ip.state.clone()).style(Style::default().fg(Color::Yellow)),
        ])
      })
      .collect();

    let table = Table::new(
      rows,
      [
        Constraint::Length(20),
        Constraint::Length(30),
        Constraint::Min(20),
        Constraint::Length(12),
      ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }

  // Key handling helpers for or_else chain pattern
  fn handle_overlays(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> Option<ViewAction> {
    if let Some(form) = self.ip_form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submit(draft)) => {
          let api = ctx.api.clone();
          let code = self.code.clone();
          let started = self.mutation.start(
            ctx.cache,
            async move { api.create_ip_address(&code, &draft).await },
            keys::after_ip_created(&self.code),
          );
          self.start(ctx, PendingWrite::CreateIp, started);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.close_ip_form(),
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return Some(ViewAction::None);
    }

    if let Some(form) = self.network_form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Submit(draft)) => {
          let api = ctx.api.clone();
          let code = self.code.clone();
          let new_code = draft.name.trim().to_string();
          let started = self.mutation.start(
            ctx.cache,
            async move { api.update_network(&code, &draft).await },
            keys::after_network_updated(&self.code, &new_code),
          );
          self.start(ctx, PendingWrite::Update { new_code }, started);
        }
        KeyResult::Event(FormEvent::Cancelled) => self.network_form = None,
        KeyResult::Handled | KeyResult::NotHandled => {}
      }
      return Some(ViewAction::None);
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(DeleteTarget::Ip(address))) => {
        let api = ctx.api.clone();
        let code = self.code.clone();
        let target = address.clone();
        let started = self.mutation.start(
          ctx.cache,
          async move { api.delete_ip_address(&code, &target).await },
          keys::after_ip_deleted(&self.code),
        );
        self.start(ctx, PendingWrite::DeleteIp(address), started);
        Some(ViewAction::None)
      }
      KeyResult::Event(ConfirmEvent::Confirmed(DeleteTarget::Network)) => {
        let api = ctx.api.clone();
        let code = self.code.clone();
        let started = self.mutation.start(
          ctx.cache,
          async move { api.delete_network(&code).await },
          keys::after_network_deleted(&self.code),
        );
        self.start(ctx, PendingWrite::DeleteNetwork, started);
        Some(ViewAction::None)
      }
      KeyResult::Event(ConfirmEvent::Cancelled) | KeyResult::Handled => Some(ViewAction::None),
      KeyResult::NotHandled => None,
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.table_state.select_next();
        Some(ViewAction::None)
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.table_state.select_previous();
        Some(ViewAction::None)
      }
      _ => None,
    }
  }

  fn handle_actions(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        ctx.cache.retry(self.network_sub.key());
        ctx.cache.retry(self.ips_sub.key());
        Some(ViewAction::None)
      }
      KeyCode::Char('a') => {
        self.open_ip_form(ctx);
        Some(ViewAction::None)
      }
      KeyCode::Char('e') => {
        match network(ctx.cache, &self.network_sub) {
          Some(network) => {
            self.network_form = Some(FormState::new(
              format!("Edit {}", network.name),
              NetworkDraft::from(network),
              network_fields(),
              validate_network,
            ));
          }
          None => ctx.report("Network is not loaded yet"),
        }
        Some(ViewAction::None)
      }
      KeyCode::Char('d') => {
        if let Some(address) = self.selected_address(ctx.cache) {
          self.confirm.show(
            format!("Release {} from {}?", address, self.code),
            DeleteTarget::Ip(address),
          );
        }
        Some(ViewAction::None)
      }
      KeyCode::Char('D') => {
        self
          .confirm
          .show(format!("Delete network {}?", self.code), DeleteTarget::Network);
        Some(ViewAction::None)
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

fn new_ip_form(draft: IpAddressDraft) -> FormState<IpAddressDraft> {
  FormState::new("Add IP address", draft, ip_address_fields(), validate_ip_address)
}

impl View for NetworkDetailView {
  fn handle_key(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> ViewAction {
    self
      .handle_overlays(key, ctx)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key, ctx))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    let network_entry = entry(cache, &self.network_sub);
    let record = network(cache, &self.network_sub);
    let taken = addresses(cache, &self.ips_sub).len();

    let gone = network_entry
      .and_then(Entry::error)
      .is_some_and(ApiError::is_not_found);

    let mut title = entry_title(&self.code, None, network_entry);
    if self.mutation.is_pending() {
      title.push_str("[saving...] ");
    }

    if gone {
      let block = Block::default()
        .title(title)
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
      let paragraph = Paragraph::new(format!(
        "Network {} no longer exists. Press 'q' to go back.",
        self.code
      ))
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(6), // Settings
        Constraint::Length(3), // Usage gauge
        Constraint::Min(3),    // Addresses
      ])
      .split(area);

    self.render_info(frame, chunks[0], record, title);
    if let Some(record) = record {
      self.render_usage(frame, chunks[1], record, taken);
    }
    self.render_addresses(frame, chunks[2], cache);

    if let Some(form) = &self.network_form {
      render_form(frame, area, form);
    }
    if let Some(form) = &self.ip_form {
      render_form(frame, area, form);
    }
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.code.clone()
  }

  fn tick(&mut self, ctx: &mut ViewContext) -> ViewAction {
    self.prefill_ip_form(ctx.cache);

    let Some(result) = self.mutation.poll(ctx.cache) else {
      return ViewAction::None;
    };

    match self.pending.take() {
      Some(PendingWrite::CreateIp) => {
        if settle_form(&mut self.ip_form, result, ctx, "Add address", "Address assigned") {
          self.free_ip_sub = None;
        }
      }
      Some(PendingWrite::DeleteIp(address)) => match result {
        Ok(()) => ctx.report(format!("Released {}", address)),
        Err(error) => ctx.report_error("Release address", &error),
      },
      Some(PendingWrite::Update { new_code }) => {
        let saved = settle_form(&mut self.network_form, result, ctx, "Update network", "Network saved");
        if saved && new_code != self.code {
          // The old code no longer resolves; follow the rename
          return ViewAction::Replace(Box::new(NetworkDetailView::new(ctx, &new_code)));
        }
      }
      Some(PendingWrite::DeleteNetwork) => match result {
        Ok(()) => {
          ctx.report(format!("Network {} deleted", self.code));
          return ViewAction::Pop;
        }
        Err(error) => ctx.report_error("Delete network", &error),
      },
      None => {}
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.network_form.is_some() || self.ip_form.is_some() || self.confirm.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("a", "add ip").with_priority(20),
      ShortcutInfo::new("d", "release ip").with_priority(30),
      ShortcutInfo::new("e", "edit").with_priority(40),
      ShortcutInfo::new("D", "delete network").with_priority(50),
      ShortcutInfo::new("r", "refresh").with_priority(80),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
