use crate::api::keys;
use crate::api::types::{PowerState, VirtualMachine, VmDraft};
use crate::api::{ApiError, Cache, Entry, Query, Resource};
use crate::form::{validate_vm, vm_fields, FormEvent, FormState};
use crate::query::{Mutation, Subscription};
use crate::ui::components::{render_form, KeyResult};
use crate::ui::entry_title;
use crate::ui::renderfns::power_color;
use crate::ui::settle_form;
use crate::ui::view::{entry, ShortcutInfo, View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PowerAction {
  Start,
  Stop,
}

impl PowerAction {
  fn progress(&self) -> &'static str {
    match self {
      PowerAction::Start => "starting...",
      PowerAction::Stop => "stopping...",
    }
  }
}

enum PendingWrite {
  Update { new_name: String },
  Power(PowerAction),
}

/// One virtual machine with power controls
pub struct VmDetailView {
  name: String,
  subscription: Subscription,
  form: Option<FormState<VmDraft>>,
  mutation: Mutation<(), ApiError>,
  pending: Option<PendingWrite>,
}

fn machine<'c>(cache: &'c Cache, subscription: &Subscription) -> Option<&'c VirtualMachine> {
  entry(cache, subscription)
    .and_then(Entry::retained_data)
    .and_then(Resource::as_vm)
}

impl VmDetailView {
  pub fn new(ctx: &mut ViewContext, name: &str) -> Self {
    let subscription = ctx.watch(Query::vm(ctx.api, name));
    Self {
      name: name.to_string(),
      subscription,
      form: None,
      mutation: Mutation::new(),
      pending: None,
    }
  }

  fn power(&mut self, action: PowerAction, ctx: &mut ViewContext) {
    let state = machine(ctx.cache, &self.subscription).map(|vm| vm.power_state);
    match (action, state) {
      (_, None) => return ctx.report("Virtual machine is not loaded yet"),
      (PowerAction::Start, Some(PowerState::On)) => return ctx.report(format!("{} is already running", self.name)),
      (PowerAction::Stop, Some(PowerState::Off)) => return ctx.report(format!("{} is already stopped", self.name)),
      _ => {}
    }

    let api = ctx.api.clone();
    let name = self.name.clone();
    let started = self.mutation.start(
      ctx.cache,
      async move {
        match action {
          PowerAction::Start => api.start_vm(&name).await,
          PowerAction::Stop => api.stop_vm(&name).await,
        }
      },
      keys::after_vm_power_changed(&self.name),
    );
    if started {
      self.pending = Some(PendingWrite::Power(action));
    } else {
      ctx.report("Another change is still being saved");
    }
  }

  fn pending_label(&self) -> Option<&'static str> {
    match self.pending {
      Some(PendingWrite::Power(action)) => Some(action.progress()),
      Some(PendingWrite::Update { .. }) => Some("saving..."),
      None => None,
    }
  }

  fn render_details(&self, frame: &mut Frame, area: Rect, cache: &Cache) {
    let entry = entry(cache, &self.subscription);
    let mut title = entry_title(&self.name, None, entry);
    if let Some(label) = self.pending_label() {
      title.push_str(&format!("[{}] ", label));
    }

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(vm) = machine(cache, &self.subscription) else {
      let content = match entry.and_then(Entry::error) {
        Some(error) if error.is_not_found() => {
          format!("Virtual machine {} no longer exists. Press 'q' to go back.", self.name)
        }
        Some(_) => "Failed to load virtual machine. Press 'r' to retry.".to_string(),
        None => String::new(),
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let label = |text: &'static str| Span::styled(format!("{:<12}", text), Style::default().fg(Color::DarkGray));
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };

    let lines = vec![
      Line::from(vec![
        label("State"),
        Span::styled(
          vm.power_state.label(),
          Style::default().fg(power_color(vm.power_state)).bold(),
        ),
      ]),
      Line::from(vec![label("vCPUs"), Span::raw(vm.num_cpus.to_string())]),
      Line::from(vec![label("Memory"), Span::raw(format!("{} MB", vm.memory_mb))]),
      Line::default(),
      Line::from(vec![label("IP address"), Span::styled(or_dash(&vm.ip_address), Style::default().fg(Color::Yellow))]),
      Line::from(vec![label("Network"), Span::raw(or_dash(&vm.network))]),
      Line::from(vec![label("Template"), Span::raw(or_dash(&vm.template_id))]),
      Line::from(vec![label("ID"), Span::styled(or_dash(&vm.id), Style::default().fg(Color::DarkGray))]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn handle_form(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> Option<ViewAction> {
    let form = self.form.as_mut()?;
    match form.handle_key(key) {
      KeyResult::Event(FormEvent::Submit(draft)) => {
        let api = ctx.api.clone();
        let name = self.name.clone();
        let new_name = draft.name.trim().to_string();
        let started = self.mutation.start(
          ctx.cache,
          async move { api.update_vm(&name, &draft).await },
          keys::after_vm_updated(&self.name, &new_name),
        );
        if started {
          self.pending = Some(PendingWrite::Update { new_name });
        } else if let Some(form) = self.form.as_mut() {
          form.finish_submit();
          ctx.report("Another change is still being saved");
        }
      }
      KeyResult::Event(FormEvent::Cancelled) => self.form = None,
      KeyResult::Handled | KeyResult::NotHandled => {}
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        ctx.cache.retry(self.subscription.key());
        Some(ViewAction::None)
      }
      KeyCode::Char('s') => {
        self.power(PowerAction::Start, ctx);
        Some(ViewAction::None)
      }
      KeyCode::Char('x') => {
        self.power(PowerAction::Stop, ctx);
        Some(ViewAction::None)
      }
      KeyCode::Char('e') => {
        match machine(ctx.cache, &self.subscription) {
          Some(vm) => {
            self.form = Some(FormState::new(
              format!("Edit {}", vm.name),
              VmDraft::from(vm),
              vm_fields(),
              validate_vm,
            ));
          }
          None => ctx.report("Virtual machine is not loaded yet"),
        }
        Some(ViewAction::None)
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for VmDetailView {
  fn handle_key(&mut self, key: KeyEvent, ctx: &mut ViewContext) -> ViewAction {
    self
      .handle_form(key, ctx)
      .or_else(|| self.handle_actions(key, ctx))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, cache: &Cache) {
    self.render_details(frame, area, cache);
    if let Some(form) = &self.form {
      render_form(frame, area, form);
    }
  }

  fn breadcrumb_label(&self) -> String {
    self.name.clone()
  }

  fn tick(&mut self, ctx: &mut ViewContext) -> ViewAction {
    let Some(result) = self.mutation.poll(ctx.cache) else {
      return ViewAction::None;
    };

    match self.pending.take() {
      Some(PendingWrite::Update { new_name }) => {
        let saved = settle_form(&mut self.form, result, ctx, "Update VM", "Virtual machine saved");
        if saved && new_name != self.name {
          return ViewAction::Replace(Box::new(VmDetailView::new(ctx, &new_name)));
        }
      }
      Some(PendingWrite::Power(action)) => match (action, result) {
        (PowerAction::Start, Ok(())) => ctx.report(format!("{} started", self.name)),
        (PowerAction::Stop, Ok(())) => ctx.report(format!("{} stopped", self.name)),
        (PowerAction::Start, Err(error)) => ctx.report_error("Start VM", &error),
        (PowerAction::Stop, Err(error)) => ctx.report_error("Stop VM", &error),
      },
      None => {}
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.form.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("s", "start").with_priority(20),
      ShortcutInfo::new("x", "stop").with_priority(30),
      ShortcutInfo::new("e", "edit").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(80),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
