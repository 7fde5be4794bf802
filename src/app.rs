use crate::api::{ApiClient, Cache};
use crate::commands::CommandKind;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_footer, draw_header};
use crate::ui::view::{StatusMessage, View, ViewAction, ViewContext};
use crate::ui::views::{NetworkListView, SshKeysView, TemplateListView, VmListView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Main application state
pub struct App {
  config: Config,
  api: ApiClient,
  /// The session's resource cache, shared by every view
  cache: Cache,
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,
  command_input: CommandInput,
  /// Last mutation outcome, shown in the footer
  status: Option<StatusMessage>,
  /// Set by cache subscribers and input handling; cleared on draw
  redraw: Arc<AtomicBool>,
  title: String,
  should_quit: bool,
}

impl App {
  pub async fn new(config: Config) -> Result<Self> {
    let token = Config::api_token();
    let api = ApiClient::new(&config.api.url, token.as_deref(), config.request_timeout())?;
    let title = config.display_title(api.host());

    let mut app = Self {
      cache: Cache::new(config.query_config()),
      api,
      view_stack: Vec::new(),
      command_input: CommandInput::new(),
      status: None,
      redraw: Arc::new(AtomicBool::new(true)),
      title,
      should_quit: false,
      config,
    };
    app.open_root(CommandKind::Networks);

    Ok(app)
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    info!(host = self.api.host(), page_size = self.config.page_size, "session started");

    let result = self.main_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    info!(cached = self.cache.len(), "session ended");
    result
  }

  async fn main_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      if self.redraw.swap(false, Ordering::Relaxed) {
        terminal.draw(|frame| self.draw(frame))?;
      }

      match events.next().await {
        Some(Event::Key(key)) => {
          self.handle_key(key);
          self.request_redraw();
        }
        Some(Event::Resize) => self.request_redraw(),
        Some(Event::Tick) => {}
        None => break,
      }

      self.sync();
    }
    Ok(())
  }

  fn request_redraw(&self) {
    self.redraw.store(true, Ordering::Relaxed);
  }

  /// Apply finished fetches, then let views collect finished writes.
  fn sync(&mut self) {
    if self.cache.poll() {
      self.request_redraw();
    }

    // Covered views keep ticking so their writes settle, but only the top
    // view may change the stack
    let depth = self.view_stack.len();
    let mut top_action = ViewAction::None;
    for (index, view) in self.view_stack.iter_mut().enumerate() {
      let mut ctx = ViewContext::new(
        &mut self.cache,
        &self.api,
        self.config.page_size,
        &self.redraw,
        &mut self.status,
      );
      let action = view.tick(&mut ctx);
      if index + 1 == depth {
        top_action = action;
      }
    }
    self.apply(top_action);
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // Open dialogs get every key, ':' included
    let captured = self.view_stack.last().is_some_and(|v| v.captures_input());
    if !captured {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(kind)) => {
          self.open_root(kind);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(text)) => {
          self.status = Some(StatusMessage {
            text: format!("Unknown command: {}", text),
            is_error: true,
          });
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    let mut ctx = ViewContext::new(
      &mut self.cache,
      &self.api,
      self.config.page_size,
      &self.redraw,
      &mut self.status,
    );
    let action = view.handle_key(key, &mut ctx);
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => return,
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "push");
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          // Dropping the view releases its subscriptions
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Replace(view) => {
        debug!(view = %view.breadcrumb_label(), "replace");
        self.view_stack.pop();
        self.view_stack.push(view);
      }
    }
    self.request_redraw();
  }

  /// Switch to a root view, discarding the navigation stack
  fn open_root(&mut self, kind: CommandKind) {
    if kind == CommandKind::Quit {
      self.should_quit = true;
      return;
    }

    debug!(?kind, "open root view");
    self.view_stack.clear();
    self.status = None;

    let mut ctx = ViewContext::new(
      &mut self.cache,
      &self.api,
      self.config.page_size,
      &self.redraw,
      &mut self.status,
    );
    let view: Box<dyn View> = match kind {
      CommandKind::Networks => Box::new(NetworkListView::new(&mut ctx)),
      CommandKind::Vms => Box::new(VmListView::new(&mut ctx)),
      CommandKind::Templates => Box::new(TemplateListView::new(&mut ctx)),
      CommandKind::SshKeys => Box::new(SshKeysView::new(&mut ctx)),
      CommandKind::Quit => return,
    };
    self.view_stack.push(view);
    self.request_redraw();
  }

  fn draw(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // Main content
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let shortcuts = self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default();
    draw_header(frame, chunks[0], &self.title, self.api.host(), &shortcuts);

    if let Some(view) = self.view_stack.last_mut() {
      view.render(frame, chunks[1], &self.cache);
    }

    let breadcrumb: Vec<String> = self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect();
    draw_footer(frame, chunks[2], &breadcrumb, self.status.as_ref());

    self.command_input.render_overlay(frame, chunks[1]);
  }
}
