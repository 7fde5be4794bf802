use super::form_dialog::centered;
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Events emitted by a confirmation prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmEvent<T> {
  /// User agreed; carries the target the prompt was opened for
  Confirmed(T),
  Cancelled,
}

/// Yes/no prompt guarding a destructive action
#[derive(Debug, Clone)]
pub struct ConfirmDialog<T> {
  pending: Option<(String, T)>,
}

impl<T> Default for ConfirmDialog<T> {
  fn default() -> Self {
    Self { pending: None }
  }
}

impl<T> ConfirmDialog<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.pending.is_some()
  }

  pub fn show(&mut self, prompt: impl Into<String>, target: T) {
    self.pending = Some((prompt.into(), target));
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ConfirmEvent<T>> {
    if self.pending.is_none() {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') => match self.pending.take() {
        Some((_, target)) => KeyResult::Event(ConfirmEvent::Confirmed(target)),
        None => KeyResult::Handled,
      },
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
        self.pending = None;
        KeyResult::Event(ConfirmEvent::Cancelled)
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some((prompt, _)) = &self.pending else {
      return;
    };

    let width = (prompt.chars().count() as u16 + 4).clamp(30, 70);
    let dialog = centered(area, width, 5);
    frame.render_widget(Clear, dialog);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red))
      .title(" Confirm ");

    let text = vec![
      Line::from(prompt.as_str()),
      Line::default(),
      Line::from(vec![
        Span::styled("<y>", Style::default().fg(Color::Cyan)),
        Span::styled(" yes   ", Style::default().fg(Color::DarkGray)),
        Span::styled("<n>", Style::default().fg(Color::Cyan)),
        Span::styled(" no", Style::default().fg(Color::DarkGray)),
      ]),
    ];

    let paragraph = Paragraph::new(text)
      .block(block)
      .alignment(Alignment::Center)
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, dialog);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_inactive_passes_keys_through() {
    let mut dialog: ConfirmDialog<String> = ConfirmDialog::new();
    assert_eq!(dialog.handle_key(key(KeyCode::Char('y'))), KeyResult::NotHandled);
  }

  #[test]
  fn test_yes_returns_target() {
    let mut dialog = ConfirmDialog::new();
    dialog.show("Delete network lab?", "lab".to_string());
    assert_eq!(dialog.handle_key(key(KeyCode::Char('x'))), KeyResult::Handled);
    assert_eq!(
      dialog.handle_key(key(KeyCode::Char('y'))),
      KeyResult::Event(ConfirmEvent::Confirmed("lab".to_string()))
    );
    assert!(!dialog.is_active());
  }

  #[test]
  fn test_no_cancels() {
    let mut dialog = ConfirmDialog::new();
    dialog.show("Delete?", 7);
    assert_eq!(dialog.handle_key(key(KeyCode::Esc)), KeyResult::Event(ConfirmEvent::Cancelled));
    assert!(!dialog.is_active());
  }
}
