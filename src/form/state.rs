use crossterm::event::{KeyCode, KeyEvent};

use super::field::Field;
use super::validate::FieldErrors;
use crate::ui::components::{InputResult, KeyResult, TextInput};

/// Events a form emits to the view that owns it
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent<T> {
  /// The draft passed validation
  Submit(T),
  Cancelled,
}

/// Editing state for one draft.
///
/// Text and number fields edit through a [`TextInput`] seeded from the draft;
/// the buffer is written back when focus moves or the form is submitted.
/// Validation runs on submit and nothing is emitted while it reports errors.
pub struct FormState<T> {
  title: String,
  draft: T,
  fields: Vec<Field<T>>,
  validate: fn(&T) -> FieldErrors,
  focused: usize,
  editor: TextInput,
  errors: FieldErrors,
  submitting: bool,
}

impl<T: Clone> FormState<T> {
  pub fn new(
    title: impl Into<String>,
    draft: T,
    fields: Vec<Field<T>>,
    validate: fn(&T) -> FieldErrors,
  ) -> Self {
    let mut form = Self {
      title: title.into(),
      draft,
      fields,
      validate,
      focused: 0,
      editor: TextInput::new(),
      errors: FieldErrors::new(),
      submitting: false,
    };
    form.load_editor();
    form
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn draft(&self) -> &T {
    &self.draft
  }

  pub fn fields(&self) -> &[Field<T>] {
    &self.fields
  }

  pub fn focused(&self) -> usize {
    self.focused
  }

  pub fn errors(&self) -> &FieldErrors {
    &self.errors
  }

  /// Show messages from somewhere other than local validation.
  pub fn set_errors(&mut self, errors: FieldErrors) {
    self.errors = errors;
    self.submitting = false;
  }

  /// Whether a submitted draft is waiting on the backend
  pub fn is_submitting(&self) -> bool {
    self.submitting
  }

  /// The backend answered; allow editing and submitting again.
  pub fn finish_submit(&mut self) {
    self.submitting = false;
  }

  /// Text shown for a field, reflecting in-progress edits on the focused one.
  pub fn display_value(&self, index: usize) -> String {
    match self.fields.get(index) {
      Some(field) if index == self.focused && field.is_typed() => self.editor.value().to_string(),
      Some(field) => field.display(&self.draft),
      None => String::new(),
    }
  }

  pub fn cursor_position(&self) -> usize {
    self.editor.cursor_position()
  }

  fn load_editor(&mut self) {
    let value = self
      .fields
      .get(self.focused)
      .filter(|f| f.is_typed())
      .map(|f| f.display(&self.draft))
      .unwrap_or_default();
    self.editor.set_value(&value);
  }

  /// Write the editor buffer into the draft. Returns false on a parse error.
  fn commit(&mut self) -> bool {
    let Some(field) = self.fields.get(self.focused) else {
      return true;
    };
    if !field.is_typed() {
      return true;
    }
    match field.commit_text(&mut self.draft, self.editor.value()) {
      Ok(()) => true,
      Err(message) => {
        self.errors.add(field.name(), message);
        false
      }
    }
  }

  fn focus(&mut self, index: usize) {
    self.commit();
    self.focused = index;
    self.load_editor();
  }

  fn move_focus(&mut self, forward: bool) {
    let len = self.fields.len();
    if len == 0 {
      return;
    }
    let next = if forward {
      (self.focused + 1) % len
    } else {
      (self.focused + len - 1) % len
    };
    self.focus(next);
  }

  fn submit(&mut self) -> KeyResult<FormEvent<T>> {
    self.errors.clear();
    if !self.commit() {
      return KeyResult::Handled;
    }
    self.errors = (self.validate)(&self.draft);
    if !self.errors.is_empty() {
      // Jump to the first field with a problem
      if let Some(index) = self
        .fields
        .iter()
        .position(|f| self.errors.get(f.name()).is_some())
      {
        self.focused = index;
        self.load_editor();
      }
      return KeyResult::Handled;
    }
    self.submitting = true;
    KeyResult::Event(FormEvent::Submit(self.draft.clone()))
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent<T>> {
    if self.submitting {
      return match key.code {
        KeyCode::Esc => KeyResult::Event(FormEvent::Cancelled),
        _ => KeyResult::Handled,
      };
    }

    match key.code {
      KeyCode::Esc => return KeyResult::Event(FormEvent::Cancelled),
      KeyCode::Enter => return self.submit(),
      KeyCode::Tab | KeyCode::Down => {
        self.move_focus(true);
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.move_focus(false);
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get(self.focused) else {
      return KeyResult::Handled;
    };

    if field.is_typed() {
      return match self.editor.handle_key(key) {
        InputResult::Consumed => {
          self.errors.clear();
          KeyResult::Handled
        }
        InputResult::Submitted(_) | InputResult::Cancelled => KeyResult::Handled,
        InputResult::NotHandled => KeyResult::Handled,
      };
    }

    match key.code {
      KeyCode::Char(' ') | KeyCode::Right | KeyCode::Char('l') => {
        field.cycle(&mut self.draft, true);
      }
      KeyCode::Left | KeyCode::Char('h') => {
        field.cycle(&mut self.draft, false);
      }
      _ => {}
    }
    KeyResult::Handled
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::VmDraft;
  use crate::form::validate::validate_vm;
  use crate::form::vm_fields;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_text(form: &mut FormState<VmDraft>, text: &str) {
    for c in text.chars() {
      form.handle_key(key(KeyCode::Char(c)));
    }
  }

  fn vm_form(draft: VmDraft) -> FormState<VmDraft> {
    FormState::new("Edit VM", draft, vm_fields(), validate_vm)
  }

  #[test]
  fn test_edit_and_submit() {
    let mut form = vm_form(VmDraft {
      name: "web".to_string(),
      memory_mb: Some(1024),
      num_cpus: Some(1),
    });
    assert_eq!(form.display_value(0), "web");

    type_text(&mut form, "-1");
    form.handle_key(key(KeyCode::Tab));
    form.handle_key(key(KeyCode::Backspace));
    form.handle_key(key(KeyCode::Backspace));
    form.handle_key(key(KeyCode::Backspace));
    form.handle_key(key(KeyCode::Backspace));
    type_text(&mut form, "4096");

    let result = form.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(FormEvent::Submit(VmDraft {
        name: "web-1".to_string(),
        memory_mb: Some(4096),
        num_cpus: Some(1),
      }))
    );
    assert!(form.is_submitting());

    // Keys are ignored until the backend answers
    assert_eq!(form.handle_key(key(KeyCode::Char('x'))), KeyResult::Handled);
    form.finish_submit();
    assert!(!form.is_submitting());
  }

  #[test]
  fn test_validation_blocks_submit_and_focuses_error() {
    let mut form = vm_form(VmDraft {
      name: "web".to_string(),
      memory_mb: Some(512),
      num_cpus: Some(0),
    });

    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert_eq!(
      form.errors().get("num_cpus"),
      Some("vCPU count must be greater than zero")
    );
    assert_eq!(form.fields()[form.focused()].name(), "num_cpus");
    assert!(!form.is_submitting());
  }

  #[test]
  fn test_number_parse_error() {
    let mut form = vm_form(VmDraft::default());
    form.handle_key(key(KeyCode::Tab));
    type_text(&mut form, "lots");

    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert_eq!(form.errors().get("memory_mb"), Some("Memory (MB) must be a number"));
  }

  #[test]
  fn test_backend_errors_are_shown() {
    let mut form = vm_form(VmDraft::default());
    let mut errors = FieldErrors::new();
    errors.add("name", "Name already taken");
    form.set_errors(errors);
    assert_eq!(form.errors().get("name"), Some("Name already taken"));
  }

  #[test]
  fn test_escape_cancels() {
    let mut form = vm_form(VmDraft::default());
    assert_eq!(
      form.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(FormEvent::Cancelled)
    );
  }
}
