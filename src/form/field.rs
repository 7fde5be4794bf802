//! Typed field descriptors.
//!
//! Each variant carries plain function pointers that read and write one field
//! of the draft type `T`, so a form never guesses at a record's shape.

use crate::api::types::{SshKey, Template};

/// Something that can be offered in a select field
pub trait SelectOption {
  /// Value written into the draft
  fn option_value(&self) -> String;
  /// Text shown to the user
  fn option_label(&self) -> String;
}

impl SelectOption for Template {
  fn option_value(&self) -> String {
    self.id.clone()
  }

  fn option_label(&self) -> String {
    if self.os_type.is_empty() {
      self.name.clone()
    } else {
      format!("{} ({})", self.name, self.os_type)
    }
  }
}

impl SelectOption for SshKey {
  fn option_value(&self) -> String {
    self.id.clone()
  }

  fn option_label(&self) -> String {
    format!("{} [{}]", self.name, self.key_type)
  }
}

impl SelectOption for &'static str {
  fn option_value(&self) -> String {
    self.to_string()
  }

  fn option_label(&self) -> String {
    self.to_string()
  }
}

/// A resolved select entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
  pub value: String,
  pub label: String,
}

impl Choice {
  pub fn from_options<O: SelectOption>(options: &[O]) -> Vec<Choice> {
    options
      .iter()
      .map(|o| Choice {
        value: o.option_value(),
        label: o.option_label(),
      })
      .collect()
  }
}

pub enum Field<T> {
  Text {
    name: &'static str,
    label: &'static str,
    get: fn(&T) -> &str,
    set: fn(&mut T, String),
  },
  Number {
    name: &'static str,
    label: &'static str,
    get: fn(&T) -> Option<i64>,
    set: fn(&mut T, Option<i64>),
  },
  Select {
    name: &'static str,
    label: &'static str,
    get: fn(&T) -> &str,
    set: fn(&mut T, String),
    choices: Vec<Choice>,
  },
  Checkbox {
    name: &'static str,
    label: &'static str,
    get: fn(&T) -> bool,
    set: fn(&mut T, bool),
  },
}

impl<T> Field<T> {
  /// Key used for validation messages
  pub fn name(&self) -> &'static str {
    match self {
      Field::Text { name, .. }
      | Field::Number { name, .. }
      | Field::Select { name, .. }
      | Field::Checkbox { name, .. } => *name,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Field::Text { label, .. }
      | Field::Number { label, .. }
      | Field::Select { label, .. }
      | Field::Checkbox { label, .. } => *label,
    }
  }

  /// Whether the field is edited through a text buffer
  pub fn is_typed(&self) -> bool {
    matches!(self, Field::Text { .. } | Field::Number { .. })
  }

  /// Current value as text, for display and for seeding the editor.
  pub fn display(&self, draft: &T) -> String {
    match self {
      Field::Text { get, .. } => get(draft).to_string(),
      Field::Number { get, .. } => get(draft).map(|n| n.to_string()).unwrap_or_default(),
      Field::Select { get, choices, .. } => {
        let value = get(draft);
        choices
          .iter()
          .find(|c| c.value == value)
          .map_or_else(|| value.to_string(), |c| c.label.clone())
      }
      Field::Checkbox { get, .. } => {
        if get(draft) {
          "[x]".to_string()
        } else {
          "[ ]".to_string()
        }
      }
    }
  }

  /// Write typed text back into the draft.
  ///
  /// Returns an error message when a number field holds something that is
  /// not a number. An empty number field clears the value.
  pub fn commit_text(&self, draft: &mut T, text: &str) -> Result<(), String> {
    match self {
      Field::Text { set, .. } => {
        set(draft, text.to_string());
        Ok(())
      }
      Field::Number { set, label, .. } => {
        let trimmed = text.trim();
        if trimmed.is_empty() {
          set(draft, None);
          return Ok(());
        }
        match trimmed.parse::<i64>() {
          Ok(n) => {
            set(draft, Some(n));
            Ok(())
          }
          Err(_) => Err(format!("{} must be a number", label)),
        }
      }
      Field::Select { .. } | Field::Checkbox { .. } => Ok(()),
    }
  }

  /// Step a select to the next or previous choice, or flip a checkbox.
  pub fn cycle(&self, draft: &mut T, forward: bool) {
    match self {
      Field::Select {
        get, set, choices, ..
      } => {
        if choices.is_empty() {
          return;
        }
        let current = choices.iter().position(|c| c.value == get(draft));
        let next = match (current, forward) {
          (None, _) => 0,
          (Some(i), true) => (i + 1) % choices.len(),
          (Some(0), false) => choices.len() - 1,
          (Some(i), false) => i - 1,
        };
        set(draft, choices[next].value.clone());
      }
      Field::Checkbox { get, set, .. } => {
        let value = get(draft);
        set(draft, !value);
      }
      Field::Text { .. } | Field::Number { .. } => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct Draft {
    name: String,
    cpus: Option<i64>,
    template: String,
    dhcp: bool,
  }

  fn name_field() -> Field<Draft> {
    Field::Text {
      name: "name",
      label: "Name",
      get: |d| d.name.as_str(),
      set: |d, v| d.name = v,
    }
  }

  fn cpu_field() -> Field<Draft> {
    Field::Number {
      name: "num_cpus",
      label: "vCPUs",
      get: |d| d.cpus,
      set: |d, v| d.cpus = v,
    }
  }

  fn template_field() -> Field<Draft> {
    let templates = vec![
      Template {
        id: "1".to_string(),
        name: "ubuntu".to_string(),
        os_type: "linux".to_string(),
      },
      Template {
        id: "2".to_string(),
        name: "win".to_string(),
        os_type: String::new(),
      },
    ];
    Field::Select {
      name: "template",
      label: "Template",
      get: |d| d.template.as_str(),
      set: |d, v| d.template = v,
      choices: Choice::from_options(&templates),
    }
  }

  #[test]
  fn test_text_round_trip() {
    let field = name_field();
    let mut draft = Draft::default();
    field.commit_text(&mut draft, "web-1").unwrap();
    assert_eq!(field.display(&draft), "web-1");
    assert!(field.is_typed());
  }

  #[test]
  fn test_number_parsing() {
    let field = cpu_field();
    let mut draft = Draft::default();

    field.commit_text(&mut draft, " 4 ").unwrap();
    assert_eq!(draft.cpus, Some(4));
    assert_eq!(field.display(&draft), "4");

    assert_eq!(
      field.commit_text(&mut draft, "four"),
      Err("vCPUs must be a number".to_string())
    );
    assert_eq!(draft.cpus, Some(4));

    field.commit_text(&mut draft, "").unwrap();
    assert_eq!(draft.cpus, None);
  }

  #[test]
  fn test_select_cycles_typed_options() {
    let field = template_field();
    let mut draft = Draft::default();
    assert_eq!(field.display(&draft), "");

    field.cycle(&mut draft, true);
    assert_eq!(draft.template, "1");
    assert_eq!(field.display(&draft), "ubuntu (linux)");

    field.cycle(&mut draft, true);
    assert_eq!(field.display(&draft), "win");
    field.cycle(&mut draft, true);
    assert_eq!(draft.template, "1");
    field.cycle(&mut draft, false);
    assert_eq!(draft.template, "2");
  }

  #[test]
  fn test_checkbox_toggles() {
    let field: Field<Draft> = Field::Checkbox {
      name: "dhcp",
      label: "DHCP",
      get: |d| d.dhcp,
      set: |d, v| d.dhcp = v,
    };
    let mut draft = Draft::default();
    assert_eq!(field.display(&draft), "[ ]");
    field.cycle(&mut draft, true);
    assert!(draft.dhcp);
    assert_eq!(field.display(&draft), "[x]");
    assert!(!field.is_typed());
  }

  #[test]
  fn test_str_options() {
    let choices = Choice::from_options(&["ed25519", "rsa"]);
    assert_eq!(choices[1].value, "rsa");
    assert_eq!(choices[1].label, "rsa");
  }
}
