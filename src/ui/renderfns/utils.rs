use crate::api::types::PowerState;
use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` characters, adding "..." if cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn power_color(state: PowerState) -> Color {
  match state {
    PowerState::On => Color::Green,
    PowerState::Off => Color::Red,
    PowerState::Unknown => Color::DarkGray,
  }
}

/// Gauge color for a network's address usage
pub fn usage_color(percent: u8) -> Color {
  match percent {
    0..=69 => Color::Green,
    70..=89 => Color::Yellow,
    _ => Color::Red,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("réseau-principal", 6), "rés...");
  }

  #[test]
  fn test_usage_color_thresholds() {
    assert_eq!(usage_color(4), Color::Green);
    assert_eq!(usage_color(75), Color::Yellow);
    assert_eq!(usage_color(95), Color::Red);
  }

  #[test]
  fn test_power_color() {
    assert_eq!(power_color(PowerState::On), Color::Green);
    assert_eq!(power_color(PowerState::Off), Color::Red);
  }
}
