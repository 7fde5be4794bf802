use crate::form::{Field, FormState};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

const LABEL_WIDTH: usize = 16;

/// Render a form as a centered dialog.
///
/// Field messages go under the field they belong to; messages for names no
/// field owns (backend-level complaints) are listed at the bottom.
pub fn render_form<T: Clone>(frame: &mut Frame, area: Rect, form: &FormState<T>) {
  let mut lines: Vec<Line> = Vec::new();
  let mut cursor: Option<(u16, u16)> = None;

  for (index, field) in form.fields().iter().enumerate() {
    let focused = index == form.focused();
    let value = form.display_value(index);

    let label_style = if focused {
      Style::default().fg(Color::Yellow).bold()
    } else {
      Style::default().fg(Color::Gray)
    };
    let marker = if focused { "> " } else { "  " };

    let value_span = match field {
      Field::Select { .. } if focused => {
        Span::styled(format!("< {} >", value), Style::default().fg(Color::Cyan))
      }
      Field::Checkbox { .. } => Span::styled(value.clone(), Style::default().fg(Color::Cyan)),
      _ if focused => Span::styled(value.clone(), Style::default().fg(Color::White).underlined()),
      _ => Span::raw(value.clone()),
    };

    if focused && field.is_typed() {
      let offset = marker.len() + LABEL_WIDTH + form.cursor_position();
      cursor = Some((offset as u16, lines.len() as u16));
    }

    lines.push(Line::from(vec![
      Span::styled(marker, label_style),
      Span::styled(format!("{:<width$}", field.label(), width = LABEL_WIDTH), label_style),
      value_span,
    ]));

    if let Some(message) = form.errors().get(field.name()) {
      lines.push(Line::from(Span::styled(
        format!("{:width$}{}", "", message, width = LABEL_WIDTH + 2),
        Style::default().fg(Color::Red),
      )));
    }
  }

  let orphans: Vec<(&str, &str)> = form
    .errors()
    .iter()
    .filter(|(name, _)| !form.fields().iter().any(|f| f.name() == *name))
    .collect();
  if !orphans.is_empty() {
    lines.push(Line::default());
    for (name, message) in orphans {
      lines.push(Line::from(Span::styled(
        format!("{}: {}", name, message),
        Style::default().fg(Color::Red),
      )));
    }
  }

  lines.push(Line::default());
  lines.push(if form.is_submitting() {
    Line::from(Span::styled("Saving...", Style::default().fg(Color::Yellow)))
  } else {
    Line::from(vec![
      Span::styled("<enter>", Style::default().fg(Color::Cyan)),
      Span::styled(" save  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<tab>", Style::default().fg(Color::Cyan)),
      Span::styled(" next  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<space>", Style::default().fg(Color::Cyan)),
      Span::styled(" toggle  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<esc>", Style::default().fg(Color::Cyan)),
      Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
    ])
  });

  let width = 64.min(area.width.saturating_sub(4)).max(20.min(area.width));
  let height = (lines.len() as u16 + 2).min(area.height);
  let dialog = centered(area, width, height);

  frame.render_widget(Clear, dialog);

  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(format!(" {} ", form.title()));
  let inner = block.inner(dialog);

  frame.render_widget(Paragraph::new(lines).block(block), dialog);

  if let Some((x, y)) = cursor {
    if !form.is_submitting() && x < inner.width && y < inner.height {
      frame.set_cursor_position((inner.x + x, inner.y + y));
    }
  }
}

/// A `width` x `height` rect centered in `area`
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}
