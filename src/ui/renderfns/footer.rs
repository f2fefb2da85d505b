use crate::game::Phase;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Key hints for a phase, as (key, label) pairs
pub fn hints(phase: Phase) -> &'static [(&'static str, &'static str)] {
  match phase {
    Phase::Ready => &[("Enter/Space", "start"), ("q", "quit")],
    Phase::Running => &[
      ("←/a →/d", "lane"),
      ("↑/w/Space", "jump"),
      ("r", "restart"),
      ("q", "quit"),
    ],
    Phase::GameOver => &[("r/Enter", "restart"), ("q", "quit")],
  }
}

/// Draw the footer bar with key hints
pub fn draw_footer(frame: &mut Frame, area: Rect, phase: Phase) {
  let mut spans = vec![Span::raw(" ")];

  for (i, (key, label)) in hints(phase).iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("   "));
    }
    spans.push(Span::styled(format!("<{}>", key), Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(
      format!(" {}", label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_phase_offers_quit() {
    for phase in [Phase::Ready, Phase::Running, Phase::GameOver] {
      assert!(hints(phase).iter().any(|(_, label)| *label == "quit"));
    }
  }
}
