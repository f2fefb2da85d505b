use crate::ui::renderfns::centered_rect;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

fn draw_panel(frame: &mut Frame, area: Rect, title: &str, color: Color, lines: Vec<Line>) {
  let height = lines.len() as u16 + 2;
  let panel = centered_rect(44, height, area);

  // Clear the road behind the panel
  frame.render_widget(Clear, panel);

  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(color))
    .title(title.to_string())
    .title_alignment(Alignment::Center);

  let paragraph = Paragraph::new(lines)
    .block(block)
    .alignment(Alignment::Center);
  frame.render_widget(paragraph, panel);
}

/// Start screen shown before the first run
pub fn draw_start_overlay(frame: &mut Frame, area: Rect) {
  let lines = vec![
    Line::from(Span::styled(
      "Dodge obstacles, grab coins",
      Style::default().fg(Color::White),
    )),
    Line::from(""),
    Line::from(vec![
      Span::styled("←/→", Style::default().fg(Color::Cyan)),
      Span::styled(" change lane   ", Style::default().fg(Color::DarkGray)),
      Span::styled("↑/Space", Style::default().fg(Color::Cyan)),
      Span::styled(" jump", Style::default().fg(Color::DarkGray)),
    ]),
    Line::from(""),
    Line::from(Span::styled(
      "Press Enter to start",
      Style::default().fg(Color::Yellow).bold(),
    )),
  ];

  draw_panel(frame, area, " lanerun ", Color::Cyan, lines);
}

/// Game over screen with the final score
pub fn draw_game_over_overlay(frame: &mut Frame, area: Rect, score: u64, best: u64) {
  let lines = vec![
    Line::from(Span::styled(
      format!("Final score: {}", score),
      Style::default().fg(Color::Yellow).bold(),
    )),
    Line::from(Span::styled(
      format!("Best: {}", best),
      Style::default().fg(Color::Green),
    )),
    Line::from(""),
    Line::from(Span::styled(
      "r to restart, q to quit",
      Style::default().fg(Color::DarkGray),
    )),
  ];

  draw_panel(frame, area, " Game over ", Color::Red, lines);
}
