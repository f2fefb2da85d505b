use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with title, score and speed
pub fn draw_header(frame: &mut Frame, area: Rect, score: u64, speed: f32, best: u64) {
  let header = Line::from(vec![
    Span::styled(" lanerun ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" Score: {} ", score),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" Speed: {} ", speed_label(speed)),
      Style::default().fg(Color::White),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" Best: {} ", best), Style::default().fg(Color::Green)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Speed in road units per frame
fn speed_label(speed: f32) -> String {
  format!("{:.3}", speed)
}
