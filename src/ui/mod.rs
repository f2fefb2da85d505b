mod components;
mod renderfns;
mod views;

use crate::app::App;
use crate::game::Phase;
use ratatui::prelude::*;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let game = app.game();

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Road
      Constraint::Length(1), // Key hints
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], game.score(), game.speed(), app.best_score());
  views::road::draw_road(frame, chunks[1], game);
  renderfns::draw_footer(frame, chunks[2], game.phase());

  match game.phase() {
    Phase::Ready => components::overlay::draw_start_overlay(frame, chunks[1]),
    Phase::GameOver => {
      components::overlay::draw_game_over_overlay(frame, chunks[1], game.score(), app.best_score())
    }
    Phase::Running => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GameConfig;
  use ratatui::backend::TestBackend;

  fn render(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    terminal.draw(|frame| draw(frame, app)).unwrap();
    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect()
  }

  #[test]
  fn test_start_screen_renders() {
    let app = App::new(GameConfig::default());
    let screen = render(&app);
    assert!(screen.contains("Score: 0"));
    assert!(screen.contains("Press Enter to start"));
  }
}
