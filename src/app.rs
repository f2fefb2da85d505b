use crate::config::GameConfig;
use crate::event::{Event, EventHandler};
use crate::game::{Action, Game, Phase};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info, trace};

/// What a key press means in the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
  Steer(Action),
  Start,
  Restart,
  Quit,
}

/// Map a key to an action for the given phase.
pub fn key_action(key: &KeyEvent, phase: Phase) -> Option<KeyAction> {
  if key.kind != KeyEventKind::Press {
    return None;
  }

  match key.code {
    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(KeyAction::Quit),
    KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
    _ => match phase {
      Phase::Ready => match key.code {
        KeyCode::Enter | KeyCode::Char(' ') => Some(KeyAction::Start),
        _ => None,
      },
      Phase::Running => match key.code {
        KeyCode::Left | KeyCode::Char('a') => Some(KeyAction::Steer(Action::Left)),
        KeyCode::Right | KeyCode::Char('d') => Some(KeyAction::Steer(Action::Right)),
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char(' ') => {
          Some(KeyAction::Steer(Action::Jump))
        }
        KeyCode::Char('r') => Some(KeyAction::Restart),
        _ => None,
      },
      Phase::GameOver => match key.code {
        KeyCode::Char('r') | KeyCode::Enter => Some(KeyAction::Restart),
        _ => None,
      },
    },
  }
}

/// Main application state
pub struct App {
  game: Game,
  rng: StdRng,
  tick_rate: Duration,
  best_score: u64,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: GameConfig) -> Self {
    let rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    let tick_rate = Duration::from_secs(1) / config.fps;

    Self {
      game: Game::new(config),
      rng,
      tick_rate,
      best_score: 0,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(self.tick_rate);
    info!("Game loop running at {:?} per frame", self.tick_rate);

    let result = self.main_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn main_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    terminal.draw(|frame| ui::draw(frame, self))?;

    while !self.should_quit {
      let Some(event) = events.next().await else {
        break;
      };

      if self.handle_event(event) {
        terminal.draw(|frame| ui::draw(frame, self))?;
      }
    }

    Ok(())
  }

  /// Returns true if the screen needs redrawing.
  fn handle_event(&mut self, event: Event) -> bool {
    match event {
      Event::Key(key) => {
        self.handle_key(key);
        true
      }
      Event::Resize => true,
      Event::Tick => {
        let report = self.game.tick(&mut self.rng);
        if report.spawned_obstacle || report.spawned_coin {
          trace!(
            "Spawned obstacle: {}, coin: {}",
            report.spawned_obstacle,
            report.spawned_coin
          );
        }
        if report.coins_collected > 0 {
          debug!("Collected {} coin(s)", report.coins_collected);
        }
        if report.crashed {
          self.best_score = self.best_score.max(self.game.score());
        }
        self.game.phase() == Phase::Running || report.crashed
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match key_action(&key, self.game.phase()) {
      Some(KeyAction::Steer(action)) => self.game.press(action),
      Some(KeyAction::Start) => self.game.start(),
      Some(KeyAction::Restart) => {
        self.best_score = self.best_score.max(self.game.score());
        self.game.restart();
      }
      Some(KeyAction::Quit) => self.should_quit = true,
      None => {}
    }
  }

  // Accessors for UI rendering
  pub fn game(&self) -> &Game {
    &self.game
  }

  pub fn best_score(&self) -> u64 {
    self.best_score
  }
}
