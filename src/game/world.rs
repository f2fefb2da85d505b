//! Per-frame simulation of the lane runner.

use rand::Rng;
use tracing::info;

use super::entity::{Coin, Obstacle, Player, MAX_LANE, MIN_LANE};
use super::input::{Action, Controls};
use crate::config::GameConfig;

/// Depth at which new obstacles and coins appear.
pub const SPAWN_Z: f32 = -20.0;
/// Entities past this depth have gone behind the camera.
pub const DESPAWN_Z: f32 = 10.0;
/// Entities closer than this to the player touch it.
pub const COLLISION_RADIUS: f32 = 1.2;
/// Camera x follows this fraction of the player's x.
const CAMERA_FOLLOW: f32 = 0.3;
const CAMERA_LERP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// Start screen, nothing moves
  Ready,
  Running,
  /// Hit an obstacle; only a restart leaves this state
  GameOver,
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
  pub spawned_obstacle: bool,
  pub spawned_coin: bool,
  pub coins_collected: u32,
  pub crashed: bool,
}

/// Complete game state: player, dynamic entities and scalars.
pub struct Game {
  config: GameConfig,
  phase: Phase,
  controls: Controls,
  player: Player,
  obstacles: Vec<Obstacle>,
  coins: Vec<Coin>,
  score: u64,
  speed: f32,
  /// Total distance travelled, drives the lane marker scroll
  distance: f32,
  camera_x: f32,
}

impl Game {
  pub fn new(config: GameConfig) -> Self {
    let speed = config.initial_speed;
    Self {
      config,
      phase: Phase::Ready,
      controls: Controls::default(),
      player: Player::default(),
      obstacles: Vec::new(),
      coins: Vec::new(),
      score: 0,
      speed,
      distance: 0.0,
      camera_x: 0.0,
    }
  }

  /// Leave the start screen. Does nothing once the game has started.
  pub fn start(&mut self) {
    if self.phase == Phase::Ready {
      info!("Game started");
      self.phase = Phase::Running;
    }
  }

  /// Clear every entity, reset scalars and start running again.
  pub fn restart(&mut self) {
    info!("Game restarted after score {}", self.score);
    self.score = 0;
    self.speed = self.config.initial_speed;
    self.distance = 0.0;
    self.camera_x = 0.0;
    self.player = Player::default();
    self.obstacles.clear();
    self.coins.clear();
    self.controls.reset();
    self.phase = Phase::Running;
  }

  pub fn press(&mut self, action: Action) {
    self.controls.press(action);
  }

  /// Advance one frame. Only does work while running.
  pub fn tick<R: Rng>(&mut self, rng: &mut R) -> TickReport {
    let mut report = TickReport::default();
    if self.phase != Phase::Running {
      return report;
    }

    self.update_player();
    report.spawned_obstacle = self.spawn_obstacle(rng);
    report.spawned_coin = self.spawn_coin(rng);

    if self.update_obstacles() {
      report.crashed = true;
      self.phase = Phase::GameOver;
      info!("Game over with score {}", self.score);
      return report;
    }

    report.coins_collected = self.update_coins();
    self.update_camera();
    self.update_score();
    self.distance += self.speed;

    report
  }

  fn update_player(&mut self) {
    if self.controls.left {
      self.player.move_left();
    }
    if self.controls.right {
      self.player.move_right();
    }
    if self.controls.jump {
      self.player.jump(self.config.jump_velocity);
    }
    // Presses last one frame; blocked ones are dropped
    self.controls.reset();

    self.player.update(self.config.gravity);
  }

  fn spawn_obstacle<R: Rng>(&mut self, rng: &mut R) -> bool {
    if !rng.gen_bool(self.config.obstacle_chance) {
      return false;
    }
    let lane = rng.gen_range(MIN_LANE..=MAX_LANE);
    self.obstacles.push(Obstacle::new(lane, SPAWN_Z));
    true
  }

  fn spawn_coin<R: Rng>(&mut self, rng: &mut R) -> bool {
    if !rng.gen_bool(self.config.coin_chance) {
      return false;
    }
    let lane = rng.gen_range(MIN_LANE..=MAX_LANE);
    self.coins.push(Coin::new(lane, SPAWN_Z));
    true
  }

  /// Move obstacles forward. Returns true if one hit the player.
  fn update_obstacles(&mut self) -> bool {
    // Backwards so swap_remove only moves already-visited entries
    for i in (0..self.obstacles.len()).rev() {
      self.obstacles[i].position.z += self.speed;

      if self.obstacles[i].position.z > DESPAWN_Z {
        self.obstacles.swap_remove(i);
        continue;
      }

      if self.touches_player(self.obstacles[i].position) {
        return true;
      }
    }
    false
  }

  /// Move coins forward and collect the ones the player touches.
  fn update_coins(&mut self) -> u32 {
    let mut collected = 0;

    for i in (0..self.coins.len()).rev() {
      self.coins[i].advance(self.speed);

      if self.coins[i].position.z > DESPAWN_Z {
        self.coins.swap_remove(i);
        continue;
      }

      if self.touches_player(self.coins[i].position) {
        self.score += self.config.coin_value;
        self.coins.swap_remove(i);
        collected += 1;
      }
    }

    collected
  }

  fn touches_player(&self, position: glam::Vec3) -> bool {
    position.distance(self.player.position) < COLLISION_RADIUS
  }

  fn update_camera(&mut self) {
    let target_x = self.player.position.x * CAMERA_FOLLOW;
    self.camera_x += (target_x - self.camera_x) * CAMERA_LERP;
  }

  fn update_score(&mut self) {
    self.score += 1;
    self.speed = (self.config.initial_speed + self.score as f32 * self.config.acceleration)
      .min(self.config.max_speed);
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn score(&self) -> u64 {
    self.score
  }

  pub fn speed(&self) -> f32 {
    self.speed
  }

  pub fn distance(&self) -> f32 {
    self.distance
  }

  pub fn camera_x(&self) -> f32 {
    self.camera_x
  }

  pub fn player(&self) -> &Player {
    &self.player
  }

  pub fn obstacles(&self) -> &[Obstacle] {
    &self.obstacles
  }

  pub fn coins(&self) -> &[Coin] {
    &self.coins
  }

  #[cfg(test)]
  fn place_obstacle(&mut self, lane: i8, z: f32) {
    self.obstacles.push(Obstacle::new(lane, z));
  }

  #[cfg(test)]
  fn place_coin(&mut self, lane: i8, z: f32) {
    self.coins.push(Coin::new(lane, z));
  }
}
