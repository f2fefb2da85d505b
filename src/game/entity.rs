use glam::Vec3;

/// Horizontal distance between lane centers.
pub const LANE_WIDTH: f32 = 2.0;
pub const MIN_LANE: i8 = -1;
pub const MAX_LANE: i8 = 1;

/// Player depth; the player never moves along z.
pub const PLAYER_Z: f32 = 5.0;
/// Height of the player's center when standing.
pub const PLAYER_BASE_Y: f32 = 0.8;
/// Fraction of the remaining distance to the target lane covered each frame.
const PLAYER_LERP: f32 = 0.1;

pub const OBSTACLE_Y: f32 = 1.0;
pub const COIN_Y: f32 = 1.5;
/// Radians a coin turns per frame.
const COIN_SPIN: f32 = 0.1;

/// x offset of a lane's center.
pub fn lane_x(lane: i8) -> f32 {
  f32::from(lane) * LANE_WIDTH
}

/// The single player entity.
#[derive(Debug, Clone)]
pub struct Player {
  pub lane: i8,
  pub position: Vec3,
  /// Height above the ground from jumping
  pub jump_height: f32,
  pub jump_velocity: f32,
  pub jumping: bool,
}

impl Default for Player {
  fn default() -> Self {
    Self {
      lane: 0,
      position: Vec3::new(0.0, PLAYER_BASE_Y, PLAYER_Z),
      jump_height: 0.0,
      jump_velocity: 0.0,
      jumping: false,
    }
  }
}

impl Player {
  pub fn move_left(&mut self) -> bool {
    if self.lane > MIN_LANE {
      self.lane -= 1;
      true
    } else {
      false
    }
  }

  pub fn move_right(&mut self) -> bool {
    if self.lane < MAX_LANE {
      self.lane += 1;
      true
    } else {
      false
    }
  }

  /// Start a jump. Ignored while airborne.
  pub fn jump(&mut self, velocity: f32) -> bool {
    if self.jumping {
      return false;
    }
    self.jumping = true;
    self.jump_velocity = velocity;
    true
  }

  /// Advance jump physics one frame and ease toward the current lane.
  pub fn update(&mut self, gravity: f32) {
    if self.jumping {
      self.jump_height += self.jump_velocity;
      self.jump_velocity += gravity;

      if self.jump_height <= 0.0 {
        self.jump_height = 0.0;
        self.jumping = false;
        self.jump_velocity = 0.0;
      }
    }

    let target_x = lane_x(self.lane);
    self.position.x += (target_x - self.position.x) * PLAYER_LERP;
    self.position.y = PLAYER_BASE_Y + self.jump_height;
  }
}

#[derive(Debug, Clone)]
pub struct Obstacle {
  pub position: Vec3,
}

impl Obstacle {
  pub fn new(lane: i8, z: f32) -> Self {
    Self {
      position: Vec3::new(lane_x(lane), OBSTACLE_Y, z),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Coin {
  pub position: Vec3,
  /// Rotation about the vertical axis, for the spin animation
  pub spin: f32,
}

impl Coin {
  pub fn new(lane: i8, z: f32) -> Self {
    Self {
      position: Vec3::new(lane_x(lane), COIN_Y, z),
      spin: 0.0,
    }
  }

  pub fn advance(&mut self, dz: f32) {
    self.position.z += dz;
    self.spin = (self.spin + COIN_SPIN) % std::f32::consts::TAU;
  }
}
