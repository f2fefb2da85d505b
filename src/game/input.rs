/// A steering action the player can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Left,
  Right,
  Jump,
}

/// Latched controls. A press sets its flag until the next frame consumes it.
///
/// Blocked actions (left at the leftmost lane, jump while airborne) are
/// dropped at the end of that frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
  pub left: bool,
  pub right: bool,
  pub jump: bool,
}

impl Controls {
  pub fn press(&mut self, action: Action) {
    match action {
      Action::Left => self.left = true,
      Action::Right => self.right = true,
      Action::Jump => self.jump = true,
    }
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}
