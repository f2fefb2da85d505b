//! Top-down view of the road. World x maps to canvas x, world z is flipped
//! so approaching entities move down the screen toward the player.

use crate::game::entity::{lane_x, MAX_LANE, MIN_LANE};
use crate::game::world::{DESPAWN_Z, SPAWN_Z};
use crate::game::Game;
use ratatui::prelude::*;
use ratatui::symbols::Marker;
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Rectangle};
use ratatui::widgets::{Block, Borders};

const ROAD_HALF_WIDTH: f64 = 3.0;
/// Visible width beyond the road edge on each side
const VERGE: f64 = 1.0;
const DASH_SPACING: f32 = 4.0;
const DASH_LENGTH: f64 = 2.0;

const ROAD_EDGE: Color = Color::Rgb(0x90, 0xEE, 0x90);
const DIVIDER: Color = Color::White;
const PLAYER: Color = Color::Rgb(0xFF, 0x6B, 0x6B);
const OBSTACLE: Color = Color::Rgb(0x8B, 0x45, 0x13);
const COIN: Color = Color::Rgb(0xFF, 0xD7, 0x00);

/// Canvas y for a world z.
fn canvas_y(z: f32) -> f64 {
  -f64::from(z)
}

/// Horizontal canvas bounds, following the camera.
pub fn x_bounds(camera_x: f32) -> [f64; 2] {
  let cx = f64::from(camera_x);
  [
    cx - ROAD_HALF_WIDTH - VERGE,
    cx + ROAD_HALF_WIDTH + VERGE,
  ]
}

pub fn y_bounds() -> [f64; 2] {
  [canvas_y(DESPAWN_Z), canvas_y(SPAWN_Z)]
}

/// Canvas y ranges of the lane divider dashes, scrolled by distance travelled.
pub fn divider_dashes(distance: f32) -> Vec<(f64, f64)> {
  let offset = distance.rem_euclid(DASH_SPACING);
  let [bottom, top] = y_bounds();

  let mut dashes = Vec::new();
  let mut z = SPAWN_Z - DASH_SPACING + offset;
  while z <= DESPAWN_Z + DASH_SPACING {
    let center = canvas_y(z);
    let start = (center - DASH_LENGTH / 2.0).max(bottom);
    let end = (center + DASH_LENGTH / 2.0).min(top);
    if start < end {
      dashes.push((start, end));
    }
    z += DASH_SPACING;
  }
  dashes
}

/// Visible coin width for its spin, a thin edge when seen side-on.
pub fn coin_width(spin: f32) -> f64 {
  0.6 * f64::from(spin.cos().abs()).max(0.15)
}

pub fn draw_road(frame: &mut Frame, area: Rect, game: &Game) {
  let block = Block::default()
    .borders(Borders::LEFT | Borders::RIGHT)
    .border_style(Style::default().fg(Color::DarkGray));

  let dashes = divider_dashes(game.distance());
  let [bottom, top] = y_bounds();

  let canvas = Canvas::default()
    .block(block)
    .marker(Marker::Braille)
    .x_bounds(x_bounds(game.camera_x()))
    .y_bounds(y_bounds())
    .paint(|ctx| {
      // Road edges
      for x in [-ROAD_HALF_WIDTH, ROAD_HALF_WIDTH] {
        ctx.draw(&CanvasLine::new(x, bottom, x, top, ROAD_EDGE));
      }

      // Lane dividers sit halfway between lane centers
      for lane in MIN_LANE..MAX_LANE {
        let x = f64::from(lane_x(lane) + lane_x(lane + 1)) / 2.0;
        for (start, end) in &dashes {
          ctx.draw(&CanvasLine::new(x, *start, x, *end, DIVIDER));
        }
      }
      ctx.layer();

      for obstacle in game.obstacles() {
        let p = obstacle.position;
        ctx.draw(&Rectangle {
          x: f64::from(p.x) - 0.5,
          y: canvas_y(p.z) - 0.5,
          width: 1.0,
          height: 1.0,
          color: OBSTACLE,
        });
      }

      for coin in game.coins() {
        let p = coin.position;
        let width = coin_width(coin.spin);
        ctx.draw(&Rectangle {
          x: f64::from(p.x) - width / 2.0,
          y: canvas_y(p.z) - 0.15,
          width,
          height: 0.3,
          color: COIN,
        });
      }

      // Airborne players look bigger, as if closer to the camera
      let player = game.player();
      let scale = 1.0 + f64::from(player.jump_height) * 0.15;
      let size = 0.8 * scale;
      ctx.draw(&Rectangle {
        x: f64::from(player.position.x) - size / 2.0,
        y: canvas_y(player.position.z) - size / 2.0,
        width: size,
        height: size,
        color: PLAYER,
      });
    });

  frame.render_widget(canvas, area);
}
