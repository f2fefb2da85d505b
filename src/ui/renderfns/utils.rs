use ratatui::prelude::Rect;

/// A rectangle of at most `width` x `height` centered in `area`
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_centered_rect() {
    let area = Rect::new(0, 1, 80, 24);
    assert_eq!(centered_rect(40, 6, area), Rect::new(20, 10, 40, 6));
  }

  #[test]
  fn test_centered_rect_clamps_to_area() {
    let area = Rect::new(2, 2, 10, 4);
    assert_eq!(centered_rect(40, 6, area), area);
  }
}
