use crate::models::{Position, Rect, ScrollDirection};

/// Distance kept between the tracked pointer and the chat area's edges.
pub const EDGE_MARGIN: i32 = 50;

/// Estimated pointer position inside the chat area.
#[derive(Debug, Clone, Default)]
pub struct PositionModel {
    current: Option<Position>,
}

impl PositionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Position> {
        self.current
    }

    pub fn set(&mut self, position: Position) {
        self.current = Some(position);
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Project the pointer after scrolling `distance` in `direction`.
    ///
    /// Scrolling up moves the estimate down by half the distance, scrolling
    /// down moves it up. `bounds` is the chat area as of now; when present the
    /// result is kept `EDGE_MARGIN` inside it.
    pub fn advance(
        &mut self,
        direction: ScrollDirection,
        distance: i32,
        bounds: Option<Rect>,
    ) -> Option<Position> {
        let Position { x, mut y } = self.current?;
        match direction {
            ScrollDirection::Up => y += distance / 2,
            ScrollDirection::Down => y -= distance / 2,
        }

        let projected = match bounds {
            Some(area) => clamp_to_area(Position::new(x, y), area, EDGE_MARGIN),
            None => Position::new(x, y),
        };
        self.current = Some(projected);
        self.current
    }
}

/// Keep `position` at least `margin` inside `area`. When the area is too
/// small for the margin the lower bound wins.
pub fn clamp_to_area(position: Position, area: Rect, margin: i32) -> Position {
    let fit = |value: i32, start: i32, extent: i32| {
        value.min(start + extent - margin).max(start + margin)
    };
    Position::new(
        fit(position.x, area.x, area.width),
        fit(position.y, area.y, area.height),
    )
}
