// View - Pixel geometry for the arrangement view

use crate::sequencer::block::LaneId;
use crate::sequencer::time::{Tick, TimeRange};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in view pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// How blocks that touch visually are drawn within a lane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stacking {
    /// Every block takes the full lane height
    #[default]
    Flat,
    /// Half-height rows; a block that visually runs into its predecessor
    /// drops to the second row
    AvoidOverlap,
}

/// Mapping from timeline coordinates to view pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Horizontal zoom
    pub pixels_per_quarter: f32,
    /// Horizontal scroll in pixels
    pub scroll_x: f32,
    pub lane_height: f32,
    /// Gap between lanes
    pub lane_spacing: f32,
    /// Blocks are never drawn narrower than this
    pub min_block_width: f32,
    pub stacking: Stacking,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            pixels_per_quarter: 64.0,
            scroll_x: 0.0,
            lane_height: 48.0,
            lane_spacing: 4.0,
            min_block_width: 6.0,
            stacking: Stacking::Flat,
        }
    }
}

impl ViewTransform {
    /// Unscrolled x of a timeline position
    pub fn tick_to_x(&self, tick: Tick) -> f32 {
        tick.0 as f32 / Tick::PER_QUARTER as f32 * self.pixels_per_quarter
    }

    /// Timeline position under an unscrolled x, clamped at zero
    pub fn x_to_tick(&self, x: f32) -> Tick {
        if x <= 0.0 || self.pixels_per_quarter <= 0.0 {
            return Tick::ZERO;
        }
        Tick((x / self.pixels_per_quarter * Tick::PER_QUARTER as f32).round() as u64)
    }

    pub fn lane_top(&self, lane: LaneId) -> f32 {
        lane as f32 * (self.lane_height + self.lane_spacing)
    }

    /// Lanes whose band intersects `[top, bottom)`
    pub fn lanes_between(&self, top: f32, bottom: f32) -> std::ops::RangeInclusive<LaneId> {
        let pitch = self.lane_height + self.lane_spacing;
        let first = (top.max(0.0) / pitch).floor() as LaneId;
        let last = (bottom.max(0.0) / pitch).floor() as LaneId;
        first..=last
    }

    /// Timeline span covered by the visible pixel columns `[left, right)`
    pub fn visible_range(&self, left: f32, right: f32) -> TimeRange {
        let start = self.x_to_tick(left + self.scroll_x);
        let end = self.x_to_tick(right + self.scroll_x);
        TimeRange::new(start, Tick(end.0.saturating_add(1)))
    }

    pub fn row_height(&self) -> f32 {
        match self.stacking {
            Stacking::Flat => self.lane_height,
            Stacking::AvoidOverlap => self.lane_height / 2.0,
        }
    }

    /// Whether switching to `other` moves cached geometry.
    /// Scrolling alone does not; rects are cached unscrolled.
    pub fn geometry_differs(&self, other: &ViewTransform) -> bool {
        self.pixels_per_quarter != other.pixels_per_quarter
            || self.lane_height != other.lane_height
            || self.lane_spacing != other.lane_spacing
            || self.min_block_width != other.min_block_width
            || self.stacking != other.stacking
    }
}
