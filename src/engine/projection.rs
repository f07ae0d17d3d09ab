//! View-model projection. Maps tiles to screen percentages; nothing here
//! feeds back into scoring.

use super::chart::{TileEvent, TileStatus};
use super::Phase;

/// Vertical layout parameters, all in percent of the playfield height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projector {
    pub lane_count: usize,
    /// Position of a tile whose time equals `elapsed`.
    pub hit_line: f64,
    /// Playfield heights travelled per second of song time.
    pub approach_speed: f64,
    pub visible_min: f64,
    pub visible_max: f64,
    /// Tiles closer than this (seconds) are drawn fully opaque.
    pub imminent_threshold: f64,
}

/// One visible tile of a frame snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct TileView<'a> {
    pub index: usize,
    pub lane: usize,
    /// Left edge and width in percent of the playfield width.
    pub x_percent: f64,
    pub width_percent: f64,
    /// Top edge in percent of the playfield height.
    pub y_percent: f64,
    /// Length of a hold tail above the head; 0 for taps.
    pub tail_percent: f64,
    pub label: Option<&'a str>,
    pub status: TileStatus,
    pub imminent: bool,
}

impl Projector {
    /// `hit_line` when the tile is due, earlier tiles sit above it.
    pub fn position(&self, tile_time: f64, elapsed: f64) -> f64 {
        let time_until_hit = tile_time - elapsed;
        self.hit_line - time_until_hit * 100.0 * self.approach_speed
    }

    /// True when the span `top..=bottom` overlaps the visible range.
    pub fn is_visible(&self, top: f64, bottom: f64) -> bool {
        bottom >= self.visible_min && top <= self.visible_max
    }

    /// Projects one tile, or `None` when it was hit (hidden) or lies outside
    /// the visible range.
    pub fn project<'a>(
        &self,
        index: usize,
        event: &'a TileEvent,
        status: TileStatus,
        elapsed: f64,
    ) -> Option<TileView<'a>> {
        if status == TileStatus::Hit {
            return None;
        }
        let y = self.position(event.time, elapsed);
        let tail = event.kind.hold_duration() * 100.0 * self.approach_speed;
        // Holds stay on screen while any part of the tail is visible.
        if !self.is_visible(y - tail, y) {
            return None;
        }
        let lane_width = 100.0 / self.lane_count.max(1) as f64;
        Some(TileView {
            index,
            lane: event.lane,
            x_percent: event.lane as f64 * lane_width + lane_width * 0.08,
            width_percent: lane_width * 0.84,
            y_percent: y,
            tail_percent: tail,
            label: event.label.as_deref(),
            status,
            imminent: event.time - elapsed < self.imminent_threshold,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Feedback {
    text: &'static str,
    shown_at: f64,
}

/// Single transient feedback line ("Perfect!", "Miss") that clears itself
/// after a fixed duration of song time.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackSlot {
    duration: f64,
    current: Option<Feedback>,
}

impl FeedbackSlot {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            current: None,
        }
    }

    pub fn show(&mut self, text: &'static str, at: f64) {
        self.current = Some(Feedback { text, shown_at: at });
    }

    pub fn expire(&mut self, now: f64) {
        if self.current.is_some_and(|f| now - f.shown_at >= self.duration) {
            self.current = None;
        }
    }

    pub fn text(&self) -> Option<&'static str> {
        self.current.map(|f| f.text)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Read-only per-frame view handed to the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<'a> {
    pub phase: Phase,
    pub elapsed: f64,
    pub score: u64,
    pub combo: u32,
    pub max_streak: u32,
    pub lane_count: usize,
    pub tiles: Vec<TileView<'a>>,
    pub feedback: Option<&'static str>,
}
