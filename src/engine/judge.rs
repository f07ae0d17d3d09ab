//! Hit resolution: picks the pending tile a lane press lands on, classifies
//! the timing error, and sweeps tiles whose window has closed.

use super::chart::{Chart, RuntimeTile, TileStatus};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Judgement {
    Perfect,
    Good,
    Miss,
}

impl Judgement {
    /// Text shown in the transient feedback slot.
    pub fn feedback_text(self) -> &'static str {
        match self {
            Judgement::Perfect => "Perfect!",
            Judgement::Good => "Good",
            Judgement::Miss => "Miss",
        }
    }
}

/// Timing tolerances in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitWindow {
    /// Largest `|tile.time - elapsed|` that still counts as a hit.
    pub hit_window: f64,
    /// Errors strictly below this are `Perfect`.
    pub perfect_threshold: f64,
}

impl HitWindow {
    pub fn classify(&self, error: f64) -> Option<Judgement> {
        if error > self.hit_window {
            None
        } else if error < self.perfect_threshold {
            Some(Judgement::Perfect)
        } else {
            Some(Judgement::Good)
        }
    }

    /// Late by more than the window. Uses the same `elapsed - time`
    /// difference a press measures, so a tile can never be both unhittable
    /// and still pending.
    pub fn is_expired(&self, tile_time: f64, elapsed: f64) -> bool {
        elapsed - tile_time > self.hit_window
    }
}

/// Tile chosen by a press.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub error: f64,
    pub judgement: Judgement,
}

/// Per-round lookup structures over a chart: tile indices grouped by lane (in
/// time order) and a cursor for the expiry sweep.
#[derive(Clone, Debug)]
pub struct Judge {
    window: HitWindow,
    lanes: Vec<Vec<usize>>,
    sweep_head: usize,
}

impl Judge {
    pub fn new(chart: &Chart, lane_count: usize, window: HitWindow) -> Self {
        let mut lanes = vec![Vec::new(); lane_count];
        for (idx, event) in chart.events().iter().enumerate() {
            if let Some(lane) = lanes.get_mut(event.lane) {
                lane.push(idx);
            }
        }
        Self {
            window,
            lanes,
            sweep_head: 0,
        }
    }

    pub fn window(&self) -> HitWindow {
        self.window
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Nearest pending tile in `lane` within the hit window. Ties go to the
    /// earliest scheduled tile. `None` is a whiff (or an unknown lane).
    pub fn select(
        &self,
        chart: &Chart,
        tiles: &[RuntimeTile],
        lane: usize,
        elapsed: f64,
    ) -> Option<Selection> {
        let candidates = self.lanes.get(lane)?;
        let mut best: Option<(usize, f64)> = None;
        for &idx in candidates {
            if !tiles[idx].status.is_pending() {
                continue;
            }
            let time = chart.events()[idx].time;
            // Lane indices are time-ordered; nothing later can be closer.
            if time - elapsed > self.window.hit_window {
                break;
            }
            let error = (elapsed - time).abs();
            if best.is_none_or(|(_, best_err)| error < best_err) {
                best = Some((idx, error));
            }
        }
        let (index, error) = best?;
        let judgement = self.window.classify(error)?;
        Some(Selection {
            index,
            error,
            judgement,
        })
    }

    /// Marks every pending tile whose window closed before `elapsed` as
    /// missed and returns their indices in chart order.
    pub fn sweep(&mut self, chart: &Chart, tiles: &mut [RuntimeTile], elapsed: f64) -> Vec<usize> {
        let mut missed = Vec::new();
        let events = chart.events();
        while self.sweep_head < events.len() {
            let idx = self.sweep_head;
            if !tiles[idx].status.is_pending() {
                self.sweep_head += 1;
                continue;
            }
            if !self.window.is_expired(events[idx].time, elapsed) {
                break;
            }
            tiles[idx].resolve(TileStatus::Missed);
            missed.push(idx);
            self.sweep_head += 1;
        }
        missed
    }

    /// Marks every remaining pending tile missed regardless of time.
    pub fn sweep_all(&mut self, tiles: &mut [RuntimeTile]) -> Vec<usize> {
        let missed: Vec<usize> = tiles
            .iter_mut()
            .filter_map(|t| t.resolve(TileStatus::Missed).then_some(t.index))
            .collect();
        self.sweep_head = tiles.len();
        missed
    }
}
