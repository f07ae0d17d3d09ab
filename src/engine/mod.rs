//! Rhythm engine: owns the song clock, runtime tiles and score state of one
//! round and advances them from explicit ticks and lane presses.
//!
//! The engine never schedules anything itself. A driver (the browser loop in
//! `driver`, or a test feeding synthetic time) calls [`Round::tick`] or
//! [`Round::advance`] once per frame and queues presses in between; each frame
//! first sweeps expired tiles at the frame's `elapsed`, then resolves the
//! queued presses in arrival order at that same `elapsed`.

pub mod chart;
pub mod clock;
pub mod judge;
pub mod projection;
pub mod score;

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info};

use crate::config::EngineConfig;
use chart::{Chart, RuntimeTile, TileStatus};
use clock::GameClock;
use judge::{Judge, Judgement};
use projection::{FeedbackSlot, Projector, Snapshot};
use score::{RoundResult, ScoreState, ScoringRules};

/// Round lifecycle. `Ended` is terminal; replaying builds a fresh round.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
    Ended,
}

/// What a single lane press did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PressOutcome {
    Judged {
        index: usize,
        judgement: Judgement,
        error: f64,
        awarded: u64,
    },
    /// No pending tile in range; deliberately not a miss.
    Whiff,
    InvalidLane,
    NotRunning,
}

/// Notable state changes produced while processing a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum RoundEvent {
    Judged {
        index: usize,
        lane: usize,
        judgement: Judgement,
        error: f64,
        awarded: u64,
    },
    Missed {
        index: usize,
        lane: usize,
    },
    Ended(RoundResult),
}

#[derive(Clone, Debug)]
pub struct Round {
    chart: Rc<Chart>,
    config: EngineConfig,
    rules: ScoringRules,
    projector: Projector,
    phase: Phase,
    clock: GameClock,
    tiles: Vec<RuntimeTile>,
    pending: usize,
    judge: Judge,
    score: ScoreState,
    feedback: FeedbackSlot,
    inputs: VecDeque<usize>,
    result: Option<RoundResult>,
}

impl Round {
    pub fn new(chart: Rc<Chart>, config: EngineConfig) -> Self {
        let judge = Judge::new(&chart, config.lane_count, config.hit_window());
        let tiles: Vec<RuntimeTile> = (0..chart.len()).map(RuntimeTile::new).collect();
        Self {
            rules: config.scoring(),
            projector: config.projector(),
            feedback: FeedbackSlot::new(config.feedback_duration),
            pending: tiles.len(),
            tiles,
            judge,
            chart,
            config,
            phase: Phase::Idle,
            clock: GameClock::new(),
            score: ScoreState::default(),
            inputs: VecDeque::new(),
            result: None,
        }
    }

    /// Fresh idle round over the same chart and config.
    pub fn replay(&self) -> Self {
        Self::new(Rc::clone(&self.chart), self.config.clone())
    }

    /// `Idle -> Running`: resets tiles, score and clock. Returns false from
    /// any other phase.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            debug!("start ignored in phase {:?}", self.phase);
            return false;
        }
        self.tiles = (0..self.chart.len()).map(RuntimeTile::new).collect();
        self.pending = self.tiles.len();
        self.judge = Judge::new(&self.chart, self.config.lane_count, self.config.hit_window());
        self.score = ScoreState::default();
        self.feedback.clear();
        self.inputs.clear();
        self.result = None;
        self.clock.start();
        self.phase = Phase::Running;
        info!("round started with {} tiles", self.chart.len());
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.clock.pause();
        self.inputs.clear();
        self.phase = Phase::Paused;
        info!("round paused at {:.3}s", self.clock.elapsed());
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.phase != Phase::Paused {
            return false;
        }
        self.clock.resume();
        self.phase = Phase::Running;
        info!("round resumed at {:.3}s", self.clock.elapsed());
        true
    }

    /// Queues a press to be resolved on the next frame.
    pub fn queue_press(&mut self, lane: usize) {
        if self.phase == Phase::Running {
            self.inputs.push_back(lane);
        }
    }

    /// Resolves a press immediately against the current `elapsed`.
    pub fn press(&mut self, lane: usize) -> PressOutcome {
        let (outcome, _) = self.resolve_press(lane);
        outcome
    }

    /// Wall-clock driven frame (`now` in seconds).
    pub fn tick(&mut self, now: f64) -> Vec<RoundEvent> {
        if self.phase == Phase::Running {
            self.clock.tick(now);
        }
        self.process_frame()
    }

    /// Delta driven frame (`delta` in seconds).
    pub fn advance(&mut self, delta: f64) -> Vec<RoundEvent> {
        if self.phase == Phase::Running {
            self.clock.advance(delta);
        }
        self.process_frame()
    }

    /// Forces the round to end now (e.g. the backing track finished): every
    /// pending tile counts as missed. The result is returned only by the call
    /// that actually ends the round; an idle or already ended round yields
    /// `None`.
    pub fn finish(&mut self) -> (Vec<RoundEvent>, Option<RoundResult>) {
        let mut events = Vec::new();
        if !matches!(self.phase, Phase::Running | Phase::Paused) {
            return (events, None);
        }
        let missed = self.judge.sweep_all(&mut self.tiles);
        self.record_misses(&missed, &mut events);
        self.end(&mut events);
        (events, self.result.clone())
    }

    fn process_frame(&mut self) -> Vec<RoundEvent> {
        let mut events = Vec::new();
        if self.phase != Phase::Running {
            return events;
        }
        let elapsed = self.clock.elapsed();

        let missed = self.judge.sweep(&self.chart, &mut self.tiles, elapsed);
        self.record_misses(&missed, &mut events);

        while let Some(lane) = self.inputs.pop_front() {
            if let (_, Some(event)) = self.resolve_press(lane) {
                events.push(event);
            }
        }

        self.feedback.expire(elapsed);

        if self.pending == 0 && elapsed >= self.chart.end_time() {
            self.end(&mut events);
        }
        events
    }

    fn resolve_press(&mut self, lane: usize) -> (PressOutcome, Option<RoundEvent>) {
        if self.phase != Phase::Running {
            return (PressOutcome::NotRunning, None);
        }
        if lane >= self.config.lane_count {
            debug!("press on unknown lane {lane} ignored");
            return (PressOutcome::InvalidLane, None);
        }
        let elapsed = self.clock.elapsed();
        let Some(sel) = self.judge.select(&self.chart, &self.tiles, lane, elapsed) else {
            return (PressOutcome::Whiff, None);
        };
        if !self.tiles[sel.index].resolve(TileStatus::Hit) {
            return (PressOutcome::Whiff, None);
        }
        self.pending -= 1;
        let awarded = self.score.apply_hit(sel.judgement, &self.rules);
        self.feedback.show(sel.judgement.feedback_text(), elapsed);
        debug!(
            "lane {lane} tile #{} {:?} (error {:.3}s, +{awarded})",
            sel.index, sel.judgement, sel.error
        );
        let outcome = PressOutcome::Judged {
            index: sel.index,
            judgement: sel.judgement,
            error: sel.error,
            awarded,
        };
        let event = RoundEvent::Judged {
            index: sel.index,
            lane,
            judgement: sel.judgement,
            error: sel.error,
            awarded,
        };
        (outcome, Some(event))
    }

    fn record_misses(&mut self, missed: &[usize], events: &mut Vec<RoundEvent>) {
        if missed.is_empty() {
            return;
        }
        for &index in missed {
            self.pending -= 1;
            self.score.apply_miss();
            events.push(RoundEvent::Missed {
                index,
                lane: self.chart.events()[index].lane,
            });
        }
        self.feedback
            .show(Judgement::Miss.feedback_text(), self.clock.elapsed());
        debug!("{} tile(s) missed at {:.3}s", missed.len(), self.clock.elapsed());
    }

    fn end(&mut self, events: &mut Vec<RoundEvent>) {
        self.clock.pause();
        self.inputs.clear();
        self.phase = Phase::Ended;
        let result = RoundResult::from_state(&self.score, self.chart.len());
        info!(
            "round ended: score {} accuracy {}% stars {} streak {} full combo {}",
            result.score, result.accuracy, result.stars, result.max_streak, result.is_full_combo
        );
        self.result = Some(result.clone());
        events.push(RoundEvent::Ended(result));
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        let elapsed = self.clock.elapsed();
        let tiles = self
            .tiles
            .iter()
            .filter_map(|t| {
                self.projector
                    .project(t.index, &self.chart.events()[t.index], t.status, elapsed)
            })
            .collect();
        Snapshot {
            phase: self.phase,
            elapsed,
            score: self.score.score,
            combo: self.score.combo,
            max_streak: self.score.max_streak,
            lane_count: self.config.lane_count,
            tiles,
            feedback: self.feedback.text(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    pub fn tiles(&self) -> &[RuntimeTile] {
        &self.tiles
    }

    pub fn status(&self, index: usize) -> Option<TileStatus> {
        self.tiles.get(index).map(|t| t.status)
    }

    pub fn chart(&self) -> &Rc<Chart> {
        &self.chart
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn result(&self) -> Option<&RoundResult> {
        self.result.as_ref()
    }

    pub fn feedback(&self) -> Option<&'static str> {
        self.feedback.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart::TileEvent;

    fn round(events: Vec<TileEvent>) -> Round {
        Round::new(Rc::new(Chart::new(events)), EngineConfig::default())
    }

    fn running(events: Vec<TileEvent>) -> Round {
        let mut r = round(events);
        assert!(r.start());
        r
    }

    #[test]
    fn lifecycle_transitions() {
        let mut r = round(vec![TileEvent::tap(1.0, 0)]);
        assert!(!r.pause());
        assert!(!r.resume());
        assert!(r.start());
        assert!(!r.start());
        assert!(r.pause());
        assert!(!r.pause());
        assert_eq!(r.phase(), Phase::Paused);
        assert!(r.resume());
        assert_eq!(r.phase(), Phase::Running);
    }

    #[test]
    fn press_outside_running_is_ignored() {
        let mut r = round(vec![TileEvent::tap(0.0, 0)]);
        assert_eq!(r.press(0), PressOutcome::NotRunning);
        r.start();
        r.pause();
        assert_eq!(r.press(0), PressOutcome::NotRunning);
        assert_eq!(r.status(0), Some(TileStatus::Pending));
    }

    #[test]
    fn invalid_lane_is_a_noop() {
        let mut r = running(vec![TileEvent::tap(0.0, 0)]);
        assert_eq!(r.press(4), PressOutcome::InvalidLane);
        assert_eq!(r.score(), &ScoreState::default());
    }

    #[test]
    fn paused_frames_do_not_sweep_or_consume_input() {
        let mut r = running(vec![TileEvent::tap(0.5, 0)]);
        r.advance(0.4);
        r.pause();
        assert!(r.advance(10.0).is_empty());
        assert_eq!(r.elapsed(), 0.4);
        r.queue_press(0);
        r.resume();
        r.advance(0.1);
        assert_eq!(r.score().score, 0);
        assert_eq!(r.status(0), Some(TileStatus::Pending));
    }

    #[test]
    fn queued_presses_resolve_in_arrival_order() {
        let mut r = running(vec![TileEvent::tap(1.0, 0), TileEvent::tap(1.1, 0)]);
        r.advance(1.02);
        r.queue_press(0);
        r.queue_press(0);
        r.queue_press(0);
        let events = r.advance(0.0);
        let indices: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                RoundEvent::Judged { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(r.score().combo, 2);
    }

    #[test]
    fn sweep_runs_before_queued_presses() {
        let mut r = running(vec![TileEvent::tap(1.0, 0), TileEvent::tap(1.3, 0)]);
        r.advance(1.1);
        r.queue_press(0);
        let events = r.advance(0.15);
        assert!(matches!(events[0], RoundEvent::Missed { index: 0, .. }));
        assert!(matches!(events[1], RoundEvent::Judged { index: 1, .. }));
        assert_eq!(r.score().counts.miss, 1);
        assert_eq!(r.score().combo, 1);
    }

    #[test]
    fn round_ends_once_all_tiles_resolve_and_chart_is_consumed() {
        let mut r = running(vec![TileEvent::tap(1.0, 0), TileEvent::tap(1.0, 1)]);
        r.advance(0.9);
        r.press(0);
        r.press(1);
        assert_eq!(r.phase(), Phase::Running);
        let events = r.advance(0.2);
        assert!(matches!(events.last(), Some(RoundEvent::Ended(_))));
        let result = r.result().unwrap();
        assert_eq!(result.accuracy, 100);
        assert!(result.is_full_combo);
        assert_eq!(r.phase(), Phase::Ended);
        assert!(r.advance(5.0).is_empty());
        assert!(!r.start());
    }

    #[test]
    fn finish_sweeps_remaining_tiles() {
        let mut r = running(vec![TileEvent::tap(1.0, 0), TileEvent::tap(5.0, 2)]);
        r.advance(1.0);
        r.press(0);
        let (events, result) = r.finish();
        let result = result.unwrap();
        assert_eq!(result.counts.miss, 1);
        assert_eq!(result.accuracy, 50);
        assert!(!result.is_full_combo);
        assert!(matches!(events[0], RoundEvent::Missed { index: 1, lane: 2 }));
        assert_eq!(r.finish().0, Vec::new());
    }

    #[test]
    fn finish_after_natural_end_yields_nothing() {
        let mut r = running(vec![TileEvent::tap(0.5, 0)]);
        r.advance(0.5);
        r.press(0);
        assert!(matches!(r.advance(0.1).last(), Some(RoundEvent::Ended(_))));
        let (events, result) = r.finish();
        assert!(events.is_empty());
        assert_eq!(result, None);
        assert_eq!(r.result().map(|res| res.score), Some(100));

        let mut idle = round(vec![TileEvent::tap(0.5, 0)]);
        assert_eq!(idle.finish(), (Vec::new(), None));
        assert_eq!(idle.phase(), Phase::Idle);
    }

    #[test]
    fn empty_chart_ends_on_first_frame() {
        let mut r = running(Vec::new());
        let events = r.advance(0.0);
        let RoundEvent::Ended(result) = &events[0] else {
            panic!("expected end, got {events:?}");
        };
        assert_eq!((result.accuracy, result.stars), (0, 0));
    }

    #[test]
    fn replay_shares_chart() {
        let mut r = running(vec![TileEvent::tap(0.1, 0)]);
        r.finish();
        let again = r.replay();
        assert!(Rc::ptr_eq(r.chart(), again.chart()));
        assert_eq!(again.phase(), Phase::Idle);
        assert_eq!(again.status(0), Some(TileStatus::Pending));
    }

    #[test]
    fn snapshot_reports_feedback_and_visible_tiles() {
        let mut r = running(vec![TileEvent::tap(1.0, 0), TileEvent::tap(1.2, 1)]);
        r.advance(0.98);
        r.press(0);
        let snap = r.snapshot();
        assert_eq!(snap.feedback, Some("Perfect!"));
        assert_eq!(snap.tiles.len(), 1);
        assert_eq!(snap.tiles[0].index, 1);
        assert_eq!(snap.combo, 1);
        r.advance(0.5);
        assert_eq!(r.feedback(), Some("Miss"));
    }
}
