//! Seams to the engine's collaborators: the audio/animation transport, the
//! level lookup that hands out charts, and the results sink. A [`Session`]
//! keeps one [`Round`] and its transport in step.

use std::rc::Rc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::EngineConfig;
use crate::engine::chart::Chart;
use crate::engine::score::RoundResult;
use crate::engine::{Phase, PressOutcome, Round, RoundEvent};

/// Playback driver commanded by the session (audio element, test recorder).
pub trait Transport {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    /// Halts playback and rewinds; called before any state reset.
    fn stop(&mut self) -> Result<()>;
}

/// Level lookup (`level id -> chart`).
pub trait ChartSource {
    fn chart(&self, level_id: u32) -> Result<Rc<Chart>>;
}

/// Receives finished rounds (score service, local progress, ...).
pub trait ResultSink {
    fn submit(&mut self, submission: &ScoreSubmission) -> Result<()>;
}

/// Record submitted for a finished round.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreSubmission {
    pub level_id: u32,
    pub score: u64,
    pub stars: u8,
    pub accuracy: u32,
    pub max_streak: u32,
    pub is_full_combo: bool,
}

impl ScoreSubmission {
    pub fn new(level_id: u32, result: &RoundResult) -> Self {
        Self {
            level_id,
            score: result.score,
            stars: result.stars,
            accuracy: result.accuracy,
            max_streak: result.max_streak,
            is_full_combo: result.is_full_combo,
        }
    }
}

pub struct Session<T: Transport> {
    level_id: u32,
    round: Round,
    transport: T,
}

impl<T: Transport> Session<T> {
    pub fn new(level_id: u32, chart: Rc<Chart>, config: EngineConfig, transport: T) -> Self {
        Self {
            level_id,
            round: Round::new(chart, config),
            transport,
        }
    }

    pub fn load(
        source: &impl ChartSource,
        level_id: u32,
        config: EngineConfig,
        transport: T,
    ) -> Result<Self> {
        config.validate()?;
        let chart = source
            .chart(level_id)
            .with_context(|| format!("loading chart for level {level_id}"))?;
        Ok(Self::new(level_id, chart, config, transport))
    }

    pub fn start(&mut self) -> Result<bool> {
        if !self.round.start() {
            return Ok(false);
        }
        self.transport.play().context("starting playback")?;
        Ok(true)
    }

    pub fn pause(&mut self) -> Result<bool> {
        if !self.round.pause() {
            return Ok(false);
        }
        self.transport.pause().context("pausing playback")?;
        Ok(true)
    }

    pub fn resume(&mut self) -> Result<bool> {
        if !self.round.resume() {
            return Ok(false);
        }
        self.transport.resume().context("resuming playback")?;
        Ok(true)
    }

    pub fn queue_press(&mut self, lane: usize) {
        self.round.queue_press(lane);
    }

    pub fn press(&mut self, lane: usize) -> PressOutcome {
        self.round.press(lane)
    }

    /// One frame at wall-clock `now` (seconds). Stops the transport when the
    /// round completes.
    pub fn tick(&mut self, now: f64) -> Result<Vec<RoundEvent>> {
        let events = self.round.tick(now);
        self.stop_if_ended(&events)?;
        Ok(events)
    }

    /// Like [`Session::tick`], but steps song time by `delta` seconds.
    pub fn advance(&mut self, delta: f64) -> Result<Vec<RoundEvent>> {
        let events = self.round.advance(delta);
        self.stop_if_ended(&events)?;
        Ok(events)
    }

    fn stop_if_ended(&mut self, events: &[RoundEvent]) -> Result<()> {
        if events.iter().any(|e| matches!(e, RoundEvent::Ended(_))) {
            self.transport.stop().context("stopping playback")?;
        }
        Ok(())
    }

    /// Ends the round early (track finished, player quit). `Some` only when
    /// this call ended the round; playback is stopped in that case alone.
    pub fn finish(&mut self) -> Result<Option<RoundResult>> {
        let (_, result) = self.round.finish();
        if result.is_some() {
            self.transport.stop().context("stopping playback")?;
        }
        Ok(result)
    }

    /// Stops playback first, then swaps in a fresh idle round over the same
    /// chart. Call [`Session::start`] to play again.
    pub fn restart(&mut self) -> Result<()> {
        self.transport.stop().context("stopping playback")?;
        self.round = self.round.replay();
        info!("level {} reset for replay", self.level_id);
        Ok(())
    }

    /// Hands the result to `sink` if the round has ended.
    pub fn submit(&self, sink: &mut impl ResultSink) -> Result<bool> {
        let Some(result) = self.round.result() else {
            warn!("submit requested before level {} ended", self.level_id);
            return Ok(false);
        };
        sink.submit(&ScoreSubmission::new(self.level_id, result))
            .with_context(|| format!("submitting result for level {}", self.level_id))?;
        Ok(true)
    }

    pub fn phase(&self) -> Phase {
        self.round.phase()
    }

    pub fn level_id(&self) -> u32 {
        self.level_id
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::chart::TileEvent;
    use anyhow::bail;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl Transport for Recorder {
        fn play(&mut self) -> Result<()> {
            self.calls.push("play");
            Ok(())
        }
        fn pause(&mut self) -> Result<()> {
            self.calls.push("pause");
            Ok(())
        }
        fn resume(&mut self) -> Result<()> {
            self.calls.push("resume");
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            self.calls.push("stop");
            Ok(())
        }
    }

    struct Broken;

    impl Transport for Broken {
        fn play(&mut self) -> Result<()> {
            bail!("autoplay blocked")
        }
        fn pause(&mut self) -> Result<()> {
            Ok(())
        }
        fn resume(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn chart() -> Rc<Chart> {
        Rc::new(Chart::new(vec![TileEvent::tap(0.5, 0)]))
    }

    #[test]
    fn lifecycle_drives_transport() {
        let mut s = Session::new(1, chart(), EngineConfig::default(), Recorder::default());
        assert!(s.start().unwrap());
        assert!(!s.start().unwrap());
        assert!(s.pause().unwrap());
        assert!(!s.pause().unwrap());
        assert!(s.resume().unwrap());
        s.tick(0.0).unwrap();
        s.tick(0.5).unwrap();
        s.press(0);
        let events = s.tick(0.6).unwrap();
        assert!(matches!(events.last(), Some(RoundEvent::Ended(_))));
        assert_eq!(s.transport().calls, vec!["play", "pause", "resume", "stop"]);
    }

    #[test]
    fn restart_stops_before_reset() {
        let mut s = Session::new(1, chart(), EngineConfig::default(), Recorder::default());
        s.start().unwrap();
        s.restart().unwrap();
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.transport().calls, vec!["play", "stop"]);
        assert!(s.start().unwrap());
    }

    #[derive(Default)]
    struct Collect(Vec<ScoreSubmission>);

    impl ResultSink for Collect {
        fn submit(&mut self, submission: &ScoreSubmission) -> Result<()> {
            self.0.push(submission.clone());
            Ok(())
        }
    }

    #[test]
    fn result_is_handed_off_once() {
        let mut s = Session::new(3, chart(), EngineConfig::default(), Recorder::default());
        let mut sink = Collect::default();
        s.start().unwrap();
        s.tick(0.0).unwrap();
        s.tick(0.5).unwrap();
        s.press(0);
        s.tick(0.6).unwrap();
        assert!(s.submit(&mut sink).unwrap());

        // Quit after the natural end: nothing left to finish or submit.
        if s.finish().unwrap().is_some() {
            s.submit(&mut sink).unwrap();
        }
        assert_eq!(sink.0.len(), 1);
        assert_eq!(s.transport().calls, vec!["play", "stop"]);
    }

    #[test]
    fn finish_after_restart_still_ends_round() {
        let mut s = Session::new(1, chart(), EngineConfig::default(), Recorder::default());
        s.start().unwrap();
        s.restart().unwrap();
        s.start().unwrap();
        let result = s.finish().unwrap().unwrap();
        assert_eq!(result.counts.miss, 1);
        assert_eq!(s.phase(), Phase::Ended);
        assert_eq!(s.transport().calls, vec!["play", "stop", "play", "stop"]);
    }

    #[test]
    fn transport_failure_surfaces_with_context() {
        let mut s = Session::new(1, chart(), EngineConfig::default(), Broken);
        let err = s.start().unwrap_err();
        assert!(format!("{err:#}").contains("autoplay blocked"));
    }
}
