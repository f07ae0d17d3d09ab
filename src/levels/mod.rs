//! Level catalog and chart loading.
//!
//! Built-in levels live one per file and generate their charts from a tile
//! interval and a seed. Levels authored elsewhere arrive as `gameData` JSON
//! (`{ "tiles": [{ "time", "lane", "type", "duration", "word" }], ... }`) and
//! go through [`parse_game_data`].

use std::rc::Rc;

use anyhow::{Result, anyhow};

use crate::engine::chart::{Chart, TileEvent};
use crate::session::ChartSource;

mod level1;
mod level2;
mod level3;

pub use level1::LEVEL1_WORDS;
pub use level2::LEVEL2_WORDS;
pub use level3::LEVEL3_WORDS;

/// Seconds of silence before the first generated tile reaches the hit line.
pub const LEAD_IN: f64 = 2.0;

/// Built-in level descriptor (immutable).
#[derive(Debug)]
pub struct LevelDesc {
    pub id: u32,
    pub name: &'static str,
    pub tempo: &'static str,
    pub track: &'static str,
    /// Seconds between consecutive tiles.
    pub interval: f64,
    /// Multiplier on the engine's approach speed.
    pub speed: f64,
    pub total_tiles: usize,
    pub audio: &'static str,
    /// Labels cycled across the generated tiles.
    pub words: &'static [&'static str],
}

impl LevelDesc {
    /// Deterministic chart for `seed`: tile `i` lands at
    /// `LEAD_IN + i * interval` on a pseudo-random lane.
    pub fn chart(&self, seed: u64, lane_count: usize) -> Chart {
        let mut rng = Lcg::new(seed);
        let lanes = lane_count.max(1);
        let events = (0..self.total_tiles)
            .map(|i| {
                let tile = TileEvent::tap(LEAD_IN + i as f64 * self.interval, rng.next_index(lanes));
                match self.words.get(i % self.words.len().max(1)) {
                    Some(word) => tile.with_label(*word),
                    None => tile,
                }
            })
            .collect();
        Chart::new(events)
    }
}

/// Every built-in level, ordered by id.
pub fn levels() -> &'static [&'static LevelDesc] {
    use std::sync::OnceLock;
    static LEVELS_STATIC: OnceLock<Vec<&'static LevelDesc>> = OnceLock::new();
    LEVELS_STATIC.get_or_init(|| vec![level1::level1(), level2::level2(), level3::level3()])
}

pub fn level(id: u32) -> Option<&'static LevelDesc> {
    levels().iter().copied().find(|l| l.id == id)
}

/// Linear congruential generator; reproducible charts, not for anything secret.
#[derive(Clone, Debug)]
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    pub fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.next_u32() as usize % len
    }
}

/// Charts for the built-in catalog, all generated from one seed.
#[derive(Clone, Debug)]
pub struct BuiltinLevels {
    pub seed: u64,
    pub lane_count: usize,
}

impl ChartSource for BuiltinLevels {
    fn chart(&self, level_id: u32) -> Result<Rc<Chart>> {
        let desc = level(level_id).ok_or_else(|| anyhow!("unknown level {level_id}"))?;
        Ok(Rc::new(desc.chart(self.seed, self.lane_count)))
    }
}

#[cfg(feature = "serde_json")]
mod game_data {
    use anyhow::{Context, Result, bail};
    use log::warn;
    use serde::Deserialize;

    use crate::engine::chart::{Chart, TileEvent, TileKind};

    #[derive(Deserialize)]
    struct RawGameData {
        tiles: Vec<RawTile>,
    }

    #[derive(Deserialize)]
    struct RawTile {
        time: f64,
        lane: i64,
        #[serde(rename = "type", default)]
        kind: RawKind,
        duration: Option<f64>,
        word: Option<String>,
    }

    #[derive(Deserialize, Default, Clone, Copy)]
    #[serde(rename_all = "lowercase")]
    enum RawKind {
        #[default]
        Tap,
        Hold,
    }

    /// Loads a level's `gameData` JSON into a chart, rejecting tiles the
    /// engine cannot play on `lane_count` lanes.
    pub fn parse_game_data(json: &str, lane_count: usize) -> Result<Chart> {
        let raw: RawGameData = serde_json::from_str(json).context("parsing gameData")?;
        let mut events = Vec::with_capacity(raw.tiles.len());
        for (i, tile) in raw.tiles.into_iter().enumerate() {
            if !tile.time.is_finite() || tile.time < 0.0 {
                bail!("tile {i}: time must be a non-negative number, got {}", tile.time);
            }
            let lane = usize::try_from(tile.lane)
                .ok()
                .filter(|l| *l < lane_count)
                .with_context(|| format!("tile {i}: lane {} outside 0..{lane_count}", tile.lane))?;
            let kind = match tile.kind {
                RawKind::Tap => {
                    if tile.duration.is_some() {
                        warn!("tile {i}: duration on a tap tile ignored");
                    }
                    TileKind::Tap
                }
                RawKind::Hold => match tile.duration {
                    Some(d) if d.is_finite() && d > 0.0 => TileKind::Hold { duration: d },
                    other => bail!("tile {i}: hold needs a positive duration, got {other:?}"),
                },
            };
            events.push(TileEvent {
                time: tile.time,
                lane,
                kind,
                label: tile.word.filter(|w| !w.is_empty()),
            });
        }
        Ok(Chart::new(events))
    }
}

#[cfg(feature = "serde_json")]
pub use game_data::parse_game_data;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_generation_is_deterministic_per_seed() {
        let desc = level(1).unwrap();
        let a = desc.chart(7, 4);
        let b = desc.chart(7, 4);
        let c = desc.chart(8, 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), desc.total_tiles);
    }

    #[test]
    fn generated_tiles_follow_interval_and_lanes() {
        let desc = level(2).unwrap();
        let chart = desc.chart(42, 4);
        for (i, ev) in chart.events().iter().enumerate() {
            assert!((ev.time - (LEAD_IN + i as f64 * desc.interval)).abs() < 1e-9);
            assert!(ev.lane < 4);
            assert!(ev.label.is_some());
        }
    }

    #[test]
    fn builtin_source_rejects_unknown_level() {
        let source = BuiltinLevels { seed: 1, lane_count: 4 };
        assert_eq!(source.chart(3).unwrap().len(), 60);
        assert!(source.chart(99).is_err());
    }

    #[test]
    fn lcg_index_stays_in_range() {
        let mut rng = Lcg::new(0);
        assert!((0..1000).all(|_| rng.next_index(3) < 3));
        assert_eq!(rng.next_index(0), 0);
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn parses_game_data_and_sorts() {
        let json = r#"{
            "tiles": [
                { "time": 2.5, "lane": 1, "type": "hold", "duration": 0.75, "word": "Rahman" },
                { "time": 1.2, "lane": 0, "type": "tap" },
                { "time": 1.8, "lane": 3 }
            ],
            "quiz": [{ "question": "?", "options": ["a"], "correctIndex": 0 }]
        }"#;
        let chart = parse_game_data(json, 4).unwrap();
        let times: Vec<f64> = chart.events().iter().map(|e| e.time).collect();
        assert_eq!(times, vec![1.2, 1.8, 2.5]);
        assert_eq!(chart.events()[2].label.as_deref(), Some("Rahman"));
        assert!((chart.end_time() - 3.25).abs() < 1e-9);
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn rejects_malformed_tiles() {
        for json in [
            r#"{ "tiles": [{ "time": -1.0, "lane": 0 }] }"#,
            r#"{ "tiles": [{ "time": 1.0, "lane": 4 }] }"#,
            r#"{ "tiles": [{ "time": 1.0, "lane": -1 }] }"#,
            r#"{ "tiles": [{ "time": 1.0, "lane": 0, "type": "hold" }] }"#,
            r#"{ "tiles": [{ "time": 1.0, "lane": 0, "type": "slide" }] }"#,
            r#"{ "levels": [] }"#,
        ] {
            assert!(parse_game_data(json, 4).is_err(), "accepted {json}");
        }
    }
}
