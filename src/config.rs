//! Engine tuning and key bindings.

use anyhow::{Context, Result, bail};

use crate::engine::judge::HitWindow;
use crate::engine::projection::Projector;
use crate::engine::score::ScoringRules;

/// Lanes are small input channels; anything wider is almost certainly a bad
/// config value.
pub const MAX_LANES: usize = 8;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub lane_count: usize,
    pub hit_window: f64,
    pub perfect_threshold: f64,
    pub perfect_points: u64,
    pub good_points: u64,
    pub combo_multiplier: u64,
    pub approach_speed: f64,
    pub hit_line: f64,
    pub visible_min: f64,
    pub visible_max: f64,
    pub feedback_duration: f64,
    pub imminent_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lane_count: 4,
            hit_window: 0.2,
            perfect_threshold: 0.05,
            perfect_points: 100,
            good_points: 50,
            combo_multiplier: 10,
            approach_speed: 2.0,
            hit_line: 85.0,
            visible_min: -20.0,
            visible_max: 110.0,
            feedback_duration: 0.5,
            imminent_threshold: 0.5,
        }
    }
}

impl EngineConfig {
    /// Parses a (possibly partial) JSON config; missing fields keep defaults.
    #[cfg(feature = "serde_json")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("parsing engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lane_count == 0 || self.lane_count > MAX_LANES {
            bail!("lane_count must be in 1..={MAX_LANES}, got {}", self.lane_count);
        }
        if !self.hit_window.is_finite() || self.hit_window <= 0.0 {
            bail!("hit_window must be a positive number of seconds, got {}", self.hit_window);
        }
        if !(0.0..=self.hit_window).contains(&self.perfect_threshold) {
            bail!(
                "perfect_threshold must be within 0..={}, got {}",
                self.hit_window,
                self.perfect_threshold
            );
        }
        if !self.approach_speed.is_finite() || self.approach_speed <= 0.0 {
            bail!("approach_speed must be positive, got {}", self.approach_speed);
        }
        if !(self.visible_min < self.visible_max) {
            bail!(
                "visible range is empty ({}..{})",
                self.visible_min,
                self.visible_max
            );
        }
        if !(self.feedback_duration >= 0.0) {
            bail!("feedback_duration must not be negative, got {}", self.feedback_duration);
        }
        Ok(())
    }

    /// Same config with the approach speed scaled (levels ship their own pace).
    pub fn with_speed_factor(&self, factor: f64) -> Self {
        Self {
            approach_speed: self.approach_speed * factor,
            ..self.clone()
        }
    }

    pub fn hit_window(&self) -> HitWindow {
        HitWindow {
            hit_window: self.hit_window,
            perfect_threshold: self.perfect_threshold,
        }
    }

    pub fn scoring(&self) -> ScoringRules {
        ScoringRules {
            perfect_points: self.perfect_points,
            good_points: self.good_points,
            combo_multiplier: self.combo_multiplier,
        }
    }

    pub fn projector(&self) -> Projector {
        Projector {
            lane_count: self.lane_count,
            hit_line: self.hit_line,
            approach_speed: self.approach_speed,
            visible_min: self.visible_min,
            visible_max: self.visible_max,
            imminent_threshold: self.imminent_threshold,
        }
    }
}

/// Keyboard layout: key `i` presses lane `i`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyMap {
    keys: Vec<String>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(["d", "f", "j", "k"])
    }
}

impl KeyMap {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        }
    }

    /// Lane bound to `key` (as reported by `KeyboardEvent.key`), ignoring case.
    pub fn lane_for(&self, key: &str) -> Option<usize> {
        let key = key.to_lowercase();
        self.keys.iter().position(|k| *k == key)
    }

    pub fn label(&self, lane: usize) -> Option<String> {
        self.keys.get(lane).map(|k| k.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            EngineConfig { lane_count: 0, ..Default::default() },
            EngineConfig { lane_count: 9, ..Default::default() },
            EngineConfig { hit_window: 0.0, ..Default::default() },
            EngineConfig { hit_window: f64::NAN, ..Default::default() },
            EngineConfig { perfect_threshold: 0.3, ..Default::default() },
            EngineConfig { approach_speed: -1.0, ..Default::default() },
            EngineConfig { visible_min: 120.0, ..Default::default() },
            EngineConfig { feedback_duration: -0.1, ..Default::default() },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "accepted {cfg:?}");
        }
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(r#"{ "hit_window": 0.15, "lane_count": 5 }"#).unwrap();
        assert_eq!(cfg.lane_count, 5);
        assert!((cfg.hit_window - 0.15).abs() < 1e-12);
        assert_eq!(cfg.perfect_points, 100);
        assert!(EngineConfig::from_json(r#"{ "lane_count": 0 }"#).is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }

    #[test]
    fn keymap_is_case_insensitive() {
        let keys = KeyMap::default();
        assert_eq!(keys.lane_for("D"), Some(0));
        assert_eq!(keys.lane_for("k"), Some(3));
        assert_eq!(keys.lane_for("x"), None);
        assert_eq!(keys.label(2).as_deref(), Some("J"));
    }
}
