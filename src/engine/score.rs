//! Score/combo bookkeeping and the terminal round result.

use super::judge::Judgement;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HitCounts {
    pub perfect: u32,
    pub good: u32,
    pub miss: u32,
}

impl HitCounts {
    pub fn hits(&self) -> u32 {
        self.perfect + self.good
    }

    pub fn judged(&self) -> u32 {
        self.hits() + self.miss
    }

    fn bump(&mut self, judgement: Judgement) {
        match judgement {
            Judgement::Perfect => self.perfect += 1,
            Judgement::Good => self.good += 1,
            Judgement::Miss => self.miss += 1,
        }
    }
}

/// Points and multiplier used by [`ScoreState::apply_hit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoringRules {
    pub perfect_points: u64,
    pub good_points: u64,
    pub combo_multiplier: u64,
}

impl ScoringRules {
    pub fn base_points(&self, judgement: Judgement) -> u64 {
        match judgement {
            Judgement::Perfect => self.perfect_points,
            Judgement::Good => self.good_points,
            Judgement::Miss => 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScoreState {
    pub score: u64,
    pub combo: u32,
    pub max_streak: u32,
    pub counts: HitCounts,
}

impl ScoreState {
    /// Awards a hit using the combo value from before this hit, then extends
    /// the combo. Returns the points awarded.
    pub fn apply_hit(&mut self, judgement: Judgement, rules: &ScoringRules) -> u64 {
        debug_assert!(judgement != Judgement::Miss);
        let awarded = rules.base_points(judgement) + self.combo as u64 * rules.combo_multiplier;
        self.score += awarded;
        self.combo += 1;
        self.max_streak = self.max_streak.max(self.combo);
        self.counts.bump(judgement);
        awarded
    }

    pub fn apply_miss(&mut self) {
        self.combo = 0;
        self.counts.bump(Judgement::Miss);
    }
}

/// Terminal record of a round, handed to the results collaborator.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    pub score: u64,
    /// Percent of tiles hit, rounded, in `0..=100`.
    pub accuracy: u32,
    pub stars: u8,
    pub max_streak: u32,
    pub is_full_combo: bool,
    pub total_tiles: u32,
    pub counts: HitCounts,
}

impl RoundResult {
    pub fn from_state(state: &ScoreState, total_tiles: usize) -> Self {
        let total = u32::try_from(total_tiles).unwrap_or(u32::MAX);
        let accuracy = accuracy_percent(state.counts.hits(), total);
        Self {
            score: state.score,
            accuracy,
            stars: star_rating(accuracy, state.counts.hits()),
            max_streak: state.max_streak,
            is_full_combo: state.counts.miss == 0 && state.counts.hits() == total,
            total_tiles: total,
            counts: state.counts,
        }
    }
}

/// `round(100 * hits / total)`, 0 for an empty chart.
pub fn accuracy_percent(hits: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (100.0 * hits as f64 / total as f64).round();
    (pct as u32).min(100)
}

/// 3 stars above 90% accuracy, 2 above 70%, otherwise 1; a round without a
/// single hit earns nothing.
pub fn star_rating(accuracy: u32, hits: u32) -> u8 {
    if hits == 0 {
        0
    } else if accuracy > 90 {
        3
    } else if accuracy > 70 {
        2
    } else {
        1
    }
}
