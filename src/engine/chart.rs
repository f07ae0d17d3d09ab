//! Chart data model: immutable tile events plus the per-round status tag each
//! event carries once a round is running.

/// How a tile is played. Holds carry their sustain length in seconds; only the
/// head is judged.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TileKind {
    Tap,
    Hold { duration: f64 },
}

impl TileKind {
    pub fn hold_duration(&self) -> f64 {
        match self {
            TileKind::Tap => 0.0,
            TileKind::Hold { duration } => *duration,
        }
    }
}

/// One scheduled input opportunity.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TileEvent {
    /// Seconds from chart start when the tile should be hit.
    pub time: f64,
    pub lane: usize,
    pub kind: TileKind,
    /// Cosmetic text drawn on the tile (a word of the recitation, etc).
    pub label: Option<String>,
}

impl TileEvent {
    pub fn tap(time: f64, lane: usize) -> Self {
        Self {
            time,
            lane,
            kind: TileKind::Tap,
            label: None,
        }
    }

    pub fn hold(time: f64, lane: usize, duration: f64) -> Self {
        Self {
            time,
            lane,
            kind: TileKind::Hold { duration },
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Time at which the tile has fully passed (tail end for holds).
    pub fn end_time(&self) -> f64 {
        self.time + self.kind.hold_duration()
    }
}

/// Ordered sequence of tile events. Never mutated once built; rounds share it
/// through `Rc<Chart>`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chart {
    events: Vec<TileEvent>,
}

impl Chart {
    /// Builds a chart, ordering events by time. The sort is stable so
    /// simultaneous events keep their authored order.
    pub fn new(mut events: Vec<TileEvent>) -> Self {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { events }
    }

    pub fn events(&self) -> &[TileEvent] {
        &self.events
    }

    pub fn event(&self, index: usize) -> Option<&TileEvent> {
        self.events.get(index)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Latest point at which any tile is still in play; 0 for an empty chart.
    pub fn end_time(&self) -> f64 {
        self.events
            .iter()
            .map(TileEvent::end_time)
            .fold(0.0, f64::max)
    }

    /// Highest lane referenced by the chart, if any.
    pub fn max_lane(&self) -> Option<usize> {
        self.events.iter().map(|e| e.lane).max()
    }
}

/// Status tag of a runtime tile. Transitions are one-way out of `Pending`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TileStatus {
    #[default]
    Pending,
    Hit,
    Missed,
}

impl TileStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, TileStatus::Pending)
    }
}

/// Runtime view of a chart event for the duration of one round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuntimeTile {
    /// Index of the backing event in the chart.
    pub index: usize,
    pub status: TileStatus,
}

impl RuntimeTile {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            status: TileStatus::Pending,
        }
    }

    /// Moves a pending tile to a terminal status. Returns false (and leaves the
    /// tile untouched) if it already left `Pending` or `to` is `Pending`.
    pub fn resolve(&mut self, to: TileStatus) -> bool {
        if !self.status.is_pending() || to.is_pending() {
            return false;
        }
        self.status = to;
        true
    }
}
