//! Song clock. Accumulates wall-clock deltas into `elapsed` while running;
//! time spent paused is never added.

#[derive(Clone, Debug, Default)]
pub struct GameClock {
    elapsed: f64,
    running: bool,
    /// Wall-clock reading of the previous tick (seconds). Cleared on
    /// start/pause/resume so the next tick re-anchors without advancing.
    anchor: Option<f64>,
}

impl GameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.elapsed = 0.0;
        self.running = true;
        self.anchor = None;
    }

    pub fn pause(&mut self) {
        self.running = false;
        self.anchor = None;
    }

    pub fn resume(&mut self) {
        self.running = true;
        self.anchor = None;
    }

    /// Advances by the wall-clock delta since the previous tick. The first tick
    /// after start/resume only records the reference point.
    pub fn tick(&mut self, now: f64) -> f64 {
        if !self.running {
            return self.elapsed;
        }
        if let Some(prev) = self.anchor.replace(now) {
            self.advance(now - prev);
        }
        self.elapsed
    }

    /// Adds an explicit delta (seconds). Negative or non-finite deltas are
    /// dropped so `elapsed` stays monotonic.
    pub fn advance(&mut self, delta: f64) -> f64 {
        if self.running && delta.is_finite() && delta > 0.0 {
            self.elapsed += delta;
        }
        self.elapsed
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_anchors_then_accumulates() {
        let mut clock = GameClock::new();
        clock.start();
        assert_eq!(clock.tick(100.0), 0.0);
        assert!((clock.tick(100.25) - 0.25).abs() < 1e-9);
        assert!((clock.tick(101.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn paused_time_is_not_counted() {
        let mut clock = GameClock::new();
        clock.start();
        clock.tick(0.0);
        clock.tick(5.0);
        clock.pause();
        assert_eq!(clock.tick(60.0), 5.0);
        clock.resume();
        assert_eq!(clock.tick(120.0), 5.0);
        assert!((clock.tick(120.5) - 5.5).abs() < 1e-9);
    }

    #[test]
    fn backwards_wall_clock_does_not_rewind() {
        let mut clock = GameClock::new();
        clock.start();
        clock.tick(10.0);
        clock.tick(11.0);
        assert_eq!(clock.tick(9.0), 1.0);
        assert!((clock.tick(9.5) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn advance_ignored_when_stopped() {
        let mut clock = GameClock::new();
        assert_eq!(clock.advance(1.0), 0.0);
        clock.start();
        assert_eq!(clock.advance(f64::NAN), 0.0);
        assert_eq!(clock.advance(0.5), 0.5);
    }
}
