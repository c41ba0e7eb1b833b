//! Per-side countdown clock.
//!
//! The clock is host-driven: the session actor calls `tick` from its
//! periodic interval. All arithmetic is monotonic-Instant based and floored
//! at zero; a flag fall is reported exactly once per side.

use std::time::{Duration, Instant};

use chess::PlayerSide;

use crate::snapshot::ClockSnapshot;

/// Initial time plus per-move increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeControl {
    pub initial: Duration,
    pub increment: Duration,
}

impl TimeControl {
    pub const fn new(initial: Duration, increment: Duration) -> Self {
        Self { initial, increment }
    }

    pub const fn from_secs(initial: u64, increment: u64) -> Self {
        Self {
            initial: Duration::from_secs(initial),
            increment: Duration::from_secs(increment),
        }
    }
}

/// Two countdowns, at most one running. Owned by the session; every
/// mutation goes through these methods, never direct field access.
#[derive(Debug)]
pub struct Clock {
    white_remaining: Duration,
    black_remaining: Duration,
    increment: Duration,
    running: Option<PlayerSide>,
    last_tick: Instant,
    flagged: Option<PlayerSide>,
}

impl Clock {
    pub fn new(control: TimeControl) -> Self {
        Self {
            white_remaining: control.initial,
            black_remaining: control.initial,
            increment: control.increment,
            running: None,
            last_tick: Instant::now(),
            flagged: None,
        }
    }

    /// Start (or resume) counting down for the given side. Does not touch
    /// accumulated remaining time.
    pub fn start(&mut self, side: PlayerSide) {
        self.last_tick = Instant::now();
        self.running = Some(side);
    }

    /// Switch the running side after a completed move: flush elapsed time
    /// to the previous runner, credit it the increment, reset the
    /// reference instant so move-processing time is not double-counted.
    pub fn set_running_side(&mut self, side: PlayerSide) {
        self.flush_elapsed();
        let increment = self.increment;
        if let Some(previous) = self.running {
            if previous != side {
                let remaining = self.remaining_mut(previous);
                *remaining += increment;
            }
        }
        self.running = Some(side);
        self.last_tick = Instant::now();
    }

    /// Stop entirely without losing remaining time.
    pub fn stop(&mut self) {
        self.flush_elapsed();
        self.running = None;
    }

    /// Deduct wall-clock time since the previous tick from the running
    /// side. Returns the side whose flag fell, at most once per side.
    pub fn tick(&mut self) -> Option<PlayerSide> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        self.tick_with_elapsed(elapsed)
    }

    /// Tick with an injected elapsed duration (useful for testing).
    pub fn tick_with_elapsed(&mut self, elapsed: Duration) -> Option<PlayerSide> {
        let side = self.running?;
        let remaining = self.remaining_mut(side);
        *remaining = remaining.saturating_sub(elapsed);
        let expired = remaining.is_zero();
        if expired && self.flagged != Some(side) {
            self.flagged = Some(side);
            return Some(side);
        }
        None
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn running_side(&self) -> Option<PlayerSide> {
        self.running
    }

    pub fn remaining(&self, side: PlayerSide) -> Duration {
        match side {
            PlayerSide::White => self.white_remaining,
            PlayerSide::Black => self.black_remaining,
        }
    }

    pub fn remaining_ms(&self, side: PlayerSide) -> u64 {
        self.remaining(side).as_millis() as u64
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            white_remaining_ms: self.remaining_ms(PlayerSide::White),
            black_remaining_ms: self.remaining_ms(PlayerSide::Black),
            running: self.running,
        }
    }

    fn flush_elapsed(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        if let Some(side) = self.running {
            let remaining = self.remaining_mut(side);
            *remaining = remaining.saturating_sub(elapsed);
        }
    }

    fn remaining_mut(&mut self, side: PlayerSide) -> &mut Duration {
        match side {
            PlayerSide::White => &mut self.white_remaining,
            PlayerSide::Black => &mut self.black_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(initial_secs: u64) -> Clock {
        Clock::new(TimeControl::from_secs(initial_secs, 0))
    }

    #[test]
    fn test_new_clock_not_running() {
        let c = clock(300);
        assert!(!c.is_running());
        assert_eq!(c.remaining(PlayerSide::White), Duration::from_secs(300));
        assert_eq!(c.remaining(PlayerSide::Black), Duration::from_secs(300));
    }

    #[test]
    fn test_tick_reduces_only_running_side() {
        let mut c = clock(300);
        c.start(PlayerSide::White);
        c.tick_with_elapsed(Duration::from_secs(5));
        assert_eq!(c.remaining(PlayerSide::White), Duration::from_secs(295));
        assert_eq!(c.remaining(PlayerSide::Black), Duration::from_secs(300));
    }

    #[test]
    fn test_stopped_clock_does_not_tick() {
        let mut c = clock(300);
        assert_eq!(c.tick_with_elapsed(Duration::from_secs(10)), None);
        assert_eq!(c.remaining(PlayerSide::White), Duration::from_secs(300));
    }

    #[test]
    fn test_remaining_floors_at_zero() {
        let mut c = clock(3);
        c.start(PlayerSide::Black);
        c.tick_with_elapsed(Duration::from_secs(10));
        assert_eq!(c.remaining(PlayerSide::Black), Duration::ZERO);
    }

    #[test]
    fn test_flag_fires_exactly_once() {
        let mut c = clock(1);
        c.start(PlayerSide::White);
        assert_eq!(
            c.tick_with_elapsed(Duration::from_secs(2)),
            Some(PlayerSide::White)
        );
        assert_eq!(c.tick_with_elapsed(Duration::from_secs(1)), None);
        assert_eq!(c.tick_with_elapsed(Duration::from_secs(1)), None);
    }

    #[test]
    fn test_switch_credits_increment_to_mover() {
        let mut c = Clock::new(TimeControl::from_secs(60, 3));
        c.start(PlayerSide::White);
        c.tick_with_elapsed(Duration::from_secs(10));
        c.set_running_side(PlayerSide::Black);
        // White spent ~10s and gained the 3s increment
        let white = c.remaining(PlayerSide::White);
        assert!(white >= Duration::from_secs(52) && white <= Duration::from_secs(53));
        assert_eq!(c.running_side(), Some(PlayerSide::Black));
    }

    #[test]
    fn test_stop_preserves_remaining_time() {
        let mut c = clock(120);
        c.start(PlayerSide::White);
        c.tick_with_elapsed(Duration::from_secs(20));
        c.stop();
        assert!(!c.is_running());
        assert_eq!(c.remaining(PlayerSide::White), Duration::from_secs(100));

        // Resuming later keeps counting from where it left off
        c.start(PlayerSide::White);
        c.tick_with_elapsed(Duration::from_secs(10));
        assert_eq!(c.remaining(PlayerSide::White), Duration::from_secs(90));
    }

    #[test]
    fn test_snapshot_reports_milliseconds() {
        let mut c = clock(1);
        c.start(PlayerSide::White);
        let snap = c.snapshot();
        assert_eq!(snap.white_remaining_ms, 1000);
        assert_eq!(snap.black_remaining_ms, 1000);
        assert_eq!(snap.running, Some(PlayerSide::White));
    }
}
