//! [`Cooldown`] – minimum spacing between repeated triggers.
//!
//! The mode-toggle gesture is held for many frames.  Unlike the command
//! debouncer, which only suppresses *identical* consecutive commands, a
//! cooldown refuses every trigger until its period has elapsed since the last
//! accepted one, so a sustained gesture cannot make the mode oscillate.

use std::time::{Duration, Instant};

/// Default spacing between accepted mode toggles.
pub const DEFAULT_TOGGLE_COOLDOWN: Duration = Duration::from_secs(2);

/// Accepts a trigger only when strictly more than `period` has passed since
/// the previously accepted one.  The first trigger is always accepted.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use gate_kernel::cooldown::Cooldown;
///
/// let mut cd = Cooldown::new(Duration::from_secs(2));
/// let t0 = Instant::now();
///
/// assert!(cd.try_fire(t0));
/// assert!(!cd.try_fire(t0 + Duration::from_secs(1)));
/// assert!(cd.try_fire(t0 + Duration::from_millis(2100)));
/// ```
#[derive(Debug, Clone)]
pub struct Cooldown {
    period: Duration,
    last_fired: Option<Instant>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_fired: None,
        }
    }

    /// Attempt to trigger at `now`.  Returns `true` and arms the cooldown when
    /// the trigger is accepted.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if self.is_ready(now) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }

    /// `true` when a trigger at `now` would be accepted.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_fired {
            Some(at) => now.saturating_duration_since(at) > self.period,
            None => true,
        }
    }

    /// Time left before the next trigger is accepted; zero when ready.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_fired {
            Some(at) => self
                .period
                .saturating_sub(now.saturating_duration_since(at)),
            None => Duration::ZERO,
        }
    }
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(DEFAULT_TOGGLE_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_trigger_is_accepted() {
        let mut cd = Cooldown::default();
        assert!(cd.is_ready(Instant::now()));
        assert!(cd.try_fire(Instant::now()));
    }

    #[test]
    fn sustained_trigger_is_refused_until_period_passes() {
        let mut cd = Cooldown::default();
        let t0 = Instant::now();
        assert!(cd.try_fire(t0));
        for ms in [100, 500, 1000, 1900, 2000] {
            assert!(
                !cd.try_fire(t0 + Duration::from_millis(ms)),
                "trigger at {ms} ms must be refused"
            );
        }
        assert!(cd.try_fire(t0 + Duration::from_millis(2001)));
    }

    #[test]
    fn refused_trigger_does_not_rearm() {
        let mut cd = Cooldown::new(Duration::from_millis(100));
        let t0 = Instant::now();
        cd.try_fire(t0);
        cd.try_fire(t0 + Duration::from_millis(90));
        assert!(cd.try_fire(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn remaining_counts_down() {
        let mut cd = Cooldown::new(Duration::from_secs(2));
        let t0 = Instant::now();
        assert_eq!(cd.remaining(t0), Duration::ZERO);
        cd.try_fire(t0);
        assert_eq!(
            cd.remaining(t0 + Duration::from_millis(500)),
            Duration::from_millis(1500)
        );
        assert_eq!(cd.remaining(t0 + Duration::from_secs(5)), Duration::ZERO);
    }
}
