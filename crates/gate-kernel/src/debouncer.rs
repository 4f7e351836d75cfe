//! [`CommandDebouncer`] – single-slot repeat suppression.
//!
//! A held gesture or card produces the same command on every sampled frame.
//! The debouncer remembers only the *last forwarded* command and when it was
//! forwarded:
//!
//! * a command different from the last one is always forwarded;
//! * the same command is forwarded again only once strictly more than the
//!   window (1.5 s by default) has elapsed.
//!
//! The memory is global, not per command: `A, B, A` in quick succession
//! forwards all three, while `A, A, A` forwards only the first.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use gate_kernel::debouncer::CommandDebouncer;
//! use gate_types::{Command, Letter};
//!
//! let mut debouncer = CommandDebouncer::default();
//! let t0 = Instant::now();
//! let open = Command::Letter(Letter::L);
//!
//! assert!(debouncer.should_forward(open, t0));
//! assert!(!debouncer.should_forward(open, t0 + Duration::from_millis(500)));
//! assert!(debouncer.should_forward(open, t0 + Duration::from_millis(1600)));
//! ```

use std::time::{Duration, Instant};

use gate_types::Command;
use tracing::trace;

/// Default repeat-suppression window.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(1500);

/// Suppresses repeats of the most recently forwarded command.
#[derive(Debug, Clone)]
pub struct CommandDebouncer {
    window: Duration,
    /// Last forwarded command and the instant it was forwarded.
    last: Option<(Command, Instant)>,
}

impl CommandDebouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Decide whether `cmd`, observed at `now`, should be forwarded.
    ///
    /// On `true` the slot is updated to `(cmd, now)`; on `false` it is left
    /// untouched, so a suppressed repeat never extends the window.
    pub fn should_forward(&mut self, cmd: Command, now: Instant) -> bool {
        let forward = match self.last {
            Some((last_cmd, last_at)) if last_cmd == cmd => {
                now.saturating_duration_since(last_at) > self.window
            }
            _ => true,
        };
        if forward {
            self.last = Some((cmd, now));
        } else {
            trace!(command = %cmd, "repeat suppressed");
        }
        forward
    }

    /// The most recently forwarded command, if any.
    pub fn last(&self) -> Option<Command> {
        self.last.map(|(cmd, _)| cmd)
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for CommandDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}
