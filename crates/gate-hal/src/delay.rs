//! Blocking pauses used by timed outputs (indicator pulse, status blinks).

use std::time::Duration;

/// Something that can wait.  The receiver loop is single-threaded and
/// processes one command to completion, so a blocking pause is fine here.
pub trait Delay: Send + Sync {
    fn pause(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
