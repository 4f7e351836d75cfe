//! In-process simulated drivers for running the receiver without hardware.
//!
//! Every simulated output logs its changes through `tracing` and keeps its
//! state behind a shared handle, so a test (or the `gate-actuator` binary)
//! can hold a clone and observe what the interpreter did after the driver
//! has been moved into an [`ActuatorBoard`].
//!
//! # Example
//!
//! ```rust
//! use gate_hal::sim::SimBoard;
//!
//! let (mut board, monitor) = SimBoard::new().build();
//! board.set_pump(2, true).expect("sim pump must succeed");
//! assert!(monitor.pumps[2].state_now());
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gate_types::{GateError, PUMP_COUNT};
use tracing::info;

use crate::board::ActuatorBoard;
use crate::delay::Delay;
use crate::relay::Relay;
use crate::servo::Servo;

// ────────────────────────────────────────────────────────────────────────────
// Servo
// ────────────────────────────────────────────────────────────────────────────

/// A simulated servo that records the most recent duty.  Always succeeds.
#[derive(Debug, Clone)]
pub struct SimServo {
    id: String,
    duty: Arc<Mutex<u16>>,
}

impl SimServo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            duty: Arc::new(Mutex::new(0)),
        }
    }

    /// Duty as seen through any clone.
    pub fn duty_now(&self) -> u16 {
        *self.duty.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Servo for SimServo {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_duty(&mut self, duty: u16) -> Result<(), GateError> {
        *self.duty.lock().unwrap_or_else(PoisonError::into_inner) = duty;
        info!(servo = %self.id, duty, "sim servo");
        Ok(())
    }

    fn duty(&self) -> u16 {
        self.duty_now()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Relay
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RelayCell {
    state: bool,
    transitions: usize,
}

/// A simulated on/off output that records its state and how many times it
/// changed.  Always succeeds.
#[derive(Debug, Clone)]
pub struct SimRelay {
    id: String,
    cell: Arc<Mutex<RelayCell>>,
}

impl SimRelay {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cell: Arc::new(Mutex::new(RelayCell::default())),
        }
    }

    pub fn state_now(&self) -> bool {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner).state
    }

    /// Number of actual on↔off changes so far.
    pub fn transitions(&self) -> usize {
        self.cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transitions
    }
}

impl Relay for SimRelay {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, active: bool) -> Result<(), GateError> {
        let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        if cell.state != active {
            cell.state = active;
            cell.transitions += 1;
            info!(relay = %self.id, on = active, "sim relay");
        }
        Ok(())
    }

    fn state(&self) -> bool {
        self.state_now()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Delay
// ────────────────────────────────────────────────────────────────────────────

/// A delay that returns immediately and records what it was asked to wait.
#[derive(Debug, Clone, Default)]
pub struct SimDelay {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl SimDelay {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total(&self) -> Duration {
        self.pauses().into_iter().sum()
    }
}

impl Delay for SimDelay {
    fn pause(&mut self, duration: Duration) {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Board builder
// ────────────────────────────────────────────────────────────────────────────

/// Handles onto the simulated drivers inside a board built by [`SimBoard`].
#[derive(Debug, Clone)]
pub struct SimMonitor {
    pub door: SimServo,
    pub pumps: Vec<SimRelay>,
    pub indicator: SimRelay,
    pub status_led: SimRelay,
    /// Records pauses only when the board was built without a custom delay.
    pub delay: SimDelay,
}

impl SimMonitor {
    pub fn pump_states(&self) -> Vec<bool> {
        self.pumps.iter().map(SimRelay::state_now).collect()
    }
}

/// Builder for an [`ActuatorBoard`] made entirely of simulated drivers.
#[derive(Default)]
pub struct SimBoard {
    delay: Option<Box<dyn Delay>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `delay` for timed patterns instead of the recording [`SimDelay`],
    /// e.g. [`StdDelay`][crate::delay::StdDelay] for real-time pacing.
    pub fn with_delay(mut self, delay: Box<dyn Delay>) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn build(self) -> (ActuatorBoard, SimMonitor) {
        let door = SimServo::new("door_servo");
        let pumps: Vec<SimRelay> = (1..=PUMP_COUNT)
            .map(|n| SimRelay::new(format!("pump_{n}")))
            .collect();
        let indicator = SimRelay::new("led_v");
        let status_led = SimRelay::new("led_status");
        let sim_delay = SimDelay::default();

        let delay = self
            .delay
            .unwrap_or_else(|| Box::new(sim_delay.clone()) as Box<dyn Delay>);
        let board = ActuatorBoard::new(
            Box::new(door.clone()),
            std::array::from_fn(|i| Box::new(pumps[i].clone()) as Box<dyn Relay>),
            Box::new(indicator.clone()),
            Box::new(status_led.clone()),
            delay,
        );
        let monitor = SimMonitor {
            door,
            pumps,
            indicator,
            status_led,
            delay: sim_delay,
        };
        (board, monitor)
    }
}
