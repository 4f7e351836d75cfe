//! [`ActuatorBoard`] – the fixed set of outputs on the receiving board.
//!
//! The board owns one door [`Servo`], [`PUMP_COUNT`] pump [`Relay`]s, the
//! `V` indicator relay and the on-board status LED, plus the [`Delay`] used
//! for timed patterns.  It knows nothing about commands; the
//! [`ActuatorInterpreter`][crate::interpreter::ActuatorInterpreter] decides
//! what the outputs should be and the board applies it.

use std::time::Duration;

use gate_types::{GateError, PUMP_COUNT};
use tracing::debug;

use crate::delay::Delay;
use crate::relay::Relay;
use crate::servo::{Servo, duty_for_angle};

const PUMPS: usize = PUMP_COUNT as usize;

pub struct ActuatorBoard {
    door: Box<dyn Servo>,
    pumps: [Box<dyn Relay>; PUMPS],
    indicator: Box<dyn Relay>,
    status_led: Box<dyn Relay>,
    delay: Box<dyn Delay>,
}

impl ActuatorBoard {
    /// Assemble a board from its drivers, pumps in wiring order.
    pub fn new(
        door: Box<dyn Servo>,
        pumps: [Box<dyn Relay>; PUMPS],
        indicator: Box<dyn Relay>,
        status_led: Box<dyn Relay>,
        delay: Box<dyn Delay>,
    ) -> Self {
        Self {
            door,
            pumps,
            indicator,
            status_led,
            delay,
        }
    }

    /// Move the door servo to `angle` degrees (clamped) and return the duty
    /// written.
    pub fn set_door_angle(&mut self, angle: f32) -> Result<u16, GateError> {
        let duty = duty_for_angle(angle);
        self.door.set_duty(duty)?;
        debug!(servo = self.door.id(), angle, duty, "door moved");
        Ok(duty)
    }

    pub fn door_duty(&self) -> u16 {
        self.door.duty()
    }

    /// Drive pump `index` (0-based).  Only writes when the state changes.
    pub fn set_pump(&mut self, index: usize, on: bool) -> Result<(), GateError> {
        let pump = self.pumps.get_mut(index).ok_or_else(|| GateError::HardwareFault {
            component: format!("pump_{}", index + 1),
            details: "no such pump".to_string(),
        })?;
        if pump.state() != on {
            pump.set_state(on)?;
        }
        Ok(())
    }

    /// Current state of every pump, in order.
    pub fn pump_states(&self) -> Vec<bool> {
        self.pumps.iter().map(|p| p.state()).collect()
    }

    /// Light the indicator for `width`, then turn it off again.
    pub fn pulse_indicator(&mut self, width: Duration) -> Result<(), GateError> {
        self.indicator.set_state(true)?;
        self.delay.pause(width);
        self.indicator.set_state(false)
    }

    pub fn indicator(&self) -> bool {
        self.indicator.state()
    }

    /// Toggle the status LED `times` times, `interval` apart, and leave it off.
    pub fn flicker_status(&mut self, times: usize, interval: Duration) -> Result<(), GateError> {
        for _ in 0..times {
            self.status_led.toggle()?;
            self.delay.pause(interval);
        }
        self.status_led.set_state(false)
    }

    /// Blink the status LED `times` times: on for `period`, off for `period`.
    pub fn blink_status(&mut self, times: usize, period: Duration) -> Result<(), GateError> {
        for _ in 0..times {
            self.status_led.set_state(true)?;
            self.delay.pause(period);
            self.status_led.set_state(false)?;
            self.delay.pause(period);
        }
        Ok(())
    }

    /// Hold the status LED on for `duration`, then turn it off.
    pub fn hold_status(&mut self, duration: Duration) -> Result<(), GateError> {
        self.status_led.set_state(true)?;
        self.delay.pause(duration);
        self.status_led.set_state(false)
    }

    pub fn status_led(&self) -> bool {
        self.status_led.state()
    }

    /// De-energise every pump and both LEDs.  The door keeps its position.
    pub fn all_off(&mut self) -> Result<(), GateError> {
        for pump in &mut self.pumps {
            pump.set_state(false)?;
        }
        self.indicator.set_state(false)?;
        self.status_led.set_state(false)
    }
}
