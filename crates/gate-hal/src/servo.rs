//! `Servo` trait for PWM-driven position hardware (the door servo).
//!
//! Drivers are handed to an [`ActuatorBoard`][crate::board::ActuatorBoard];
//! the interpreter only ever talks to the trait, so a simulated servo and a
//! real PWM pin are interchangeable.

use gate_types::GateError;

/// Lowest 16-bit duty (≈1 ms pulse at 50 Hz), i.e. 0°.
pub const MIN_DUTY: u16 = 1638;
/// Highest 16-bit duty (≈2 ms pulse at 50 Hz), i.e. 180°.
pub const MAX_DUTY: u16 = 8192;
/// Travel of the servo in degrees.
pub const MAX_ANGLE: f32 = 180.0;

/// 16-bit duty cycle for `angle` degrees.  The angle is clamped to
/// `0..=180` first, so the result always lies in `MIN_DUTY..=MAX_DUTY`.
///
/// ```
/// use gate_hal::servo::duty_for_angle;
///
/// assert_eq!(duty_for_angle(90.0), 4915);
/// assert_eq!(duty_for_angle(-20.0), 1638);
/// assert_eq!(duty_for_angle(500.0), 8192);
/// ```
pub fn duty_for_angle(angle: f32) -> u16 {
    let angle = if angle.is_nan() { 0.0 } else { angle.clamp(0.0, MAX_ANGLE) };
    let span = f32::from(MAX_DUTY - MIN_DUTY);
    // Truncation matches the board firmware.
    (f32::from(MIN_DUTY) + (angle / MAX_ANGLE) * span) as u16
}

/// A PWM-driven servo.
pub trait Servo: Send + Sync {
    /// Stable identifier, e.g. `"door_servo"`.
    fn id(&self) -> &str;

    /// Write a raw 16-bit duty cycle.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::HardwareFault`] if the PWM write fails.
    fn set_duty(&mut self, duty: u16) -> Result<(), GateError>;

    /// The most recently written duty.
    fn duty(&self) -> u16;
}
