//! Generic `Relay` trait for discrete on/off outputs (pump drivers, the
//! indicator LED, the status LED).

use gate_types::GateError;

/// A discrete on/off hardware output.
pub trait Relay: Send + Sync {
    /// Stable identifier for this output, e.g. `"pump_3"`.
    fn id(&self) -> &str;

    /// Drive the output to `active` (`true` = energised / lit).
    ///
    /// # Errors
    ///
    /// Returns [`GateError::HardwareFault`] if the command cannot be applied.
    fn set_state(&mut self, active: bool) -> Result<(), GateError>;

    /// Return the output's current state (`true` = energised).
    fn state(&self) -> bool;

    /// Invert the current state.
    fn toggle(&mut self) -> Result<(), GateError> {
        let next = !self.state();
        self.set_state(next)
    }
}
