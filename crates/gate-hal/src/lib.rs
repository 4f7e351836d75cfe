//! `gate-hal` – the receiving side of the link.
//!
//! Driver traits ([`servo::Servo`], [`relay::Relay`], [`delay::Delay`]), the
//! fixed [`board::ActuatorBoard`] they make up, the command
//! [`interpreter::ActuatorInterpreter`] that drives it, and a blocking
//! [`reader::serve`] loop that feeds it lines.  [`sim`] provides drivers that
//! only log, for running without hardware.

pub mod board;
pub mod delay;
pub mod interpreter;
pub mod reader;
pub mod relay;
pub mod servo;
pub mod sim;

pub use board::ActuatorBoard;
pub use interpreter::{ActuatorInterpreter, ActuatorState, LineOutcome};
pub use reader::{ServeStats, ThreadedReader, serve};
