//! `gate-runtime` – the controller side of GestureGate.
//!
//! # Modules
//!
//! - [`access_controller`] – [`AccessController`][access_controller::AccessController]:
//!   receives identity, hand and fire-zone events, applies permissions, the
//!   debounce window and the mode-toggle cooldown, and queues the surviving
//!   commands for the link writer.
//! - [`gesture`] – reduces 21 hand landmarks to a finger pattern and
//!   classifies it into a mode toggle or a manual command.
//! - [`fire_zones`] – rising/falling edge detection for the automatic path.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP export.

pub mod access_controller;
pub mod fire_zones;
pub mod gesture;
pub mod telemetry;

pub use access_controller::{
    AccessConfig, AccessController, DEFAULT_CARD_THRESHOLD, Detection, GestureOutcome,
    HandOutcome, ToggleOutcome,
};
pub use fire_zones::FireZoneTracker;
pub use gesture::{FingerPattern, GestureIntent, HandPose, HandSample, Handedness, Landmark, classify};
pub use telemetry::{TracerProviderGuard, init_tracing};
