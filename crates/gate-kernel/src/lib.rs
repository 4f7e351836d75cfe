//! `gate-kernel` – the rules every command must satisfy before it may leave
//! the controller.
//!
//! It does not move anything; it decides.
//!
//! # Modules
//!
//! - [`permission_matrix`] – [`PermissionMatrix`][permission_matrix::PermissionMatrix]:
//!   maps the recognised [`Identity`][gate_types::Identity] to the set of
//!   hand-letter and pump commands it may issue.  Unknown roles are denied.
//! - [`debouncer`] – [`CommandDebouncer`][debouncer::CommandDebouncer]:
//!   single-slot suppression of repeated commands inside a 1.5 s window.
//! - [`cooldown`] – [`Cooldown`][cooldown::Cooldown]: minimum spacing between
//!   mode toggles, independent of the debouncer.
//! - [`clock`] – the [`Clock`][clock::Clock] abstraction both time-based rules
//!   are driven by.

pub mod clock;
pub mod cooldown;
pub mod debouncer;
pub mod permission_matrix;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use cooldown::{Cooldown, DEFAULT_TOGGLE_COOLDOWN};
pub use debouncer::{CommandDebouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use permission_matrix::PermissionMatrix;
