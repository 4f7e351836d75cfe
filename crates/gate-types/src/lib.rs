//! `gate-types` – shared vocabulary for the GestureGate workspace.
//!
//! Everything that crosses a crate boundary lives here: the [`Command`]
//! alphabet, the recognised [`Identity`] roles, the operating [`Mode`], the
//! bus [`Event`] envelope and the workspace-wide [`GateError`].

pub mod command;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use command::{Command, Letter, PumpNumber, Zone, FIST_TOKEN, PUMP_COUNT, ZONE_COUNT};

/// Access role derived from card classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    /// No card has been recognised yet.
    #[default]
    Nobody,
    /// Full access (`Tarjeta_Maestro`).
    Master,
    /// Door plus the first two pumps (`Tarjeta_Jefe`).
    Chief,
    /// Door only (`Tarjeta_Empleado`).
    Employee,
}

impl Identity {
    pub const ALL: [Identity; 4] = [
        Identity::Nobody,
        Identity::Master,
        Identity::Chief,
        Identity::Employee,
    ];

    /// Resolve a card-classifier label such as `"Tarjeta_Jefe"`.
    ///
    /// Returns `None` for labels that do not name a role.
    pub fn from_card_label(label: &str) -> Option<Self> {
        if label.contains("Maestro") {
            Some(Identity::Master)
        } else if label.contains("Jefe") {
            Some(Identity::Chief)
        } else if label.contains("Empleado") {
            Some(Identity::Employee)
        } else {
            None
        }
    }

    /// Lower-case name used as the key in permission tables.
    pub fn as_key(self) -> &'static str {
        match self {
            Identity::Nobody => "nobody",
            Identity::Master => "master",
            Identity::Chief => "chief",
            Identity::Employee => "employee",
        }
    }

    /// Parse a permission-table key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_key().eq_ignore_ascii_case(key.trim()))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Identity::Nobody => "NOBODY",
            Identity::Master => "MASTER",
            Identity::Chief => "CHIEF",
            Identity::Employee => "EMPLOYEE",
        })
    }
}

/// Operating context.  Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Gesture-driven pump and door control.
    #[default]
    Manual,
    /// Fire-zone sensing drives the zone outputs.
    Automatic,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Manual => Mode::Automatic,
            Mode::Automatic => Mode::Manual,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Manual => "MANUAL",
            Mode::Automatic => "AUTOMATIC",
        })
    }
}

/// Unified event wrapper for the controller's event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"gate-runtime::access"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// What happened in the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    IdentityChanged { from: Identity, to: Identity },
    /// A gated command was rejected for the current identity.
    AccessDenied { identity: Identity, command: Command },
    /// The command passed the debouncer and was handed to the link.
    CommandForwarded(Command),
    /// A repeat inside the debounce window.
    CommandSuppressed(Command),
    /// The channel refused the command (full or shutting down).
    CommandDropped { command: Command, reason: String },
    ModeChanged(Mode),
}

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateError {
    #[error("Access Denied: {identity} may not issue {command}")]
    Unauthorized { identity: Identity, command: Command },

    #[error("Malformed command {line:?}: {reason}")]
    MalformedCommand { line: String, reason: String },

    #[error("Unknown command {0:?}")]
    UnknownCommand(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Command channel full, dropped {0}")]
    ChannelFull(Command),

    #[error("Command channel closed")]
    ChannelClosed,

    #[error("Link unavailable: {0}")]
    LinkUnavailable(String),

    #[error("Link write failed: {0}")]
    LinkWrite(String),

    #[error("Event bus: {0}")]
    Bus(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_labels_resolve_to_roles() {
        assert_eq!(Identity::from_card_label("Tarjeta_Maestro"), Some(Identity::Master));
        assert_eq!(Identity::from_card_label("Tarjeta_Jefe"), Some(Identity::Chief));
        assert_eq!(Identity::from_card_label("Tarjeta_Empleado"), Some(Identity::Employee));
        assert_eq!(Identity::from_card_label("Tarjeta_L"), None);
    }

    #[test]
    fn identity_keys_roundtrip() {
        for id in Identity::ALL {
            assert_eq!(Identity::from_key(id.as_key()), Some(id));
        }
        assert_eq!(Identity::from_key(" MASTER "), Some(Identity::Master));
        assert_eq!(Identity::from_key("janitor"), None);
    }

    #[test]
    fn mode_toggle_alternates() {
        assert_eq!(Mode::default(), Mode::Manual);
        assert_eq!(Mode::Manual.toggled(), Mode::Automatic);
        assert_eq!(Mode::Automatic.toggled(), Mode::Manual);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "gate-runtime::access",
            EventPayload::AccessDenied {
                identity: Identity::Employee,
                command: Command::number(2).unwrap(),
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.payload, back.payload);
    }

    #[test]
    fn gate_error_display() {
        let err = GateError::Unauthorized {
            identity: Identity::Employee,
            command: Command::number(2).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Access Denied"));
        assert!(msg.contains("NUMERO_2"));

        let err2 = GateError::HardwareFault {
            component: "door_servo".to_string(),
            details: "stalled".to_string(),
        };
        assert!(err2.to_string().contains("door_servo"));
    }
}
