//! The closed command alphabet shared by the controller and the actuator.
//!
//! Internally every instruction is a [`Command`] value.  Text only exists at
//! the wire boundary: [`Command`]'s `Display` renders the wire token and its
//! `FromStr` parses one (after trimming surrounding whitespace).
//!
//! | Wire token | Variant |
//! |---|---|
//! | `L` / `O` / `V` | [`Command::Letter`] |
//! | `NUMERO_<n>` (n ∈ 1..=5) | [`Command::Number`] |
//! | `PUÑO_CERRADO` | [`Command::Fist`] |
//! | `MODO_AUTO` / `MODO_MANUAL` | [`Command::SetMode`] |
//! | `FUEGO_<z>_ON` / `FUEGO_<z>_OFF` (z ∈ 1..=3) | [`Command::Fire`] |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{GateError, Mode};

/// Wire token for the closed-fist (all manual outputs off) command.
pub const FIST_TOKEN: &str = "PUÑO_CERRADO";

/// ASCII spelling of [`FIST_TOKEN`], accepted on input only.
const FIST_TOKEN_ASCII: &str = "PUNO_CERRADO";

const NUMBER_PREFIX: &str = "NUMERO_";
const FIRE_PREFIX: &str = "FUEGO_";

/// Highest manual pump number.
pub const PUMP_COUNT: u8 = 5;

/// Number of independently controlled fire zones.
pub const ZONE_COUNT: u8 = 3;

/// Sign-language letters recognised by the left hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Letter {
    /// Opens the door.
    L,
    /// Closes the door.
    O,
    /// Pulses the indicator LED.
    V,
}

impl Letter {
    pub const ALL: [Letter; 3] = [Letter::L, Letter::O, Letter::V];

    pub fn as_str(self) -> &'static str {
        match self {
            Letter::L => "L",
            Letter::O => "O",
            Letter::V => "V",
        }
    }
}

/// A manual pump selector in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PumpNumber(u8);

impl PumpNumber {
    /// # Errors
    ///
    /// Returns [`GateError::MalformedCommand`] when `n` is outside `1..=5`.
    pub fn new(n: u8) -> Result<Self, GateError> {
        if (1..=PUMP_COUNT).contains(&n) {
            Ok(Self(n))
        } else {
            Err(GateError::MalformedCommand {
                line: format!("{NUMBER_PREFIX}{n}"),
                reason: format!("pump number must be within 1..={PUMP_COUNT}"),
            })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PumpNumber {
    type Error = GateError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl From<PumpNumber> for u8 {
    fn from(n: PumpNumber) -> Self {
        n.0
    }
}

/// A fire-suppression zone in `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Zone(u8);

impl Zone {
    /// # Errors
    ///
    /// Returns [`GateError::MalformedCommand`] when `z` is outside `1..=3`.
    pub fn new(z: u8) -> Result<Self, GateError> {
        if (1..=ZONE_COUNT).contains(&z) {
            Ok(Self(z))
        } else {
            Err(GateError::MalformedCommand {
                line: format!("{FIRE_PREFIX}{z}"),
                reason: format!("zone must be within 1..={ZONE_COUNT}"),
            })
        }
    }

    /// Build a zone from a 0-based array index.
    pub fn from_index(index: usize) -> Result<Self, GateError> {
        u8::try_from(index + 1)
            .map_err(|_| GateError::MalformedCommand {
                line: index.to_string(),
                reason: "zone index out of range".to_string(),
            })
            .and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 0-based index into per-zone arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for Zone {
    type Error = GateError;

    fn try_from(z: u8) -> Result<Self, Self::Error> {
        Self::new(z)
    }
}

impl From<Zone> for u8 {
    fn from(z: Zone) -> Self {
        z.0
    }
}

/// A discrete instruction sent from the controller to the actuator host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Command {
    /// Hand-sign letter (`L`, `O`, `V`).  Permission-gated.
    Letter(Letter),
    /// Select a single manual pump.  Permission-gated.
    Number(PumpNumber),
    /// Closed fist: every manual pump off.
    Fist,
    /// Switch the operating mode.
    SetMode(Mode),
    /// Turn one fire zone on or off.
    Fire { zone: Zone, on: bool },
}

impl Command {
    /// `true` for the commands a human role must be authorised to issue.
    ///
    /// Fist, mode and fire commands come from the automatic path or are
    /// safety resets and are never gated.
    pub fn requires_permission(&self) -> bool {
        matches!(self, Command::Letter(_) | Command::Number(_))
    }

    /// Convenience constructor for `NUMERO_<n>`.
    pub fn number(n: u8) -> Result<Self, GateError> {
        PumpNumber::new(n).map(Command::Number)
    }

    /// Convenience constructor for `FUEGO_<z>_ON|OFF`.
    pub fn fire(zone: u8, on: bool) -> Result<Self, GateError> {
        Zone::new(zone).map(|zone| Command::Fire { zone, on })
    }

    /// Parse the short token used in permission tables: `"1"`..`"5"` for
    /// pumps and the bare letters for hand signs.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::UnknownCommand`] for anything else.
    pub fn from_permission_token(token: &str) -> Result<Self, GateError> {
        let token = token.trim();
        if let Ok(n) = token.parse::<u8>() {
            return Self::number(n);
        }
        match token.parse::<Command>()? {
            cmd @ Command::Letter(_) => Ok(cmd),
            cmd @ Command::Number(_) => Ok(cmd),
            _ => Err(GateError::UnknownCommand(token.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Letter(letter) => f.write_str(letter.as_str()),
            Command::Number(n) => write!(f, "{NUMBER_PREFIX}{}", n.get()),
            Command::Fist => f.write_str(FIST_TOKEN),
            Command::SetMode(Mode::Automatic) => f.write_str("MODO_AUTO"),
            Command::SetMode(Mode::Manual) => f.write_str("MODO_MANUAL"),
            Command::Fire { zone, on } => write!(
                f,
                "{FIRE_PREFIX}{}_{}",
                zone.get(),
                if *on { "ON" } else { "OFF" }
            ),
        }
    }
}

impl FromStr for Command {
    type Err = GateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim();
        match token {
            "L" => return Ok(Command::Letter(Letter::L)),
            "O" => return Ok(Command::Letter(Letter::O)),
            "V" => return Ok(Command::Letter(Letter::V)),
            "MODO_AUTO" => return Ok(Command::SetMode(Mode::Automatic)),
            "MODO_MANUAL" => return Ok(Command::SetMode(Mode::Manual)),
            FIST_TOKEN | FIST_TOKEN_ASCII => return Ok(Command::Fist),
            _ => {}
        }

        let malformed = |reason: &str| GateError::MalformedCommand {
            line: token.to_string(),
            reason: reason.to_string(),
        };

        if let Some(digits) = token.strip_prefix(NUMBER_PREFIX) {
            let n = digits
                .parse::<u8>()
                .map_err(|_| malformed("pump number is not an integer"))?;
            return PumpNumber::new(n)
                .map(Command::Number)
                .map_err(|_| malformed("pump number out of range"));
        }

        if let Some(rest) = token.strip_prefix(FIRE_PREFIX) {
            let (zone, state) = rest
                .split_once('_')
                .ok_or_else(|| malformed("expected FUEGO_<zone>_<ON|OFF>"))?;
            let zone = zone
                .parse::<u8>()
                .map_err(|_| malformed("zone is not an integer"))?;
            let zone = Zone::new(zone).map_err(|_| malformed("zone out of range"))?;
            let on = match state {
                "ON" => true,
                "OFF" => false,
                _ => return Err(malformed("zone state must be ON or OFF")),
            };
            return Ok(Command::Fire { zone, on });
        }

        Err(GateError::UnknownCommand(token.to_string()))
    }
}

impl TryFrom<String> for Command {
    type Error = GateError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Command> for String {
    fn from(cmd: Command) -> Self {
        cmd.to_string()
    }
}
