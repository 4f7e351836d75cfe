//! [`ActuatorInterpreter`] – receiver-side state machine.
//!
//! Parses one wire line at a time into a [`Command`], applies it to the
//! [`ActuatorState`] and then re-derives every physical output from that
//! state.  Malformed or unknown lines are logged and ignored; since a line is
//! fully parsed before anything is touched, a rejected line never changes
//! state.
//!
//! | Command | Effect |
//! |---|---|
//! | `MODO_AUTO` | mode Automatic, manual pump 0, all pumps off, three status blinks |
//! | `MODO_MANUAL` | mode Manual, all fire zones off, manual pump 0, all pumps off, status held 1 s |
//! | `NUMERO_k` | manual pump k; pump k on, every other pump off |
//! | fist | manual pump 0, all pumps off |
//! | `L` / `O` | door to 90° / 0° |
//! | `V` | indicator pulsed for 0.5 s |
//! | `FUEGO_z_ON/OFF` | fire zone z on/off, pump z follows; other zones and pumps untouched |
//!
//! Manual selections are accepted in either mode.  Zones 1 to 3 drive pumps 1
//! to 3.  A manual selection, a fist or a mode change rewrites the whole pump
//! bank, so it also stops any pump a fire zone had started; the zone flags
//! themselves are only cleared by `MODO_MANUAL`.

use std::time::Duration;

use gate_types::{Command, GateError, Letter, Mode, PUMP_COUNT, ZONE_COUNT};
use tracing::{debug, error, info, warn};

use crate::board::ActuatorBoard;

pub const DOOR_OPEN_ANGLE: f32 = 90.0;
pub const DOOR_CLOSED_ANGLE: f32 = 0.0;
pub const INDICATOR_PULSE: Duration = Duration::from_millis(500);

const BOOT_FLICKERS: usize = 5;
const BOOT_FLICKER_INTERVAL: Duration = Duration::from_millis(50);
const AUTO_BLINKS: usize = 3;
const AUTO_BLINK_PERIOD: Duration = Duration::from_millis(100);
const MANUAL_HOLD: Duration = Duration::from_secs(1);

const PUMPS: usize = PUMP_COUNT as usize;
const ZONES: usize = ZONE_COUNT as usize;

/// Everything the receiver remembers between commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorState {
    pub mode: Mode,
    /// Last commanded door angle in degrees.
    pub door_angle: f32,
    /// `0` for none, otherwise the selected pump `1..=5`.
    pub manual_pump: u8,
    pub fire_zones: [bool; ZONES],
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self {
            mode: Mode::Manual,
            door_angle: DOOR_CLOSED_ANGLE,
            manual_pump: 0,
            fire_zones: [false; ZONES],
        }
    }
}

/// What became of one input line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineOutcome {
    Applied(ActuatorState),
    /// Empty after trimming.
    Blank,
    /// Unparseable, unknown, or the hardware refused it.
    Rejected,
}

pub struct ActuatorInterpreter {
    state: ActuatorState,
    board: ActuatorBoard,
}

impl ActuatorInterpreter {
    pub fn new(board: ActuatorBoard) -> Self {
        Self {
            state: ActuatorState::default(),
            board,
        }
    }

    /// Bring every output to the initial state and play the boot pattern.
    pub fn boot(&mut self) -> Result<(), GateError> {
        self.board.all_off()?;
        self.board.set_door_angle(self.state.door_angle)?;
        self.board.flicker_status(BOOT_FLICKERS, BOOT_FLICKER_INTERVAL)?;
        info!("actuator board ready");
        Ok(())
    }

    pub fn state(&self) -> &ActuatorState {
        &self.state
    }

    pub fn board(&self) -> &ActuatorBoard {
        &self.board
    }

    /// Apply one command and return the resulting state.
    ///
    /// # Errors
    ///
    /// Propagates [`GateError::HardwareFault`] from the drivers.  The
    /// logical state is already updated when that happens.
    pub fn apply(&mut self, cmd: Command) -> Result<ActuatorState, GateError> {
        match cmd {
            Command::SetMode(Mode::Automatic) => {
                self.state.mode = Mode::Automatic;
                self.select_manual_pump(0)?;
                self.board.blink_status(AUTO_BLINKS, AUTO_BLINK_PERIOD)?;
            }
            Command::SetMode(Mode::Manual) => {
                self.state.mode = Mode::Manual;
                self.state.fire_zones = [false; ZONES];
                self.select_manual_pump(0)?;
                self.board.hold_status(MANUAL_HOLD)?;
            }
            Command::Number(n) => self.select_manual_pump(n.get())?,
            Command::Fist => self.select_manual_pump(0)?,
            Command::Letter(Letter::L) => self.move_door(DOOR_OPEN_ANGLE)?,
            Command::Letter(Letter::O) => self.move_door(DOOR_CLOSED_ANGLE)?,
            Command::Letter(Letter::V) => self.board.pulse_indicator(INDICATOR_PULSE)?,
            Command::Fire { zone, on } => {
                self.state.fire_zones[zone.index()] = on;
                self.board.set_pump(zone.index(), on)?;
            }
        }
        debug!(command = %cmd, state = ?self.state, "applied");
        Ok(self.state)
    }

    /// Trim, parse and apply one wire line.
    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Blank;
        }
        let cmd = match line.parse::<Command>() {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(line, error = %e, "ignoring line");
                return LineOutcome::Rejected;
            }
        };
        info!(command = %cmd, "received");
        match self.apply(cmd) {
            Ok(state) => LineOutcome::Applied(state),
            Err(e) => {
                error!(command = %cmd, error = %e, "actuation failed");
                LineOutcome::Rejected
            }
        }
    }

    /// Switch every output off when the link goes away.  The door stays
    /// where it is.
    pub fn shutdown(&mut self) -> Result<(), GateError> {
        self.state.manual_pump = 0;
        self.state.fire_zones = [false; ZONES];
        self.board.all_off()?;
        info!("actuator outputs off");
        Ok(())
    }

    fn move_door(&mut self, angle: f32) -> Result<(), GateError> {
        self.state.door_angle = angle;
        self.board.set_door_angle(angle)?;
        Ok(())
    }

    /// Rewrite the whole pump bank: only pump `k` on, or none for `0`.
    fn select_manual_pump(&mut self, k: u8) -> Result<(), GateError> {
        self.state.manual_pump = k;
        for i in 0..PUMPS {
            self.board.set_pump(i, i + 1 == usize::from(k))?;
        }
        Ok(())
    }
}
