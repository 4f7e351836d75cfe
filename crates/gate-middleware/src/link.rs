//! The outbound link to the actuator board.
//!
//! The [`LinkWriter`][crate::link_writer::LinkWriter] never speaks to a
//! serial device directly.  It asks a [`LinkOpener`] for a [`LinkPort`] once
//! at start-up and pushes newline-terminated frames through it.  When the
//! opener fails the writer runs in simulation mode instead.
//!
//! # Overview
//!
//! - [`SerialOpener`] / [`SerialLink`] – a real serial device via `serialport`.
//! - [`NoLink`] – always unavailable; forces simulation mode.
//! - [`MemoryLink`] – in-memory capture, used by tests and the local shell.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gate_types::{Command, GateError};

/// Default baud rate of the actuator board.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// An open, writable link.
///
/// Implementations are driven from a blocking context
/// ([`tokio::task::spawn_blocking`]), so they may block on I/O.
pub trait LinkPort: Send {
    /// Write one complete frame and flush it.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), GateError>;

    /// Release the underlying device.
    fn close(&mut self) -> Result<(), GateError> {
        Ok(())
    }
}

/// Factory for a [`LinkPort`].  Called exactly once per writer.
pub trait LinkOpener: Send + 'static {
    fn open(&self) -> Result<Box<dyn LinkPort>, GateError>;

    /// Human-readable target, e.g. `"/dev/serial0@115200"`.
    fn describe(&self) -> String;
}

/// Encode `cmd` as its wire frame: the token followed by `'\n'`.
pub fn encode_frame(cmd: &Command) -> Vec<u8> {
    let mut frame = cmd.to_string().into_bytes();
    frame.push(b'\n');
    frame
}

/// Platform default serial device.
pub fn default_port() -> &'static str {
    if cfg!(windows) { "COM3" } else { "/dev/serial0" }
}

// ---------------------------------------------------------------------------
// Serial
// ---------------------------------------------------------------------------

/// Serial device parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Opens a serial device described by a [`SerialConfig`].
#[derive(Debug, Clone)]
pub struct SerialOpener {
    config: SerialConfig,
}

impl SerialOpener {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

impl LinkOpener for SerialOpener {
    fn open(&self) -> Result<Box<dyn LinkPort>, GateError> {
        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.timeout)
            .open()
            .map_err(|e| GateError::LinkUnavailable(format!("{}: {e}", self.describe())))?;
        Ok(Box::new(SerialLink { port }))
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.config.port, self.config.baud_rate)
    }
}

/// An open serial device.
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
}

impl LinkPort for SerialLink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), GateError> {
        self.port
            .write_all(frame)
            .and_then(|()| self.port.flush())
            .map_err(|e| GateError::LinkWrite(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Simulation / capture
// ---------------------------------------------------------------------------

/// An opener that never succeeds.
#[derive(Debug, Clone, Default)]
pub struct NoLink;

impl LinkOpener for NoLink {
    fn open(&self) -> Result<Box<dyn LinkPort>, GateError> {
        Err(GateError::LinkUnavailable("no link configured".to_string()))
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

/// Shared in-memory sink.  Every clone writes into the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    buffer: Arc<Mutex<Vec<u8>>>,
    fail_writes: bool,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A link whose every write fails with [`GateError::LinkWrite`].
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Raw bytes written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Written frames without their terminators.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.bytes())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl LinkOpener for MemoryLink {
    fn open(&self) -> Result<Box<dyn LinkPort>, GateError> {
        Ok(Box::new(self.clone()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl LinkPort for MemoryLink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), GateError> {
        if self.fail_writes {
            return Err(GateError::LinkWrite("memory link rejects writes".to_string()));
        }
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(frame);
        Ok(())
    }
}
