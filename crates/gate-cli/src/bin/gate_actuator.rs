//! `gate-actuator` – the receiving end of the link, on simulated drivers.
//!
//! ```text
//! gate-actuator [PORT] [BAUD]
//! ```
//!
//! Reads newline-terminated command tokens from `PORT` (115200 baud unless
//! given) or, without arguments, from stdin, and applies them to a board
//! whose outputs are logged instead of driven.  On end of input or Ctrl-C
//! every output is switched off before exiting.

use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use tracing::{error, info, warn};

use gate_hal::delay::StdDelay;
use gate_hal::sim::SimBoard;
use gate_hal::{ActuatorInterpreter, ThreadedReader, serve};
use gate_middleware::link::DEFAULT_BAUD_RATE;

const READ_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let _tracing = gate_runtime::init_tracing("gate-actuator");

    let mut args = std::env::args().skip(1);
    let port = args.next();
    let baud_rate = match args.next().map(|b| b.parse::<u32>()) {
        None => DEFAULT_BAUD_RATE,
        Some(Ok(baud)) => baud,
        Some(Err(e)) => {
            eprintln!("{}: {}", "Invalid baud rate".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        stop_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let (board, _monitor) = SimBoard::new().with_delay(Box::new(StdDelay)).build();
    let mut interpreter = ActuatorInterpreter::new(board);
    if let Err(e) = interpreter.boot() {
        error!(error = %e, "boot failed");
        return ExitCode::FAILURE;
    }

    let result = match port {
        Some(port) => {
            match serialport::new(&port, baud_rate).timeout(READ_TIMEOUT).open() {
                Ok(link) => {
                    info!(%port, baud_rate, "listening on serial port");
                    serve(BufReader::new(link), &mut interpreter, &stop)
                }
                Err(e) => {
                    eprintln!("{} {}: {}", "Cannot open".red(), port, e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => {
            info!("listening on stdin");
            serve(
                ThreadedReader::spawn(io::stdin(), READ_TIMEOUT),
                &mut interpreter,
                &stop,
            )
        }
    };

    if let Err(e) = interpreter.shutdown() {
        warn!(error = %e, "could not switch outputs off");
    }

    match result {
        Ok(stats) => {
            println!(
                "  {} commands applied, {} rejected.",
                stats.applied, stats.rejected
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "link read failed");
            ExitCode::FAILURE
        }
    }
}
