//! `gesturegate` – the controller-side binary.
//!
//! 1. Loads `~/.gesturegate/config.toml`, writing the defaults on first run.
//! 2. Starts the link writer on the configured serial port.  When the port
//!    cannot be opened the writer runs in simulation mode and only logs.
//! 3. Drops the operator into a shell that feeds card, hand and fire-sensor
//!    events to the access controller (`/help` lists them).
//! 4. On `/quit` or Ctrl-C, closes the queue and waits briefly for the
//!    writer to drain.

mod config;
mod repl;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use tracing::warn;

use gate_kernel::PermissionMatrix;
use gate_middleware::{EventBus, LinkWriter, SerialOpener};
use gate_runtime::AccessController;

use crate::config::Config;
use crate::repl::Shell;

fn main() {
    let _tracing = gate_runtime::init_tracing("gesturegate");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use /quit to exit");
    }

    let cfg = load_config();
    let matrix = cfg.permission_matrix().unwrap_or_else(|e| {
        println!("{}: {}", "Permission table error".red(), e);
        println!("  Using the built-in permission matrix.");
        PermissionMatrix::standard()
    });

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    println!(
        "  Link: {} @ {} baud",
        cfg.serial_port.bold(),
        cfg.baud_rate
    );
    let writer = {
        let _guard = rt.enter();
        LinkWriter::spawn(SerialOpener::new(cfg.serial_config()), cfg.writer_config())
    };

    let bus = EventBus::default();
    let controller =
        AccessController::new(matrix, writer.sender(), cfg.access_config()).with_bus(bus.clone());
    let mut shell = Shell::new(controller, writer.sender(), &bus);

    println!(
        "\n  Type {} for available commands.\n",
        "/help".bold().cyan()
    );
    repl::run(&mut shell, shutdown);
    println!(
        "  Leaving in {} mode as {}.",
        shell.controller().mode(),
        shell.controller().identity()
    );

    match rt.block_on(writer.shutdown()) {
        Some(stats) => println!(
            "  Link writer stopped: {} written, {} simulated, {} failed, {} discarded.",
            stats.written, stats.simulated, stats.failed, stats.discarded
        ),
        None => println!("{}", "  Link writer did not stop in time.".yellow()),
    }
}

fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            match config::save(&Config::default()) {
                Ok(()) => println!(
                    "  First run: wrote defaults to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Could not write default config".yellow(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", "  ┌──────────────────────────────┐".cyan());
    println!("{}", "  │   GestureGate controller     │".cyan().bold());
    println!("{}", "  └──────────────────────────────┘".cyan());
    println!("  {}", "gesture and ID-card command dispatch".dimmed());
    println!();
}
