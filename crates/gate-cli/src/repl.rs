//! Operator shell: feeds recognition events to the access controller by hand.
//!
//! Supported slash-commands:
//!   /card <label> <score>          – a card detection (`Maestro`, `Jefe`, `Empleado`)
//!   /hand <Left|Right> <t i m r p> [pinch] – a hand pose, fingers as 0/1
//!   /gesture <TOKEN>               – a hand command: `L`, `O`, `V`, `NUMERO_n` or the fist
//!   /toggle                        – the mode-toggle sign
//!   /fire <z1> <z2> <z3>           – fire-sensor observation, zones as 0/1
//!   /status                        – identity, mode and allowed commands
//!   /help                          – show this list
//!   /quit | /exit                  – leave the shell

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use colored::Colorize;
use gate_kernel::{Clock, MonotonicClock};
use gate_middleware::{CommandSender, EventBus, Topic, TopicReceiver};
use gate_runtime::{
    AccessController, Detection, FingerPattern, HandOutcome, HandPose, Handedness, ToggleOutcome,
};
use gate_types::{Command, EventPayload, Mode, ZONE_COUNT};
use tokio::sync::broadcast::error::TryRecvError;

/// How often the shell wakes to look at the shutdown flag while idle.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Card { label: String, score: f32 },
    Hand(HandPose),
    Gesture(Command),
    Toggle,
    Fire([bool; ZONE_COUNT as usize]),
    Status,
    Help,
    Quit,
}

/// Whether the shell should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Parse one line.  The error is a message for the operator.
pub fn parse(line: &str) -> Result<ShellCommand, String> {
    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match head {
        "/card" => {
            let [label, score] = args.as_slice() else {
                return Err("usage: /card <label> <score>".to_string());
            };
            let score = score
                .parse::<f32>()
                .map_err(|_| format!("score must be a number, got '{score}'"))?;
            Ok(ShellCommand::Card {
                label: label.to_string(),
                score,
            })
        }
        "/hand" => {
            if args.len() != 6 && args.len() != 7 {
                return Err("usage: /hand <Left|Right> <t i m r p> [pinch]".to_string());
            }
            let handedness: Handedness = args[0].parse().map_err(|e| format!("{e}"))?;
            let mut bits = [0u8; 5];
            for (slot, word) in bits.iter_mut().zip(&args[1..6]) {
                *slot = parse_flag(word)?;
            }
            let pinch = match args.get(6) {
                None => false,
                Some(&"pinch") => true,
                Some(other) => return Err(format!("expected 'pinch', got '{other}'")),
            };
            Ok(ShellCommand::Hand(HandPose {
                handedness,
                fingers: FingerPattern::from_bits(bits),
                pinch,
            }))
        }
        "/gesture" => {
            let [token] = args.as_slice() else {
                return Err("usage: /gesture <TOKEN>".to_string());
            };
            match token.parse::<Command>().map_err(|e| e.to_string())? {
                cmd @ (Command::Letter(_) | Command::Number(_) | Command::Fist) => {
                    Ok(ShellCommand::Gesture(cmd))
                }
                Command::SetMode(_) => Err("mode changes go through /toggle".to_string()),
                Command::Fire { .. } => Err("fire zones are reported with /fire".to_string()),
            }
        }
        "/fire" => {
            let mut zones = [false; ZONE_COUNT as usize];
            if args.len() != zones.len() {
                return Err("usage: /fire <z1> <z2> <z3>".to_string());
            }
            for (slot, word) in zones.iter_mut().zip(&args) {
                *slot = parse_flag(word)? == 1;
            }
            Ok(ShellCommand::Fire(zones))
        }
        "/toggle" if args.is_empty() => Ok(ShellCommand::Toggle),
        "/status" if args.is_empty() => Ok(ShellCommand::Status),
        "/help" => Ok(ShellCommand::Help),
        "/quit" | "/exit" => Ok(ShellCommand::Quit),
        other => Err(format!("unknown command '{other}'")),
    }
}

fn parse_flag(word: &str) -> Result<u8, String> {
    match word {
        "0" => Ok(0),
        "1" => Ok(1),
        other => Err(format!("expected 0 or 1, got '{other}'")),
    }
}

/// The shell's state: the controller, a handle on its queue, and the event
/// feed it prints from.
pub struct Shell<C: Clock = MonotonicClock> {
    controller: AccessController<C>,
    queue: CommandSender,
    feed: Vec<TopicReceiver>,
}

impl<C: Clock> Shell<C> {
    /// `bus` must be the one the controller publishes on.
    pub fn new(controller: AccessController<C>, queue: CommandSender, bus: &EventBus) -> Self {
        // Drained in this order after every command, so a toggle prints the
        // mode change before the commands it sent.
        let feed = [Topic::Access, Topic::System, Topic::Commands]
            .into_iter()
            .map(|topic| bus.subscribe_to(topic))
            .collect();
        Self {
            controller,
            queue,
            feed,
        }
    }

    pub fn controller(&self) -> &AccessController<C> {
        &self.controller
    }

    /// Run one command against the controller and print what happened.
    ///
    /// Forwarded, suppressed, denied and dropped commands, identity and mode
    /// changes come from the event feed; only outcomes the controller does
    /// not publish are printed here.
    pub fn execute(&mut self, cmd: ShellCommand) -> Flow {
        match cmd {
            ShellCommand::Card { label, score } => {
                let before = self.controller.identity();
                let detection = Detection {
                    bbox: [0.0; 4],
                    label,
                    score,
                };
                if self.controller.on_detections(&[detection]) == before {
                    println!("  identity unchanged: {}", before.to_string().bold());
                }
            }
            ShellCommand::Hand(pose) => match self.controller.on_pose(&pose) {
                HandOutcome::Toggle(outcome) => print_cooldown(&outcome),
                HandOutcome::Command(..) => {}
                HandOutcome::IgnoredInAutomatic(cmd) => {
                    println!("  {} ignored in AUTOMATIC mode", cmd.to_string().yellow());
                }
                HandOutcome::Nothing => println!("  {}", "no gesture recognised".dimmed()),
            },
            ShellCommand::Gesture(cmd) => {
                self.controller.on_gesture(cmd);
            }
            ShellCommand::Toggle => {
                let outcome = self.controller.on_mode_toggle_gesture();
                print_cooldown(&outcome);
            }
            ShellCommand::Fire(zones) => {
                if self.controller.on_fire_observation(zones).is_empty() {
                    let reason = match self.controller.mode() {
                        Mode::Automatic => "no zone changed",
                        Mode::Manual => "fire sensors are ignored in MANUAL mode",
                    };
                    println!("  {}", reason.dimmed());
                }
            }
            ShellCommand::Status => self.print_status(),
            ShellCommand::Help => print_help(),
            ShellCommand::Quit => {
                println!("{}", "Goodbye.".green());
                return Flow::Quit;
            }
        }
        self.print_events();
        Flow::Continue
    }

    /// Print and consume everything published since the last call.
    fn print_events(&mut self) -> usize {
        let mut printed = 0;
        for rx in &mut self.feed {
            loop {
                match rx.try_recv() {
                    Ok(event) => {
                        println!("  {}", describe(&event.payload));
                        printed += 1;
                    }
                    Err(TryRecvError::Lagged(n)) => {
                        println!("  {}", format!("… {n} events not shown").dimmed());
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
        }
        printed
    }

    fn print_status(&self) {
        let identity = self.controller.identity();
        let allowed: Vec<String> = self
            .controller
            .matrix()
            .allowed(identity)
            .map(ToString::to_string)
            .collect();
        let zones: Vec<&str> = self
            .controller
            .fire_zones()
            .iter()
            .map(|&on| if on { "1" } else { "0" })
            .collect();

        println!("  {:<10} {}", "identity".bold(), identity);
        println!("  {:<10} {}", "mode".bold(), self.controller.mode());
        println!("  {:<10} {}", "fire".bold(), zones.join(" "));
        println!(
            "  {:<10} {}",
            "allowed".bold(),
            if allowed.is_empty() {
                "-".to_string()
            } else {
                allowed.join(", ")
            }
        );
        println!("  {:<10} {}", "queued".bold(), self.queue.pending());
        if !self.queue.is_accepting() {
            println!("  {}", "link writer is not accepting commands".red());
        }
    }
}

fn describe(payload: &EventPayload) -> String {
    match payload {
        EventPayload::IdentityChanged { from, to } => {
            format!("identity {} → {}", from, to.to_string().bold().green())
        }
        EventPayload::AccessDenied { identity, command } => format!(
            "{} {} may not issue {}",
            "ACCESS DENIED".red().bold(),
            identity,
            command
        ),
        EventPayload::CommandForwarded(cmd) => format!("{} {}", "→".green(), cmd.to_string().bold()),
        EventPayload::CommandSuppressed(cmd) => {
            format!("{} {} (repeat)", "·".dimmed(), cmd.to_string().dimmed())
        }
        EventPayload::CommandDropped { command, reason } => {
            format!("{} {}: {}", "dropped".yellow(), command, reason)
        }
        EventPayload::ModeChanged(mode) => format!("mode → {}", mode.to_string().bold().cyan()),
    }
}

fn print_cooldown(outcome: &ToggleOutcome) {
    if let ToggleOutcome::CoolingDown(left) = outcome {
        println!("  {} ({:.1}s left)", "toggle cooling down".yellow(), left.as_secs_f32());
    }
}

fn print_help() {
    println!();
    println!("{}", "Available commands:".bold().underline());
    println!("  {}  – card detection, e.g. /card Empleado 0.9", "/card <label> <score>".bold().cyan());
    println!("  {}  – hand pose, fingers thumb..pinky as 0/1", "/hand <Left|Right> <t i m r p> [pinch]".bold().cyan());
    println!("  {}  – a command token, e.g. /gesture L", "/gesture <TOKEN>".bold().cyan());
    println!("  {}  – the mode-toggle sign", "/toggle".bold().cyan());
    println!("  {}  – fire-sensor zones as 0/1", "/fire <z1> <z2> <z3>".bold().cyan());
    println!("  {}  – identity, mode and queue", "/status".bold().cyan());
    println!("  {}  – show this help", "/help".bold().cyan());
    println!("  {}  – exit", "/quit".bold().cyan());
    println!();
}

/// Drive `shell` from stdin until `/quit`, end of input, or `shutdown`.
///
/// Stdin is read on its own thread so a Ctrl-C is noticed without waiting
/// for the next line.
pub fn run<C: Clock>(shell: &mut Shell<C>, shutdown: Arc<AtomicBool>) {
    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("{}: {}", "Read error".red(), e);
                    break;
                }
            }
        }
    });

    prompt();
    while !shutdown.load(Ordering::SeqCst) {
        let line = match line_rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let line = line.trim();
        if !line.is_empty() {
            match parse(line) {
                Ok(cmd) => {
                    if shell.execute(cmd) == Flow::Quit {
                        shutdown.store(true, Ordering::SeqCst);
                        break;
                    }
                }
                Err(msg) => println!(
                    "{} {}. Type {} for available commands.",
                    "Error:".red(),
                    msg,
                    "/help".bold()
                ),
            }
        }
        prompt();
    }
}

fn prompt() {
    print!("{} ", "gate>".bold().cyan());
    io::stdout().flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_kernel::{ManualClock, PermissionMatrix};
    use gate_middleware::{CommandReceiver, command_channel};
    use gate_runtime::AccessConfig;
    use gate_types::{Identity, Letter};

    fn shell() -> (Shell<ManualClock>, CommandReceiver, ManualClock) {
        let (tx, rx) = command_channel(16);
        let clock = ManualClock::new();
        let bus = EventBus::default();
        let controller = AccessController::with_clock(
            PermissionMatrix::standard(),
            tx.clone(),
            AccessConfig::default(),
            clock.clone(),
        )
        .with_bus(bus.clone());
        (Shell::new(controller, tx, &bus), rx, clock)
    }

    fn drain(rx: &mut CommandReceiver) -> Vec<String> {
        std::iter::from_fn(|| rx.try_recv()).map(|c| c.to_string()).collect()
    }

    #[test]
    fn parses_card_and_hand() {
        assert_eq!(
            parse("/card Empleado 0.92").unwrap(),
            ShellCommand::Card {
                label: "Empleado".to_string(),
                score: 0.92
            }
        );
        assert_eq!(
            parse("/hand left 1 1 0 0 0 pinch").unwrap(),
            ShellCommand::Hand(HandPose {
                handedness: Handedness::Left,
                fingers: FingerPattern::from_bits([1, 1, 0, 0, 0]),
                pinch: true,
            })
        );
    }

    #[test]
    fn parses_gesture_and_fire() {
        assert_eq!(
            parse("/gesture NUMERO_3").unwrap(),
            ShellCommand::Gesture(Command::number(3).unwrap())
        );
        assert_eq!(parse("/gesture PUNO_CERRADO").unwrap(), ShellCommand::Gesture(Command::Fist));
        assert_eq!(parse("/fire 0 1 0").unwrap(), ShellCommand::Fire([false, true, false]));
        assert_eq!(parse("/exit").unwrap(), ShellCommand::Quit);
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(parse("/card employee").is_err());
        assert!(parse("/card employee high").is_err());
        assert!(parse("/hand Up 1 1 1 1 1").is_err());
        assert!(parse("/hand Left 1 1 2 0 0").is_err());
        assert!(parse("/hand Left 1 1 0 0 0 fist").is_err());
        assert!(parse("/gesture NUMERO_9").is_err());
        assert!(parse("/gesture MODO_AUTO").is_err());
        assert!(parse("/gesture MODO_MANUAL").is_err());
        assert!(parse("/gesture FUEGO_1_ON").is_err());
        assert!(parse("/fire 1 1").is_err());
        assert!(parse("/toggle now").is_err());
        assert!(parse("/reboot").is_err());
    }

    #[test]
    fn employee_can_open_door_only_after_badging() {
        let (mut shell, mut rx, _clock) = shell();

        shell.execute(parse("/gesture L").unwrap());
        assert!(drain(&mut rx).is_empty());

        shell.execute(parse("/card Empleado 0.4").unwrap());
        assert_eq!(shell.controller().identity(), Identity::Nobody);
        shell.execute(parse("/card Empleado 0.9").unwrap());
        assert_eq!(shell.controller().identity(), Identity::Employee);
        shell.execute(parse("/hand Left 1 1 0 0 0").unwrap());
        assert_eq!(drain(&mut rx), vec![Command::Letter(Letter::L).to_string()]);
    }

    #[test]
    fn toggle_then_fire_reaches_the_queue() {
        let (mut shell, mut rx, _clock) = shell();

        shell.execute(ShellCommand::Toggle);
        assert_eq!(shell.controller().mode(), Mode::Automatic);
        shell.execute(parse("/fire 1 0 0").unwrap());

        assert_eq!(drain(&mut rx), vec!["MODO_AUTO", "PUÑO_CERRADO", "FUEGO_1_ON"]);
    }

    #[test]
    fn event_feed_is_drained_once() {
        let (mut shell, _rx, _clock) = shell();
        shell.controller.on_gesture(Command::Letter(Letter::V));
        shell.controller.on_mode_toggle_gesture();
        // Denial, mode change, then MODO_AUTO and the fist.
        assert_eq!(shell.print_events(), 4);
        assert_eq!(shell.print_events(), 0);
    }

    #[test]
    fn toggle_cooldown_blocks_a_quick_second_toggle() {
        let (mut shell, mut rx, clock) = shell();
        shell.execute(ShellCommand::Toggle);
        shell.execute(ShellCommand::Toggle);
        assert_eq!(shell.controller().mode(), Mode::Automatic);

        clock.advance(std::time::Duration::from_millis(2100));
        shell.execute(ShellCommand::Toggle);
        assert_eq!(shell.controller().mode(), Mode::Manual);
        assert_eq!(
            drain(&mut rx),
            vec!["MODO_AUTO", "PUÑO_CERRADO", "MODO_MANUAL", "PUÑO_CERRADO"]
        );
    }

    #[test]
    fn quit_stops_the_loop() {
        let (mut shell, _rx, _clock) = shell();
        assert_eq!(shell.execute(ShellCommand::Status), Flow::Continue);
        assert_eq!(shell.execute(ShellCommand::Quit), Flow::Quit);
    }
}
