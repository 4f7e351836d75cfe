//! [`AccessController`] – turns recognition events into link commands.
//!
//! Sits between the vision pipeline and the
//! [`CommandSender`][gate_middleware::CommandSender].  Every event passes the
//! same stages:
//!
//! 1. **Identity** – card detections above the confidence threshold replace
//!    the current [`Identity`].
//! 2. **Permission** – hand letters and pump numbers are checked against the
//!    [`PermissionMatrix`] for the current identity.  A denial is a normal
//!    outcome: it is logged and published, and nothing is sent.
//! 3. **Debounce** – the [`CommandDebouncer`] drops repeats inside its window.
//! 4. **Enqueue** – the command is handed to the channel without blocking.
//!
//! The controller also owns the operating [`Mode`].  Mode toggles are rate
//! limited by a [`Cooldown`] that is independent of the debouncer, and in
//! Automatic mode hand commands are ignored while fire-zone edges are
//! forwarded instead.
//!
//! # Example
//!
//! ```rust
//! use gate_kernel::PermissionMatrix;
//! use gate_middleware::command_channel;
//! use gate_runtime::access_controller::{AccessConfig, AccessController, GestureOutcome};
//! use gate_types::{Command, Identity, Letter};
//!
//! let (tx, mut rx) = command_channel(8);
//! let mut ctl = AccessController::new(PermissionMatrix::standard(), tx, AccessConfig::default());
//!
//! ctl.on_identity(Identity::Employee);
//! assert_eq!(ctl.on_gesture(Command::number(2).unwrap()), GestureOutcome::Denied);
//! assert_eq!(ctl.on_gesture(Command::Letter(Letter::L)), GestureOutcome::Forwarded);
//! assert_eq!(rx.try_recv(), Some(Command::Letter(Letter::L)));
//! ```

use std::time::Duration;

use gate_kernel::{
    Clock, CommandDebouncer, Cooldown, DEFAULT_DEBOUNCE_WINDOW, DEFAULT_TOGGLE_COOLDOWN,
    MonotonicClock, PermissionMatrix,
};
use gate_middleware::{CommandSender, EventBus, Topic};
use gate_types::{Command, Event, EventPayload, GateError, Identity, Mode, ZONE_COUNT};
use tracing::{debug, info, warn};

use crate::fire_zones::FireZoneTracker;
use crate::gesture::{GestureIntent, HandPose, HandSample, classify};

/// Default minimum card-classifier confidence.
pub const DEFAULT_CARD_THRESHOLD: f32 = 0.6;

const EVENT_SOURCE: &str = "gate-runtime::access";

/// Tunables for an [`AccessController`].
#[derive(Debug, Clone, PartialEq)]
pub struct AccessConfig {
    /// Detections must score strictly above this to count.
    pub card_threshold: f32,
    pub debounce_window: Duration,
    pub toggle_cooldown: Duration,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            card_threshold: DEFAULT_CARD_THRESHOLD,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            toggle_cooldown: DEFAULT_TOGGLE_COOLDOWN,
        }
    }
}

/// One card-classifier detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// `[x1, y1, x2, y2]` in image pixels.  Carried for display only.
    pub bbox: [f32; 4],
    pub label: String,
    pub score: f32,
}

/// Result of offering one command to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// Queued for the link.
    Forwarded,
    /// Same as the previous command inside the debounce window.
    Suppressed,
    /// The current identity may not issue this command.
    Denied,
    /// The channel refused it (full or closed).
    Dropped(GateError),
}

/// Result of a mode-toggle gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// The mode changed; the mode command and the all-off command were
    /// offered to the link in that order.
    Switched {
        mode: Mode,
        sent: Vec<(Command, GestureOutcome)>,
    },
    /// Too soon after the previous toggle.
    CoolingDown(Duration),
}

/// Result of one tracked hand.
#[derive(Debug, Clone, PartialEq)]
pub enum HandOutcome {
    Toggle(ToggleOutcome),
    Command(Command, GestureOutcome),
    /// A manual command recognised while in Automatic mode.
    IgnoredInAutomatic(Command),
    /// Nothing recognisable.
    Nothing,
}

/// Controller state machine.  Single-threaded; never blocks.
pub struct AccessController<C: Clock = MonotonicClock> {
    matrix: PermissionMatrix,
    debouncer: CommandDebouncer,
    toggle_cooldown: Cooldown,
    identity: Identity,
    mode: Mode,
    fire: FireZoneTracker,
    sender: CommandSender,
    bus: Option<EventBus>,
    card_threshold: f32,
    clock: C,
}

impl AccessController<MonotonicClock> {
    pub fn new(matrix: PermissionMatrix, sender: CommandSender, config: AccessConfig) -> Self {
        Self::with_clock(matrix, sender, config, MonotonicClock)
    }
}

impl<C: Clock> AccessController<C> {
    /// Build a controller driven by `clock`.
    pub fn with_clock(
        matrix: PermissionMatrix,
        sender: CommandSender,
        config: AccessConfig,
        clock: C,
    ) -> Self {
        Self {
            matrix,
            debouncer: CommandDebouncer::new(config.debounce_window),
            toggle_cooldown: Cooldown::new(config.toggle_cooldown),
            identity: Identity::Nobody,
            mode: Mode::Manual,
            fire: FireZoneTracker::new(),
            sender,
            bus: None,
            card_threshold: config.card_threshold,
            clock,
        }
    }

    /// Publish controller events on `bus`.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    pub fn fire_zones(&self) -> [bool; ZONE_COUNT as usize] {
        self.fire.burning()
    }

    /// Replace the current identity.  No permission check applies.
    pub fn on_identity(&mut self, identity: Identity) {
        if identity == self.identity {
            return;
        }
        let from = std::mem::replace(&mut self.identity, identity);
        info!(%from, to = %identity, "identity changed");
        self.emit(Topic::Access, EventPayload::IdentityChanged { from, to: identity });
    }

    /// Apply card detections in order.  Only those scoring above the
    /// threshold and naming a role count.  Returns the resulting identity.
    pub fn on_detections(&mut self, detections: &[Detection]) -> Identity {
        for det in detections {
            if det.score <= self.card_threshold {
                debug!(label = %det.label, score = det.score, "detection below threshold");
                continue;
            }
            match Identity::from_card_label(&det.label) {
                Some(identity) => self.on_identity(identity),
                None => debug!(label = %det.label, "detection names no role"),
            }
        }
        self.identity
    }

    /// Offer one candidate command.
    pub fn on_gesture(&mut self, cmd: Command) -> GestureOutcome {
        if cmd.requires_permission()
            && let Err(e) = self.matrix.check(self.identity, &cmd)
        {
            warn!(identity = %self.identity, command = %cmd, "{e}");
            self.emit(
                Topic::Access,
                EventPayload::AccessDenied {
                    identity: self.identity,
                    command: cmd,
                },
            );
            return GestureOutcome::Denied;
        }
        self.forward(cmd)
    }

    /// Handle the mode-toggle sign.
    pub fn on_mode_toggle_gesture(&mut self) -> ToggleOutcome {
        let now = self.clock.now();
        if !self.toggle_cooldown.try_fire(now) {
            return ToggleOutcome::CoolingDown(self.toggle_cooldown.remaining(now));
        }

        self.mode = self.mode.toggled();
        self.fire.reset();
        info!(mode = %self.mode, "mode changed");
        self.emit(Topic::System, EventPayload::ModeChanged(self.mode));

        let sent = [Command::SetMode(self.mode), Command::Fist]
            .into_iter()
            .map(|cmd| (cmd, self.forward(cmd)))
            .collect();
        ToggleOutcome::Switched {
            mode: self.mode,
            sent,
        }
    }

    /// Classify one tracked hand and act on it.
    pub fn on_hand(&mut self, sample: &HandSample) -> HandOutcome {
        self.on_pose(&sample.pose())
    }

    /// Like [`on_hand`][Self::on_hand] for an already reduced pose.
    pub fn on_pose(&mut self, pose: &HandPose) -> HandOutcome {
        match classify(pose) {
            GestureIntent::ModeToggle => HandOutcome::Toggle(self.on_mode_toggle_gesture()),
            GestureIntent::Candidate(cmd) if self.mode == Mode::Automatic => {
                debug!(command = %cmd, "manual gesture ignored in automatic mode");
                HandOutcome::IgnoredInAutomatic(cmd)
            }
            GestureIntent::Candidate(cmd) => HandOutcome::Command(cmd, self.on_gesture(cmd)),
            GestureIntent::Nothing => HandOutcome::Nothing,
        }
    }

    /// Feed one fire-sensor observation.  In Manual mode this is a no-op and
    /// the zone memory is left alone.
    pub fn on_fire_observation(
        &mut self,
        burning: [bool; ZONE_COUNT as usize],
    ) -> Vec<(Command, GestureOutcome)> {
        if self.mode != Mode::Automatic {
            return Vec::new();
        }
        self.fire
            .observe(burning)
            .into_iter()
            .map(|cmd| (cmd, self.forward(cmd)))
            .collect()
    }

    fn forward(&mut self, cmd: Command) -> GestureOutcome {
        if !self.debouncer.should_forward(cmd, self.clock.now()) {
            debug!(command = %cmd, "suppressed repeat");
            self.emit(Topic::Commands, EventPayload::CommandSuppressed(cmd));
            return GestureOutcome::Suppressed;
        }
        match self.sender.enqueue(cmd) {
            Ok(()) => {
                info!(command = %cmd, "forwarded");
                self.emit(Topic::Commands, EventPayload::CommandForwarded(cmd));
                GestureOutcome::Forwarded
            }
            Err(e) => {
                warn!(command = %cmd, error = %e, "command dropped");
                self.emit(
                    Topic::Commands,
                    EventPayload::CommandDropped {
                        command: cmd,
                        reason: e.to_string(),
                    },
                );
                GestureOutcome::Dropped(e)
            }
        }
    }

    fn emit(&self, topic: Topic, payload: EventPayload) {
        if let Some(bus) = &self.bus {
            // No subscribers is not an error for the controller.
            let _ = bus.publish_to(topic, Event::new(EVENT_SOURCE, payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_kernel::ManualClock;
    use gate_middleware::{CommandReceiver, LinkWriter, LinkWriterConfig, MemoryLink, command_channel};
    use gate_types::Letter;

    use crate::gesture::{FingerPattern, Handedness};

    fn num(n: u8) -> Command {
        Command::number(n).unwrap()
    }

    fn controller(capacity: usize) -> (AccessController<ManualClock>, CommandReceiver, ManualClock) {
        let (tx, rx) = command_channel(capacity);
        let clock = ManualClock::new();
        let ctl = AccessController::with_clock(
            PermissionMatrix::standard(),
            tx,
            AccessConfig::default(),
            clock.clone(),
        );
        (ctl, rx, clock)
    }

    fn drain(rx: &mut CommandReceiver) -> Vec<Command> {
        std::iter::from_fn(|| rx.try_recv()).collect()
    }

    fn pose(handedness: Handedness, bits: [u8; 5]) -> HandPose {
        HandPose {
            handedness,
            fingers: FingerPattern::from_bits(bits),
            pinch: false,
        }
    }

    fn card(label: &str, score: f32) -> Detection {
        Detection {
            bbox: [0.0, 0.0, 10.0, 10.0],
            label: label.to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn employee_scenario_reaches_the_door() {
        use gate_hal::{ActuatorInterpreter, sim::SimBoard};

        let link = MemoryLink::new();
        let writer = LinkWriter::spawn(
            link.clone(),
            LinkWriterConfig {
                poll_interval: Duration::from_millis(10),
                ..LinkWriterConfig::default()
            },
        );
        let mut ctl = AccessController::new(
            PermissionMatrix::standard(),
            writer.sender(),
            AccessConfig::default(),
        );

        ctl.on_identity(Identity::Employee);
        assert_eq!(ctl.on_gesture(num(2)), GestureOutcome::Denied);
        assert_eq!(ctl.on_gesture(Command::Letter(Letter::L)), GestureOutcome::Forwarded);

        let stats = writer.shutdown().await.expect("writer should stop");
        assert_eq!(stats.written, 1);
        assert_eq!(link.lines(), vec!["L"]);

        let (board, monitor) = SimBoard::new().build();
        let mut interp = ActuatorInterpreter::new(board);
        for line in link.lines() {
            interp.handle_line(&line);
        }
        assert_eq!(interp.state().door_angle, 90.0);
        assert_eq!(monitor.door.duty_now(), 4915);
    }

    #[test]
    fn nobody_is_denied_gated_commands_but_not_fist() {
        let (mut ctl, mut rx, _clock) = controller(8);
        assert_eq!(ctl.on_gesture(Command::Letter(Letter::O)), GestureOutcome::Denied);
        assert_eq!(ctl.on_gesture(num(1)), GestureOutcome::Denied);
        assert_eq!(ctl.on_gesture(Command::Fist), GestureOutcome::Forwarded);
        assert_eq!(drain(&mut rx), vec![Command::Fist]);
    }

    #[test]
    fn repeats_are_debounced() {
        let (mut ctl, mut rx, clock) = controller(8);
        ctl.on_identity(Identity::Master);

        assert_eq!(ctl.on_gesture(num(3)), GestureOutcome::Forwarded);
        assert_eq!(ctl.on_gesture(num(3)), GestureOutcome::Suppressed);
        clock.advance(Duration::from_millis(1600));
        assert_eq!(ctl.on_gesture(num(3)), GestureOutcome::Forwarded);
        assert_eq!(ctl.on_gesture(num(4)), GestureOutcome::Forwarded);
        assert_eq!(ctl.on_gesture(num(3)), GestureOutcome::Forwarded);
        assert_eq!(drain(&mut rx), vec![num(3), num(3), num(4), num(3)]);
    }

    #[test]
    fn denied_commands_do_not_touch_the_debouncer() {
        let (mut ctl, mut rx, _clock) = controller(8);
        ctl.on_identity(Identity::Chief);
        assert_eq!(ctl.on_gesture(num(1)), GestureOutcome::Forwarded);
        assert_eq!(ctl.on_gesture(num(3)), GestureOutcome::Denied);
        // The slot still holds NUMERO_1, so it is suppressed.
        assert_eq!(ctl.on_gesture(num(1)), GestureOutcome::Suppressed);
        assert_eq!(drain(&mut rx), vec![num(1)]);
    }

    #[test]
    fn detections_filter_by_threshold() {
        let (mut ctl, _rx, _clock) = controller(8);
        let id = ctl.on_detections(&[card("Tarjeta_Maestro", 0.6), card("Tarjeta_L", 0.99)]);
        assert_eq!(id, Identity::Nobody);

        let id = ctl.on_detections(&[card("Tarjeta_Jefe", 0.61), card("Tarjeta_Empleado", 0.9)]);
        assert_eq!(id, Identity::Employee);
        // Identity persists when nothing qualifies.
        assert_eq!(ctl.on_detections(&[]), Identity::Employee);
    }

    #[test]
    fn toggle_sends_mode_then_fist_and_respects_cooldown() {
        let (mut ctl, mut rx, clock) = controller(8);

        match ctl.on_mode_toggle_gesture() {
            ToggleOutcome::Switched { mode, sent } => {
                assert_eq!(mode, Mode::Automatic);
                assert!(sent.iter().all(|(_, o)| *o == GestureOutcome::Forwarded));
            }
            other => panic!("expected a switch, got {other:?}"),
        }
        assert_eq!(drain(&mut rx), vec![Command::SetMode(Mode::Automatic), Command::Fist]);

        clock.advance(Duration::from_secs(1));
        assert!(matches!(ctl.on_mode_toggle_gesture(), ToggleOutcome::CoolingDown(_)));
        assert_eq!(ctl.mode(), Mode::Automatic);

        clock.advance(Duration::from_millis(1100));
        assert!(matches!(
            ctl.on_mode_toggle_gesture(),
            ToggleOutcome::Switched { mode: Mode::Manual, .. }
        ));
        assert_eq!(drain(&mut rx), vec![Command::SetMode(Mode::Manual), Command::Fist]);
    }

    #[test]
    fn automatic_mode_ignores_manual_hands_and_forwards_fire_edges() {
        let (mut ctl, mut rx, _clock) = controller(16);
        ctl.on_identity(Identity::Master);

        // Fire observations do nothing in Manual mode.
        assert!(ctl.on_fire_observation([true, false, false]).is_empty());
        assert_eq!(ctl.fire_zones(), [false; 3]);

        assert!(matches!(
            ctl.on_pose(&pose(Handedness::Left, [1, 1, 0, 0, 1])),
            HandOutcome::Toggle(ToggleOutcome::Switched { .. })
        ));
        drain(&mut rx);

        assert_eq!(
            ctl.on_pose(&pose(Handedness::Right, [0, 1, 1, 0, 0])),
            HandOutcome::IgnoredInAutomatic(num(2))
        );

        let sent = ctl.on_fire_observation([true, false, true]);
        assert_eq!(sent.len(), 2);
        assert!(ctl.on_fire_observation([true, false, true]).is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![Command::fire(1, true).unwrap(), Command::fire(3, true).unwrap()]
        );
    }

    #[test]
    fn toggle_clears_fire_memory() {
        let (mut ctl, mut rx, clock) = controller(16);
        ctl.on_mode_toggle_gesture();
        ctl.on_fire_observation([false, true, false]);
        clock.advance(Duration::from_secs(3));
        ctl.on_mode_toggle_gesture();
        assert_eq!(ctl.fire_zones(), [false; 3]);
        clock.advance(Duration::from_secs(3));
        ctl.on_mode_toggle_gesture();
        drain(&mut rx);
        // Zone 2 is reported again as a fresh edge.
        assert_eq!(ctl.on_fire_observation([false, true, false]).len(), 1);
    }

    #[test]
    fn manual_hands_are_permission_checked() {
        let (mut ctl, mut rx, _clock) = controller(8);
        ctl.on_identity(Identity::Chief);
        assert_eq!(
            ctl.on_pose(&pose(Handedness::Right, [0, 1, 1, 1, 0])),
            HandOutcome::Command(num(3), GestureOutcome::Denied)
        );
        assert_eq!(
            ctl.on_pose(&pose(Handedness::Right, [0, 0, 0, 0, 0])),
            HandOutcome::Command(Command::Fist, GestureOutcome::Forwarded)
        );
        assert_eq!(drain(&mut rx), vec![Command::Fist]);
    }

    #[test]
    fn full_channel_reports_drop() {
        let (mut ctl, _rx, _clock) = controller(1);
        ctl.on_identity(Identity::Master);
        assert_eq!(ctl.on_gesture(num(1)), GestureOutcome::Forwarded);
        assert_eq!(
            ctl.on_gesture(num(2)),
            GestureOutcome::Dropped(GateError::ChannelFull(num(2)))
        );
    }

    #[tokio::test]
    async fn events_are_published_per_topic() {
        let bus = EventBus::default();
        let mut access = bus.subscribe_to(Topic::Access);
        let mut commands = bus.subscribe_to(Topic::Commands);
        let (tx, _rx) = command_channel(8);
        let mut ctl = AccessController::new(PermissionMatrix::standard(), tx, AccessConfig::default())
            .with_bus(bus.clone());

        ctl.on_identity(Identity::Employee);
        ctl.on_gesture(Command::Letter(Letter::V));
        ctl.on_gesture(Command::Letter(Letter::L));

        assert_eq!(
            access.recv().await.unwrap().payload,
            EventPayload::IdentityChanged {
                from: Identity::Nobody,
                to: Identity::Employee
            }
        );
        assert!(matches!(
            access.recv().await.unwrap().payload,
            EventPayload::AccessDenied { identity: Identity::Employee, .. }
        ));
        assert_eq!(
            commands.recv().await.unwrap().payload,
            EventPayload::CommandForwarded(Command::Letter(Letter::L))
        );
    }
}
