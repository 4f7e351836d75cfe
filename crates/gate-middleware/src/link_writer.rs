//! [`LinkWriter`] – background task that drains the command channel into the
//! actuator link.
//!
//! The writer opens its link once.  If that fails it logs a single warning
//! and keeps running in simulation mode: commands are still dequeued in order
//! and logged, but nothing is transmitted.  A write failure on a live link is
//! logged and the command is lost; it is never retried.
//!
//! Shutdown is cooperative.  [`LinkWriter::shutdown`] stops the channel from
//! accepting, signals the task, and waits a bounded time for it.  Whatever is
//! still queued when the signal arrives is flushed before the link is closed.

use std::time::Duration;

use gate_types::{Command, GateError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channel::{
    CommandReceiver, CommandSender, DEFAULT_CHANNEL_CAPACITY, Received, command_channel,
};
use crate::link::{LinkOpener, LinkPort, encode_frame};

/// Tuning knobs for a [`LinkWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkWriterConfig {
    /// Channel capacity.
    pub capacity: usize,
    /// How long one wait on the channel may block before the shutdown flag is
    /// re-checked.
    pub poll_interval: Duration,
    /// Upper bound on how long [`LinkWriter::shutdown`] waits for the task.
    pub join_timeout: Duration,
}

impl Default for LinkWriterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            poll_interval: Duration::from_secs(1),
            join_timeout: Duration::from_secs(1),
        }
    }
}

/// Counters reported by the writer task when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Frames successfully written to a live link.
    pub written: usize,
    /// Commands dequeued while in simulation mode.
    pub discarded: usize,
    /// Frames whose write failed.
    pub failed: usize,
    /// `true` when the link could not be opened.
    pub simulated: bool,
}

/// Handle to the running writer task.
#[derive(Debug)]
pub struct LinkWriter {
    sender: CommandSender,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<WriterStats>,
    join_timeout: Duration,
}

impl LinkWriter {
    /// Create the channel and spawn the writer on the current Tokio runtime.
    pub fn spawn<O: LinkOpener>(opener: O, config: LinkWriterConfig) -> Self {
        let (sender, receiver) = command_channel(config.capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(opener, receiver, shutdown_rx, config.poll_interval));
        Self {
            sender,
            shutdown_tx,
            handle,
            join_timeout: config.join_timeout,
        }
    }

    /// Queue `cmd` for transmission.  Never blocks.
    pub fn enqueue(&self, cmd: Command) -> Result<(), GateError> {
        self.sender.enqueue(cmd)
    }

    /// A producer handle for other components.
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Stop the writer and wait up to the configured join timeout.
    ///
    /// Returns the task's counters, or `None` when the task did not finish in
    /// time (it is abandoned) or panicked.
    pub async fn shutdown(self) -> Option<WriterStats> {
        self.sender.close();
        // The task may already have exited; a send error is harmless here.
        let _ = self.shutdown_tx.send(true);
        match tokio::time::timeout(self.join_timeout, self.handle).await {
            Ok(Ok(stats)) => {
                info!(
                    written = stats.written,
                    discarded = stats.discarded,
                    failed = stats.failed,
                    "link writer stopped"
                );
                Some(stats)
            }
            Ok(Err(e)) => {
                error!(error = %e, "link writer task failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.join_timeout, "link writer did not stop in time; abandoning");
                None
            }
        }
    }
}

async fn run<O: LinkOpener>(
    opener: O,
    mut rx: CommandReceiver,
    mut shutdown: watch::Receiver<bool>,
    poll: Duration,
) -> WriterStats {
    let target = opener.describe();
    let opened = tokio::task::spawn_blocking(move || opener.open())
        .await
        .map_err(|e| GateError::LinkUnavailable(e.to_string()))
        .and_then(|r| r);

    let mut port = match opened {
        Ok(port) => {
            info!(link = %target, "link open");
            Some(port)
        }
        Err(e) => {
            warn!(link = %target, error = %e, "link unavailable, running in simulation mode");
            None
        }
    };
    let mut stats = WriterStats {
        simulated: port.is_none(),
        ..WriterStats::default()
    };

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = rx.recv_timeout(poll) => match received {
                Received::Command(cmd) => deliver(&mut port, cmd, &mut stats).await,
                Received::Idle => {}
                Received::Closed => break,
            }
        }
    }

    rx.close();
    while let Some(cmd) = rx.try_recv() {
        deliver(&mut port, cmd, &mut stats).await;
    }

    if let Some(mut p) = port {
        let closed = tokio::task::spawn_blocking(move || p.close()).await;
        if let Ok(Err(e)) = closed {
            warn!(error = %e, "closing link failed");
        }
    }
    stats
}

async fn deliver(port: &mut Option<Box<dyn LinkPort>>, cmd: Command, stats: &mut WriterStats) {
    let Some(mut p) = port.take() else {
        debug!(command = %cmd, "simulated send");
        stats.discarded += 1;
        return;
    };

    let frame = encode_frame(&cmd);
    match tokio::task::spawn_blocking(move || {
        let result = p.write_frame(&frame);
        (p, result)
    })
    .await
    {
        Ok((p, result)) => {
            *port = Some(p);
            match result {
                Ok(()) => {
                    debug!(command = %cmd, "sent");
                    stats.written += 1;
                }
                Err(e) => {
                    error!(command = %cmd, error = %e, "link write failed");
                    stats.failed += 1;
                }
            }
        }
        Err(e) => {
            // The port was lost with the panicking task; fall back to simulation.
            error!(command = %cmd, error = %e, "link write task failed");
            stats.failed += 1;
        }
    }
}
