//! Bounded FIFO command channel between the recognition loop and the
//! [`LinkWriter`][crate::link_writer::LinkWriter].
//!
//! Built on [`tokio::sync::mpsc`], so order is preserved exactly and there is
//! no coalescing at this layer.  The producer side never blocks:
//! [`CommandSender::enqueue`] either queues the command or refuses it
//! immediately (newest dropped when full, everything refused once the channel
//! stops accepting).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gate_types::{Command, GateError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Default number of queued-but-unsent commands.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Create a channel holding at most `capacity` commands (minimum 1).
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let accepting = Arc::new(AtomicBool::new(true));
    (
        CommandSender {
            tx,
            accepting: Arc::clone(&accepting),
        },
        CommandReceiver { rx, accepting },
    )
}

/// Producer handle.  Clone it freely; all clones feed the same queue.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
    accepting: Arc<AtomicBool>,
}

impl CommandSender {
    /// Queue `cmd` without blocking.
    ///
    /// # Errors
    ///
    /// - [`GateError::ChannelFull`] – the queue is at capacity; `cmd` (the
    ///   newest command) is dropped.
    /// - [`GateError::ChannelClosed`] – shutdown has begun.
    pub fn enqueue(&self, cmd: Command) -> Result<(), GateError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(GateError::ChannelClosed);
        }
        match self.tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) => {
                debug!(command = %cmd, "command channel full");
                Err(GateError::ChannelFull(cmd))
            }
            Err(TrySendError::Closed(_)) => Err(GateError::ChannelClosed),
        }
    }

    /// Stop accepting new commands.  Already queued commands stay queued.
    pub fn close(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Number of commands currently waiting in the queue.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Outcome of a bounded wait on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Command(Command),
    /// The poll interval elapsed with nothing queued.
    Idle,
    /// Every sender is gone and the queue is empty.
    Closed,
}

/// Consumer handle.  Exactly one exists per channel.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
    accepting: Arc<AtomicBool>,
}

impl CommandReceiver {
    /// Wait up to `poll` for the next command.
    pub async fn recv_timeout(&mut self, poll: Duration) -> Received {
        match tokio::time::timeout(poll, self.rx.recv()).await {
            Ok(Some(cmd)) => Received::Command(cmd),
            Ok(None) => Received::Closed,
            Err(_) => Received::Idle,
        }
    }

    /// Take the next queued command without waiting.
    pub fn try_recv(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }

    /// Refuse further sends.  Queued commands can still be drained with
    /// [`try_recv`][Self::try_recv].
    pub fn close(&mut self) {
        self.accepting.store(false, Ordering::Release);
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_types::{Letter, Mode};

    fn sample() -> Vec<Command> {
        vec![
            Command::Letter(Letter::L),
            Command::number(3).unwrap(),
            Command::Letter(Letter::L),
            Command::SetMode(Mode::Automatic),
            Command::fire(2, true).unwrap(),
            Command::Fist,
        ]
    }

    #[tokio::test]
    async fn dequeue_order_equals_enqueue_order() {
        let (tx, mut rx) = command_channel(16);
        for cmd in sample() {
            tx.enqueue(cmd).unwrap();
        }
        let mut out = Vec::new();
        while let Received::Command(cmd) = rx.recv_timeout(Duration::from_millis(10)).await {
            out.push(cmd);
        }
        assert_eq!(out, sample());
    }

    #[tokio::test]
    async fn order_holds_across_producer_clones() {
        let (tx, mut rx) = command_channel(16);
        let tx2 = tx.clone();
        let cmds = sample();
        for (i, cmd) in cmds.iter().enumerate() {
            if i % 2 == 0 {
                tx.enqueue(*cmd).unwrap();
            } else {
                tx2.enqueue(*cmd).unwrap();
            }
        }
        for expected in cmds {
            assert_eq!(rx.try_recv(), Some(expected));
        }
    }

    #[test]
    fn full_channel_drops_newest() {
        let (tx, mut rx) = command_channel(2);
        tx.enqueue(Command::number(1).unwrap()).unwrap();
        tx.enqueue(Command::number(2).unwrap()).unwrap();
        let err = tx.enqueue(Command::number(3).unwrap()).unwrap_err();
        assert_eq!(err, GateError::ChannelFull(Command::number(3).unwrap()));
        assert_eq!(tx.pending(), 2);

        assert_eq!(rx.try_recv(), Command::number(1).ok());
        assert_eq!(rx.try_recv(), Command::number(2).ok());
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn closed_sender_refuses_but_keeps_queue() {
        let (tx, mut rx) = command_channel(4);
        tx.enqueue(Command::Fist).unwrap();
        tx.close();
        assert!(!tx.is_accepting());
        assert_eq!(tx.enqueue(Command::Fist), Err(GateError::ChannelClosed));
        assert_eq!(rx.try_recv(), Some(Command::Fist));
    }

    #[test]
    fn receiver_close_refuses_all_clones() {
        let (tx, mut rx) = command_channel(4);
        let tx2 = tx.clone();
        rx.close();
        assert_eq!(tx2.enqueue(Command::Fist), Err(GateError::ChannelClosed));
    }

    #[tokio::test]
    async fn idle_poll_returns_without_command() {
        let (_tx, mut rx) = command_channel(4);
        assert_eq!(rx.recv_timeout(Duration::from_millis(5)).await, Received::Idle);
    }

    #[tokio::test]
    async fn dropped_senders_close_the_channel() {
        let (tx, mut rx) = command_channel(4);
        drop(tx);
        assert_eq!(rx.recv_timeout(Duration::from_millis(50)).await, Received::Closed);
    }
}
