//! Topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  The bus is purely observational: nothing on the command path
//! waits for a subscriber.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Access`] | Identity changes and denied commands |
//! | [`Topic::Commands`] | Forwarded, suppressed and dropped commands |
//! | [`Topic::System`] | Mode changes and link state |

use gate_types::{Event, GateError};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Access,
    Commands,
    System,
}

/// Shared event bus.  Clone it cheaply; all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    access: broadcast::Sender<Event>,
    commands: broadcast::Sender<Event>,
    system: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus.  `capacity` is applied to every topic independently.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (access, _) = broadcast::channel(capacity);
        let (commands, _) = broadcast::channel(capacity);
        let (system, _) = broadcast::channel(capacity);
        Self {
            access,
            commands,
            system,
        }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of receivers handed the event, or
    /// [`GateError::Bus`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, GateError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| GateError::Bus(format!("no subscribers for topic {topic:?}")))
    }

    /// Subscribe to a single topic.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Access => &self.access,
            Topic::Commands => &self.commands,
            Topic::System => &self.system,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`].
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   events were dropped.
    /// * `Err(RecvError::Closed)` – every bus handle is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
