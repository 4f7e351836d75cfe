//! `gate-middleware` – moves commands and events between components.
//!
//! # Modules
//!
//! - [`channel`] – bounded, non-blocking FIFO of [`Command`][gate_types::Command]s.
//! - [`link`] – the outbound byte link (serial, in-memory, or none).
//! - [`link_writer`] – background task draining the channel into the link,
//!   with simulation mode and bounded shutdown.
//! - [`bus`] – topic-based broadcast bus for observability events.

pub mod bus;
pub mod channel;
pub mod link;
pub mod link_writer;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use channel::{CommandReceiver, CommandSender, DEFAULT_CHANNEL_CAPACITY, Received, command_channel};
pub use link::{
    LinkOpener, LinkPort, MemoryLink, NoLink, SerialConfig, SerialOpener, default_port,
    encode_frame,
};
pub use link_writer::{LinkWriter, LinkWriterConfig, WriterStats};
