//! Network infrastructure for the chat server.
//!
//! # Sub-modules
//!
//! - **`channel`** – Frame-level reads and writes over one TCP connection.
//!   The reader assembles complete frames from the byte stream; the writer
//!   implements [`crate::application::delivery::FrameSink`] so other
//!   connections' handlers can push frames to this client.
//!
//! - **`listener`** – The accept loop.  Spawns one task per connection, each
//!   running the protocol state machine until EXIT or a channel failure.

pub mod channel;
pub mod listener;

pub use channel::{ChannelError, ChannelReader, ChannelWriter};
pub use listener::{run_server, serve, ConnectionSettings};
