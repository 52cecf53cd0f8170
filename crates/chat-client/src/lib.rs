//! chat-client library entry point.
//!
//! Re-exports all public modules so that the binary in `main.rs` and the
//! server's end-to-end tests share the same module tree.
//!
//! # What does chat-client do? (for beginners)
//!
//! The client is the human side of Chat Relay.  It:
//!
//! 1. Connects to the server over TCP and logs in under a display name,
//!    receiving a session token that it puts in every later request header.
//! 2. Reads command lines such as `talk bob hello` and turns them into
//!    [`chat_core::Request`] frames ([`application::command`]).
//! 3. Prints every frame the server sends, whether it answers one of our
//!    requests or is pushed by another user ([`application::render`]).

/// Application layer: command parsing and response rendering.
pub mod application;

/// Infrastructure layer: the TCP connection to the server.
pub mod infrastructure;
