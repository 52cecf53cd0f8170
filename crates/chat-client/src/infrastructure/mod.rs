//! Infrastructure layer for the chat client.

pub mod connection;
