//! Application layer for the chat client.

pub mod command;
pub mod render;
