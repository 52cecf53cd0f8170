//! # chat-core
//!
//! Shared library for Chat Relay containing the wire protocol: frame types,
//! status codes, size limits, and the binary codec.
//!
//! This crate is used by both the server and the client.  It has no
//! dependencies on sockets or an async runtime.
//!
//! # Architecture overview (for beginners)
//!
//! Chat Relay is a small multi-user chat service.  Clients connect over TCP,
//! log in under a unique name, and then exchange frames with the server:
//! direct messages (TALK), broadcasts (YELL), and ad-hoc group chats
//! (CREATEGROUP / DISCUSS / LEAVEGROUP).
//!
//! Every frame is an 8-byte header followed by a body:
//!
//! ```text
//! [type:2][total_length:2][token or status:4][body...]
//! ```
//!
//! - **`protocol::messages`** defines the typed [`Request`] and [`Response`]
//!   enums plus every numeric constant both ends must agree on.
//! - **`protocol::codec`** turns those types into bytes and back, rejecting
//!   anything truncated, oversized, or malformed.

pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `chat_core::Request` instead of `chat_core::protocol::messages::Request`.
pub use protocol::codec::{
    decode_header, decode_request, decode_response, encode_request, encode_response,
    ProtocolError,
};
pub use protocol::messages::{
    FrameHeader, Request, RequestFrame, RequestType, Response, ResponseType, SessionToken,
    StatusCode, HEADER_SIZE, MAX_FRAME_LENGTH, MAX_MESSAGE_LENGTH, MAX_NAME_LENGTH,
    MAX_SESSIONS,
};
