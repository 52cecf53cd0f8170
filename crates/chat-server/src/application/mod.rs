//! Application layer: the session registry and the per-connection protocol
//! state machine.
//!
//! Nothing in here touches a socket.  Outbound frames leave through the
//! [`delivery::FrameSink`] trait, which the infrastructure layer implements
//! over a TCP write half and tests implement with recording doubles.

pub mod delivery;
pub mod session_protocol;
pub mod session_registry;
