//! Protocol module containing frame types and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_header, decode_request, decode_request_body, decode_response, decode_response_body,
    encode_request, encode_response, ProtocolError,
};
pub use messages::*;
