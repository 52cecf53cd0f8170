//! Integration tests for the chat-core frame codec.
//!
//! These tests drive the public API only: every request and response shape is
//! encoded and decoded back, and arbitrary input is thrown at the decoders to
//! check they fail cleanly instead of panicking.

use chat_core::{
    decode_request, decode_response, encode_request, encode_response, ProtocolError, Request,
    RequestType, Response, ResponseType, SessionToken, StatusCode, HEADER_SIZE,
};
use proptest::prelude::*;

fn roundtrip_request(token: SessionToken, request: Request) -> (SessionToken, Request) {
    let bytes = encode_request(token, &request).expect("encode must succeed");
    let (frame, consumed) = decode_request(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    (frame.token, frame.request)
}

fn roundtrip_response(response: Response) -> Response {
    let bytes = encode_response(&response).expect("encode must succeed");
    let (decoded, consumed) = decode_response(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

#[test]
fn test_roundtrip_login_request_with_zero_token() {
    let original = Request::Login {
        name: "alice".to_string(),
    };

    let (token, decoded) = roundtrip_request(0, original.clone());

    assert_eq!(token, 0);
    assert_eq!(decoded, original);
}

#[test]
fn test_roundtrip_talk_request_with_unicode_message() {
    let original = Request::Talk {
        receiver: "bob".to_string(),
        message: "héllo 👋".to_string(),
    };

    let (token, decoded) = roundtrip_request(0xCAFE_F00D, original.clone());

    assert_eq!(token, 0xCAFE_F00D);
    assert_eq!(decoded, original);
}

#[test]
fn test_roundtrip_bodyless_requests() {
    for original in [
        Request::Show,
        Request::LeaveGroup,
        Request::Help,
        Request::Exit,
    ] {
        let bytes = encode_request(3, &original).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        let (_, decoded) = roundtrip_request(3, original.clone());
        assert_eq!(decoded, original);
    }
}

#[test]
fn test_roundtrip_group_invite_preserves_member_order() {
    let original = Response::GroupInvite {
        members: vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
    };

    let decoded = roundtrip_response(original.clone());

    assert_eq!(decoded, original);
}

#[test]
fn test_roundtrip_every_failure_status() {
    for status in [
        StatusCode::InvalidToken,
        StatusCode::NameTaken,
        StatusCode::UserNotFound,
        StatusCode::NoUserOnline,
        StatusCode::NotAuthenticated,
        StatusCode::NotInGroup,
        StatusCode::AlreadyLoggedIn,
        StatusCode::ServerFull,
        StatusCode::MalformedFrame,
        StatusCode::UnknownRequest,
    ] {
        let original = Response::failure(RequestType::Login, status);
        assert_eq!(roundtrip_response(original.clone()), original);
    }
}

#[test]
fn test_fatal_error_frame_roundtrip() {
    let original = Response::Failure {
        kind: ResponseType::Error,
        status: StatusCode::MalformedFrame,
    };
    assert_eq!(roundtrip_response(original.clone()), original);
}

#[test]
fn test_two_frames_back_to_back_decode_in_sequence() {
    // Arrange
    let first = Response::YellForward {
        sender: "alice".to_string(),
        message: "hi all".to_string(),
    };
    let second = Response::ExitNotice {
        name: "alice".to_string(),
    };
    let mut stream = encode_response(&first).unwrap();
    stream.extend(encode_response(&second).unwrap());

    // Act
    let (decoded_first, n) = decode_response(&stream).unwrap();
    let (decoded_second, m) = decode_response(&stream[n..]).unwrap();

    // Assert
    assert_eq!(decoded_first, first);
    assert_eq!(decoded_second, second);
    assert_eq!(n + m, stream.len());
}

#[test]
fn test_request_decoder_rejects_response_frame() {
    let bytes = encode_response(&Response::Exit).unwrap();
    assert_eq!(
        decode_request(&bytes),
        Err(ProtocolError::UnknownRequest(ResponseType::Exit as u16))
    );
}

// ── Properties ────────────────────────────────────────────────────────────────

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,31}"
}

fn message_strategy() -> impl Strategy<Value = String> {
    "\\PC{0,200}"
}

fn request_strategy() -> impl Strategy<Value = Request> {
    prop_oneof![
        name_strategy().prop_map(|name| Request::Login { name }),
        Just(Request::Show),
        (name_strategy(), message_strategy())
            .prop_map(|(receiver, message)| Request::Talk { receiver, message }),
        message_strategy().prop_map(|message| Request::Yell { message }),
        prop::collection::vec(name_strategy(), 0..10)
            .prop_map(|members| Request::CreateGroup { members }),
        message_strategy().prop_map(|message| Request::Discuss { message }),
        Just(Request::LeaveGroup),
        Just(Request::Help),
        Just(Request::Exit),
    ]
}

fn response_strategy() -> impl Strategy<Value = Response> {
    prop_oneof![
        (1u32..).prop_map(|token| Response::Login { token }),
        prop::collection::vec(name_strategy(), 0..20).prop_map(|names| Response::Show { names }),
        Just(Response::Talk),
        (name_strategy(), message_strategy())
            .prop_map(|(sender, message)| Response::TalkForward { sender, message }),
        (name_strategy(), message_strategy())
            .prop_map(|(sender, message)| Response::YellForward { sender, message }),
        prop::collection::vec(name_strategy(), 1..10)
            .prop_map(|members| Response::GroupInvite { members }),
        (name_strategy(), message_strategy())
            .prop_map(|(sender, message)| Response::DiscussForward { sender, message }),
        name_strategy().prop_map(|name| Response::ExitNotice { name }),
        Just(Response::failure(RequestType::Yell, StatusCode::NoUserOnline)),
    ]
}

proptest! {
    #[test]
    fn test_request_roundtrip_preserves_fields(
        token in any::<u32>(),
        request in request_strategy()
    ) {
        let bytes = encode_request(token, &request).expect("generated request fits in a frame");
        let (frame, consumed) = decode_request(&bytes).expect("generated frame should decode");

        prop_assert_eq!(frame.token, token);
        prop_assert_eq!(frame.request, request);
        prop_assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_response_roundtrip_preserves_fields(response in response_strategy()) {
        let bytes = encode_response(&response).expect("generated response fits in a frame");
        let (decoded, consumed) = decode_response(&bytes).expect("generated frame should decode");

        prop_assert_eq!(decoded, response);
        prop_assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_decoders_never_panic_on_arbitrary_bytes(
        bytes in prop::collection::vec(any::<u8>(), 0..64)
    ) {
        let _ = decode_request(&bytes);
        let _ = decode_response(&bytes);
    }

    #[test]
    fn test_every_truncation_of_a_valid_frame_is_malformed(
        request in request_strategy(),
        cut in 0usize..HEADER_SIZE + 64
    ) {
        let bytes = encode_request(1, &request).expect("generated request fits in a frame");
        prop_assume!(cut < bytes.len());

        let result = decode_request(&bytes[..cut]);

        prop_assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }
}
