//! Binary codec for encoding and decoding Chat Relay frames.
//!
//! Wire format:
//! ```text
//! [type:2][total_length:2][token_or_status:4][body:N]
//! ```
//! `total_length` counts the header.  All multi-byte integers are big-endian.
//!
//! Bodies are built from two primitives:
//!
//! - a *field*: UTF-8 bytes followed by one zero byte;
//! - a *list*: zero or more fields followed by one empty field, so the end of
//!   a list shows up as two consecutive zero bytes.
//!
//! Every function here is pure: no I/O, no shared state.

use thiserror::Error;

use crate::protocol::messages::{
    FrameHeader, Request, RequestFrame, RequestType, Response, ResponseType, SessionToken,
    StatusCode, HEADER_SIZE, MAX_FRAME_LENGTH, MAX_MESSAGE_LENGTH, MAX_NAME_LENGTH,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Truncated buffer, bad length field, bad field, or trailing bytes.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The request type in the header is not a recognised value.
    #[error("unknown request type: {0}")]
    UnknownRequest(u16),

    /// The response type in the header is not a recognised value.
    #[error("unknown response type: {0}")]
    UnknownResponse(u16),
}

impl ProtocolError {
    /// Status code reported to the peer before the connection is dropped.
    pub fn status(&self) -> StatusCode {
        match self {
            ProtocolError::UnknownRequest(_) => StatusCode::UnknownRequest,
            ProtocolError::MalformedFrame(_) | ProtocolError::UnknownResponse(_) => {
                StatusCode::MalformedFrame
            }
        }
    }
}

fn malformed(detail: impl Into<String>) -> ProtocolError {
    ProtocolError::MalformedFrame(detail.into())
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes and validates the 8-byte header at the start of `bytes`.
///
/// Only the header is inspected; the body may not have arrived yet.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if fewer than [`HEADER_SIZE`]
/// bytes are given, or if the length field is below the header size (this
/// includes zero) or above [`MAX_FRAME_LENGTH`].
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    require_len(bytes, HEADER_SIZE, "header")?;

    let header = FrameHeader {
        kind: u16::from_be_bytes([bytes[0], bytes[1]]),
        total_length: u16::from_be_bytes([bytes[2], bytes[3]]),
        word: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
    };

    let total = usize::from(header.total_length);
    if total < HEADER_SIZE {
        return Err(malformed(format!(
            "length field {total} is smaller than the {HEADER_SIZE}-byte header"
        )));
    }
    if total > MAX_FRAME_LENGTH {
        return Err(malformed(format!(
            "length field {total} exceeds the {MAX_FRAME_LENGTH}-byte frame limit"
        )));
    }
    Ok(header)
}

/// Encodes a request frame with `token` in the header.
///
/// LOGIN requests are conventionally sent with token `0`.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if a name or message is empty
/// where forbidden, contains a zero byte, or exceeds its length limit, or if
/// the finished frame would exceed [`MAX_FRAME_LENGTH`].
///
/// # Examples
///
/// ```rust
/// use chat_core::protocol::{decode_request, encode_request, Request};
///
/// let request = Request::Yell { message: "hi all".to_string() };
/// let bytes = encode_request(7, &request).unwrap();
/// let (frame, consumed) = decode_request(&bytes).unwrap();
/// assert_eq!(frame.token, 7);
/// assert_eq!(frame.request, request);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_request(token: SessionToken, request: &Request) -> Result<Vec<u8>, ProtocolError> {
    let mut body = Vec::new();
    match request {
        Request::Login { name } => put_name(&mut body, name)?,
        Request::Show | Request::LeaveGroup | Request::Help | Request::Exit => {}
        Request::Talk { receiver, message } => {
            put_name(&mut body, receiver)?;
            put_message(&mut body, message)?;
        }
        Request::Yell { message } | Request::Discuss { message } => {
            put_message(&mut body, message)?
        }
        Request::CreateGroup { members } => put_name_list(&mut body, members)?,
    }
    assemble(request.request_type() as u16, token, body)
}

/// Decodes one request frame from the beginning of `bytes`.
///
/// Returns the frame and the number of bytes consumed so the caller can
/// advance its read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownRequest`] for an unrecognised type code and
/// [`ProtocolError::MalformedFrame`] for every other defect.
pub fn decode_request(bytes: &[u8]) -> Result<(RequestFrame, usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let total = usize::from(header.total_length);
    require_len(bytes, total, "request")?;

    let kind = RequestType::try_from(header.kind)
        .map_err(|_| ProtocolError::UnknownRequest(header.kind))?;
    let request = decode_request_body(kind, &bytes[HEADER_SIZE..total])?;

    Ok((
        RequestFrame {
            token: header.word,
            request,
        },
        total,
    ))
}

/// Decodes the body of a request whose type is already known.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if the body does not match the
/// layout for `kind` exactly.
pub fn decode_request_body(kind: RequestType, body: &[u8]) -> Result<Request, ProtocolError> {
    let mut reader = BodyReader::new(body);
    let request = match kind {
        RequestType::Login => Request::Login {
            name: reader.name("LOGIN.name")?,
        },
        RequestType::Show => Request::Show,
        RequestType::Talk => Request::Talk {
            receiver: reader.name("TALK.receiver")?,
            message: reader.message("TALK.message")?,
        },
        RequestType::Yell => Request::Yell {
            message: reader.message("YELL.message")?,
        },
        RequestType::CreateGroup => Request::CreateGroup {
            members: reader.name_list("CREATEGROUP.members")?,
        },
        RequestType::Discuss => Request::Discuss {
            message: reader.message("DISCUSS.message")?,
        },
        RequestType::LeaveGroup => Request::LeaveGroup,
        RequestType::Help => Request::Help,
        RequestType::Exit => Request::Exit,
    };
    reader.finish(kind_label(kind))?;
    Ok(request)
}

/// Encodes a response frame, placing its status code in the header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] under the same field rules as
/// [`encode_request`].
pub fn encode_response(response: &Response) -> Result<Vec<u8>, ProtocolError> {
    let mut body = Vec::new();
    match response {
        Response::Login { token } => body.extend_from_slice(&token.to_be_bytes()),
        Response::Show { names: list }
        | Response::CreateGroup { members: list }
        | Response::GroupInvite { members: list }
        | Response::Help { commands: list } => put_name_list(&mut body, list)?,
        Response::Talk
        | Response::Yell
        | Response::Discuss
        | Response::LeaveGroup
        | Response::Exit
        | Response::Failure { .. } => {}
        Response::TalkForward { sender, message }
        | Response::YellForward { sender, message }
        | Response::DiscussForward { sender, message } => {
            put_name(&mut body, sender)?;
            put_message(&mut body, message)?;
        }
        Response::ExitNotice { name } => put_name(&mut body, name)?,
    }
    assemble(
        response.response_type() as u16,
        response.status() as u32,
        body,
    )
}

/// Decodes one response frame from the beginning of `bytes`.
///
/// Returns the response and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`ProtocolError::UnknownResponse`] for an unrecognised type code and
/// [`ProtocolError::MalformedFrame`] for every other defect, including an
/// unrecognised status code.
pub fn decode_response(bytes: &[u8]) -> Result<(Response, usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let total = usize::from(header.total_length);
    require_len(bytes, total, "response")?;

    let kind = ResponseType::try_from(header.kind)
        .map_err(|_| ProtocolError::UnknownResponse(header.kind))?;
    let status = StatusCode::try_from(header.word)
        .map_err(|_| malformed(format!("unknown status code {}", header.word)))?;
    let response = decode_response_body(kind, status, &bytes[HEADER_SIZE..total])?;
    Ok((response, total))
}

/// Decodes the body of a response whose type and status are already known.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if the body does not match the
/// layout for `kind`, or if a failure frame carries a body.
pub fn decode_response_body(
    kind: ResponseType,
    status: StatusCode,
    body: &[u8],
) -> Result<Response, ProtocolError> {
    let mut reader = BodyReader::new(body);

    if status != StatusCode::Success {
        reader.finish("failure")?;
        return Ok(Response::Failure { kind, status });
    }

    let response = match kind {
        ResponseType::Login => Response::Login {
            token: reader.u32("LOGIN.token")?,
        },
        ResponseType::Show => Response::Show {
            names: reader.name_list("SHOW.names")?,
        },
        ResponseType::Talk => Response::Talk,
        ResponseType::Yell => Response::Yell,
        ResponseType::CreateGroup => Response::CreateGroup {
            members: reader.name_list("CREATEGROUP.members")?,
        },
        ResponseType::Discuss => Response::Discuss,
        ResponseType::LeaveGroup => Response::LeaveGroup,
        ResponseType::Help => Response::Help {
            commands: reader.name_list("HELP.commands")?,
        },
        ResponseType::Exit => Response::Exit,
        ResponseType::Error => {
            return Err(malformed("ERROR frame with SUCCESS status"));
        }
        ResponseType::TalkForward => Response::TalkForward {
            sender: reader.name("TALK_FWD.sender")?,
            message: reader.message("TALK_FWD.message")?,
        },
        ResponseType::YellForward => Response::YellForward {
            sender: reader.name("YELL_FWD.sender")?,
            message: reader.message("YELL_FWD.message")?,
        },
        ResponseType::GroupInvite => Response::GroupInvite {
            members: reader.name_list("CREATEGROUP_FWD.members")?,
        },
        ResponseType::DiscussForward => Response::DiscussForward {
            sender: reader.name("DISCUSS_FWD.sender")?,
            message: reader.message("DISCUSS_FWD.message")?,
        },
        ResponseType::ExitNotice => Response::ExitNotice {
            name: reader.name("EXIT_FWD.name")?,
        },
    };
    reader.finish("response body")?;
    Ok(response)
}

// ── Encode helpers ────────────────────────────────────────────────────────────

fn assemble(kind: u16, word: u32, body: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
    let total = HEADER_SIZE + body.len();
    if total > MAX_FRAME_LENGTH {
        return Err(malformed(format!(
            "encoded frame is {total} bytes, limit is {MAX_FRAME_LENGTH}"
        )));
    }

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&kind.to_be_bytes());
    // total <= MAX_FRAME_LENGTH, which fits in u16
    buf.extend_from_slice(&(total as u16).to_be_bytes());
    buf.extend_from_slice(&word.to_be_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

fn put_field(buf: &mut Vec<u8>, value: &str, limit: usize, what: &str) -> Result<(), ProtocolError> {
    if value.as_bytes().contains(&0) {
        return Err(malformed(format!("{what} contains a zero byte")));
    }
    if value.len() + 1 > limit {
        return Err(malformed(format!(
            "{what} is {} bytes, limit is {} plus terminator",
            value.len(),
            limit - 1
        )));
    }
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
    Ok(())
}

fn put_name(buf: &mut Vec<u8>, name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() {
        return Err(malformed("name is empty"));
    }
    put_field(buf, name, MAX_NAME_LENGTH, "name")
}

fn put_message(buf: &mut Vec<u8>, message: &str) -> Result<(), ProtocolError> {
    put_field(buf, message, MAX_MESSAGE_LENGTH, "message")
}

fn put_name_list(buf: &mut Vec<u8>, names: &[String]) -> Result<(), ProtocolError> {
    for name in names {
        put_name(buf, name)?;
    }
    buf.push(0);
    Ok(())
}

// ── Decode helpers ────────────────────────────────────────────────────────────

/// Cursor over a frame body that enforces field limits as it reads.
struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reads one zero-terminated field of at most `limit` bytes (terminator
    /// included).  Returns the content without the terminator.
    fn field(&mut self, limit: usize, context: &str) -> Result<&'a str, ProtocolError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| malformed(format!("{context}: missing terminator")))?;
        if end + 1 > limit {
            return Err(malformed(format!(
                "{context}: field is {end} bytes, limit is {}",
                limit - 1
            )));
        }
        let text = std::str::from_utf8(&rest[..end])
            .map_err(|e| malformed(format!("{context}: {e}")))?;
        self.pos += end + 1;
        Ok(text)
    }

    fn name(&mut self, context: &str) -> Result<String, ProtocolError> {
        let name = self.field(MAX_NAME_LENGTH, context)?;
        if name.is_empty() {
            return Err(malformed(format!("{context}: empty name")));
        }
        Ok(name.to_string())
    }

    fn message(&mut self, context: &str) -> Result<String, ProtocolError> {
        Ok(self.field(MAX_MESSAGE_LENGTH, context)?.to_string())
    }

    fn name_list(&mut self, context: &str) -> Result<Vec<String>, ProtocolError> {
        let mut names = Vec::new();
        loop {
            let name = self.field(MAX_NAME_LENGTH, context)?;
            if name.is_empty() {
                return Ok(names);
            }
            names.push(name.to_string());
        }
    }

    fn u32(&mut self, context: &str) -> Result<u32, ProtocolError> {
        let rest = &self.buf[self.pos..];
        require_len(rest, 4, context)?;
        self.pos += 4;
        Ok(u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]))
    }

    fn finish(&self, context: &str) -> Result<(), ProtocolError> {
        let left = self.buf.len() - self.pos;
        if left != 0 {
            return Err(malformed(format!("{context}: {left} trailing bytes")));
        }
        Ok(())
    }
}

fn kind_label(kind: RequestType) -> &'static str {
    match kind {
        RequestType::Login => "LOGIN",
        RequestType::Show => "SHOW",
        RequestType::Talk => "TALK",
        RequestType::Yell => "YELL",
        RequestType::CreateGroup => "CREATEGROUP",
        RequestType::Discuss => "DISCUSS",
        RequestType::LeaveGroup => "LEAVEGROUP",
        RequestType::Help => "HELP",
        RequestType::Exit => "EXIT",
    }
}

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(malformed(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(kind: u16, word: u32, body: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&kind.to_be_bytes());
        buf.extend_from_slice(&((HEADER_SIZE + body.len()) as u16).to_be_bytes());
        buf.extend_from_slice(&word.to_be_bytes());
        buf.extend_from_slice(body);
        buf
    }

    // ── Byte layout ───────────────────────────────────────────────────────────

    #[test]
    fn test_login_request_byte_layout() {
        // Arrange
        let request = Request::Login {
            name: "alice".to_string(),
        };

        // Act
        let bytes = encode_request(0, &request).unwrap();

        // Assert
        assert_eq!(
            bytes,
            vec![0, 1, 0, 14, 0, 0, 0, 0, b'a', b'l', b'i', b'c', b'e', 0]
        );
    }

    #[test]
    fn test_show_response_list_ends_with_two_terminators() {
        let response = Response::Show {
            names: vec!["a".to_string(), "b".to_string()],
        };

        let bytes = encode_response(&response).unwrap();

        assert_eq!(&bytes[HEADER_SIZE..], &[b'a', 0, b'b', 0, 0]);
        assert_eq!(&bytes[0..2], &12u16.to_be_bytes());
    }

    #[test]
    fn test_login_response_carries_token_in_network_order() {
        let bytes = encode_response(&Response::Login { token: 0x0102_0304 }).unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE + 4);
        assert_eq!(&bytes[HEADER_SIZE..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_failure_response_puts_status_in_header_and_has_empty_body() {
        let response = Response::failure(RequestType::Talk, StatusCode::UserNotFound);

        let bytes = encode_response(&response).unwrap();

        assert_eq!(bytes, vec![0, 13, 0, 8, 0, 0, 0, 3]);
    }

    #[test]
    fn test_empty_name_list_is_single_terminator() {
        let bytes = encode_request(5, &Request::CreateGroup { members: vec![] }).unwrap();
        assert_eq!(&bytes[HEADER_SIZE..], &[0]);
    }

    // ── Header validation ─────────────────────────────────────────────────────

    #[test]
    fn test_decode_header_rejects_short_buffer() {
        let result = decode_header(&[0, 1, 0]);
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_header_rejects_zero_length_field() {
        let result = decode_header(&[0, 2, 0, 0, 0, 0, 0, 1]);
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_header_rejects_length_below_header_size() {
        let result = decode_header(&[0, 2, 0, 7, 0, 0, 0, 1]);
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_header_rejects_length_above_frame_limit() {
        let too_long = (MAX_FRAME_LENGTH as u16 + 1).to_be_bytes();
        let result = decode_header(&[0, 2, too_long[0], too_long[1], 0, 0, 0, 1]);
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_header_returns_raw_fields() {
        let header = decode_header(&[0, 42, 0, 8, 0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(header.kind, 42);
        assert_eq!(header.total_length, 8);
        assert_eq!(header.word, 0xDEAD_BEEF);
    }

    // ── Request decoding ──────────────────────────────────────────────────────

    #[test]
    fn test_decode_request_reports_consumed_bytes_with_trailing_data() {
        let mut bytes = encode_request(9, &Request::Show).unwrap();
        let frame_len = bytes.len();
        bytes.extend_from_slice(&[0xFF, 0xFF]);

        let (frame, consumed) = decode_request(&bytes).unwrap();

        assert_eq!(frame.request, Request::Show);
        assert_eq!(frame.token, 9);
        assert_eq!(consumed, frame_len);
    }

    #[test]
    fn test_decode_request_rejects_truncated_body() {
        let bytes = encode_request(0, &Request::Login { name: "bob".to_string() }).unwrap();
        let result = decode_request(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_request_unknown_type_is_unknown_request() {
        let bytes = raw_frame(77, 1, &[]);
        assert_eq!(decode_request(&bytes), Err(ProtocolError::UnknownRequest(77)));
    }

    #[test]
    fn test_decode_request_rejects_missing_terminator() {
        let bytes = raw_frame(1, 0, b"alice");
        assert!(matches!(
            decode_request(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_request_rejects_empty_login_name() {
        let bytes = raw_frame(1, 0, &[0]);
        assert!(matches!(
            decode_request(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_request_rejects_overlong_name() {
        let mut body = vec![b'x'; MAX_NAME_LENGTH];
        body.push(0);
        let bytes = raw_frame(1, 0, &body);
        assert!(matches!(
            decode_request(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_request_accepts_name_at_limit() {
        let mut body = vec![b'x'; MAX_NAME_LENGTH - 1];
        body.push(0);
        let bytes = raw_frame(1, 0, &body);

        let (frame, _) = decode_request(&bytes).unwrap();

        assert_eq!(
            frame.request,
            Request::Login {
                name: "x".repeat(MAX_NAME_LENGTH - 1)
            }
        );
    }

    #[test]
    fn test_decode_request_rejects_trailing_body_bytes() {
        let bytes = raw_frame(2, 1, &[0]);
        assert!(matches!(
            decode_request(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_request_rejects_invalid_utf8() {
        let bytes = raw_frame(4, 1, &[0xFF, 0xFE, 0]);
        assert!(matches!(
            decode_request(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_request_allows_empty_message() {
        let bytes = raw_frame(6, 3, &[0]);
        let (frame, _) = decode_request(&bytes).unwrap();
        assert_eq!(
            frame.request,
            Request::Discuss {
                message: String::new()
            }
        );
    }

    #[test]
    fn test_decode_request_rejects_unterminated_list() {
        let bytes = raw_frame(5, 3, &[b'b', b'o', b'b', 0]);
        assert!(matches!(
            decode_request(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    // ── Response decoding ─────────────────────────────────────────────────────

    #[test]
    fn test_decode_response_unknown_type() {
        let bytes = raw_frame(99, 0, &[]);
        assert_eq!(
            decode_response(&bytes),
            Err(ProtocolError::UnknownResponse(99))
        );
    }

    #[test]
    fn test_decode_response_rejects_unknown_status() {
        let bytes = raw_frame(13, 555, &[]);
        assert!(matches!(
            decode_response(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_response_rejects_failure_with_body() {
        let bytes = raw_frame(13, 3, &[b'x', 0]);
        assert!(matches!(
            decode_response(&bytes),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_error_frame_as_failure() {
        let bytes = raw_frame(100, 1024, &[]);
        let (response, _) = decode_response(&bytes).unwrap();
        assert_eq!(
            response,
            Response::Failure {
                kind: ResponseType::Error,
                status: StatusCode::UnknownRequest
            }
        );
    }

    #[test]
    fn test_decode_talk_forward() {
        let bytes = raw_frame(131, 0, b"alice\0hello bob\0");
        let (response, consumed) = decode_response(&bytes).unwrap();
        assert_eq!(
            response,
            Response::TalkForward {
                sender: "alice".to_string(),
                message: "hello bob".to_string()
            }
        );
        assert_eq!(consumed, bytes.len());
    }

    // ── Encoding limits ───────────────────────────────────────────────────────

    #[test]
    fn test_encode_rejects_name_containing_zero_byte() {
        let result = encode_request(0, &Request::Login { name: "a\0b".to_string() });
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_encode_rejects_overlong_message() {
        let request = Request::Yell {
            message: "m".repeat(MAX_MESSAGE_LENGTH),
        };
        assert!(matches!(
            encode_request(1, &request),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_encode_accepts_message_at_limit() {
        let request = Request::Yell {
            message: "m".repeat(MAX_MESSAGE_LENGTH - 1),
        };
        let bytes = encode_request(1, &request).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + MAX_MESSAGE_LENGTH);
    }

    #[test]
    fn test_encode_rejects_empty_receiver() {
        let request = Request::Talk {
            receiver: String::new(),
            message: "hi".to_string(),
        };
        assert!(matches!(
            encode_request(1, &request),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_encode_rejects_frame_over_limit() {
        let names: Vec<String> = (0..200).map(|i| format!("{i:0>30}")).collect();
        let result = encode_response(&Response::Show { names });
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_full_show_reply_fits_in_one_frame() {
        use crate::protocol::messages::MAX_SESSIONS;
        let names: Vec<String> = (0..MAX_SESSIONS)
            .map(|i| format!("{i:0>width$}", width = MAX_NAME_LENGTH - 1))
            .collect();
        let bytes = encode_response(&Response::Show { names }).unwrap();
        assert!(bytes.len() <= MAX_FRAME_LENGTH);
    }

    #[test]
    fn test_protocol_error_status_mapping() {
        assert_eq!(
            ProtocolError::UnknownRequest(50).status(),
            StatusCode::UnknownRequest
        );
        assert_eq!(
            ProtocolError::MalformedFrame("x".to_string()).status(),
            StatusCode::MalformedFrame
        );
    }
}
