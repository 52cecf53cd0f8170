//! All Chat Relay protocol frame types.
//!
//! Every frame starts with an 8-byte header.  Requests carry the session token
//! in the last header word; responses carry a status code there.  Bodies are
//! built from zero-terminated fields (see [`crate::protocol::codec`]).

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the request and response header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Maximum length of a user name on the wire, including the zero terminator.
pub const MAX_NAME_LENGTH: usize = 32;

/// Maximum length of a chat message on the wire, including the zero terminator.
pub const MAX_MESSAGE_LENGTH: usize = 2048;

/// Maximum length of one complete frame (header + body).
pub const MAX_FRAME_LENGTH: usize = 2 * MAX_MESSAGE_LENGTH;

/// Largest number of concurrent sessions whose SHOW reply still fits in a
/// single frame: every name at full length plus the list terminator.
pub const MAX_SESSIONS: usize = (MAX_FRAME_LENGTH - HEADER_SIZE - 1) / MAX_NAME_LENGTH;

/// Opaque credential issued at login and presented on every later request.
///
/// Zero is never issued; LOGIN requests carry zero in the header.
pub type SessionToken = u32;

// ── Request type codes ────────────────────────────────────────────────────────

/// Request type codes sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum RequestType {
    Login = 1,
    Show = 2,
    Talk = 3,
    Yell = 4,
    CreateGroup = 5,
    Discuss = 6,
    LeaveGroup = 7,
    Help = 8,
    Exit = 9,
}

impl TryFrom<u16> for RequestType {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, ()> {
        match value {
            1 => Ok(RequestType::Login),
            2 => Ok(RequestType::Show),
            3 => Ok(RequestType::Talk),
            4 => Ok(RequestType::Yell),
            5 => Ok(RequestType::CreateGroup),
            6 => Ok(RequestType::Discuss),
            7 => Ok(RequestType::LeaveGroup),
            8 => Ok(RequestType::Help),
            9 => Ok(RequestType::Exit),
            _ => Err(()),
        }
    }
}

impl RequestType {
    /// The response type used to acknowledge this request.
    pub fn reply_type(self) -> ResponseType {
        match self {
            RequestType::Login => ResponseType::Login,
            RequestType::Show => ResponseType::Show,
            RequestType::Talk => ResponseType::Talk,
            RequestType::Yell => ResponseType::Yell,
            RequestType::CreateGroup => ResponseType::CreateGroup,
            RequestType::Discuss => ResponseType::Discuss,
            RequestType::LeaveGroup => ResponseType::LeaveGroup,
            RequestType::Help => ResponseType::Help,
            RequestType::Exit => ResponseType::Exit,
        }
    }
}

// ── Response type codes ───────────────────────────────────────────────────────

/// Response type codes sent by the server.
///
/// Direct replies are the request type plus 10.  The `*Forward` variants are
/// pushed to third parties (the receiver of a TALK, every other user on a
/// YELL, and so on) rather than acknowledging the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ResponseType {
    Login = 11,
    Show = 12,
    Talk = 13,
    Yell = 14,
    CreateGroup = 15,
    Discuss = 16,
    LeaveGroup = 17,
    Help = 18,
    Exit = 19,
    /// Sent right before the server drops a connection it cannot continue.
    Error = 100,
    TalkForward = 131,
    YellForward = 141,
    GroupInvite = 151,
    DiscussForward = 161,
    ExitNotice = 191,
}

impl TryFrom<u16> for ResponseType {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, ()> {
        match value {
            11 => Ok(ResponseType::Login),
            12 => Ok(ResponseType::Show),
            13 => Ok(ResponseType::Talk),
            14 => Ok(ResponseType::Yell),
            15 => Ok(ResponseType::CreateGroup),
            16 => Ok(ResponseType::Discuss),
            17 => Ok(ResponseType::LeaveGroup),
            18 => Ok(ResponseType::Help),
            19 => Ok(ResponseType::Exit),
            100 => Ok(ResponseType::Error),
            131 => Ok(ResponseType::TalkForward),
            141 => Ok(ResponseType::YellForward),
            151 => Ok(ResponseType::GroupInvite),
            161 => Ok(ResponseType::DiscussForward),
            191 => Ok(ResponseType::ExitNotice),
            _ => Err(()),
        }
    }
}

// ── Status codes ──────────────────────────────────────────────────────────────

/// Status word carried in every response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum StatusCode {
    Success = 0,
    InvalidToken = 1,
    NameTaken = 2,
    UserNotFound = 3,
    NoUserOnline = 4,
    NotAuthenticated = 5,
    NotInGroup = 6,
    AlreadyLoggedIn = 7,
    ServerFull = 8,
    MalformedFrame = 9,
    UnknownRequest = 1024,
}

impl TryFrom<u32> for StatusCode {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, ()> {
        match value {
            0 => Ok(StatusCode::Success),
            1 => Ok(StatusCode::InvalidToken),
            2 => Ok(StatusCode::NameTaken),
            3 => Ok(StatusCode::UserNotFound),
            4 => Ok(StatusCode::NoUserOnline),
            5 => Ok(StatusCode::NotAuthenticated),
            6 => Ok(StatusCode::NotInGroup),
            7 => Ok(StatusCode::AlreadyLoggedIn),
            8 => Ok(StatusCode::ServerFull),
            9 => Ok(StatusCode::MalformedFrame),
            1024 => Ok(StatusCode::UnknownRequest),
            _ => Err(()),
        }
    }
}

impl StatusCode {
    /// Human-readable description rendered by front ends.
    pub fn description(self) -> &'static str {
        match self {
            StatusCode::Success => "success",
            StatusCode::InvalidToken => "session token is not valid",
            StatusCode::NameTaken => "user name is already taken",
            StatusCode::UserNotFound => "no such user is online",
            StatusCode::NoUserOnline => "no other user is online",
            StatusCode::NotAuthenticated => "log in first",
            StatusCode::NotInGroup => "not in a group chat",
            StatusCode::AlreadyLoggedIn => "already logged in",
            StatusCode::ServerFull => "server is full",
            StatusCode::MalformedFrame => "malformed frame",
            StatusCode::UnknownRequest => "unknown request",
        }
    }
}

// ── Header ────────────────────────────────────────────────────────────────────

/// The 8-byte header shared by requests and responses.
///
/// `word` is the session token for requests and the status code for
/// responses.  `kind` is kept raw so the reader can consume the body of a
/// frame whose type it does not recognise before rejecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: u16,
    pub total_length: u16,
    pub word: u32,
}

impl FrameHeader {
    /// Number of body bytes that follow the header.
    pub fn body_length(&self) -> usize {
        usize::from(self.total_length).saturating_sub(HEADER_SIZE)
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Login { name: String },
    Show,
    Talk { receiver: String, message: String },
    Yell { message: String },
    CreateGroup { members: Vec<String> },
    Discuss { message: String },
    LeaveGroup,
    Help,
    Exit,
}

impl Request {
    /// Returns the wire type code for this request.
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Login { .. } => RequestType::Login,
            Request::Show => RequestType::Show,
            Request::Talk { .. } => RequestType::Talk,
            Request::Yell { .. } => RequestType::Yell,
            Request::CreateGroup { .. } => RequestType::CreateGroup,
            Request::Discuss { .. } => RequestType::Discuss,
            Request::LeaveGroup => RequestType::LeaveGroup,
            Request::Help => RequestType::Help,
            Request::Exit => RequestType::Exit,
        }
    }
}

/// A request together with the token from its header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub token: SessionToken,
    pub request: Request,
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// A decoded server response.
///
/// Every variant except [`Response::Failure`] is sent with
/// [`StatusCode::Success`].  A failure names the response type it answers and
/// carries an empty body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Login { token: SessionToken },
    Show { names: Vec<String> },
    Talk,
    Yell,
    CreateGroup { members: Vec<String> },
    Discuss,
    LeaveGroup,
    Help { commands: Vec<String> },
    Exit,
    TalkForward { sender: String, message: String },
    YellForward { sender: String, message: String },
    GroupInvite { members: Vec<String> },
    DiscussForward { sender: String, message: String },
    ExitNotice { name: String },
    Failure { kind: ResponseType, status: StatusCode },
}

impl Response {
    /// Returns the wire type code for this response.
    pub fn response_type(&self) -> ResponseType {
        match self {
            Response::Login { .. } => ResponseType::Login,
            Response::Show { .. } => ResponseType::Show,
            Response::Talk => ResponseType::Talk,
            Response::Yell => ResponseType::Yell,
            Response::CreateGroup { .. } => ResponseType::CreateGroup,
            Response::Discuss => ResponseType::Discuss,
            Response::LeaveGroup => ResponseType::LeaveGroup,
            Response::Help { .. } => ResponseType::Help,
            Response::Exit => ResponseType::Exit,
            Response::TalkForward { .. } => ResponseType::TalkForward,
            Response::YellForward { .. } => ResponseType::YellForward,
            Response::GroupInvite { .. } => ResponseType::GroupInvite,
            Response::DiscussForward { .. } => ResponseType::DiscussForward,
            Response::ExitNotice { .. } => ResponseType::ExitNotice,
            Response::Failure { kind, .. } => *kind,
        }
    }

    /// Returns the status word for this response.
    pub fn status(&self) -> StatusCode {
        match self {
            Response::Failure { status, .. } => *status,
            _ => StatusCode::Success,
        }
    }

    /// Builds a failure reply to `request_type`.
    pub fn failure(request_type: RequestType, status: StatusCode) -> Self {
        Response::Failure {
            kind: request_type.reply_type(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_sessions_show_reply_fits_in_one_frame() {
        let worst_case = HEADER_SIZE + MAX_SESSIONS * MAX_NAME_LENGTH + 1;
        assert!(worst_case <= MAX_FRAME_LENGTH);
        assert_eq!(MAX_SESSIONS, 127);
    }

    #[test]
    fn test_reply_type_is_request_type_plus_ten() {
        for value in 1u16..=9 {
            let request_type = RequestType::try_from(value).unwrap();
            assert_eq!(request_type.reply_type() as u16, value + 10);
        }
    }

    #[test]
    fn test_request_type_rejects_unknown_codes() {
        assert!(RequestType::try_from(0).is_err());
        assert!(RequestType::try_from(10).is_err());
        assert!(RequestType::try_from(u16::MAX).is_err());
    }

    #[test]
    fn test_response_type_round_trips_through_u16() {
        for kind in [
            ResponseType::Login,
            ResponseType::Exit,
            ResponseType::Error,
            ResponseType::TalkForward,
            ResponseType::GroupInvite,
            ResponseType::ExitNotice,
        ] {
            assert_eq!(ResponseType::try_from(kind as u16), Ok(kind));
        }
    }

    #[test]
    fn test_status_code_round_trips_through_u32() {
        assert_eq!(StatusCode::try_from(0), Ok(StatusCode::Success));
        assert_eq!(StatusCode::try_from(1024), Ok(StatusCode::UnknownRequest));
        assert!(StatusCode::try_from(1023).is_err());
    }

    #[test]
    fn test_failure_reports_reply_type_and_status() {
        let response = Response::failure(RequestType::Talk, StatusCode::UserNotFound);
        assert_eq!(response.response_type(), ResponseType::Talk);
        assert_eq!(response.status(), StatusCode::UserNotFound);
    }

    #[test]
    fn test_successful_responses_report_success_status() {
        assert_eq!(Response::Exit.status(), StatusCode::Success);
        assert_eq!(
            Response::ExitNotice { name: "bob".to_string() }.status(),
            StatusCode::Success
        );
    }

    #[test]
    fn test_header_body_length_saturates_below_header_size() {
        let header = FrameHeader { kind: 1, total_length: 3, word: 0 };
        assert_eq!(header.body_length(), 0);
        let header = FrameHeader { kind: 1, total_length: 20, word: 0 };
        assert_eq!(header.body_length(), 12);
    }
}
