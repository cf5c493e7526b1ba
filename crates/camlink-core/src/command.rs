//! Command channel grammar: what a client may send and what it gets back.
//!
//! A request is one of:
//!   - a bare direction token: `RIGHT`, or the localized `KANAN`
//!   - a JSON object: `{"direction":"RIGHT"}` or `{"sync":true}`
//!
//! Every form is normalized into a single [`Command`] before it reaches the
//! coordinate store. The reply mirrors the request: bare tokens get a bare
//! `x,y` pair, JSON requests get a JSON response.

use serde::{Deserialize, Serialize};

// ── Commands ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Per-axis change applied by one move.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
        }
    }

    /// Parse a direction token. Case-insensitive; accepts English and
    /// Indonesian spellings.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "LEFT" | "KIRI" => Some(Direction::Left),
            "RIGHT" | "KANAN" => Some(Direction::Right),
            "UP" | "ATAS" => Some(Direction::Up),
            "DOWN" | "BAWAH" => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

/// A parsed directive from the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    SyncRequest,
    /// Well-formed request whose direction token is not recognized.
    Unknown(String),
}

impl Command {
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Left => Command::MoveLeft,
            Direction::Right => Command::MoveRight,
            Direction::Up => Command::MoveUp,
            Direction::Down => Command::MoveDown,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Command::MoveLeft => Some(Direction::Left),
            Command::MoveRight => Some(Direction::Right),
            Command::MoveUp => Some(Direction::Up),
            Command::MoveDown => Some(Direction::Down),
            Command::SyncRequest | Command::Unknown(_) => None,
        }
    }

    /// Classify a direction token.
    pub fn parse(token: &str) -> Self {
        match Direction::from_token(token) {
            Some(d) => Command::from_direction(d),
            None => Command::Unknown(token.trim().to_string()),
        }
    }
}

/// How the client framed its request; the response uses the same framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub format: RequestFormat,
}

/// Structured request body.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct JsonRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<bool>,
}

impl JsonRequest {
    pub fn direction(direction: Direction) -> Self {
        Self {
            direction: Some(direction.as_token().to_string()),
            sync: None,
        }
    }

    pub fn sync() -> Self {
        Self {
            direction: None,
            sync: Some(true),
        }
    }
}

/// Parse raw bytes read from a command connection.
///
/// On failure the returned error carries the format the client appeared to
/// use, so the server can still answer in kind.
pub fn parse_request(raw: &[u8]) -> Result<Request, (RequestFormat, CommandError)> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| (RequestFormat::Text, CommandError::InvalidUtf8))?
        .trim();

    if text.is_empty() {
        return Err((RequestFormat::Text, CommandError::Empty));
    }

    if !text.starts_with('{') {
        return Ok(Request {
            command: Command::parse(text),
            format: RequestFormat::Text,
        });
    }

    let body: JsonRequest = serde_json::from_str(text)
        .map_err(|e| (RequestFormat::Json, CommandError::MalformedJson(e.to_string())))?;

    let command = match (body.sync, body.direction) {
        (Some(true), _) => Command::SyncRequest,
        (_, Some(direction)) => Command::parse(&direction),
        _ => return Err((RequestFormat::Json, CommandError::MissingField)),
    };

    Ok(Request {
        command,
        format: RequestFormat::Json,
    })
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    MoveResponse,
    SyncResponse,
}

/// Structured response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResponseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of one command, before it is framed for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    Moved { x: i64, y: i64 },
    Synced { x: i64, y: i64 },
    Unknown { token: String, x: i64, y: i64 },
    Rejected(CommandError),
}

impl CommandResponse {
    pub fn to_json(&self) -> JsonResponse {
        match self {
            CommandResponse::Moved { x, y } => JsonResponse {
                status: ResponseStatus::Ok,
                x: Some(*x),
                y: Some(*y),
                kind: Some(ResponseType::MoveResponse),
                message: None,
            },
            CommandResponse::Synced { x, y } => JsonResponse {
                status: ResponseStatus::Ok,
                x: Some(*x),
                y: Some(*y),
                kind: Some(ResponseType::SyncResponse),
                message: None,
            },
            CommandResponse::Unknown { token, x, y } => JsonResponse {
                status: ResponseStatus::Error,
                x: Some(*x),
                y: Some(*y),
                kind: Some(ResponseType::MoveResponse),
                message: Some(CommandError::UnknownCommand(token.clone()).to_string()),
            },
            CommandResponse::Rejected(e) => JsonResponse {
                status: ResponseStatus::Error,
                x: None,
                y: None,
                kind: None,
                message: Some(e.to_string()),
            },
        }
    }

    /// Frame the response for the wire.
    pub fn encode(&self, format: RequestFormat) -> Vec<u8> {
        match format {
            RequestFormat::Json => serde_json::to_vec(&self.to_json()).unwrap_or_default(),
            RequestFormat::Text => match self {
                CommandResponse::Moved { x, y } | CommandResponse::Synced { x, y } => {
                    format!("{x},{y}").into_bytes()
                }
                CommandResponse::Unknown { .. } | CommandResponse::Rejected(_) => {
                    TEXT_ERROR.to_vec()
                }
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            CommandResponse::Moved { .. } | CommandResponse::Synced { .. }
        )
    }
}

/// Body of every text-framed error reply.
pub const TEXT_ERROR: &[u8] = b"ERROR";

/// Largest request the server reads from one connection.
pub const MAX_REQUEST_BYTES: usize = 1024;

/// Whether `raw` already holds a whole request.
///
/// A newline always ends a request. Otherwise a text request is whole once
/// it carries a token, and a JSON request once its object closes or it can
/// no longer become valid.
pub fn request_complete(raw: &[u8]) -> bool {
    if raw.contains(&b'\n') {
        return true;
    }
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        // A multi-byte character cut at the end may still be completed.
        Err(e) => return e.error_len().is_some(),
    };
    let text = text.trim_start();
    if text.is_empty() {
        return false;
    }
    if !text.starts_with('{') {
        return true;
    }
    match serde_json::from_str::<serde::de::IgnoredAny>(text) {
        Ok(_) => true,
        Err(e) => !e.is_eof(),
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("request is empty")]
    Empty,

    #[error("request is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed JSON request: {0}")]
    MalformedJson(String),

    #[error("request has neither \"direction\" nor \"sync\"")]
    MissingField,

    #[error("unknown direction: {0}")]
    UnknownCommand(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_tokens_parse_case_insensitively() {
        let req = parse_request(b"  right\n").unwrap();
        assert_eq!(req.command, Command::MoveRight);
        assert_eq!(req.format, RequestFormat::Text);
    }

    #[test]
    fn localized_tokens_map_to_directions() {
        assert_eq!(Command::parse("KIRI"), Command::MoveLeft);
        assert_eq!(Command::parse("kanan"), Command::MoveRight);
        assert_eq!(Command::parse("ATAS"), Command::MoveUp);
        assert_eq!(Command::parse("Bawah"), Command::MoveDown);
    }

    #[test]
    fn unrecognized_token_is_unknown_not_error() {
        let req = parse_request(b"BERHENTI").unwrap();
        assert_eq!(req.command, Command::Unknown("BERHENTI".into()));
    }

    #[test]
    fn json_direction_and_sync() {
        let req = parse_request(br#"{"direction":"up"}"#).unwrap();
        assert_eq!(req.command, Command::MoveUp);
        assert_eq!(req.format, RequestFormat::Json);

        let req = parse_request(br#"{"sync": true}"#).unwrap();
        assert_eq!(req.command, Command::SyncRequest);
    }

    #[test]
    fn json_without_known_fields_is_parse_error() {
        let (format, err) = parse_request(br#"{"speed":3}"#).unwrap_err();
        assert_eq!(format, RequestFormat::Json);
        assert_eq!(err, CommandError::MissingField);

        let (_, err) = parse_request(br#"{"sync":false}"#).unwrap_err();
        assert_eq!(err, CommandError::MissingField);
    }

    #[test]
    fn broken_json_is_parse_error() {
        let (format, err) = parse_request(b"{\"direction\":").unwrap_err();
        assert_eq!(format, RequestFormat::Json);
        assert!(matches!(err, CommandError::MalformedJson(_)));
    }

    #[test]
    fn json_request_is_incomplete_until_the_object_closes() {
        assert!(!request_complete(b""));
        assert!(!request_complete(b"  "));
        assert!(!request_complete(br#"{"direction":"#));
        assert!(!request_complete(br#"{"direction":"RI"#));
        assert!(request_complete(br#"{"direction":"RIGHT"}"#));
        assert!(request_complete(b"{\"direction\":\n"));
        assert!(request_complete(br#"{"direction" 5}"#));
    }

    #[test]
    fn text_request_is_complete_once_it_has_a_token() {
        assert!(request_complete(b"LEFT"));
        assert!(request_complete(b"\n"));
        assert!(!request_complete(&[0xE2, 0x82]));
        assert!(request_complete(&[0xff, 0xfe]));
    }

    #[test]
    fn empty_and_binary_requests_are_rejected() {
        assert_eq!(parse_request(b"   ").unwrap_err().1, CommandError::Empty);
        assert_eq!(
            parse_request(&[0xff, 0xfe]).unwrap_err().1,
            CommandError::InvalidUtf8
        );
    }

    #[test]
    fn move_response_json_shape() {
        let bytes = CommandResponse::Moved { x: 1, y: 0 }.encode(RequestFormat::Json);
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"status":"ok","x":1,"y":0,"type":"move_response"})
        );
    }

    #[test]
    fn sync_response_json_shape() {
        let bytes = CommandResponse::Synced { x: -2, y: 5 }.encode(RequestFormat::Json);
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"status":"ok","x":-2,"y":5,"type":"sync_response"})
        );
    }

    #[test]
    fn unknown_response_reports_error_with_position() {
        let resp = CommandResponse::Unknown {
            token: "JUMP".into(),
            x: 3,
            y: 4,
        };
        let json = resp.to_json();
        assert_eq!(json.status, ResponseStatus::Error);
        assert_eq!((json.x, json.y), (Some(3), Some(4)));
        assert!(json.message.unwrap().contains("JUMP"));
        assert_eq!(resp.encode(RequestFormat::Text), TEXT_ERROR);
    }

    #[test]
    fn text_responses_are_comma_pairs() {
        let bytes = CommandResponse::Moved { x: -1, y: 7 }.encode(RequestFormat::Text);
        assert_eq!(bytes, b"-1,7");
    }

    #[test]
    fn json_request_serializes_only_set_fields() {
        let text = serde_json::to_string(&JsonRequest::direction(Direction::Down)).unwrap();
        assert_eq!(text, r#"{"direction":"DOWN"}"#);
        let text = serde_json::to_string(&JsonRequest::sync()).unwrap();
        assert_eq!(text, r#"{"sync":true}"#);
    }
}
