//! Wire formats shared with the HTTP layer: status codes, request parsing and
//! JSON replies. Names and message text always travel base64-encoded.

use crate::{
    error::{ChatError, ValidationError},
    limits,
    log::{ChatEntry, Cursor},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fmt;

/// Sentinel a client sends for `mid`/`ts` when it has no bookmark yet.
pub const UNKNOWN_BOOKMARK: &str = "X";

pub const EMPTY_ACTIVE_LIST: &str = r#"{"names":[]}"#;

/// Single-character status replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    NotLoggedIn,
    BadPostData,
    BadRequest,
    NoNews,
    MessageSent,
    EmptyMessage,
    MessageTooLong,
}

impl ResponseCode {
    pub fn as_char(self) -> char {
        match self {
            ResponseCode::NotLoggedIn => 'L',
            ResponseCode::BadPostData => 'X',
            ResponseCode::BadRequest => 'B',
            ResponseCode::NoNews => 'N',
            ResponseCode::MessageSent => 'O',
            ResponseCode::EmptyMessage => 'E',
            ResponseCode::MessageTooLong => 'M',
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// What goes back to the client: a status code or a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Code(ResponseCode),
    Json(String),
}

impl From<ResponseCode> for Reply {
    fn from(code: ResponseCode) -> Self {
        Reply::Code(code)
    }
}

impl From<ChatError> for Reply {
    fn from(error: ChatError) -> Self {
        Reply::Code(error.response_code())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Code(code) => code.fmt(f),
            Reply::Json(body) => f.write_str(body),
        }
    }
}

/// Splits a `"<char count> <text>"` post body and checks the text.
pub fn parse_post_body(body: &str) -> Result<&str, ValidationError> {
    let (count, text) = body
        .split_once(' ')
        .ok_or(ValidationError::BadPostData("missing separator"))?;
    let count: usize = count
        .parse()
        .map_err(|_| ValidationError::BadPostData("length is not a number"))?;
    limits::check_message(text)?;
    if text.chars().count() != count {
        return Err(ValidationError::BadPostData("length does not match"));
    }
    Ok(text)
}

/// Bookmark half of a delta request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bookmark {
    Unknown,
    Known(Cursor),
}

pub fn parse_bookmark(mid: &str, ts: &str) -> Result<Bookmark, ValidationError> {
    if mid.is_empty() || ts.is_empty() {
        return Err(ValidationError::BadRequest("empty bookmark field"));
    }
    if mid == UNKNOWN_BOOKMARK || ts == UNKNOWN_BOOKMARK {
        return Ok(Bookmark::Unknown);
    }
    let sequence = mid
        .parse::<u16>()
        .map_err(|_| ValidationError::BadRequest("mid is not a sequence number"))?;
    let timestamp = ts
        .parse::<i64>()
        .ok()
        .filter(|timestamp| *timestamp >= 0)
        .ok_or(ValidationError::BadRequest("ts is not a timestamp"))?;
    Ok(Bookmark::Known(Cursor {
        sequence,
        timestamp,
    }))
}

#[derive(Debug, Serialize)]
struct MessageView {
    mid: String,
    tim: String,
    atr: String,
    txt: String,
}

#[derive(Debug, Serialize)]
struct CursorView {
    mid: String,
    ts: String,
}

impl From<Cursor> for CursorView {
    fn from(cursor: Cursor) -> Self {
        Self {
            mid: cursor.sequence.to_string(),
            ts: cursor.timestamp.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DeltaView {
    messages: Vec<MessageView>,
    x: CursorView,
}

#[derive(Debug, Serialize)]
struct ActiveListView {
    names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChallengeView {
    qid: String,
    msg: String,
}

/// `{"messages":[...],"x":{"mid":..,"ts":..}}`. `author_name` resolves the
/// display name of each entry's author.
pub fn render_delta(
    entries: &[ChatEntry],
    cursor: Cursor,
    author_name: impl Fn(&ChatEntry) -> String,
) -> Result<String, ChatError> {
    let messages = entries
        .iter()
        .map(|entry| MessageView {
            mid: entry.sequence.to_string(),
            tim: format_clock(entry.timestamp),
            atr: STANDARD.encode(author_name(entry)),
            txt: STANDARD.encode(&entry.text),
        })
        .collect();
    let view = DeltaView {
        messages,
        x: cursor.into(),
    };
    Ok(serde_json::to_string(&view)?)
}

/// Delta reply that only moves the client's bookmark.
pub fn render_bookmark(cursor: Cursor) -> Result<String, ChatError> {
    render_delta(&[], cursor, |_| String::new())
}

/// `{"names":[...]}` with each name base64-encoded, in the order given.
pub fn render_active_list(names: &[String]) -> Result<String, ChatError> {
    let view = ActiveListView {
        names: names.iter().map(|name| STANDARD.encode(name)).collect(),
    };
    Ok(serde_json::to_string(&view)?)
}

pub fn render_challenge(id: u64, payload: &[u8]) -> Result<String, ChatError> {
    let view = ChallengeView {
        qid: id.to_string(),
        msg: STANDARD.encode(payload),
    };
    Ok(serde_json::to_string(&view)?)
}

/// `HH:MM:SS` in UTC.
pub fn format_clock(timestamp: i64) -> String {
    match chrono::DateTime::from_timestamp(timestamp, 0) {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => "00:00:00".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::UserId;

    #[test]
    fn post_body_carries_its_length() {
        assert_eq!(Ok("hello"), parse_post_body("5 hello"));
        assert_eq!(Ok("a b c"), parse_post_body("5 a b c"));
        // Counted in characters, not bytes.
        assert_eq!(Ok("héllo"), parse_post_body("5 héllo"));
    }

    #[test]
    fn malformed_post_bodies() {
        assert_eq!(
            Err(ValidationError::BadPostData("missing separator")),
            parse_post_body("hello")
        );
        assert_eq!(
            Err(ValidationError::BadPostData("length is not a number")),
            parse_post_body("five hello")
        );
        assert_eq!(
            Err(ValidationError::BadPostData("length does not match")),
            parse_post_body("4 hello")
        );
        assert_eq!(Err(ValidationError::EmptyMessage), parse_post_body("0 "));
        let long = "a".repeat(limits::MAX_MESSAGE_BYTES + 1);
        assert_eq!(
            Err(ValidationError::MessageTooLong(long.len())),
            parse_post_body(&format!("{} {long}", long.len()))
        );
    }

    #[test]
    fn bookmarks() {
        assert_eq!(Ok(Bookmark::Unknown), parse_bookmark("X", "X"));
        assert_eq!(Ok(Bookmark::Unknown), parse_bookmark("12", "X"));
        assert_eq!(
            Ok(Bookmark::Known(Cursor {
                sequence: 65535,
                timestamp: 1_700_000_000
            })),
            parse_bookmark("65535", "1700000000")
        );
        for (mid, ts) in [("", "1"), ("1", ""), ("65536", "1"), ("a", "1"), ("1", "-5"), ("1", "t")] {
            assert!(
                matches!(parse_bookmark(mid, ts), Err(ValidationError::BadRequest(_))),
                "{mid:?} {ts:?}"
            );
        }
    }

    #[test]
    fn delta_json_shape() {
        let entries = vec![ChatEntry {
            sequence: 7,
            timestamp: 3_661,
            author: UserId(9),
            text: "hi".into(),
        }];
        let cursor = Cursor {
            sequence: 7,
            timestamp: 3_661,
        };
        let json = render_delta(&entries, cursor, |_| "bob".to_string()).unwrap();
        assert_eq!(
            r#"{"messages":[{"mid":"7","tim":"01:01:01","atr":"Ym9i","txt":"aGk="}],"x":{"mid":"7","ts":"3661"}}"#,
            json
        );
        assert_eq!(
            r#"{"messages":[],"x":{"mid":"0","ts":"12"}}"#,
            render_bookmark(Cursor {
                sequence: 0,
                timestamp: 12
            })
            .unwrap()
        );
    }

    #[test]
    fn active_list_and_challenge_json() {
        assert_eq!(EMPTY_ACTIVE_LIST, render_active_list(&[]).unwrap());
        assert_eq!(
            r#"{"names":["YWxpY2U=","Ym9i"]}"#,
            render_active_list(&["alice".into(), "bob".into()]).unwrap()
        );
        assert_eq!(
            r#"{"qid":"42","msg":"AQID"}"#,
            render_challenge(42, &[1, 2, 3]).unwrap()
        );
    }

    #[test]
    fn reply_display() {
        assert_eq!("N", Reply::Code(ResponseCode::NoNews).to_string());
        assert_eq!("{}", Reply::Json("{}".into()).to_string());
        assert_eq!(
            Reply::Code(ResponseCode::NotLoggedIn),
            Reply::from(ChatError::SessionNotFound(UserId(1)))
        );
    }
}
