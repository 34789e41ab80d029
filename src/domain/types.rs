//! # Domain Types
//!
//! Common data structures and enums used across the application logic.

use serde::{Deserialize, Serialize};

pub const MSGTYPE_TEXT: &str = "m.text";
pub const MSGTYPE_IMAGE: &str = "m.image";
pub const MSGTYPE_STICKER: &str = "m.sticker";

/// Reference to media attached to a message.
/// `source` is the transport's own serialized media source (plain or encrypted).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRef {
    pub source: serde_json::Value,
    #[serde(default)]
    pub mimetype: Option<String>,
}

/// Transport-neutral view of a room message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomingMessage {
    pub event_id: String,
    pub room_id: String,
    pub sender: String,
    pub timestamp_ms: i64,
    pub msgtype: String,
    pub body: String,
    pub reply_to: Option<String>,
    pub media: Option<MediaRef>,
    pub raw_json: Option<String>,
}

impl IncomingMessage {
    pub fn is_image(&self) -> bool {
        self.msgtype == MSGTYPE_IMAGE || self.msgtype == MSGTYPE_STICKER || self.media.is_some()
    }
}

/// Per-message input to the executor. Owned by a single dispatch.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub room_id: String,
    pub sender: String,
    pub event_id: String,
    pub body: String,
    pub reply_to: Option<String>,
    pub command: String,
    /// Everything after the command token.
    pub args: String,
    pub label: String,
    /// The triggering message, kept for media lookup.
    pub message: IncomingMessage,
}

impl DispatchContext {
    pub fn from_message(message: IncomingMessage, command: String, args: String, label: String) -> Self {
        Self {
            room_id: message.room_id.clone(),
            sender: message.sender.clone(),
            event_id: message.event_id.clone(),
            body: message.body.clone(),
            reply_to: message.reply_to.clone(),
            command,
            args,
            label,
            message,
        }
    }
}

/// Result of a successful command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text for the router to post as a reply.
    Replied(String),
    /// The handler already posted (or scheduled) its own output.
    SentDirectly,
}

/// Where the router sent a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Ignored,
    Continuation,
    Command,
    PassThrough,
}
