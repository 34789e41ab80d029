//! Shared fakes for unit tests.

use crate::domain::traits::{ChatProvider, LlmProvider};
use crate::domain::types::{IncomingMessage, MSGTYPE_TEXT, MediaRef};
use crate::infrastructure::llm::LlmError;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub event_id: String,
    pub room_id: String,
    pub anchor: String,
    pub body: String,
    pub html: Option<String>,
    pub image: Option<(usize, String)>,
}

/// Chat provider that records every send and serves canned events, media and members.
#[derive(Default)]
pub struct RecordingChat {
    pub sent: Mutex<Vec<Sent>>,
    pub events: Mutex<HashMap<String, IncomingMessage>>,
    pub media: Mutex<HashMap<String, Vec<u8>>>,
    pub members: Mutex<HashMap<String, String>>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&self, message: IncomingMessage) {
        self.events.lock().insert(message.event_id.clone(), message);
    }

    pub fn add_media(&self, uri: &str, data: Vec<u8>) {
        self.media.lock().insert(uri.to_string(), data);
    }

    pub fn add_member(&self, user_id: &str, display: &str) {
        self.members
            .lock()
            .insert(user_id.to_string(), display.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().iter().map(|s| s.body.clone()).collect()
    }

    fn record(&self, sent: Sent) -> String {
        let mut guard = self.sent.lock();
        let event_id = format!("$sent-{}", guard.len());
        guard.push(Sent {
            event_id: event_id.clone(),
            ..sent
        });
        event_id
    }
}

#[async_trait]
impl ChatProvider for RecordingChat {
    async fn send_reply(&self, room_id: &str, anchor: &str, body: &str) -> Result<String> {
        Ok(self.record(Sent {
            event_id: String::new(),
            room_id: room_id.to_string(),
            anchor: anchor.to_string(),
            body: body.to_string(),
            html: None,
            image: None,
        }))
    }

    async fn send_html_reply(
        &self,
        room_id: &str,
        anchor: &str,
        plain: &str,
        html: &str,
    ) -> Result<String> {
        Ok(self.record(Sent {
            event_id: String::new(),
            room_id: room_id.to_string(),
            anchor: anchor.to_string(),
            body: plain.to_string(),
            html: Some(html.to_string()),
            image: None,
        }))
    }

    async fn send_image_reply(
        &self,
        room_id: &str,
        anchor: &str,
        data: Vec<u8>,
        content_type: &str,
        filename: &str,
    ) -> Result<String> {
        Ok(self.record(Sent {
            event_id: String::new(),
            room_id: room_id.to_string(),
            anchor: anchor.to_string(),
            body: filename.to_string(),
            html: None,
            image: Some((data.len(), content_type.to_string())),
        }))
    }

    async fn fetch_message(&self, _room_id: &str, event_id: &str) -> Result<IncomingMessage> {
        self.events
            .lock()
            .get(event_id)
            .cloned()
            .ok_or_else(|| anyhow!("event {event_id} not found"))
    }

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>> {
        let uri = media.source.as_str().unwrap_or_default();
        self.media
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| anyhow!("media {uri} not found"))
    }

    async fn room_members(&self, _room_id: &str) -> Result<HashMap<String, String>> {
        Ok(self.members.lock().clone())
    }
}

/// LLM provider returning a fixed answer and recording prompts.
pub struct FakeLlm {
    pub answer: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn complete(&self, _model: &str, _max_tokens: u32, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());
        self.answer.clone().ok_or(LlmError::EmptyResponse)
    }
}

pub fn text_message(event_id: &str, room_id: &str, sender: &str, body: &str) -> IncomingMessage {
    IncomingMessage {
        event_id: event_id.to_string(),
        room_id: room_id.to_string(),
        sender: sender.to_string(),
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        msgtype: MSGTYPE_TEXT.to_string(),
        body: body.to_string(),
        ..Default::default()
    }
}
