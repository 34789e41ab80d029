//! # Domain Traits
//!
//! Abstract interfaces for core system components (Chat, LLM).
//! Allows for pluggable implementations in the Infrastructure layer.

use crate::domain::types::{IncomingMessage, MediaRef};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Abstract interface for a Chat Provider (e.g., Matrix).
/// Every send is a reply anchored to an existing event; returns the new event id.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a plain-text reply
    async fn send_reply(&self, room_id: &str, anchor: &str, body: &str) -> Result<String>;

    /// Send a reply with an HTML body alongside the plain one
    async fn send_html_reply(
        &self,
        room_id: &str,
        anchor: &str,
        plain: &str,
        html: &str,
    ) -> Result<String>;

    /// Upload an image and send it as a reply
    async fn send_image_reply(
        &self,
        room_id: &str,
        anchor: &str,
        data: Vec<u8>,
        content_type: &str,
        filename: &str,
    ) -> Result<String>;

    /// Fetch (and decrypt, if needed) a single event
    async fn fetch_message(&self, room_id: &str, event_id: &str) -> Result<IncomingMessage>;

    /// Download (and decrypt, if needed) media bytes
    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>>;

    /// Joined members of the room: user id -> display name
    async fn room_members(&self, room_id: &str) -> Result<HashMap<String, String>>;
}

/// Abstract interface for an LLM Provider
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a single completion, no retries
    async fn complete(
        &self,
        model: &str,
        max_tokens: u32,
        prompt: &str,
    ) -> Result<String, crate::infrastructure::llm::LlmError>;
}
