//! # Matrix Service Adapter
//!
//! Implements the `ChatProvider` trait for the Matrix protocol using the `matrix_sdk`.
//! This module is the bridge between the transport-neutral message model used by the
//! router and the Matrix client: sending replies, uploading images, fetching and
//! decrypting events and media.

use crate::domain::traits::ChatProvider;
use crate::domain::types::{IncomingMessage, MediaRef};
use crate::infrastructure::storage::MessageStore;
use crate::strings::logs;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use matrix_sdk::authentication::SessionTokens;
use matrix_sdk::authentication::matrix::MatrixSession;
use matrix_sdk::media::{MediaFormat, MediaRequestParameters};
use matrix_sdk::room::Room;
use matrix_sdk::ruma::events::relation::InReplyTo;
use matrix_sdk::ruma::events::room::message::{
    ImageMessageEventContent, MessageType, OriginalSyncRoomMessageEvent, Relation,
    RoomMessageEventContent,
};
use matrix_sdk::ruma::events::room::{ImageInfo, MediaSource};
use matrix_sdk::ruma::events::{
    AnySyncMessageLikeEvent, AnySyncTimelineEvent, SyncMessageLikeEvent,
};
use matrix_sdk::ruma::{EventId, RoomId, UInt};
use matrix_sdk::{Client, RoomMemberships, SessionMeta};
use mime_guess::mime::Mime;
use std::collections::HashMap;
use std::path::Path;

const META_USER_ID: &str = "user_id";
const META_ACCESS_TOKEN: &str = "access_token";
const META_DEVICE_ID: &str = "device_id";

/// Converts a room message event into the router's message model.
pub fn incoming_from_event(
    room_id: &str,
    ev: &OriginalSyncRoomMessageEvent,
    raw_json: Option<String>,
) -> IncomingMessage {
    let reply_to = match &ev.content.relates_to {
        Some(Relation::Reply { in_reply_to }) => Some(in_reply_to.event_id.to_string()),
        Some(Relation::Thread(thread)) => thread
            .in_reply_to
            .as_ref()
            .map(|r| r.event_id.to_string()),
        _ => None,
    };

    let media = match &ev.content.msgtype {
        MessageType::Image(image) => serde_json::to_value(&image.source).ok().map(|source| MediaRef {
            source,
            mimetype: image.info.as_ref().and_then(|i| i.mimetype.clone()),
        }),
        _ => None,
    };

    IncomingMessage {
        event_id: ev.event_id.to_string(),
        room_id: room_id.to_string(),
        sender: ev.sender.to_string(),
        timestamp_ms: u64::from(ev.origin_server_ts.get()) as i64,
        msgtype: ev.content.msgtype().to_string(),
        body: ev.content.body().to_string(),
        reply_to,
        media,
        raw_json,
    }
}

/// Restores the session persisted in the meta table, or logs in with the password
/// and persists the new session.
pub async fn login(
    client: &Client,
    store: &MessageStore,
    username: &str,
    password: &str,
    device_name: &str,
) -> Result<()> {
    let user_id = store.get_meta(META_USER_ID)?;
    let token = store.get_meta(META_ACCESS_TOKEN)?;
    let device_id = store.get_meta(META_DEVICE_ID)?;

    if let (Some(user_id), Some(access_token), Some(device_id)) = (user_id, token, device_id) {
        let session = MatrixSession {
            meta: SessionMeta {
                user_id: user_id.parse().context("invalid stored user_id")?,
                device_id: device_id.into(),
            },
            tokens: SessionTokens {
                access_token,
                refresh_token: None,
            },
        };
        client
            .restore_session(session)
            .await
            .context("restoring session")?;
        tracing::info!("{}", logs::SESSION_RESTORED);
        return Ok(());
    }

    let response = client
        .matrix_auth()
        .login_username(username, password)
        .initial_device_display_name(device_name)
        .send()
        .await
        .context("login failed")?;

    store.set_meta(META_USER_ID, response.user_id.as_str())?;
    store.set_meta(META_ACCESS_TOKEN, &response.access_token)?;
    store.set_meta(META_DEVICE_ID, response.device_id.as_str())?;
    tracing::info!(
        "{}",
        logs::logged_in(response.user_id.as_str(), response.device_id.as_str())
    );
    Ok(())
}

/// Builds a client whose crypto state lives next to the message database.
pub async fn build_client(homeserver: &str, store_dir: &Path) -> Result<Client> {
    std::fs::create_dir_all(store_dir)
        .with_context(|| format!("creating store directory at {}", store_dir.display()))?;
    Client::builder()
        .homeserver_url(homeserver)
        .sqlite_store(store_dir, None)
        .build()
        .await
        .context("building matrix client")
}

#[derive(Clone)]
pub struct MatrixService {
    client: Client,
}

impl MatrixService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn room(&self, room_id: &str) -> Result<Room> {
        let room_id = RoomId::parse(room_id)?;
        self.client
            .get_room(&room_id)
            .ok_or_else(|| anyhow!("room {} not joined", room_id))
    }

    async fn send_as_reply(
        &self,
        room_id: &str,
        anchor: &str,
        mut content: RoomMessageEventContent,
    ) -> Result<String> {
        let room = self.room(room_id)?;
        let anchor = EventId::parse(anchor)?;
        content.relates_to = Some(Relation::Reply {
            in_reply_to: InReplyTo::new(anchor),
        });
        let resp = room.send(content).await?;
        Ok(resp.event_id.to_string())
    }
}

#[async_trait]
impl ChatProvider for MatrixService {
    async fn send_reply(&self, room_id: &str, anchor: &str, body: &str) -> Result<String> {
        tracing::debug!("Bot replying in {}: {}", room_id, body);
        self.send_as_reply(room_id, anchor, RoomMessageEventContent::text_plain(body))
            .await
    }

    async fn send_html_reply(
        &self,
        room_id: &str,
        anchor: &str,
        plain: &str,
        html: &str,
    ) -> Result<String> {
        self.send_as_reply(room_id, anchor, RoomMessageEventContent::text_html(plain, html))
            .await
    }

    async fn send_image_reply(
        &self,
        room_id: &str,
        anchor: &str,
        data: Vec<u8>,
        content_type: &str,
        filename: &str,
    ) -> Result<String> {
        let mime: Mime = content_type.parse().unwrap_or(mime_guess::mime::IMAGE_PNG);
        let size = UInt::new(data.len() as u64);
        let upload = self.client.media().upload(&mime, data, None).await?;

        let mut info = ImageInfo::new();
        info.mimetype = Some(mime.to_string());
        info.size = size;
        let image = ImageMessageEventContent::plain(filename.to_string(), upload.content_uri)
            .info(Some(Box::new(info)));

        self.send_as_reply(
            room_id,
            anchor,
            RoomMessageEventContent::new(MessageType::Image(image)),
        )
        .await
    }

    async fn fetch_message(&self, room_id: &str, event_id: &str) -> Result<IncomingMessage> {
        let room = self.room(room_id)?;
        let event_id = EventId::parse(event_id)?;
        let event = room.event(&event_id, None).await?;
        let raw_json = event.raw().json().get().to_string();

        match event.raw().deserialize()? {
            AnySyncTimelineEvent::MessageLike(AnySyncMessageLikeEvent::RoomMessage(
                SyncMessageLikeEvent::Original(ev),
            )) => Ok(incoming_from_event(room_id, &ev, Some(raw_json))),
            _ => Err(anyhow!("event {} is not a room message", event_id)),
        }
    }

    async fn download_media(&self, media: &MediaRef) -> Result<Vec<u8>> {
        let source: MediaSource =
            serde_json::from_value(media.source.clone()).context("invalid media source")?;
        let request = MediaRequestParameters {
            source,
            format: MediaFormat::File,
        };
        let data = self.client.media().get_media_content(&request, true).await?;
        Ok(data)
    }

    async fn room_members(&self, room_id: &str) -> Result<HashMap<String, String>> {
        let room = self.room(room_id)?;
        let members = room.members(RoomMemberships::JOIN).await?;
        Ok(members
            .iter()
            .filter_map(|m| {
                m.display_name()
                    .map(|name| (m.user_id().to_string(), name.to_string()))
            })
            .collect())
    }
}
