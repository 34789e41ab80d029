//! # Conversational State
//!
//! Tracks scripted knock-knock exchanges keyed by the event id the bot is waiting
//! for a reply to. Entries are consumed on match and evicted by independent timers.

use crate::domain::traits::ChatProvider;
use crate::strings::jokes::{Joke, KNOCK_KNOCK};
use crate::strings::messages;
use anyhow::Result;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_EXCHANGE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Waiting for "who's there?"
    AwaitingWhoIsThere,
    /// Waiting for "<name> who?"
    AwaitingNameWho,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStep {
    pub joke: &'static Joke,
    pub step: Step,
    pub label: String,
}

/// Lock-guarded map of anchor event id to pending step.
#[derive(Debug, Default)]
pub struct ConversationStore {
    pending: Mutex<HashMap<String, ConversationStep>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, anchor: &str, step: ConversationStep) {
        self.pending.lock().insert(anchor.to_string(), step);
    }

    pub fn lookup(&self, event_id: &str) -> Option<ConversationStep> {
        self.pending.lock().get(event_id).cloned()
    }

    pub fn take(&self, event_id: &str) -> Option<ConversationStep> {
        self.pending.lock().remove(event_id)
    }

    pub fn end(&self, event_id: &str) {
        self.pending.lock().remove(event_id);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `anchor` after `delay`. The task only holds the key.
    pub fn schedule_eviction(self: &Arc<Self>, anchor: String, delay: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if store.take(&anchor).is_some() {
                tracing::debug!("Evicted stale knock-knock exchange {}", anchor);
            }
        })
    }
}

/// Drives the knock-knock script over a chat provider.
#[derive(Clone)]
pub struct KnockKnock {
    store: Arc<ConversationStore>,
    chat: Arc<dyn ChatProvider>,
    ttl: Duration,
}

impl KnockKnock {
    pub fn new(store: Arc<ConversationStore>, chat: Arc<dyn ChatProvider>) -> Self {
        Self {
            store,
            chat,
            ttl: DEFAULT_EXCHANGE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Posts the opener as a reply to `anchor` with a random joke.
    pub async fn start(&self, room_id: &str, anchor: &str, label: &str) -> Result<String> {
        let joke = KNOCK_KNOCK
            .choose(&mut rand::thread_rng())
            .unwrap_or(&KNOCK_KNOCK[0]);
        self.start_with(room_id, anchor, label, joke).await
    }

    pub async fn start_with(
        &self,
        room_id: &str,
        anchor: &str,
        label: &str,
        joke: &'static Joke,
    ) -> Result<String> {
        let body = format!("{label}{}", messages::KNOCK_KNOCK_OPENER);
        let opener = self.chat.send_reply(room_id, anchor, &body).await?;
        self.store.begin(
            &opener,
            ConversationStep {
                joke,
                step: Step::AwaitingWhoIsThere,
                label: label.to_string(),
            },
        );
        self.store.schedule_eviction(opener.clone(), self.ttl);
        Ok(opener)
    }

    /// Consumes the step anchored at `anchor` and answers `reply_event`.
    /// Returns false when the entry was already consumed or evicted.
    pub async fn continue_exchange(
        &self,
        room_id: &str,
        anchor: &str,
        reply_event: &str,
    ) -> Result<bool> {
        let Some(current) = self.store.take(anchor) else {
            return Ok(false);
        };

        match current.step {
            Step::AwaitingWhoIsThere => {
                let body = format!(
                    "{}{}",
                    current.label,
                    messages::knock_knock_name(current.joke.name)
                );
                let next_anchor = self.chat.send_reply(room_id, reply_event, &body).await?;
                self.store.begin(
                    &next_anchor,
                    ConversationStep {
                        step: Step::AwaitingNameWho,
                        ..current
                    },
                );
                self.store.schedule_eviction(next_anchor, self.ttl);
            }
            Step::AwaitingNameWho => {
                let body = format!("{}{}", current.label, current.joke.punchline);
                self.chat.send_reply(room_id, reply_event, &body).await?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingChat;

    const ROOM: &str = "!room:example.com";

    fn setup() -> (Arc<RecordingChat>, KnockKnock) {
        let chat = Arc::new(RecordingChat::new());
        let kk = KnockKnock::new(Arc::new(ConversationStore::new()), chat.clone());
        (chat, kk)
    }

    #[test]
    fn test_store_operations() {
        let store = ConversationStore::new();
        let step = ConversationStep {
            joke: &KNOCK_KNOCK[0],
            step: Step::AwaitingWhoIsThere,
            label: "> ".to_string(),
        };
        store.begin("$a", step.clone());
        assert_eq!(store.lookup("$a"), Some(step.clone()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.take("$a"), Some(step.clone()));
        assert_eq!(store.take("$a"), None);
        assert!(store.lookup("$unrelated").is_none());

        store.begin("$b", step);
        store.end("$b");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_full_exchange() {
        let (chat, kk) = setup();
        let joke = &KNOCK_KNOCK[0];

        let opener = kk.start_with(ROOM, "$cmd", "> ", joke).await.unwrap();
        assert_eq!(kk.store().lookup(&opener).unwrap().step, Step::AwaitingWhoIsThere);

        assert!(kk.continue_exchange(ROOM, &opener, "$whos-there").await.unwrap());
        assert!(kk.store().lookup(&opener).is_none());
        assert_eq!(kk.store().len(), 1);

        let name_event = chat.sent()[1].event_id.clone();
        assert_eq!(chat.sent()[1].anchor, "$whos-there");
        assert_eq!(kk.store().lookup(&name_event).unwrap().step, Step::AwaitingNameWho);

        assert!(kk.continue_exchange(ROOM, &name_event, "$name-who").await.unwrap());
        assert!(kk.store().is_empty());

        assert_eq!(
            chat.bodies(),
            vec![
                "> Knock knock! (reply to this message)".to_string(),
                "> Lettuce (reply to this message)".to_string(),
                "> Lettuce in, it's cold out here!".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_reply_advances_once() {
        let (chat, kk) = setup();
        let opener = kk.start(ROOM, "$cmd", "> ").await.unwrap();
        assert!(kk.continue_exchange(ROOM, &opener, "$r1").await.unwrap());
        assert!(!kk.continue_exchange(ROOM, &opener, "$r1").await.unwrap());
        assert_eq!(chat.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_anchor_not_found() {
        let (chat, kk) = setup();
        assert!(!kk.continue_exchange(ROOM, "$nothing", "$r").await.unwrap());
        assert!(chat.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_after_ttl() {
        let (_chat, kk) = setup();
        let kk = kk.with_ttl(Duration::from_secs(300));
        let opener = kk.start(ROOM, "$cmd", "> ").await.unwrap();
        assert!(kk.store().lookup(&opener).is_some());

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(kk.store().lookup(&opener).is_none());
        assert!(!kk.continue_exchange(ROOM, &opener, "$late").await.unwrap());
    }
}
