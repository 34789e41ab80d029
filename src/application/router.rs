//! # Dispatch Router
//!
//! Classifies every incoming room message and hands it to the right stage:
//! a pending knock-knock exchange, the command executor, or the link pipeline.
//! Messages are persisted before classification.

use crate::application::conversation::KnockKnock;
use crate::application::executor::Executor;
use crate::application::links::{LinkPipeline, extract_links};
use crate::application::utils::{is_command, normalize_command, split_command, truncate};
use crate::domain::catalog::Catalog;
use crate::domain::config::{ALWAYS_ALLOWED_COMMAND, RoomEntry};
use crate::domain::error::CommandError;
use crate::domain::traits::ChatProvider;
use crate::domain::types::{DispatchContext, IncomingMessage, Outcome, Route};
use crate::infrastructure::storage::MessageStore;
use crate::strings::{logs, messages};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const HELP_COMMAND: &str = "help";

/// Static routing settings resolved at startup.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Monitored rooms; empty means every joined room.
    pub rooms: Vec<RoomEntry>,
    pub label: String,
    pub dry_run: bool,
    /// Messages older than this are backlog replay: stored, never dispatched.
    pub started_at_ms: i64,
}

/// Outcome of `handle`: where the message went and the task spawned for it, if any.
#[derive(Debug)]
pub struct Dispatched {
    pub route: Route,
    pub task: Option<JoinHandle<()>>,
}

impl Dispatched {
    fn new(route: Route) -> Self {
        Self { route, task: None }
    }

    fn spawned(route: Route, task: JoinHandle<()>) -> Self {
        Self {
            route,
            task: Some(task),
        }
    }
}

#[derive(Clone)]
pub struct Router {
    config: Arc<RouterConfig>,
    catalog: Arc<Catalog>,
    store: MessageStore,
    chat: Arc<dyn ChatProvider>,
    executor: Arc<Executor>,
    knock: KnockKnock,
    links: Arc<LinkPipeline>,
    ready: watch::Receiver<bool>,
    cancel: watch::Receiver<bool>,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RouterConfig,
        catalog: Arc<Catalog>,
        store: MessageStore,
        chat: Arc<dyn ChatProvider>,
        executor: Arc<Executor>,
        knock: KnockKnock,
        links: Arc<LinkPipeline>,
        ready: watch::Receiver<bool>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog,
            store,
            chat,
            executor,
            knock,
            links,
            ready,
            cancel,
        }
    }

    fn find_room(&self, room_id: &str) -> Option<&RoomEntry> {
        self.config.rooms.iter().find(|r| r.id == room_id)
    }

    pub async fn handle(&self, msg: IncomingMessage) -> Dispatched {
        let room = self.find_room(&msg.room_id).cloned();
        if !self.config.rooms.is_empty() && room.is_none() {
            return Dispatched::new(Route::Ignored);
        }
        if msg.body.trim().is_empty() {
            return Dispatched::new(Route::Ignored);
        }

        if let Err(e) = self.store.store_message(&msg) {
            tracing::error!("Failed to store event {}: {:#}", msg.event_id, e);
            return Dispatched::new(Route::Ignored);
        }
        let urls = extract_links(&msg.body);
        if let Err(e) = self.store.store_links(&msg, &urls) {
            tracing::error!("Failed to store links of {}: {:#}", msg.event_id, e);
        }

        let room_name = room.as_ref().map(|r| r.comment.as_str()).unwrap_or_default();
        tracing::info!("[{}] {}: {}", room_name, msg.sender, truncate(&msg.body, 100));

        let label = self.config.label.as_str();
        if !label.is_empty() && msg.body.contains(label) {
            tracing::debug!("Skipped message carrying the reply label");
            return Dispatched::new(Route::Ignored);
        }

        if msg.timestamp_ms < self.config.started_at_ms {
            tracing::debug!("Skipped backlog event {}", msg.event_id);
            return Dispatched::new(Route::Ignored);
        }

        if let Some(anchor) = msg
            .reply_to
            .as_deref()
            .filter(|id| self.knock.store().lookup(id).is_some())
        {
            let knock = self.knock.clone();
            let anchor = anchor.to_string();
            let task = tokio::spawn(async move {
                match knock.continue_exchange(&msg.room_id, &anchor, &msg.event_id).await {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!("Knock-knock exchange {} already finished", anchor),
                    Err(e) => tracing::error!("Failed to continue knock-knock exchange: {:#}", e),
                }
            });
            return Dispatched::spawned(Route::Continuation, task);
        }

        let command_room = room
            .as_ref()
            .filter(|r| r.commands_enabled() && is_command(&msg.body));
        if let Some(room) = command_room {
            if self.config.dry_run {
                tracing::info!("{}", logs::DRY_RUN_COMMAND);
                return Dispatched::new(Route::Command);
            }
            let this = self.clone();
            let room = room.clone();
            let task = tokio::spawn(async move { this.dispatch_command(msg, room).await });
            return Dispatched::spawned(Route::Command, task);
        }

        let links = Arc::clone(&self.links);
        let task = tokio::spawn(async move {
            links.process(&msg, room.as_ref(), &urls).await;
        });
        Dispatched::spawned(Route::PassThrough, task)
    }

    /// Resolves once sync has caught up. False when shutdown wins the race.
    async fn wait_ready(&self) -> bool {
        let mut ready = self.ready.clone();
        let mut cancel = self.cancel.clone();
        if *cancel.borrow() {
            return false;
        }
        tokio::select! {
            biased;
            Ok(_) = cancel.wait_for(|c| *c) => false,
            res = ready.wait_for(|r| *r) => res.is_ok(),
        }
    }

    async fn dispatch_command(&self, msg: IncomingMessage, room: RoomEntry) {
        let normalized = normalize_command(&msg.body);
        let (command, args) = split_command(&normalized, ALWAYS_ALLOWED_COMMAND);

        if !self.wait_ready().await {
            tracing::debug!("Dropped command '{}' during shutdown", command);
            return;
        }

        let allowed = room.allowed_commands.as_deref();
        let ctx = DispatchContext::from_message(msg, command, args, self.config.label.clone());

        let result = if !room.is_command_allowed(&ctx.command) {
            Err(CommandError::PermissionDenied)
        } else if ctx.command == HELP_COMMAND {
            Ok(Outcome::Replied(self.catalog.help(allowed)))
        } else {
            match self.catalog.resolve(&ctx.command) {
                Some(spec) => {
                    tracing::info!("Dispatching '{}' ({}) from {}", ctx.command, spec.kind(), ctx.sender);
                    self.executor.execute(spec, &ctx).await
                }
                None => Ok(Outcome::Replied(messages::unknown_command(&self.catalog.help(allowed)))),
            }
        };

        let text = match result {
            Ok(Outcome::Replied(text)) => text,
            Ok(Outcome::SentDirectly) => return,
            Err(CommandError::PermissionDenied) => messages::NOT_ALLOWED.to_string(),
            Err(CommandError::NotFound(what)) => what,
            Err(e) => {
                tracing::error!("Failed to execute bot command '{}': {}", ctx.command, e);
                messages::command_failed(&ctx.command)
            }
        };
        self.reply(&ctx, &format!("{}{}", ctx.label, text)).await;
    }

    async fn reply(&self, ctx: &DispatchContext, body: &str) {
        if let Err(e) = self.chat.send_reply(&ctx.room_id, &ctx.event_id, body).await {
            tracing::error!("Failed to send reply for '{}': {:#}", ctx.command, e);
        } else {
            tracing::info!("Sent bot response for '{}'", ctx.command);
        }
    }
}
