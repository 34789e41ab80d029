#![recursion_limit = "256"]
//! # Main Entry Point
//!
//! Wires the layers together:
//! - Domain: configuration, catalog, types
//! - Infrastructure: Matrix, storage, LLM, subprocesses
//! - Application: router, executor, conversation state, links
//! - Interface: builtin command handlers
//!

mod application;
mod domain;
mod infrastructure;
mod interface;
mod strings;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use clap::Parser;
use matrix_sdk::{
    Client, LoopCtrl,
    config::SyncSettings,
    room::Room,
    ruma::events::room::{
        member::{MembershipState, StrippedRoomMemberEvent},
        message::OriginalSyncRoomMessageEvent,
    },
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::application::conversation::{ConversationStore, KnockKnock};
use crate::application::executor::{Executor, ExecutorSettings};
use crate::application::leaderboard::Leaderboard;
use crate::application::links::{Blacklist, LinkPipeline, LinkSettings};
use crate::application::router::{Router, RouterConfig};
use crate::domain::catalog::Catalog;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::traits::ChatProvider;
use crate::infrastructure::llm::OpenAiClient;
use crate::infrastructure::matrix::{self as matrix, MatrixService};
use crate::infrastructure::storage::MessageStore;
use crate::strings::{logs, messages};

#[derive(Parser, Debug)]
#[command(name = "ash", version, about = "Matrix room bot: commands, jokes and link delivery")]
struct Args {
    /// Path to the YAML configuration
    #[arg(long, env = "ASH_CONFIG", default_value = "data/config.yaml")]
    config: PathBuf,

    /// Store messages but never run commands or deliver hooks
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool, log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    // Clear previous session log
    let log_path = log_dir.join("session.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "session.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "{default_level},matrix_sdk=warn,matrix_sdk_base=warn,matrix_sdk_crypto=error,ruma=warn,hyper=warn"
        ))
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();
    guard
}

/// Config override first, then the catalog's own label, then the default.
fn resolve_label(config: &AppConfig, catalog: &Catalog) -> String {
    config
        .bot
        .reply_label
        .as_deref()
        .filter(|l| !l.is_empty())
        .or(catalog.label())
        .unwrap_or(messages::DEFAULT_LABEL)
        .to_string()
}

fn load_catalog(path: &Path) -> Result<Catalog, ConfigError> {
    match Catalog::load(path) {
        Ok(catalog) => {
            tracing::info!("{}", logs::catalog_loaded(&path.display().to_string(), catalog.len()));
            Ok(catalog)
        }
        Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
            tracing::warn!("Bot config {} not found (continuing without)", path.display());
            Ok(Catalog::default())
        }
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Configuration
    let mut config = AppConfig::load(&args.config)?;
    config.system.dry_run |= args.dry_run;
    config.system.debug |= args.debug;

    // 2. Logging
    let db_path = PathBuf::from(&config.storage.db_path);
    let data_dir = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let _guard = init_tracing(config.system.debug, &data_dir);

    tracing::info!("{}", logs::STARTING);
    tracing::info!("{}", logs::config_loaded(&config.services.matrix.username));

    // 3. Catalog; a missing file leaves only `help`, a malformed one is fatal
    let catalog = load_catalog(Path::new(&config.bot.catalog_path))?;
    let label = resolve_label(&config, &catalog);
    let tz = config.system.tz();

    // 4. Storage and Matrix login
    let store = MessageStore::open(&db_path)?;
    let matrix_cfg = &config.services.matrix;
    let client = matrix::build_client(&matrix_cfg.homeserver, &data_dir.join("matrix-store")).await?;
    matrix::login(
        &client,
        &store,
        &matrix_cfg.username,
        &matrix_cfg.password,
        &matrix_cfg.device_name,
    )
    .await?;
    if let Some(name) = &matrix_cfg.display_name
        && let Err(e) = client.account().set_display_name(Some(name.as_str())).await
    {
        tracing::warn!("Failed to set display name: {}", e);
    }

    let room_names: Vec<String> = config.rooms.iter().map(|r| r.comment.clone()).collect();
    tracing::info!("{}", logs::watching_rooms(&room_names));

    // 5. Application components
    let chat: Arc<dyn ChatProvider> = Arc::new(MatrixService::new(client.clone()));
    let llm = Arc::new(OpenAiClient::new(&config.ai)?);
    let knock = KnockKnock::new(Arc::new(ConversationStore::new()), Arc::clone(&chat));

    let mut leaderboard = Leaderboard::new(store.clone(), &label);
    if let Some(user_id) = client.user_id() {
        leaderboard = leaderboard.with_bot_user(user_id.as_str());
    }

    let executor = Executor::new(
        Arc::clone(&chat),
        llm,
        leaderboard,
        knock.clone(),
        tz,
        ExecutorSettings {
            tmp_dir: PathBuf::from(&config.system.tmp_dir),
            linkstash_url: config.bot.linkstash_url.clone(),
            exec_timeout: Duration::from_secs(config.system.exec_timeout),
            ..Default::default()
        },
    );

    let blacklist = Blacklist::load(Path::new(&config.system.blacklist_path))?;
    tracing::info!("Loaded {} blacklist patterns", blacklist.len());
    let links = LinkPipeline::new(
        store.clone(),
        blacklist,
        config.rooms.clone(),
        LinkSettings {
            links_path: PathBuf::from(&config.system.links_path),
            opt_out_tag: config.system.opt_out_tag.clone(),
            dry_run: config.system.dry_run,
            ..Default::default()
        },
    );

    let (ready_tx, ready_rx) = watch::channel(false);
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let router = Router::new(
        RouterConfig {
            rooms: config.rooms.clone(),
            label,
            dry_run: config.system.dry_run,
            started_at_ms: chrono::Utc::now().timestamp_millis(),
        },
        Arc::new(catalog),
        store,
        chat,
        Arc::new(executor),
        knock,
        Arc::new(links),
        ready_rx,
        cancel_rx.clone(),
    );

    // 6. Event handlers
    client.add_event_handler(
        move |ev: OriginalSyncRoomMessageEvent, room: Room, raw: matrix_sdk::event_handler::RawEvent| {
            let router = router.clone();
            async move {
                let msg = matrix::incoming_from_event(
                    room.room_id().as_str(),
                    &ev,
                    Some(raw.get().to_string()),
                );
                router.handle(msg).await;
            }
        },
    );

    client.add_event_handler(
        async move |ev: StrippedRoomMemberEvent, room: Room, client: Client| {
            if ev.content.membership != MembershipState::Invite {
                return;
            }
            let Some(own_id) = client.user_id() else {
                return;
            };
            if ev.state_key != own_id.as_str() {
                return;
            }
            tracing::info!("{}", logs::invite_received(room.room_id().as_str()));
            if let Err(e) = room.join().await {
                tracing::error!("{}", logs::join_invite_fail(&e.to_string()));
            }
        },
    );

    // 7. Sync; the first completed response opens the ready gate
    let ready_tx = Arc::new(ready_tx);
    let sync_client = client.clone();
    let sync_cancel = cancel_rx;
    let sync_handle = tokio::spawn(async move {
        let settings = SyncSettings::default().timeout(Duration::from_secs(30));
        sync_client
            .sync_with_callback(settings, move |_response| {
                let ready_tx = Arc::clone(&ready_tx);
                let cancel = sync_cancel.clone();
                async move {
                    if *cancel.borrow() {
                        return LoopCtrl::Break;
                    }
                    if !ready_tx.send_replace(true) {
                        tracing::info!("{}", logs::SYNC_READY);
                    }
                    LoopCtrl::Continue
                }
            })
            .await
    });

    // 8. Shutdown
    let mut sync_handle = sync_handle;
    let interrupted = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!("{}", logs::shutdown_fail(&e.to_string()));
            }
            true
        }
        res = &mut sync_handle => {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("{}", logs::sync_loop_fail(&e.to_string())),
                Err(e) => tracing::error!("{}", logs::sync_loop_fail(&e.to_string())),
            }
            false
        }
    };

    tracing::info!("{}", logs::SHUTDOWN);
    cancel_tx.send_replace(true);
    if interrupted {
        sync_handle.abort();
    }

    Ok(())
}
