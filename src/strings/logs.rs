//! # Log Strings
//!
//! Lifecycle log lines emitted by `main` and the Matrix adapter.

pub const STARTING: &str = "Starting ash...";
pub const CONFIG_PARSE_ERROR: &str = "Failed to parse YAML";
pub const SESSION_RESTORED: &str = "Restored stored Matrix session";
pub const SYNC_READY: &str = "Initial sync complete, command dispatch enabled";
pub const SHUTDOWN: &str = "Shutting down...";
pub const DRY_RUN_COMMAND: &str = "dry run mode: skipping bot command";
pub const DRY_RUN_HOOKS: &str = "dry run mode: skipping hooks";

pub fn config_loaded(user: &str) -> String {
    format!("Loaded configuration for user: {user}")
}

pub fn catalog_loaded(path: &str, count: usize) -> String {
    format!("Loaded {count} bot commands from {path}")
}

pub fn logged_in(user: &str, device: &str) -> String {
    format!("Logged in as {user} (device {device})")
}

pub fn watching_rooms(names: &[String]) -> String {
    format!("ready: watching rooms: [{}]", names.join(", "))
}

pub fn sync_loop_fail(err: &str) -> String {
    format!("Sync loop failed: {err}")
}

pub fn invite_received(room_id: &str) -> String {
    format!("💌 Received invite for room {room_id:?}")
}

pub fn join_invite_fail(err: &str) -> String {
    format!("Failed to join room after invite: {err}")
}

pub fn shutdown_fail(err: &str) -> String {
    format!("Unable to listen for shutdown signal: {err}")
}
