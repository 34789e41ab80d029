//! # Strings Module
//!
//! Centralizes user-facing replies, log lines and joke data.

pub mod jokes;
pub mod logs;
pub mod messages;
