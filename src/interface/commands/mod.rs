//! # Command Handlers
//!
//! Builtin handlers (`uwuify`, `yap`, `quote`, `knockknock`).
//! Each returns an [`Outcome`](crate::domain::types::Outcome); those that post their own
//! output return `SentDirectly`.

pub mod knockknock;
pub mod quote;
pub mod uwuify;
pub mod yap;
