//! # Application Layer
//!
//! Contains the core logic and orchestration of the bot:
//! message routing, command execution, conversational state, leaderboards and link delivery.

pub mod conversation;
pub mod executor;
pub mod leaderboard;
pub mod links;
pub mod router;
pub mod utils;
