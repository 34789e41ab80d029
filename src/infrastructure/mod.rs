//! # Infrastructure Layer
//!
//! Handles interactions with external systems and services.
//! Implements the traits defined in the Domain layer (e.g., ChatProvider, LlmProvider).

pub mod llm;
pub mod matrix;
pub mod media;
pub mod process;
pub mod storage;
