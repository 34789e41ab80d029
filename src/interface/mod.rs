//! # Interface Layer
//!
//! Builtin command handlers invoked by the executor.

pub mod commands;
