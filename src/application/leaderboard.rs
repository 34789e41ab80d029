//! # Leaderboard
//!
//! Ranks senders of a room by approximate word count over a time window.
//! Rankings are recomputed from stored history on every query.

use crate::application::utils::{COMMAND_PREFIX, MENTION_PREFIX, display_name};
use crate::domain::types::MSGTYPE_TEXT;
use crate::infrastructure::storage::{HistoryFilter, MessageStore};
use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 50;

/// Marker stamped on bot output by older deployments; always excluded.
const LEGACY_BOT_MARKER: &str = "[BOT]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YapEntry {
    pub sender: String,
    pub display: String,
    pub words: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Actual rank is further down than guessed.
    Lower,
    /// Actual rank is further up than guessed.
    Higher,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Lower => "lower",
            Direction::Higher => "higher",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessResult {
    Exact {
        rank: usize,
        words: u64,
    },
    Off {
        guess: usize,
        actual: usize,
        words: u64,
        distance: usize,
        direction: Direction,
    },
    NoMessages,
}

/// Clamps a requested limit into `1..=MAX_LIMIT`, defaulting to `DEFAULT_LIMIT`.
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_LIMIT)
        .min(MAX_LIMIT)
}

/// Midnight of `now`'s day in `tz`, as Unix milliseconds.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, now: DateTime<Utc>) -> i64 {
    let local = now.with_timezone(tz);
    local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis() - 86_400_000)
}

#[derive(Clone)]
pub struct Leaderboard {
    store: MessageStore,
    /// Body prefixes that mark bot output or command invocations.
    excluded_prefixes: Vec<String>,
    bot_user: Option<String>,
}

impl Leaderboard {
    pub fn new(store: MessageStore, label: &str) -> Self {
        let mut excluded_prefixes = vec![
            LEGACY_BOT_MARKER.to_string(),
            COMMAND_PREFIX.to_string(),
            MENTION_PREFIX.to_string(),
        ];
        if !label.trim().is_empty() && !excluded_prefixes.iter().any(|p| p == label) {
            excluded_prefixes.push(label.to_string());
        }
        Self {
            store,
            excluded_prefixes,
            bot_user: None,
        }
    }

    pub fn with_bot_user(mut self, user_id: impl Into<String>) -> Self {
        self.bot_user = Some(user_id.into());
        self
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn filter<'a>(&'a self, room_id: &'a str, since_ms: i64) -> HistoryFilter<'a> {
        HistoryFilter {
            room_id,
            since_ms,
            exclude_prefixes: &self.excluded_prefixes,
            exclude_sender: self.bot_user.as_deref(),
            msgtype: MSGTYPE_TEXT,
        }
    }

    /// Full ranking of (sender, words), most words first; ties broken by sender id.
    pub fn ranking(&self, room_id: &str, since_ms: i64) -> Result<Vec<(String, u64)>> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for msg in self.store.history(&self.filter(room_id, since_ms))? {
            *counts.entry(msg.sender).or_default() += msg.body.split_whitespace().count() as u64;
        }
        let mut ranked: Vec<(String, u64)> = counts.into_iter().filter(|(_, w)| *w > 0).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked)
    }

    pub fn top_senders(
        &self,
        room_id: &str,
        since_ms: i64,
        limit: usize,
        members: &HashMap<String, String>,
    ) -> Result<Vec<YapEntry>> {
        Ok(self
            .ranking(room_id, since_ms)?
            .into_iter()
            .take(limit.clamp(1, MAX_LIMIT))
            .map(|(sender, words)| YapEntry {
                display: display_name(&sender, members),
                sender,
                words,
            })
            .collect())
    }

    pub fn guess_rank(
        &self,
        room_id: &str,
        sender: &str,
        guess: usize,
        since_ms: i64,
    ) -> Result<GuessResult> {
        let ranking = self.ranking(room_id, since_ms)?;
        let Some((idx, (_, words))) = ranking.iter().enumerate().find(|(_, (s, _))| s == sender)
        else {
            return Ok(GuessResult::NoMessages);
        };
        let actual = idx + 1;
        let words = *words;

        Ok(if guess == actual {
            GuessResult::Exact {
                rank: actual,
                words,
            }
        } else {
            GuessResult::Off {
                guess,
                actual,
                words,
                distance: guess.abs_diff(actual),
                direction: if actual > guess {
                    Direction::Lower
                } else {
                    Direction::Higher
                },
            }
        })
    }
}
