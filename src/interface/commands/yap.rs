//! # Yap
//!
//! Handles `yap [N]` (today's top senders by word count) and `yap guess [N]`
//! (guess your own rank).

use crate::application::leaderboard::{GuessResult, Leaderboard, clamp_limit, start_of_day};
use crate::application::utils::escape_html;
use crate::domain::error::CommandError;
use crate::domain::traits::ChatProvider;
use crate::domain::types::{DispatchContext, Outcome};
use crate::strings::messages;
use chrono::Utc;
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YapArgs {
    Top(usize),
    Guess(usize),
}

impl YapArgs {
    pub fn parse(args: &str) -> Self {
        let trimmed = args.trim();
        let lower = trimmed.to_lowercase();
        match lower.strip_prefix("guess") {
            Some(rest) => Self::Guess(
                rest.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .unwrap_or(1),
            ),
            None => Self::Top(clamp_limit(trimmed.parse::<usize>().ok())),
        }
    }
}

pub async fn handle_yap(
    chat: &dyn ChatProvider,
    board: &Leaderboard,
    tz: Tz,
    ctx: &DispatchContext,
    mention: bool,
) -> Result<Outcome, CommandError> {
    let since = start_of_day(&tz, Utc::now());

    match YapArgs::parse(&ctx.args) {
        YapArgs::Guess(guess) => {
            let text = match board.guess_rank(&ctx.room_id, &ctx.sender, guess, since)? {
                GuessResult::NoMessages => {
                    return Ok(Outcome::Replied(messages::NO_OWN_MESSAGES_TODAY.to_string()));
                }
                GuessResult::Exact { rank, words } => messages::guess_exact(&ctx.label, rank, words),
                GuessResult::Off {
                    guess,
                    actual,
                    words,
                    distance,
                    direction,
                } => messages::guess_off(&ctx.label, guess, actual, words, distance, direction.as_str()),
            };
            chat.send_reply(&ctx.room_id, &ctx.event_id, &text).await?;
            Ok(Outcome::SentDirectly)
        }
        YapArgs::Top(limit) => {
            let members = match chat.room_members(&ctx.room_id).await {
                Ok(members) => members,
                Err(e) => {
                    tracing::warn!("Failed to load members of {}: {:#}", ctx.room_id, e);
                    Default::default()
                }
            };

            let entries = board.top_senders(&ctx.room_id, since, limit, &members)?;
            if entries.is_empty() {
                return Ok(Outcome::Replied(messages::NO_MESSAGES_TODAY.to_string()));
            }

            let mut plain = vec![messages::yap_header(&ctx.label)];
            let mut html = vec![escape_html(&messages::yap_header(&ctx.label))];
            for (i, entry) in entries.iter().enumerate() {
                plain.push(messages::yap_line(i + 1, &entry.display, entry.words));
                let display = escape_html(&entry.display);
                html.push(if mention {
                    messages::yap_line_linked(i + 1, &entry.sender, &display, entry.words)
                } else {
                    messages::yap_line(i + 1, &display, entry.words)
                });
            }

            chat.send_html_reply(&ctx.room_id, &ctx.event_id, &plain.join("\n"), &html.join("<br>"))
                .await?;
            Ok(Outcome::SentDirectly)
        }
    }
}
