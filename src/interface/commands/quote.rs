//! # Quote
//!
//! Posts a random message from the room history as a blockquote.

use crate::application::leaderboard::Leaderboard;
use crate::application::utils::{display_name, escape_html, parse_duration_arg};
use crate::domain::error::CommandError;
use crate::domain::traits::ChatProvider;
use crate::domain::types::{DispatchContext, Outcome};
use crate::strings::messages;
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

pub const DEFAULT_QUOTE_WINDOW: Duration = Duration::from_secs(24 * 3600);
/// Bodies of this many characters or fewer are never quoted.
const MIN_QUOTE_LEN: usize = 5;

pub fn format_date(ts_ms: i64, tz: Tz) -> String {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .map(|dt| dt.with_timezone(&tz).format("%d %b %Y").to_string())
        .unwrap_or_default()
}

/// Start of the lookback window; a window that does not fit before `now_ms` falls back to the default.
fn window_start(now_ms: i64, window: Duration) -> i64 {
    i64::try_from(window.as_millis())
        .ok()
        .and_then(|w| now_ms.checked_sub(w))
        .unwrap_or_else(|| now_ms.saturating_sub(DEFAULT_QUOTE_WINDOW.as_millis() as i64))
}

pub async fn handle_quote(
    chat: &dyn ChatProvider,
    board: &Leaderboard,
    tz: Tz,
    ctx: &DispatchContext,
) -> Result<Outcome, CommandError> {
    let window = parse_duration_arg(&ctx.args).unwrap_or(DEFAULT_QUOTE_WINDOW);
    let since = window_start(Utc::now().timestamp_millis(), window);

    let Some(quote) = board
        .store()
        .random_message(&board.filter(&ctx.room_id, since), MIN_QUOTE_LEN)?
    else {
        return Ok(Outcome::Replied(messages::NO_QUOTE.to_string()));
    };

    let members = chat.room_members(&ctx.room_id).await.unwrap_or_default();
    let name = display_name(&quote.sender, &members);
    let date = format_date(quote.ts_ms, tz);

    let plain = messages::quote_plain(&ctx.label, &quote.body, &name, &date);
    let html = messages::quote_html(
        &escape_html(&ctx.label),
        &escape_html(&quote.body),
        &escape_html(&name),
        &date,
    );
    chat.send_html_reply(&ctx.room_id, &ctx.event_id, &plain, &html)
        .await?;
    Ok(Outcome::SentDirectly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MessageStore;
    use crate::test_support::{RecordingChat, text_message};

    const ROOM: &str = "!room:example.com";

    fn ctx(args: &str) -> DispatchContext {
        DispatchContext::from_message(
            text_message("$cmd", ROOM, "@alice:x", "/bot quote"),
            "quote".into(),
            args.into(),
            "> ".into(),
        )
    }

    #[test]
    fn test_format_date() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 23, 30, 0).unwrap().timestamp_millis();
        assert_eq!(format_date(ts, chrono_tz::UTC), "02 Jan 2024");
        assert_eq!(format_date(ts, chrono_tz::Asia::Kolkata), "03 Jan 2024");
    }

    #[tokio::test]
    async fn test_quote_posts_blockquote() {
        let store = MessageStore::in_memory().unwrap();
        store
            .store_message(&text_message("$1", ROOM, "@bob:x", "a & b are friends"))
            .unwrap();
        store
            .store_message(&text_message("$2", ROOM, "@bob:x", "tiny"))
            .unwrap();
        store
            .store_message(&text_message("$3", ROOM, "@gork:x", "> a long bot reply"))
            .unwrap();
        let board = Leaderboard::new(store, "> ");
        let chat = RecordingChat::new();
        chat.add_member("@bob:x", "Bob");

        let outcome = handle_quote(&chat, &board, chrono_tz::UTC, &ctx("")).await.unwrap();
        assert_eq!(outcome, Outcome::SentDirectly);

        let sent = chat.sent();
        let today = format_date(Utc::now().timestamp_millis(), chrono_tz::UTC);
        assert_eq!(sent[0].body, format!("> > a & b are friends\n> — Bob, {today}"));
        assert_eq!(
            sent[0].html.as_deref().unwrap(),
            format!("&gt; <blockquote>a &amp; b are friends<br>— <i>Bob, {today}</i></blockquote>")
        );
    }

    #[test]
    fn test_window_start() {
        let day_ms = DEFAULT_QUOTE_WINDOW.as_millis() as i64;
        assert_eq!(window_start(10 * day_ms, Duration::from_secs(3600)), 10 * day_ms - 3_600_000);
        assert_eq!(window_start(10 * day_ms, Duration::from_secs(u64::MAX)), 9 * day_ms);
        assert_eq!(window_start(i64::MIN + 1, Duration::from_secs(1)), i64::MIN);
    }

    #[tokio::test]
    async fn test_huge_window_falls_back_to_default() {
        let store = MessageStore::in_memory().unwrap();
        store
            .store_message(&text_message("$1", ROOM, "@bob:x", "still quotable today"))
            .unwrap();
        let board = Leaderboard::new(store, "> ");
        let chat = RecordingChat::new();

        let outcome = handle_quote(&chat, &board, chrono_tz::UTC, &ctx("9223372036854776s"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::SentDirectly);
        assert!(chat.sent()[0].body.contains("still quotable today"));
    }

    #[tokio::test]
    async fn test_no_quote() {
        let board = Leaderboard::new(MessageStore::in_memory().unwrap(), "> ");
        let chat = RecordingChat::new();
        let outcome = handle_quote(&chat, &board, chrono_tz::UTC, &ctx("7d")).await.unwrap();
        assert_eq!(outcome, Outcome::Replied(messages::NO_QUOTE.to_string()));
        assert!(chat.sent().is_empty());
    }
}
