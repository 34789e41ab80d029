//! # Text Utilities
//!
//! Pure helpers used by the router and the executor: command tokenizing,
//! token-budget truncation, JSON path extraction and list formatting.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const COMMAND_PREFIX: &str = "/bot";
pub const MENTION_PREFIX: &str = "@gork";

/// Approximate characters per token used for budget estimates.
const CHARS_PER_TOKEN: usize = 4;
const MAX_LISTED_POSTS: usize = 5;

pub fn is_command(body: &str) -> bool {
    body.starts_with(COMMAND_PREFIX) || body.starts_with(MENTION_PREFIX)
}

/// Rewrites `@gork rest` into `/bot gork rest`; other bodies are returned unchanged.
pub fn normalize_command(body: &str) -> String {
    match body.strip_prefix(MENTION_PREFIX) {
        Some(rest) => format!("{COMMAND_PREFIX} gork {}", rest.trim()),
        None => body.to_string(),
    }
}

/// Splits a normalized command body into the command name and its argument text.
/// The name defaults to `default` when only the prefix is present.
pub fn split_command(body: &str, default: &str) -> (String, String) {
    let mut tokens = body.split_whitespace();
    let _prefix = tokens.next();
    let name = tokens.next().unwrap_or(default).to_string();
    (name, args_after_command(body))
}

/// Text following the first two whitespace-delimited tokens, with inner formatting kept.
pub fn args_after_command(body: &str) -> String {
    let mut rest = body.trim_start();
    for _ in 0..2 {
        match rest.find(char::is_whitespace) {
            Some(idx) => rest = rest[idx..].trim_start(),
            None => return String::new(),
        }
    }
    rest.trim().to_string()
}

/// Removes the bot invocation prefixes from a message body, along with the
/// `:` or `,` that usually follows a mention.
pub fn strip_command_prefix(body: &str) -> String {
    let mut s = body.trim();
    for prefix in ["/bot gork ", "/bot gork", "/bot"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
        }
    }
    if s.len() >= MENTION_PREFIX.len()
        && s.is_char_boundary(MENTION_PREFIX.len())
        && s[..MENTION_PREFIX.len()].eq_ignore_ascii_case(MENTION_PREFIX)
    {
        s = &s[MENTION_PREFIX.len()..];
    }
    s.trim()
        .trim_start_matches([':', ',', ' '])
        .trim()
        .to_string()
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Cuts text to roughly fit a token budget.
/// Prefers ending on a line break, then a space, found past the midpoint of the budget.
pub fn truncate_text(text: &str, token_limit: usize) -> String {
    if text.len() / CHARS_PER_TOKEN <= token_limit {
        return text.to_string();
    }
    let max_chars = token_limit * CHARS_PER_TOKEN;
    let cut = &text[..floor_char_boundary(text, max_chars)];
    let half = max_chars / 2;

    if let Some(idx) = cut.rfind('\n').filter(|i| *i > half) {
        return cut[..idx].to_string();
    }
    if let Some(idx) = cut.rfind(' ').filter(|i| *i > half) {
        return cut[..idx].to_string();
    }
    cut.to_string()
}

/// Shortens a string for log output.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    format!("{}...", &s[..floor_char_boundary(s, max_len)])
}

/// Walks a dot-separated path. Numeric segments index arrays.
/// Any traversal failure yields `None`.
pub fn extract_json_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut cur = root;
    for segment in path.split('.') {
        cur = match cur {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Renders up to five `{title, url}` posts as a bulleted list with a link to the full list.
pub fn format_posts(posts: &[Value], linkstash_url: &str) -> String {
    let mut out = String::new();
    for post in posts.iter().take(MAX_LISTED_POSTS) {
        let title = post.get("title").and_then(Value::as_str).unwrap_or("");
        let url = post.get("url").and_then(Value::as_str).unwrap_or("");
        if !title.is_empty() && !url.is_empty() {
            out.push_str(&format!("- {title} ({url})\n"));
        }
    }
    out.push_str(&format!("\nSee full list: {linkstash_url}"));
    out
}

/// `@alice:example.com` -> `alice`; anything else is returned as is.
pub fn local_part(user_id: &str) -> &str {
    match user_id.strip_prefix('@') {
        Some(rest) => match rest.find(':') {
            Some(idx) if idx > 0 => &rest[..idx],
            _ => user_id,
        },
        None => user_id,
    }
}

pub fn display_name(user_id: &str, members: &HashMap<String, String>) -> String {
    members
        .get(user_id)
        .filter(|n| !n.is_empty())
        .cloned()
        .unwrap_or_else(|| local_part(user_id).to_string())
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Parses `30m`, `12h`, `7d`, `45s` or plain seconds.
pub fn parse_duration_arg(arg: &str) -> Option<Duration> {
    let arg = arg.trim().to_lowercase();
    if arg.is_empty() {
        return None;
    }
    let (digits, unit) = match arg.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => arg.split_at(idx),
        None => (arg.as_str(), "s"),
    };
    let value: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return None,
    };
    value.checked_mul(multiplier).map(Duration::from_secs)
}
