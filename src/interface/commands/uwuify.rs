//! # Uwuify
//!
//! Text transformation builtin. Works on the replied-to message, else on the
//! command arguments.

use crate::domain::error::CommandError;
use crate::domain::traits::ChatProvider;
use crate::domain::types::{DispatchContext, Outcome};
use crate::strings::messages;
use rand::seq::SliceRandom;

const REPLACEMENTS: &[(&str, &str)] = &[
    ("small", "smol"),
    ("cute", "kawaii"),
    ("love", "wuv"),
    ("Love", "Wuv"),
    ("LOVE", "WUV"),
    ("this", "dis"),
    ("This", "Dis"),
    ("the ", "da "),
    ("The ", "Da "),
    ("have", "haz"),
    ("ove", "uv"),
    ("th", "d"),
    ("Th", "D"),
];

pub const FACES: &[&str] = &[" uwu", " owo", " >w<", " ^w^", " (◕ᴗ◕✿)", " ✧w✧", " ~nyaa"];

pub fn uwuify(text: &str) -> String {
    let face = FACES.choose(&mut rand::thread_rng()).copied().unwrap_or(FACES[0]);
    uwuify_with_face(text, face)
}

pub fn uwuify_with_face(text: &str, face: &str) -> String {
    let replaced = REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to));

    let lisped: String = replaced
        .chars()
        .map(|c| match c {
            'r' | 'l' => 'w',
            'R' | 'L' => 'W',
            other => other,
        })
        .collect();

    let words: Vec<String> = lisped
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| match word.chars().next() {
            Some(first) if i % 4 == 0 && word.chars().count() > 1 && first.is_ascii_alphabetic() => {
                format!("{first}-{word}")
            }
            _ => word.to_string(),
        })
        .collect();

    format!("{}{face}", words.join(" "))
}

pub async fn handle_uwuify(
    chat: &dyn ChatProvider,
    ctx: &DispatchContext,
) -> Result<Outcome, CommandError> {
    let mut target = String::new();
    if let Some(reply_to) = &ctx.reply_to {
        match chat.fetch_message(&ctx.room_id, reply_to).await {
            Ok(original) => target = original.body,
            Err(e) => tracing::warn!("Failed to fetch replied-to message {}: {:#}", reply_to, e),
        }
    }
    if target.trim().is_empty() {
        target = ctx.args.clone();
    }
    if target.trim().is_empty() {
        return Ok(Outcome::Replied(messages::NO_TEXT_TO_TRANSFORM.to_string()));
    }
    Ok(Outcome::Replied(uwuify(target.trim())))
}
