//! # Messages
//!
//! Contains constant strings and format functions for user-facing messages.
//! Every message is sent with the reply label prepended by the caller.

pub const DEFAULT_LABEL: &str = "> ";
pub const NOT_ALLOWED: &str = "command not allowed in this room";
pub const NO_IMAGE: &str = "reply to an image to use this command";
pub const NO_TEXT_TO_TRANSFORM: &str = "uwu~ pwease give me some text to twansfowm!";
pub const NO_MESSAGE: &str = "No message to respond to.";
pub const NO_ARTICLES: &str = "No articles to summarize.";
pub const NO_MESSAGES_TODAY: &str = "no messages found today";
pub const NO_OWN_MESSAGES_TODAY: &str = "you have no messages today!";
pub const NO_QUOTE: &str = "no messages found to quote";

pub const KNOCK_KNOCK_OPENER: &str = "Knock knock! (reply to this message)";

pub fn available_commands(names: &[String]) -> String {
    format!("Available commands: {}", names.join(", "))
}

pub fn unknown_command(help: &str) -> String {
    format!("Unknown command. {help}")
}

pub fn command_failed(cmd: &str) -> String {
    format!("sorry, couldn't execute {cmd} right now")
}

pub fn knock_knock_name(name: &str) -> String {
    format!("{name} (reply to this message)")
}

pub fn ai_reply_context(original: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        format!("respond to: {}", original.trim())
    } else {
        format!("respond to: {}, {suffix}", original.trim())
    }
}

pub fn yap_header(label: &str) -> String {
    format!("{label}top yappers (today):")
}

pub fn yap_line(rank: usize, name: &str, words: u64) -> String {
    format!("{rank}. {name} — {words} words")
}

pub fn yap_line_linked(rank: usize, user_id: &str, name: &str, words: u64) -> String {
    format!("{rank}. <a href=\"https://matrix.to/#/{user_id}\">{name}</a> — {words} words")
}

pub fn guess_exact(label: &str, guess: usize, words: u64) -> String {
    format!("{label}you guessed #{guess} — that's exactly right! ({words} words)")
}

pub fn guess_off(
    label: &str,
    guess: usize,
    actual: usize,
    words: u64,
    distance: usize,
    direction: &str,
) -> String {
    format!(
        "{label}you guessed #{guess} but you're actually #{actual} ({words} words) — {distance} position(s) {direction} than you thought"
    )
}

pub fn quote_plain(label: &str, body: &str, name: &str, date: &str) -> String {
    format!("{label}> {body}\n> — {name}, {date}")
}

pub fn quote_html(label: &str, body: &str, name: &str, date: &str) -> String {
    format!("{label}<blockquote>{body}<br>— <i>{name}, {date}</i></blockquote>")
}
