//! # Command Executor
//!
//! Runs one resolved [`CommandSpec`] against its dispatch context.
//! Every kind has its own bounded timeout; nothing is retried.

use crate::application::conversation::KnockKnock;
use crate::application::leaderboard::Leaderboard;
use crate::application::utils::{
    extract_json_path, format_posts, strip_command_prefix, truncate, truncate_text,
};
use crate::domain::catalog::{Builtin, CommandSpec, INPUT_PLACEHOLDER, IoKind, OUTPUT_PLACEHOLDER};
use crate::domain::error::CommandError;
use crate::domain::traits::{ChatProvider, LlmProvider};
use crate::domain::types::{DispatchContext, MediaRef, Outcome};
use crate::infrastructure::{media, process};
use crate::interface::commands::{knockknock, quote, uwuify, yap};
use crate::strings::messages;
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

const ARTICLES_KEYWORD: &str = "articles";
const ARTICLES_TOKEN_LIMIT: usize = 6000;
const REPLY_TOKEN_LIMIT: usize = 2000;
const ARTICLE_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub tmp_dir: PathBuf,
    pub linkstash_url: String,
    pub http_timeout: Duration,
    pub image_timeout: Duration,
    pub articles_timeout: Duration,
    pub exec_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            tmp_dir: PathBuf::from("data/tmp"),
            linkstash_url: "https://linkstash.hsp-ec.xyz".to_string(),
            http_timeout: Duration::from_secs(8),
            image_timeout: Duration::from_secs(30),
            articles_timeout: Duration::from_secs(10),
            exec_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArticleSummary {
    #[serde(default)]
    summary: Vec<ArticleRef>,
}

#[derive(Debug, Deserialize)]
struct ArticleRef {
    id: String,
}

pub struct Executor {
    chat: Arc<dyn ChatProvider>,
    llm: Arc<dyn LlmProvider>,
    http: Client,
    leaderboard: Leaderboard,
    knock: KnockKnock,
    tz: Tz,
    settings: ExecutorSettings,
}

impl Executor {
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        llm: Arc<dyn LlmProvider>,
        leaderboard: Leaderboard,
        knock: KnockKnock,
        tz: Tz,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            chat,
            llm,
            http: Client::new(),
            leaderboard,
            knock,
            tz,
            settings,
        }
    }

    pub async fn execute(&self, spec: &CommandSpec, ctx: &DispatchContext) -> Result<Outcome, CommandError> {
        tracing::debug!("Executing {} command '{}' in {}", spec.kind(), ctx.command, ctx.room_id);
        match spec {
            CommandSpec::Static { response } => Ok(Outcome::Replied(response.clone())),
            CommandSpec::Http {
                method,
                url,
                headers,
                json_path,
                output,
            } => self.run_http(method, url, headers, json_path, *output, ctx).await,
            CommandSpec::Exec {
                program,
                args,
                input,
                output,
            } => self.run_exec(program, args, *input, *output, ctx).await,
            CommandSpec::Ai {
                prompt,
                model,
                max_tokens,
            } => self.run_ai(prompt, model, *max_tokens, ctx).await,
            CommandSpec::Builtin { builtin, mention } => match builtin {
                Builtin::Uwuify => uwuify::handle_uwuify(self.chat.as_ref(), ctx).await,
                Builtin::Yap => {
                    yap::handle_yap(self.chat.as_ref(), &self.leaderboard, self.tz, ctx, *mention).await
                }
                Builtin::Quote => {
                    quote::handle_quote(self.chat.as_ref(), &self.leaderboard, self.tz, ctx).await
                }
                Builtin::KnockKnock => knockknock::handle_knockknock(&self.knock, ctx).await,
            },
        }
    }

    // --- http ---

    async fn run_http(
        &self,
        method: &str,
        url: &str,
        headers: &std::collections::BTreeMap<String, String>,
        json_path: &str,
        output: IoKind,
        ctx: &DispatchContext,
    ) -> Result<Outcome, CommandError> {
        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| CommandError::Upstream(format!("invalid HTTP method '{method}'")))?;

        let mut request = self
            .http
            .request(method, url)
            .timeout(self.settings.http_timeout);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CommandError::Upstream(format!("unexpected status: {}", status.as_u16())));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_lowercase().contains("application/json"));
        let body = response.text().await?;

        if json_path.is_empty() && !is_json {
            return Ok(Outcome::Replied(body.trim().to_string()));
        }

        let Ok(json) = serde_json::from_str::<Value>(&body) else {
            return Ok(Outcome::Replied(body.trim().to_string()));
        };

        match extract_json_path(&json, json_path) {
            Some(Value::String(s)) if output == IoKind::Image => {
                self.spawn_image_post(s.clone(), ctx);
                Ok(Outcome::SentDirectly)
            }
            Some(Value::String(s)) => Ok(Outcome::Replied(s.trim().to_string())),
            Some(Value::Array(items)) => Ok(Outcome::Replied(format_posts(
                items,
                &self.settings.linkstash_url,
            ))),
            Some(Value::Null) | None => Err(CommandError::NotFound(format!(
                "no value found at path: {json_path}"
            ))),
            Some(other) => Ok(Outcome::Replied(other.to_string().trim().to_string())),
        }
    }

    /// Downloads an image URL and posts it as a reply, detached from the dispatch.
    fn spawn_image_post(&self, image_url: String, ctx: &DispatchContext) {
        let chat = Arc::clone(&self.chat);
        let http = self.http.clone();
        let timeout = self.settings.image_timeout;
        let room_id = ctx.room_id.clone();
        let anchor = ctx.event_id.clone();

        tokio::spawn(async move {
            if let Err(e) = post_remote_image(chat.as_ref(), &http, &image_url, timeout, &room_id, &anchor).await {
                tracing::warn!("Image post from {} failed: {:#}", truncate(&image_url, 120), e);
            }
        });
    }

    // --- exec ---

    async fn run_exec(
        &self,
        program: &str,
        args: &[String],
        input: IoKind,
        output: IoKind,
        ctx: &DispatchContext,
    ) -> Result<Outcome, CommandError> {
        // Guards live until the end of this function; dropping them removes the files.
        let mut input_file: Option<NamedTempFile> = None;
        let mut input_text = String::new();

        match input {
            IoKind::Image => {
                let Some(media_ref) = self.find_image(ctx).await else {
                    return Ok(Outcome::Replied(messages::NO_IMAGE.to_string()));
                };
                let data = self.chat.download_media(&media_ref).await?;
                input_file = Some(self.temp_file("exec_input_", media::image_extension(&data)).await?);
                if let Some(file) = &input_file {
                    tokio::fs::write(file.path(), &data).await?;
                }
            }
            IoKind::Text => input_text = ctx.args.clone(),
            IoKind::None => {}
        }

        let needs_output = output == IoKind::Image || args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER));
        let output_file = if needs_output {
            Some(self.temp_file("exec_output_", "").await?)
        } else {
            None
        };

        let input_value = match &input_file {
            Some(file) => file.path().to_string_lossy().to_string(),
            None => input_text,
        };
        let output_value = output_file
            .as_ref()
            .map(|f| f.path().to_string_lossy().to_string())
            .unwrap_or_default();

        let argv: Vec<String> = args
            .iter()
            .map(|a| {
                a.replace(INPUT_PLACEHOLDER, &input_value)
                    .replace(OUTPUT_PLACEHOLDER, &output_value)
            })
            .collect();

        let result = process::run(program, &argv, self.settings.exec_timeout).await?;
        if !result.stderr.trim().is_empty() {
            tracing::warn!("{} wrote to stderr: {}", program, truncate(result.stderr.trim(), 500));
        }

        match (output, &output_file) {
            (IoKind::Image, Some(file)) => {
                let data = tokio::fs::read(file.path()).await?;
                if data.is_empty() {
                    return Err(CommandError::Upstream(format!("{program} produced no output image")));
                }
                let content_type = media::image_content_type(&data);
                let filename = format!(
                    "processed{}",
                    media::ImageKind::sniff(&data)
                        .map(|k| k.extension())
                        .unwrap_or(".jpg")
                );
                self.chat
                    .send_image_reply(&ctx.room_id, &ctx.event_id, data, &content_type, &filename)
                    .await?;
                Ok(Outcome::SentDirectly)
            }
            _ => Ok(Outcome::Replied(result.stdout.trim().to_string())),
        }
    }

    async fn temp_file(&self, prefix: &str, suffix: &str) -> Result<NamedTempFile, CommandError> {
        tokio::fs::create_dir_all(&self.settings.tmp_dir).await?;
        Ok(tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.settings.tmp_dir)?)
    }

    /// Image carried by the command message itself, else by the message it replies to.
    async fn find_image(&self, ctx: &DispatchContext) -> Option<MediaRef> {
        if ctx.message.is_image() {
            if let Some(media_ref) = &ctx.message.media {
                return Some(media_ref.clone());
            }
        }
        let reply_to = ctx.reply_to.as_deref()?;
        match self.chat.fetch_message(&ctx.room_id, reply_to).await {
            Ok(original) if original.is_image() => original.media,
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to fetch replied-to message {}: {:#}", reply_to, e);
                None
            }
        }
    }

    // --- ai ---

    async fn run_ai(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        ctx: &DispatchContext,
    ) -> Result<Outcome, CommandError> {
        let mut reply_target: Option<String> = None;

        let context = if prompt.contains(ARTICLES_KEYWORD) {
            let digest = self.fetch_article_digest().await?;
            if digest.trim().is_empty() {
                return Ok(Outcome::Replied(messages::NO_ARTICLES.to_string()));
            }
            truncate_text(&digest, ARTICLES_TOKEN_LIMIT)
        } else {
            if ctx.body.trim().is_empty() {
                return Ok(Outcome::Replied(messages::NO_MESSAGE.to_string()));
            }

            let mut original_text = String::new();
            if let Some(reply_to) = &ctx.reply_to {
                match self.chat.fetch_message(&ctx.room_id, reply_to).await {
                    Ok(original) if !original.body.trim().is_empty() => {
                        original_text = original.body;
                        reply_target = Some(original.event_id);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Failed to fetch replied-to message {}: {:#}", reply_to, e),
                }
            }

            let request = strip_command_prefix(&ctx.args);
            let text = if original_text.is_empty() {
                request
            } else {
                messages::ai_reply_context(&original_text, &request)
            };
            truncate_text(&text, REPLY_TOKEN_LIMIT)
        };

        let full_prompt = format!("{prompt}\n\n{context}");
        let response = self
            .llm
            .complete(model, max_tokens, &full_prompt)
            .await
            .map_err(CommandError::upstream)?;

        match reply_target {
            Some(original_id) => {
                let body = format!("{}{}", ctx.label, response);
                self.chat.send_reply(&ctx.room_id, &original_id, &body).await?;
                Ok(Outcome::SentDirectly)
            }
            None => Ok(Outcome::Replied(response)),
        }
    }

    /// Concatenated article contents from the link stash. Failed articles are skipped.
    async fn fetch_article_digest(&self) -> Result<String, CommandError> {
        let base = self.settings.linkstash_url.trim_end_matches('/');
        let response = self
            .http
            .get(format!("{base}/api/summary"))
            .timeout(self.settings.articles_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CommandError::Upstream(format!(
                "unexpected status: {}",
                response.status().as_u16()
            )));
        }
        let summary: ArticleSummary = response.json().await?;

        let mut contents = Vec::new();
        for article in summary.summary {
            let result = self
                .http
                .get(format!("{base}/api/content/{}", article.id))
                .timeout(self.settings.articles_timeout)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(text) => contents.push(text),
                    Err(e) => tracing::warn!("Failed to read article {}: {}", article.id, e),
                },
                Ok(resp) => tracing::warn!("Bad content response {} for article {}", resp.status(), article.id),
                Err(e) => tracing::warn!("Failed to fetch article {}: {}", article.id, e),
            }
        }
        Ok(contents.join(ARTICLE_SEPARATOR))
    }
}

async fn post_remote_image(
    chat: &dyn ChatProvider,
    http: &Client,
    image_url: &str,
    timeout: Duration,
    room_id: &str,
    anchor: &str,
) -> anyhow::Result<()> {
    let response = http.get(image_url).timeout(timeout).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("image download status {}", response.status().as_u16());
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| ct.starts_with("image/"))
        .map(str::to_string);
    let data = response.bytes().await?.to_vec();
    let content_type = content_type.unwrap_or_else(|| media::image_content_type(&data));
    let filename = media::image_filename(image_url, &data);
    chat.send_image_reply(room_id, anchor, data, &content_type, &filename)
        .await?;
    Ok(())
}
