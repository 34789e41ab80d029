//! # Link Pipeline
//!
//! Handles plain messages: forwards posted links to per-room webhooks and
//! exports a JSON snapshot of every stored link in the monitored rooms.

use crate::domain::config::RoomEntry;
use crate::domain::types::IncomingMessage;
use crate::infrastructure::storage::{LinkRow, MessageStore};
use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::task::JoinHandle;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s>]+").expect("valid URL pattern"));

pub fn extract_links(text: &str) -> Vec<String> {
    URL_RE.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// `comment` entries in the file are documentation only and are not read.
#[derive(Debug, Deserialize)]
struct BlacklistEntry {
    pattern: String,
}

/// URL patterns that are never forwarded to webhooks.
#[derive(Debug, Default)]
pub struct Blacklist {
    patterns: Vec<Regex>,
}

impl Blacklist {
    /// Loads `[{pattern, comment}]` from a JSON file. A missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No blacklist at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read blacklist {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<BlacklistEntry> = serde_json::from_str(content).context("Failed to parse blacklist")?;
        let patterns = entries
            .iter()
            .map(|e| Regex::new(&e.pattern).with_context(|| format!("Invalid blacklist pattern '{}'", e.pattern)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_blacklisted(&self, url: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(url))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

#[derive(Debug, Serialize)]
struct HookPayload {
    link: HookLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    room: Option<HookRoom>,
}

#[derive(Debug, Serialize)]
struct HookLink {
    url: String,
    #[serde(rename = "submittedBy", skip_serializing_if = "Option::is_none")]
    submitted_by: Option<String>,
}

#[derive(Debug, Serialize)]
struct HookRoom {
    id: String,
    comment: String,
}

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    last_sync: String,
    rooms: BTreeMap<&'a str, Vec<LinkRow>>,
}

#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub links_path: PathBuf,
    pub opt_out_tag: Option<String>,
    pub dry_run: bool,
    pub hook_timeout: Duration,
    pub resolve_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            links_path: PathBuf::from("data/links.json"),
            opt_out_tag: None,
            dry_run: false,
            hook_timeout: Duration::from_secs(30),
            resolve_timeout: Duration::from_secs(10),
        }
    }
}

/// What a pass over one message did.
#[derive(Debug, Default)]
pub struct LinkReport {
    pub hooks: Vec<JoinHandle<()>>,
    pub skipped: Vec<String>,
    pub exported: bool,
}

pub struct LinkPipeline {
    http: Client,
    store: MessageStore,
    blacklist: Blacklist,
    rooms: Vec<RoomEntry>,
    settings: LinkSettings,
}

impl LinkPipeline {
    pub fn new(store: MessageStore, blacklist: Blacklist, rooms: Vec<RoomEntry>, settings: LinkSettings) -> Self {
        Self {
            http: Client::new(),
            store,
            blacklist,
            rooms,
            settings,
        }
    }

    pub async fn process(&self, msg: &IncomingMessage, room: Option<&RoomEntry>, urls: &[String]) -> LinkReport {
        let mut report = LinkReport::default();
        if urls.is_empty() {
            return report;
        }
        tracing::info!("Found {} link(s) from {}", urls.len(), msg.sender);

        let opted_out = self
            .settings
            .opt_out_tag
            .as_deref()
            .is_some_and(|tag| !tag.is_empty() && msg.body.contains(tag));

        if opted_out {
            tracing::info!("Skipped hooks due to opt-out tag");
        } else if self.settings.dry_run {
            tracing::info!("{}", crate::strings::logs::DRY_RUN_HOOKS);
        } else if let Some((room, hook)) = room.and_then(|r| r.hook.as_deref().map(|h| (r, h))) {
            for url in urls {
                if self.blacklist.is_blacklisted(url) {
                    tracing::info!("Skipped blacklisted url {}", url);
                    report.skipped.push(url.clone());
                    continue;
                }
                report.hooks.push(self.spawn_hook(hook, url, &msg.sender, room));
            }
        }

        match self.export_snapshot().await {
            Ok(()) => {
                tracing::info!("Exported links to {}", self.settings.links_path.display());
                report.exported = true;
            }
            Err(e) => tracing::error!("Failed to export link snapshot: {:#}", e),
        }
        report
    }

    fn spawn_hook(&self, hook: &str, url: &str, sender: &str, room: &RoomEntry) -> JoinHandle<()> {
        let http = self.http.clone();
        let hook = hook.to_string();
        let url = url.to_string();
        let key = room.key.clone().filter(|k| !k.is_empty());
        let submitted_by = room.send_user.then(|| sender.to_string());
        let room_info = (room.send_topic && (!room.id.is_empty() || !room.comment.is_empty())).then(|| HookRoom {
            id: room.id.clone(),
            comment: room.comment.clone(),
        });
        let settings = self.settings.clone();

        tokio::spawn(async move {
            let resolved = resolve_url(&http, &url, settings.resolve_timeout).await;
            let payload = HookPayload {
                link: HookLink {
                    url: resolved,
                    submitted_by,
                },
                room: room_info,
            };

            let mut request = http.post(&hook).timeout(settings.hook_timeout).json(&payload);
            if let Some(key) = key {
                request = request.bearer_auth(key);
            }
            match request.send().await {
                Ok(resp) if resp.status().as_u16() >= 300 => {
                    tracing::warn!("Hook response {} for {}", resp.status(), url);
                }
                Ok(_) => tracing::info!("Hook sent for {}", url),
                Err(e) => tracing::error!("Failed to send hook for {}: {}", url, e),
            }
        })
    }

    /// Writes `{last_sync, rooms: {comment: [links]}}` for all monitored rooms.
    pub async fn export_snapshot(&self) -> Result<()> {
        let ids: Vec<String> = self.rooms.iter().map(|r| r.id.clone()).collect();
        let comments: BTreeMap<&str, &str> = self
            .rooms
            .iter()
            .map(|r| (r.id.as_str(), r.comment.as_str()))
            .collect();

        let mut rooms: BTreeMap<&str, Vec<LinkRow>> = BTreeMap::new();
        for row in self.store.links_for_rooms(&ids)? {
            let comment = comments.get(row.room_id.as_str()).copied().unwrap_or_default();
            rooms.entry(comment).or_default().push(row);
        }

        let snapshot = Snapshot {
            last_sync: chrono::Utc::now().to_rfc3339(),
            rooms,
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let path = &self.settings.links_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Follows redirects with a HEAD request; the original URL on any failure.
async fn resolve_url(http: &Client, url: &str, timeout: Duration) -> String {
    match http.head(url).timeout(timeout).send().await {
        Ok(resp) => resp.url().to_string(),
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::text_message;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ROOM: &str = "!room:example.com";

    fn room(hook: Option<String>) -> RoomEntry {
        RoomEntry {
            id: ROOM.into(),
            comment: "general".into(),
            hook,
            key: Some("s3cret".into()),
            send_user: true,
            send_topic: true,
            allowed_commands: None,
        }
    }

    fn pipeline(store: MessageStore, room: &RoomEntry, blacklist: Blacklist, settings: LinkSettings) -> LinkPipeline {
        LinkPipeline::new(store, blacklist, vec![room.clone()], settings)
    }

    #[test]
    fn test_extract_links() {
        assert_eq!(
            extract_links("see https://a.com/x?y=1 and HTTP://B.org> plus ftp://no"),
            vec!["https://a.com/x?y=1".to_string(), "HTTP://B.org".to_string()]
        );
        assert!(extract_links("nothing here").is_empty());
    }

    #[test]
    fn test_blacklist() {
        let bl = Blacklist::from_json(r#"[{"pattern": "youtube\\.com", "comment": "videos"}, {"pattern": "^https://x\\.com/"}]"#)
            .unwrap();
        assert_eq!(bl.len(), 2);
        assert!(bl.is_blacklisted("https://www.youtube.com/watch?v=1"));
        assert!(bl.is_blacklisted("https://x.com/post"));
        assert!(!bl.is_blacklisted("https://example.com"));
        assert!(Blacklist::from_json(r#"[{"pattern": "("}]"#).is_err());
        assert_eq!(Blacklist::load(Path::new("/nonexistent/blacklist.json")).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_hook_payload_and_snapshot() {
        let server = MockServer::start().await;
        let link = format!("{}/article", server.uri());
        Mock::given(method("HEAD"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("Authorization", "Bearer s3cret"))
            .and(body_json(serde_json::json!({
                "link": {"url": link, "submittedBy": "@alice:x"},
                "room": {"id": ROOM, "comment": "general"}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let store = MessageStore::in_memory().unwrap();
        let msg = text_message("$1", ROOM, "@alice:x", &format!("read {link} and https://blocked.example/a"));
        let urls = extract_links(&msg.body);
        store.store_message(&msg).unwrap();
        store.store_links(&msg, &urls).unwrap();

        let room = room(Some(format!("{}/hook", server.uri())));
        let settings = LinkSettings {
            links_path: tmp.path().join("out/links.json"),
            ..Default::default()
        };
        let bl = Blacklist::from_json(r#"[{"pattern": "blocked\\.example"}]"#).unwrap();
        let pipeline = pipeline(store, &room, bl, settings);

        let report = pipeline.process(&msg, Some(&room), &urls).await;
        assert_eq!(report.skipped, vec!["https://blocked.example/a".to_string()]);
        assert_eq!(report.hooks.len(), 1);
        for hook in report.hooks {
            hook.await.unwrap();
        }
        assert!(report.exported);

        let snapshot: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("out/links.json")).unwrap()).unwrap();
        let rows = snapshot["rooms"]["general"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["url"], link.as_str());
        assert_eq!(rows[0]["sender"], "@alice:x");
        assert_eq!(rows[0]["message_id"], "$1");
        assert!(snapshot["last_sync"].is_string());
    }

    #[tokio::test]
    async fn test_opt_out_and_dry_run_skip_hooks() {
        let tmp = tempfile::tempdir().unwrap();
        let room = room(Some("http://127.0.0.1:1/hook".into()));
        let msg = text_message("$1", ROOM, "@alice:x", "https://a.com #nolink");
        let urls = extract_links(&msg.body);

        let opt_out = pipeline(
            MessageStore::in_memory().unwrap(),
            &room,
            Blacklist::default(),
            LinkSettings {
                links_path: tmp.path().join("a.json"),
                opt_out_tag: Some("#nolink".into()),
                ..Default::default()
            },
        );
        let report = opt_out.process(&msg, Some(&room), &urls).await;
        assert!(report.hooks.is_empty());
        assert!(report.exported);

        let dry = pipeline(
            MessageStore::in_memory().unwrap(),
            &room,
            Blacklist::default(),
            LinkSettings {
                links_path: tmp.path().join("b.json"),
                dry_run: true,
                ..Default::default()
            },
        );
        let plain = text_message("$2", ROOM, "@alice:x", "https://a.com");
        assert!(dry.process(&plain, Some(&room), &urls).await.hooks.is_empty());
    }

    #[tokio::test]
    async fn test_no_links_no_export() {
        let tmp = tempfile::tempdir().unwrap();
        let room = room(None);
        let p = pipeline(
            MessageStore::in_memory().unwrap(),
            &room,
            Blacklist::default(),
            LinkSettings {
                links_path: tmp.path().join("links.json"),
                ..Default::default()
            },
        );
        let msg = text_message("$1", ROOM, "@alice:x", "just chatting");
        let report = p.process(&msg, Some(&room), &[]).await;
        assert!(!report.exported);
        assert!(!tmp.path().join("links.json").exists());
    }
}
