//! # Message Store
//!
//! SQLite persistence for room messages, extracted links and key/value metadata.
//! A single connection is shared behind a mutex; SQLite serializes its own writes.

use crate::domain::types::IncomingMessage;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id       TEXT PRIMARY KEY,
    room_id  TEXT NOT NULL,
    sender   TEXT NOT NULL,
    ts_ms    INTEGER NOT NULL,
    body     TEXT NOT NULL,
    msgtype  TEXT NOT NULL,
    raw_json TEXT
);
CREATE INDEX IF NOT EXISTS idx_messages_room_ts ON messages(room_id, ts_ms);
CREATE TABLE IF NOT EXISTS links (
    message_id TEXT NOT NULL,
    url        TEXT NOT NULL,
    idx        INTEGER NOT NULL,
    title      TEXT,
    ts_ms      INTEGER NOT NULL,
    PRIMARY KEY (message_id, idx)
);
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// A stored message as returned by history queries.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub sender: String,
    pub body: String,
    pub ts_ms: i64,
}

/// A link row for snapshot export.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinkRow {
    #[serde(skip)]
    pub room_id: String,
    pub message_id: String,
    pub url: String,
    pub ts_ms: i64,
    pub sender: String,
}

/// History filter shared by the leaderboard and quote queries.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter<'a> {
    pub room_id: &'a str,
    pub since_ms: i64,
    /// Bodies starting with any of these are skipped.
    pub exclude_prefixes: &'a [String],
    pub exclude_sender: Option<&'a str>,
    pub msgtype: &'a str,
}

fn escape_like(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

impl HistoryFilter<'_> {
    /// Builds the WHERE clause and its parameters.
    fn to_sql(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clause = String::from("room_id = ? AND ts_ms >= ? AND msgtype = ?");
        let mut values: Vec<Box<dyn ToSql>> = vec![
            Box::new(self.room_id.to_string()),
            Box::new(self.since_ms),
            Box::new(self.msgtype.to_string()),
        ];
        for prefix in self.exclude_prefixes.iter().filter(|p| !p.is_empty()) {
            clause.push_str(" AND body NOT LIKE ? ESCAPE '\\'");
            values.push(Box::new(escape_like(prefix)));
        }
        if let Some(sender) = self.exclude_sender {
            clause.push_str(" AND sender != ?");
            values.push(Box::new(sender.to_string()));
        }
        (clause, values)
    }
}

#[derive(Clone)]
pub struct MessageStore {
    conn: Arc<Mutex<Connection>>,
}

impl MessageStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("Failed to apply schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Inserts a message; duplicates (same event id) are ignored.
    pub fn store_message(&self, msg: &IncomingMessage) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO messages(id, room_id, sender, ts_ms, body, msgtype, raw_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                msg.event_id,
                msg.room_id,
                msg.sender,
                msg.timestamp_ms,
                msg.body,
                msg.msgtype,
                msg.raw_json
            ],
        )?;
        Ok(())
    }

    pub fn store_links(&self, msg: &IncomingMessage, urls: &[String]) -> Result<()> {
        let conn = self.conn.lock();
        for (idx, url) in urls.iter().enumerate() {
            conn.execute(
                "INSERT OR IGNORE INTO links(message_id, url, idx, title, ts_ms)
                 VALUES (?1, ?2, ?3, NULL, ?4)",
                params![msg.event_id, url, idx as i64, msg.timestamp_ms],
            )?;
        }
        Ok(())
    }

    /// Sender and body of every message matching `filter`.
    pub fn history(&self, filter: &HistoryFilter<'_>) -> Result<Vec<StoredMessage>> {
        let (clause, values) = filter.to_sql();
        let sql = format!("SELECT sender, body, ts_ms FROM messages WHERE {clause}");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt.query_map(refs.as_slice(), |row| {
            Ok(StoredMessage {
                sender: row.get(0)?,
                body: row.get(1)?,
                ts_ms: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// A random message matching `filter` whose body is longer than `min_len` characters.
    pub fn random_message(
        &self,
        filter: &HistoryFilter<'_>,
        min_len: usize,
    ) -> Result<Option<StoredMessage>> {
        let (clause, mut values) = filter.to_sql();
        values.push(Box::new(min_len as i64));
        let sql = format!(
            "SELECT sender, body, ts_ms FROM messages WHERE {clause} AND LENGTH(body) > ?
             ORDER BY RANDOM() LIMIT 1"
        );
        let conn = self.conn.lock();
        let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        conn.query_row(&sql, refs.as_slice(), |row| {
            Ok(StoredMessage {
                sender: row.get(0)?,
                body: row.get(1)?,
                ts_ms: row.get(2)?,
            })
        })
        .optional()
        .map_err(Into::into)
    }

    /// All links posted in the given rooms, oldest first.
    pub fn links_for_rooms(&self, room_ids: &[String]) -> Result<Vec<LinkRow>> {
        if room_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; room_ids.len()].join(",");
        let sql = format!(
            "SELECT m.room_id, l.message_id, l.url, l.ts_ms, m.sender
             FROM links l JOIN messages m ON m.id = l.message_id
             WHERE m.room_id IN ({placeholders})
             ORDER BY m.room_id, l.ts_ms ASC, l.message_id, l.idx"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let refs: Vec<&dyn ToSql> = room_ids.iter().map(|r| r as &dyn ToSql).collect();
        let rows = stmt.query_map(refs.as_slice(), |row| {
            Ok(LinkRow {
                room_id: row.get(0)?,
                message_id: row.get(1)?,
                url: row.get(2)?,
                ts_ms: row.get(3)?,
                sender: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .lock()
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO meta(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::MSGTYPE_TEXT;
    use crate::test_support::text_message;

    const ROOM: &str = "!room:example.com";

    #[test]
    fn test_history_filters() {
        let store = MessageStore::in_memory().unwrap();
        store
            .store_message(&text_message("$1", ROOM, "@alice:x", "hello there"))
            .unwrap();
        store
            .store_message(&text_message("$2", ROOM, "@bob:x", "[BOT] reply"))
            .unwrap();
        store
            .store_message(&text_message("$3", ROOM, "@bob:x", "/bot yap"))
            .unwrap();
        store
            .store_message(&text_message("$4", "!other:x", "@carol:x", "elsewhere"))
            .unwrap();
        // duplicate delivery is ignored
        store
            .store_message(&text_message("$1", ROOM, "@alice:x", "hello there"))
            .unwrap();

        let prefixes = vec!["[BOT]".to_string(), "/bot".to_string()];
        let filter = HistoryFilter {
            room_id: ROOM,
            since_ms: 0,
            exclude_prefixes: &prefixes,
            exclude_sender: None,
            msgtype: MSGTYPE_TEXT,
        };
        let rows = store.history(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, "@alice:x");

        let future = HistoryFilter {
            since_ms: i64::MAX,
            ..filter.clone()
        };
        assert!(store.history(&future).unwrap().is_empty());

        let quote = store.random_message(&filter, 5).unwrap().unwrap();
        assert_eq!(quote.body, "hello there");
        assert!(store.random_message(&filter, 50).unwrap().is_none());
    }

    #[test]
    fn test_like_escaping() {
        assert_eq!(escape_like("100%_"), "100\\%\\_%");
        let store = MessageStore::in_memory().unwrap();
        store
            .store_message(&text_message("$1", ROOM, "@a:x", "50% off"))
            .unwrap();
        store
            .store_message(&text_message("$2", ROOM, "@a:x", "5000 things"))
            .unwrap();
        let prefixes = vec!["50%".to_string()];
        let rows = store
            .history(&HistoryFilter {
                room_id: ROOM,
                exclude_prefixes: &prefixes,
                msgtype: MSGTYPE_TEXT,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, "5000 things");
    }

    #[test]
    fn test_links_and_meta() {
        let store = MessageStore::in_memory().unwrap();
        let msg = text_message("$1", ROOM, "@alice:x", "see https://a.com https://b.com");
        store.store_message(&msg).unwrap();
        store
            .store_links(&msg, &["https://a.com".to_string(), "https://b.com".to_string()])
            .unwrap();
        let links = store.links_for_rooms(&[ROOM.to_string()]).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://a.com");
        assert_eq!(links[1].sender, "@alice:x");
        assert!(store.links_for_rooms(&[]).unwrap().is_empty());

        assert_eq!(store.get_meta("device_id").unwrap(), None);
        store.set_meta("device_id", "ABC").unwrap();
        store.set_meta("device_id", "DEF").unwrap();
        assert_eq!(store.get_meta("device_id").unwrap().as_deref(), Some("DEF"));
    }
}
