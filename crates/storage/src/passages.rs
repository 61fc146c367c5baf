use async_trait::async_trait;
use insightbot_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

static FTS_SPECIAL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[*"():^{}+\-]"#).expect("FTS special chars regex is valid")
});

/// Top-k passage lookup over a prepared document index.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` passages, most relevant first. An empty vec is a valid answer.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>>;
}

/// SQLite FTS5 index of pre-chunked passages, ranked with bm25.
#[derive(Clone, Debug)]
pub struct PassageIndex {
    inner: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl PassageIndex {
    /// Open an existing index. A missing file means no index has been built yet.
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            debug!(path = %db_path.display(), "Passage index not found");
            return Err(Error::RetrieverUnavailable);
        }
        Self::connect(db_path)
    }

    /// Open the index, creating the file and schema if needed.
    pub fn create(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create index directory: {}", e)))?;
        }
        Self::connect(db_path)
    }

    fn connect(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("Failed to open passage index: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let index = Self {
            inner: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        };
        index.init_schema()?;
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self
            .inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS passages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL DEFAULT '',
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS passages_fts USING fts5(
                text,
                content='passages',
                content_rowid='id'
            );

            CREATE TRIGGER IF NOT EXISTS passages_ai AFTER INSERT ON passages BEGIN
                INSERT INTO passages_fts(rowid, text) VALUES (new.id, new.text);
            END;

            CREATE TRIGGER IF NOT EXISTS passages_ad AFTER DELETE ON passages BEGIN
                INSERT INTO passages_fts(passages_fts, rowid, text) VALUES ('delete', old.id, old.text);
            END;
            ",
        )
        .map_err(|e| Error::Storage(format!("Failed to init passage schema: {}", e)))?;

        debug!("Passage index schema initialized");
        Ok(())
    }

    /// Insert passages in one transaction. Blank texts are skipped.
    pub fn insert_passages(&self, source: &str, texts: &[String]) -> Result<usize> {
        let mut conn = self
            .inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        let now = chrono::Local::now().to_rfc3339();
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare("INSERT INTO passages (source, text, created_at) VALUES (?1, ?2, ?3)")
                .map_err(|e| Error::Storage(format!("Failed to prepare insert: {}", e)))?;
            for text in texts.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
                stmt.execute(params![source, text, now])
                    .map_err(|e| Error::Storage(format!("Failed to insert passage: {}", e)))?;
                inserted += 1;
            }
        }
        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit passages: {}", e)))?;

        info!(source, inserted, "Passages indexed");
        Ok(inserted)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self
            .inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))
            .map_err(|e| Error::Storage(format!("Failed to count passages: {}", e)))?;
        Ok(n as usize)
    }

    /// Passage counts grouped by source, largest first.
    pub fn sources(&self) -> Result<Vec<(String, usize)>> {
        let conn = self
            .inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))?;
        let mut stmt = conn
            .prepare("SELECT source, COUNT(*) FROM passages GROUP BY source ORDER BY COUNT(*) DESC, source")
            .map_err(|e| Error::Storage(format!("Failed to prepare stats query: {}", e)))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))
            .map_err(|e| Error::Storage(format!("Failed to read stats: {}", e)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Storage(format!("Failed to read stats row: {}", e)))
    }

    /// Synchronous search; `retrieve` runs this on the blocking pool.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        let Some(fts_query) = sanitize_fts_query(query) else {
            return Ok(Vec::new());
        };
        let conn = self
            .inner
            .lock()
            .map_err(|e| Error::Retrieval(format!("Lock error: {}", e)))?;

        let mut stmt = conn
            .prepare(
                "SELECT p.text
                 FROM passages_fts
                 JOIN passages p ON p.id = passages_fts.rowid
                 WHERE passages_fts MATCH ?1
                 ORDER BY bm25(passages_fts)
                 LIMIT ?2",
            )
            .map_err(|e| Error::Retrieval(format!("Failed to prepare search: {}", e)))?;
        let rows = stmt
            .query_map(params![fts_query, k as i64], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Retrieval(format!("Search failed: {}", e)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Retrieval(format!("Failed to read passage: {}", e)))
    }
}

#[async_trait]
impl Retriever for PassageIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let index = self.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || index.search(&query, k))
            .await
            .map_err(|e| Error::Retrieval(format!("Search task failed: {}", e)))?
    }
}

/// Quote each token and OR them together so partial matches still rank.
/// `None` when nothing searchable is left.
fn sanitize_fts_query(query: &str) -> Option<String> {
    let cleaned = FTS_SPECIAL_CHARS.replace_all(query, " ");
    let tokens: Vec<String> = cleaned
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_index() -> (PassageIndex, TempDir) {
        let dir = TempDir::new().unwrap();
        let index = PassageIndex::create(&dir.path().join("artifacts").join("index.db")).unwrap();
        (index, dir)
    }

    fn passages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_open_missing_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = PassageIndex::open(&dir.path().join("missing.db")).unwrap_err();
        assert!(matches!(err, Error::RetrieverUnavailable));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_fts_query("leave policy?").as_deref(), Some("\"leave\" OR \"policy\""));
        assert_eq!(sanitize_fts_query("\"NEAR(a b)\"").as_deref(), Some("\"NEAR\" OR \"a\" OR \"b\""));
        assert_eq!(sanitize_fts_query("  ?? * "), None);
    }

    #[test]
    fn test_insert_count_and_reopen() {
        let (index, dir) = test_index();
        let n = index
            .insert_passages("handbook.md", &passages(&["Leave policy: 20 days.", "  ", "Travel policy."]))
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(index.count().unwrap(), 2);
        assert_eq!(index.sources().unwrap(), vec![("handbook.md".to_string(), 2)]);

        drop(index);
        let reopened = PassageIndex::open(&dir.path().join("artifacts").join("index.db")).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_ranked_and_limited() {
        let (index, _dir) = test_index();
        index
            .insert_passages(
                "hr",
                &passages(&[
                    "Employees accrue annual leave monthly. The leave policy allows carry-over.",
                    "The company leave policy grants 20 days of paid leave per year.",
                    "Server logs rotate daily at midnight.",
                    "Parking is available in the basement.",
                ]),
            )
            .unwrap();

        let hits = index.retrieve("company leave policy", 3).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits.len() <= 3);
        assert!(hits.iter().all(|h| h.contains("leave") || h.contains("company")));
        assert!(!hits.iter().any(|h| h.contains("Parking")));

        let one = index.retrieve("leave", 1).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_no_match_is_empty() {
        let (index, _dir) = test_index();
        index.insert_passages("x", &passages(&["alpha beta"])).unwrap();
        assert!(index.retrieve("gamma", 3).await.unwrap().is_empty());
        assert!(index.retrieve("???", 3).await.unwrap().is_empty());
        assert!(index.retrieve("alpha", 0).await.unwrap().is_empty());
    }
}
