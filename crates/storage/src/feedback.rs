use async_trait::async_trait;
use chrono::{DateTime, Local};
use insightbot_core::{Error, FeedbackRecord, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const FEEDBACK_HEADER: [&str; 5] = ["timestamp", "source", "rating", "comment", "query"];

/// Append-only sink for user feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append(&self, record: &FeedbackRecord) -> Result<()>;
}

/// CSV feedback log. The header row is written when the file is first created.
#[derive(Clone)]
pub struct CsvFeedbackStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl CsvFeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_blocking(&self, record: &FeedbackRecord) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let is_new = std::fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            wtr.write_record(FEEDBACK_HEADER)
                .map_err(|e| Error::Storage(format!("CSV header write error: {}", e)))?;
        }

        let rating = record.rating.map(|r| r.to_string()).unwrap_or_default();
        let timestamp = record.timestamp.to_rfc3339();
        wtr.write_record([
            timestamp.as_str(),
            record.source.as_str(),
            rating.as_str(),
            record.comment.as_str(),
            record.query.as_str(),
        ])
        .map_err(|e| Error::Storage(format!("CSV row write error: {}", e)))?;
        wtr.flush()?;

        debug!(path = %self.path.display(), source = %record.source, "Feedback appended");
        Ok(())
    }

    /// Read every row back. Rows that fail to parse are skipped.
    pub fn read_all(&self) -> Result<Vec<FeedbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| Error::Storage(format!("CSV read error: {}", e)))?;

        let mut records = Vec::new();
        for row in rdr.records() {
            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable feedback row");
                    continue;
                }
            };
            let field = |i: usize| row.get(i).unwrap_or_default().to_string();
            let Ok(timestamp) = DateTime::parse_from_rfc3339(&field(0)) else {
                debug!(row = ?row, "Skipping feedback row with bad timestamp");
                continue;
            };
            records.push(FeedbackRecord {
                timestamp: timestamp.with_timezone(&Local),
                source: field(1),
                rating: field(2).parse().ok(),
                comment: field(3),
                query: field(4),
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl FeedbackStore for CsvFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let store = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || store.append_blocking(&record))
            .await
            .map_err(|e| Error::Storage(format!("Feedback write task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insightbot_core::{Category, Query, RoutingState};
    use tempfile::TempDir;

    fn record(source: &str, rating: Option<u8>, comment: &str, query: &str) -> FeedbackRecord {
        FeedbackRecord {
            timestamp: Local::now(),
            source: source.to_string(),
            rating,
            comment: comment.to_string(),
            query: query.to_string(),
        }
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let store = CsvFeedbackStore::new(dir.path().join("artifacts").join("feedback_log.csv"));

        store.append(&record("Weather", Some(5), "great", "weather in Pune")).await.unwrap();
        store.append(&record("RAG", None, "", "leave policy")).await.unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,source,rating,comment,query");
        assert!(lines[1].ends_with(",Weather,5,great,weather in Pune"));
        assert!(lines[2].ends_with(",RAG,,,leave policy"));
    }

    #[tokio::test]
    async fn test_round_trip_with_quoting() {
        let dir = TempDir::new().unwrap();
        let store = CsvFeedbackStore::new(dir.path().join("feedback_log.csv"));

        let mut state = RoutingState::new(Query::parse("tavily, or \"github\"?").unwrap());
        state.category = Some(Category::WebSearch);
        let rec = FeedbackRecord::from_state(&state, Some(4), "  multi\nline, comment ");
        store.append(&rec).await.unwrap();

        let rows = store.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, "Tavily");
        assert_eq!(rows[0].rating, Some(4));
        assert_eq!(rows[0].comment, "multi\nline, comment");
        assert_eq!(rows[0].query, "tavily, or \"github\"?");
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let store = CsvFeedbackStore::new(dir.path().join("feedback_log.csv"));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(&record("GitHub", Some(3), &format!("c{}", i), "q")).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let rows = store.read_all().unwrap();
        assert_eq!(rows.len(), 16);
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.matches("timestamp,source").count(), 1);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = CsvFeedbackStore::new(dir.path().join("nope.csv"));
        assert!(store.read_all().unwrap().is_empty());
    }
}
