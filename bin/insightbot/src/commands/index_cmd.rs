use insightbot_core::{Config, Paths};
use insightbot_storage::PassageIndex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// One prepared passage per JSONL line.
#[derive(Debug, Deserialize)]
struct PassageLine {
    text: String,
    #[serde(default)]
    source: Option<String>,
}

/// Group passages by source. Malformed lines are skipped with a warning.
fn parse_jsonl(content: &str, default_source: &str) -> (BTreeMap<String, Vec<String>>, usize) {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut skipped = 0;
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PassageLine>(line) {
            Ok(p) => {
                let source = p.source.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| default_source.to_string());
                grouped.entry(source).or_default().push(p.text);
            }
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "Skipping malformed passage line");
                skipped += 1;
            }
        }
    }
    (grouped, skipped)
}

pub async fn import(file: &Path) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let index_path = config.index_path(&paths);

    let content = std::fs::read_to_string(file)?;
    let default_source = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "import".to_string());
    let (grouped, skipped) = parse_jsonl(&content, &default_source);

    let index = PassageIndex::create(&index_path)?;
    let mut total = 0;
    for (source, texts) in &grouped {
        total += index.insert_passages(source, texts)?;
    }

    println!("Imported {} passages into {}", total, index_path.display());
    if skipped > 0 {
        println!("Skipped {} malformed lines", skipped);
    }
    Ok(())
}

pub async fn stats() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let index_path = config.index_path(&paths);

    let index = match PassageIndex::open(&index_path) {
        Ok(i) => i,
        Err(insightbot_core::Error::RetrieverUnavailable) => {
            println!("No passage index at {}", index_path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Index: {}", index.path().display());
    println!("Passages: {}", index.count()?);
    for (source, n) in index.sources()? {
        println!("  {:<40} {}", source, n);
    }
    Ok(())
}
