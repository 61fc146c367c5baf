use std::path::PathBuf;

/// Environment variable that relocates the whole insightbot home directory.
pub const HOME_ENV: &str = "INSIGHTBOT_HOME";

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        if let Ok(home) = std::env::var(HOME_ENV) {
            if !home.trim().is_empty() {
                return Self { base: PathBuf::from(home) };
            }
        }
        let base = dirs::home_dir()
            .map(|h| h.join(".insightbot"))
            .unwrap_or_else(|| PathBuf::from(".insightbot"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.base.join("artifacts")
    }

    pub fn index_db(&self) -> PathBuf {
        self.artifacts_dir().join("index.db")
    }

    pub fn feedback_log(&self) -> PathBuf {
        self.artifacts_dir().join("feedback_log.csv")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    /// Daily log file, e.g. `logs/log_2024-05-01.log`.
    pub fn log_file_for(&self, date: &str) -> PathBuf {
        self.logs_dir().join(format!("log_{}.log", date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_base() {
        let paths = Paths::with_base(PathBuf::from("/tmp/ib"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/ib/config.json"));
        assert_eq!(paths.index_db(), PathBuf::from("/tmp/ib/artifacts/index.db"));
        assert_eq!(paths.feedback_log(), PathBuf::from("/tmp/ib/artifacts/feedback_log.csv"));
        assert_eq!(
            paths.log_file_for("2024-05-01"),
            PathBuf::from("/tmp/ib/logs/log_2024-05-01.log")
        );
    }
}
