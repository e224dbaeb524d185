//! Success and failure logs written by a run
//!
//! Each sink is a JSON-lines file in the same shape the publish tools write,
//! so a failure log can be handed straight back to `--retry-failed`.

use crate::error::CliResult;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Writes records to one file, opened on first write
struct LogSink {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl LogSink {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: Mutex::new(None),
        }
    }

    /// Drop a file left behind by an earlier run
    async fn reset(&self) -> CliResult<()> {
        *self.file.lock().await = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn append(&self, line: &str) -> CliResult<()> {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)
                .await?;
            *guard = Some(file);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
        }
        Ok(())
    }
}

/// `<dir>/<name>.success` and `<dir>/<name>.error`
///
/// Each run owns its files: records from an earlier run with the same name
/// are replaced, never appended to.
pub struct RunLog {
    api_key: Option<String>,
    success: LogSink,
    failure: LogSink,
}

impl RunLog {
    pub fn new(dir: &Path, name: &str, api_key: Option<String>) -> Self {
        Self {
            api_key,
            success: LogSink::new(dir.join(format!("{}.success", name))),
            failure: LogSink::new(dir.join(format!("{}.error", name))),
        }
    }

    /// Create the run log and remove files an earlier run left under its names
    pub async fn start(dir: &Path, name: &str, api_key: Option<String>) -> CliResult<Self> {
        let log = Self::new(dir, name, api_key);
        log.success.reset().await?;
        log.failure.reset().await?;
        Ok(log)
    }

    #[cfg(test)]
    pub fn success_path(&self) -> &Path {
        &self.success.path
    }

    pub fn failure_path(&self) -> &Path {
        &self.failure.path
    }

    /// Record an operation that went through
    pub async fn success<T: Serialize>(&self, options: &T) -> CliResult<()> {
        let line = self.line("info", options, None)?;
        self.success.append(&line).await
    }

    /// Record an operation that failed, with the failure reason
    pub async fn failure<T: Serialize>(&self, options: &T, reason: &str) -> CliResult<()> {
        let line = self.line("error", options, Some(reason))?;
        self.failure.append(&line).await
    }

    fn line<T: Serialize>(&self, level: &str, options: &T, reason: Option<&str>) -> CliResult<String> {
        let mut record = json!({
            "level": level,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "message": {
                "api_key": self.api_key,
                "options": options,
            },
        });
        if let Some(reason) = reason {
            record["error"] = json!(reason);
        }
        Ok(serde_json::to_string(&record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revert_engine::LogFile;

    #[tokio::test]
    async fn test_records_read_back_as_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path(), "revert-unpublish", Some("blt-stack".into()));

        log.success(&json!({"environment": "prod", "items": []}))
            .await
            .unwrap();
        log.success(&json!({"environment": "dev", "items": []}))
            .await
            .unwrap();
        log.failure(&json!({"environment": "prod", "items": [{"uid": "e1"}]}), "API error: 422")
            .await
            .unwrap();

        let success = std::fs::read_to_string(log.success_path()).unwrap();
        let parsed = LogFile::parse(&success).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].message.api_key.as_deref(), Some("blt-stack"));
        assert_eq!(parsed.records[1].message.options["environment"], "dev");

        let failure = std::fs::read_to_string(log.failure_path()).unwrap();
        let record: serde_json::Value = serde_json::from_str(failure.trim()).unwrap();
        assert_eq!(record["level"], "error");
        assert_eq!(record["error"], "API error: 422");
        assert_eq!(record["message"]["options"]["items"][0]["uid"], "e1");
    }

    #[tokio::test]
    async fn test_untouched_sink_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path(), "revert-publish", None);
        log.success(&json!({})).await.unwrap();

        assert!(log.success_path().exists());
        assert!(!log.failure_path().exists());
    }

    #[tokio::test]
    async fn test_start_replaces_earlier_run() {
        let dir = tempfile::tempdir().unwrap();
        let earlier = RunLog::new(dir.path(), "revert-unpublish", None);
        earlier.success(&json!({"environment": "dev"})).await.unwrap();
        earlier.failure(&json!({"environment": "prod"}), "boom").await.unwrap();
        earlier.failure(&json!({"environment": "prod"}), "boom").await.unwrap();
        drop(earlier);

        let log = RunLog::start(dir.path(), "revert-unpublish", None).await.unwrap();
        assert!(!log.success_path().exists());
        assert!(!log.failure_path().exists());

        log.failure(&json!({"environment": "staging"}), "boom").await.unwrap();
        let failure = std::fs::read_to_string(log.failure_path()).unwrap();
        assert_eq!(failure.lines().count(), 1);
        assert!(failure.contains("staging"));
    }
}
