//! Publish log records and the JSON-lines log reader
//!
//! Every line of a log is one record:
//!
//! ```text
//! {"level":"info","timestamp":"...","message":{"api_key":"...","options":{...}}}
//! ```
//!
//! `options` differs between producers (single entry publish, bulk entry
//! publish, asset publish, revert batches), so it is kept as raw JSON and
//! projected on demand.

use crate::error::{Result, RevertError};
use crate::model::{ContentItem, PublishDetail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One line of a publish log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub message: LogMessage,
}

/// Payload of a log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Stack api key the operation ran against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Operation payload, shape depends on the producer
    #[serde(default)]
    pub options: serde_json::Value,
}

impl RawLogRecord {
    /// Wrap an operation payload as a log record
    pub fn new(api_key: Option<String>, options: serde_json::Value) -> Self {
        Self {
            level: None,
            timestamp: None,
            message: LogMessage { api_key, options },
        }
    }

    /// Typed view of the payload fields the formatter understands
    pub fn options(&self, index: usize) -> Result<LogOptions> {
        if self.message.options.is_null() {
            return Ok(LogOptions::default());
        }
        LogOptions::deserialize(&self.message.options).map_err(|e| RevertError::MalformedRecord {
            index,
            reason: e.to_string(),
        })
    }
}

/// Fields of a record payload that drive classification and grouping
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogOptions {
    /// Explicit kind tag (`entry` / `asset`)
    #[serde(rename = "Type", default)]
    pub kind_tag: Option<String>,
    #[serde(rename = "entryUid", default)]
    pub entry_uid: Option<String>,
    #[serde(rename = "assetUid", default)]
    pub asset_uid: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub publish_details: Option<Vec<PublishDetail>>,
    /// Embedded entries of a bulk publish record
    #[serde(default)]
    pub entries: Option<Vec<ContentItem>>,
    /// Embedded assets of a bulk publish record
    #[serde(default)]
    pub assets: Option<Vec<ContentItem>>,
    /// Environment names the operation targeted
    #[serde(default)]
    pub environments: Option<Vec<String>>,
}

/// A parsed log file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFile {
    pub records: Vec<RawLogRecord>,
}

impl LogFile {
    /// Parse JSON-lines content, skipping blank lines
    pub fn parse(content: &str) -> Result<Self> {
        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(line)
                .map_err(|source| RevertError::LogParse { line: idx + 1, source })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Read and parse a log file
pub async fn read_log(path: &Path) -> Result<LogFile> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RevertError::LogNotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(RevertError::LogRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let log = LogFile::parse(&content)?;
    tracing::debug!(path = %path.display(), records = log.len(), "Log file loaded");
    Ok(log)
}
