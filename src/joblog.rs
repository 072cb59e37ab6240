//! Append-only JSONL job log.
//!
//! One file per (sprout, job) holding one serialized completion per line,
//! in publish order. Appending and reading are symmetric: reading a log
//! yields exactly the completion sequence that was appended, so logs
//! written during a cook replay byte-for-byte into the same progress
//! stream.

use crate::core::engine::CompletionSink;
use crate::core::types::StepCompletion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobLogError {
    #[error("job log {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("job log {path} line {line}: {source}")]
    Decode {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialize error: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One log line: the completion plus when it was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogLine {
    ts: u64,
    #[serde(flatten)]
    completion: StepCompletion,
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Derive the log path for a job on a sprout.
pub fn log_path(dir: &Path, sprout: &str, job_id: &str) -> PathBuf {
    dir.join(sprout).join(format!("{}.jsonl", job_id))
}

fn io_err(path: &Path, source: std::io::Error) -> JobLogError {
    JobLogError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Append one completion to the job's log, creating it on first write.
pub fn append(
    dir: &Path,
    sprout: &str,
    job_id: &str,
    completion: &StepCompletion,
) -> Result<(), JobLogError> {
    let path = log_path(dir, sprout, job_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(&path, e))?;
    }

    let line = LogLine {
        ts: now_millis(),
        completion: completion.clone(),
    };
    let json = serde_json::to_string(&line).map_err(JobLogError::Encode)?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| io_err(&path, e))?;
    writeln!(file, "{}", json).map_err(|e| io_err(&path, e))?;

    Ok(())
}

/// Read a job's full completion sequence back, in append order.
pub fn read(dir: &Path, sprout: &str, job_id: &str) -> Result<Vec<StepCompletion>, JobLogError> {
    let path = log_path(dir, sprout, job_id);
    let content = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;

    let mut completions = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let parsed: LogLine =
            serde_json::from_str(line).map_err(|source| JobLogError::Decode {
                path: path.display().to_string(),
                line: i + 1,
                source,
            })?;
        completions.push(parsed.completion);
    }
    Ok(completions)
}

/// Completion sink writing to the durable log.
pub struct JobLog {
    dir: PathBuf,
    sprout: String,
}

impl JobLog {
    pub fn new(dir: impl Into<PathBuf>, sprout: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            sprout: sprout.into(),
        }
    }
}

#[async_trait]
impl CompletionSink for JobLog {
    async fn publish(&self, job_id: &str, completion: &StepCompletion) -> Result<(), String> {
        append(&self.dir, &self.sprout, job_id, completion).map_err(|e| e.to_string())
    }
}
