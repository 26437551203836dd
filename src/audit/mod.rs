//! Append-only audit trail.
//!
//! Every request that reaches the coordinator produces exactly one
//! [`AuditRecord`], whatever the outcome. Sinks are pluggable behind
//! [`AuditSink`] so tests can assert on exact records with [`MemorySink`]
//! while deployments write JSON lines to a file or stdout. A record is
//! always written as one atomic line; concurrent writers never interleave
//! partial records.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::AuditConfig;

/// One immutable audit entry. Created once per request, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the request entered the coordinator.
    pub timestamp: DateTime<Utc>,
    /// Correlates the record with the `X-Request-ID` response header.
    pub request_id: Uuid,
    /// Resolved principal, when authentication got that far.
    pub principal: Option<String>,
    /// Requested tenant, when the header was present.
    pub tenant: Option<String>,
    /// Requested operation name, when the header was present.
    pub operation: Option<String>,
    /// HTTP method of the inbound request.
    pub method: String,
    /// Proxied path (under `/api/`).
    pub path: String,
    /// Terminal decision.
    pub decision: AuditDecision,
    /// Machine-readable reason for the decision. Always non-empty for
    /// denials; "allowed" successes carry the backend status instead.
    pub reason: Option<String>,
    /// Backend status: a numeric status code, "timeout", "unreachable" or
    /// "error", when a forward was attempted.
    pub backend_status: Option<String>,
    /// Whether the forwarder retried an idempotent request.
    pub retried: bool,
    /// Wall-clock latency of the whole request in milliseconds.
    pub latency_ms: u64,
}

/// Terminal decision recorded for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Allowed,
    Denied,
}

/// Errors from audit sinks.
///
/// A sink failure never blocks the caller-facing response; the coordinator
/// escalates it as an operational alert instead.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for audit records. Append-only: no update or delete is
/// exposed.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record as an atomic unit.
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// Sink name for logging.
    fn name(&self) -> &'static str;
}

/// Build the configured sink.
pub fn sink_from_config(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, AuditError> {
    match config {
        AuditConfig::Stdout => Ok(Arc::new(StdoutSink)),
        AuditConfig::File { path } => Ok(Arc::new(FileSink::open(path)?)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File sink
// ─────────────────────────────────────────────────────────────────────────────

/// JSON-lines file sink. The file is opened in append mode and each record
/// is written and flushed as a single line while holding the writer lock.
pub struct FileSink {
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: tokio::sync::Mutex::new(tokio::fs::File::from_std(file)),
        })
    }
}

#[async_trait]
impl AuditSink for FileSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stdout sink
// ─────────────────────────────────────────────────────────────────────────────

/// Writes one JSON object per line to stdout, for log collectors.
pub struct StdoutSink;

#[async_trait]
impl AuditSink for StdoutSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        // A single write_all under the stdout lock keeps the line atomic.
        use std::io::Write;
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(&line)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory sink
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory sink for tests: lets assertions inspect exact records.
#[derive(Default)]
pub struct MemorySink {
    records: parking_lot::Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(principal: &str) -> AuditRecord {
        AuditRecord {
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
            principal: Some(principal.to_string()),
            tenant: Some("acme".into()),
            operation: Some("modules.list".into()),
            method: "GET".into(),
            path: "/modules".into(),
            decision: AuditDecision::Allowed,
            reason: None,
            backend_status: Some("200".into()),
            retried: false,
            latency_ms: 12,
        }
    }

    #[tokio::test]
    async fn test_file_sink_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileSink::open(&path).unwrap();

        sink.record(&record("alice")).await.unwrap();
        sink.record(&record("bob")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.principal.as_deref(), Some("alice"));
        assert_eq!(first.decision, AuditDecision::Allowed);
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = Arc::new(FileSink::open(&path).unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.record(&record(&format!("p{}", i))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 20);
        // Every line parses back: no partial or interleaved records.
        for line in lines {
            let _: AuditRecord = serde_json::from_str(line).unwrap();
        }
    }

    #[tokio::test]
    async fn test_memory_sink_captures_records() {
        let sink = MemorySink::new();
        sink.record(&record("alice")).await.unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tenant.as_deref(), Some("acme"));
    }
}
