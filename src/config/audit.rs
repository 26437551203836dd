use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Audit sink configuration.
///
/// ```toml
/// [audit]
/// sink = "file"
/// path = "/var/log/palisade/audit.jsonl"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sink", rename_all = "snake_case")]
pub enum AuditConfig {
    /// One JSON object per line on stdout (for log collectors).
    Stdout,
    /// Append-only JSON-lines file.
    File { path: PathBuf },
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::Stdout
    }
}
