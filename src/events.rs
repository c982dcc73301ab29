// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Event recording
//!
//! Every reconciliation call hands its results to an [`EventRecorder`],
//! successes and failures alike.

use crate::error::Result;
use crate::types::EntrySyncResult;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the event log inside the data directory
pub const EVENTS_FILE: &str = "events.jsonl";

/// Sink for reconciliation outcomes
pub trait EventRecorder {
    /// Record one outcome
    fn record(&mut self, result: &EntrySyncResult) -> Result<()>;
}

/// A recorded outcome with its timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// When the outcome was recorded
    pub recorded_at: DateTime<Utc>,
    /// The outcome
    #[serde(flatten)]
    pub result: EntrySyncResult,
}

/// Keeps outcomes in memory
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    /// Recorded outcomes in order
    pub events: Vec<RecordedEvent>,
}

impl MemoryRecorder {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&mut self, result: &EntrySyncResult) -> Result<()> {
        self.events.push(RecordedEvent {
            recorded_at: Utc::now(),
            result: result.clone(),
        });
        Ok(())
    }
}

/// Appends outcomes as JSON lines to a file
#[derive(Debug)]
pub struct JsonLinesRecorder {
    path: PathBuf,
}

impl JsonLinesRecorder {
    /// Record into `events.jsonl` inside `dir`
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(EVENTS_FILE),
        }
    }

    /// Read back every recorded event
    pub fn read_all(&self) -> anyhow::Result<Vec<RecordedEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Failed to parse recorded event"))
            .collect()
    }

    fn append(&self, event: &RecordedEvent) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let line = serde_json::to_string(event).context("Failed to serialize event")?;
        writeln!(file, "{line}").with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl EventRecorder for JsonLinesRecorder {
    fn record(&mut self, result: &EntrySyncResult) -> Result<()> {
        let event = RecordedEvent {
            recorded_at: Utc::now(),
            result: result.clone(),
        };
        self.append(&event)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_lines_append_and_read() {
        let dir = TempDir::new().unwrap();
        let mut recorder = JsonLinesRecorder::in_dir(dir.path());
        recorder.record(&EntrySyncResult::call_failure("bad manifest")).unwrap();
        let mut ok = EntrySyncResult::default();
        ok.success = true;
        ok.added.push("master".into());
        recorder.record(&ok).unwrap();

        let events = recorder.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert!(!events[0].result.success);
        assert_eq!(events[1].result.added, vec!["master".to_string()]);
    }
}
