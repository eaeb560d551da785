// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event streams.
//!
//! One writer per file; every event is a single line. The engine holds one
//! [`EventLog`] per stream (orchestrator, per-task events) and fans events
//! out through the [`LogSink`] capability so tests can capture them.

use myc_core::{Clock, Event, EventRecord, RunId};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Capability interface for event emission. Production uses [`EventLog`];
/// tests substitute an in-memory sink.
pub trait LogSink: Send + Sync {
    fn append(&self, record: EventRecord);
}

/// Append-only JSONL file writer.
pub struct EventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    run_id: RunId,
}

impl EventLog {
    /// Open (creating parents) for append.
    pub fn open(path: &Path, run_id: RunId) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { path: path.to_path_buf(), writer: Mutex::new(BufWriter::new(file)), run_id })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event with envelope context. Lines are flushed
    /// immediately so readers tailing the file see events as they happen.
    pub fn emit(
        &self,
        clock: &impl Clock,
        task_id: Option<&str>,
        attempt: Option<u32>,
        event: Event,
    ) {
        let record = EventRecord {
            ts: clock.iso_ms(),
            run_id: self.run_id.clone(),
            task_id: task_id.map(str::to_string),
            attempt,
            event,
        };
        self.append(record);
    }
}

impl LogSink for EventLog {
    fn append(&self, record: EventRecord) {
        let Ok(line) = serde_json::to_string(&record) else {
            tracing::error!(event = record.event.event_type(), "failed to serialize event");
            return;
        };
        let mut writer = self.writer.lock();
        if writeln!(writer, "{line}").and_then(|()| writer.flush()).is_err() {
            tracing::error!(path = %self.path.display(), "failed to append event");
        }
    }
}

/// Routes records to `orchestrator.jsonl` and, for task-scoped events, to
/// the task's own `events.jsonl`.
pub struct FanoutSink {
    orchestrator: EventLog,
    paths: crate::paths::PathsContext,
    project: String,
    run_id: RunId,
    /// task id → task name (for the log directory slug).
    task_names: std::collections::HashMap<String, String>,
    task_logs: Mutex<std::collections::HashMap<String, std::sync::Arc<EventLog>>>,
}

impl FanoutSink {
    pub fn open(
        paths: crate::paths::PathsContext,
        project: impl Into<String>,
        run_id: RunId,
        task_names: std::collections::HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let project = project.into();
        let orchestrator =
            EventLog::open(&paths.orchestrator_log(&project, run_id.as_str()), run_id.clone())?;
        Ok(Self {
            orchestrator,
            paths,
            project,
            run_id,
            task_names,
            task_logs: Mutex::new(std::collections::HashMap::new()),
        })
    }

    fn task_log(&self, task_id: &str) -> Option<std::sync::Arc<EventLog>> {
        let mut logs = self.task_logs.lock();
        if let Some(log) = logs.get(task_id) {
            return Some(log.clone());
        }
        let name = self
            .task_names
            .get(task_id)
            .cloned()
            .unwrap_or_else(|| task_id.to_string());
        let path =
            self.paths.task_events_log(&self.project, self.run_id.as_str(), task_id, &name);
        match EventLog::open(&path, self.run_id.clone()) {
            Ok(log) => {
                let log = std::sync::Arc::new(log);
                logs.insert(task_id.to_string(), log.clone());
                Some(log)
            }
            Err(err) => {
                tracing::error!(%task_id, %err, "failed to open task event log");
                None
            }
        }
    }
}

impl LogSink for FanoutSink {
    fn append(&self, record: EventRecord) {
        if let Some(task_id) = record.task_id.clone() {
            if let Some(log) = self.task_log(&task_id) {
                log.append(record.clone());
            }
        }
        self.orchestrator.append(record);
    }
}

/// In-memory sink capturing records for assertions.
#[derive(Default)]
pub struct MemorySink {
    pub records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    pub fn types(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.event.event_type().to_string()).collect()
    }
}

impl LogSink for MemorySink {
    fn append(&self, record: EventRecord) {
        self.records.lock().push(record);
    }
}

#[cfg(test)]
#[path = "eventlog_tests.rs"]
mod tests;
