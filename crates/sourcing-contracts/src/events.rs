use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Keys every record carries. Payload entries with these names are dropped.
const FRAME_KEYS: [&str; 4] = ["type", "session_id", "seq", "ts"];

/// Everything a sourcing session can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionStarted,
    SearchStarted,
    SearchCompleted,
    SearchFailed,
    AnalysisStarted,
    AnalysisCompleted,
    AnalysisFailed,
    RfqDrafted,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::SessionStarted,
        EventKind::SearchStarted,
        EventKind::SearchCompleted,
        EventKind::SearchFailed,
        EventKind::AnalysisStarted,
        EventKind::AnalysisCompleted,
        EventKind::AnalysisFailed,
        EventKind::RfqDrafted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SessionStarted => "session_started",
            EventKind::SearchStarted => "search_started",
            EventKind::SearchCompleted => "search_completed",
            EventKind::SearchFailed => "search_failed",
            EventKind::AnalysisStarted => "analysis_started",
            EventKind::AnalysisCompleted => "analysis_completed",
            EventKind::AnalysisFailed => "analysis_failed",
            EventKind::RfqDrafted => "rfq_drafted",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, EventKind::SearchFailed | EventKind::AnalysisFailed)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only JSONL diagnostics log for one sourcing session.
///
/// Each line is `{"type", "session_id", "seq", "ts", ...payload}`. `seq`
/// counts records written by this writer (and its clones) from zero, so a
/// reader can spot lines lost to a failed write.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    next_seq: Mutex<u64>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionLog {
                path: path.into(),
                session_id: session_id.into(),
                next_seq: Mutex::new(0),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Appends one record and returns it as written.
    pub fn record(&self, kind: EventKind, payload: EventPayload) -> anyhow::Result<Value> {
        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut seq = self
            .inner
            .next_seq
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;

        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("seq".to_string(), Value::from(*seq));
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(
            payload
                .into_iter()
                .filter(|(key, _)| !FRAME_KEYS.contains(&key.as_str())),
        );

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        *seq += 1;

        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
