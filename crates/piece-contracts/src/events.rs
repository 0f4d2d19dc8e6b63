use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::Phase;

/// Something that happened in a session, as written to `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        client: String,
    },
    ImageSelected {
        generation: u64,
        media_type: Option<String>,
        payload_chars: usize,
    },
    AnalysisCompleted {
        generation: u64,
        citations: usize,
        links: usize,
    },
    AnalysisFailed {
        generation: u64,
        message: String,
    },
    AnalysisDiscarded {
        generation: u64,
        current_generation: u64,
    },
    SessionReset {
        from: Phase,
        generation: u64,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "session_started",
            SessionEvent::ImageSelected { .. } => "image_selected",
            SessionEvent::AnalysisCompleted { .. } => "analysis_completed",
            SessionEvent::AnalysisFailed { .. } => "analysis_failed",
            SessionEvent::AnalysisDiscarded { .. } => "analysis_discarded",
            SessionEvent::SessionReset { .. } => "session_reset",
        }
    }
}

/// One line of the log: the event plus the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    #[serde(flatten)]
    pub event: SessionEvent,
    pub session_id: String,
    pub ts: String,
}

/// Append-only `events.jsonl` log for one front-end session.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self::new(path, format!("session-{}", &id[..12]))
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn record(&self, event: SessionEvent) -> anyhow::Result<LoggedEvent> {
        let logged = LoggedEvent {
            event,
            session_id: self.inner.session_id.clone(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        };
        let line = serde_json::to_string(&logged)?;

        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .with_context(|| format!("failed opening {}", self.inner.path.display()))?;
        writeln!(file, "{line}")?;
        Ok(logged)
    }
}

/// Reads back a session log. Lines that are not known events are skipped.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<LoggedEvent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<LoggedEvent>(line).ok())
        .collect())
}
