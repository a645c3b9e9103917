use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

const RESERVED_KEYS: [&str; 3] = ["type", "session_id", "ts"];

/// Session activity log: one JSON object per line.
///
/// Recording never fails the caller. A write that cannot happen is logged
/// and the session carries on.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventLog>,
}

#[derive(Debug)]
struct EventLog {
    path: PathBuf,
    session_id: String,
    append_lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventLog {
                path: path.into(),
                session_id: session_id.into(),
                append_lock: Mutex::new(()),
            }),
        }
    }

    /// Appends `event_type` with `payload`. The reserved `type`,
    /// `session_id` and `ts` keys always come from the writer.
    pub fn record(&self, event_type: &str, payload: EventPayload) {
        let line = match self.inner.line_for(event_type, payload) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(event = event_type, error = %err, "could not encode session event");
                return;
            }
        };
        if let Err(err) = self.inner.append(&line) {
            tracing::warn!(
                event = event_type,
                path = %self.inner.path.display(),
                error = %err,
                "could not write session event"
            );
        }
    }
}

impl EventLog {
    fn line_for(&self, event_type: &str, payload: EventPayload) -> serde_json::Result<String> {
        let mut event: EventPayload = payload
            .into_iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .collect();
        event.insert("type".to_string(), Value::from(event_type));
        event.insert("session_id".to_string(), Value::from(self.session_id.as_str()));
        event.insert(
            "ts".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        serde_json::to_string(&event)
    }

    fn append(&self, line: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}

pub fn new_session_id() -> String {
    format!("session-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"))
}
