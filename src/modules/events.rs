use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;

pub const CHALLENGE_SOLVED_EVENT: &str = "challengeSolved";
pub const NOTIFICATION_EVENT: &str = "notification";

const TAIL_INTERVAL: Duration = Duration::from_millis(250);

pub type Handler = Arc<dyn Fn(Value) + Send + Sync>;

/// Real-time messaging client: named events delivered to registered handlers.
pub trait EventSource: Send + Sync {
    fn on(&self, event: &str, handler: Handler);
}

/// Wire form of one event, one per line in a feed: `{"event": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `data` to every handler of `event`, in registration order.
    pub fn dispatch(&self, event: &str, data: Value) -> usize {
        let handlers: Vec<Handler> = self.handlers.read().get(event).cloned().unwrap_or_default();
        if handlers.is_empty() {
            debug!(event, "No handlers registered");
        }
        for handler in &handlers {
            handler(data.clone());
        }
        handlers.len()
    }

    pub fn dispatch_line(&self, line: &str) -> Result<usize> {
        let envelope: Envelope = serde_json::from_str(line)?;
        Ok(self.dispatch(&envelope.event, envelope.data))
    }
}

impl EventSource for EventBus {
    fn on(&self, event: &str, handler: Handler) {
        self.handlers.write().entry(event.to_string()).or_default().push(handler);
    }
}

/// Tails a JSON-lines file and dispatches every complete line on `bus`.
pub fn spawn_file_feed(bus: EventBus, path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let file = loop {
            match File::open(&path).await {
                Ok(f) => break f,
                Err(e) => {
                    debug!(path = ?path, error = %e, "Waiting for event feed");
                    tokio::time::sleep(TAIL_INTERVAL * 4).await;
                }
            }
        };
        info!(path = ?path, "Event feed opened");
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        loop {
            match reader.read_line(&mut line).await {
                Ok(0) => tokio::time::sleep(TAIL_INTERVAL).await,
                Ok(_) if !line.ends_with('\n') => {
                    // partial write, keep what we have and wait for the rest
                    tokio::time::sleep(TAIL_INTERVAL).await;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        if let Err(e) = bus.dispatch_line(trimmed) {
                            warn!(error = %e, "Skipping malformed event");
                        }
                    }
                    line.clear();
                }
                Err(e) => {
                    warn!(error = %e, "Event feed read failed, stopping");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder(bus: &EventBus, event: &str) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.on(event, Arc::new(move |v| sink.lock().push(v)));
        seen
    }

    #[test]
    fn test_dispatch_routes_by_event_name() {
        let bus = EventBus::new();
        let solved = recorder(&bus, CHALLENGE_SOLVED_EVENT);
        let notes = recorder(&bus, NOTIFICATION_EVENT);

        assert_eq!(bus.dispatch(NOTIFICATION_EVENT, json!({"message": "hi"})), 1);
        assert_eq!(bus.dispatch("unknown", json!({})), 0);

        assert!(solved.lock().is_empty());
        assert_eq!(notes.lock().as_slice(), &[json!({"message": "hi"})]);
    }

    #[test]
    fn test_dispatch_line_parses_envelope() {
        let bus = EventBus::new();
        let solved = recorder(&bus, CHALLENGE_SOLVED_EVENT);
        let n = bus
            .dispatch_line(r#"{"event":"challengeSolved","data":{"key":"k1","flag":"FLAG{x}"}}"#)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(solved.lock()[0]["key"], "k1");
        assert!(bus.dispatch_line("{nope").is_err());
    }

    #[tokio::test]
    async fn test_file_feed_dispatches_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "{\"event\":\"notification\",\"data\":{\"message\":\"one\"}}\n").unwrap();

        let bus = EventBus::new();
        let notes = recorder(&bus, NOTIFICATION_EVENT);
        let feed = spawn_file_feed(bus.clone(), path.clone());

        {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "garbage").unwrap();
            writeln!(f, "{{\"event\":\"notification\",\"data\":{{\"message\":\"two\"}}}}").unwrap();
        }

        for _ in 0..40 {
            if notes.lock().len() == 2 { break; }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        feed.abort();

        let seen = notes.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0]["message"], "one");
        assert_eq!(seen[1]["message"], "two");
    }
}
