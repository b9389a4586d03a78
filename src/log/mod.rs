//! Worker log stream
//!
//! A cloneable [`Logger`] handle shared by the driver and every version
//! worker. Entries are mirrored to `tracing` and fanned out to subscribed
//! channels. While nobody is subscribed, entries collect in a bounded buffer
//! (oldest dropped first) that is flushed to the next subscriber.

pub mod journal;

pub use journal::Journal;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Default number of entries kept while unsubscribed
pub const DEFAULT_BUFFER: usize = 100;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

struct LoggerState {
    buffer: VecDeque<LogEntry>,
    capacity: usize,
    subscribers: Vec<mpsc::UnboundedSender<LogEntry>>,
}

/// Shared handle to the worker log stream
#[derive(Clone)]
pub struct Logger {
    state: Arc<Mutex<LoggerState>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl Logger {
    /// Create a logger buffering up to `capacity` entries while unsubscribed
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LoggerState {
                buffer: VecDeque::with_capacity(capacity),
                capacity,
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Record an entry
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(target: "offline_worker::worker", "{}", message),
            LogLevel::Info => tracing::info!(target: "offline_worker::worker", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "offline_worker::worker", "{}", message),
            LogLevel::Error => tracing::error!(target: "offline_worker::worker", "{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        };

        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.subscribers.retain(|tx| !tx.is_closed());
        if state.subscribers.is_empty() {
            if state.capacity == 0 {
                return;
            }
            if state.buffer.len() == state.capacity {
                state.buffer.pop_front();
            }
            state.buffer.push_back(entry);
        } else {
            state
                .subscribers
                .retain(|tx| tx.send(entry.clone()).is_ok());
        }
    }

    /// Receive every future entry, starting with whatever is buffered
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LogEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut state) = self.state.lock() {
            for entry in state.buffer.drain(..) {
                let _ = tx.send(entry);
            }
            state.subscribers.push(tx);
        }
        rx
    }

    /// Entries waiting for a subscriber
    pub fn buffered(&self) -> Vec<LogEntry> {
        self.state
            .lock()
            .map(|state| state.buffer.iter().cloned().collect())
            .unwrap_or_default()
    }
}
