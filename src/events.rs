//! Progress events for long-running analyses.
//!
//! Commands report their stage and log lines through a [`Progress`] handle.
//! Whoever started the analysis (the CLI, a future server) owns the receiving
//! end of the channel and folds the events into a [`ProgressLog`] snapshot.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Maximum number of log lines kept in a snapshot
pub const MAX_LOG_LINES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Idle,
    Active,
    Success,
    Error,
}

/// Stage update payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub percent: u8,
    pub text: String,
    pub status: ProgressStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisEvent {
    Progress(ProgressUpdate),
    Log { line: String },
}

/// Sending half handed to the commands. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<UnboundedSender<AnalysisEvent>>,
}

impl Progress {
    /// Handle that drops every event
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, UnboundedReceiver<AnalysisEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    fn emit(&self, event: AnalysisEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening any more
            let _ = tx.send(event);
        }
    }

    pub fn stage(&self, percent: u8, text: &str) {
        self.emit(AnalysisEvent::Progress(ProgressUpdate {
            percent: percent.min(100),
            text: text.to_string(),
            status: ProgressStatus::Active,
        }));
    }

    pub fn success(&self, text: &str) {
        self.emit(AnalysisEvent::Progress(ProgressUpdate {
            percent: 100,
            text: text.to_string(),
            status: ProgressStatus::Success,
        }));
    }

    pub fn error(&self, text: &str) {
        self.emit(AnalysisEvent::Progress(ProgressUpdate {
            percent: 0,
            text: text.to_string(),
            status: ProgressStatus::Error,
        }));
    }

    /// Log line for the user-facing activity feed (also forwarded to `log`)
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        log::info!("{}", line);
        self.emit(AnalysisEvent::Log { line });
    }
}

/// Folded view of all events received so far
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressLog {
    pub current: ProgressUpdate,
    pub lines: VecDeque<String>,
    /// Total number of log lines ever received, for incremental polling
    pub total_lines: usize,
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self {
            current: ProgressUpdate {
                percent: 0,
                text: "System Idle".to_string(),
                status: ProgressStatus::Idle,
            },
            lines: VecDeque::new(),
            total_lines: 0,
        }
    }
}

impl ProgressLog {
    pub fn apply(&mut self, event: AnalysisEvent) {
        match event {
            AnalysisEvent::Progress(update) => self.current = update,
            AnalysisEvent::Log { line } => {
                self.lines.push_back(line);
                self.total_lines += 1;
                while self.lines.len() > MAX_LOG_LINES {
                    self.lines.pop_front();
                }
            }
        }
    }

    /// Lines received after `last_seen` total lines (what a poller has not displayed yet)
    pub fn lines_since(&self, last_seen: usize) -> Vec<String> {
        let dropped = self.total_lines - self.lines.len();
        let skip = last_seen.saturating_sub(dropped);
        self.lines.iter().skip(skip).cloned().collect()
    }
}
