//! Run event stream
//!
//! The orchestration worker emits events in execution order; the reporter
//! consumes them on another task. Channels are unbounded so no progress
//! event is ever dropped or reordered.

use crate::profiler::Profile;
use crate::types::{DiagnosticsRun, RunStats};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Log severity for `PipelineEvent::Log`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Events consumed by the reporter
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Profile computed before any task runs
    ProfileReady(Profile),
    Phase(String),
    Status(String),
    Substatus(String),
    /// Overall progress, 0..=100, never decreasing within a run
    Progress(u8),
    Log { level: LogLevel, message: String },
    /// Terminal: pipeline finished
    Done(RunStats),
    /// Terminal: diagnostics finished
    DiagnosticsDone(DiagnosticsRun),
    /// Terminal: fatal error, no summary follows
    Error(String),
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::Done(_) | PipelineEvent::DiagnosticsDone(_) | PipelineEvent::Error(_)
        )
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        PipelineEvent::Log {
            level,
            message: message.into(),
        }
    }
}

/// Receiver side of the event stream
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

impl<F> EventSink for F
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    fn emit(&self, event: PipelineEvent) {
        self(event)
    }
}

/// Sink forwarding into a tokio channel
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the reporter drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: PipelineEvent) {
        // A closed receiver means the reporter is gone; the run still completes
        if self.sender.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

/// Sink that keeps every event, for inspection after a run
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Progress values in emission order
    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(PipelineEvent::Done(RunStats::default()).is_terminal());
        assert!(PipelineEvent::Error("x".into()).is_terminal());
        assert!(!PipelineEvent::Progress(50).is_terminal());
        assert!(!PipelineEvent::log(LogLevel::Info, "hi").is_terminal());
    }

    #[test]
    fn test_channel_sink_preserves_order() {
        let (sink, mut receiver) = ChannelSink::new();
        for p in [10u8, 20, 30] {
            sink.emit(PipelineEvent::Progress(p));
        }
        drop(sink);

        let seen = tokio_test::block_on(async move {
            let mut seen = Vec::new();
            while let Some(PipelineEvent::Progress(p)) = receiver.recv().await {
                seen.push(p);
            }
            seen
        });
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);
        sink.emit(PipelineEvent::Status("still fine".into()));
    }

    #[test]
    fn test_closure_sink() {
        let collected = CollectingSink::new();
        let inner = collected.clone();
        let sink = move |event: PipelineEvent| inner.emit(event);
        sink.emit(PipelineEvent::Progress(5));
        assert_eq!(collected.progress(), vec![5]);
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Warning.to_string(), "WARN");
    }
}
