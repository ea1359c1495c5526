//! Channel-backed recording worker
//!
//! Non-blocking implementation of the terminal log, message log and
//! screenshot worker contracts. `append` only pushes onto a bounded queue;
//! a background task drains the queue into a `RecordSink`. A full or
//! closed queue is reported as a `RecordingError` and never blocks the
//! caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::collaborators::{
    FlowEvent, FlowEventKind, MsgLogEntry, MsgLogWorker, Publisher, Screenshot,
    ScreenshotWorker, TermLogEntry, TermLogWorker,
};
use crate::config::RecordingConfig;
use crate::error::{CollaboratorError, RecordingError};
use crate::recording::WorkerKind;

/// One queued entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    Terminal(TermLogEntry),
    Message(MsgLogEntry),
    Screenshot(Screenshot),
}

impl Record {
    pub fn worker(&self) -> WorkerKind {
        match self {
            Record::Terminal(_) => WorkerKind::TermLog,
            Record::Message(_) => WorkerKind::MsgLog,
            Record::Screenshot(_) => WorkerKind::Screenshot,
        }
    }

    pub fn flow_id(&self) -> i64 {
        match self {
            Record::Terminal(e) => e.attribution.flow_id,
            Record::Message(e) => e.attribution.flow_id,
            Record::Screenshot(s) => s.attribution.flow_id,
        }
    }
}

/// Durable destination for recorded entries.
#[async_trait]
pub trait RecordSink: Send + Sync + 'static {
    async fn write(&self, record: Record) -> Result<(), CollaboratorError>;
}

/// Queue-backed worker usable for all three recording roles.
#[derive(Debug, Clone)]
pub struct ChannelWorker {
    sender: mpsc::Sender<Record>,
}

impl ChannelWorker {
    /// Start the background drain task. Must be called within a tokio runtime.
    pub fn spawn(sink: Arc<dyn RecordSink>, queue_size: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Record>(queue_size.max(1));

        let handle = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                let worker = record.worker();
                let flow_id = record.flow_id();
                if let Err(e) = sink.write(record).await {
                    tracing::warn!(
                        worker = worker.as_str(),
                        flow_id,
                        error = %e,
                        "Failed to persist recorded entry"
                    );
                }
            }
            tracing::debug!("Recording worker drained");
        });

        (Self { sender }, handle)
    }

    /// Start a worker sized by `config.queue_size`.
    pub fn from_config(
        sink: Arc<dyn RecordSink>,
        config: &RecordingConfig,
    ) -> (Self, JoinHandle<()>) {
        Self::spawn(sink, config.queue_size)
    }

    fn enqueue(&self, record: Record) -> Result<(), RecordingError> {
        let worker = record.worker().as_str();
        self.sender.try_send(record).map_err(|e| match e {
            TrySendError::Full(_) => RecordingError::QueueFull { worker },
            TrySendError::Closed(_) => RecordingError::Closed { worker },
        })
    }
}

impl TermLogWorker for ChannelWorker {
    fn append(&self, entry: TermLogEntry) -> Result<(), RecordingError> {
        self.enqueue(Record::Terminal(entry))
    }
}

impl MsgLogWorker for ChannelWorker {
    fn append(&self, entry: MsgLogEntry) -> Result<(), RecordingError> {
        self.enqueue(Record::Message(entry))
    }
}

impl ScreenshotWorker for ChannelWorker {
    fn append(&self, shot: Screenshot) -> Result<(), RecordingError> {
        self.enqueue(Record::Screenshot(shot))
    }
}

/// Sink that forwards recorded entries to flow subscribers.
pub struct PublisherSink {
    publisher: Arc<dyn Publisher>,
}

impl PublisherSink {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl RecordSink for PublisherSink {
    async fn write(&self, record: Record) -> Result<(), CollaboratorError> {
        let flow_id = record.flow_id();
        let (kind, payload) = match &record {
            Record::Terminal(e) => (FlowEventKind::TermLogAdded, serde_json::to_value(e)?),
            Record::Message(e) => (FlowEventKind::MsgLogAdded, serde_json::to_value(e)?),
            Record::Screenshot(s) => (FlowEventKind::ScreenshotAdded, serde_json::to_value(s)?),
        };
        self.publisher
            .publish(FlowEvent::new(flow_id, kind, payload))
            .await
    }
}
