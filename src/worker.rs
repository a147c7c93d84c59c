//! Background task dispatch.
//!
//! Blocking work (chat, retrieval-augmented answers, ingestion) runs on
//! spawned tokio tasks. Each task reports back over one unbounded channel
//! as a [`WorkerEvent`] tagged with the [`TaskId`] it was started under, so
//! the session can drop results of tasks it has since cancelled.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use orinda_core::models::ModelSelection;
use orinda_core::OrindaError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;

use crate::context::{Answer, AppContext};
use crate::ingest::IngestSummary;
use crate::progress::{IngestProgressEvent, IngestProgressReporter};

pub type TaskId = u64;

#[derive(Debug)]
pub enum WorkerEvent {
    Chat {
        task: TaskId,
        prompt: String,
        result: Result<String, OrindaError>,
    },
    Ask {
        task: TaskId,
        query: String,
        result: Result<Answer, OrindaError>,
    },
    IngestProgress {
        task: TaskId,
        event: IngestProgressEvent,
    },
    IngestDone {
        task: TaskId,
        summary: IngestSummary,
    },
}

impl WorkerEvent {
    pub fn task(&self) -> TaskId {
        match self {
            Self::Chat { task, .. }
            | Self::Ask { task, .. }
            | Self::IngestProgress { task, .. }
            | Self::IngestDone { task, .. } => *task,
        }
    }
}

/// A running background task.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: TaskId,
    abort: AbortHandle,
}

impl TaskHandle {
    pub fn abort(&self) {
        self.abort.abort();
    }
}

/// Forwards ingestion progress onto the worker channel.
struct ChannelProgress {
    task: TaskId,
    tx: UnboundedSender<WorkerEvent>,
}

impl IngestProgressReporter for ChannelProgress {
    fn report(&self, event: IngestProgressEvent) {
        let _ = self.tx.send(WorkerEvent::IngestProgress {
            task: self.task,
            event,
        });
    }
}

pub struct Dispatcher {
    ctx: Arc<AppContext>,
    tx: UnboundedSender<WorkerEvent>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(ctx: Arc<AppContext>) -> (Self, UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                ctx,
                tx,
                next_id: AtomicU64::new(1),
            },
            rx,
        )
    }

    fn next_id(&self) -> TaskId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn spawn_chat(&self, prompt: String, model: ModelSelection) -> TaskHandle {
        let task = self.next_id();
        let ctx = self.ctx.clone();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let result = ctx.complete(&prompt, &model).await;
            let _ = tx.send(WorkerEvent::Chat {
                task,
                prompt,
                result,
            });
        });
        tracing::debug!(task, "chat task started");
        TaskHandle {
            id: task,
            abort: handle.abort_handle(),
        }
    }

    pub fn spawn_ask(&self, query: String, model: ModelSelection) -> TaskHandle {
        let task = self.next_id();
        let ctx = self.ctx.clone();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let result = ctx.ask(&query, &model).await;
            let _ = tx.send(WorkerEvent::Ask {
                task,
                query,
                result,
            });
        });
        tracing::debug!(task, "ask task started");
        TaskHandle {
            id: task,
            abort: handle.abort_handle(),
        }
    }

    pub fn spawn_ingest(&self, paths: Vec<PathBuf>) -> TaskHandle {
        let task = self.next_id();
        let ingestor = self.ctx.ingestor();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let progress = ChannelProgress {
                task,
                tx: tx.clone(),
            };
            let summary = ingestor.ingest_paths(&paths, &progress).await;
            let _ = tx.send(WorkerEvent::IngestDone { task, summary });
        });
        tracing::debug!(task, "ingest task started");
        TaskHandle {
            id: task,
            abort: handle.abort_handle(),
        }
    }
}
