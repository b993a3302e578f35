//! Single-writer persistence task
//!
//! Stage tasks never touch the database directly. They send `WriteOp`s over a
//! bounded channel to one blocking task that owns the storage backend, groups
//! operations into transactions and answers flush requests once everything
//! sent before the flush is committed.

use crate::model::{Article, ArticleData, Category, FailedItem, Page, Stage};
use crate::storage::traits::Storage;
use crate::HarvestError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One unit of work for the writer
#[derive(Debug, Clone)]
pub enum WriteOp {
    Categories(Vec<Category>),
    /// Listing pages of one category; `complete` lets stale pages be pruned
    Pages {
        category_id: i64,
        pages: Vec<Page>,
        complete: bool,
    },
    Articles(Vec<Article>),
    ArticleData(Vec<ArticleData>),
    Failure(FailedItem),
    /// The item at `url` succeeded; drop any failure recorded for it
    Resolved { stage: Stage, url: String },
}

/// What the writer did since the previous flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Operations committed
    pub ops_committed: u64,

    /// Rows inserted or updated
    pub rows_written: u64,

    /// Operations that could not be written even on their own
    pub ops_lost: u64,
}

enum Message {
    Write(WriteOp),
    Flush(oneshot::Sender<WriteReport>),
}

/// Cloneable handle used by stage tasks to submit writes
#[derive(Clone)]
pub struct SinkHandle {
    tx: mpsc::Sender<Message>,
}

impl SinkHandle {
    /// Queues a write; waits if the channel is full
    pub async fn write(&self, op: WriteOp) -> Result<(), HarvestError> {
        self.tx
            .send(Message::Write(op))
            .await
            .map_err(|_| HarvestError::SinkClosed)
    }

    /// Waits until every write queued before this call is committed
    pub async fn flush(&self) -> Result<WriteReport, HarvestError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Message::Flush(tx))
            .await
            .map_err(|_| HarvestError::SinkClosed)?;
        rx.await.map_err(|_| HarvestError::SinkClosed)
    }
}

/// The writer task; yields the storage back once every handle is dropped
pub struct SinkWriter<S> {
    task: JoinHandle<S>,
}

impl<S: Storage + Send + 'static> SinkWriter<S> {
    /// Starts the writer on the blocking thread pool
    ///
    /// `batch_size` bounds how many operations share one transaction.
    pub fn spawn(storage: S, batch_size: usize) -> (SinkHandle, Self) {
        let capacity = batch_size.clamp(1, 10_000);
        let (tx, rx) = mpsc::channel(capacity);
        let batch_size = batch_size.max(1);
        let task = tokio::task::spawn_blocking(move || run_writer(storage, rx, batch_size));
        (SinkHandle { tx }, Self { task })
    }

    /// Waits for the writer to drain and returns the storage
    pub async fn finish(self) -> Result<S, HarvestError> {
        self.task.await.map_err(|e| {
            tracing::error!("Storage writer panicked: {}", e);
            HarvestError::SinkClosed
        })
    }
}

fn run_writer<S: Storage>(mut storage: S, mut rx: mpsc::Receiver<Message>, batch_size: usize) -> S {
    let mut report = WriteReport::default();
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(message) = rx.blocking_recv() {
        let mut flush = match message {
            Message::Write(op) => {
                batch.push(op);
                None
            }
            Message::Flush(reply) => Some(reply),
        };

        // Drain whatever is already queued, stopping at a flush so it only
        // covers writes sent before it
        while flush.is_none() && batch.len() < batch_size {
            match rx.try_recv() {
                Ok(Message::Write(op)) => batch.push(op),
                Ok(Message::Flush(reply)) => flush = Some(reply),
                Err(_) => break,
            }
        }

        commit(&mut storage, &mut batch, &mut report);

        if let Some(reply) = flush {
            let _ = reply.send(std::mem::take(&mut report));
        }
    }

    storage
}

fn commit<S: Storage>(storage: &mut S, batch: &mut Vec<WriteOp>, report: &mut WriteReport) {
    if batch.is_empty() {
        return;
    }

    match storage.apply_batch(batch) {
        Ok(rows) => {
            report.ops_committed += batch.len() as u64;
            report.rows_written += rows as u64;
        }
        Err(e) => {
            tracing::warn!(
                "Batch of {} writes failed ({}), retrying one by one",
                batch.len(),
                e
            );
            for op in batch.iter() {
                match storage.apply(op) {
                    Ok(rows) => {
                        report.ops_committed += 1;
                        report.rows_written += rows as u64;
                    }
                    Err(e) => {
                        tracing::error!("Dropping write {:?}: {}", op_label(op), e);
                        report.ops_lost += 1;
                    }
                }
            }
        }
    }

    batch.clear();
}

fn op_label(op: &WriteOp) -> String {
    match op {
        WriteOp::Categories(c) => format!("{} categories", c.len()),
        WriteOp::Pages {
            category_id,
            pages,
            ..
        } => {
            format!("{} pages of category {}", pages.len(), category_id)
        }
        WriteOp::Articles(a) => format!("{} articles", a.len()),
        WriteOp::ArticleData(d) => format!("{} article details", d.len()),
        WriteOp::Failure(item) => format!("failure of {}", item.url),
        WriteOp::Resolved { url, .. } => format!("resolution of {}", url),
    }
}
