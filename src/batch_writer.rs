use std::sync::Arc;
use tracing::debug;

use crate::{
    error::Result,
    store::{Store, WriteOp},
};

/// Hard ceiling on operations in one atomic store commit.
pub const MAX_BATCH_OPERATIONS: usize = 500;

/// Accumulates writes and commits them in chunks of at most [`MAX_BATCH_OPERATIONS`].
///
/// Reaching the ceiling forces a commit immediately; whatever is left is
/// committed by [`BatchWriter::finish`]. All operation kinds share one chunking rule.
pub struct BatchWriter {
    store: Arc<dyn Store>,
    pending: Vec<WriteOp>,
    commits: usize,
    committed_ops: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub commits: usize,
    pub operations: usize,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            pending: Vec::new(),
            commits: 0,
            committed_ops: 0,
        }
    }

    pub async fn push(&mut self, op: WriteOp) -> Result<()> {
        self.pending.push(op);
        if self.pending.len() >= MAX_BATCH_OPERATIONS {
            self.flush().await?;
        }
        Ok(())
    }

    /// Commits the remainder and reports what was written overall.
    pub async fn finish(mut self) -> Result<BatchSummary> {
        self.flush().await?;
        Ok(BatchSummary {
            commits: self.commits,
            operations: self.committed_ops,
        })
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let ops = std::mem::take(&mut self.pending);
        let count = ops.len();
        self.store.commit(ops).await?;
        self.commits += 1;
        self.committed_ops += count;
        debug!("Committed batch of {} operations", count);

        Ok(())
    }
}
