use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::FileUpdate;
use crate::writer::IncrementalWriter;

// All file updates funnel through one unbounded channel into one worker
// task, so ordering and single-flight fall out of the structure: the worker
// awaits each apply to completion before it can even receive the next task.
pub struct UpdateQueue {
    tx: mpsc::UnboundedSender<FileUpdate>,
}

impl UpdateQueue {
    pub fn new(writer: IncrementalWriter) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<FileUpdate>();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                if let Err(err) = writer.apply(&update.full_path, &update.file_content).await {
                    // A failed task is consumed, not retried, and must not
                    // take the worker down with it.
                    warn!(path = %update.full_path, error = %err, "file update failed");
                }
            }
        });
        Self { tx }
    }

    // Fire and forget: the caller never waits on the update.
    pub fn enqueue(&self, update: FileUpdate) {
        if self.tx.send(update).is_err() {
            warn!("update worker is gone, dropping file update");
        }
    }
}
