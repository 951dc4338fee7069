use std::{path::PathBuf, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::editor::Editor;
use crate::protocol::Command;
use crate::queue::UpdateQueue;
use crate::terminal::{CommandRunner, TerminalHost, TerminalManager};
use crate::writer::IncrementalWriter;

// Glue between the transport and the two command paths. Run-commands go
// straight to the terminal; file updates are only scheduled here and finish
// whenever the queue gets to them. No result ever goes back to the
// controller.
pub struct Bridge {
    runner: CommandRunner,
    queue: UpdateQueue,
}

impl Bridge {
    pub fn new(
        editor: Arc<dyn Editor>,
        terminal_host: Arc<dyn TerminalHost>,
        workspace_root: PathBuf,
        tick: Duration,
    ) -> Self {
        let writer = IncrementalWriter::new(editor, workspace_root, tick);
        Self {
            runner: CommandRunner::new(TerminalManager::new(terminal_host)),
            queue: UpdateQueue::new(writer),
        }
    }

    pub fn handle_frame(&self, raw: &str) {
        match serde_json::from_str::<Command>(raw) {
            Ok(Command::TerminalUpdate { shell_command }) => self.runner.run(&shell_command),
            Ok(Command::FileUpdate(update)) => self.queue.enqueue(update),
            Ok(Command::Unknown) => debug!("ignoring frame with unrecognized type"),
            Err(err) => warn!(error = %err, "dropping malformed frame"),
        }
    }
}
