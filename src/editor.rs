use std::{
    collections::{HashMap, hash_map::Entry},
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result, bail};
use tracing::debug;

// The host editor boundary: open a document, surface it, replace its full
// span, flush everything to disk. The incremental writer only ever talks to
// this trait, so tests can swap in a recording editor.
pub trait Editor: Send + Sync {
    fn open(&self, path: &Path) -> Result<DocHandle>;
    fn show(&self, doc: &DocHandle);
    fn replace_all(&self, doc: &DocHandle, text: &str) -> Result<()>;
    fn save_all(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocHandle {
    pub path: PathBuf,
}

struct Buffer {
    text: String,
    dirty: bool,
}

// In-memory document buffers, flushed to disk on save_all. Edits are only
// visible on disk after a save, same as an editor with unsaved changes.
#[derive(Default)]
pub struct BufferEditor {
    docs: Mutex<HashMap<PathBuf, Buffer>>,
}

impl BufferEditor {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn buffer_text(&self, path: &Path) -> Option<String> {
        let docs = self.docs.lock().unwrap();
        docs.get(path).map(|buf| buf.text.clone())
    }
}

impl Editor for BufferEditor {
    fn open(&self, path: &Path) -> Result<DocHandle> {
        let mut docs = self.docs.lock().unwrap();
        if let Entry::Vacant(slot) = docs.entry(path.to_path_buf()) {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to open document {}", path.display()))?;
            slot.insert(Buffer { text, dirty: false });
        }
        Ok(DocHandle {
            path: path.to_path_buf(),
        })
    }

    fn show(&self, doc: &DocHandle) {
        debug!(path = %doc.path.display(), "document surfaced");
    }

    fn replace_all(&self, doc: &DocHandle, text: &str) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        let Some(buf) = docs.get_mut(&doc.path) else {
            bail!("document {} is not open", doc.path.display());
        };
        buf.text.clear();
        buf.text.push_str(text);
        buf.dirty = true;
        Ok(())
    }

    fn save_all(&self) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        for (path, buf) in docs.iter_mut() {
            if buf.dirty {
                fs::write(path, &buf.text)
                    .with_context(|| format!("failed to save {}", path.display()))?;
                buf.dirty = false;
            }
        }
        // Edit session over, release the buffers.
        docs.clear();
        Ok(())
    }
}
