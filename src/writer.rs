use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use crate::editor::Editor;

// Default delay between two render steps. Short enough to feel like typing,
// long enough to actually be visible.
pub const RENDER_TICK: Duration = Duration::from_millis(5);

pub struct IncrementalWriter {
    editor: Arc<dyn Editor>,
    workspace_root: PathBuf,
    tick: Duration,
}

impl IncrementalWriter {
    pub fn new(editor: Arc<dyn Editor>, workspace_root: PathBuf, tick: Duration) -> Self {
        Self {
            editor,
            workspace_root,
            tick,
        }
    }

    // Make sure the file exists, open it in the editor, then re-render the
    // new content prefix by prefix so the change is visible as it arrives.
    // No rollback: whatever step fails, everything before it stays done.
    pub async fn apply(&self, raw_path: &str, content: &str) -> Result<()> {
        let path = self.resolve(raw_path);
        debug!(path = %path.display(), bytes = content.len(), "applying file update");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let exists = fs::try_exists(&path)
            .await
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if !exists {
            // Create empty; an existing file must not be truncated here,
            // clearing happens through the editor below.
            fs::write(&path, b"")
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
        }

        let doc = self.editor.open(&path)?;
        self.editor.show(&doc);
        self.editor.replace_all(&doc, "")?;

        // One step per character, i = 0..=len. The last step is the full
        // content, so the final buffer matches the input exactly.
        for end in prefix_ends(content) {
            self.editor.replace_all(&doc, &content[..end])?;
            if end < content.len() {
                tokio::time::sleep(self.tick).await;
            }
        }

        self.editor.save_all()?;
        Ok(())
    }

    fn resolve(&self, raw_path: &str) -> PathBuf {
        let path = Path::new(raw_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

// Byte offsets of every char-boundary prefix: 0, then one entry per char.
fn prefix_ends(s: &str) -> impl Iterator<Item = usize> + '_ {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::editor::DocHandle;

    #[derive(Debug, PartialEq)]
    enum Op {
        Replace(PathBuf, String),
        SaveAll,
    }

    // Records every editor call so tests can assert on the exact render
    // sequence. Fails replace_all for paths containing "poison".
    #[derive(Default)]
    struct RecordingEditor {
        ops: Mutex<Vec<Op>>,
    }

    impl RecordingEditor {
        fn ops(&self) -> Vec<Op> {
            std::mem::take(&mut *self.ops.lock().unwrap())
        }
    }

    impl Editor for RecordingEditor {
        fn open(&self, path: &Path) -> Result<DocHandle> {
            Ok(DocHandle {
                path: path.to_path_buf(),
            })
        }

        fn show(&self, _doc: &DocHandle) {}

        fn replace_all(&self, doc: &DocHandle, text: &str) -> Result<()> {
            if doc.path.to_string_lossy().contains("poison") {
                anyhow::bail!("edit rejected");
            }
            self.ops
                .lock()
                .unwrap()
                .push(Op::Replace(doc.path.clone(), text.to_string()));
            Ok(())
        }

        fn save_all(&self) -> Result<()> {
            self.ops.lock().unwrap().push(Op::SaveAll);
            Ok(())
        }
    }

    fn writer_with(editor: Arc<dyn Editor>, root: &Path) -> IncrementalWriter {
        IncrementalWriter::new(editor, root.to_path_buf(), Duration::ZERO)
    }

    #[tokio::test]
    async fn renders_every_prefix_then_saves() {
        let dir = tempfile::tempdir().unwrap();
        let editor = Arc::new(RecordingEditor::default());
        let writer = writer_with(editor.clone(), dir.path());

        writer.apply("f.txt", "héllo").await.unwrap();

        let path = dir.path().join("f.txt");
        let mut expected: Vec<Op> = Vec::new();
        // initial clear, then L+1 prefix steps for L = 5 chars
        expected.push(Op::Replace(path.clone(), String::new()));
        for prefix in ["", "h", "hé", "hél", "héll", "héllo"] {
            expected.push(Op::Replace(path.clone(), prefix.to_string()));
        }
        expected.push(Op::SaveAll);
        assert_eq!(editor.ops(), expected);
    }

    #[tokio::test]
    async fn empty_content_still_renders_one_step() {
        let dir = tempfile::tempdir().unwrap();
        let editor = Arc::new(RecordingEditor::default());
        let writer = writer_with(editor.clone(), dir.path());

        writer.apply("empty.txt", "").await.unwrap();

        let path = dir.path().join("empty.txt");
        assert_eq!(
            editor.ops(),
            vec![
                Op::Replace(path.clone(), String::new()),
                Op::Replace(path, String::new()),
                Op::SaveAll,
            ]
        );
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let editor = Arc::new(RecordingEditor::default());
        let writer = writer_with(editor.clone(), dir.path());

        writer.apply("a/b/c/deep.txt", "x").await.unwrap();
        assert!(dir.path().join("a/b/c/deep.txt").exists());
    }

    #[tokio::test]
    async fn second_apply_to_same_nested_path_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let editor = Arc::new(RecordingEditor::default());
        let writer = writer_with(editor.clone(), dir.path());

        writer.apply("a/b/same.txt", "one").await.unwrap();
        writer.apply("a/b/same.txt", "two").await.unwrap();
    }

    #[tokio::test]
    async fn does_not_truncate_existing_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        std::fs::write(&path, "original").unwrap();

        let editor = Arc::new(RecordingEditor::default());
        let writer = writer_with(editor.clone(), dir.path());
        writer.apply("keep.txt", "new").await.unwrap();

        // The recording editor never saves, so the disk copy is untouched.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[tokio::test]
    async fn filesystem_failure_surfaces_as_error() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where a directory is needed makes create_dir_all fail.
        std::fs::write(dir.path().join("blocker"), "").unwrap();

        let editor = Arc::new(RecordingEditor::default());
        let writer = writer_with(editor.clone(), dir.path());
        assert!(writer.apply("blocker/x.txt", "x").await.is_err());
    }

    #[tokio::test]
    async fn rejected_edit_abandons_remaining_steps() {
        let dir = tempfile::tempdir().unwrap();
        let editor = Arc::new(RecordingEditor::default());
        let writer = writer_with(editor.clone(), dir.path());

        assert!(writer.apply("poison.txt", "abc").await.is_err());
        // Nothing recorded and in particular no save.
        assert_eq!(editor.ops(), Vec::<Op>::new());
    }

    #[tokio::test]
    async fn absolute_paths_bypass_the_workspace_root() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("out.txt");

        let editor = Arc::new(RecordingEditor::default());
        let writer = writer_with(editor.clone(), root.path());
        writer
            .apply(target.to_str().unwrap(), "x")
            .await
            .unwrap();
        assert!(target.exists());
    }
}
