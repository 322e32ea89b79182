//! Scoped temporary resources for one request.
//!
//! A [`ProcessContext`] owns a private workspace directory. Every file staged
//! for the request lives inside it as a [`StagedFile`], which deletes itself
//! exactly once (on [`StagedFile::close`] or on drop). Dropping the context
//! removes the workspace and anything left in it, so every exit path of a
//! request (success, error, unwind) ends with nothing on disk.
//!
//! Release order is the reverse of declaration: hold staged files in locals
//! declared *after* the context and they are gone before the workspace is.

use std::cell::Cell;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir, TempPath};
use tracing::{debug, warn};

/// Per-request owner of the workspace and the process identifier.
#[derive(Debug)]
pub struct ProcessContext {
    process_id: String,
    workspace: TempDir,
    staged: Cell<usize>,
}

impl ProcessContext {
    /// Create the workspace under `scratch_dir` (system temp dir if `None`).
    pub fn new(process_id: impl Into<String>, scratch_dir: Option<&Path>) -> io::Result<Self> {
        let process_id = process_id.into();
        let prefix = format!("pdf-anon-{process_id}-");
        let mut builder = Builder::new();
        builder.prefix(&prefix);

        let workspace = match scratch_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };
        debug!(process_id = %process_id, workspace = %workspace.path().display(), "Workspace created");

        Ok(Self {
            process_id,
            workspace,
            staged: Cell::new(0),
        })
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Number of files staged so far (released or not).
    pub fn staged_count(&self) -> usize {
        self.staged.get()
    }

    /// Stage `bytes` as a new file.
    pub fn stage_bytes(&self, label: &str, bytes: &[u8]) -> io::Result<StagedFile> {
        let mut file = self.named(label)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(StagedFile::new(file.into_temp_path()))
    }

    /// Stage everything `reader` yields as a new file.
    pub fn stage_reader(&self, label: &str, reader: &mut dyn Read) -> io::Result<StagedFile> {
        let mut file = self.named(label)?;
        io::copy(reader, &mut file)?;
        file.flush()?;
        Ok(StagedFile::new(file.into_temp_path()))
    }

    /// Reserve an empty file for a producer to write into.
    pub fn stage_empty(&self, label: &str) -> io::Result<StagedFile> {
        Ok(StagedFile::new(self.named(label)?.into_temp_path()))
    }

    fn named(&self, label: &str) -> io::Result<tempfile::NamedTempFile> {
        let n = self.staged.get() + 1;
        self.staged.set(n);
        Builder::new()
            .prefix(&format!("{n:03}-"))
            .suffix(label)
            .tempfile_in(self.workspace.path())
    }

    /// Remove the workspace now, reporting failures instead of logging them.
    pub fn close(self) -> io::Result<()> {
        let Self {
            process_id,
            workspace,
            ..
        } = self;
        workspace.close()?;
        debug!(process_id = %process_id, "Workspace released");
        Ok(())
    }
}

/// A file inside a [`ProcessContext`] workspace, deleted when released.
#[derive(Debug)]
pub struct StagedFile {
    path: Option<TempPath>,
}

impl StagedFile {
    fn new(path: TempPath) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> &Path {
        // `path` is only taken by `close`, which consumes `self`.
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path().to_path_buf()
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(self.path())
    }

    /// Delete the file now.
    pub fn close(mut self) -> io::Result<()> {
        match self.path.take() {
            Some(p) => p.close(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(p) = self.path.take() {
            let shown = p.to_path_buf();
            if let Err(e) = p.close() {
                warn!(path = %shown.display(), error = %e, "Failed to remove staged file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_removed_on_drop() {
        let scratch = tempfile::tempdir().unwrap();
        let ws;
        {
            let ctx = ProcessContext::new("p-1", Some(scratch.path())).unwrap();
            ws = ctx.workspace().to_path_buf();
            let staged = ctx.stage_bytes(".pdf", b"%PDF").unwrap();
            assert!(staged.path().starts_with(&ws));
            assert_eq!(staged.read().unwrap(), b"%PDF");
            assert!(ws.exists());
            drop(staged);
        }
        assert!(!ws.exists());
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn staged_file_released_once() {
        let ctx = ProcessContext::new("p-2", None).unwrap();
        let staged = ctx.stage_empty(".bin").unwrap();
        let path = staged.to_path_buf();
        assert!(path.exists());
        staged.close().unwrap();
        assert!(!path.exists());
        ctx.close().unwrap();
    }

    #[test]
    fn stage_reader_copies_stream() {
        let ctx = ProcessContext::new("p-3", None).unwrap();
        let mut src = io::Cursor::new(b"hello".to_vec());
        let staged = ctx.stage_reader(".txt", &mut src).unwrap();
        assert_eq!(staged.read().unwrap(), b"hello");
        assert_eq!(ctx.staged_count(), 1);
    }

    #[test]
    fn workspace_name_carries_process_id() {
        let ctx = ProcessContext::new("job-7", None).unwrap();
        let name = ctx.workspace().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("pdf-anon-job-7-"), "got {name}");
    }

    #[test]
    fn missing_scratch_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let ctx = ProcessContext::new("p", Some(&nested)).unwrap();
        assert!(ctx.workspace().starts_with(&nested));
    }
}
