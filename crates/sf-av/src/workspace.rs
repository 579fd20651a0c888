//! Scratch directories for encoder output.
//!
//! A [`Workspace`] is a uniquely named directory that one encoder process
//! writes its init and media segments into. It is removed either explicitly
//! with [`Workspace::close`], which reports failures, or implicitly on drop.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the initialization segment inside a workspace.
pub const INIT_SEGMENT_NAME: &str = "init.mp4";

/// Name of the extracted WebVTT file inside a subtitle workspace.
pub const SUBTITLE_FILE_NAME: &str = "subtitles.vtt";

/// A scratch directory owned by exactly one encoder process.
///
/// # Example
///
/// ```no_run
/// use sf_av::Workspace;
///
/// let ws = Workspace::create_in(&std::env::temp_dir(), "sf-video-").unwrap();
/// let init = ws.file("init.mp4");
/// // ... hand ws.path() to the encoder ...
/// ws.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a fresh directory under `parent` whose name starts with `prefix`.
    pub fn create_in(parent: &Path, prefix: &str) -> sf_core::Result<Self> {
        std::fs::create_dir_all(parent).map_err(|e| sf_core::Error::filesystem(parent, e))?;

        let temp_dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|e| sf_core::Error::filesystem(parent, e))?;

        Ok(Self { temp_dir })
    }

    /// Path to the directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of a named file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Recursively delete the directory, reporting any failure.
    pub fn close(self) -> sf_core::Result<()> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir
            .close()
            .map_err(|e| sf_core::Error::filesystem(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn created_under_parent_with_prefix() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::create_in(parent.path(), "sf-audio-").unwrap();
        assert!(ws.path().starts_with(parent.path()));
        let name = ws.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("sf-audio-"));
        assert!(ws.path().is_dir());
    }

    #[test]
    fn distinct_workspaces_never_share_a_directory() {
        let parent = tempfile::tempdir().unwrap();
        let a = Workspace::create_in(parent.path(), "sf-").unwrap();
        let b = Workspace::create_in(parent.path(), "sf-").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn missing_parent_is_created() {
        let parent = tempfile::tempdir().unwrap();
        let nested = parent.path().join("sessions/nested");
        let ws = Workspace::create_in(&nested, "sf-").unwrap();
        assert!(ws.path().starts_with(&nested));
    }

    #[test]
    fn close_removes_contents() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::create_in(parent.path(), "sf-").unwrap();
        fs::write(ws.file(INIT_SEGMENT_NAME), b"ftyp").unwrap();
        fs::write(ws.file("stream0_0.m4s"), b"moof").unwrap();
        let dir = ws.path().to_path_buf();

        ws.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let dir = {
            let ws = Workspace::create_in(parent.path(), "sf-").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!dir.exists());
    }
}
