//! Loop run identity and workspace layout
//!
//! LoopContext pins down where one run lives on disk. Every path under the
//! workspace is a computed accessor, never a cached field, so the layout
//! cannot drift from the workspace root.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;
use crate::id::generate_run_id;

/// Directory under the workspace root holding all looprun state
const LOOP_DIR: &str = ".looprun";

/// Identity and filesystem layout for one loop run
#[derive(Debug, Clone)]
pub struct LoopContext {
    /// Opaque run identifier
    pub id: String,
    /// Workspace root the loop operates in
    pub workspace: PathBuf,
    /// Repository root (may equal the workspace)
    pub repo_root: PathBuf,
    /// True once this process holds the workspace exclusivity lock
    pub is_primary: bool,
}

impl LoopContext {
    /// Create a context for a new run with a generated ID
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        Self {
            id: generate_run_id(),
            repo_root: workspace.clone(),
            workspace,
            is_primary: false,
        }
    }

    /// Create a context with an explicit repo root
    pub fn with_repo_root(mut self, repo_root: impl Into<PathBuf>) -> Self {
        self.repo_root = repo_root.into();
        self
    }

    /// Root of all looprun state under the workspace
    pub fn loop_dir(&self) -> PathBuf {
        self.workspace.join(LOOP_DIR)
    }

    /// Agent scratch directory
    pub fn agent_dir(&self) -> PathBuf {
        self.loop_dir().join("agent")
    }

    /// Directory of per-run task logs
    pub fn tasks_dir(&self) -> PathBuf {
        self.loop_dir().join("tasks")
    }

    /// Append-only task log for this run
    pub fn task_log_path(&self) -> PathBuf {
        self.tasks_dir().join(format!("{}.jsonl", self.id))
    }

    /// Summary output directory
    pub fn summary_dir(&self) -> PathBuf {
        self.loop_dir().join("summary")
    }

    /// Reflection output directory
    pub fn reflect_dir(&self) -> PathBuf {
        self.loop_dir().join("reflect")
    }

    /// Workspace exclusivity lock file
    pub fn lock_path(&self) -> PathBuf {
        self.loop_dir().join("loop.lock")
    }

    /// Out-of-band stop flag observed at iteration boundaries
    pub fn stop_flag_path(&self) -> PathBuf {
        self.loop_dir().join("stop")
    }

    /// Create all derived directories. Idempotent.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.loop_dir(),
            self.agent_dir(),
            self.tasks_dir(),
            self.summary_dir(),
            self.reflect_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        debug!("ensured loop directories under {}", self.loop_dir().display());
        Ok(())
    }

    /// Read a pending stop request from the flag file, if present
    pub fn read_stop_flag(&self) -> Option<String> {
        let path = self.stop_flag_path();
        if !path.exists() {
            return None;
        }
        let reason = fs::read_to_string(&path).unwrap_or_default();
        let reason = reason.trim();
        Some(if reason.is_empty() {
            "stop flag present".to_string()
        } else {
            reason.to_string()
        })
    }

    /// Remove the stop flag. A no-op if it does not exist.
    pub fn clear_stop_flag(&self) -> Result<()> {
        let path = self.stop_flag_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Write a stop flag for the loop running in `workspace`
    pub fn write_stop_flag(workspace: &Path, reason: &str) -> Result<()> {
        let dir = workspace.join(LOOP_DIR);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("stop"), reason)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_context_generates_id() {
        let ctx = LoopContext::new("/tmp/ws");
        assert!(ctx.id.starts_with("run-"));
        assert_eq!(ctx.workspace, PathBuf::from("/tmp/ws"));
        assert_eq!(ctx.repo_root, PathBuf::from("/tmp/ws"));
        assert!(!ctx.is_primary);
    }

    #[test]
    fn test_with_repo_root() {
        let ctx = LoopContext::new("/tmp/ws/sub").with_repo_root("/tmp/ws");
        assert_eq!(ctx.repo_root, PathBuf::from("/tmp/ws"));
    }

    #[test]
    fn test_derived_paths() {
        let ctx = LoopContext::new("/tmp/ws");
        assert_eq!(ctx.loop_dir(), PathBuf::from("/tmp/ws/.looprun"));
        assert_eq!(ctx.agent_dir(), PathBuf::from("/tmp/ws/.looprun/agent"));
        assert_eq!(ctx.tasks_dir(), PathBuf::from("/tmp/ws/.looprun/tasks"));
        assert_eq!(ctx.summary_dir(), PathBuf::from("/tmp/ws/.looprun/summary"));
        assert_eq!(ctx.reflect_dir(), PathBuf::from("/tmp/ws/.looprun/reflect"));
        assert_eq!(ctx.lock_path(), PathBuf::from("/tmp/ws/.looprun/loop.lock"));
        assert_eq!(ctx.stop_flag_path(), PathBuf::from("/tmp/ws/.looprun/stop"));
    }

    #[test]
    fn test_task_log_path_includes_run_id() {
        let ctx = LoopContext::new("/tmp/ws");
        let path = ctx.task_log_path();
        assert!(path.to_string_lossy().contains(&ctx.id));
        assert!(path.to_string_lossy().ends_with(".jsonl"));
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let ctx = LoopContext::new(temp.path());
        ctx.ensure_dirs().unwrap();
        ctx.ensure_dirs().unwrap();
        assert!(ctx.agent_dir().is_dir());
        assert!(ctx.tasks_dir().is_dir());
        assert!(ctx.summary_dir().is_dir());
        assert!(ctx.reflect_dir().is_dir());
    }

    #[test]
    fn test_stop_flag_roundtrip() {
        let temp = TempDir::new().unwrap();
        let ctx = LoopContext::new(temp.path());
        ctx.ensure_dirs().unwrap();

        assert!(ctx.read_stop_flag().is_none());

        LoopContext::write_stop_flag(temp.path(), "operator stop").unwrap();
        assert_eq!(ctx.read_stop_flag().as_deref(), Some("operator stop"));

        ctx.clear_stop_flag().unwrap();
        assert!(ctx.read_stop_flag().is_none());
        // Clearing again is a no-op
        ctx.clear_stop_flag().unwrap();
    }

    #[test]
    fn test_empty_stop_flag_gets_default_reason() {
        let temp = TempDir::new().unwrap();
        let ctx = LoopContext::new(temp.path());
        ctx.ensure_dirs().unwrap();

        LoopContext::write_stop_flag(temp.path(), "").unwrap();
        assert_eq!(ctx.read_stop_flag().as_deref(), Some("stop flag present"));
    }
}
