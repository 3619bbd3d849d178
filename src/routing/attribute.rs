/*!
attribute.rs - decide which workspace owns a resolved path.

A path belongs to workspace `w` when it equals `w`'s absolute root or lies
underneath it (component-wise, so `packages/a` never owns `packages/ab`).
Roots are expected not to overlap; when they do, the first root in
discovery order wins.
*/

use std::path::{Path, PathBuf};

use super::path::resolve;

/// A workspace root resolved once against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    /// Path relative to the project root, as discovered (the workspace id).
    pub rel: String,
    /// Absolute, normalized root directory.
    pub abs: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(rel: impl Into<String>, project_root: &Path) -> Self {
        let rel = rel.into();
        let abs = resolve(&rel, project_root);
        Self { rel, abs }
    }

    pub fn contains(&self, abs_path: &Path) -> bool {
        abs_path.starts_with(&self.abs)
    }
}

/// Resolve every discovered workspace path against the project root.
pub fn resolve_roots(workspaces: &[String], project_root: &Path) -> Vec<WorkspaceRoot> {
    workspaces
        .iter()
        .map(|w| WorkspaceRoot::new(w.as_str(), project_root))
        .collect()
}

/// Index of the owning workspace in `roots`, or `None` (unassigned).
pub fn attribute(abs_path: &Path, roots: &[WorkspaceRoot]) -> Option<usize> {
    roots.iter().position(|r| r.contains(abs_path))
}
