/*!
assign.rs - split one command line into per-workspace argument lists.

For every token, in input order:
  - Opaque   -> appended unchanged to every workspace and to the unassigned bucket
  - PathLike -> resolved, attributed to one workspace and rewritten relative to
                its root; paths no workspace owns keep their original text and
                land in the unassigned bucket only

A workspace is dispatch-eligible when at least one path token was routed to it.
With `NoPathsPolicy::All`, a token list holding no path token at all makes
every workspace eligible.
*/

use std::path::{Path, PathBuf};

use super::attribute::{attribute, resolve_roots};
use super::path::{classify, relative_to, resolve};
use super::policy::{NoPathsPolicy, PathPolicy};

/// Key of the unassigned bucket in `Assignment::get`.
pub const UNASSIGNED: &str = "";

/// Arguments collected for one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceArgs {
    /// Workspace path relative to the project root.
    pub workspace: String,
    /// Absolute root; the dispatch working directory.
    pub root: PathBuf,
    /// Broadcast tokens and rewritten path tokens, in input order.
    pub args: Vec<String>,
    /// Number of path tokens attributed to this workspace.
    pub routed_paths: usize,
}

/// Result of routing one token list over the discovered workspaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// One entry per workspace, in discovery order.
    pub workspaces: Vec<WorkspaceArgs>,
    /// Broadcast tokens plus path tokens no workspace owns (original text).
    pub unassigned: Vec<String>,
    /// Path tokens no workspace owns, kept apart for diagnostics.
    pub stray_paths: Vec<String>,
    /// Total number of path-like tokens seen.
    pub path_tokens: usize,
}

impl Assignment {
    /// Argument list for a workspace id; `UNASSIGNED` selects the unassigned bucket.
    pub fn get(&self, workspace: &str) -> Option<&[String]> {
        if workspace == UNASSIGNED {
            return Some(self.unassigned.as_slice());
        }
        self.workspaces
            .iter()
            .find(|w| w.workspace == workspace)
            .map(|w| w.args.as_slice())
    }

    pub fn is_eligible(&self, ws: &WorkspaceArgs, no_paths: NoPathsPolicy) -> bool {
        ws.routed_paths > 0 || (self.path_tokens == 0 && no_paths.dispatches_all())
    }

    /// Workspaces that should run, in discovery order.
    pub fn eligible(&self, no_paths: NoPathsPolicy) -> impl Iterator<Item = &WorkspaceArgs> {
        self.workspaces
            .iter()
            .filter(move |w| self.is_eligible(w, no_paths))
    }
}

/// Route `tokens` over `workspaces` (paths relative to `project_root`).
pub fn assign(
    tokens: &[String],
    workspaces: &[String],
    project_root: &Path,
    policy: PathPolicy,
) -> Assignment {
    let roots = resolve_roots(workspaces, project_root);
    let mut out = Assignment {
        workspaces: roots
            .iter()
            .map(|r| WorkspaceArgs {
                workspace: r.rel.clone(),
                root: r.abs.clone(),
                args: Vec::new(),
                routed_paths: 0,
            })
            .collect(),
        ..Assignment::default()
    };

    for token in tokens {
        if !classify(token, project_root, policy).is_path() {
            for ws in &mut out.workspaces {
                ws.args.push(token.clone());
            }
            out.unassigned.push(token.clone());
            continue;
        }

        out.path_tokens += 1;
        let abs = resolve(token, project_root);
        let owner = attribute(&abs, &roots)
            .and_then(|idx| relative_to(&abs, &roots[idx].abs).map(|rel| (idx, rel)));
        match owner {
            Some((idx, rel)) => {
                let ws = &mut out.workspaces[idx];
                ws.args.push(rel);
                ws.routed_paths += 1;
            }
            None => {
                out.unassigned.push(token.clone());
                out.stray_paths.push(token.clone());
            }
        }
    }

    out
}
