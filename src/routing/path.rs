/*!
path.rs - token classification and lexical path resolution.

  classify(token, root, policy) -> TokenKind { PathLike | Opaque }
  resolve(token, root)          -> absolute, normalized PathBuf
  normalize(path)               -> `.`/`..` folded, no filesystem access
  relative_to(path, base)       -> rewritten token ("." for the base itself)

Nothing here reads the process working directory; every anchor is passed in.
*/

use std::path::{Component, Path, PathBuf, is_separator};

use super::policy::PathPolicy;

/// Classification of a single raw command-line token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Refers to a filesystem location and is routed to a workspace.
    PathLike,
    /// Flag, literal value, subcommand... broadcast unchanged.
    Opaque,
}

impl TokenKind {
    pub fn is_path(&self) -> bool {
        matches!(self, TokenKind::PathLike)
    }
}

/// Purely syntactic path test: absolute, leading `.`, or any separator.
pub fn has_path_syntax(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    Path::new(token).is_absolute() || token.starts_with('.') || token.chars().any(is_separator)
}

/// Classify a token under the given policy.
///
/// `Probe` additionally promotes a bare name that exists under `project_root`.
/// Option-looking tokens (leading `-`) are never probed.
pub fn classify(token: &str, project_root: &Path, policy: PathPolicy) -> TokenKind {
    if has_path_syntax(token) {
        return TokenKind::PathLike;
    }
    if policy.probes_filesystem()
        && !token.is_empty()
        && !token.starts_with('-')
        && project_root.join(token).exists()
    {
        return TokenKind::PathLike;
    }
    TokenKind::Opaque
}

/// Resolve a path-like token against the project root.
///
/// Relative tokens are joined onto `project_root`; the result is always
/// lexically normalized. No existence check.
pub fn resolve(token: &str, project_root: &Path) -> PathBuf {
    let raw = Path::new(token);
    if raw.is_absolute() {
        normalize(raw)
    } else {
        normalize(&project_root.join(raw))
    }
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root (`/..` == `/`).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if popped {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(seg) => out.push(seg),
        }
    }
    out
}

/// Rewrite `path` relative to `base`. `None` when `path` is not inside `base`.
pub fn relative_to(path: &Path, base: &Path) -> Option<String> {
    let rest = path.strip_prefix(base).ok()?;
    if rest.as_os_str().is_empty() {
        return Some(".".to_string());
    }
    Some(rest.to_string_lossy().into_owned())
}

/* ---- Tests ---- */
#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/repo")
    }

    #[test]
    fn syntax_markers() {
        assert!(has_path_syntax("./x"));
        assert!(has_path_syntax("../x"));
        assert!(has_path_syntax(".eslintrc"));
        assert!(has_path_syntax("packages/a"));
        assert!(has_path_syntax("/abs/file.ts"));
        assert!(!has_path_syntax("test"));
        assert!(!has_path_syntax("--watch"));
        assert!(!has_path_syntax(""));
    }

    #[test]
    fn syntax_policy_never_probes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();
        assert_eq!(
            classify("README.md", dir.path(), PathPolicy::Syntax),
            TokenKind::Opaque
        );
    }

    #[test]
    fn probe_policy_promotes_existing_bare_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();
        std::fs::write(dir.path().join("-weird"), "x").unwrap();
        assert_eq!(
            classify("README.md", dir.path(), PathPolicy::Probe),
            TokenKind::PathLike
        );
        assert_eq!(
            classify("missing.md", dir.path(), PathPolicy::Probe),
            TokenKind::Opaque
        );
        assert_eq!(
            classify("-weird", dir.path(), PathPolicy::Probe),
            TokenKind::Opaque,
            "option-looking tokens are not probed"
        );
    }

    #[test]
    fn resolve_relative_and_absolute() {
        assert_eq!(
            resolve("packages/a/./src/../x.ts", &root()),
            PathBuf::from("/repo/packages/a/x.ts")
        );
        assert_eq!(resolve("/tmp/y", &root()), PathBuf::from("/tmp/y"));
        assert_eq!(
            resolve("/repo/packages/a/../b", &root()),
            PathBuf::from("/repo/packages/b")
        );
        assert_eq!(resolve("../outside", &root()), PathBuf::from("/outside"));
        assert_eq!(resolve("/../..", &root()), PathBuf::from("/"));
    }

    #[test]
    fn normalize_keeps_leading_parents_of_relative_paths() {
        assert_eq!(normalize(Path::new("../a/./b/..")), PathBuf::from("../a"));
        assert_eq!(normalize(Path::new("a//b/")), PathBuf::from("a/b"));
    }

    #[test]
    fn relative_rewrite() {
        let ws = PathBuf::from("/repo/packages/a");
        assert_eq!(
            relative_to(Path::new("/repo/packages/a/src/x.ts"), &ws).as_deref(),
            Some("src/x.ts")
        );
        assert_eq!(relative_to(&ws, &ws).as_deref(), Some("."));
        assert_eq!(relative_to(Path::new("/repo/packages/ab"), &ws), None);
    }
}
