//! Workspace discovery: manifest loading + glob expansion.
//!
//! load_manifest -> Manifest { path, format, patterns }
//! discover      -> Vec<String> (workspace dirs relative to the project root)
//!
//! Supported manifests:
//!   package.json         "workspaces": ["packages/*"]                (npm)
//!   package.json         "workspaces": { "packages": ["apps/*"] }     (yarn)
//!   pnpm-workspace.yaml  packages: ["packages/*"]                     (pnpm)
//!
//! Patterns prefixed with `!` exclude matches of the positive patterns.
//!
use anyhow::{Context, Result, bail};
use glob::{MatchOptions, Pattern};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::{log_debug, log_trace};

pub const PACKAGE_JSON: &str = "package.json";
pub const PNPM_WORKSPACE: &str = "pnpm-workspace.yaml";

/// Which manifest flavour the patterns came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Npm,
    Yarn,
    Pnpm,
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ManifestFormat::Npm => "npm",
            ManifestFormat::Yarn => "yarn",
            ManifestFormat::Pnpm => "pnpm",
        })
    }
}

/// Workspace declaration read from a project manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    pub format: ManifestFormat,
    pub patterns: Vec<String>,
}

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    workspaces: Option<WorkspacesField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkspacesField {
    Patterns(Vec<String>),
    Yarn {
        #[serde(default)]
        packages: Vec<String>,
    },
}

#[derive(Deserialize)]
struct PnpmWorkspace {
    #[serde(default)]
    packages: Option<Vec<String>>,
}

/// Locate the manifest: explicit path (relative to `root`) or the defaults.
pub fn locate_manifest(root: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        let full = root.join(p);
        if !full.is_file() {
            bail!("workspace manifest not found: {}", full.display());
        }
        return Ok(full);
    }
    for name in [PACKAGE_JSON, PNPM_WORKSPACE] {
        let candidate = root.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!(
        "no workspace manifest ({PACKAGE_JSON} or {PNPM_WORKSPACE}) in {}",
        root.display()
    )
}

/// Read and parse a manifest file. YAML by extension, JSON otherwise.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let lower = path.to_string_lossy().to_ascii_lowercase();

    let (format, patterns) = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        let parsed: PnpmWorkspace = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse YAML manifest: {}", path.display()))?;
        let Some(packages) = parsed.packages else {
            bail!("{} declares no `packages`", path.display());
        };
        (ManifestFormat::Pnpm, packages)
    } else {
        let parsed: PackageJson = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse JSON manifest: {}", path.display()))?;
        match parsed.workspaces {
            Some(WorkspacesField::Patterns(p)) => (ManifestFormat::Npm, p),
            Some(WorkspacesField::Yarn { packages }) => (ManifestFormat::Yarn, packages),
            None => bail!("{} declares no `workspaces`", path.display()),
        }
    };

    let patterns = patterns
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    Ok(Manifest {
        path: path.to_path_buf(),
        format,
        patterns,
    })
}

/// Expand workspace patterns against `root` into existing directories.
///
/// Output paths are relative to `root`, `/`-joined, deduplicated and kept in
/// discovery order. The project root itself is never returned.
pub fn discover(root: &Path, patterns: &[String]) -> Result<Vec<String>> {
    let opts = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let escaped_root = Pattern::escape(&root.to_string_lossy());

    let mut excludes = Vec::new();
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for pattern in patterns {
        if let Some(neg) = pattern.strip_prefix('!') {
            let compiled = Pattern::new(trim_rel(neg))
                .with_context(|| format!("invalid exclusion pattern: {pattern}"))?;
            excludes.push(compiled);
            continue;
        }

        let full = format!("{escaped_root}/{}", trim_rel(pattern));
        let entries = glob::glob_with(&full, opts)
            .with_context(|| format!("invalid workspace pattern: {pattern}"))?;
        for entry in entries {
            let dir = match entry {
                Ok(p) => p,
                Err(e) => {
                    log_debug!("skipping unreadable match for '{pattern}': {e}");
                    continue;
                }
            };
            if !dir.is_dir() {
                continue;
            }
            let Some(rel) = to_rel(root, &dir) else {
                log_debug!(
                    "pattern '{pattern}' matched {} outside the project root; ignored",
                    dir.display()
                );
                continue;
            };
            if rel.is_empty() {
                log_debug!("pattern '{pattern}' matched the project root; ignored");
                continue;
            }
            if rel.split('/').any(|seg| seg == "node_modules") {
                continue;
            }
            if seen.insert(rel.clone()) {
                log_trace!("pattern '{pattern}' -> {rel}");
                found.push(rel);
            }
        }
    }

    if !excludes.is_empty() {
        found.retain(|rel| {
            let dropped = excludes.iter().any(|ex| ex.matches_with(rel, opts));
            if dropped {
                log_debug!("excluded workspace {rel}");
            }
            !dropped
        });
    }

    Ok(found)
}

/// Strip leading `./` and trailing `/` so patterns join cleanly.
fn trim_rel(pattern: &str) -> &str {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p.trim_end_matches('/')
}

/// `None` unless every component below `root` is a plain name (`./` excepted).
fn to_rel(root: &Path, dir: &Path) -> Option<String> {
    let rest = dir.strip_prefix(root).ok()?;
    let segs = rest
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<String>>>()?;
    Some(segs.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project(dirs: &[&str]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for d in dirs {
            fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        tmp
    }

    fn pats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn npm_array_manifest() {
        let tmp = project(&[]);
        let p = tmp.path().join(PACKAGE_JSON);
        fs::write(&p, r#"{ "name": "root", "workspaces": ["packages/*", "apps/web"] }"#).unwrap();
        let m = load_manifest(&p).unwrap();
        assert_eq!(m.format, ManifestFormat::Npm);
        assert_eq!(m.patterns, pats(&["packages/*", "apps/web"]));
    }

    #[test]
    fn yarn_object_manifest() {
        let tmp = project(&[]);
        let p = tmp.path().join(PACKAGE_JSON);
        fs::write(
            &p,
            r#"{ "workspaces": { "packages": ["libs/*"], "nohoist": ["**/x"] } }"#,
        )
        .unwrap();
        let m = load_manifest(&p).unwrap();
        assert_eq!(m.format, ManifestFormat::Yarn);
        assert_eq!(m.patterns, pats(&["libs/*"]));
    }

    #[test]
    fn pnpm_yaml_manifest() {
        let tmp = project(&[]);
        let p = tmp.path().join(PNPM_WORKSPACE);
        fs::write(&p, "packages:\n  - 'packages/*'\n  - '!packages/legacy'\n").unwrap();
        let m = load_manifest(&p).unwrap();
        assert_eq!(m.format, ManifestFormat::Pnpm);
        assert_eq!(m.patterns, pats(&["packages/*", "!packages/legacy"]));
    }

    #[test]
    fn manifest_without_workspaces_is_an_error() {
        let tmp = project(&[]);
        let p = tmp.path().join(PACKAGE_JSON);
        fs::write(&p, r#"{ "name": "single" }"#).unwrap();
        let err = load_manifest(&p).unwrap_err();
        assert!(err.to_string().contains("declares no `workspaces`"));
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let tmp = project(&[]);
        let p = tmp.path().join(PACKAGE_JSON);
        fs::write(&p, "{ not json").unwrap();
        assert!(load_manifest(&p).is_err());
    }

    #[test]
    fn locate_prefers_package_json_then_pnpm() {
        let tmp = project(&[]);
        assert!(locate_manifest(tmp.path(), None).is_err());
        fs::write(tmp.path().join(PNPM_WORKSPACE), "packages: []\n").unwrap();
        assert!(
            locate_manifest(tmp.path(), None)
                .unwrap()
                .ends_with(PNPM_WORKSPACE)
        );
        fs::write(tmp.path().join(PACKAGE_JSON), "{}").unwrap();
        assert!(
            locate_manifest(tmp.path(), None)
                .unwrap()
                .ends_with(PACKAGE_JSON)
        );
        assert!(locate_manifest(tmp.path(), Some(Path::new("nope.json"))).is_err());
    }

    #[test]
    fn discover_expands_dedups_and_keeps_order() {
        let tmp = project(&["packages/b", "packages/a", "apps/web", "packages/.hidden"]);
        fs::write(tmp.path().join("packages/notes.txt"), "x").unwrap();
        let found = discover(
            tmp.path(),
            &pats(&["apps/*", "packages/*", "./packages/a/"]),
        )
        .unwrap();
        assert_eq!(found, pats(&["apps/web", "packages/a", "packages/b"]));
    }

    #[test]
    fn discover_applies_exclusions_and_skips_node_modules() {
        let tmp = project(&[
            "packages/a",
            "packages/legacy",
            "packages/a/node_modules/dep",
        ]);
        let found = discover(
            tmp.path(),
            &pats(&["packages/*", "packages/*/node_modules/*", "!packages/legacy"]),
        )
        .unwrap();
        assert_eq!(found, pats(&["packages/a"]));
    }

    #[test]
    fn discover_ignores_root_and_missing() {
        let tmp = project(&["packages/a"]);
        let found = discover(tmp.path(), &pats(&[".", "nothing/*"])).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn discover_skips_matches_outside_the_root() {
        let tmp = project(&["shared", "repo/packages/a"]);
        let root = tmp.path().join("repo");
        let found = discover(
            &root,
            &pats(&["../shared", "packages/*", "packages/../../shared"]),
        )
        .unwrap();
        assert_eq!(found, pats(&["packages/a"]));
    }

    #[test]
    fn to_rel_rejects_parent_components() {
        let root = Path::new("/repo");
        assert_eq!(
            to_rel(root, Path::new("/repo/packages/a")).as_deref(),
            Some("packages/a")
        );
        assert_eq!(
            to_rel(root, Path::new("/repo/./packages/a")).as_deref(),
            Some("packages/a")
        );
        assert_eq!(to_rel(root, Path::new("/repo/../shared")), None);
        assert_eq!(to_rel(root, Path::new("/other/x")), None);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let tmp = project(&[]);
        assert!(discover(tmp.path(), &pats(&["packages/[a"])).is_err());
    }
}
