/*!
Routing policies exposed as CLI value enums.

Variants:
  PathPolicy     syntax | probe   (how a token is recognised as a path)
  NoPathsPolicy  skip | all       (what runs when no token is a path)

Helpers:
  - from_str_ci()   (environment fallbacks)
  - probes_filesystem() / dispatches_all()
*/

use std::fmt;

/// How the classifier decides whether a token names a filesystem location.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum PathPolicy {
    /// Path syntax only: absolute, leading `.`, or containing a separator
    #[default]
    Syntax,
    /// Path syntax, or the token exists on disk relative to the project root
    Probe,
}

impl PathPolicy {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "syntax" => Some(PathPolicy::Syntax),
            "probe" => Some(PathPolicy::Probe),
            _ => None,
        }
    }

    pub fn probes_filesystem(&self) -> bool {
        matches!(self, PathPolicy::Probe)
    }
}

impl fmt::Display for PathPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathPolicy::Syntax => "syntax",
            PathPolicy::Probe => "probe",
        })
    }
}

/// What to dispatch when the token list carries no path-like token at all.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum NoPathsPolicy {
    /// Run nothing (exit 0)
    #[default]
    Skip,
    /// Run in every discovered workspace
    All,
}

impl NoPathsPolicy {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "none" => Some(NoPathsPolicy::Skip),
            "all" => Some(NoPathsPolicy::All),
            _ => None,
        }
    }

    pub fn dispatches_all(&self) -> bool {
        matches!(self, NoPathsPolicy::All)
    }
}

impl fmt::Display for NoPathsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoPathsPolicy::Skip => "skip",
            NoPathsPolicy::All => "all",
        })
    }
}

/* --------------------------------- Tests ---------------------------------- */
