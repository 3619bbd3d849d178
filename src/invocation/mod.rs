//! Invocation parsing (explicit `--command` string vs positional command).
//!
//! parse_invocation -> Invocation { program, fixed_args, tokens, source }
//! `--command` strings are split with shell-style quoting rules; no shell is
//! ever spawned.
//!
use anyhow::{Context, Result, bail};
use shell_words::split as shell_split;
use std::fmt;

/// Where the program (and fixed arguments) came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    /// `-c/--command` (or `EXEC_WS_COMMAND`); positional args are all routing tokens.
    Explicit { original: String },
    /// First positional argument; the rest are routing tokens.
    Positional,
}

/// What to run, and which tokens still need routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    /// Prepended verbatim to every dispatched call; never routed.
    pub fixed_args: Vec<String>,
    /// Raw tokens for the assignment engine.
    pub tokens: Vec<String>,
    pub source: CommandSource,
}

impl Invocation {
    /// Full argument vector for one workspace: fixed args, then routed args.
    pub fn exec_args(&self, routed: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(self.fixed_args.len() + routed.len());
        out.extend(self.fixed_args.iter().cloned());
        out.extend(routed.iter().cloned());
        out
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fixed_args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.fixed_args.join(" "))
        }
    }
}

/// Build an `Invocation` from the optional command string and positional args.
///
/// Parsing Strategy:
/// 1. With a command string: shell-split it into `[program, ...fixed]`; every
///    positional argument is a routing token (possibly none).
/// 2. Without one: the first positional argument is the program, the rest are
///    routing tokens.
/// 3. Reject blank strings, unbalanced quotes and empty program names.
///
/// Examples:
/// - (`"npm run build"`, `["packages/a"]`) -> npm [run, build] / tokens [packages/a]
/// - (None, `["jest", "packages/a/x.test.ts"]`) -> jest [] / tokens [packages/a/x.test.ts]
pub fn parse_invocation(command: Option<&str>, positional: &[String]) -> Result<Invocation> {
    if let Some(raw) = command {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("Command string is empty");
        }
        let parts = shell_split(trimmed).context("Failed to parse --command (shell splitting)")?;
        let Some((program, fixed)) = parts.split_first() else {
            bail!("No tokens produced when parsing --command");
        };
        if program.is_empty() {
            bail!("Empty program name in --command");
        }
        return Ok(Invocation {
            program: program.clone(),
            fixed_args: fixed.to_vec(),
            tokens: positional.to_vec(),
            source: CommandSource::Explicit {
                original: raw.to_string(),
            },
        });
    }

    let Some((program, rest)) = positional.split_first() else {
        bail!("no command given (usage: exec-ws <command> [args...] or exec-ws -c \"<command>\" [paths...])");
    };
    if program.trim().is_empty() {
        bail!("Empty program name");
    }
    Ok(Invocation {
        program: program.clone(),
        fixed_args: Vec::new(),
        tokens: rest.to_vec(),
        source: CommandSource::Positional,
    })
}
