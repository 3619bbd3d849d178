/*!
`run.rs`

Implements the single `exec-ws` action: route a command line over the
declared workspaces and run it where it applies.

Flow:
  1. Resolve configuration (CLI flag > environment > default)
       --command  / EXEC_WS_COMMAND
       --root     / EXEC_WS_ROOT      (default: current directory, read once)
       --paths    / EXEC_WS_PATHS     (syntax | probe)
       --no-paths / EXEC_WS_NO_PATHS  (skip | all)
  2. Split the invocation into program, fixed args and routing tokens
  3. Load the manifest and expand workspace patterns
  4. Route tokens (routing::assign) and log the decision per workspace
  5. Plan + run jobs (dispatch), print a summary, return the aggregate code

Exit code policy:
  - configuration errors          -> Err (main exits non-zero, nothing runs)
  - zero eligible workspaces      -> 0
  - otherwise                     -> max of per-workspace contributions

JSON plan output (`--dry-run --json`):
{
  "status": "dry-run",
  "root": "/abs/project",
  "command": "npm run build",
  "workspaces": [
    { "workspace": "packages/a", "dispatch": true, "args": ["."], "exec": ["run","build","."] }
  ],
  "unassigned": ["README.md"]
}
*/

use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::{Path, PathBuf};

use crate::cmd::format::{Role, StyleOptions, TableOpts, box_header, color, emoji, table};
use crate::dispatch::{self, ExecutionMode, Outcome};
use crate::invocation::{self, CommandSource, Invocation};
use crate::routing::{self, Assignment, NoPathsPolicy, PathPolicy, UNASSIGNED};
use crate::utils::logging::{LogLevel, should_emit};
use crate::workspace;
use crate::{log_debug, log_error, log_info, log_warn};

pub const ENV_COMMAND: &str = "EXEC_WS_COMMAND";
pub const ENV_ROOT: &str = "EXEC_WS_ROOT";
pub const ENV_PATHS: &str = "EXEC_WS_PATHS";
pub const ENV_NO_PATHS: &str = "EXEC_WS_NO_PATHS";

/* -------------------------------------------------------------------------- */
/* Argument Struct                                                            */
/* -------------------------------------------------------------------------- */

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Command run in every dispatched workspace; positional args become routing tokens
    #[arg(short = 'c', long = "command", value_name = "COMMAND")]
    pub command: Option<String>,

    /// Project root (falls back to EXEC_WS_ROOT, then the current directory)
    #[arg(short = 'r', long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Workspace manifest, relative to the root (default: package.json, then pnpm-workspace.yaml)
    #[arg(short = 'm', long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// How tokens are recognised as paths
    #[arg(long = "paths", value_enum, value_name = "POLICY")]
    pub paths: Option<PathPolicy>,

    /// What runs when no argument is a path
    #[arg(long = "no-paths", value_enum, value_name = "POLICY")]
    pub no_paths: Option<NoPathsPolicy>,

    /// Run workspaces one at a time, in discovery order
    #[arg(short = 's', long)]
    pub sequential: bool,

    /// Print the routing plan without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// JSON output for --dry-run / --list
    #[arg(long)]
    pub json: bool,

    /// List discovered workspaces and exit
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Command and its arguments (only routing tokens when --command is given)
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}

/// Effective settings after environment fallbacks.
#[derive(Debug, Clone)]
struct Settings {
    root: PathBuf,
    paths: PathPolicy,
    no_paths: NoPathsPolicy,
    mode: ExecutionMode,
}

/* -------------------------------------------------------------------------- */
/* Public Entry Point                                                         */
/* -------------------------------------------------------------------------- */

/// Run the whole flow; returns the process exit code.
pub fn execute_run(mut args: RunArgs) -> Result<i32> {
    if args.command.is_none() {
        args.command = env_non_blank(ENV_COMMAND);
    }
    let settings = resolve_settings(&args)?;
    log_debug!(
        "root={} paths={} no-paths={} mode={:?}",
        settings.root.display(),
        settings.paths,
        settings.no_paths,
        settings.mode
    );

    // Fail on a missing command before touching the manifest.
    let invocation = if args.list {
        None
    } else {
        Some(invocation::parse_invocation(
            args.command.as_deref(),
            &args.args,
        )?)
    };

    let manifest_path = workspace::locate_manifest(&settings.root, args.manifest.as_deref())?;
    let manifest = workspace::load_manifest(&manifest_path)?;
    let workspaces = workspace::discover(&settings.root, &manifest.patterns)?;
    log_info!(
        "discovered {} workspace(s) from {} ({})",
        workspaces.len(),
        manifest.path.display(),
        manifest.format
    );
    for ws in &workspaces {
        log_debug!("  workspace {ws}");
    }

    let Some(invocation) = invocation else {
        print_workspaces(&settings.root, &workspaces, args.json);
        return Ok(0);
    };
    if let CommandSource::Explicit { original } = &invocation.source {
        log_debug!("command string: {original}");
    }

    let assignment = routing::assign(
        &invocation.tokens,
        &workspaces,
        &settings.root,
        settings.paths,
    );
    log_routing(&invocation, &assignment, settings.no_paths);

    let jobs = dispatch::plan(&invocation, &assignment, settings.no_paths);

    if args.dry_run {
        print_plan(&settings.root, &invocation, &assignment, settings.no_paths, args.json);
        return Ok(0);
    }

    if jobs.is_empty() {
        log_info!("no workspace matched the given arguments; nothing to run");
        return Ok(0);
    }

    log_info!(
        "running `{invocation}` in {} workspace(s){}",
        jobs.len(),
        if settings.mode == ExecutionMode::Sequential {
            " (sequential)"
        } else {
            ""
        }
    );
    let outcomes = dispatch::run_jobs(jobs, settings.mode)?;
    let code = dispatch::aggregate_exit_code(&outcomes);

    if should_emit(LogLevel::Info) {
        println!("{}", render_summary(&outcomes, code, &StyleOptions::detect()));
    }
    if code == 0 {
        log_info!("all {} workspace(s) succeeded", outcomes.len());
    } else {
        let failed = outcomes.iter().filter(|o| !o.status.is_success()).count();
        log_error!("{failed} of {} workspace(s) failed (exit {code})", outcomes.len());
    }
    Ok(code)
}

/* -------------------------------------------------------------------------- */
/* Configuration                                                              */
/* -------------------------------------------------------------------------- */

fn env_non_blank(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn resolve_settings(args: &RunArgs) -> Result<Settings> {
    let root = match args.root.clone().or_else(|| env_non_blank(ENV_ROOT).map(PathBuf::from)) {
        Some(r) => r,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let root = std::fs::canonicalize(&root)
        .with_context(|| format!("project root not accessible: {}", root.display()))?;
    if !root.is_dir() {
        bail!("project root is not a directory: {}", root.display());
    }

    let paths = match args.paths {
        Some(p) => p,
        None => match env_non_blank(ENV_PATHS) {
            Some(raw) => PathPolicy::from_str_ci(&raw)
                .with_context(|| format!("invalid {ENV_PATHS} value: '{raw}' (syntax|probe)"))?,
            None => PathPolicy::default(),
        },
    };
    let no_paths = match args.no_paths {
        Some(p) => p,
        None => match env_non_blank(ENV_NO_PATHS) {
            Some(raw) => NoPathsPolicy::from_str_ci(&raw)
                .with_context(|| format!("invalid {ENV_NO_PATHS} value: '{raw}' (skip|all)"))?,
            None => NoPathsPolicy::default(),
        },
    };

    Ok(Settings {
        root,
        paths,
        no_paths,
        mode: if args.sequential {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Parallel
        },
    })
}

/* -------------------------------------------------------------------------- */
/* Reporting                                                                  */
/* -------------------------------------------------------------------------- */

/// One line per workspace: dispatched with its command line, or skipped.
fn routing_decisions(
    invocation: &Invocation,
    assignment: &Assignment,
    no_paths: NoPathsPolicy,
) -> Vec<String> {
    assignment
        .workspaces
        .iter()
        .map(|ws| {
            if assignment.is_eligible(ws, no_paths) {
                let exec_args = invocation.exec_args(&ws.args);
                let line =
                    shell_words::join(std::iter::once(&invocation.program).chain(&exec_args));
                format!("{}: dispatch `{line}`", ws.workspace)
            } else {
                format!("{}: skipped (no path argument routed here)", ws.workspace)
            }
        })
        .collect()
}

fn log_routing(invocation: &Invocation, assignment: &Assignment, no_paths: NoPathsPolicy) {
    for line in routing_decisions(invocation, assignment, no_paths) {
        log_info!("{line}");
    }
    if !assignment.stray_paths.is_empty() {
        log_warn!(
            "path argument(s) outside every workspace, not forwarded: {}",
            assignment.stray_paths.join(" ")
        );
    }
}

fn print_workspaces(root: &Path, workspaces: &[String], json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "status": "ok",
                "root": root.display().to_string(),
                "count": workspaces.len(),
                "workspaces": workspaces,
            })
        );
        return;
    }
    let style = StyleOptions::detect();
    println!(
        "{}",
        box_header(
            format!("{} Workspaces ({})", emoji("list", &style), workspaces.len()),
            Some(format!("root={}", root.display())),
            &style,
        )
    );
    for ws in workspaces {
        println!("  {ws}");
    }
}

fn plan_json(
    root: &Path,
    invocation: &Invocation,
    assignment: &Assignment,
    no_paths: NoPathsPolicy,
) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = assignment
        .workspaces
        .iter()
        .map(|ws| {
            serde_json::json!({
                "workspace": ws.workspace,
                "dispatch": assignment.is_eligible(ws, no_paths),
                "args": ws.args,
                "exec": invocation.exec_args(&ws.args),
            })
        })
        .collect();
    serde_json::json!({
        "status": "dry-run",
        "root": root.display().to_string(),
        "command": invocation.to_string(),
        "workspaces": rows,
        "unassigned": assignment.get(UNASSIGNED).unwrap_or_default(),
    })
}

fn render_plan(
    invocation: &Invocation,
    assignment: &Assignment,
    no_paths: NoPathsPolicy,
    style: &StyleOptions,
) -> String {
    let eligible = assignment.eligible(no_paths).count();
    let mut out = box_header(
        format!("{} Plan: {invocation}", emoji("rocket", style)),
        Some(format!("{eligible} of {} workspace(s)", assignment.workspaces.len())),
        style,
    );
    out.push('\n');

    let rows: Vec<Vec<String>> = assignment
        .workspaces
        .iter()
        .map(|ws| {
            let action = if assignment.is_eligible(ws, no_paths) {
                color(Role::Success, "run", style)
            } else {
                color(Role::Dim, "skip", style)
            };
            vec![ws.workspace.clone(), action, shell_words::join(&ws.args)]
        })
        .collect();
    out.push_str(&table(
        &["WORKSPACE", "ACTION", "ARGS"],
        &rows,
        TableOpts {
            max_width: style.term_width,
            ..TableOpts::default()
        },
        style,
    ));
    if !assignment.stray_paths.is_empty() {
        out.push_str(&format!(
            "\n{} {}",
            emoji("warn", style),
            color(
                Role::Warning,
                format!("unassigned: {}", assignment.stray_paths.join(" ")),
                style
            )
        ));
    }
    out
}

fn print_plan(
    root: &Path,
    invocation: &Invocation,
    assignment: &Assignment,
    no_paths: NoPathsPolicy,
    json: bool,
) {
    if json {
        let v = plan_json(root, invocation, assignment, no_paths);
        println!(
            "{}",
            serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string())
        );
    } else {
        println!("{}", render_plan(invocation, assignment, no_paths, &StyleOptions::detect()));
    }
}

fn render_summary(outcomes: &[Outcome], code: i32, style: &StyleOptions) -> String {
    let rows: Vec<Vec<String>> = outcomes
        .iter()
        .map(|o| {
            let result = if o.status.is_success() {
                color(Role::Success, format!("{} {}", emoji("success", style), o.status), style)
            } else {
                color(Role::Error, format!("{} {}", emoji("error", style), o.status), style)
            };
            vec![o.workspace.clone(), result, format!("{} ms", o.elapsed_ms)]
        })
        .collect();
    let title = if code == 0 {
        color(Role::Success, "Summary", style)
    } else {
        color(Role::Error, "Summary", style)
    };
    format!(
        "{}\n{}",
        box_header(title, Some(format!("exit {code}")), style),
        table(&["WORKSPACE", "RESULT", "TIME"], &rows, TableOpts::default(), style)
    )
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Status;
    use clap::Parser;
    use std::fs;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn monorepo(dirs: &[&str]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("package.json"),
            r#"{ "private": true, "workspaces": ["packages/*"] }"#,
        )
        .unwrap();
        for d in dirs {
            fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        tmp
    }

    fn run_in(root: &Path, command: Option<&str>, args: &[&str]) -> RunArgs {
        RunArgs {
            command: command.map(str::to_string),
            root: Some(root.to_path_buf()),
            paths: Some(PathPolicy::Syntax),
            no_paths: Some(NoPathsPolicy::Skip),
            args: strings(args),
            ..RunArgs::default()
        }
    }

    #[test]
    fn clap_passes_unknown_flags_through() {
        let cli = TestCli::try_parse_from([
            "exec-ws", "-s", "jest", "packages/a/x.ts", "--watch", "-c", "ignored",
        ])
        .unwrap();
        assert!(cli.run.sequential);
        assert!(cli.run.command.is_none());
        assert_eq!(
            cli.run.args,
            strings(&["jest", "packages/a/x.ts", "--watch", "-c", "ignored"])
        );
    }

    #[test]
    fn clap_parses_command_and_policies() {
        let cli = TestCli::try_parse_from([
            "exec-ws",
            "-c",
            "npm run build",
            "--paths",
            "probe",
            "--no-paths",
            "all",
            "packages/a",
        ])
        .unwrap();
        assert_eq!(cli.run.command.as_deref(), Some("npm run build"));
        assert_eq!(cli.run.paths, Some(PathPolicy::Probe));
        assert_eq!(cli.run.no_paths, Some(NoPathsPolicy::All));
        assert_eq!(cli.run.args, strings(&["packages/a"]));
    }

    #[test]
    fn explicit_command_routes_workspace_root_to_dot() {
        let tmp = monorepo(&["packages/a", "packages/b"]);
        let root = fs::canonicalize(tmp.path()).unwrap();
        let inv = invocation::parse_invocation(Some("npm run build"), &strings(&["packages/a"]))
            .unwrap();
        let ws = workspace::discover(&root, &strings(&["packages/*"])).unwrap();
        let a = routing::assign(&inv.tokens, &ws, &root, PathPolicy::Syntax);
        let v = plan_json(&root, &inv, &a, NoPathsPolicy::Skip);
        assert_eq!(v["command"], "npm run build");
        assert_eq!(v["workspaces"][0]["workspace"], "packages/a");
        assert_eq!(v["workspaces"][0]["dispatch"], true);
        assert_eq!(
            v["workspaces"][0]["exec"],
            serde_json::json!(["run", "build", "."])
        );
        assert_eq!(v["workspaces"][1]["dispatch"], false);
    }

    #[test]
    fn render_plan_lists_every_workspace() {
        let inv = invocation::parse_invocation(
            None,
            &strings(&["yarn", "test", "packages/a/src/x.ts", "--watch", "./README.md"]),
        )
        .unwrap();
        let a = routing::assign(
            &inv.tokens,
            &strings(&["packages/a", "packages/b"]),
            Path::new("/repo"),
            PathPolicy::Syntax,
        );
        let out = render_plan(&inv, &a, NoPathsPolicy::Skip, &StyleOptions::plain());
        assert!(out.contains("Plan: yarn"));
        assert!(out.contains("1 of 2 workspace(s)"));
        assert!(out.contains("packages/a  run     test src/x.ts --watch"));
        assert!(out.contains("packages/b  skip    test --watch"));
        assert!(out.contains("unassigned: ./README.md"));
    }

    #[test]
    fn routing_decisions_report_skipped_workspaces() {
        let inv = invocation::parse_invocation(Some("npm run build"), &strings(&["packages/a"]))
            .unwrap();
        let a = routing::assign(
            &inv.tokens,
            &strings(&["packages/a", "packages/b"]),
            Path::new("/repo"),
            PathPolicy::Syntax,
        );
        assert_eq!(
            routing_decisions(&inv, &a, NoPathsPolicy::Skip),
            strings(&[
                "packages/a: dispatch `npm run build .`",
                "packages/b: skipped (no path argument routed here)",
            ])
        );
    }

    #[test]
    fn render_summary_marks_failures() {
        let outcomes = vec![
            Outcome {
                workspace: "packages/a".into(),
                status: Status::Exited(2),
                elapsed_ms: 5,
            },
            Outcome {
                workspace: "packages/b".into(),
                status: Status::Exited(0),
                elapsed_ms: 7,
            },
        ];
        let out = render_summary(&outcomes, 2, &StyleOptions::plain());
        assert!(out.contains("exit 2"));
        assert!(out.contains("packages/a   exit 2"));
        assert!(out.contains("packages/b   exit 0"));
    }

    #[test]
    fn missing_command_is_a_configuration_error() {
        let tmp = monorepo(&["packages/a"]);
        let err = execute_run(run_in(tmp.path(), None, &[])).unwrap_err();
        assert!(err.to_string().contains("no command given"));
    }

    #[test]
    fn missing_manifest_is_a_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = execute_run(run_in(tmp.path(), None, &["true", "x/y"])).unwrap_err();
        assert!(err.to_string().contains("no workspace manifest"));
    }

    #[test]
    fn nothing_matched_exits_zero() {
        let tmp = monorepo(&["packages/a"]);
        let code = execute_run(run_in(tmp.path(), None, &["false", "--flag"])).unwrap();
        assert_eq!(code, 0);
    }

    #[cfg(unix)]
    #[test]
    fn dry_run_launches_nothing() {
        let tmp = monorepo(&["packages/a"]);
        let mut args = run_in(tmp.path(), Some("touch marker"), &["packages/a"]);
        args.dry_run = true;
        assert_eq!(execute_run(args).unwrap(), 0);
        assert!(!tmp.path().join("packages/a/marker").exists());
    }

    #[cfg(unix)]
    #[test]
    fn aggregate_code_is_max_and_siblings_finish() {
        let tmp = monorepo(&["packages/a", "packages/b", "packages/c"]);
        fs::write(tmp.path().join("packages/a/fail"), "").unwrap();
        let code = execute_run(run_in(
            tmp.path(),
            Some("sh -c 'if [ -f fail ]; then exit 2; fi; touch ran'"),
            &["packages/a", "packages/b/src/index.ts"],
        ))
        .unwrap();
        assert_eq!(code, 2);
        assert!(tmp.path().join("packages/b/ran").exists());
        assert!(!tmp.path().join("packages/c/ran").exists());
    }

    #[cfg(unix)]
    #[test]
    fn no_paths_all_runs_everywhere() {
        let tmp = monorepo(&["packages/a", "packages/b"]);
        let mut args = run_in(tmp.path(), Some("touch ran"), &[]);
        args.no_paths = Some(NoPathsPolicy::All);
        args.sequential = true;
        assert_eq!(execute_run(args).unwrap(), 0);
        assert!(tmp.path().join("packages/a/ran").exists());
        assert!(tmp.path().join("packages/b/ran").exists());
    }

    #[test]
    fn list_needs_no_command() {
        let tmp = monorepo(&["packages/a"]);
        let mut args = run_in(tmp.path(), None, &[]);
        args.list = true;
        assert_eq!(execute_run(args).unwrap(), 0);
    }
}
