use anyhow::Result;
use clap::Parser;

mod cmd;
mod dispatch;
mod invocation;
mod routing;
mod utils;
mod workspace;

use cmd::RunArgs;

/// exec-ws - run one command across monorepo workspaces
///
/// Path-like arguments are routed to the workspace that contains them and
/// rewritten relative to that workspace's root; every other argument is
/// forwarded unchanged. The command runs (concurrently) only in workspaces
/// that received at least one path.
///
/// Usage:
///   exec-ws <program> [args...]
///   exec-ws -c "<command string>" [paths...]
///
/// Global flags / env:
///   -v / -vv          Increase verbosity
///   -q / --quiet      Errors only
///   EXEC_WS_COMMAND   Fallback for --command
///   EXEC_WS_ROOT      Fallback for --root (default: current directory)
///   EXEC_WS_PATHS     Fallback for --paths (syntax|probe)
///   EXEC_WS_NO_PATHS  Fallback for --no-paths (skip|all)
///
/// Examples:
///   exec-ws jest packages/a/src/x.test.ts --watch
///       -> packages/a: jest src/x.test.ts --watch
///   exec-ws -c "npm run build" packages/a packages/b/src
///       -> packages/a: npm run build .
///       -> packages/b: npm run build src
///   exec-ws --dry-run --json eslint packages/*/src
///   exec-ws -c "npm test" --no-paths all
#[derive(Parser, Debug)]
#[command(
    name = "exec-ws",
    version,
    author,
    about = "exec-ws - route path arguments to monorepo workspaces and run a command in each",
    propagate_version = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long)]
    quiet: bool,

    #[command(flatten)]
    run: RunArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (machine-readable output keeps stdout clean)
    let level = if cli.run.json {
        utils::LogLevel::Error
    } else {
        utils::derive_level(cli.verbose, cli.quiet)
    };
    utils::init_logging(level);

    let code = cmd::execute_run(cli.run)?;
    std::process::exit(code);
}
