/*!
Command layer.

  run.rs     RunArgs + execute_run (the whole route-and-dispatch flow)
  format.rs  color / box / table helpers for human output

Conventions:
  - `execute_run` returns `anyhow::Result<i32>`: Err for configuration
    problems, Ok(code) for the aggregated dispatch result.
  - Argument structs derive `clap::Args` and are flattened into `main::Cli`.
*/

pub mod format;
pub mod run;

pub use run::{RunArgs, execute_run};
