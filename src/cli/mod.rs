//! CLI module for openattr
//!
//! Provides command-line interface for:
//! - run: Enumerate a scenario and print its rows
//! - explain: Show strategies, radices and the operator tree
//! - cost: Evaluate the cost function

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    cost, evaluate_cost, execute, explain, explain_scenario, run, run_command, run_scenario,
    Scenario,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_json_file, write_json_lines, write_lines, write_text};
