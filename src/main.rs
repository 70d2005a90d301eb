//! gantt - dependency-aware scheduling for Gantt plans

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = gantt_graph::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
