//! Control server binary: starts, streams and terminates pipeline runs.
//! Run with: cargo run --bin outreach-server

use std::process::ExitCode;

use outreach_agent::start_outreach_agent;

fn main() -> ExitCode {
    start_outreach_agent::run()
}
