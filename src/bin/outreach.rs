//! Runs the outreach pipeline once over the configured sheet.
//! Run with: cargo run --bin outreach

use std::process::ExitCode;

use outreach_agent::start_outreach_agent;

fn main() -> ExitCode {
    start_outreach_agent::run_once()
}
