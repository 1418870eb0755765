// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aurelia CLI
//!
//! Thin surface over the engine: parses flags, resolves the project
//! root, and translates subcommands to engine operations. All policy
//! lives in `aurelia-engine`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aurelia", version, about = "Autonomous code-improvement runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the .aurelia/ skeleton in the current directory
    Init,
    /// Run the heartbeat engine in the foreground
    Start {
        /// Use the scripted mock LLM and a plain process sandbox
        #[arg(long)]
        mock: bool,
    },
    /// Ask the running engine to drain and stop
    Stop,
    /// Print a one-shot projection of the event log
    Status,
    /// Follow the event log until the runtime stops
    Monitor,
    /// Summarize candidates, failures, and the best result
    Report,
}

fn main() {
    let cli = Cli::parse();

    let root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: cannot determine working directory: {e}");
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Command::Init => commands::init::run(&root),
        Command::Start { mock } => commands::start::run(&root, mock),
        Command::Stop => commands::stop::run(&root),
        Command::Status => commands::status::run(&root),
        Command::Monitor => commands::monitor::run(&root),
        Command::Report => commands::report::run(&root),
    };
    std::process::exit(code);
}
