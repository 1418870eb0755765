// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `aurelia start`: run the heartbeat engine in the foreground

use aurelia_adapters::{
    ChatResponse, ContainerSandbox, GeminiClient, GitWorktrees, LlmClient, MockLlm,
    ProcessSandbox, Sandbox,
};
use aurelia_core::WorkflowConfig;
use aurelia_engine::{signal::spawn_signal_handler, Engine, EngineDeps, ProjectLayout};
use std::path::Path;
use tracing::{info, warn};

pub fn run(root: &Path, mock: bool) -> i32 {
    setup_logging();

    let layout = ProjectLayout::new(root.to_owned());
    if !layout.is_initialized() {
        eprintln!("not initialized: run `aurelia init` first");
        return 1;
    }

    // config_invalid is fatal before any event is written.
    let config = match WorkflowConfig::load(&layout.config_path()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: cannot start async runtime: {e}");
            return 1;
        }
    };

    runtime.block_on(async {
        let worktrees = GitWorktrees::new(root.to_owned(), layout.worktrees_dir());
        if mock {
            let llm = MockLlm::new();
            llm.set_fallback(ChatResponse::done("mock run: leaving the project as is"));
            info!("starting with mock LLM and process sandbox");
            drive(layout, config, worktrees, ProcessSandbox::new(), llm).await
        } else {
            let llm = match GeminiClient::from_env(&config.coder.model) {
                Ok(llm) => llm,
                Err(e) => {
                    eprintln!("error: {e}");
                    return 1;
                }
            };
            let sandbox = ContainerSandbox::new(&config.sandbox.image);
            drive(layout, config, worktrees, sandbox, llm).await
        }
    })
}

async fn drive<S, L>(
    layout: ProjectLayout,
    config: WorkflowConfig,
    worktrees: GitWorktrees,
    sandbox: S,
    llm: L,
) -> i32
where
    S: Sandbox,
    L: LlmClient,
{
    if let Err(e) = layout.write_pid() {
        eprintln!("error: cannot write pid file: {e}");
        return 1;
    }

    let engine = Engine::new(
        config,
        layout.clone(),
        EngineDeps {
            worktrees,
            sandbox,
            llm,
        },
    );
    if let Err(e) = spawn_signal_handler(engine.shutdown_token()) {
        warn!(error = %e, "cannot install signal handlers");
    }

    let result = engine.run().await;
    layout.remove_pid();

    match result {
        Ok(reason) => {
            info!(%reason, "engine stopped");
            println!("stopped: {reason}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
