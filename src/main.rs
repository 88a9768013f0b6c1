// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use colloquy_config::Mode;
use colloquy_core::{
    persist_verdict, write_transcript, Arbiter, ConversationManager, ModeHistories, RunContext,
};
use colloquy_model::{list_backends, Message};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            mode,
            rounds,
            file,
            skip_validation,
        } => {
            run_single(
                cli.config.as_deref(),
                &cli.output_dir,
                mode,
                rounds,
                file.as_deref(),
                skip_validation,
            )
            .await
        }
        Command::Compare { rounds, file } => {
            run_comparison(cli.config.as_deref(), &cli.output_dir, rounds, file.as_deref()).await
        }
        Command::ListBackends => {
            print_backends();
            Ok(())
        }
    }
}

fn load_manager(config: Option<&Path>, output_dir: &Path) -> anyhow::Result<ConversationManager> {
    let config = colloquy_config::load(config).context("loading discussion config")?;
    Ok(ConversationManager::new(config).with_output_dir(output_dir))
}

/// CLI `--file` wins; otherwise the config's `input_file` applies.
fn resolve_input_file(
    cli_file: Option<&Path>,
    manager: &ConversationManager,
) -> Option<std::path::PathBuf> {
    cli_file
        .map(Path::to_path_buf)
        .or_else(|| manager.config().input_file.clone().map(Into::into))
}

async fn run_single(
    config: Option<&Path>,
    output_dir: &Path,
    mode_override: Option<Mode>,
    rounds_override: Option<u32>,
    file: Option<&Path>,
    skip_validation: bool,
) -> anyhow::Result<()> {
    let mut manager = load_manager(config, output_dir)?;
    let mut ctx = manager.resolve_run_context()?;
    if let Some(mode) = mode_override {
        ctx.mode = mode;
    }
    if let Some(rounds) = rounds_override {
        ctx.rounds = rounds;
    }
    // --file wins over the config's input_file.
    let file = resolve_input_file(file, &manager);

    if !skip_validation
        && !manager
            .validate_connections(&[ctx.human_model.as_str(), ctx.ai_model.as_str()])
            .await
    {
        warn!("connection validation failed for at least one model; continuing anyway");
    }

    let history = drive(&mut manager, &ctx, file.as_deref()).await?;
    let path = write_transcript(
        output_dir,
        &history,
        ctx.mode,
        &ctx.goal,
        &ctx.human_model,
        &ctx.ai_model,
    )?;
    println!("{}", path.display());
    Ok(())
}

async fn run_comparison(
    config: Option<&Path>,
    output_dir: &Path,
    rounds_override: Option<u32>,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let mut manager = load_manager(config, output_dir)?;
    let mut ctx = manager.resolve_run_context()?;
    if let Some(rounds) = rounds_override {
        ctx.rounds = rounds;
    }
    let file = resolve_input_file(file, &manager);

    // Three independent sub-runs over the same goal and participants.
    let mut histories = ModeHistories::default();
    for mode in Mode::all() {
        let mut sub_ctx = ctx.clone();
        sub_ctx.mode = mode;
        info!(%mode, "starting comparison sub-run");
        let history = drive(&mut manager, &sub_ctx, file.as_deref()).await?;
        let path = write_transcript(
            output_dir,
            &history,
            mode,
            &sub_ctx.goal,
            &sub_ctx.human_model,
            &sub_ctx.ai_model,
        )?;
        println!("{}", path.display());
        match mode {
            Mode::AiAi => histories.ai_ai = history,
            Mode::HumanAiAi => histories.human_aiai = history,
            Mode::NoMetaPrompting => histories.no_meta_prompting = history,
        }
    }

    let verdict = TranscriptStatsArbiter
        .evaluate(&ctx.goal, &histories)
        .await
        .context("arbiter evaluation failed")?;
    let path = persist_verdict(output_dir, &verdict)?;
    println!("{}", path.display());
    Ok(())
}

async fn drive(
    manager: &mut ConversationManager,
    ctx: &RunContext,
    file: Option<&Path>,
) -> anyhow::Result<Vec<Message>> {
    let history = match file {
        Some(path) => {
            manager
                .run_conversation_with_file(
                    &ctx.goal,
                    &ctx.human_model,
                    &ctx.ai_model,
                    ctx.mode,
                    None,
                    None,
                    ctx.rounds,
                    path,
                )
                .await?
        }
        None => {
            manager
                .run_conversation(
                    &ctx.goal,
                    &ctx.human_model,
                    &ctx.ai_model,
                    ctx.mode,
                    None,
                    None,
                    ctx.rounds,
                )
                .await?
        }
    };
    Ok(history)
}

fn print_backends() {
    for meta in list_backends() {
        let key = match meta.api_key_env {
            Some(env) => format!("key: ${env}"),
            None => "no key required".to_string(),
        };
        let url = meta.default_base_url.unwrap_or("-");
        println!("{:<10} {:<12} {key:<28} {url:<45} {}", meta.id, meta.name, meta.description);
    }
}

/// Minimal built-in arbiter: per-mode transcript statistics.
///
/// The evaluation stage is an external collaborator – any scoring
/// implementation can be swapped in behind the [`Arbiter`] trait; the engine
/// only persists the opaque verdict.
struct TranscriptStatsArbiter;

#[async_trait::async_trait]
impl Arbiter for TranscriptStatsArbiter {
    async fn evaluate(
        &self,
        goal: &str,
        histories: &ModeHistories,
    ) -> anyhow::Result<serde_json::Value> {
        fn stats(history: &[Message]) -> serde_json::Value {
            let turns = history
                .iter()
                .filter(|m| m.role != colloquy_model::Role::System)
                .count();
            let chars: usize = history.iter().map(|m| m.content.len()).sum();
            serde_json::json!({ "turns": turns, "chars": chars })
        }
        Ok(serde_json::json!({
            "goal": goal,
            "modes": {
                "ai-ai": stats(&histories.ai_ai),
                "human-aiai": stats(&histories.human_aiai),
                "no-meta-prompting": stats(&histories.no_meta_prompting),
            },
        }))
    }
}
