// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use colloquy_config::Mode;

/// Turn-driven orchestrator for multi-party LLM conversations.
#[derive(Debug, Parser)]
#[command(name = "colloquy", version, about)]
pub struct Cli {
    /// Path to the discussion config file (YAML).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for transcripts, fatal-error reports and arbiter verdicts.
    #[arg(long, global = true, default_value = ".")]
    pub output_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one conversation in the configured (or overridden) mode.
    Run {
        /// Override the mode from the config file.
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Override the number of rounds.
        #[arg(long)]
        rounds: Option<u32>,
        /// Attach a file (image / text / code / video) to the first human turn.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Skip the pre-run connection probes.
        #[arg(long)]
        skip_validation: bool,
    },
    /// Drive all three modes back-to-back and hand the transcripts to the arbiter.
    Compare {
        /// Override the number of rounds for every sub-run.
        #[arg(long)]
        rounds: Option<u32>,
        /// Attach a file to the first human turn of every sub-run.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List supported model backends and their credential sources.
    ListBackends,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
