// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::api::{start_server, AppState};
use crate::config::{ConfigOverrides, ModerationConfig};
use crate::moderation::{ModerationPipeline, VerdictComposer};
use crate::version;
use crate::vision::ModerationModels;

/// Fabstir Moderation Node
///
/// Flags given before the subcommand override the config file.
#[derive(Parser, Debug)]
#[command(name = "fabstir-moderation-node")]
#[command(version = version::VERSION_NUMBER)]
#[command(about = "Image moderation service: face detection and NSFW scoring", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "MODERATION_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API (default)
    Serve,

    /// Analyze one image and print the verdict as JSON
    Check {
        /// Image file to analyze
        image: PathBuf,
    },
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = ModerationConfig::load(cli.config.as_deref(), &cli.overrides)?;
    info!("{}", version::get_version_string());

    let models = ModerationModels::load(&config)
        .await
        .context("Failed to load moderation models")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, models).await,
        Commands::Check { image } => check(config, models, image).await,
    }
}

async fn serve(config: ModerationConfig, models: ModerationModels) -> Result<()> {
    info!(
        "Serving with threshold {} and {} NSFW backend",
        config.verdict.threshold, config.nsfw.backend
    );
    let state = AppState::new(models, &config);
    start_server(&config, state).await
}

async fn check(config: ModerationConfig, models: ModerationModels, image: PathBuf) -> Result<()> {
    let bytes = tokio::fs::read(&image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;

    let pipeline = ModerationPipeline::from_models(&models, VerdictComposer::new(config.verdict.threshold))
        .with_max_image_bytes(config.server.max_upload_bytes)
        .with_max_image_pixels(config.server.max_image_pixels);

    let verdict = tokio::task::spawn_blocking(move || pipeline.analyze(&bytes, None))
        .await
        .context("Analysis task failed")??;

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}
