//! Glowii CLI: run the product photo enhancement workflow from the command line.
//!
//! Set GLOWII_API_URL (or API_URL) to point at the enhancement service.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use glowii_api_client::ApiClient;
use glowii_cli::{init_tracing, SessionSummary};
use glowii_compositor::{OverlaySource, TextPatch};
use glowii_core::ClientConfig;
use glowii_workflow::{SelectedFile, Workflow};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "glowii", about = "Glowii product image enhancement CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackgroundColor {
    White,
    Black,
}

impl BackgroundColor {
    fn as_str(self) -> &'static str {
        match self {
            BackgroundColor::White => "white",
            BackgroundColor::Black => "black",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the enhancement service is reachable
    Health,
    /// Enhance a product photo and download the chosen option
    Enhance {
        /// Path to the product photo
        file: PathBuf,
        /// Option to keep (1-based)
        #[arg(long, default_value = "1")]
        option: usize,
        /// Background color of the enhanced image
        #[arg(long, value_enum, default_value = "white")]
        background: BackgroundColor,
        /// Generate the background from this prompt instead of a color
        #[arg(long)]
        background_prompt: Option<String>,
        /// Skip title generation
        #[arg(long)]
        no_title: bool,
        /// Skip description generation
        #[arg(long)]
        no_description: bool,
        /// Watermark text drawn over the chosen image
        #[arg(long)]
        watermark_text: Option<String>,
        /// SVG logo drawn over the chosen image
        #[arg(long)]
        watermark_svg: Option<PathBuf>,
        /// Output directory (defaults to GLOWII_DOWNLOAD_DIR)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Search for similar products using the generated copy
        #[arg(long)]
        search: bool,
    },
    /// Search for similar products
    Search {
        /// Search query
        query: String,
    },
    /// Generate a background image from a prompt
    Background {
        /// Description of the background
        prompt: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Health => {
            let client = ApiClient::from_config(&config)?;
            let status = client.health_check().await?;
            print_json(&status)?;
        }
        Commands::Search { query } => {
            let client = ApiClient::from_config(&config)?;
            let response = client.search_products(&query).await?;
            print_json(&response)?;
        }
        Commands::Background { prompt } => {
            let client = ApiClient::from_config(&config)?;
            let generated = client.generate_background_image(&prompt).await?;
            print_json(&serde_json::json!({
                "file_path": generated.file_path,
                "public_url": generated.public_url,
                "file_name": generated.file_name,
            }))?;
        }
        Commands::Enhance {
            file,
            option,
            background,
            background_prompt,
            no_title,
            no_description,
            watermark_text,
            watermark_svg,
            out,
            search,
        } => {
            if option == 0 {
                anyhow::bail!("--option is 1-based");
            }
            if let Some(out) = out {
                config.download_dir = out;
            }
            let workflow = Workflow::from_config(config)?;

            let mode = workflow.check_health().await;
            tracing::info!(?mode, "Service mode");

            workflow.set_copy_generation(!no_title, !no_description)?;
            match background_prompt {
                Some(prompt) => {
                    workflow.generate_background(&prompt).await?;
                }
                None => workflow.set_background_color(background.as_str())?,
            }

            let selected = SelectedFile::from_path(&file).await?;
            workflow.select_file(selected).await?;
            workflow.begin_enhancement().await?;
            workflow.select_option(option - 1).await?;

            if watermark_text.is_some() || watermark_svg.is_some() {
                workflow.open_compositor()?;
                if let Some(text) = watermark_text {
                    workflow.edit_compositor(|c| c.set_text(TextPatch::text(text)))?;
                }
                if let Some(svg) = watermark_svg {
                    let bytes = tokio::fs::read(&svg)
                        .await
                        .with_context(|| format!("Failed to read {}", svg.display()))?;
                    let name = svg
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("logo.svg")
                        .to_string();
                    workflow
                        .edit_compositor(|c| c.load_vector_overlay(OverlaySource::new(name, bytes)))?;
                }
                workflow.apply_watermark()?;
            }

            let path = workflow.download().await?;
            if search {
                workflow.search_similar_products().await?;
            }

            let session = workflow.snapshot();
            print_json(&serde_json::json!({
                "downloaded": path,
                "session": SessionSummary::from(&session),
            }))?;
        }
    }

    Ok(())
}
