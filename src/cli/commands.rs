// Command handlers

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::progress::DownloadBar;
use super::{Cli, Command};
use crate::catalog::Catalog;
use crate::config::{load_config, Config};
use crate::encoding::decode_data_url;
use crate::engine::{
    ImageEngineLoader, Modality, OpenAiTextLoader, SimulatedImageLoader, SimulatedTextLoader,
    TextEngineLoader,
};
use crate::hardware::HostSummary;
use crate::session::ModelSessionManager;

/// Execute a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Models { modality } => {
            list_models(modality);
            Ok(())
        }
        Command::Chat { model, prompt } => {
            let manager = start_manager(&config).await?;
            chat(&manager, &model, prompt).await
        }
        Command::Image {
            model,
            prompt,
            output,
        } => {
            let manager = start_manager(&config).await?;
            image(&manager, &model, &prompt, output.as_deref()).await
        }
        Command::Probe { metrics } => {
            let manager = start_manager(&config).await?;
            probe(&manager, metrics).await
        }
    }
}

/// Compose the manager from config: the HTTP backend when one is configured,
/// otherwise offline demo engines
pub fn build_manager(config: &Config) -> Result<ModelSessionManager> {
    let text_loader: Arc<dyn TextEngineLoader> = match OpenAiTextLoader::from_config(&config.backend)? {
        Some(loader) => {
            tracing::info!("Using text backend at {}", loader.base_url());
            Arc::new(loader)
        }
        None => {
            tracing::warn!("No backend.base_url configured, using offline demo engines");
            Arc::new(SimulatedTextLoader::new())
        }
    };
    let image_loader: Arc<dyn ImageEngineLoader> = Arc::new(SimulatedImageLoader::new());

    ModelSessionManager::builder(text_loader, image_loader)
        .config(config)
        .build()
}

/// Build the manager and run the accelerator check once, so every command
/// starts with the cached result logged
pub async fn start_manager(config: &Config) -> Result<ModelSessionManager> {
    let manager = build_manager(config)?;
    manager.check_accelerated_support().await;
    Ok(manager)
}

fn list_models(modality: Option<Modality>) {
    let models: Vec<_> = match modality {
        Some(modality) => Catalog::by_modality(modality).collect(),
        None => Catalog::all().iter().collect(),
    };

    println!("{:<22} {:<6} {:>6}  DESCRIPTION", "MODEL", "KIND", "SIZE");
    for model in models {
        println!(
            "{:<22} {:<6} {:>6}  {}",
            model.id, model.modality, model.size, model.description
        );
    }
}

fn warn_if_unknown(model_id: &str, modality: Modality) {
    match Catalog::find(model_id) {
        Some(descriptor) if descriptor.modality != modality => tracing::warn!(
            "{} is listed as a {} model, using it for {} anyway",
            model_id,
            descriptor.modality,
            modality
        ),
        Some(_) => {}
        None => tracing::warn!("{} is not in the catalog", model_id),
    }
}

async fn chat(manager: &ModelSessionManager, model_id: &str, prompt: Vec<String>) -> Result<()> {
    warn_if_unknown(model_id, Modality::Text);

    let bar = DownloadBar::new(model_id);
    manager.set_download_callback(model_id, bar.callback());

    if !prompt.is_empty() {
        let reply = manager.generate_text(model_id, &prompt.join(" ")).await;
        bar.clear();
        println!("{}", reply);
    } else {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let reply = manager.generate_text(model_id, line).await;
            bar.clear();
            println!("{}", reply);
        }
    }

    manager.remove_download_callback(model_id);
    Ok(())
}

async fn image(
    manager: &ModelSessionManager,
    model_id: &str,
    prompt: &str,
    output: Option<&Path>,
) -> Result<()> {
    warn_if_unknown(model_id, Modality::Image);

    let bar = DownloadBar::new(model_id);
    manager.set_download_callback(model_id, bar.callback());
    let result = manager.generate_image(model_id, prompt).await;
    bar.clear();
    manager.remove_download_callback(model_id);

    let data_url = result?;
    match output {
        Some(path) => {
            let png = decode_data_url(&data_url)?;
            tokio::fs::write(path, &png)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Wrote {} ({} bytes)", path.display(), png.len());
        }
        None => println!("{}", data_url),
    }

    Ok(())
}

async fn probe(manager: &ModelSessionManager, show_metrics: bool) -> Result<()> {
    let summary = HostSummary::collect(manager.capability_probe()).await;
    println!("{}", summary.format_status());

    if show_metrics {
        print!("{}", manager.metrics().render()?);
    }

    Ok(())
}
