// CLI module
// Argument definitions and command dispatch

mod commands;
mod progress;

pub use commands::{build_manager, run, start_manager};
pub use progress::DownloadBar;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::Modality;

/// neural-platform - try text and image models from the command line
///
/// Examples:
///   neural-platform models                       # List the catalog
///   neural-platform chat --model GPT-4o-mini hi  # One-shot chat
///   neural-platform image --model FLUX.1-dev "a red fox" --output fox.png
///   neural-platform probe --metrics              # Hardware + metrics
#[derive(Debug, Parser)]
#[command(
    name = "neural-platform",
    about = "Load AI models on demand and talk to them",
    version = env!("CARGO_PKG_VERSION"),
    arg_required_else_help = true,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file path (default: ~/.neural-platform/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List available models
    Models {
        /// Only show models of this kind
        #[arg(long, value_enum)]
        modality: Option<Modality>,
    },

    /// Chat with a text model
    ///
    /// With no prompt, reads one prompt per line from stdin.
    Chat {
        /// Model identifier (see `models`)
        #[arg(short, long)]
        model: String,

        /// Prompt words
        prompt: Vec<String>,
    },

    /// Generate an image
    Image {
        /// Model identifier (see `models`)
        #[arg(short, long)]
        model: String,

        prompt: String,

        /// Write the PNG here instead of printing the data URL
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Report host resources and accelerator support
    Probe {
        /// Also print Prometheus metrics
        #[arg(long)]
        metrics: bool,
    },
}
