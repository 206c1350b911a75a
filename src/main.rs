// neural-platform - main entry point

use anyhow::Result;
use clap::Parser;

use neural_platform::cli::{self, Cli};
use neural_platform::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose)?;

    cli::run(cli).await
}
