use agrimarket_app::{config::AppConfig, observability};
use clap::{Parser, Subcommand};

mod analyze;
mod compress;
mod demo;

#[derive(Debug, Parser)]
#[command(name = "agrimarket-app", about = "Agrimarket CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compress an image the way uploads are compressed
    Compress(compress::CompressArgs),

    /// Classify the agricultural waste shown in an image
    Analyze(analyze::AnalyzeArgs),

    /// Run a farmer and buyer round trip over in-memory backends
    Demo,
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        observability::init_logging(&self.config.logging)
            .map_err(|error| format!("failed to initialise logging: {error}"))?;

        match self.command {
            Commands::Compress(args) => compress::run(args, &self.config).await,
            Commands::Analyze(args) => analyze::run(args, &self.config).await,
            Commands::Demo => demo::run(&self.config).await,
        }
    }
}
