use std::path::PathBuf;

use agrimarket::compression::{CompressionOptions, compress_image};
use agrimarket_app::config::{AppConfig, images::parse_target_kb};
use clap::Args;
use tokio::{fs, task};

#[derive(Debug, Args)]
pub(crate) struct CompressArgs {
    /// Image to compress (JPEG, PNG or WebP)
    input: PathBuf,

    /// Where to write the compressed JPEG
    output: PathBuf,

    /// Size budget in KiB; defaults to IMAGE_TARGET_KB
    #[arg(long, value_parser = parse_target_kb)]
    target_kb: Option<usize>,
}

pub(crate) async fn run(args: CompressArgs, config: &AppConfig) -> Result<(), String> {
    let bytes = fs::read(&args.input)
        .await
        .map_err(|error| format!("failed to read {}: {error}", args.input.display()))?;

    let options = CompressionOptions {
        target_kb: args.target_kb.unwrap_or(config.images.image_target_kb),
        ..config.images.compression()
    };

    let original_len = bytes.len();

    let compressed = task::spawn_blocking(move || compress_image(&bytes, &options))
        .await
        .map_err(|error| format!("compression task failed: {error}"))?
        .map_err(|error| format!("failed to compress image: {error}"))?;

    fs::write(&args.output, &compressed.jpeg)
        .await
        .map_err(|error| format!("failed to write {}: {error}", args.output.display()))?;

    println!("output: {}", args.output.display());
    println!("dimensions: {}x{}", compressed.width, compressed.height);
    println!("quality: {}", compressed.quality);
    println!("bytes: {original_len} -> {}", compressed.jpeg.len());
    println!("data_url_len: {}", compressed.data_url_len());
    println!("within_budget: {}", compressed.within_budget);

    Ok(())
}
