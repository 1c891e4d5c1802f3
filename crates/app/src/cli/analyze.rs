use std::path::PathBuf;

use agrimarket::{
    analysis::AnalysisRequest,
    compression::compress_data_url_or_original,
    data_url::{self, sniff_image_mime},
};
use agrimarket_app::{
    analysis::{VisionClient, WasteClassifier, classify_or_fallback},
    config::AppConfig,
};
use clap::Args;
use tokio::{fs, task};

#[derive(Debug, Args)]
pub(crate) struct AnalyzeArgs {
    /// Photo of the waste
    image: PathBuf,

    /// Where the waste is stored
    #[arg(long, default_value = "Not Specified")]
    location: String,

    /// Reported quantity
    #[arg(long, default_value = "1")]
    quantity: String,

    /// Print the generic fallback result instead of failing when classification fails
    #[arg(long)]
    fallback: bool,
}

pub(crate) async fn run(args: AnalyzeArgs, config: &AppConfig) -> Result<(), String> {
    let bytes = fs::read(&args.image)
        .await
        .map_err(|error| format!("failed to read {}: {error}", args.image.display()))?;

    let options = config.images.compression();

    let image_url = task::spawn_blocking(move || {
        let original = data_url::encode(sniff_image_mime(&bytes), &bytes);

        compress_data_url_or_original(&original, &options)
    })
    .await
    .map_err(|error| format!("compression task failed: {error}"))?;

    let request = AnalysisRequest {
        file_name: args
            .image
            .file_name()
            .map_or_else(String::new, |name| name.to_string_lossy().into_owned()),
        location: args.location,
        quantity: args.quantity,
    };

    let client = VisionClient::new(config.vision.client_config());

    let analysis = if args.fallback {
        classify_or_fallback(&client, &image_url, &request).await
    } else {
        client
            .classify(&image_url, &request)
            .await
            .map_err(|error| format!("failed to classify image: {error}"))?
    };

    let output = serde_json::to_string_pretty(&analysis)
        .map_err(|error| format!("failed to render analysis: {error}"))?;

    println!("{output}");

    Ok(())
}
