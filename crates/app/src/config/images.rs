//! Image Config

use agrimarket::compression::{CompressionOptions, DEFAULT_TARGET_KB};
use clap::Args;

/// Image compression settings.
#[derive(Debug, Args)]
pub struct ImageConfig {
    /// Size budget for uploaded images, in KiB
    #[arg(
        long,
        env = "IMAGE_TARGET_KB",
        default_value_t = DEFAULT_TARGET_KB,
        value_parser = parse_target_kb
    )]
    pub image_target_kb: usize,
}

impl ImageConfig {
    /// Compression settings using this budget.
    #[must_use]
    pub fn compression(&self) -> CompressionOptions {
        CompressionOptions {
            target_kb: self.image_target_kb,
            ..CompressionOptions::default()
        }
    }
}

/// Parse a size budget in KiB, rejecting zero.
///
/// # Errors
///
/// Returns a message when the value is not a positive integer.
pub fn parse_target_kb(value: &str) -> Result<usize, String> {
    let target = value
        .parse::<usize>()
        .map_err(|error| format!("invalid size: {error}"))?;

    if target == 0 {
        return Err("size budget must be at least 1 KiB".to_string());
    }

    Ok(target)
}
