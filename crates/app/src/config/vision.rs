//! Vision Config

use clap::Args;

use crate::analysis::{DEFAULT_VISION_API_URL, DEFAULT_VISION_MODEL, VisionConfig};

/// Vision endpoint settings.
#[derive(Debug, Args)]
pub struct VisionArgs {
    /// API key for the vision endpoint
    #[arg(long, env = "VISION_API_KEY", hide_env_values = true)]
    pub vision_api_key: Option<String>,

    /// Chat-completions URL of the vision endpoint
    #[arg(long, env = "VISION_API_URL", default_value = DEFAULT_VISION_API_URL)]
    pub vision_api_url: String,

    /// Vision model name
    #[arg(long, env = "VISION_MODEL", default_value = DEFAULT_VISION_MODEL)]
    pub vision_model: String,
}

impl VisionArgs {
    /// Client configuration from these arguments.
    #[must_use]
    pub fn client_config(&self) -> VisionConfig {
        VisionConfig {
            api_url: self.vision_api_url.clone(),
            api_key: self.vision_api_key.clone(),
            model: self.vision_model.clone(),
        }
    }
}
