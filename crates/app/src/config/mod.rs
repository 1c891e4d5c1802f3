//! Application configuration
//!
//! Every setting can come from a flag or an environment variable; `.env` is loaded
//! before parsing.

use clap::Args;

pub mod images;
pub mod observability;
pub mod session;
pub mod vision;

pub use images::ImageConfig;
pub use observability::{LogFormat, LoggingConfig};
pub use session::SessionConfig;
pub use vision::VisionArgs;

/// Settings shared by every subcommand.
#[derive(Debug, Args)]
pub struct AppConfig {
    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Vision endpoint settings.
    #[command(flatten)]
    pub vision: VisionArgs,

    /// Image compression settings.
    #[command(flatten)]
    pub images: ImageConfig,

    /// Local session storage settings.
    #[command(flatten)]
    pub session: SessionConfig,
}
