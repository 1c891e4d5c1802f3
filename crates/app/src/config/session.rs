//! Session Config

use std::path::PathBuf;

use clap::Args;

/// Local session storage settings.
#[derive(Debug, Args)]
pub struct SessionConfig {
    /// File the last resolved role is cached in
    #[arg(long, env = "ROLE_CACHE_PATH", default_value = ".agrimarket/role.json")]
    pub role_cache_path: PathBuf,
}
