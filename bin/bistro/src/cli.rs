use std::path::PathBuf;

use bistro_infra::DEFAULT_APP_NAME;
use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "bistro")]
#[command(
    author,
    version,
    about = "Synthesize the restaurant-finder agent's cloud infrastructure"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "BISTRO_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Application name; prefixes stack names, resource names, and exports.
    #[arg(short, long, visible_alias = "app", env = "BISTRO_APP_NAME", default_value = DEFAULT_APP_NAME)]
    pub app_name: String,

    /// Deployment region.
    #[arg(long, env = "BISTRO_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Deployment account id (12 digits).
    ///
    /// Required unless a configuration file is supplied via --config.
    #[arg(long, env = "BISTRO_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Pre-built agent image URI.
    ///
    /// If not provided, a registry stack is synthesized and the runtime is
    /// wired to the registry's default tag. If provided, the registry step is
    /// skipped and the runtime deploys against this existing artifact.
    #[arg(long, alias = "image", env = "BISTRO_IMAGE_URI")]
    pub image_uri: Option<String>,

    /// Path to an externally maintained tool schema document.
    ///
    /// If not provided, the bundled restaurant-search schema is embedded.
    #[arg(long, env = "BISTRO_TOOL_SCHEMA")]
    pub tool_schema: Option<PathBuf>,

    /// The path to the output directory for templates and the manifest.
    #[arg(long, alias = "out", env = "BISTRO_OUTDATA", default_value = "out")]
    pub outdata: PathBuf,

    /// Path to an existing Bistro.toml configuration file to load.
    ///
    /// When provided, the synthesis will use the context from this file
    /// (with BISTRO_-prefixed environment overrides) instead of building one
    /// from CLI arguments.
    #[arg(long, alias = "conf", env = "BISTRO_CONFIG")]
    pub config: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["bistro"]);
        assert_eq!(cli.app_name, DEFAULT_APP_NAME);
        assert_eq!(cli.region, "us-east-1");
        assert!(cli.image_uri.is_none());
        assert_eq!(cli.outdata, PathBuf::from("out"));
    }

    #[test]
    fn test_image_alias() {
        let cli = Cli::parse_from(["bistro", "--image", "repo/agent:v2", "--account-id", "123456789012"]);
        assert_eq!(cli.image_uri.as_deref(), Some("repo/agent:v2"));
    }
}
