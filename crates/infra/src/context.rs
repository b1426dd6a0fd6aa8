//! The deployment context: external input read once at startup.
//!
//! The context is populated before composition begins (from CLI flags, the
//! environment, or a `Bistro.toml`), passed by value into the composition
//! root, and discarded once the resource graph is emitted. Nothing in the
//! library mutates it.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// The default name for the bistro configuration file.
pub const BISTRO_CONF_FILENAME: &str = "Bistro.toml";

/// Default application name.
pub const DEFAULT_APP_NAME: &str = "restaurant-finder";

/// Default partition for composed resource patterns.
pub const DEFAULT_PARTITION: &str = "aws";

fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

/// Everything the composition root needs to decide which stacks to
/// instantiate and how to wire them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployContext {
    /// Application name; prefixes stack names, resource names, and exports.
    pub app_name: String,
    /// Deployment region.
    pub region: String,
    /// Deployment account id (12 digits).
    pub account_id: String,
    /// Partition for composed resource patterns.
    #[serde(default = "default_partition")]
    pub partition: String,

    /// Pre-built agent image URI. Absence is the common case for a
    /// from-scratch deployment; presence means "skip the registry and deploy
    /// against this existing artifact".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,

    /// Override path for the externally maintained tool schema document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_schema_path: Option<PathBuf>,

    /// Override bucket holding the tool function's code artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_code_bucket: Option<String>,

    /// Override key of the tool function's code artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_code_key: Option<String>,
}

impl DeployContext {
    /// Create a context for the given application, region, and account.
    pub fn new(
        app_name: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            region: region.into(),
            account_id: account_id.into(),
            partition: default_partition(),
            image_uri: None,
            tool_schema_path: None,
            tool_code_bucket: None,
            tool_code_key: None,
        }
    }

    /// Supply a pre-built agent image URI.
    pub fn with_image_uri(mut self, uri: impl Into<String>) -> Self {
        self.image_uri = Some(uri.into());
        self
    }

    /// Check the fields the rest of the composition derives names from.
    pub fn validate(&self) -> Result<()> {
        if self.app_name.is_empty() || self.app_name.len() > 40 {
            bail!("app_name must be between 1 and 40 characters");
        }
        let mut chars = self.app_name.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
            bail!("app_name must start with an ASCII letter");
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') {
            bail!("app_name may only contain ASCII letters, digits, and '-'");
        }

        if self.region.is_empty()
            || !self
                .region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            bail!("region '{}' is not a valid region name", self.region);
        }

        if self.account_id.len() != 12 || !self.account_id.chars().all(|c| c.is_ascii_digit()) {
            bail!("account_id must be exactly 12 digits");
        }

        if self.partition.is_empty() {
            bail!("partition must not be empty");
        }

        if let Some(uri) = &self.image_uri
            && uri.trim().is_empty()
        {
            bail!("image_uri, when supplied, must not be blank");
        }

        Ok(())
    }

    /// Save the context to a TOML file.
    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deploy context to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write context to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Deploy context saved");
        Ok(())
    }

    /// Load the context from a TOML file (or from `Bistro.toml` inside a
    /// directory).
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Context file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(BISTRO_CONF_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read context from {}", config_path.display()))?;
        let context: Self =
            toml::from_str(&content).context("Failed to parse context file as TOML")?;
        context.validate()?;
        tracing::info!(path = %config_path.display(), "Deploy context loaded");
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_context_passes_validation() {
        let ctx = DeployContext::new("demo", "us-east-1", "123456789012");
        ctx.validate().unwrap();
    }

    #[test]
    fn test_app_name_charset_is_checked() {
        let ctx = DeployContext::new("demo_app", "us-east-1", "123456789012");
        assert!(ctx.validate().is_err());

        let ctx = DeployContext::new("1demo", "us-east-1", "123456789012");
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_account_id_must_be_twelve_digits() {
        let ctx = DeployContext::new("demo", "us-east-1", "12345");
        assert!(ctx.validate().is_err());

        let ctx = DeployContext::new("demo", "us-east-1", "12345678901x");
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_blank_image_uri_is_rejected() {
        let ctx = DeployContext::new("demo", "us-east-1", "123456789012").with_image_uri("  ");
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_context_round_trips_through_toml() {
        let ctx = DeployContext::new("demo", "us-east-1", "123456789012")
            .with_image_uri("123456789012.dkr.ecr.us-east-1.amazonaws.com/demo-agent:v2");
        let serialized = toml::to_string_pretty(&ctx).unwrap();
        let parsed: DeployContext = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, ctx);
    }

    #[test]
    fn test_partition_defaults_when_absent_from_toml() {
        let parsed: DeployContext = toml::from_str(
            r#"
            app_name = "demo"
            region = "us-east-1"
            account_id = "123456789012"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.partition, DEFAULT_PARTITION);
    }
}
