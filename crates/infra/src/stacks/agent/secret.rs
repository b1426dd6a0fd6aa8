//! Placeholder secret for the third-party search API key.
//!
//! The secret is created with an empty placeholder value; the operator
//! populates the real key out-of-band after the first deployment. No
//! credential ever appears in declared configuration.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::DeployContext;
use crate::resource::Resource;

/// Logical id of the secret declaration.
pub const SECRET_ID: &str = "SearchApiSecret";

/// Environment variable through which the tool function learns the secret's
/// identifier (never its value).
pub const SECRET_ENV_VAR: &str = "SEARCHAPI_SECRET_NAME";

/// Placeholder value written at creation time.
pub const PLACEHOLDER_VALUE: &str = r#"{"api_key":""}"#;

/// Configuration for the placeholder secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretConfig {
    /// Override for the secret name. Defaults to `{app}/searchapi-key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SecretConfig {
    /// The secret's name for the given context.
    pub fn secret_name(&self, ctx: &DeployContext) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}/searchapi-key", ctx.app_name))
    }

    /// The secret declaration.
    pub fn resource(&self, ctx: &DeployContext) -> Resource {
        Resource::new(
            SECRET_ID,
            "AWS::SecretsManager::Secret",
            json!({
                "Name": self.secret_name(ctx),
                "Description": format!(
                    "SearchAPI key for the {} tools. The value is an empty placeholder; \
                     populate it via the secrets service after deployment.",
                    ctx.app_name
                ),
                "SecretString": PLACEHOLDER_VALUE,
            }),
        )
    }
}
