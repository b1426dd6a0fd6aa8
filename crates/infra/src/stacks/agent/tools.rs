//! The gateway's function-based tool backend.
//!
//! The function's tool surface is described by an externally maintained JSON
//! schema document consumed verbatim at composition time; the crate ships a
//! default derived from the restaurant search tools and accepts an override
//! path through the context.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::DeployContext;
use crate::expr::{Expr, LogicalId};
use crate::resource::Resource;
use crate::stacks::agent::role::{PolicyStatement, policy_document, service_trust};
use crate::stacks::agent::secret::SECRET_ENV_VAR;

/// Logical id of the tool function.
pub const TOOL_FUNCTION_ID: &str = "ToolFunction";

/// Logical id of the tool function's execution role.
pub const TOOL_FUNCTION_ROLE_ID: &str = "ToolFunctionRole";

/// Default language runtime of the tool function.
pub const DEFAULT_TOOL_RUNTIME: &str = "python3.12";

/// Default handler entry point.
pub const DEFAULT_TOOL_HANDLER: &str = "handler.lambda_handler";

/// Default invocation timeout, matching the search API call budget.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u32 = 30;

/// Default memory allocation in MiB.
pub const DEFAULT_TOOL_MEMORY_MB: u32 = 256;

/// Default key of the code artifact inside the assets bucket.
pub const DEFAULT_TOOL_CODE_KEY: &str = "gateway-tools.zip";

/// Default tool schema, shipped with the crate.
const DEFAULT_TOOL_SCHEMA: &str = include_str!("../../../assets/tool-schema.json");

/// Configuration for the tool function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFunctionConfig {
    /// Language runtime.
    pub runtime: String,
    /// Handler entry point.
    pub handler: String,
    /// Invocation timeout in seconds.
    pub timeout_secs: u32,
    /// Memory allocation in MiB.
    pub memory_mb: u32,
}

impl Default for ToolFunctionConfig {
    fn default() -> Self {
        Self {
            runtime: DEFAULT_TOOL_RUNTIME.to_string(),
            handler: DEFAULT_TOOL_HANDLER.to_string(),
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            memory_mb: DEFAULT_TOOL_MEMORY_MB,
        }
    }
}

impl ToolFunctionConfig {
    /// Bucket holding the code artifact; deterministic unless overridden in
    /// the context.
    pub fn code_bucket(ctx: &DeployContext) -> String {
        ctx.tool_code_bucket.clone().unwrap_or_else(|| {
            format!("{}-assets-{}-{}", ctx.app_name, ctx.account_id, ctx.region)
        })
    }

    /// Key of the code artifact.
    pub fn code_key(ctx: &DeployContext) -> String {
        ctx.tool_code_key
            .clone()
            .unwrap_or_else(|| DEFAULT_TOOL_CODE_KEY.to_string())
    }

    /// Load and validate the tool schema document: the context's override
    /// path when set, the bundled default otherwise. The document must be a
    /// JSON array of tool objects carrying `name` and `inputSchema`.
    pub fn load_schema(&self, ctx: &DeployContext) -> Result<Value> {
        let raw = match &ctx.tool_schema_path {
            Some(path) => std::fs::read_to_string(path)
                .context(format!("Failed to read tool schema from {}", path.display()))?,
            None => DEFAULT_TOOL_SCHEMA.to_string(),
        };
        let schema: Value =
            serde_json::from_str(&raw).context("Tool schema is not valid JSON")?;

        let Some(tools) = schema.as_array() else {
            bail!("tool schema must be a JSON array of tool definitions");
        };
        if tools.is_empty() {
            bail!("tool schema must define at least one tool");
        }
        for tool in tools {
            if tool.get("name").and_then(Value::as_str).is_none() {
                bail!("every tool definition needs a string 'name'");
            }
            if !tool.get("inputSchema").is_some_and(Value::is_object) {
                bail!("every tool definition needs an 'inputSchema' object");
            }
        }
        Ok(schema)
    }

    /// The function's execution role: basic execution plus read-only access
    /// to the placeholder secret.
    pub fn role_resource(&self, ctx: &DeployContext, secret_id: &LogicalId) -> Resource {
        let secret_read = PolicyStatement::allow(
            "SecretRead",
            &[
                "secretsmanager:GetSecretValue",
                "secretsmanager:DescribeSecret",
            ],
            vec![Expr::resource_ref(secret_id.clone())],
        );

        Resource::new(
            TOOL_FUNCTION_ROLE_ID,
            "AWS::IAM::Role",
            json!({
                "RoleName": format!("{}-tool-function-role", ctx.app_name),
                "AssumeRolePolicyDocument": service_trust("lambda.amazonaws.com", None),
                "ManagedPolicyArns": [format!(
                    "arn:{}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole",
                    ctx.partition
                )],
                "Policies": [{
                    "PolicyName": format!("{}-tool-secret-read", ctx.app_name),
                    "PolicyDocument": policy_document(&[secret_read]),
                }],
            }),
        )
    }

    /// The function declaration. The secret's identifier travels through an
    /// environment variable; its value never appears here.
    pub fn function_resource(
        &self,
        ctx: &DeployContext,
        role_id: &LogicalId,
        secret_id: &LogicalId,
    ) -> Resource {
        let variables = BTreeMap::from([(
            SECRET_ENV_VAR.to_string(),
            Expr::resource_ref(secret_id.clone()),
        )]);

        Resource::new(
            TOOL_FUNCTION_ID,
            "AWS::Lambda::Function",
            json!({
                "FunctionName": format!("{}-gateway-tools", ctx.app_name),
                "Runtime": self.runtime.clone(),
                "Handler": self.handler.clone(),
                "MemorySize": self.memory_mb,
                "Timeout": self.timeout_secs,
                "Role": Expr::get_att(role_id.clone(), "Arn"),
                "Code": {
                    "S3Bucket": Self::code_bucket(ctx),
                    "S3Key": Self::code_key(ctx),
                },
                "Environment": { "Variables": variables },
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::agent::secret::SECRET_ID;

    fn test_ctx() -> DeployContext {
        DeployContext::new("demo", "us-east-1", "123456789012")
    }

    #[test]
    fn test_default_schema_parses_and_names_the_search_tool() {
        let schema = ToolFunctionConfig::default()
            .load_schema(&test_ctx())
            .unwrap();
        let tools = schema.as_array().unwrap();
        assert!(
            tools
                .iter()
                .any(|t| t["name"] == json!("search_restaurants"))
        );
        for tool in tools {
            assert!(tool["inputSchema"].is_object());
        }
    }

    #[test]
    fn test_schema_override_path_is_honored() {
        let dir = tempdir::TempDir::new("bistro-schema").unwrap();
        let path = dir.path().join("tools.json");
        std::fs::write(
            &path,
            r#"[{"name": "custom_tool", "inputSchema": {"type": "object"}}]"#,
        )
        .unwrap();

        let mut ctx = test_ctx();
        ctx.tool_schema_path = Some(path);
        let schema = ToolFunctionConfig::default().load_schema(&ctx).unwrap();
        assert_eq!(schema[0]["name"], json!("custom_tool"));
    }

    #[test]
    fn test_malformed_schema_is_rejected() {
        let dir = tempdir::TempDir::new("bistro-schema").unwrap();
        let path = dir.path().join("tools.json");
        std::fs::write(&path, r#"[{"description": "missing name"}]"#).unwrap();

        let mut ctx = test_ctx();
        ctx.tool_schema_path = Some(path);
        let err = ToolFunctionConfig::default().load_schema(&ctx).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_function_learns_the_secret_through_the_environment() {
        let config = ToolFunctionConfig::default();
        let function = config.function_resource(
            &test_ctx(),
            &TOOL_FUNCTION_ROLE_ID.into(),
            &SECRET_ID.into(),
        );

        assert_eq!(
            function.properties["Environment"]["Variables"][SECRET_ENV_VAR],
            json!({ "Ref": "SearchApiSecret" })
        );
        // The placeholder value itself must never be wired in.
        assert!(
            !function.properties.to_string().contains("api_key"),
            "secret material leaked into the function declaration"
        );
    }

    #[test]
    fn test_code_location_is_deterministic() {
        let ctx = test_ctx();
        assert_eq!(
            ToolFunctionConfig::code_bucket(&ctx),
            "demo-assets-123456789012-us-east-1"
        );
        assert_eq!(ToolFunctionConfig::code_key(&ctx), "gateway-tools.zip");

        let mut overridden = test_ctx();
        overridden.tool_code_bucket = Some("release-bucket".to_string());
        overridden.tool_code_key = Some("tools/v2.zip".to_string());
        assert_eq!(ToolFunctionConfig::code_bucket(&overridden), "release-bucket");
        assert_eq!(ToolFunctionConfig::code_key(&overridden), "tools/v2.zip");
    }

    #[test]
    fn test_role_reads_only_the_secret() {
        let config = ToolFunctionConfig::default();
        let role = config.role_resource(&test_ctx(), &SECRET_ID.into());
        let statement = &role.properties["Policies"][0]["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Sid"], json!("SecretRead"));
        assert_eq!(statement["Resource"], json!([{ "Ref": "SearchApiSecret" }]));
    }
}
