//! The managed agent runtime bound to a container artifact.
//!
//! The runtime's environment is computed deterministically from the
//! application name and the deployment region: exporter protocol and
//! endpoints, a resource-attribute string embedding the app name and log
//! group path, and header overrides directing exported logs to a fixed log
//! group/stream. The runtime is always deployed with the implicit
//! default-latest entry point; no version-pinning resource is created.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::DeployContext;
use crate::expr::{Expr, LogicalId};
use crate::resource::Resource;
use crate::stacks::agent::sanitize_identifier;

/// Logical id of the runtime declaration.
pub const RUNTIME_ID: &str = "AgentRuntime";

/// Log group path prefix the managed runtime writes under.
pub const DEFAULT_LOG_GROUP_PREFIX: &str = "/aws/bedrock-agentcore/runtimes";

/// Log stream the runtime's exported logs land in.
pub const RUNTIME_LOG_STREAM: &str = "runtime-logs";

/// Metric namespace for runtime telemetry.
pub const METRICS_NAMESPACE: &str = "bedrock-agentcore";

/// Export protocol for traces, metrics, and logs.
pub const OTLP_PROTOCOL: &str = "http/protobuf";

/// Environment variable carrying the memory resource id into the runtime.
pub const MEMORY_ID_ENV_VAR: &str = "MEMORY_ID";

/// Environment variable carrying the gateway URL into the runtime.
pub const GATEWAY_URL_ENV_VAR: &str = "GATEWAY_URL";

/// Network reachability of the runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkMode {
    Public,
}

/// Configuration for the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Network reachability.
    pub network_mode: NetworkMode,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            network_mode: NetworkMode::Public,
        }
    }
}

impl RuntimeConfig {
    /// Runtime resource name; the provider only accepts `[A-Za-z0-9_]`
    /// identifiers.
    pub fn runtime_name(ctx: &DeployContext) -> String {
        sanitize_identifier(&ctx.app_name)
    }

    /// The runtime's log group path.
    pub fn log_group(ctx: &DeployContext) -> String {
        format!("{}/{}", DEFAULT_LOG_GROUP_PREFIX, ctx.app_name)
    }

    /// The fixed observability environment, a pure function of the
    /// application name and the region.
    pub fn observability_env(ctx: &DeployContext) -> BTreeMap<String, String> {
        let log_group = Self::log_group(ctx);
        BTreeMap::from([
            (
                "AGENT_OBSERVABILITY_ENABLED".to_string(),
                "true".to_string(),
            ),
            (
                "OTEL_EXPORTER_OTLP_PROTOCOL".to_string(),
                OTLP_PROTOCOL.to_string(),
            ),
            (
                "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT".to_string(),
                format!("https://xray.{}.amazonaws.com/v1/traces", ctx.region),
            ),
            (
                "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT".to_string(),
                format!("https://logs.{}.amazonaws.com/v1/logs", ctx.region),
            ),
            (
                "OTEL_RESOURCE_ATTRIBUTES".to_string(),
                format!(
                    "service.name={},aws.log.group.names={}",
                    ctx.app_name, log_group
                ),
            ),
            (
                "OTEL_EXPORTER_OTLP_LOGS_HEADERS".to_string(),
                format!(
                    "x-aws-log-group={},x-aws-log-stream={},x-aws-metric-namespace={}",
                    log_group, RUNTIME_LOG_STREAM, METRICS_NAMESPACE
                ),
            ),
        ])
    }

    /// The runtime declaration, bound to the artifact chosen by the
    /// composition root and wired to its collaborators through environment
    /// variables.
    pub fn resource(
        &self,
        ctx: &DeployContext,
        role_id: &LogicalId,
        artifact: &Expr,
        memory_id: &LogicalId,
        gateway_id: &LogicalId,
    ) -> Resource {
        let mut env: BTreeMap<String, Expr> = Self::observability_env(ctx)
            .into_iter()
            .map(|(key, value)| (key, Expr::lit(value)))
            .collect();
        env.insert(
            MEMORY_ID_ENV_VAR.to_string(),
            Expr::get_att(memory_id.clone(), "MemoryId"),
        );
        env.insert(
            GATEWAY_URL_ENV_VAR.to_string(),
            Expr::get_att(gateway_id.clone(), "GatewayUrl"),
        );

        Resource::new(
            RUNTIME_ID,
            "AWS::BedrockAgentCore::Runtime",
            json!({
                "AgentRuntimeName": Self::runtime_name(ctx),
                "Description": format!("Managed runtime for the {} agent", ctx.app_name),
                "AgentRuntimeArtifact": {
                    "ContainerConfiguration": { "ContainerUri": artifact }
                },
                "NetworkConfiguration": { "NetworkMode": self.network_mode.to_string() },
                "RoleArn": Expr::get_att(role_id.clone(), "Arn"),
                "EnvironmentVariables": env,
            }),
        )
    }
}
