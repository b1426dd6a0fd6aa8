//! The agent stack: runtime, execution role, gateway + tool backend, memory,
//! and the placeholder secret, wired together.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::context::DeployContext;
use crate::expr::{ExportName, Expr};
use crate::stack::{Output, Stack};
use crate::stacks::StackBlueprint;

pub mod gateway;
pub mod memory;
pub mod role;
pub mod runtime;
pub mod secret;
pub mod tools;

pub use gateway::GatewayConfig;
pub use memory::{MemoryConfig, MemoryStrategy};
pub use runtime::{NetworkMode, RuntimeConfig};
pub use secret::SecretConfig;
pub use tools::ToolFunctionConfig;

/// Where the runtime's container artifact comes from.
///
/// Chosen by the composition root: a literal URI supplied by the operator, or
/// the registry stack's exported default-tag address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactSource {
    /// Operator-supplied image URI, used verbatim.
    Prebuilt(String),
    /// The registry stack's exported composed address.
    FromRegistry(ExportName),
}

impl ArtifactSource {
    /// The artifact as an expression for the runtime declaration.
    pub fn expr(&self) -> Expr {
        match self {
            Self::Prebuilt(uri) => Expr::lit(uri.clone()),
            Self::FromRegistry(export) => Expr::import(export.clone()),
        }
    }
}

/// Configuration for the agent stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStackBuilder {
    /// Where the runtime's container artifact comes from.
    pub artifact: ArtifactSource,
    /// Runtime configuration.
    pub runtime: RuntimeConfig,
    /// Memory configuration.
    pub memory: MemoryConfig,
    /// Gateway configuration.
    pub gateway: GatewayConfig,
    /// Tool function configuration.
    pub tools: ToolFunctionConfig,
    /// Placeholder secret configuration.
    pub secret: SecretConfig,
}

impl AgentStackBuilder {
    /// Create a builder for the given artifact source with default
    /// configuration for everything else.
    pub fn new(artifact: ArtifactSource) -> Self {
        Self {
            artifact,
            runtime: RuntimeConfig::default(),
            memory: MemoryConfig::default(),
            gateway: GatewayConfig::default(),
            tools: ToolFunctionConfig::default(),
            secret: SecretConfig::default(),
        }
    }
}

impl StackBlueprint for AgentStackBuilder {
    const STACK_SUFFIX: &'static str = "agent";

    fn build(&self, ctx: &DeployContext) -> Result<Stack> {
        let mut stack = Stack::new(Self::stack_name(ctx)).description(format!(
            "Runtime, gateway, memory, and tool backend for the {} agent",
            ctx.app_name
        ));

        let secret = stack.add_resource(self.secret.resource(ctx))?;
        let tool_role = stack.add_resource(self.tools.role_resource(ctx, &secret))?;
        let tool_fn = stack.add_resource(self.tools.function_resource(ctx, &tool_role, &secret))?;
        let memory = stack.add_resource(self.memory.resource(ctx))?;

        let gw_role = stack.add_resource(self.gateway.role_resource(ctx))?;
        stack.add_resource(self.gateway.default_policy_resource(ctx, &gw_role, &tool_fn))?;
        let gw = stack.add_resource(self.gateway.resource(ctx, &gw_role))?;
        stack.add_resource(self.gateway.invoke_permission_resource(&tool_fn, &gw_role))?;
        let tool_schema = self.tools.load_schema(ctx)?;
        stack.add_resource(self.gateway.target_resource(&gw, &tool_fn, &tool_schema))?;

        let runtime_role = stack.add_resource(role::execution_role_resource(ctx))?;
        let runtime = stack.add_resource(self.runtime.resource(
            ctx,
            &runtime_role,
            &self.artifact.expr(),
            &memory,
            &gw,
        ))?;

        let app = ctx.app_name.as_str();
        stack.add_output(
            Output::exported(app, "GatewayUrl", Expr::get_att(gw.clone(), "GatewayUrl"))
                .description("Endpoint the agent's tool calls go through"),
        )?;
        stack.add_output(Output::exported(
            app,
            "GatewayId",
            Expr::get_att(gw.clone(), "GatewayId"),
        ))?;
        stack.add_output(Output::exported(
            app,
            "GatewayArn",
            Expr::get_att(gw, "GatewayArn"),
        ))?;
        stack.add_output(Output::exported(
            app,
            "MemoryId",
            Expr::get_att(memory.clone(), "MemoryId"),
        ))?;
        stack.add_output(Output::exported(
            app,
            "MemoryArn",
            Expr::get_att(memory, "MemoryArn"),
        ))?;
        stack.add_output(Output::exported(
            app,
            "RuntimeId",
            Expr::get_att(runtime.clone(), "AgentRuntimeId"),
        ))?;
        stack.add_output(Output::exported(
            app,
            "RuntimeArn",
            Expr::get_att(runtime, "AgentRuntimeArn"),
        ))?;
        stack.add_output(Output::exported(
            app,
            "ToolFunctionArn",
            Expr::get_att(tool_fn.clone(), "Arn"),
        ))?;
        stack.add_output(Output::exported(
            app,
            "ToolFunctionName",
            Expr::resource_ref(tool_fn),
        ))?;
        stack.add_output(
            Output::exported(app, "SecretArn", Expr::resource_ref(secret))
                .description("Populate this secret with the search API key after deployment"),
        )?;

        Ok(stack)
    }
}

/// Map an application name onto the `[A-Za-z][A-Za-z0-9_]*` identifier charset
/// some managed resources require.
pub(crate) fn sanitize_identifier(raw: &str) -> String {
    let mut sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !sanitized.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        sanitized.insert(0, 'a');
    }
    sanitized
}
