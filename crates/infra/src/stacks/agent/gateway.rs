//! The protocol gateway fronting the tool function.
//!
//! The gateway target must not be applied before the function has granted
//! invoke permission to the gateway's role AND the role's default policy
//! object has materialized; the gateway's validation step otherwise may
//! observe a not-yet-propagated permission and fail. The target therefore
//! declares explicit edges onto both resources instead of relying on implicit
//! data dependencies.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::arn;
use crate::context::DeployContext;
use crate::expr::{Expr, LogicalId};
use crate::resource::Resource;
use crate::stacks::agent::role::{PolicyStatement, policy_document, service_trust};

/// Logical id of the gateway.
pub const GATEWAY_ID: &str = "Gateway";

/// Logical id of the gateway's role.
pub const GATEWAY_ROLE_ID: &str = "GatewayRole";

/// Logical id of the role's default policy object.
pub const GATEWAY_ROLE_POLICY_ID: &str = "GatewayRoleDefaultPolicy";

/// Logical id of the function's invoke-permission grant.
pub const GATEWAY_INVOKE_PERMISSION_ID: &str = "GatewayInvokePermission";

/// Logical id of the gateway target binding the function backend.
pub const GATEWAY_TARGET_ID: &str = "GatewayLambdaTarget";

/// Name of the target within the gateway.
pub const GATEWAY_TARGET_NAME: &str = "LambdaTarget";

/// Wire protocol the gateway speaks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum GatewayProtocol {
    Mcp,
}

/// How callers authenticate against the gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayAuthorizer {
    AwsIam,
}

/// Configuration for the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Wire protocol.
    pub protocol: GatewayProtocol,
    /// Authorizer mode.
    pub authorizer: GatewayAuthorizer,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            protocol: GatewayProtocol::Mcp,
            authorizer: GatewayAuthorizer::AwsIam,
        }
    }
}

impl GatewayConfig {
    /// The gateway's role declaration.
    pub fn role_resource(&self, ctx: &DeployContext) -> Resource {
        let trust = service_trust(
            "bedrock-agentcore.amazonaws.com",
            Some(json!({
                "StringEquals": { "aws:SourceAccount": ctx.account_id },
                "ArnLike": { "aws:SourceArn": arn::scoped(ctx, "bedrock-agentcore", "*") },
            })),
        );
        Resource::new(
            GATEWAY_ROLE_ID,
            "AWS::IAM::Role",
            json!({
                "RoleName": format!("{}-gateway-role", ctx.app_name),
                "AssumeRolePolicyDocument": trust,
            }),
        )
    }

    /// The role's default policy object: the concrete resource through which
    /// the gateway role is granted invoke on the function.
    pub fn default_policy_resource(
        &self,
        ctx: &DeployContext,
        role_id: &LogicalId,
        function_id: &LogicalId,
    ) -> Resource {
        let invoke = PolicyStatement::allow(
            "InvokeToolFunction",
            &["lambda:InvokeFunction"],
            vec![
                Expr::get_att(function_id.clone(), "Arn"),
                Expr::concat([Expr::get_att(function_id.clone(), "Arn"), Expr::lit(":*")]),
            ],
        );
        Resource::new(
            GATEWAY_ROLE_POLICY_ID,
            "AWS::IAM::Policy",
            json!({
                "PolicyName": format!("{}-gateway-invoke", ctx.app_name),
                "Roles": [Expr::resource_ref(role_id.clone())],
                "PolicyDocument": policy_document(&[invoke]),
            }),
        )
    }

    /// The gateway declaration.
    pub fn resource(&self, ctx: &DeployContext, role_id: &LogicalId) -> Resource {
        Resource::new(
            GATEWAY_ID,
            "AWS::BedrockAgentCore::Gateway",
            json!({
                "Name": format!("{}-gateway", ctx.app_name),
                "Description": format!("Tool gateway for the {} agent", ctx.app_name),
                "RoleArn": Expr::get_att(role_id.clone(), "Arn"),
                "ProtocolType": self.protocol.to_string(),
                "AuthorizerType": self.authorizer.to_string(),
            }),
        )
    }

    /// The function-side grant allowing the gateway's role to invoke.
    pub fn invoke_permission_resource(
        &self,
        function_id: &LogicalId,
        role_id: &LogicalId,
    ) -> Resource {
        Resource::new(
            GATEWAY_INVOKE_PERMISSION_ID,
            "AWS::Lambda::Permission",
            json!({
                "FunctionName": Expr::get_att(function_id.clone(), "Arn"),
                "Action": "lambda:InvokeFunction",
                "Principal": Expr::get_att(role_id.clone(), "Arn"),
            }),
        )
    }

    /// The gateway target binding the function backend, with the tool schema
    /// document embedded verbatim. Carries the explicit ordering edges.
    pub fn target_resource(
        &self,
        gateway_id: &LogicalId,
        function_id: &LogicalId,
        tool_schema: &Value,
    ) -> Resource {
        Resource::new(
            GATEWAY_TARGET_ID,
            "AWS::BedrockAgentCore::GatewayTarget",
            json!({
                "GatewayIdentifier": Expr::get_att(gateway_id.clone(), "GatewayId"),
                "Name": GATEWAY_TARGET_NAME,
                "TargetConfiguration": {
                    "Mcp": {
                        "Lambda": {
                            "LambdaArn": Expr::get_att(function_id.clone(), "Arn"),
                            "ToolSchema": { "InlinePayload": tool_schema },
                        }
                    }
                },
                "CredentialProviderConfigurations": [
                    { "CredentialProviderType": "GATEWAY_IAM_ROLE" }
                ],
            }),
        )
        .depends_on(GATEWAY_INVOKE_PERMISSION_ID)
        .depends_on(GATEWAY_ROLE_POLICY_ID)
    }
}
