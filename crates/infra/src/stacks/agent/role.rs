//! The runtime execution role and its partitioned permission policy.
//!
//! The policy is split into named statement groups, one per capability area.
//! Each group grants only the actions and resource patterns that capability
//! needs; the only statements with an unscoped resource are the ones listed in
//! [`UNSCOPED_STATEMENT_SIDS`], where the upstream service mandates it.

use serde_json::{Map, Value, json};

use crate::arn;
use crate::context::DeployContext;
use crate::expr::Expr;
use crate::resource::Resource;
use crate::stacks::agent::runtime::{DEFAULT_LOG_GROUP_PREFIX, METRICS_NAMESPACE};

/// Logical id of the runtime execution role.
pub const RUNTIME_ROLE_ID: &str = "RuntimeRole";

/// Statement ids whose resource pattern is `*` because the corresponding
/// action cannot be resource-scoped.
pub const UNSCOPED_STATEMENT_SIDS: &[&str] = &[
    "EcrTokenIssuance",
    "TraceExport",
    "GuardrailList",
    "WorkloadIdentityToken",
    "LogDeliveryManagement",
];

/// One permission statement: a named group of actions over resource patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    /// Statement id naming the capability area.
    pub sid: String,
    /// Granted actions.
    pub actions: Vec<String>,
    /// Resource patterns; deferred references are allowed.
    pub resources: Vec<Expr>,
    /// Optional condition block.
    pub condition: Option<Value>,
}

impl PolicyStatement {
    /// An allow statement over the given actions and resources.
    pub fn allow(sid: &str, actions: &[&str], resources: Vec<Expr>) -> Self {
        Self {
            sid: sid.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
            condition: None,
        }
    }

    /// Attach a condition block.
    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Render into policy-document form.
    pub fn render(&self) -> Value {
        let mut body = Map::new();
        body.insert("Sid".to_string(), Value::String(self.sid.clone()));
        body.insert("Effect".to_string(), json!("Allow"));
        body.insert("Action".to_string(), json!(&self.actions));
        let resources: Vec<Value> = self.resources.iter().map(Expr::render).collect();
        body.insert("Resource".to_string(), json!(resources));
        if let Some(condition) = &self.condition {
            body.insert("Condition".to_string(), condition.clone());
        }
        Value::Object(body)
    }
}

/// Render a list of statements into a policy document.
pub fn policy_document(statements: &[PolicyStatement]) -> Value {
    let statements: Vec<Value> = statements.iter().map(PolicyStatement::render).collect();
    json!({
        "Version": "2012-10-17",
        "Statement": statements,
    })
}

/// Trust policy allowing the given service to assume a role, optionally under
/// a condition block.
pub(crate) fn service_trust(service: &str, condition: Option<Value>) -> Value {
    let mut statement = Map::new();
    statement.insert("Effect".to_string(), json!("Allow"));
    statement.insert("Principal".to_string(), json!({ "Service": service }));
    statement.insert("Action".to_string(), json!("sts:AssumeRole"));
    if let Some(condition) = condition {
        statement.insert("Condition".to_string(), condition);
    }
    json!({
        "Version": "2012-10-17",
        "Statement": [Value::Object(statement)],
    })
}

/// The statement groups of the runtime execution role, one per capability.
pub fn execution_statements(ctx: &DeployContext) -> Vec<PolicyStatement> {
    let app = &ctx.app_name;
    let runtime_log_groups = format!("log-group:{}/{}*", DEFAULT_LOG_GROUP_PREFIX, app);

    vec![
        PolicyStatement::allow(
            "EcrImagePull",
            &["ecr:BatchGetImage", "ecr:GetDownloadUrlForLayer"],
            vec![Expr::lit(arn::scoped(
                ctx,
                "ecr",
                &format!("repository/{}-*", app),
            ))],
        ),
        // Token issuance cannot be scoped to a repository.
        PolicyStatement::allow(
            "EcrTokenIssuance",
            &["ecr:GetAuthorizationToken"],
            vec![Expr::lit("*")],
        ),
        PolicyStatement::allow(
            "LogGroupLifecycle",
            &["logs:CreateLogGroup", "logs:DescribeLogGroups"],
            vec![
                Expr::lit(arn::scoped(ctx, "logs", &runtime_log_groups)),
                Expr::lit(arn::scoped(ctx, "logs", "log-group:*")),
            ],
        ),
        PolicyStatement::allow(
            "LogStreamWrites",
            &[
                "logs:CreateLogStream",
                "logs:PutLogEvents",
                "logs:DescribeLogStreams",
            ],
            vec![Expr::lit(arn::scoped(
                ctx,
                "logs",
                &format!("{}:log-stream:*", runtime_log_groups),
            ))],
        ),
        // Trace segment export is account-wide by service design.
        PolicyStatement::allow(
            "TraceExport",
            &[
                "xray:PutTraceSegments",
                "xray:PutTelemetryRecords",
                "xray:GetSamplingRules",
                "xray:GetSamplingTargets",
            ],
            vec![Expr::lit("*")],
        ),
        PolicyStatement::allow(
            "RuntimeMetrics",
            &["cloudwatch:PutMetricData"],
            vec![Expr::lit("*")],
        )
        .with_condition(json!({
            "StringEquals": { "cloudwatch:namespace": METRICS_NAMESPACE }
        })),
        PolicyStatement::allow(
            "ModelInvocation",
            &["bedrock:InvokeModel", "bedrock:InvokeModelWithResponseStream"],
            vec![
                Expr::lit(arn::regional(ctx, "bedrock", "foundation-model/*")),
                Expr::lit(arn::scoped(ctx, "bedrock", "inference-profile/*")),
            ],
        ),
        PolicyStatement::allow(
            "GuardrailList",
            &["bedrock:ListGuardrails"],
            vec![Expr::lit("*")],
        ),
        PolicyStatement::allow(
            "GuardrailApply",
            &["bedrock:ApplyGuardrail", "bedrock:GetGuardrail"],
            vec![Expr::lit(arn::scoped(ctx, "bedrock", "guardrail/*"))],
        ),
        PolicyStatement::allow(
            "MemoryAccess",
            &[
                "bedrock-agentcore:CreateEvent",
                "bedrock-agentcore:GetEvent",
                "bedrock-agentcore:ListEvents",
                "bedrock-agentcore:ListSessions",
                "bedrock-agentcore:GetMemory",
                "bedrock-agentcore:GetMemoryRecord",
                "bedrock-agentcore:ListMemoryRecords",
                "bedrock-agentcore:RetrieveMemoryRecords",
            ],
            vec![Expr::lit(arn::scoped(ctx, "bedrock-agentcore", "memory/*"))],
        ),
        PolicyStatement::allow(
            "WorkloadIdentityToken",
            &[
                "bedrock-agentcore:GetWorkloadAccessToken",
                "bedrock-agentcore:GetWorkloadAccessTokenForJWT",
                "bedrock-agentcore:GetWorkloadAccessTokenForUserId",
            ],
            vec![Expr::lit("*")],
        ),
        PolicyStatement::allow(
            "BrowserSessions",
            &[
                "bedrock-agentcore:StartBrowserSession",
                "bedrock-agentcore:GetBrowserSession",
                "bedrock-agentcore:StopBrowserSession",
                "bedrock-agentcore:UpdateBrowserStream",
            ],
            vec![Expr::lit(arn::scoped_as(
                ctx,
                "bedrock-agentcore",
                "aws",
                "browser/*",
            ))],
        ),
        PolicyStatement::allow(
            "LogDeliveryManagement",
            &[
                "logs:PutDeliverySource",
                "logs:GetDeliverySource",
                "logs:DeleteDeliverySource",
                "logs:PutDeliveryDestination",
                "logs:GetDeliveryDestination",
                "logs:DeleteDeliveryDestination",
                "logs:CreateDelivery",
                "logs:GetDelivery",
                "logs:DeleteDelivery",
                "logs:DescribeDeliveries",
            ],
            vec![Expr::lit("*")],
        ),
        PolicyStatement::allow(
            "VectorStoreAccess",
            &[
                "s3vectors:GetIndex",
                "s3vectors:ListIndexes",
                "s3vectors:GetVectors",
                "s3vectors:PutVectors",
                "s3vectors:QueryVectors",
            ],
            vec![Expr::lit(arn::scoped(
                ctx,
                "s3vectors",
                &format!("bucket/{}*", app),
            ))],
        ),
        PolicyStatement::allow(
            "ObjectStoreAccess",
            &["s3:GetObject", "s3:PutObject", "s3:ListBucket"],
            vec![
                Expr::lit(arn::bucket(ctx, &format!("{}-*", app))),
                Expr::lit(arn::bucket(ctx, &format!("{}-*/*", app))),
            ],
        ),
    ]
}

/// The runtime execution role declaration.
pub fn execution_role_resource(ctx: &DeployContext) -> Resource {
    let trust = service_trust(
        "bedrock-agentcore.amazonaws.com",
        Some(json!({
            "StringEquals": { "aws:SourceAccount": ctx.account_id },
            "ArnLike": { "aws:SourceArn": arn::scoped(ctx, "bedrock-agentcore", "*") },
        })),
    );

    Resource::new(
        RUNTIME_ROLE_ID,
        "AWS::IAM::Role",
        json!({
            "RoleName": format!("{}-runtime-role", ctx.app_name),
            "AssumeRolePolicyDocument": trust,
            "Policies": [{
                "PolicyName": format!("{}-runtime-policy", ctx.app_name),
                "PolicyDocument": policy_document(&execution_statements(ctx)),
            }],
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx() -> DeployContext {
        DeployContext::new("demo", "us-east-1", "123456789012")
    }

    /// A resource pattern counts as scoped when it pins the deployment region,
    /// the account, or the application prefix.
    fn is_scoped(ctx: &DeployContext, pattern: &str) -> bool {
        pattern.contains(&ctx.region)
            || pattern.contains(&ctx.account_id)
            || pattern.contains(&ctx.app_name)
    }

    #[test]
    fn test_statement_sids_are_unique() {
        let statements = execution_statements(&test_ctx());
        let mut sids: Vec<&str> = statements.iter().map(|s| s.sid.as_str()).collect();
        sids.sort_unstable();
        let before = sids.len();
        sids.dedup();
        assert_eq!(before, sids.len());
    }

    #[test]
    fn test_every_statement_grants_at_least_one_action() {
        for statement in execution_statements(&test_ctx()) {
            assert!(!statement.actions.is_empty(), "{} is empty", statement.sid);
            assert!(!statement.resources.is_empty(), "{} is empty", statement.sid);
        }
    }

    #[test]
    fn test_only_documented_statements_are_unscoped() {
        let ctx = test_ctx();
        for statement in execution_statements(&ctx) {
            if UNSCOPED_STATEMENT_SIDS.contains(&statement.sid.as_str()) {
                continue;
            }
            // A namespace condition scopes a statement that cannot name its
            // resource pattern.
            if statement.condition.is_some() {
                continue;
            }
            for resource in &statement.resources {
                let pattern = resource.as_literal().unwrap();
                assert!(
                    is_scoped(&ctx, &pattern),
                    "statement '{}' grants unscoped pattern '{}'",
                    statement.sid,
                    pattern
                );
            }
        }
    }

    #[test]
    fn test_metrics_statement_is_bound_to_the_runtime_namespace() {
        let statements = execution_statements(&test_ctx());
        let metrics = statements
            .iter()
            .find(|s| s.sid == "RuntimeMetrics")
            .unwrap();
        assert_eq!(
            metrics.condition,
            Some(json!({
                "StringEquals": { "cloudwatch:namespace": "bedrock-agentcore" }
            }))
        );
    }

    #[test]
    fn test_object_store_patterns_carry_the_app_prefix() {
        let statements = execution_statements(&test_ctx());
        let objects = statements
            .iter()
            .find(|s| s.sid == "ObjectStoreAccess")
            .unwrap();
        for resource in &objects.resources {
            assert!(resource.as_literal().unwrap().contains("demo-"));
        }
    }

    #[test]
    fn test_role_trust_is_conditioned_on_the_source_account() {
        let role = execution_role_resource(&test_ctx());
        let trust = &role.properties["AssumeRolePolicyDocument"];
        assert_eq!(
            trust["Statement"][0]["Principal"]["Service"],
            json!("bedrock-agentcore.amazonaws.com")
        );
        assert_eq!(
            trust["Statement"][0]["Condition"]["StringEquals"]["aws:SourceAccount"],
            json!("123456789012")
        );
    }

    #[test]
    fn test_statement_renders_condition_and_resources() {
        let statement = PolicyStatement::allow(
            "Example",
            &["s3:GetObject"],
            vec![Expr::lit("arn:aws:s3:::demo-bucket/*")],
        )
        .with_condition(json!({ "Bool": { "aws:SecureTransport": "true" } }));

        let rendered = statement.render();
        assert_eq!(rendered["Sid"], json!("Example"));
        assert_eq!(rendered["Effect"], json!("Allow"));
        assert_eq!(rendered["Resource"], json!(["arn:aws:s3:::demo-bucket/*"]));
        assert!(rendered["Condition"].is_object());
    }
}
