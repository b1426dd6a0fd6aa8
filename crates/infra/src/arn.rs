//! Deterministic resource-pattern builders.
//!
//! Permission statements and trust conditions are composed from the context's
//! partition/region/account plus an application-derived suffix; nothing here
//! is resolved at deploy time.

use crate::context::DeployContext;

/// Pattern scoped to the context's region and account.
pub fn scoped(ctx: &DeployContext, service: &str, resource: &str) -> String {
    format!(
        "arn:{}:{}:{}:{}:{}",
        ctx.partition, service, ctx.region, ctx.account_id, resource
    )
}

/// Pattern scoped to the context's region with an explicit account segment,
/// for service-owned resources that live outside the deployment account.
pub fn scoped_as(ctx: &DeployContext, service: &str, account: &str, resource: &str) -> String {
    format!(
        "arn:{}:{}:{}:{}:{}",
        ctx.partition, service, ctx.region, account, resource
    )
}

/// Pattern scoped to the context's region with no account segment.
pub fn regional(ctx: &DeployContext, service: &str, resource: &str) -> String {
    format!(
        "arn:{}:{}:{}::{}",
        ctx.partition, service, ctx.region, resource
    )
}

/// Object-storage pattern: no region or account segment.
pub fn bucket(ctx: &DeployContext, resource: &str) -> String {
    format!("arn:{}:s3:::{}", ctx.partition, resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DeployContext {
        DeployContext::new("demo", "us-east-1", "123456789012")
    }

    #[test]
    fn test_scoped_pattern() {
        assert_eq!(
            scoped(&ctx(), "ecr", "repository/demo-agent"),
            "arn:aws:ecr:us-east-1:123456789012:repository/demo-agent"
        );
    }

    #[test]
    fn test_scoped_as_pattern() {
        assert_eq!(
            scoped_as(&ctx(), "bedrock-agentcore", "aws", "browser/*"),
            "arn:aws:bedrock-agentcore:us-east-1:aws:browser/*"
        );
    }

    #[test]
    fn test_regional_pattern() {
        assert_eq!(
            regional(&ctx(), "bedrock", "foundation-model/*"),
            "arn:aws:bedrock:us-east-1::foundation-model/*"
        );
    }

    #[test]
    fn test_bucket_pattern() {
        assert_eq!(bucket(&ctx(), "demo-*/*"), "arn:aws:s3:::demo-*/*");
    }
}
