//! The registry stack: owns the repository that produces the deployable
//! artifact reference and exports it as a composed address.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::DeployContext;
use crate::expr::{ExportName, Expr};
use crate::resource::{DeletionPolicy, Resource};
use crate::stack::{Output, Stack};
use crate::stacks::StackBlueprint;

/// How many tagged images the lifecycle policy keeps around.
pub const DEFAULT_MAX_TAGGED_IMAGES: u32 = 10;

/// Tag composed into the exported artifact address.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Logical id of the repository declaration.
pub const REPOSITORY_ID: &str = "AgentRepository";

/// Configuration for the registry stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStackBuilder {
    /// Override for the repository base name. Defaults to `{app}-agent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    /// Keep only the most recent N tagged images.
    pub max_tagged_images: u32,
    /// Scan images on push.
    pub scan_on_push: bool,
}

impl Default for RegistryStackBuilder {
    fn default() -> Self {
        Self {
            base_name: None,
            max_tagged_images: DEFAULT_MAX_TAGGED_IMAGES,
            scan_on_push: true,
        }
    }
}

impl RegistryStackBuilder {
    /// Repository name: the configured base name, or one derived from the
    /// application name.
    pub fn repository_name(&self, ctx: &DeployContext) -> String {
        self.base_name
            .clone()
            .unwrap_or_else(|| format!("{}-agent", ctx.app_name))
    }

    /// Export name of the composed artifact address. The agent stack imports
    /// this when no pre-built image is supplied.
    pub fn uri_export(ctx: &DeployContext) -> ExportName {
        format!("{}-RegistryUri", ctx.app_name).into()
    }

    /// The provider expects the lifecycle policy as embedded JSON text.
    fn lifecycle_policy_text(&self) -> Result<String> {
        let policy = json!({
            "rules": [{
                "rulePriority": 1,
                "description": format!(
                    "Keep the {} most recent tagged images",
                    self.max_tagged_images
                ),
                "selection": {
                    "tagStatus": "tagged",
                    "tagPatternList": ["*"],
                    "countType": "imageCountMoreThan",
                    "countNumber": self.max_tagged_images,
                },
                "action": { "type": "expire" },
            }]
        });
        serde_json::to_string(&policy).context("Failed to serialize registry lifecycle policy")
    }
}

impl StackBlueprint for RegistryStackBuilder {
    const STACK_SUFFIX: &'static str = "registry";

    fn build(&self, ctx: &DeployContext) -> Result<Stack> {
        let mut stack = Stack::new(Self::stack_name(ctx))
            .description(format!("Container registry for the {} agent", ctx.app_name));

        // Retain keeps pushed images alive even if the stack is destroyed.
        let repository = stack.add_resource(
            Resource::new(
                REPOSITORY_ID,
                "AWS::ECR::Repository",
                json!({
                    "RepositoryName": self.repository_name(ctx),
                    "ImageScanningConfiguration": { "ScanOnPush": self.scan_on_push },
                    "LifecyclePolicy": {
                        "LifecyclePolicyText": self.lifecycle_policy_text()?,
                    },
                }),
            )
            .deletion_policy(DeletionPolicy::Retain),
        )?;

        stack.add_output(
            Output::exported(
                &ctx.app_name,
                "RegistryUri",
                Expr::concat([
                    Expr::get_att(repository.clone(), "RepositoryUri"),
                    Expr::lit(format!(":{}", DEFAULT_IMAGE_TAG)),
                ]),
            )
            .description("Repository address with the default tag, usable as a runtime artifact"),
        )?;
        stack.add_output(
            Output::exported(&ctx.app_name, "RegistryName", Expr::resource_ref(repository))
                .description("Repository name"),
        )?;

        Ok(stack)
    }
}
