//! The composition root: decide, from a single optional external input, which
//! stacks to instantiate and how their outputs connect.

use anyhow::Result;

use crate::app::App;
use crate::context::DeployContext;
use crate::stacks::registry::RegistryStackBuilder;
use crate::stacks::{AgentStackBuilder, ArtifactSource, StackBlueprint};

/// Which sub-graph this deployment instantiates.
///
/// Exactly one variant applies to any context: either the operator supplied a
/// pre-built artifact, or a registry is provisioned and the runtime consumes
/// its output. Keeping the choice in one tagged union keeps the conditional
/// out of every other call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentPlan {
    /// Deploy against an existing artifact; no registry stack.
    PrebuiltImage {
        /// The operator-supplied image URI, used verbatim.
        image_uri: String,
    },
    /// Provision a registry and wire the runtime to its default tag.
    BuildAndPush {
        /// Registry stack configuration.
        registry: RegistryStackBuilder,
    },
}

impl DeploymentPlan {
    /// Read the context's optional artifact reference once and pick the plan.
    pub fn from_context(ctx: &DeployContext) -> Self {
        match &ctx.image_uri {
            Some(uri) => Self::PrebuiltImage {
                image_uri: uri.clone(),
            },
            None => Self::BuildAndPush {
                registry: RegistryStackBuilder::default(),
            },
        }
    }

    /// Instantiate the plan's stacks and wire them into an app.
    pub fn into_app(self, ctx: &DeployContext) -> Result<App> {
        let mut app = App::new();
        match self {
            Self::PrebuiltImage { image_uri } => {
                tracing::info!(
                    image_uri = %image_uri,
                    "Pre-built agent image supplied; skipping the registry stack"
                );
                let agent = AgentStackBuilder::new(ArtifactSource::Prebuilt(image_uri));
                app.add_stack(agent.build(ctx)?)?;
            }
            Self::BuildAndPush { registry } => {
                tracing::info!(
                    repository = %registry.repository_name(ctx),
                    "No agent image supplied; provisioning a registry and wiring the \
                     runtime to its default tag"
                );
                let registry_stack = registry.build(ctx)?;
                let agent = AgentStackBuilder::new(ArtifactSource::FromRegistry(
                    RegistryStackBuilder::uri_export(ctx),
                ));
                let mut agent_stack = agent.build(ctx)?;
                // The import already implies ordering, but the engine may
                // resolve it lazily; the explicit edge removes the race.
                agent_stack.add_dependency(registry_stack.name().clone());
                app.add_stack(registry_stack)?;
                app.add_stack(agent_stack)?;
            }
        }
        Ok(app)
    }
}

/// Compose the deployment for the given context.
pub fn compose(ctx: &DeployContext) -> Result<App> {
    DeploymentPlan::from_context(ctx).into_app(ctx)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::stacks::agent::runtime::RUNTIME_ID;

    fn build_ctx() -> DeployContext {
        DeployContext::new("demo", "us-east-1", "123456789012")
    }

    fn prebuilt_ctx() -> DeployContext {
        build_ctx().with_image_uri("123456789012.dkr.ecr.us-east-1.amazonaws.com/demo-agent:v2")
    }

    #[test]
    fn test_exactly_one_plan_variant_applies() {
        assert!(matches!(
            DeploymentPlan::from_context(&build_ctx()),
            DeploymentPlan::BuildAndPush { .. }
        ));
        assert!(matches!(
            DeploymentPlan::from_context(&prebuilt_ctx()),
            DeploymentPlan::PrebuiltImage { .. }
        ));
    }

    #[test]
    fn test_prebuilt_path_creates_no_registry_stack() {
        let app = compose(&prebuilt_ctx()).unwrap();

        assert_eq!(app.stacks().len(), 1);
        assert!(app.stack("demo-registry").is_none());
        assert!(app.stack("demo-agent").is_some());
    }

    #[test]
    fn test_prebuilt_path_uses_the_supplied_uri_verbatim() {
        let app = compose(&prebuilt_ctx()).unwrap();
        let runtime = app.stack("demo-agent").unwrap().resource(RUNTIME_ID).unwrap();

        assert_eq!(
            runtime.properties["AgentRuntimeArtifact"]["ContainerConfiguration"]["ContainerUri"],
            json!("123456789012.dkr.ecr.us-east-1.amazonaws.com/demo-agent:v2")
        );
    }

    #[test]
    fn test_build_path_creates_registry_and_agent_stacks() {
        let app = compose(&build_ctx()).unwrap();

        assert_eq!(app.stacks().len(), 2);
        assert!(app.stack("demo-registry").is_some());
        assert!(app.stack("demo-agent").is_some());
    }

    #[test]
    fn test_build_path_declares_the_runtime_to_registry_edge() {
        let app = compose(&build_ctx()).unwrap();
        let agent = app.stack("demo-agent").unwrap();

        assert!(agent.depends_on().contains(&"demo-registry".into()));
    }

    #[test]
    fn test_build_path_wires_the_registry_output_into_the_runtime() {
        let app = compose(&build_ctx()).unwrap();
        let runtime = app.stack("demo-agent").unwrap().resource(RUNTIME_ID).unwrap();

        assert_eq!(
            runtime.properties["AgentRuntimeArtifact"]["ContainerConfiguration"]["ContainerUri"],
            json!({ "Fn::ImportValue": "demo-RegistryUri" })
        );
    }

    #[test]
    fn test_both_paths_synthesize_cleanly() {
        compose(&build_ctx()).unwrap().synth().unwrap();
        compose(&prebuilt_ctx()).unwrap().synth().unwrap();
    }
}
