//! The domain stacks composed by the deployment plan.

use anyhow::Result;

use crate::context::DeployContext;
use crate::stack::{Stack, StackName};

pub mod agent;
pub mod registry;

pub use agent::{AgentStackBuilder, ArtifactSource};
pub use registry::RegistryStackBuilder;

/// A blueprint turns a configuration struct into a fully-declared stack.
///
/// Blueprints are pure: they read the context, never the environment, so the
/// same context always yields the same stack.
pub trait StackBlueprint {
    /// Suffix appended to the application name to form the stack name.
    const STACK_SUFFIX: &'static str;

    /// The stack name this blueprint produces for the given context.
    fn stack_name(ctx: &DeployContext) -> StackName {
        format!("{}-{}", ctx.app_name, Self::STACK_SUFFIX).into()
    }

    /// Build the stack.
    fn build(&self, ctx: &DeployContext) -> Result<Stack>;
}
