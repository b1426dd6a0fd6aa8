//! bistro-infra - Infrastructure composition for the restaurant-finder agent.
//!
//! This crate declares the cloud resources behind the agent (registry,
//! runtime, gateway + tool backend, memory, secret) as a static graph of
//! stacks and synthesizes them into templates for the deployment engine.
//! Composition is single-threaded and synchronous; nothing here talks to the
//! provider.

mod app;
pub mod arn;
mod context;
mod expr;
pub mod plan;
mod resource;
mod stack;
pub mod stacks;

pub use app::{App, Assembly, MANIFEST_FILENAME, SynthesizedStack};
pub use context::{BISTRO_CONF_FILENAME, DEFAULT_APP_NAME, DEFAULT_PARTITION, DeployContext};
pub use expr::{ExportName, Expr, LogicalId};
pub use plan::{DeploymentPlan, compose};
pub use resource::{DeletionPolicy, Resource};
pub use stack::{Output, Stack, StackName};
pub use stacks::{AgentStackBuilder, ArtifactSource, RegistryStackBuilder, StackBlueprint};
