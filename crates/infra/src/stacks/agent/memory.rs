//! Long-lived conversational memory with named extraction strategies.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::DeployContext;
use crate::resource::Resource;
use crate::stacks::agent::sanitize_identifier;

/// Logical id of the memory declaration.
pub const MEMORY_ID: &str = "AgentMemory";

/// Default retention of raw conversation events, in days.
pub const DEFAULT_EVENT_EXPIRY_DAYS: u32 = 30;

/// A named extraction strategy over the raw event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryStrategy {
    /// Extract durable facts from conversations.
    Semantic { name: String, namespaces: Vec<String> },
    /// Extract per-user preferences.
    UserPreference { name: String, namespaces: Vec<String> },
    /// Summarize sessions.
    Summary { name: String, namespaces: Vec<String> },
}

impl MemoryStrategy {
    /// Strategy name.
    pub fn name(&self) -> &str {
        match self {
            Self::Semantic { name, .. }
            | Self::UserPreference { name, .. }
            | Self::Summary { name, .. } => name,
        }
    }

    fn render(&self) -> Value {
        match self {
            Self::Semantic { name, namespaces } => json!({
                "SemanticMemoryStrategy": { "Name": name, "Namespaces": namespaces }
            }),
            Self::UserPreference { name, namespaces } => json!({
                "UserPreferenceMemoryStrategy": { "Name": name, "Namespaces": namespaces }
            }),
            Self::Summary { name, namespaces } => json!({
                "SummaryMemoryStrategy": { "Name": name, "Namespaces": namespaces }
            }),
        }
    }
}

/// Configuration for the memory resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Retention of raw events in days.
    pub event_expiry_days: u32,
    /// Extraction strategies.
    pub strategies: Vec<MemoryStrategy>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            event_expiry_days: DEFAULT_EVENT_EXPIRY_DAYS,
            strategies: vec![
                MemoryStrategy::Semantic {
                    name: "restaurant_facts".to_string(),
                    namespaces: vec!["/facts/{actorId}".to_string()],
                },
                MemoryStrategy::UserPreference {
                    name: "dining_preferences".to_string(),
                    namespaces: vec!["/preferences/{actorId}".to_string()],
                },
                MemoryStrategy::Summary {
                    name: "session_summaries".to_string(),
                    namespaces: vec!["/summaries/{actorId}/{sessionId}".to_string()],
                },
            ],
        }
    }
}

impl MemoryConfig {
    /// Memory resource name; the provider only accepts `[A-Za-z0-9_]`
    /// identifiers.
    pub fn memory_name(ctx: &DeployContext) -> String {
        format!("{}_memory", sanitize_identifier(&ctx.app_name))
    }

    /// The memory declaration.
    pub fn resource(&self, ctx: &DeployContext) -> Resource {
        let strategies: Vec<Value> = self.strategies.iter().map(MemoryStrategy::render).collect();
        Resource::new(
            MEMORY_ID,
            "AWS::BedrockAgentCore::Memory",
            json!({
                "Name": Self::memory_name(ctx),
                "Description": format!("Conversational memory for the {} agent", ctx.app_name),
                "EventExpiryDuration": self.event_expiry_days,
                "MemoryStrategies": strategies,
            }),
        )
    }
}
