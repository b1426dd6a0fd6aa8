//! Resource declarations.

use serde_json::{Map, Value, json};

use crate::expr::LogicalId;

/// What the deployment engine does with the underlying storage when the
/// declaration is removed from the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DeletionPolicy {
    /// Keep the underlying resource alive after the declaration is deleted.
    Retain,
    /// Delete the underlying resource together with the declaration.
    Delete,
}

/// A typed description of a single cloud resource.
///
/// The property map is plain JSON with [`crate::Expr`] values embedded where an
/// attribute is only known after apply. Explicit `depends_on` edges are for
/// orderings the data references alone do not guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Logical id, unique within the owning stack.
    pub id: LogicalId,
    /// Provider resource type, e.g. `AWS::ECR::Repository`.
    pub kind: String,
    /// Provider-specific configuration.
    pub properties: Value,
    /// Explicit ordering edges to sibling resources.
    pub depends_on: Vec<LogicalId>,
    /// Optional deletion policy override.
    pub deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    /// Create a new declaration.
    pub fn new(id: impl Into<LogicalId>, kind: impl Into<String>, properties: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
        }
    }

    /// Declare an explicit ordering edge onto a sibling resource.
    pub fn depends_on(mut self, id: impl Into<LogicalId>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Set the deletion policy.
    pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    /// Render the declaration into its template form.
    pub fn render(&self) -> Value {
        let mut body = Map::new();
        body.insert("Type".to_string(), Value::String(self.kind.clone()));
        body.insert("Properties".to_string(), self.properties.clone());
        if !self.depends_on.is_empty() {
            let edges: Vec<&str> = self.depends_on.iter().map(|id| id.as_str()).collect();
            body.insert("DependsOn".to_string(), json!(edges));
        }
        if let Some(policy) = self.deletion_policy {
            body.insert("DeletionPolicy".to_string(), json!(policy.to_string()));
        }
        Value::Object(body)
    }
}
