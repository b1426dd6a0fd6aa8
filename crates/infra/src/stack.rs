//! Stacks: named, independently deployable collections of resource
//! declarations with exported outputs.

use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::expr::{ExportName, Expr, LogicalId};
use crate::resource::Resource;

/// Name of a stack, unique within a deployment.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Deref,
    derive_more::From,
)]
pub struct StackName(String);

impl From<&str> for StackName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An exported, stack-scoped value computed from post-apply attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Output name within the stack.
    pub name: String,
    /// Deployment-wide export name, visible to sibling stacks.
    pub export_name: ExportName,
    /// The exported value.
    pub value: Expr,
    /// Optional human-readable description.
    pub description: Option<String>,
}

impl Output {
    /// Build an output exported under the deterministic `{app}-{name}` form.
    pub fn exported(app_name: &str, name: impl Into<String>, value: Expr) -> Self {
        let name = name.into();
        let export_name = format!("{}-{}", app_name, name).into();
        Self {
            name,
            export_name,
            value,
            description: None,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An ordered, named collection of resource declarations plus computed
/// outputs. A stack owns its declarations exclusively and may declare explicit
/// dependency edges onto sibling stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    name: StackName,
    description: Option<String>,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
    depends_on: Vec<StackName>,
}

impl Stack {
    /// Create an empty stack.
    pub fn new(name: impl Into<StackName>) -> Self {
        Self {
            name: name.into(),
            description: None,
            resources: Vec::new(),
            outputs: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set the template description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The stack's name.
    pub fn name(&self) -> &StackName {
        &self.name
    }

    /// The stack's resource declarations, in declaration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Look up a declaration by logical id.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id.as_str() == id)
    }

    /// The stack's outputs.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Declared stack-level dependency edges.
    pub fn depends_on(&self) -> &[StackName] {
        &self.depends_on
    }

    /// Add a resource declaration, returning its logical id.
    pub fn add_resource(&mut self, resource: Resource) -> Result<LogicalId> {
        if self.resources.iter().any(|r| r.id == resource.id) {
            bail!(
                "stack '{}' already declares a resource with logical id '{}'",
                self.name,
                resource.id
            );
        }
        let id = resource.id.clone();
        self.resources.push(resource);
        Ok(id)
    }

    /// Add an output. Outputs are created once per stack evaluation and are
    /// immutable thereafter.
    pub fn add_output(&mut self, output: Output) -> Result<()> {
        if self.outputs.iter().any(|o| o.name == output.name) {
            bail!(
                "stack '{}' already exports an output named '{}'",
                self.name,
                output.name
            );
        }
        self.outputs.push(output);
        Ok(())
    }

    /// Declare an explicit dependency edge onto another stack.
    pub fn add_dependency(&mut self, stack: impl Into<StackName>) {
        let stack = stack.into();
        if stack != self.name && !self.depends_on.contains(&stack) {
            self.depends_on.push(stack);
        }
    }

    /// Check intra-stack consistency: every explicit resource edge must point
    /// at a declaration owned by this stack.
    pub fn validate(&self) -> Result<()> {
        for resource in &self.resources {
            for edge in &resource.depends_on {
                if !self.resources.iter().any(|r| &r.id == edge) {
                    bail!(
                        "resource '{}' in stack '{}' depends on unknown logical id '{}'",
                        resource.id,
                        self.name,
                        edge
                    );
                }
            }
        }
        Ok(())
    }

    /// Export names this stack makes visible to sibling stacks.
    pub fn exports(&self) -> impl Iterator<Item = &ExportName> {
        self.outputs.iter().map(|o| &o.export_name)
    }

    /// Export names this stack consumes from sibling stacks.
    pub fn imports(&self) -> Vec<ExportName> {
        let mut found = Vec::new();
        for resource in &self.resources {
            collect_imports(&resource.properties, &mut found);
        }
        for output in &self.outputs {
            collect_imports(&output.value.render(), &mut found);
        }
        found.dedup();
        found
    }

    /// Render the stack into a deployment template.
    pub fn template(&self) -> Value {
        let mut resources = Map::new();
        for resource in &self.resources {
            resources.insert(resource.id.to_string(), resource.render());
        }

        let mut outputs = Map::new();
        for output in &self.outputs {
            let mut body = Map::new();
            if let Some(description) = &output.description {
                body.insert("Description".to_string(), json!(description));
            }
            body.insert("Value".to_string(), output.value.render());
            body.insert(
                "Export".to_string(),
                json!({ "Name": output.export_name.as_str() }),
            );
            outputs.insert(output.name.clone(), Value::Object(body));
        }

        let mut template = Map::new();
        template.insert(
            "AWSTemplateFormatVersion".to_string(),
            json!("2010-09-09"),
        );
        if let Some(description) = &self.description {
            template.insert("Description".to_string(), json!(description));
        }
        template.insert("Resources".to_string(), Value::Object(resources));
        if !outputs.is_empty() {
            template.insert("Outputs".to_string(), Value::Object(outputs));
        }
        Value::Object(template)
    }
}

/// Walk a rendered property tree collecting `Fn::ImportValue` references.
fn collect_imports(value: &Value, found: &mut Vec<ExportName>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1
                && let Some(Value::String(name)) = map.get("Fn::ImportValue")
            {
                let name: ExportName = name.as_str().into();
                if !found.contains(&name) {
                    found.push(name);
                }
                return;
            }
            for nested in map.values() {
                collect_imports(nested, found);
            }
        }
        Value::Array(items) => {
            for nested in items {
                collect_imports(nested, found);
            }
        }
        _ => {}
    }
}
