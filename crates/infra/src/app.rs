//! The composition root's container: stacks, whole-graph validation, and
//! template synthesis.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::stack::{Output, Stack, StackName};

/// File name of the synthesis manifest written next to the templates.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Holds the stacks selected by the composition root and synthesizes them into
/// a deployable assembly. The graph is write-once: after [`App::synth`] the
/// templates are plain data for the deployment engine.
#[derive(Debug, Default)]
pub struct App {
    stacks: Vec<Stack>,
}

impl App {
    /// Create an empty app.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stacks added so far, in insertion order.
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Look up a stack by name.
    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name().as_str() == name)
    }

    /// Add a stack. Stack names must be unique within the deployment.
    pub fn add_stack(&mut self, stack: Stack) -> Result<()> {
        if self.stacks.iter().any(|s| s.name() == stack.name()) {
            bail!("a stack named '{}' was already added", stack.name());
        }
        self.stacks.push(stack);
        Ok(())
    }

    /// Validate the whole graph and render every stack into its template.
    ///
    /// Validation covers: per-stack consistency, resolvable dependency edges,
    /// acyclicity, and the invariant that a stack only consumes another
    /// stack's exports when a dependency edge (direct or transitive) onto the
    /// producer is declared.
    pub fn synth(&self) -> Result<Assembly> {
        for stack in &self.stacks {
            stack.validate()?;
        }
        self.validate_edges()?;
        let order = self.topological_order()?;
        self.validate_imports()?;

        let mut stacks = Vec::with_capacity(order.len());
        for index in order {
            let stack = &self.stacks[index];
            let template = stack.template();
            let digest = template_digest(&template)?;
            tracing::debug!(stack = %stack.name(), digest = %digest, "Stack template rendered");
            stacks.push(SynthesizedStack {
                name: stack.name().clone(),
                depends_on: stack.depends_on().to_vec(),
                outputs: stack.outputs().to_vec(),
                template,
                digest,
            });
        }

        tracing::info!(stack_count = stacks.len(), "Resource graph synthesized");
        Ok(Assembly {
            synthesized_at: chrono::Utc::now().to_rfc3339(),
            stacks,
        })
    }

    /// Every declared stack edge must point at a stack in this app.
    fn validate_edges(&self) -> Result<()> {
        let names: HashSet<&StackName> = self.stacks.iter().map(Stack::name).collect();
        for stack in &self.stacks {
            for edge in stack.depends_on() {
                if !names.contains(edge) {
                    bail!(
                        "stack '{}' depends on '{}', which is not part of this deployment",
                        stack.name(),
                        edge
                    );
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over the declared edges; insertion order breaks ties
    /// so synthesis is deterministic.
    fn topological_order(&self) -> Result<Vec<usize>> {
        let mut remaining_deps: Vec<usize> =
            self.stacks.iter().map(|s| s.depends_on().len()).collect();
        let mut order = Vec::with_capacity(self.stacks.len());
        let mut placed = vec![false; self.stacks.len()];

        while order.len() < self.stacks.len() {
            let Some(next) = (0..self.stacks.len())
                .find(|&i| !placed[i] && remaining_deps[i] == 0)
            else {
                let stuck: Vec<&str> = self
                    .stacks
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !placed[*i])
                    .map(|(_, s)| s.name().as_str())
                    .collect();
                bail!(
                    "dependency cycle between stacks: {}",
                    stuck.join(", ")
                );
            };

            placed[next] = true;
            order.push(next);
            let produced = self.stacks[next].name();
            for (i, stack) in self.stacks.iter().enumerate() {
                if !placed[i] && stack.depends_on().contains(produced) {
                    remaining_deps[i] -= 1;
                }
            }
        }

        Ok(order)
    }

    /// A stack cannot reference another stack's attributes unless an explicit
    /// dependency edge (direct or transitive) onto the producer exists.
    fn validate_imports(&self) -> Result<()> {
        for stack in &self.stacks {
            for import in stack.imports() {
                let Some(producer) = self
                    .stacks
                    .iter()
                    .find(|s| s.exports().any(|e| e == &import))
                else {
                    bail!(
                        "stack '{}' imports '{}', which no stack in this deployment exports",
                        stack.name(),
                        import
                    );
                };
                if producer.name() == stack.name() {
                    bail!(
                        "stack '{}' imports its own export '{}'",
                        stack.name(),
                        import
                    );
                }
                if !self.reaches(stack, producer.name()) {
                    bail!(
                        "stack '{}' imports '{}' from stack '{}' without declaring a dependency on it",
                        stack.name(),
                        import,
                        producer.name()
                    );
                }
            }
        }
        Ok(())
    }

    /// True when `target` is reachable from `from` through declared edges.
    fn reaches(&self, from: &Stack, target: &StackName) -> bool {
        let mut pending: Vec<&StackName> = from.depends_on().iter().collect();
        let mut seen: HashSet<&StackName> = HashSet::new();
        while let Some(name) = pending.pop() {
            if name == target {
                return true;
            }
            if !seen.insert(name) {
                continue;
            }
            if let Some(stack) = self.stack(name.as_str()) {
                pending.extend(stack.depends_on().iter());
            }
        }
        false
    }
}

/// One synthesized stack: rendered template plus the metadata the manifest and
/// the CLI summary need.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    /// Stack name.
    pub name: StackName,
    /// Declared stack-level edges.
    pub depends_on: Vec<StackName>,
    /// The stack's exported outputs.
    pub outputs: Vec<Output>,
    /// The rendered template.
    pub template: Value,
    /// Content digest of the rendered template.
    pub digest: String,
}

impl SynthesizedStack {
    /// File name the template is written under.
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }
}

/// The result of a synthesis pass, in apply order.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// RFC 3339 timestamp of the synthesis pass.
    pub synthesized_at: String,
    /// Synthesized stacks in topological (apply) order.
    pub stacks: Vec<SynthesizedStack>,
}

impl Assembly {
    /// Look up a synthesized stack by name.
    pub fn stack(&self, name: &str) -> Option<&SynthesizedStack> {
        self.stacks.iter().find(|s| s.name.as_str() == name)
    }

    /// The synthesis manifest: apply order, file names, and digests.
    pub fn manifest(&self) -> Value {
        let stacks: Vec<Value> = self
            .stacks
            .iter()
            .map(|stack| {
                json!({
                    "name": stack.name.as_str(),
                    "template_file": stack.template_file(),
                    "digest": stack.digest.clone(),
                    "depends_on": stack.depends_on.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        json!({
            "synthesized_at": self.synthesized_at.clone(),
            "stacks": stacks,
        })
    }

    /// Write one template file per stack plus the manifest into `dir`.
    pub fn write_to_dir(&self, dir: &PathBuf) -> Result<()> {
        std::fs::create_dir_all(dir)
            .context(format!("Failed to create output directory {}", dir.display()))?;

        for stack in &self.stacks {
            let path = dir.join(stack.template_file());
            let body = serde_json::to_string_pretty(&stack.template)
                .context("Failed to serialize stack template")?;
            std::fs::write(&path, body)
                .context(format!("Failed to write template to {}", path.display()))?;
            tracing::info!(stack = %stack.name, path = %path.display(), "Template written");
        }

        let manifest_path = dir.join(MANIFEST_FILENAME);
        let manifest = serde_json::to_string_pretty(&self.manifest())
            .context("Failed to serialize synthesis manifest")?;
        std::fs::write(&manifest_path, manifest).context(format!(
            "Failed to write manifest to {}",
            manifest_path.display()
        ))?;
        tracing::info!(path = %manifest_path.display(), "Manifest written");
        Ok(())
    }
}

/// Stable content digest of a rendered template.
fn template_digest(template: &Value) -> Result<String> {
    let canonical =
        serde_json::to_string(template).context("Failed to serialize template for hashing")?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest: String = hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect();
    Ok(format!("sha256:{}", digest))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::expr::Expr;
    use crate::resource::Resource;

    fn stack(name: &str) -> Stack {
        let mut stack = Stack::new(name);
        stack
            .add_resource(Resource::new(
                "Placeholder",
                "AWS::Test::Resource",
                json!({ "Name": name }),
            ))
            .unwrap();
        stack
    }

    #[test]
    fn test_duplicate_stack_name_is_rejected() {
        let mut app = App::new();
        app.add_stack(stack("demo-agent")).unwrap();
        let err = app.add_stack(stack("demo-agent")).unwrap_err();
        assert!(err.to_string().contains("demo-agent"));
    }

    #[test]
    fn test_synth_orders_dependencies_first() {
        let mut app = App::new();
        let mut agent = stack("demo-agent");
        agent.add_dependency("demo-registry");
        app.add_stack(agent).unwrap();
        app.add_stack(stack("demo-registry")).unwrap();

        let assembly = app.synth().unwrap();
        let order: Vec<&str> = assembly.stacks.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(order, vec!["demo-registry", "demo-agent"]);
    }

    #[test]
    fn test_synth_rejects_unknown_edge() {
        let mut app = App::new();
        let mut agent = stack("demo-agent");
        agent.add_dependency("demo-registry");
        app.add_stack(agent).unwrap();

        let err = app.synth().unwrap_err();
        assert!(err.to_string().contains("not part of this deployment"));
    }

    #[test]
    fn test_synth_rejects_cycle() {
        let mut app = App::new();
        let mut first = stack("demo-first");
        first.add_dependency("demo-second");
        let mut second = stack("demo-second");
        second.add_dependency("demo-first");
        app.add_stack(first).unwrap();
        app.add_stack(second).unwrap();

        let err = app.synth().unwrap_err();
        assert!(err.to_string().contains("dependency cycle"));
    }

    #[test]
    fn test_import_without_edge_is_rejected() {
        let mut app = App::new();

        let mut registry = stack("demo-registry");
        registry
            .add_output(Output::exported(
                "demo",
                "RegistryUri",
                Expr::get_att("Placeholder", "Uri"),
            ))
            .unwrap();
        app.add_stack(registry).unwrap();

        let mut agent = Stack::new("demo-agent");
        agent
            .add_resource(Resource::new(
                "AgentRuntime",
                "AWS::Test::Resource",
                json!({ "ContainerUri": Expr::import("demo-RegistryUri") }),
            ))
            .unwrap();
        app.add_stack(agent).unwrap();

        let err = app.synth().unwrap_err();
        assert!(err.to_string().contains("without declaring a dependency"));
    }

    #[test]
    fn test_import_with_transitive_edge_is_accepted() {
        let mut app = App::new();

        let mut registry = stack("demo-registry");
        registry
            .add_output(Output::exported(
                "demo",
                "RegistryUri",
                Expr::get_att("Placeholder", "Uri"),
            ))
            .unwrap();
        app.add_stack(registry).unwrap();

        let mut middle = stack("demo-middle");
        middle.add_dependency("demo-registry");
        app.add_stack(middle).unwrap();

        let mut agent = Stack::new("demo-agent");
        agent.add_dependency("demo-middle");
        agent
            .add_resource(Resource::new(
                "AgentRuntime",
                "AWS::Test::Resource",
                json!({ "ContainerUri": Expr::import("demo-RegistryUri") }),
            ))
            .unwrap();
        app.add_stack(agent).unwrap();

        app.synth().unwrap();
    }

    #[test]
    fn test_import_of_unknown_export_is_rejected() {
        let mut app = App::new();
        let mut agent = Stack::new("demo-agent");
        agent
            .add_resource(Resource::new(
                "AgentRuntime",
                "AWS::Test::Resource",
                json!({ "ContainerUri": Expr::import("demo-RegistryUri") }),
            ))
            .unwrap();
        app.add_stack(agent).unwrap();

        let err = app.synth().unwrap_err();
        assert!(err.to_string().contains("no stack in this deployment exports"));
    }

    #[test]
    fn test_template_digest_is_stable() {
        let mut app = App::new();
        app.add_stack(stack("demo-registry")).unwrap();

        let first = app.synth().unwrap();
        let second = app.synth().unwrap();
        assert_eq!(
            first.stack("demo-registry").unwrap().digest,
            second.stack("demo-registry").unwrap().digest
        );
        assert!(first.stack("demo-registry").unwrap().digest.starts_with("sha256:"));
    }

    #[test]
    fn test_manifest_lists_stacks_in_apply_order() {
        let mut app = App::new();
        let mut agent = stack("demo-agent");
        agent.add_dependency("demo-registry");
        app.add_stack(agent).unwrap();
        app.add_stack(stack("demo-registry")).unwrap();

        let manifest = app.synth().unwrap().manifest();
        assert_eq!(manifest["stacks"][0]["name"], json!("demo-registry"));
        assert_eq!(manifest["stacks"][1]["name"], json!("demo-agent"));
        assert_eq!(
            manifest["stacks"][1]["depends_on"],
            json!(["demo-registry"])
        );
    }
}
