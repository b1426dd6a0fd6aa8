//! Deferred attribute references.
//!
//! Most resource attributes (ARNs, URLs, generated names) are assigned by the
//! deployment engine and are unknown while the graph is being composed. `Expr`
//! keeps those values symbolic until synthesis, where they render to the
//! engine's intrinsic forms. Only fully-literal expressions can be read as a
//! concrete string before apply.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

/// Logical id of a resource declaration, unique within its stack.
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
pub struct LogicalId(String);

impl From<&str> for LogicalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name under which a stack output is exported for cross-stack consumption.
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
pub struct ExportName(String);

impl From<&str> for ExportName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ExportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value that may not be known until the deployment engine has applied the
/// producing resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A concrete string, known at composition time.
    Lit(String),
    /// The default attribute of a resource in the same stack.
    Ref(LogicalId),
    /// A named attribute of a resource in the same stack.
    GetAtt(LogicalId, String),
    /// An output exported by another stack.
    Import(ExportName),
    /// Concatenation of sub-expressions.
    Concat(Vec<Expr>),
}

impl Expr {
    /// A literal value.
    pub fn lit(value: impl Into<String>) -> Self {
        Self::Lit(value.into())
    }

    /// Reference to a resource's default attribute.
    pub fn resource_ref(id: impl Into<LogicalId>) -> Self {
        Self::Ref(id.into())
    }

    /// Reference to a named attribute of a resource.
    pub fn get_att(id: impl Into<LogicalId>, attr: impl Into<String>) -> Self {
        Self::GetAtt(id.into(), attr.into())
    }

    /// Reference to another stack's exported output.
    pub fn import(name: impl Into<ExportName>) -> Self {
        Self::Import(name.into())
    }

    /// Concatenation of the given parts.
    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Self::Concat(parts.into_iter().collect())
    }

    /// Returns the concrete value when every part of the expression is a
    /// literal. Deferred references resolve only after the deployment engine
    /// has applied the producing resource, so they yield `None` here.
    pub fn as_literal(&self) -> Option<String> {
        match self {
            Self::Lit(value) => Some(value.clone()),
            Self::Concat(parts) => parts
                .iter()
                .map(Expr::as_literal)
                .collect::<Option<Vec<_>>>()
                .map(|parts| parts.join("")),
            Self::Ref(_) | Self::GetAtt(_, _) | Self::Import(_) => None,
        }
    }

    /// True when the value cannot be known before apply.
    pub fn is_deferred(&self) -> bool {
        self.as_literal().is_none()
    }

    /// Render the expression into the deployment engine's intrinsic form.
    pub fn render(&self) -> Value {
        match self {
            Self::Lit(value) => Value::String(value.clone()),
            Self::Ref(id) => json!({ "Ref": id.as_str() }),
            Self::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id.as_str(), attr] }),
            Self::Import(name) => json!({ "Fn::ImportValue": name.as_str() }),
            Self::Concat(parts) => {
                if let Some(value) = self.as_literal() {
                    return Value::String(value);
                }
                let parts: Vec<Value> = parts.iter().map(Expr::render).collect();
                json!({ "Fn::Join": ["", parts] })
            }
        }
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.render().serialize(serializer)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::Lit(value.to_string())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Self::Lit(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_renders_to_plain_string() {
        let expr = Expr::lit("demo");
        assert_eq!(expr.render(), json!("demo"));
        assert_eq!(expr.as_literal().as_deref(), Some("demo"));
        assert!(!expr.is_deferred());
    }

    #[test]
    fn test_ref_and_get_att_are_deferred() {
        let by_ref = Expr::resource_ref("AgentRepository");
        assert_eq!(by_ref.render(), json!({ "Ref": "AgentRepository" }));
        assert!(by_ref.is_deferred());

        let by_att = Expr::get_att("AgentRepository", "RepositoryUri");
        assert_eq!(
            by_att.render(),
            json!({ "Fn::GetAtt": ["AgentRepository", "RepositoryUri"] })
        );
        assert!(by_att.as_literal().is_none());
    }

    #[test]
    fn test_import_renders_export_name() {
        let expr = Expr::import("demo-RegistryUri");
        assert_eq!(expr.render(), json!({ "Fn::ImportValue": "demo-RegistryUri" }));
        assert!(expr.is_deferred());
    }

    #[test]
    fn test_all_literal_concat_folds_to_string() {
        let expr = Expr::concat([Expr::lit("a"), Expr::lit("b"), Expr::lit("c")]);
        assert_eq!(expr.render(), json!("abc"));
        assert_eq!(expr.as_literal().as_deref(), Some("abc"));
    }

    #[test]
    fn test_mixed_concat_renders_join() {
        let expr = Expr::concat([
            Expr::get_att("AgentRepository", "RepositoryUri"),
            Expr::lit(":latest"),
        ]);
        assert!(expr.is_deferred());
        assert_eq!(
            expr.render(),
            json!({
                "Fn::Join": [
                    "",
                    [{ "Fn::GetAtt": ["AgentRepository", "RepositoryUri"] }, ":latest"]
                ]
            })
        );
    }

    #[test]
    fn test_expr_serializes_as_rendered_form() {
        let value = serde_json::to_value(Expr::resource_ref("SearchApiSecret")).unwrap();
        assert_eq!(value, json!({ "Ref": "SearchApiSecret" }));
    }
}
