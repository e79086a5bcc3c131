//! Workflow document schema — a name-ordered mapping of step name to
//! [`StepConfig`], parsed with a single ordered-mapping-aware pass
//! (`IndexMap` preserves YAML's declared key order; no second reshaping
//! pass is needed).

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ComandaError;

pub const STDIN: &str = "STDIN";
pub const NA: &str = "NA";
pub const STDOUT: &str = "STDOUT";

/// The full parsed document: step name → config, in declared order.
pub type WorkflowDocument = IndexMap<String, StepConfig>;

/// Parse a YAML workflow document and validate it has at least one step.
pub fn parse(yaml: &str) -> Result<WorkflowDocument, ComandaError> {
    let document: WorkflowDocument = serde_yaml::from_str(yaml)
        .map_err(|e| ComandaError::Validation(format!("invalid workflow document: {e}")))?;
    validate(&document)?;
    Ok(document)
}

fn validate(document: &WorkflowDocument) -> Result<(), ComandaError> {
    if document.is_empty() {
        return Err(ComandaError::Validation("workflow must have at least one step".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub input: InputSpec,
    pub model: ModelSpec,
    pub action: ActionSpec,
    pub output: OutputSpec,
    #[serde(default)]
    pub next_action: Option<serde_yaml::Value>,
}

/// A `database` input: a read query against a logical database name.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseQuerySpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub query: String,
    pub database: Option<String>,
}

/// A `database` output: an insert target.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseTableSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub table: String,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypedInput {
    Url { url: String },
    Database { database: DatabaseQuerySpec },
    Screenshot { screenshot: bool },
    Path { path: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InputSpec {
    One(String),
    Many(Vec<String>),
    Typed(TypedInput),
}

impl InputSpec {
    /// Flatten to an ordered list of scalar input items; typed inputs are
    /// handled separately via [`InputSpec::typed`].
    pub fn items(&self) -> Vec<String> {
        match self {
            InputSpec::One(s) => vec![s.clone()],
            InputSpec::Many(v) => v.clone(),
            InputSpec::Typed(_) => vec![],
        }
    }

    pub fn typed(&self) -> Option<&TypedInput> {
        match self {
            InputSpec::Typed(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModelSpec {
    One(String),
    Many(Vec<String>),
}

impl ModelSpec {
    /// Normalized model list; `["NA"]` signals "no model dispatch".
    pub fn items(&self) -> Vec<String> {
        match self {
            ModelSpec::One(s) => vec![s.clone()],
            ModelSpec::Many(v) => v.clone(),
        }
    }

    pub fn is_na(&self) -> bool {
        let items = self.items();
        items.len() == 1 && items[0] == NA
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ActionSpec {
    One(String),
    Many(Vec<String>),
}

impl ActionSpec {
    pub fn items(&self) -> Vec<String> {
        match self {
            ActionSpec::One(s) => vec![s.clone()],
            ActionSpec::Many(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutputItem {
    Database { database: DatabaseTableSpec },
    Named(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    One(OutputItem),
    Many(Vec<OutputItem>),
}

impl OutputSpec {
    pub fn items(&self) -> Vec<OutputItem> {
        match self {
            OutputSpec::One(i) => vec![i.clone()],
            OutputSpec::Many(v) => v.clone(),
        }
    }
}

/// Split a `<source> as $<var>` clause into its source and the bound
/// variable name, if present.
pub fn parse_alias(raw: &str) -> (&str, Option<&str>) {
    match raw.rsplit_once(" as $") {
        Some((source, var)) if !var.is_empty() => (source.trim(), Some(var.trim())),
        _ => (raw, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_step_scalar_fields() {
        let yaml = r#"
step:
  input: STDIN
  model: gpt-4o
  action: "reverse:"
  output: STDOUT
"#;
        let doc = parse(yaml).unwrap();
        assert_eq!(doc.len(), 1);
        let step = &doc["step"];
        assert_eq!(step.input.items(), vec!["STDIN".to_string()]);
        assert_eq!(step.model.items(), vec!["gpt-4o".to_string()]);
    }

    #[test]
    fn preserves_declared_order() {
        let yaml = r#"
first:
  input: STDIN
  model: NA
  action: a
  output: STDOUT
second:
  input: STDIN
  model: NA
  action: b
  output: STDOUT
"#;
        let doc = parse(yaml).unwrap();
        let names: Vec<_> = doc.keys().cloned().collect();
        assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn rejects_empty_document() {
        assert!(parse("{}").is_err());
    }

    #[test]
    fn alias_clause_splits_source_and_var() {
        assert_eq!(parse_alias("input.txt as $doc"), ("input.txt", Some("doc")));
        assert_eq!(parse_alias("input.txt"), ("input.txt", None));
    }

    #[test]
    fn model_na_detected() {
        let spec = ModelSpec::One("NA".to_string());
        assert!(spec.is_na());
        let spec = ModelSpec::One("gpt-4o".to_string());
        assert!(!spec.is_na());
    }
}
