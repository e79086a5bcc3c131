//! Workflow Engine — runs a parsed document step by step: resolves each
//! step's input, substitutes `$name` variables into its actions, dispatches
//! to one or more models, and routes the result to its destinations.
//!
//! Single-threaded by construction: one engine instance owns the
//! last-output slot and the variable map exclusively for the lifetime of a
//! single run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::{Config, ModelMode, ServerSettings};
use crate::db::DatabaseHandler;
use crate::error::ComandaError;
use crate::input::{self, ResolvedInput};
use crate::providers::{FilePayload, ProviderRegistry};
use crate::sandbox;
use crate::workflow::progress::{ProgressSender, ProgressUpdate};
use crate::workflow::schema::{self, OutputItem, StepConfig, TypedInput, WorkflowDocument, NA, STDIN, STDOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Text,
    Vision,
    File,
    Multi,
    Empty,
}

impl InputKind {
    fn required_mode(self) -> Option<ModelMode> {
        match self {
            InputKind::Text => Some(ModelMode::Text),
            InputKind::Vision => Some(ModelMode::Vision),
            InputKind::File => Some(ModelMode::File),
            InputKind::Multi => Some(ModelMode::Multi),
            InputKind::Empty => None,
        }
    }
}

fn classify(resolved: &ResolvedInput) -> InputKind {
    match resolved {
        ResolvedInput::Text(t) if t.is_empty() => InputKind::Empty,
        ResolvedInput::Text(_) => InputKind::Text,
        ResolvedInput::Image { .. } => InputKind::Vision,
        ResolvedInput::File { .. } => InputKind::File,
        ResolvedInput::Directory(_) => InputKind::Multi,
        ResolvedInput::Empty => InputKind::Empty,
    }
}

/// A workflow engine bound to one document and one run.
pub struct Engine {
    document: WorkflowDocument,
    config: Config,
    #[allow(dead_code)]
    server_settings: ServerSettings,
    verbose: bool,
    runtime_dir: Option<PathBuf>,
    last_output: String,
    variables: HashMap<String, String>,
    registry: ProviderRegistry,
    db: DatabaseHandler,
    progress: Option<ProgressSender>,
}

static VAR_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();

fn var_regex() -> &'static Regex {
    VAR_RE.get_or_init(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

/// Construct an engine bound to `document`, with a scratch `runtime_dir`
/// for request-scoped artifacts (sandbox root for output routing, when
/// present).
pub fn new_engine(
    document: WorkflowDocument,
    config: Config,
    server_settings: ServerSettings,
    verbose: bool,
    runtime_dir: Option<PathBuf>,
) -> Engine {
    let mut registry = ProviderRegistry::new();
    registry.configure_from(&config.providers);
    Engine {
        document,
        config,
        server_settings,
        verbose,
        runtime_dir,
        last_output: String::new(),
        variables: HashMap::new(),
        registry,
        db: DatabaseHandler::new(),
        progress: None,
    }
}

impl Engine {
    pub fn set_last_output(&mut self, text: impl Into<String>) {
        self.last_output = text.into();
    }

    pub fn last_output(&self) -> &str {
        &self.last_output
    }

    pub fn set_progress_writer(&mut self, sink: ProgressSender) {
        self.progress = Some(sink);
    }

    async fn emit(&self, update: ProgressUpdate) {
        if let Some(sink) = &self.progress {
            let _ = sink.send(update).await;
        }
    }

    /// Execute every step in declared order; fail-fast on the first error.
    pub async fn run(&mut self) -> Result<(), ComandaError> {
        let step_names: Vec<String> = self.document.keys().cloned().collect();

        for name in step_names {
            let step = self.document.get(&name).expect("step present").clone();
            self.emit(ProgressUpdate::Step(name.clone())).await;

            self.run_step(&name, &step).await?;
        }
        Ok(())
    }

    async fn run_step(&mut self, step_name: &str, step: &StepConfig) -> Result<(), ComandaError> {
        self.emit(ProgressUpdate::Spinner(format!("running {step_name}"))).await;

        // 1-2. Resolve input.
        let (resolved, file_payload) = self.resolve_input(step).await?;

        // 3. Classify input kind.
        let kind = classify(&resolved);

        // 4. Substitute variables in action text.
        let actions: Vec<String> = step
            .action
            .items()
            .iter()
            .map(|a| self.substitute(a))
            .collect();
        let action_text = actions.join("\n");

        // 5. Compose prompt: joined actions, then the resolved input text.
        let input_text = resolved.as_text();
        let prompt = if input_text.is_empty() {
            action_text.clone()
        } else {
            format!("{action_text}\n{input_text}")
        };

        // 6-7. Select provider(s), dispatch, aggregate.
        let aggregated = if step.model.is_na() {
            input_text.clone()
        } else {
            self.dispatch_models(step_name, &step.model.items(), kind, &prompt, file_payload.as_ref())
                .await?
        };

        // 8. Route output.
        self.route_output(step, &aggregated).await?;

        // 9. Update last-output slot.
        self.last_output = aggregated;

        Ok(())
    }

    async fn resolve_input(
        &mut self,
        step: &StepConfig,
    ) -> Result<(ResolvedInput, Option<FilePayload>), ComandaError> {
        if let Some(typed) = step.input.typed() {
            return self.resolve_typed_input(typed).await;
        }

        let items = step.input.items();
        if items.len() == 1 {
            let (source, alias) = schema::parse_alias(&items[0]);
            let resolved = self.resolve_scalar_input(source).await?;
            if let Some(var) = alias {
                self.variables.insert(var.to_string(), resolved.as_text());
            }
            let payload = file_payload_for(&resolved);
            Ok((resolved, payload))
        } else {
            let mut parts = Vec::with_capacity(items.len());
            for item in &items {
                let (source, alias) = schema::parse_alias(item);
                let resolved = self.resolve_scalar_input(source).await?;
                if let Some(var) = alias {
                    self.variables.insert(var.to_string(), resolved.as_text());
                }
                parts.push(resolved);
            }
            Ok((ResolvedInput::Directory(parts), None))
        }
    }

    async fn resolve_scalar_input(&self, source: &str) -> Result<ResolvedInput, ComandaError> {
        match source {
            STDIN => Ok(ResolvedInput::Text(self.last_output.clone())),
            NA => Ok(ResolvedInput::Empty),
            path => input::resolve_path(Path::new(path)),
        }
    }

    async fn resolve_typed_input(
        &self,
        typed: &TypedInput,
    ) -> Result<(ResolvedInput, Option<FilePayload>), ComandaError> {
        match typed {
            TypedInput::Url { url } => {
                let resolved = input::resolve_url(url).await?;
                Ok((resolved, None))
            }
            TypedInput::Database { database } => {
                let db_name = database.database.clone().unwrap_or_default();
                let settings = self
                    .config
                    .databases
                    .get(&db_name)
                    .ok_or_else(|| ComandaError::NotFound(format!("database '{db_name}' not configured")))?;
                let text = self.db.execute_read(&db_name, settings, &database.query).await?;
                Ok((ResolvedInput::Text(text), None))
            }
            TypedInput::Screenshot { screenshot } => {
                if !screenshot {
                    return Ok((ResolvedInput::Empty, None));
                }
                let resolved = input::capture_screenshot()?;
                let payload = file_payload_for(&resolved);
                Ok((resolved, payload))
            }
            TypedInput::Path { path } => {
                let resolved = input::resolve_path(Path::new(path))?;
                let payload = file_payload_for(&resolved);
                Ok((resolved, payload))
            }
        }
    }

    fn substitute(&self, text: &str) -> String {
        var_regex()
            .replace_all(text, |caps: &regex::Captures| {
                self.variables.get(&caps[1]).cloned().unwrap_or_default()
            })
            .to_string()
    }

    async fn dispatch_models(
        &self,
        step_name: &str,
        models: &[String],
        kind: InputKind,
        prompt: &str,
        file: Option<&FilePayload>,
    ) -> Result<String, ComandaError> {
        let mut sections = Vec::with_capacity(models.len());

        for model in models {
            let entry = self.find_model_entry(model).ok_or_else(|| {
                ComandaError::Validation(format!("step '{step_name}': unknown model '{model}'"))
            })?;

            if let Some(required) = kind.required_mode() {
                if !entry.supports(required) {
                    return Err(ComandaError::Validation(format!(
                        "step '{step_name}': model '{model}' does not support {required:?} input"
                    )));
                }
            }

            let adapter = self.registry.resolve(model)?;
            let response = match (kind, file) {
                (InputKind::Vision | InputKind::File, Some(payload)) => {
                    adapter.send_prompt_with_file(model, "", prompt, payload).await?
                }
                _ => adapter.send_text_prompt(model, "", prompt).await?,
            };
            sections.push((model.clone(), response.text));
        }

        if sections.len() == 1 {
            Ok(sections.into_iter().next().unwrap().1)
        } else {
            let mut out = String::new();
            for (model, text) in sections {
                out.push_str(&format!("### {model}\n{text}\n\n"));
            }
            Ok(out)
        }
    }

    fn find_model_entry(&self, model: &str) -> Option<crate::config::ModelEntry> {
        self.config
            .providers
            .values()
            .flat_map(|p| p.models.iter())
            .find(|m| m.name == model)
            .cloned()
    }

    async fn route_output(&mut self, step: &StepConfig, aggregated: &str) -> Result<(), ComandaError> {
        for item in step.output.items() {
            match item {
                OutputItem::Database { database } => {
                    let db_name = database.database.clone().unwrap_or_default();
                    let settings = self
                        .config
                        .databases
                        .get(&db_name)
                        .ok_or_else(|| ComandaError::NotFound(format!("database '{db_name}' not configured")))?
                        .clone();
                    self.insert_rows(&db_name, &settings, &database.table, aggregated).await?;
                }
                OutputItem::Named(raw) => {
                    let (dest, alias) = schema::parse_alias(&raw);
                    if let Some(var) = alias {
                        self.variables.insert(var.to_string(), aggregated.to_string());
                    }
                    match dest {
                        STDOUT => self.emit(ProgressUpdate::Output(aggregated.to_string())).await,
                        path => self.write_output_file(path, aggregated)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn write_output_file(&self, path: &str, text: &str) -> Result<(), ComandaError> {
        let resolved = if let Some(root) = &self.runtime_dir {
            sandbox::validate_path(root, path)?
        } else {
            PathBuf::from(path)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ComandaError::ConfigIo(format!("creating {}: {e}", parent.display())))?;
        }
        std::fs::write(&resolved, text)
            .map_err(|e| ComandaError::ConfigIo(format!("writing {}: {e}", resolved.display())))
    }

    async fn insert_rows(
        &self,
        db_name: &str,
        settings: &crate::config::DatabaseSettings,
        table: &str,
        text: &str,
    ) -> Result<(), ComandaError> {
        if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ComandaError::Validation(format!("invalid table name '{table}'")));
        }
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let row: serde_json::Value = serde_json::from_str(line)
                .map_err(|e| ComandaError::Validation(format!("output row is not valid JSON: {e}")))?;
            let object = row
                .as_object()
                .ok_or_else(|| ComandaError::Validation("output row must be a JSON object".to_string()))?;

            let columns: Vec<&String> = object.keys().collect();
            if columns.iter().any(|c| !c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')) {
                return Err(ComandaError::Validation("invalid column name in output row".to_string()));
            }
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", "),
                placeholders.join(", ")
            );
            let values: Vec<String> = columns.iter().map(|c| object[*c].to_string()).collect();
            let rendered = values.iter().enumerate().fold(sql, |acc, (i, v)| {
                acc.replacen(&format!("${}", i + 1), &format!("'{}'", v.replace('\'', "''")), 1)
            });
            self.db.execute_write(db_name, settings, &rendered).await?;
        }
        Ok(())
    }
}

fn file_payload_for(resolved: &ResolvedInput) -> Option<FilePayload> {
    match resolved {
        ResolvedInput::Image { data_uri, mime } => Some(FilePayload {
            data_uri: Some(data_uri.clone()),
            bytes: None,
            mime: mime.clone(),
        }),
        ResolvedInput::File { path, mime } => std::fs::read(path).ok().map(|bytes| FilePayload {
            data_uri: None,
            bytes: Some(bytes),
            mime: mime.clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_input_kinds() {
        assert_eq!(classify(&ResolvedInput::Text("hi".into())), InputKind::Text);
        assert_eq!(classify(&ResolvedInput::Text(String::new())), InputKind::Empty);
        assert_eq!(classify(&ResolvedInput::Empty), InputKind::Empty);
        assert_eq!(
            classify(&ResolvedInput::Image { data_uri: "data:image/png;base64,x".into(), mime: "image/png".into() }),
            InputKind::Vision
        );
    }

    #[tokio::test]
    async fn model_na_skips_dispatch_and_passes_input_through() {
        let doc = schema::parse(
            r#"
step:
  input: STDIN
  model: NA
  action: "echo"
  output: STDOUT
"#,
        )
        .unwrap();
        let mut engine = new_engine(doc, Config::default(), ServerSettings::default(), false, None);
        engine.set_last_output("42");
        engine.run().await.unwrap();
        assert_eq!(engine.last_output(), "42");
    }

    #[tokio::test]
    async fn writes_output_to_file_within_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let doc = schema::parse(
            r#"
step:
  input: STDIN
  model: NA
  action: "echo"
  output: out.txt
"#,
        )
        .unwrap();
        let mut engine = new_engine(
            doc,
            Config::default(),
            ServerSettings::default(),
            false,
            Some(dir.path().to_path_buf()),
        );
        engine.set_last_output("42");
        engine.run().await.unwrap();
        let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(content, "42");
    }
}
