//! Operation catalog and dispatch
//!
//! Operations are a closed enum. Names only matter at the transport edge,
//! where an unknown name and any failure become an `ERROR: ...` value.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::classifier::{Analyzer, Classifier, ThemeNamer};
use crate::filesystem::FileSystemService;
use crate::organizer::{group_documents, ClassificationResult, Group, MoveOutcome, MovePlanner};
use crate::protocol::{FileSystemError, ToolDescriptor, ToolOutput};
use crate::session::Session;

/// Listing sentinel for a directory with no entries
pub const EMPTY_DIRECTORY: &str = "(empty directory)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    SetSandboxLimit,
    ListFiles,
    CreateDirectory,
    MoveFile,
    ExtractPreview,
    AnalyzeFile,
    GroupFiles,
    ApplyFilePlan,
}

impl ToolKind {
    pub const ALL: [ToolKind; 8] = [
        ToolKind::SetSandboxLimit,
        ToolKind::ListFiles,
        ToolKind::CreateDirectory,
        ToolKind::MoveFile,
        ToolKind::ExtractPreview,
        ToolKind::AnalyzeFile,
        ToolKind::GroupFiles,
        ToolKind::ApplyFilePlan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::SetSandboxLimit => "set_sandbox_limit",
            ToolKind::ListFiles => "list_files",
            ToolKind::CreateDirectory => "create_directory",
            ToolKind::MoveFile => "move_file",
            ToolKind::ExtractPreview => "extract_preview",
            ToolKind::AnalyzeFile => "analyze_file",
            ToolKind::GroupFiles => "group_files",
            ToolKind::ApplyFilePlan => "apply_file_plan",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::SetSandboxLimit => {
                "Restrict every later operation of this session to a folder (relative to the root)."
            }
            ToolKind::ListFiles => {
                "List entry names of a folder. Use an empty string for the root; never '/' or '/home'."
            }
            ToolKind::CreateDirectory => "Create a folder (and its parents) if it does not exist.",
            ToolKind::MoveFile => {
                "Move a file. Both paths are relative to the root; existing files are never overwritten."
            }
            ToolKind::ExtractPreview => "First 4000 characters of a .txt, .md, .log, .pdf or .docx file.",
            ToolKind::AnalyzeFile => "Classify a file into {path, type, date, keywords}.",
            ToolKind::GroupFiles => "Group classification results by type and keyword set.",
            ToolKind::ApplyFilePlan => {
                "Move grouped files into <root>/<type>/<theme>/ folders without overwriting."
            }
        }
    }

    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            ToolKind::SetSandboxLimit => &["limit_path"],
            ToolKind::ListFiles
            | ToolKind::CreateDirectory
            | ToolKind::ExtractPreview
            | ToolKind::AnalyzeFile => &["path"],
            ToolKind::MoveFile => &["source_path", "destination_path"],
            ToolKind::GroupFiles => &["files_info"],
            ToolKind::ApplyFilePlan => &["root", "groups"],
        }
    }

    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// A fully parsed operation request
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    SetSandboxLimit {
        limit_path: String,
    },
    ListFiles {
        #[serde(default)]
        path: String,
    },
    CreateDirectory {
        path: String,
    },
    MoveFile {
        source_path: String,
        destination_path: String,
    },
    ExtractPreview {
        path: String,
    },
    AnalyzeFile {
        path: String,
    },
    GroupFiles {
        files_info: Vec<ClassificationResult>,
    },
    ApplyFilePlan {
        #[serde(default)]
        root: String,
        groups: Vec<Group>,
    },
}

impl ToolCall {
    /// Parse a name plus flat argument map
    pub fn parse(name: &str, arguments: Map<String, Value>) -> Result<Self, ToolError> {
        let kind = ToolKind::from_name(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        serde_json::from_value(json!({ "name": name, "arguments": arguments })).map_err(|e| {
            ToolError::InvalidArguments {
                tool: kind.name(),
                message: e.to_string(),
            }
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolCall::SetSandboxLimit { .. } => ToolKind::SetSandboxLimit,
            ToolCall::ListFiles { .. } => ToolKind::ListFiles,
            ToolCall::CreateDirectory { .. } => ToolKind::CreateDirectory,
            ToolCall::MoveFile { .. } => ToolKind::MoveFile,
            ToolCall::ExtractPreview { .. } => ToolKind::ExtractPreview,
            ToolCall::AnalyzeFile { .. } => ToolKind::AnalyzeFile,
            ToolCall::GroupFiles { .. } => ToolKind::GroupFiles,
            ToolCall::ApplyFilePlan { .. } => ToolKind::ApplyFilePlan,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown operation '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: &'static str, message: String },
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),
    #[error("could not encode result: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ToolError {
    /// Wire form: list operations answer with a one-element list
    pub fn to_output(&self, kind: Option<ToolKind>) -> ToolOutput {
        let text = format!("ERROR: {}", self);
        match kind {
            Some(ToolKind::ListFiles) => ToolOutput::Lines(vec![text]),
            _ => ToolOutput::Text(text),
        }
    }
}

pub struct ToolDispatcher {
    fs: Arc<FileSystemService>,
    analyzer: Analyzer,
    planner: MovePlanner,
}

impl ToolDispatcher {
    pub fn new(
        fs: Arc<FileSystemService>,
        classifier: Arc<dyn Classifier>,
        namer: Arc<dyn ThemeNamer>,
    ) -> Self {
        Self {
            fs,
            analyzer: Analyzer::new(classifier),
            planner: MovePlanner::new(namer),
        }
    }

    pub fn fs(&self) -> &FileSystemService {
        &self.fs
    }

    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        ToolKind::ALL.iter().map(|kind| kind.descriptor()).collect()
    }

    /// Transport entry point: never fails, errors come back as values
    pub async fn call_named(
        &self,
        session: &mut Session,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ToolOutput {
        let kind = ToolKind::from_name(name);
        let result = match ToolCall::parse(name, arguments) {
            Ok(call) => self.call(session, call).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            match &e {
                ToolError::FileSystem(err) if err.is_boundary_violation() => {
                    tracing::info!("Operation '{}' denied: {}", name, e)
                }
                _ => tracing::debug!("Operation '{}' failed: {}", name, e),
            }
            e.to_output(kind)
        })
    }

    pub async fn call(&self, session: &mut Session, call: ToolCall) -> Result<ToolOutput, ToolError> {
        tracing::debug!("Dispatching {}", call.kind().name());
        match call {
            ToolCall::SetSandboxLimit { limit_path } => {
                self.fs
                    .validator()
                    .set_sandbox_limit(&mut session.sandbox, &limit_path)?;
                Ok(ToolOutput::Text(format!(
                    "SUCCESS: sandbox limit set to '{}'",
                    limit_path
                )))
            }
            ToolCall::ListFiles { path } => {
                let names = self.fs.ops().list_files(&path, &session.sandbox).await?;
                if names.is_empty() {
                    Ok(ToolOutput::Lines(vec![EMPTY_DIRECTORY.to_string()]))
                } else {
                    Ok(ToolOutput::Lines(names))
                }
            }
            ToolCall::CreateDirectory { path } => {
                self.fs
                    .ops()
                    .create_directory(&path, &session.sandbox)
                    .await?;
                Ok(ToolOutput::Text("SUCCESS".to_string()))
            }
            ToolCall::MoveFile {
                source_path,
                destination_path,
            } => {
                let target = self
                    .fs
                    .ops()
                    .move_file(&source_path, &destination_path, &session.sandbox)
                    .await?;
                Ok(ToolOutput::Text(format!(
                    "SUCCESS: moved to '{}'",
                    self.fs.validator().display_relative(&target)
                )))
            }
            ToolCall::ExtractPreview { path } => {
                let preview = self.fs.preview(&path, &session.sandbox).await?;
                Ok(ToolOutput::Text(preview.to_string()))
            }
            ToolCall::AnalyzeFile { path } => {
                let result = self.analyze(session, &path).await?;
                Ok(ToolOutput::Json(serde_json::to_value(result)?))
            }
            ToolCall::GroupFiles { files_info } => {
                let groups = group_documents(&files_info);
                Ok(ToolOutput::Json(json!({ "groups": serde_json::to_value(groups)? })))
            }
            ToolCall::ApplyFilePlan { root, groups } => {
                let outcomes = self.apply_plan(session, &root, &groups).await?;
                Ok(ToolOutput::Json(json!({ "moved": self.outcomes_to_json(&outcomes) })))
            }
        }
    }

    /// Classify one validated file; the reported path is relative to the root
    pub async fn analyze(
        &self,
        session: &Session,
        path: &str,
    ) -> Result<ClassificationResult, ToolError> {
        let resolved = self.fs.validator().validate(path, &session.sandbox)?;
        if !resolved.is_file() {
            return Err(FileSystemError::NotAFile {
                path: path.to_string(),
            }
            .into());
        }
        let reported = self.fs.validator().display_relative(&resolved);
        Ok(self.analyzer.analyze(&self.fs, &resolved, reported).await)
    }

    /// Apply groups under a validated plan root; sources are validated one by one
    pub async fn apply_plan(
        &self,
        session: &Session,
        root: &str,
        groups: &[Group],
    ) -> Result<Vec<MoveOutcome>, ToolError> {
        let plan_root = self.fs.validator().validate(root, &session.sandbox)?;
        if !plan_root.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: root.to_string(),
            }
            .into());
        }

        let validator = self.fs.validator();
        let sandbox = &session.sandbox;
        Ok(self
            .planner
            .apply_plan(&plan_root, groups, |source| validator.validate(source, sandbox))
            .await)
    }

    /// `{from, to}` with `to` relative to the root, or `{from, error}`
    pub fn outcomes_to_json(&self, outcomes: &[MoveOutcome]) -> Vec<Value> {
        outcomes
            .iter()
            .map(|outcome| match outcome {
                MoveOutcome::Moved { from, to } => json!({
                    "from": from,
                    "to": self.fs.validator().display_relative(to),
                }),
                MoveOutcome::Failed { from, error } => json!({
                    "from": from,
                    "error": error,
                }),
            })
            .collect()
    }
}
