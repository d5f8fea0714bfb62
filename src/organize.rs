//! Batch pipeline behind `docsort organize`
//!
//! list -> analyze each regular file -> group -> apply, all through the same
//! dispatcher and session checks the gateway uses.

use serde::Serialize;

use crate::dispatcher::{ToolDispatcher, ToolError};
use crate::organizer::{group_documents, ClassificationResult, Group, MoveOutcome};
use crate::protocol::FileSystemError;
use crate::session::Session;

#[derive(Debug, Serialize)]
pub struct OrganizeReport {
    /// Folder that was organized, relative to the root
    pub folder: String,
    pub files_info: Vec<ClassificationResult>,
    pub groups: Vec<Group>,
    #[serde(skip)]
    pub outcomes: Vec<MoveOutcome>,
}

impl OrganizeReport {
    pub fn moved_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, MoveOutcome::Moved { .. }))
            .count()
    }
}

/// Organize the regular, non-hidden files directly inside `path`
pub async fn organize(
    dispatcher: &ToolDispatcher,
    session: &Session,
    path: &str,
) -> Result<OrganizeReport, ToolError> {
    let validator = dispatcher.fs().validator();
    let dir = validator.validate(path, &session.sandbox)?;
    if !dir.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_string(),
        }
        .into());
    }
    let folder = validator.display_relative(&dir);

    let mut names = dispatcher
        .fs()
        .ops()
        .list_files(&folder, &session.sandbox)
        .await?;
    names.sort();

    let mut files_info = Vec::new();
    for name in names.iter().filter(|n| !n.starts_with('.')) {
        let relative = if folder.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", folder, name)
        };
        if !dir.join(name).is_file() {
            tracing::debug!("Skipping non-file entry '{}'", relative);
            continue;
        }
        match dispatcher.analyze(session, &relative).await {
            Ok(result) => files_info.push(result),
            Err(e) => tracing::warn!("Skipping '{}': {}", relative, e),
        }
    }
    tracing::info!("Analyzed {} file(s) in '{}'", files_info.len(), folder);

    let groups = group_documents(&files_info);
    let outcomes = dispatcher.apply_plan(session, &folder, &groups).await?;

    Ok(OrganizeReport {
        folder,
        files_info,
        groups,
        outcomes,
    })
}
