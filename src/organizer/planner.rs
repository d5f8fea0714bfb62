use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classifier::ThemeNamer;
use crate::filesystem::operations::safe_move;
use crate::filesystem::security::{is_within, resolve_lenient};
use crate::protocol::FileSystemError;

use super::grouping::{ordered_keywords, Group};
use super::slug::{slug_or_empty, slugify, FALLBACK_SLUG};

/// Topic folder for groups without keywords
pub const NO_THEME_FOLDER: &str = "sans-theme";

/// Words kept from a generated theme name
const THEME_NAME_WORDS: usize = 2;

/// Result of one file move in a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { from: String, to: PathBuf },
    Failed { from: String, error: String },
}

/// Turns groups into `root/<type>/<topic>/` folders and moves their files
pub struct MovePlanner {
    namer: Arc<dyn ThemeNamer>,
}

impl MovePlanner {
    pub fn new(namer: Arc<dyn ThemeNamer>) -> Self {
        Self { namer }
    }

    /// Folder name for a group's theme.
    ///
    /// Asks the namer first and keeps at most two words of its answer; falls
    /// back to the first keyword, then to `misc`.
    pub async fn topic_folder(&self, doc_type: &str, keywords: &[String]) -> String {
        let keywords = ordered_keywords(keywords);
        if keywords.is_empty() {
            return NO_THEME_FOLDER.to_string();
        }

        match self.namer.name_theme(doc_type, &keywords).await {
            Ok(answer) => {
                let short: Vec<&str> = answer.split_whitespace().take(THEME_NAME_WORDS).collect();
                let slug = slug_or_empty(&short.join(" "));
                if !slug.is_empty() {
                    return slug;
                }
                tracing::debug!("Theme name '{}' reduced to nothing, using keyword", answer);
            }
            Err(e) => {
                tracing::warn!("Theme naming for '{}' failed, using keyword: {}", doc_type, e);
            }
        }

        let first = slug_or_empty(&keywords[0]);
        if first.is_empty() {
            FALLBACK_SLUG.to_string()
        } else {
            first
        }
    }

    /// Apply groups under `root`, in order.
    ///
    /// `resolve_source` authorizes each member path. Every file is moved
    /// independently: a failure is recorded and the rest of the plan goes on.
    pub async fn apply_plan<F>(
        &self,
        root: &Path,
        groups: &[Group],
        resolve_source: F,
    ) -> Vec<MoveOutcome>
    where
        F: Fn(&str) -> Result<PathBuf, FileSystemError>,
    {
        let mut outcomes = Vec::new();

        for group in groups {
            let type_folder = slugify(&group.doc_type);
            let topic_folder = self.topic_folder(&group.doc_type, &group.keywords).await;
            let relative = format!("{}/{}", type_folder, topic_folder);

            let target_dir = match prepare_target_dir(root, &relative).await {
                Ok(dir) => dir,
                Err(e) => {
                    tracing::warn!("Target '{}' rejected: {}", relative, e);
                    let error = e.to_string();
                    outcomes.extend(group.files.iter().map(|from| MoveOutcome::Failed {
                        from: from.clone(),
                        error: error.clone(),
                    }));
                    continue;
                }
            };

            for from in &group.files {
                let moved = match resolve_source(from) {
                    Ok(source) => safe_move(&source, &target_dir).await,
                    Err(e) => Err(e),
                };
                match moved {
                    Ok(to) => outcomes.push(MoveOutcome::Moved {
                        from: from.clone(),
                        to,
                    }),
                    Err(e) => {
                        tracing::warn!("Move of '{}' failed: {}", from, e);
                        outcomes.push(MoveOutcome::Failed {
                            from: from.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        outcomes
    }
}

/// Create `root/relative` and return its canonical form.
///
/// Existing components may be symlinks, so containment in `root` is checked
/// before anything is created and again on the created directory.
async fn prepare_target_dir(root: &Path, relative: &str) -> Result<PathBuf, FileSystemError> {
    let outside = || FileSystemError::OutsideRoot {
        attempted_path: relative.to_string(),
    };

    let planned = resolve_lenient(&root.join(relative)).map_err(FileSystemError::io)?;
    if !is_within(&planned, root) {
        return Err(outside());
    }

    tokio::fs::create_dir_all(&planned)
        .await
        .map_err(FileSystemError::io)?;

    let created = tokio::fs::canonicalize(&planned)
        .await
        .map_err(FileSystemError::io)?;
    if !is_within(&created, root) {
        return Err(outside());
    }
    Ok(created)
}
