//! External text-classification collaborators
//!
//! Both collaborators are fallible black boxes. Callers degrade to
//! deterministic defaults on any error.

pub mod ollama;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::filesystem::FileSystemService;
use crate::organizer::grouping::{fallback_date, fallback_type, ClassificationResult};

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable")]
    Unavailable,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Document metadata inferred from a preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type", default = "fallback_type")]
    pub doc_type: String,
    #[serde(default = "fallback_date")]
    pub date: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Classification {
    pub fn fallback() -> Self {
        Self {
            doc_type: fallback_type(),
            date: fallback_date(),
            keywords: Vec::new(),
        }
    }

    pub fn into_result(self, path: String) -> ClassificationResult {
        ClassificationResult {
            path,
            doc_type: self.doc_type,
            date: self.date,
            keywords: self.keywords,
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        preview: &str,
        file_name: &str,
    ) -> Result<Classification, CollaboratorError>;
}

#[async_trait]
pub trait ThemeNamer: Send + Sync {
    /// Short (ideally two-word) folder name for a group
    async fn name_theme(
        &self,
        doc_type: &str,
        keywords: &[String],
    ) -> Result<String, CollaboratorError>;
}

/// Stand-in used when no model is configured
pub struct Unavailable;

#[async_trait]
impl Classifier for Unavailable {
    async fn classify(&self, _: &str, _: &str) -> Result<Classification, CollaboratorError> {
        Err(CollaboratorError::Unavailable)
    }
}

#[async_trait]
impl ThemeNamer for Unavailable {
    async fn name_theme(&self, _: &str, _: &[String]) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unavailable)
    }
}

/// Preview + classify for one file
pub struct Analyzer {
    classifier: Arc<dyn Classifier>,
}

impl Analyzer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// `resolved` must already be validated; `reported_path` is what the
    /// result carries back to the caller
    pub async fn analyze(
        &self,
        fs: &FileSystemService,
        resolved: &Path,
        reported_path: String,
    ) -> ClassificationResult {
        let preview = fs.analysis_text(resolved).await;
        let file_name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let classification = match self.classifier.classify(preview.text(), &file_name).await {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!("Classification of '{}' failed, using defaults: {}", reported_path, e);
                Classification::fallback()
            }
        };

        classification.into_result(reported_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::config::GatewayConfig;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Recording {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Classifier for Recording {
        async fn classify(
            &self,
            preview: &str,
            file_name: &str,
        ) -> Result<Classification, CollaboratorError> {
            self.seen
                .lock()
                .unwrap()
                .push((preview.to_string(), file_name.to_string()));
            Ok(Classification {
                doc_type: "cv".into(),
                date: "2023-05".into(),
                keywords: vec!["rust".into()],
            })
        }
    }

    #[tokio::test]
    async fn analyzer_passes_preview_and_name() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("resume.txt");
        std::fs::write(&file, "  Senior Rust developer  ").unwrap();
        let fs = FileSystemService::new(GatewayConfig::with_root(temp.path())).unwrap();

        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let analyzer = Analyzer::new(recording.clone());
        let resolved = file.canonicalize().unwrap();
        let result = analyzer.analyze(&fs, &resolved, "resume.txt".into()).await;

        assert_eq!(result.path, "resume.txt");
        assert_eq!(result.doc_type, "cv");
        let seen = recording.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            ("Senior Rust developer".to_string(), "resume.txt".to_string())
        );
    }

    #[tokio::test]
    async fn analyzer_reads_unsupported_extensions_as_text() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("expenses.csv");
        std::fs::write(&file, "date,amount\n2024-03-01,12.50\n").unwrap();
        let fs = FileSystemService::new(GatewayConfig::with_root(temp.path())).unwrap();

        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let analyzer = Analyzer::new(recording.clone());
        analyzer
            .analyze(&fs, &file.canonicalize().unwrap(), "expenses.csv".into())
            .await;

        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen[0].0, "date,amount\n2024-03-01,12.50");
    }

    #[tokio::test]
    async fn analyzer_falls_back_when_classifier_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("scan.jpg");
        std::fs::write(&file, b"\xff\xd8").unwrap();
        let fs = FileSystemService::new(GatewayConfig::with_root(temp.path())).unwrap();

        let analyzer = Analyzer::new(Arc::new(Unavailable));
        let result = analyzer
            .analyze(&fs, &file.canonicalize().unwrap(), "scan.jpg".into())
            .await;

        assert_eq!(result.doc_type, "autre");
        assert_eq!(result.date, "unknown");
        assert!(result.keywords.is_empty());
    }
}
