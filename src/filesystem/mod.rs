//! Sandboxed file system access for the gateway

pub mod config;
pub mod operations;
pub mod preview;
pub mod security;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use config::GatewayConfig;
use operations::FileOperations;
use preview::Preview;
use security::{PathValidator, Sandbox};

use crate::protocol::FileSystemError;

pub struct FileSystemService {
    config: Arc<GatewayConfig>,
    validator: Arc<PathValidator>,
    ops: FileOperations,
}

impl FileSystemService {
    pub fn new(config: GatewayConfig) -> std::io::Result<Self> {
        let config = Arc::new(config);
        let validator = Arc::new(PathValidator::new(config.clone())?);
        let ops = FileOperations::new(validator.clone(), config.clone());
        Ok(Self {
            config,
            validator,
            ops,
        })
    }

    pub fn validator(&self) -> &PathValidator {
        self.validator.as_ref()
    }

    pub fn ops(&self) -> &FileOperations {
        &self.ops
    }

    /// Validated preview of a file
    pub async fn preview(&self, path: &str, sandbox: &Sandbox) -> Result<Preview, FileSystemError> {
        let resolved = self.validator.validate(path, sandbox)?;
        Ok(self.preview_resolved(&resolved).await)
    }

    pub async fn preview_resolved(&self, resolved: &Path) -> Preview {
        preview::extract_preview(resolved, self.config.preview_max_chars).await
    }

    /// Classifier input for an already validated file
    pub async fn analysis_text(&self, resolved: &Path) -> Preview {
        preview::extract_text(resolved, self.config.preview_max_chars).await
    }
}
