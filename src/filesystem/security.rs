use std::path::{Component, Path, PathBuf};

use crate::protocol::FileSystemError;

use super::config::GatewayConfig;

/// Optional sub-boundary inside the root, owned by one session.
///
/// Unset means full root access. The only way to change it is
/// [`PathValidator::set_sandbox_limit`]; there is no way back to unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sandbox {
    limit: Option<PathBuf>,
}

impl Sandbox {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn limit(&self) -> Option<&Path> {
        self.limit.as_deref()
    }
}

/// Resolves caller paths against the root and authorizes them
pub struct PathValidator {
    config: std::sync::Arc<GatewayConfig>,
    root: PathBuf,
}

impl PathValidator {
    /// Canonicalizes the configured root; fails if it does not exist
    pub fn new(config: std::sync::Arc<GatewayConfig>) -> std::io::Result<Self> {
        let root = config.root.canonicalize()?;
        Ok(Self { config, root })
    }

    /// Canonical root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `input` and check it against the root and the session sandbox
    pub fn validate(&self, input: &str, sandbox: &Sandbox) -> Result<PathBuf, FileSystemError> {
        let relative = self.relative_input(input);
        let resolved = resolve_lenient(&self.root.join(relative)).map_err(|e| {
            tracing::debug!("Could not resolve '{}': {}", input, e);
            FileSystemError::io(e)
        })?;

        if !is_within(&resolved, &self.root) {
            tracing::warn!(
                "Physical rejection: {} is not inside {}",
                resolved.display(),
                self.root.display()
            );
            return Err(FileSystemError::OutsideRoot {
                attempted_path: input.to_string(),
            });
        }

        if let Some(limit) = sandbox.limit() {
            if !is_within(&resolved, limit) {
                tracing::warn!(
                    "Logical rejection: {} is outside sandbox limit {}",
                    resolved.display(),
                    limit.display()
                );
                return Err(FileSystemError::OutsideSandbox {
                    attempted_path: input.to_string(),
                });
            }
        }

        Ok(resolved)
    }

    /// Narrow (or move) the session boundary.
    ///
    /// The candidate is checked against the root only. The sandbox is written
    /// only on success, so a rejected candidate leaves the previous limit.
    pub fn set_sandbox_limit(
        &self,
        sandbox: &mut Sandbox,
        input: &str,
    ) -> Result<PathBuf, FileSystemError> {
        let limit = self.validate(input, &Sandbox::unrestricted())?;
        tracing::info!("Sandbox limit set to {}", limit.display());
        sandbox.limit = Some(limit.clone());
        Ok(limit)
    }

    /// Path relative to the root, for values reported back to callers
    pub fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| {
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            })
    }

    /// Map a caller string onto a path relative to the root.
    ///
    /// Empty input and guessed host paths refer to the root. Inputs that
    /// already spell out the root are accepted. Everything else is taken
    /// relative to the root with leading separators dropped.
    fn relative_input<'a>(&self, input: &'a str) -> &'a str {
        if input.trim().is_empty() {
            return "";
        }

        for root in [self.root.as_path(), self.config.root.as_path()] {
            if let Ok(rest) = Path::new(input).strip_prefix(root) {
                return rest.to_str().unwrap_or("");
            }
        }

        let is_host_path = self
            .config
            .host_prefixes
            .iter()
            .any(|prefix| Path::new(input).starts_with(prefix));
        if is_host_path {
            return "";
        }

        input.trim_start_matches(['/', '\\'])
    }
}

/// True if `path` equals `base` or lies below it.
///
/// Compares whole components, so `/data-evil` is not inside `/data`.
pub fn is_within(path: &Path, base: &Path) -> bool {
    let mut path_components = path.components();
    for base_component in base.components() {
        match path_components.next() {
            Some(component) if component == base_component => {}
            _ => return false,
        }
    }
    true
}

/// Canonicalize a path whose tail may not exist yet.
///
/// The deepest existing ancestor is canonicalized, then the tail is walked
/// one component at a time. Any prefix that exists again (for instance after
/// `missing/..`) is canonicalized before the walk continues, so every
/// symlink on the way is followed.
pub(crate) fn resolve_lenient(path: &Path) -> std::io::Result<PathBuf> {
    let existing = path
        .ancestors()
        .find(|p| std::fs::symlink_metadata(p).is_ok())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no existing ancestor"))?;

    let mut resolved = existing.canonicalize()?;
    let rest = path.strip_prefix(existing).unwrap_or_else(|_| Path::new(""));

    for component in rest.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                if std::fs::symlink_metadata(&resolved).is_ok() {
                    resolved = resolved.canonicalize()?;
                }
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }

    Ok(resolved)
}
