use std::path::PathBuf;

/// Default mount point of the directory being organized
pub const DEFAULT_ROOT: &str = "/data_mount";

/// Configuration for the file-operation gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Outermost directory the gateway may ever touch
    pub root: PathBuf,

    /// Absolute host paths that callers tend to guess (e.g. `/home`); inputs
    /// under these refer to the root itself
    pub host_prefixes: Vec<String>,

    /// Maximum characters returned by a preview
    pub preview_max_chars: usize,

    /// Maximum entries in a directory listing before truncation
    pub max_list_entries: usize,
}

impl GatewayConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            host_prefixes: vec!["/home".to_string()],
            preview_max_chars: 4000,
            max_list_entries: 10_000,
        }
    }
}
