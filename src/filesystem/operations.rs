use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::protocol::FileSystemError;

use super::config::GatewayConfig;
use super::security::{PathValidator, Sandbox};

/// `EXDEV`: rename across mount points
#[cfg(unix)]
const CROSS_DEVICE_ERROR: i32 = 18;
#[cfg(not(unix))]
const CROSS_DEVICE_ERROR: i32 = 17;

#[derive(Clone)]
pub struct FileOperations {
    validator: std::sync::Arc<PathValidator>,
    config: std::sync::Arc<GatewayConfig>,
}

impl FileOperations {
    pub fn new(
        validator: std::sync::Arc<PathValidator>,
        config: std::sync::Arc<GatewayConfig>,
    ) -> Self {
        Self { validator, config }
    }

    /// Flat listing of entry names, in filesystem enumeration order.
    ///
    /// A regular file lists as its own name.
    pub async fn list_files(
        &self,
        path: &str,
        sandbox: &Sandbox,
    ) -> Result<Vec<String>, FileSystemError> {
        let resolved = self.validator.validate(path, sandbox)?;
        let metadata = fs::metadata(&resolved)
            .await
            .map_err(|e| not_found_or_io(e, path))?;

        if metadata.is_file() {
            let name = resolved
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            return Ok(vec![name]);
        }

        let mut names = Vec::new();
        let mut read_dir = fs::read_dir(&resolved)
            .await
            .map_err(FileSystemError::io)?;

        while let Some(entry) = read_dir.next_entry().await.map_err(FileSystemError::io)? {
            names.push(entry.file_name().to_string_lossy().to_string());
            if names.len() >= self.config.max_list_entries {
                tracing::debug!(
                    "Listing of '{}' truncated at {} entries",
                    path,
                    self.config.max_list_entries
                );
                break;
            }
        }

        Ok(names)
    }

    /// Create a directory and its parents; succeeds if it already exists
    pub async fn create_directory(
        &self,
        path: &str,
        sandbox: &Sandbox,
    ) -> Result<PathBuf, FileSystemError> {
        let resolved = self.validator.validate(path, sandbox)?;

        if resolved.is_file() {
            return Err(FileSystemError::NotADirectory {
                path: path.to_string(),
            });
        }

        fs::create_dir_all(&resolved)
            .await
            .map_err(|e| match e.raw_os_error() {
                // ENOTDIR: a parent component is a file
                Some(20) => FileSystemError::NotADirectory {
                    path: path.to_string(),
                },
                _ => FileSystemError::io(e),
            })?;

        Ok(resolved)
    }

    /// Move a file or directory.
    ///
    /// An existing directory destination receives the source under its own
    /// name. Existing files are never overwritten.
    pub async fn move_file(
        &self,
        source_path: &str,
        destination_path: &str,
        sandbox: &Sandbox,
    ) -> Result<PathBuf, FileSystemError> {
        let source = self.validator.validate(source_path, sandbox)?;
        let destination = self.validator.validate(destination_path, sandbox)?;

        if fs::symlink_metadata(&source).await.is_err() {
            return Err(FileSystemError::NotFound {
                path: source_path.to_string(),
            });
        }
        if source == *self.validator.root() {
            return Err(FileSystemError::NotAFile {
                path: source_path.to_string(),
            });
        }

        let target = if destination.is_dir() {
            match source.file_name() {
                Some(name) => destination.join(name),
                None => {
                    return Err(FileSystemError::NotAFile {
                        path: source_path.to_string(),
                    })
                }
            }
        } else {
            destination
        };

        if fs::symlink_metadata(&target).await.is_ok() {
            return Err(FileSystemError::AlreadyExists {
                path: destination_path.to_string(),
            });
        }

        match target.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => {
                return Err(FileSystemError::NotFound {
                    path: destination_path.to_string(),
                })
            }
        }

        move_entry(&source, &target).await?;
        tracing::debug!("Moved {} -> {}", source.display(), target.display());
        Ok(target)
    }
}

/// Move `source` into `dest_dir` without overwriting anything.
///
/// Uses `name.ext` when free, otherwise the first free `name_N.ext` for
/// N = 1, 2, ... The directory is created if needed. A source already at its
/// own free slot in `dest_dir` is left where it is.
pub async fn safe_move(source: &Path, dest_dir: &Path) -> Result<PathBuf, FileSystemError> {
    fs::create_dir_all(dest_dir)
        .await
        .map_err(FileSystemError::io)?;

    let file_name = source
        .file_name()
        .ok_or_else(|| FileSystemError::NotAFile {
            path: String::new(),
        })?;

    let direct = dest_dir.join(file_name);
    if direct == source {
        return Ok(direct);
    }
    if !entry_exists(&direct).await {
        move_entry(source, &direct).await?;
        return Ok(direct);
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| file_name.to_os_string());
    let extension = source.extension();

    let mut counter: u64 = 1;
    loop {
        let candidate = dest_dir.join(suffixed_name(&stem, counter, extension));
        if !entry_exists(&candidate).await {
            move_entry(source, &candidate).await?;
            return Ok(candidate);
        }
        counter += 1;
    }
}

fn suffixed_name(stem: &OsString, counter: u64, extension: Option<&std::ffi::OsStr>) -> OsString {
    let mut name = stem.clone();
    name.push(format!("_{}", counter));
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    name
}

/// Dangling symlinks count as taken
async fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Rename, falling back to copy + remove across devices
async fn move_entry(source: &Path, target: &Path) -> Result<(), FileSystemError> {
    match fs::rename(source, target).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE_ERROR) && source.is_file() => {
            fs::copy(source, target)
                .await
                .map_err(FileSystemError::io)?;
            fs::remove_file(source).await.map_err(FileSystemError::io)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FileSystemError::NotFound {
            path: source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        }),
        Err(e) => Err(FileSystemError::io(e)),
    }
}

fn not_found_or_io(err: std::io::Error, path: &str) -> FileSystemError {
    if err.kind() == std::io::ErrorKind::NotFound {
        FileSystemError::NotFound {
            path: path.to_string(),
        }
    } else {
        FileSystemError::io(err)
    }
}
