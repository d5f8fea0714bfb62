use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use crate::protocol::FileSystemError;

use super::config::GatewayConfig;
use super::operations::{safe_move, FileOperations};
use super::security::{is_within, PathValidator, Sandbox};

fn setup_with(config: GatewayConfig) -> (Arc<PathValidator>, FileOperations) {
    let config = Arc::new(config);
    let validator = Arc::new(PathValidator::new(config.clone()).unwrap());
    let ops = FileOperations::new(validator.clone(), config);
    (validator, ops)
}

fn setup(root: &Path) -> (Arc<PathValidator>, FileOperations) {
    setup_with(GatewayConfig::with_root(root))
}

#[test]
fn test_path_validation_blocks_traversal() {
    let temp = TempDir::new().unwrap();
    let (validator, _) = setup(temp.path());
    let open = Sandbox::unrestricted();

    assert_eq!(
        validator.validate("../blocked", &open),
        Err(FileSystemError::OutsideRoot {
            attempted_path: "../blocked".into()
        })
    );
    assert!(validator.validate("docs/../../blocked", &open).is_err());
    assert!(validator.validate("/../../etc/passwd", &open).is_err());
}

#[test]
fn test_path_validation_allows_inner_dot_dot() {
    let temp = TempDir::new().unwrap();
    let (validator, _) = setup(temp.path());
    let root = validator.root().to_path_buf();

    let resolved = validator
        .validate("docs/../notes.txt", &Sandbox::unrestricted())
        .unwrap();
    assert_eq!(resolved, root.join("notes.txt"));
}

#[test]
fn test_sibling_with_shared_prefix_is_outside() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("data")).unwrap();
    std::fs::create_dir(temp.path().join("data-evil")).unwrap();
    std::fs::write(temp.path().join("data-evil/loot.txt"), "x").unwrap();
    let (validator, _) = setup(&temp.path().join("data"));

    let err = validator
        .validate("../data-evil/loot.txt", &Sandbox::unrestricted())
        .unwrap_err();
    assert!(err.is_boundary_violation());

    assert!(!is_within(Path::new("/data-evil/x"), Path::new("/data")));
    assert!(is_within(Path::new("/data/x"), Path::new("/data")));
    assert!(is_within(Path::new("/data"), Path::new("/data")));
}

#[cfg(unix)]
#[test]
fn test_symlink_escape_is_rejected() {
    let temp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "x").unwrap();
    std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();
    let (validator, _) = setup(temp.path());

    let err = validator
        .validate("link/secret.txt", &Sandbox::unrestricted())
        .unwrap_err();
    assert_eq!(
        err,
        FileSystemError::OutsideRoot {
            attempted_path: "link/secret.txt".into()
        }
    );
    // paths that do not exist yet are checked through the link too
    assert!(validator
        .validate("link/new/file.txt", &Sandbox::unrestricted())
        .is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_behind_missing_dot_dot_is_rejected() {
    let temp = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();
    let (validator, ops) = setup(temp.path());
    let open = Sandbox::unrestricted();

    assert_eq!(
        validator.validate("missing/../link/evil", &open),
        Err(FileSystemError::OutsideRoot {
            attempted_path: "missing/../link/evil".into()
        })
    );
    assert!(ops.create_directory("missing/../link/evil", &open).await.is_err());
    assert!(!outside.path().join("evil").exists());

    // the same walk still allows paths that come back inside
    let root = validator.root().to_path_buf();
    assert_eq!(
        validator.validate("missing/../inner/new.txt", &open).unwrap(),
        root.join("inner/new.txt")
    );
}

#[test]
fn test_empty_and_host_paths_resolve_to_root() {
    let temp = TempDir::new().unwrap();
    let (validator, _) = setup(temp.path());
    let root = validator.root().to_path_buf();
    let open = Sandbox::unrestricted();

    assert_eq!(validator.validate("", &open).unwrap(), root);
    assert_eq!(validator.validate("   ", &open).unwrap(), root);
    assert_eq!(validator.validate("/home", &open).unwrap(), root);
    assert_eq!(validator.validate("/home/someone/Documents", &open).unwrap(), root);
}

#[test]
fn test_root_prefixed_and_leading_slash_inputs() {
    let temp = TempDir::new().unwrap();
    let (validator, _) = setup(temp.path());
    let root = validator.root().to_path_buf();
    let open = Sandbox::unrestricted();

    let spelled_out = format!("{}/notes.txt", root.display());
    assert_eq!(validator.validate(&spelled_out, &open).unwrap(), root.join("notes.txt"));
    assert_eq!(validator.validate("/notes.txt", &open).unwrap(), root.join("notes.txt"));
    assert_eq!(validator.display_relative(&root.join("a/b.txt")), "a/b.txt");
    assert_eq!(validator.display_relative(&root), "");
}

#[test]
fn test_sandbox_limit_narrows_access() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("Photos")).unwrap();
    let (validator, _) = setup(temp.path());
    let root = validator.root().to_path_buf();
    let mut sandbox = Sandbox::unrestricted();

    let limit = validator.set_sandbox_limit(&mut sandbox, "Photos").unwrap();
    assert_eq!(limit, root.join("Photos"));
    assert_eq!(sandbox.limit(), Some(root.join("Photos").as_path()));

    assert!(validator.validate("Photos/beach.jpg", &sandbox).is_ok());
    assert_eq!(
        validator.validate("Invoices", &sandbox),
        Err(FileSystemError::OutsideSandbox {
            attempted_path: "Invoices".into()
        })
    );
    assert!(validator.validate("Photos/../Invoices", &sandbox).is_err());
}

#[test]
fn test_failed_sandbox_change_keeps_previous_limit() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("Photos")).unwrap();
    let (validator, _) = setup(temp.path());
    let mut sandbox = Sandbox::unrestricted();
    validator.set_sandbox_limit(&mut sandbox, "Photos").unwrap();
    let before = sandbox.clone();

    assert!(validator.set_sandbox_limit(&mut sandbox, "../elsewhere").is_err());
    assert_eq!(sandbox, before);
}

#[tokio::test]
async fn test_list_files_reports_names() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("empty")).unwrap();
    std::fs::write(temp.path().join("a.txt"), "a").unwrap();
    let (_, ops) = setup(temp.path());
    let open = Sandbox::unrestricted();

    let mut names = ops.list_files("", &open).await.unwrap();
    names.sort();
    assert_eq!(names, vec!["a.txt", "empty"]);
    assert!(ops.list_files("empty", &open).await.unwrap().is_empty());
    assert_eq!(ops.list_files("a.txt", &open).await.unwrap(), vec!["a.txt"]);
    assert_eq!(
        ops.list_files("missing", &open).await,
        Err(FileSystemError::NotFound {
            path: "missing".into()
        })
    );
}

#[tokio::test]
async fn test_list_files_is_capped() {
    let temp = TempDir::new().unwrap();
    for name in ["a", "b", "c"] {
        std::fs::write(temp.path().join(name), name).unwrap();
    }
    let (_, ops) = setup_with(GatewayConfig {
        max_list_entries: 2,
        ..GatewayConfig::with_root(temp.path())
    });

    let names = ops.list_files("", &Sandbox::unrestricted()).await.unwrap();
    assert_eq!(names.len(), 2);
}

#[tokio::test]
async fn test_create_directory_is_recursive_and_idempotent() {
    let temp = TempDir::new().unwrap();
    let (validator, ops) = setup(temp.path());
    let open = Sandbox::unrestricted();

    let created = ops.create_directory("a/b/c", &open).await.unwrap();
    assert_eq!(created, validator.root().join("a/b/c"));
    assert!(created.is_dir());
    assert!(ops.create_directory("a/b/c", &open).await.is_ok());
}

#[tokio::test]
async fn test_create_directory_fails_over_a_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("plain"), "x").unwrap();
    let (_, ops) = setup(temp.path());
    let open = Sandbox::unrestricted();

    assert_eq!(
        ops.create_directory("plain", &open).await,
        Err(FileSystemError::NotADirectory {
            path: "plain".into()
        })
    );
    assert!(ops.create_directory("plain/child", &open).await.is_err());
}

#[tokio::test]
async fn test_move_file_into_directory_keeps_name() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("cv.pdf"), "x").unwrap();
    std::fs::create_dir(temp.path().join("archive")).unwrap();
    let (validator, ops) = setup(temp.path());

    let target = ops
        .move_file("cv.pdf", "archive", &Sandbox::unrestricted())
        .await
        .unwrap();
    assert_eq!(target, validator.root().join("archive/cv.pdf"));
    assert!(target.is_file());
    assert!(!temp.path().join("cv.pdf").exists());
}

#[tokio::test]
async fn test_move_file_never_overwrites() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("new.txt"), "new").unwrap();
    std::fs::write(temp.path().join("old.txt"), "old").unwrap();
    let (_, ops) = setup(temp.path());

    let result = ops
        .move_file("new.txt", "old.txt", &Sandbox::unrestricted())
        .await;
    assert_eq!(
        result,
        Err(FileSystemError::AlreadyExists {
            path: "old.txt".into()
        })
    );
    assert_eq!(std::fs::read_to_string(temp.path().join("old.txt")).unwrap(), "old");
    assert!(temp.path().join("new.txt").exists());
}

#[tokio::test]
async fn test_move_file_checks_both_ends() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("inbox")).unwrap();
    std::fs::write(temp.path().join("inbox/a.txt"), "x").unwrap();
    let (validator, ops) = setup(temp.path());
    let mut sandbox = Sandbox::unrestricted();
    validator.set_sandbox_limit(&mut sandbox, "inbox").unwrap();

    let err = ops.move_file("inbox/a.txt", "a.txt", &sandbox).await.unwrap_err();
    assert!(matches!(err, FileSystemError::OutsideSandbox { .. }));
    assert!(ops.move_file("inbox/a.txt", "../a.txt", &sandbox).await.is_err());
    assert_eq!(
        ops.move_file("inbox/missing.txt", "inbox/b.txt", &sandbox).await,
        Err(FileSystemError::NotFound {
            path: "inbox/missing.txt".into()
        })
    );
    assert!(temp.path().join("inbox/a.txt").is_file());
}

#[tokio::test]
async fn test_move_file_refuses_the_root_itself() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("sub")).unwrap();
    let (_, ops) = setup(temp.path());

    let result = ops.move_file("", "sub", &Sandbox::unrestricted()).await;
    assert!(matches!(result, Err(FileSystemError::NotAFile { .. })));
}

#[tokio::test]
async fn test_safe_move_picks_free_names() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("cv/python");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("report.pdf"), "existing").unwrap();
    std::fs::create_dir_all(temp.path().join("in1")).unwrap();
    std::fs::create_dir_all(temp.path().join("in2")).unwrap();
    std::fs::write(temp.path().join("in1/report.pdf"), "one").unwrap();
    std::fs::write(temp.path().join("in2/report.pdf"), "two").unwrap();

    let first = safe_move(&temp.path().join("in1/report.pdf"), &dest).await.unwrap();
    let second = safe_move(&temp.path().join("in2/report.pdf"), &dest).await.unwrap();

    assert_eq!(first, dest.join("report_1.pdf"));
    assert_eq!(second, dest.join("report_2.pdf"));
    assert_eq!(std::fs::read_to_string(dest.join("report.pdf")).unwrap(), "existing");
    assert_eq!(std::fs::read_to_string(&second).unwrap(), "two");
}

#[tokio::test]
async fn test_safe_move_creates_destination_and_handles_no_extension() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("notes");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("README"), "a").unwrap();
    std::fs::write(temp.path().join("README"), "b").unwrap();
    std::fs::write(temp.path().join("memo.txt"), "c").unwrap();

    let moved = safe_move(&temp.path().join("README"), &dest).await.unwrap();
    assert_eq!(moved, dest.join("README_1"));

    let fresh = temp.path().join("new/dir");
    let moved = safe_move(&temp.path().join("memo.txt"), &fresh).await.unwrap();
    assert_eq!(moved, fresh.join("memo.txt"));
}

#[tokio::test]
async fn test_safe_move_leaves_file_already_in_place() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("cv");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("a.txt"), "a").unwrap();

    let moved = safe_move(&dest.join("a.txt"), &dest).await.unwrap();
    assert_eq!(moved, dest.join("a.txt"));
    assert!(!dest.join("a_1.txt").exists());
}
