use std::fs;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::AppError;
use crate::models::plan::Plan;
use crate::scope_path::{self, SandboxRoot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub moved: usize,
}

/// Moves `source` to `destination`, both sandbox-relative.
///
/// The destination's parent is created when missing; an existing destination
/// is never overwritten.
pub fn move_entry(sandbox: &SandboxRoot, source: &str, destination: &str) -> Result<(), AppError> {
    let from = sandbox.resolve(source)?;
    let to = sandbox.resolve(destination)?;

    fs::symlink_metadata(&from)
        .map_err(|e| AppError::from_io(e, &scope_path::normalize(source)))?;
    if fs::symlink_metadata(&to).is_ok() {
        return Err(AppError::MoveConflict(scope_path::normalize(destination)));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::rename(&from, &to).map_err(|e| AppError::from_io(e, source))?;
    Ok(())
}

/// Executes the plan's moves in order.
///
/// Not atomic: when move *k* fails, moves before it stay applied and the
/// error is wrapped in [`AppError::PartialApply`] carrying how many succeeded.
pub fn apply_plan(sandbox: &SandboxRoot, plan: &Plan) -> Result<ApplyResult, AppError> {
    let mut moved = 0;
    for op in &plan.moves {
        if let Err(e) = move_entry(sandbox, &op.from, &op.to) {
            tracing::warn!(from = %op.from, to = %op.to, moved, "move failed: {e}");
            return Err(AppError::PartialApply {
                moved,
                source: Box::new(e),
            });
        }
        tracing::debug!(from = %op.from, to = %op.to, "moved");
        moved += 1;
    }
    Ok(ApplyResult { moved })
}

fn clear_dir(dir: &Path) -> Result<(), AppError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Copies the template tree into the sandbox root. Returns the number of files copied.
pub fn seed_from_template(sandbox: &SandboxRoot, template: &Path) -> Result<usize, AppError> {
    if !template.is_dir() {
        tracing::warn!(template = %template.display(), "template directory missing, sandbox left empty");
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(template).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| AppError::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(template)
            .map_err(|_| AppError::PathEscape(entry.path().to_string_lossy().to_string()))?;
        let dest = sandbox.path().join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &dest)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Wipes the sandbox and re-seeds it from the template.
pub fn reset_sandbox(sandbox: &SandboxRoot, template: &Path) -> Result<usize, AppError> {
    clear_dir(sandbox.path())?;
    let copied = seed_from_template(sandbox, template)?;
    tracing::info!(files = copied, "sandbox reset from template");
    Ok(copied)
}

/// Startup preparation: seed an empty sandbox so there is something to organize.
pub fn seed_if_empty(sandbox: &SandboxRoot, template: &Path) -> Result<usize, AppError> {
    if fs::read_dir(sandbox.path())?.next().is_some() {
        return Ok(0);
    }
    seed_from_template(sandbox, template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::MoveOp;
    use crate::services::snapshot_service;

    fn sandbox() -> (tempfile::TempDir, SandboxRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = SandboxRoot::prepare(dir.path()).unwrap();
        (dir, root)
    }

    fn plan(moves: &[(&str, &str)]) -> Plan {
        Plan {
            moves: moves
                .iter()
                .map(|(from, to)| MoveOp {
                    from: from.to_string(),
                    to: to.to_string(),
                    reason: "test".to_string(),
                })
                .collect(),
            deletions: Vec::new(),
        }
    }

    fn file_set(root: &SandboxRoot) -> Vec<String> {
        let mut files: Vec<String> = snapshot_service::snapshot(root, "/")
            .unwrap()
            .files()
            .into_iter()
            .map(|f| f.path.clone())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn apply_creates_destination_parents() {
        let (dir, root) = sandbox();
        fs::write(dir.path().join("report.pdf"), b"content").unwrap();

        let result = apply_plan(&root, &plan(&[("/report.pdf", "/Documents/2024/report.pdf")])).unwrap();

        assert_eq!(result.moved, 1);
        assert!(!dir.path().join("report.pdf").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("Documents/2024/report.pdf")).unwrap(),
            "content"
        );
    }

    #[test]
    fn apply_refuses_to_overwrite_and_keeps_prior_moves() {
        let (dir, root) = sandbox();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::create_dir(dir.path().join("Documents")).unwrap();
        fs::write(dir.path().join("Documents/b.txt"), b"existing").unwrap();

        let err = apply_plan(
            &root,
            &plan(&[
                ("/a.txt", "/Documents/a.txt"),
                ("/b.txt", "/Documents/b.txt"),
                ("/Documents/a.txt", "/a-again.txt"),
            ]),
        )
        .unwrap_err();

        assert!(matches!(err, AppError::PartialApply { moved: 1, .. }));
        assert!(matches!(err.cause(), AppError::MoveConflict(p) if p == "/Documents/b.txt"));
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "b");
        assert_eq!(
            fs::read_to_string(dir.path().join("Documents/b.txt")).unwrap(),
            "existing"
        );
        assert!(dir.path().join("Documents/a.txt").exists());
        assert!(!dir.path().join("a-again.txt").exists());
    }

    #[test]
    fn apply_missing_source_is_not_found() {
        let (_dir, root) = sandbox();
        let err = apply_plan(&root, &plan(&[("/ghost.txt", "/Misc/ghost.txt")])).unwrap_err();
        assert!(matches!(err, AppError::PartialApply { moved: 0, .. }));
        assert!(matches!(err.cause(), AppError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn apply_unreadable_source_is_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, root) = sandbox();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("a.txt"), b"a").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let readable = fs::symlink_metadata(locked.join("a.txt")).is_ok();

        let result = apply_plan(&root, &plan(&[("/locked/a.txt", "/Misc/a.txt")]));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if readable {
            // Privileged users bypass directory permissions.
            return;
        }
        let err = result.unwrap_err();
        assert_eq!(err.code(), "io_error");
        assert!(matches!(err.cause(), AppError::Io(_)));
    }

    #[test]
    fn apply_rejects_escaping_destination() {
        let (dir, root) = sandbox();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let err = apply_plan(&root, &plan(&[("/a.txt", "../../a.txt")])).unwrap_err();

        assert!(matches!(err.cause(), AppError::PathEscape(_)));
        assert!(dir.path().join("a.txt").exists());
    }

    #[test]
    fn apply_empty_plan_moves_nothing() {
        let (_dir, root) = sandbox();
        assert_eq!(apply_plan(&root, &Plan::default()).unwrap().moved, 0);
    }

    #[test]
    fn reset_restores_template_file_set() {
        let (dir, root) = sandbox();
        let template = tempfile::tempdir().unwrap();
        fs::create_dir(template.path().join("photos")).unwrap();
        fs::write(template.path().join("photos/cat.jpg"), b"cat").unwrap();
        fs::write(template.path().join("notes.txt"), b"notes").unwrap();

        fs::write(dir.path().join("stray.tmp"), b"x").unwrap();
        fs::create_dir(dir.path().join("Misc")).unwrap();

        let copied = reset_sandbox(&root, template.path()).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(file_set(&root), vec!["/notes.txt", "/photos/cat.jpg"]);
        assert!(!dir.path().join("Misc").exists());
    }

    #[test]
    fn reset_without_template_empties_sandbox() {
        let (dir, root) = sandbox();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let missing = dir.path().join("no-such-template");

        assert_eq!(reset_sandbox(&root, &missing).unwrap(), 0);
        assert!(file_set(&root).is_empty());
    }

    #[test]
    fn seed_if_empty_leaves_populated_sandbox_alone() {
        let (dir, root) = sandbox();
        let template = tempfile::tempdir().unwrap();
        fs::write(template.path().join("t.txt"), b"t").unwrap();

        assert_eq!(seed_if_empty(&root, template.path()).unwrap(), 1);
        fs::write(dir.path().join("mine.txt"), b"m").unwrap();
        fs::remove_file(dir.path().join("t.txt")).unwrap();
        assert_eq!(seed_if_empty(&root, template.path()).unwrap(), 0);
        assert_eq!(file_set(&root), vec!["/mine.txt"]);
    }
}
