use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

/// Folds a client-supplied path into the sandbox-relative form `/a/b`.
///
/// Empty and `.` segments are dropped and the result always carries a leading
/// `/` and no trailing one. Paths are POSIX-style, so `\` is an ordinary
/// filename character here. `..` segments are kept verbatim; containment is
/// decided by [`SandboxRoot::resolve`].
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

pub fn is_within_scope(path: &Path, root: &Path) -> bool {
    path == root || path.starts_with(root)
}

/// Joins a sandbox-relative directory and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Final segment of a sandbox-relative path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// The single directory every relative path is confined to.
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    /// Creates the root directory if needed and pins it to its canonical form.
    pub fn prepare(root: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(root)?;
        let root = std::fs::canonicalize(root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolves `relative` beneath the root, rejecting anything that lands outside.
    ///
    /// `.`/`..` are folded lexically over the whole path first, and only the
    /// final result is checked, so `a/../../root/x` is fine when it lands back
    /// inside. The deepest ancestor that exists on disk is then canonicalized,
    /// so a symlink inside the sandbox cannot be used to reach beyond it either.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, AppError> {
        let mut resolved = self.root.clone();
        for component in Path::new(relative.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }

        if !is_within_scope(&resolved, &self.root) {
            return Err(AppError::PathEscape(relative.to_string()));
        }

        let existing = resolved.ancestors().find(|p| p.symlink_metadata().is_ok());
        if let Some(existing) = existing {
            let canonical = std::fs::canonicalize(existing)?;
            if !is_within_scope(&canonical, &self.root) {
                return Err(AppError::PathEscape(relative.to_string()));
            }
        }

        Ok(resolved)
    }

    /// Inverse of [`resolve`](Self::resolve): expresses an absolute path in
    /// sandbox-relative form.
    pub fn relative(&self, absolute: &Path) -> Result<String, AppError> {
        let rest = absolute
            .strip_prefix(&self.root)
            .map_err(|_| AppError::PathEscape(absolute.to_string_lossy().to_string()))?;
        let segments: Vec<String> = rest
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Ok(format!("/{}", segments.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, SandboxRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = SandboxRoot::prepare(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(normalize("/foo/bar/"), "/foo/bar");
        assert_eq!(normalize("/foo/bar///"), "/foo/bar");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn normalize_keeps_backslashes_in_names() {
        assert_eq!(normalize("q1\\report.pdf"), "/q1\\report.pdf");
        assert_eq!(normalize("./a/./b"), "/a/b");
    }

    #[test]
    fn join_and_file_name() {
        assert_eq!(join("/", "a.txt"), "/a.txt");
        assert_eq!(join("/b", "c.log"), "/b/c.log");
        assert_eq!(file_name("/b/c.log"), "c.log");
        assert_eq!(file_name("/"), "");
    }

    #[test]
    fn resolve_rejects_traversal() {
        let (_dir, root) = sandbox();
        for escape in ["../../etc", "..", "a/../../x", "/../etc/passwd", "a/b/../../../x"] {
            let result = root.resolve(escape);
            assert!(
                matches!(result, Err(AppError::PathEscape(_))),
                "{escape} should be rejected"
            );
        }
    }

    #[test]
    fn resolve_accepts_paths_inside_root() {
        let (_dir, root) = sandbox();
        for inside in ["", "/", ".", "a/b.txt", "/a/../b", "a/./b/../c", "not/yet/created"] {
            let resolved = root.resolve(inside).unwrap();
            assert!(is_within_scope(&resolved, root.path()), "{inside}");
        }
        assert_eq!(root.resolve("/a/../b").unwrap(), root.path().join("b"));
        assert!(root.resolve("..").is_err());
    }

    #[test]
    fn resolve_accepts_path_that_leaves_and_reenters_root() {
        let (_dir, root) = sandbox();
        let root_name = root.path().file_name().unwrap().to_string_lossy().to_string();

        let resolved = root.resolve(&format!("a/../../{root_name}/x.txt")).unwrap();

        assert_eq!(resolved, root.path().join("x.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_treats_backslash_as_filename_character() {
        let (_dir, root) = sandbox();
        assert_eq!(
            root.resolve("q1\\report.pdf").unwrap(),
            root.path().join("q1\\report.pdf")
        );
        assert!(root.resolve("..\\..\\x").is_ok());
    }

    #[test]
    fn within_scope_child_path() {
        assert!(is_within_scope(Path::new("/foo/bar/baz"), Path::new("/foo/bar")));
        assert!(is_within_scope(Path::new("/foo/bar"), Path::new("/foo/bar")));
        assert!(!is_within_scope(Path::new("/foo/barbaz"), Path::new("/foo/bar")));
        assert!(!is_within_scope(Path::new("/foo/other"), Path::new("/foo/bar")));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_rejects_symlink_out_of_root() {
        let (_dir, root) = sandbox();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        assert!(matches!(
            root.resolve("link/secret.txt"),
            Err(AppError::PathEscape(_))
        ));
    }

    #[test]
    fn relative_round_trips_resolve() {
        let (_dir, root) = sandbox();
        let abs = root.resolve("docs/a.txt").unwrap();
        assert_eq!(root.relative(&abs).unwrap(), "/docs/a.txt");
        assert_eq!(root.relative(root.path()).unwrap(), "/");
        assert!(root.relative(Path::new("/definitely/elsewhere")).is_err());
    }
}
