use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::file_node::{FileNode, NodeType};
use crate::scope_path::{self, SandboxRoot};

/// Lowercase text after the last `.` of the final segment, empty when there is none.
pub fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

fn timestamp(time: std::io::Result<SystemTime>) -> DateTime<Utc> {
    DateTime::<Utc>::from(time.unwrap_or(SystemTime::UNIX_EPOCH))
}

/// Reads the subtree at `relative_dir` into a fresh [`FileNode`] graph.
///
/// Every call re-reads the filesystem. Children keep directory-listing order.
/// Symbolic links are never followed and show up as files.
pub fn snapshot(sandbox: &SandboxRoot, relative_dir: &str) -> Result<FileNode, AppError> {
    let relative = scope_path::normalize(relative_dir);
    let absolute = sandbox.resolve(&relative)?;
    let relative = sandbox.relative(&absolute)?;
    let name = if relative == "/" {
        "/".to_string()
    } else {
        scope_path::file_name(&relative).to_string()
    };
    read_node(&absolute, relative, name)
}

fn read_node(absolute: &Path, relative: String, name: String) -> Result<FileNode, AppError> {
    let metadata = fs::symlink_metadata(absolute).map_err(|e| AppError::from_io(e, &relative))?;
    let atime = timestamp(metadata.accessed());
    let mtime = timestamp(metadata.modified());

    if !metadata.is_dir() {
        return Ok(FileNode {
            ext: Some(extension_of(&name)),
            name,
            path: relative,
            node_type: NodeType::File,
            size: Some(metadata.len()),
            children: None,
            atime,
            mtime,
        });
    }

    let mut children = Vec::new();
    for entry in fs::read_dir(absolute).map_err(|e| AppError::from_io(e, &relative))? {
        let entry = entry?;
        let child_name = entry.file_name().to_string_lossy().to_string();
        let child_path = scope_path::join(&relative, &child_name);
        children.push(read_node(&entry.path(), child_path, child_name)?);
    }

    Ok(FileNode {
        name,
        path: relative,
        node_type: NodeType::Dir,
        size: None,
        ext: None,
        children: Some(children),
        atime,
        mtime,
    })
}
