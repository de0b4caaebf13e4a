use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Dir,
}

/// Point-in-time metadata for one entry of the sandbox.
///
/// `path` is sandbox-relative with a leading `/`. `size` and `ext` are only
/// set for files, `children` only for directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
}

impl FileNode {
    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    /// File leaves in depth-first order; directories contribute only their children.
    pub fn files(&self) -> Vec<&FileNode> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a FileNode>) {
        match &self.children {
            Some(children) => {
                for child in children {
                    child.collect_files(out);
                }
            }
            None if self.is_file() => out.push(self),
            None => {}
        }
    }

    /// Whole days elapsed between the last access and `now`, floored.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now.timestamp_millis() - self.atime.timestamp_millis()).div_euclid(86_400_000)
    }
}
