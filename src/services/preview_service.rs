use std::collections::HashMap;

use serde::Serialize;

use crate::error::AppError;
use crate::models::file_node::FileNode;
use crate::models::plan::Plan;
use crate::scope_path::{self, SandboxRoot};
use crate::services::snapshot_service;

#[derive(Debug, Clone, Serialize)]
pub struct PreviewViews {
    pub before: FileNode,
    pub after: FileNode,
}

/// Display-only view of a plan: `after` is `before` with each moved file's
/// `path` relabeled. Files stay at their original position in the tree and no
/// destination directories are synthesized.
pub fn preview(sandbox: &SandboxRoot, plan: &Plan) -> Result<PreviewViews, AppError> {
    let before = snapshot_service::snapshot(sandbox, "/")?;
    let after = relabel(&before, plan);
    Ok(PreviewViews { before, after })
}

pub fn relabel(tree: &FileNode, plan: &Plan) -> FileNode {
    let mapping: HashMap<String, String> = plan
        .moves
        .iter()
        .map(|m| (scope_path::normalize(&m.from), scope_path::normalize(&m.to)))
        .collect();
    relabel_node(tree, &mapping)
}

fn relabel_node(node: &FileNode, mapping: &HashMap<String, String>) -> FileNode {
    let mut clone = node.clone();
    match &node.children {
        Some(children) => {
            clone.children = Some(
                children
                    .iter()
                    .map(|child| relabel_node(child, mapping))
                    .collect(),
            );
        }
        None => {
            if let Some(target) = mapping.get(&node.path) {
                clone.path = target.clone();
            }
        }
    }
    clone
}
