use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::file_node::FileNode;
use crate::models::plan::{MoveOp, Plan};
use crate::scope_path;

/// Most files handed to an external tier; the rest are left out of its view.
pub const MAX_EXTERNAL_FILES: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub ext: Option<String>,
    pub size: Option<u64>,
    pub atime_days: Option<i64>,
}

impl FileSummary {
    pub fn from_node(node: &FileNode, now: DateTime<Utc>) -> Self {
        Self {
            name: node.name.clone(),
            path: node.path.clone(),
            node_type: if node.is_file() { "file" } else { "dir" }.to_string(),
            ext: node.ext.clone(),
            size: node.size,
            atime_days: Some(node.age_days(now)),
        }
    }
}

pub fn build_file_summaries(tree: &FileNode, now: DateTime<Utc>) -> Vec<FileSummary> {
    tree.files()
        .into_iter()
        .take(MAX_EXTERNAL_FILES)
        .map(|node| FileSummary::from_node(node, now))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Code,
    Documents,
    Images,
    Archives,
    Data,
    Misc,
}

impl Category {
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::Code => "Code",
            Self::Documents => "Documents",
            Self::Images => "Images",
            Self::Archives => "Archives",
            Self::Data => "Data",
            Self::Misc => "Misc",
        }
    }
}

pub fn category_from_extension(extension: &str) -> Category {
    match extension {
        "ts" | "tsx" | "js" | "jsx" | "py" | "go" | "java" | "rb" => Category::Code,
        "md" | "txt" | "pdf" | "doc" | "docx" => Category::Documents,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => Category::Images,
        "zip" | "tar" | "gz" | "rar" | "7z" => Category::Archives,
        "csv" | "json" | "xlsx" => Category::Data,
        _ => Category::Misc,
    }
}

/// Deterministic last-resort tier: one folder per extension family under the root.
///
/// `_instructions` is accepted but does not influence classification.
pub fn heuristic_moves(tree: &FileNode, _instructions: &str) -> Vec<MoveOp> {
    tree.files()
        .into_iter()
        .filter_map(|file| {
            let category = category_from_extension(file.ext.as_deref().unwrap_or_default());
            let target = scope_path::join(
                &scope_path::join("/", category.folder_name()),
                &file.name,
            );
            (target != file.path).then(|| MoveOp {
                from: file.path.clone(),
                to: target,
                reason: format!("Group {} files by type", category.folder_name()),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovesPayload {
    pub moves: Vec<MoveOp>,
}

fn parse_whole(text: &str) -> Option<MovesPayload> {
    serde_json::from_str(text.trim()).ok()
}

fn parse_fenced(text: &str) -> Option<MovesPayload> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    let body = rest.strip_prefix("json").unwrap_or(rest);
    let end = body.find("```")?;
    serde_json::from_str(body[..end].trim()).ok()
}

fn parse_widest_braces(text: &str) -> Option<MovesPayload> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if first >= last {
        return None;
    }
    serde_json::from_str(&text[first..=last]).ok()
}

type ParseStrategy = fn(&str) -> Option<MovesPayload>;

/// Tried in order; the first strategy yielding a well-formed payload wins.
const EXTRACTION_STRATEGIES: &[ParseStrategy] = &[parse_whole, parse_fenced, parse_widest_braces];

pub fn extract_moves(text: &str) -> Option<Vec<MoveOp>> {
    first_success(EXTRACTION_STRATEGIES, |strategy| strategy(text)).map(|payload| payload.moves)
}

/// First-success-wins over an ordered list of attempts.
pub fn first_success<T, R>(attempts: &[T], mut attempt: impl FnMut(&T) -> Option<R>) -> Option<R> {
    attempts.iter().find_map(|candidate| attempt(candidate))
}

/// One strategy of the synthesis fallback chain.
#[async_trait]
pub trait PlanTier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn propose(
        &self,
        files: &[FileSummary],
        instructions: &str,
    ) -> Result<Vec<MoveOp>, AppError>;
}

/// External tiers may answer with Windows-style separators. Sandbox paths
/// otherwise treat `\` as a filename character.
fn normalize_external_path(path: &str) -> String {
    scope_path::normalize(&path.replace('\\', "/"))
}

fn normalize_moves(moves: Vec<MoveOp>) -> Vec<MoveOp> {
    moves
        .into_iter()
        .map(|m| MoveOp {
            from: normalize_external_path(&m.from),
            to: normalize_external_path(&m.to),
            reason: m.reason,
        })
        .collect()
}

/// Builds plans by walking the configured tiers, then the heuristic.
#[derive(Clone, Default)]
pub struct Synthesizer {
    tiers: Vec<Arc<dyn PlanTier>>,
}

impl Synthesizer {
    pub fn new(tiers: Vec<Arc<dyn PlanTier>>) -> Self {
        Self { tiers }
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|tier| tier.name()).collect()
    }

    /// All tiers see the same snapshot. Tier failures are logged and skipped;
    /// the heuristic always produces a result.
    pub async fn synthesize(&self, tree: &FileNode, instructions: &str) -> Plan {
        let files = build_file_summaries(tree, Utc::now());

        for tier in &self.tiers {
            match tier.propose(&files, instructions).await {
                Ok(moves) => {
                    tracing::info!(tier = tier.name(), moves = moves.len(), "plan synthesized");
                    return Plan {
                        moves: normalize_moves(moves),
                        deletions: Vec::new(),
                    };
                }
                Err(e) => {
                    tracing::warn!(tier = tier.name(), "tier failed, falling through: {e}");
                }
            }
        }

        let moves = heuristic_moves(tree, instructions);
        tracing::info!(tier = "heuristic", moves = moves.len(), "plan synthesized");
        Plan {
            moves,
            deletions: Vec::new(),
        }
    }
}
