use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::models::file_node::FileNode;
use crate::models::plan::{Confidence, DeleteSuggestion};
use crate::scope_path::SandboxRoot;

pub const JUNK_EXTENSIONS: &[&str] = &["tmp", "log", "cache", "bak", "old"];
const MIB: u64 = 1024 * 1024;
pub const STALE_MIN_BYTES: u64 = 50 * MIB;
pub const STALE_MIN_AGE_DAYS: i64 = 90;
/// Files at or above this size are never hashed.
pub const DEDUP_MAX_BYTES: u64 = 20 * MIB;

fn junk_match(file: &FileNode) -> Option<String> {
    let ext = file.ext.as_deref().unwrap_or_default();
    if JUNK_EXTENSIONS.contains(&ext) {
        return Some(format!(".{ext}"));
    }
    if file.name.starts_with('~') || file.name == ".DS_Store" {
        return Some(file.name.clone());
    }
    None
}

/// SHA-256 of the file contents, streamed.
pub fn content_hash(sandbox: &SandboxRoot, relative: &str) -> Result<String, AppError> {
    let absolute = sandbox.resolve(relative)?;
    let file = File::open(&absolute).map_err(|e| AppError::from_io(e, relative))?;
    let mut hasher = Sha256::new();
    io::copy(&mut BufReader::new(file), &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn detect(sandbox: &SandboxRoot, tree: &FileNode) -> Result<Vec<DeleteSuggestion>, AppError> {
    detect_at(sandbox, tree, Utc::now())
}

/// Flags deletion candidates among the file leaves of `tree`.
///
/// Rules are cumulative, so one file may be reported more than once.
pub fn detect_at(
    sandbox: &SandboxRoot,
    tree: &FileNode,
    now: DateTime<Utc>,
) -> Result<Vec<DeleteSuggestion>, AppError> {
    let files = tree.files();
    let mut suggestions = Vec::new();

    for file in &files {
        let size = file.size.unwrap_or(0);
        let age_days = file.age_days(now);

        if let Some(matched) = junk_match(file) {
            suggestions.push(DeleteSuggestion {
                file: file.path.clone(),
                reason: format!(
                    "Temporary or junk artifact ({matched}), last accessed {age_days} days ago"
                ),
                confidence: Confidence::High,
                size_bytes: file.size,
                safe_to_delete: true,
            });
        }

        if size > STALE_MIN_BYTES && age_days > STALE_MIN_AGE_DAYS {
            suggestions.push(DeleteSuggestion {
                file: file.path.clone(),
                reason: format!(
                    "Large file ({:.1} MiB) not accessed in {age_days} days",
                    size as f64 / MIB as f64
                ),
                confidence: Confidence::Medium,
                size_bytes: file.size,
                safe_to_delete: false,
            });
        }
    }

    let mut groups: HashMap<String, Vec<&FileNode>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for &file in &files {
        if file.size.unwrap_or(0) >= DEDUP_MAX_BYTES {
            continue;
        }
        let hash = match content_hash(sandbox, &file.path) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(file = %file.path, "skipping unreadable file: {e}");
                continue;
            }
        };
        let group = groups.entry(hash.clone()).or_default();
        if group.is_empty() {
            order.push(hash);
        }
        group.push(file);
    }

    for hash in order {
        let group = &groups[&hash];
        let Some((original, duplicates)) = group.split_first() else {
            continue;
        };
        for duplicate in duplicates {
            suggestions.push(DeleteSuggestion {
                file: duplicate.path.clone(),
                reason: format!("Duplicate of {}", original.path),
                confidence: Confidence::High,
                size_bytes: duplicate.size,
                safe_to_delete: true,
            });
        }
    }

    tracing::debug!(
        files = files.len(),
        suggestions = suggestions.len(),
        "garbage scan finished"
    );
    Ok(suggestions)
}
