//! Writing matched photos to disk.

use facesift_pipeline::MatchResult;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name safe to create inside the output directory.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `name` if unused, else `stem (2).ext`, `stem (3).ext`, ...
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Write each match's original bytes into `dir`. Returns the written paths.
pub fn write_matches(dir: &Path, results: &[Arc<MatchResult>]) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut used = HashSet::new();
    let mut written = Vec::with_capacity(results.len());
    for result in results {
        let name = unique_name(&sanitize_file_name(&result.file.name), &mut used);
        let path = dir.join(name);
        std::fs::write(&path, &result.content)?;
        tracing::debug!(path = %path.display(), bytes = result.content.len(), "match written");
        written.push(path);
    }
    Ok(written)
}
