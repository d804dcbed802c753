#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;

/// A glob utility function to find paths to files with certain extension
///
/// * `extension`: the file extension to find paths for
/// * `search_depth`: how many folders deep to search for
/// * `root_dir`: the root directory where search starts
pub fn find_files(extension: &str, search_depth: i8, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pattern = root_dir.to_path_buf();

    for _ in 0..search_depth {
        pattern.push("**");
    }

    pattern.push(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert root_dir to string")?
        .to_string();

    Ok(glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect())
}

/// Finds notebook documents under `root_dir`, skipping editor
/// checkpoint copies.
pub fn find_notebooks(root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = find_files("ipynb", 4, root_dir)?
        .into_iter()
        .filter(|path| {
            !path
                .components()
                .any(|part| part.as_os_str() == ".ipynb_checkpoints")
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Derives a submission identifier from a notebook path (its file stem).
pub fn submission_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Truncates `text` at the nearest character boundary at or below
/// `limit` bytes, appending a truncation notice when anything was cut.
pub fn truncate_with_notice(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }

    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("...[TRUNCATED]");
}
