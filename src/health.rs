#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Workspace health: a sanity scan over a submissions directory and a
//! reachability probe of the scoring backend. Neither changes anything;
//! both only report.

use anyhow::{Context, Result};
use futures::{future::try_join_all, stream::FuturesUnordered};
use std::path::Path;
use tokio::fs::OpenOptions;
use walkdir::WalkDir;

use crate::{
    config,
    grade::review::{OpenAiBackend, ScoringBackend},
};

/// Scans `root` for problems that would trip up a batch run: empty or
/// unreadable files, non-notebook files mixed into the directory, and
/// notebooks already larger than the comparison size guard.
pub async fn check_submissions(root: &Path) -> Result<()> {
    tracing::info!("Checking submissions under {}...", root.display());

    let size_guard = config::assessment_defaults().size_guard_bytes() as u64;

    let files = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .map(|path| {
            tokio::spawn(async move {
                match tokio::fs::metadata(&path).await {
                    Ok(m) => {
                        if m.len() == 0 {
                            tracing::warn!("File {}\n\tis empty", &path.display());
                        }
                        if m.len() > size_guard && path.extension().unwrap_or_default() == "ipynb"
                        {
                            tracing::warn!(
                                "File {}\n\texceeds the comparison size guard ({} bytes); its \
                                 outputs will not be compared",
                                &path.display(),
                                size_guard
                            );
                        }
                        if let Err(e) = OpenOptions::new().read(true).open(&path).await {
                            tracing::warn!(
                                "File {}\n\tcould not be opened: {}",
                                &path.display(),
                                e
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Could not read file {}: {}", path.display(), e);
                    }
                };

                let extension = path.extension().unwrap_or_default();
                if extension != "ipynb" && extension != "json" && extension != "md" {
                    tracing::warn!(
                        "File {}\n\tis not a notebook and will be ignored",
                        &path.display()
                    );
                }
            })
        })
        .collect::<FuturesUnordered<_>>();

    try_join_all(files)
        .await
        .context("A submission check task panicked")?;

    tracing::info!(
        "This is information an instructor can use before a batch run; nothing was modified."
    );
    Ok(())
}

/// Probes the configured scoring backend. Returns an error when no
/// backend is configured or the probe fails.
pub async fn check_scoring_backend() -> Result<()> {
    let backend = OpenAiBackend::from_env()
        .context("Scoring service is not configured; set OPENAI_ENDPOINT, OPENAI_API_KEY, and OPENAI_MODEL")?;

    backend
        .health()
        .await
        .context("Scoring backend health probe failed")?;

    tracing::info!("scoring backend is reachable");
    Ok(())
}
