//! Asset-acquisition collaborator: streams model files from HuggingFace on
//! first use and reports completion through a one-shot callback.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use thiserror::Error;

use crate::config::{ModelFile, ScriptModelSpec};

use super::{AcquisitionCallback, AcquisitionOutcome};

#[derive(Debug, Error)]
enum FetchError {
    /// The provider does not serve this file; retrying cannot help.
    #[error("assets not published: HTTP 404 for {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Owns the async runtime whose workers drive the transfer while the session
/// thread blocks on the completion signal.
pub struct AssetDownloader {
    runtime: tokio::runtime::Runtime,
}

impl AssetDownloader {
    pub fn new() -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| anyhow!("Failed to start download runtime: {}", e))?;
        Ok(Self { runtime })
    }

    /// Fetch every missing file for `spec` into `target_dir`, then invoke
    /// `on_complete` exactly once with the outcome.
    pub fn request(
        &self,
        spec: &'static ScriptModelSpec,
        target_dir: PathBuf,
        on_complete: AcquisitionCallback,
    ) {
        self.runtime.spawn(async move {
            let outcome = match ensure_model_files(&target_dir, spec).await {
                Ok(()) => AcquisitionOutcome::Completed,
                Err(FetchError::NotFound(detail)) => {
                    tracing::warn!("Model assets not published: {}", detail);
                    AcquisitionOutcome::NotAvailable
                }
                Err(FetchError::Other(e)) => AcquisitionOutcome::Error(e.to_string()),
            };
            on_complete(outcome);
        });
    }
}

/// Files missing locally or smaller than their size floor (truncated download).
pub fn missing_files<'a>(target_dir: &Path, spec: &'a ScriptModelSpec) -> Vec<&'a ModelFile> {
    spec.files
        .iter()
        .filter(|f| {
            let path = target_dir.join(f.local_name);
            match path.metadata() {
                Ok(meta) => meta.len() < f.min_bytes,
                Err(_) => true,
            }
        })
        .collect()
}

/// Check which files are missing; download each one that is.
async fn ensure_model_files(target_dir: &Path, spec: &ScriptModelSpec) -> Result<(), FetchError> {
    let missing = missing_files(target_dir, spec);
    if missing.is_empty() {
        return Ok(());
    }

    tracing::info!(
        repo = spec.repo,
        missing_files = missing.len(),
        dir = %target_dir.display(),
        "Downloading model files from HuggingFace"
    );

    tokio::fs::create_dir_all(target_dir).await.map_err(|e| {
        anyhow!(
            "Failed to create model directory {}: {}",
            target_dir.display(),
            e
        )
    })?;

    let client = reqwest::Client::builder()
        .user_agent("scriptvec/0.1")
        .connect_timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

    for file in &missing {
        let url = file.url(spec.repo);
        let dest = target_dir.join(file.local_name);
        download_with_retry(&client, &url, &dest, file.local_name).await?;
    }

    tracing::info!(repo = spec.repo, "All model files downloaded");
    Ok(())
}

/// Download a file with retry and streaming progress.
async fn download_with_retry(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    filename: &str,
) -> Result<(), FetchError> {
    let max_retries = 3u32;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        match download_streaming(client, url, dest, filename).await {
            Ok(()) => return Ok(()),
            Err(e @ FetchError::NotFound(_)) => return Err(e),
            Err(e) => {
                last_error = Some(e);
                if attempt < max_retries {
                    let backoff = std::time::Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        file = filename,
                        attempt,
                        "Download failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    // Remove the partial file
                    let _ = tokio::fs::remove_file(dest.with_extension("downloading")).await;
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow!("Download failed after {} retries", max_retries).into()))
}

/// Stream download with periodic progress logging.
async fn download_streaming(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    filename: &str,
) -> Result<(), FetchError> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow!("HTTP request failed for {}: {}", filename, e))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(anyhow!("HTTP {} downloading {} from {}", status, filename, url).into());
    }

    let total_size = response.content_length().unwrap_or(0);
    let total_mb = total_size as f64 / 1_048_576.0;

    tracing::info!(
        file = filename,
        size_mb = format!("{:.1}", total_mb),
        "Downloading"
    );

    // Write to a temp file first, then rename (atomic-ish)
    let tmp_dest = dest.with_extension("downloading");
    let mut file = tokio::fs::File::create(&tmp_dest)
        .await
        .map_err(|e| anyhow!("Failed to create {}: {}", tmp_dest.display(), e))?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_log_pct: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| anyhow!("Stream error downloading {}: {}", filename, e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| anyhow!("Write error for {}: {}", filename, e))?;
        downloaded += chunk.len() as u64;

        // Log progress every 10%
        if total_size > 0 {
            let pct = (downloaded * 100) / total_size;
            if pct >= last_log_pct + 10 {
                last_log_pct = pct - (pct % 10);
                tracing::info!(
                    file = filename,
                    progress = format!("{}%", last_log_pct),
                    downloaded_mb = format!("{:.1}", downloaded as f64 / 1_048_576.0),
                    "Download progress"
                );
            }
        }
    }

    file.flush()
        .await
        .map_err(|e| anyhow!("Write error for {}: {}", filename, e))?;
    drop(file);

    // Rename temp file to final destination
    tokio::fs::rename(&tmp_dest, dest)
        .await
        .map_err(|e| anyhow!("Failed to finalize {}: {}", filename, e))?;

    tracing::info!(
        file = filename,
        size_mb = format!("{:.1}", downloaded as f64 / 1_048_576.0),
        "Download complete"
    );

    Ok(())
}
