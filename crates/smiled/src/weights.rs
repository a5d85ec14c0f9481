//! Model weight acquisition.
//!
//! Weights live in the model cache directory and are fetched over HTTPS the
//! first time the daemon runs. A failed fetch retries with capped
//! exponential backoff before giving up; the caller then runs without a
//! detection pipeline rather than crashing.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;

pub const ULTRAFACE_FILE: &str = "version-RFB-320.onnx";
pub const FERPLUS_FILE: &str = "emotion-ferplus-8.onnx";

const ULTRAFACE_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";
const FERPLUS_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

const FETCH_ATTEMPTS: u32 = 3;
const FETCH_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Make sure both model files exist under `model_dir`, fetching any that
/// are missing. Resolves before polling may begin.
pub async fn ensure_weights(model_dir: &Path) -> Result<()> {
    fetch_if_missing(&model_dir.join(ULTRAFACE_FILE), ULTRAFACE_URL).await?;
    fetch_if_missing(&model_dir.join(FERPLUS_FILE), FERPLUS_URL).await?;
    Ok(())
}

async fn fetch_if_missing(dest: &Path, url: &str) -> Result<()> {
    if dest.exists() {
        tracing::debug!(path = %dest.display(), "weights already present");
        return Ok(());
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating model dir {}", parent.display()))?;
    }

    for attempt in 1..=FETCH_ATTEMPTS {
        tracing::info!(url, attempt, "fetching model weights");
        match fetch(url).await {
            Ok(bytes) => {
                // Write to a temp name first so a partial download never
                // masquerades as a valid model on the next run.
                let tmp = dest.with_extension("part");
                tokio::fs::write(&tmp, &bytes)
                    .await
                    .with_context(|| format!("writing {}", tmp.display()))?;
                tokio::fs::rename(&tmp, dest)
                    .await
                    .with_context(|| format!("renaming into {}", dest.display()))?;
                tracing::info!(path = %dest.display(), size = bytes.len(), "weights fetched");
                return Ok(());
            }
            Err(err) if attempt < FETCH_ATTEMPTS => {
                let backoff = FETCH_BACKOFF_BASE * 2u32.pow(attempt - 1);
                tracing::warn!(error = %err, backoff_ms = backoff.as_millis() as u64, "fetch failed, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(err) => {
                return Err(err.context(format!("fetching {url} after {FETCH_ATTEMPTS} attempts")));
            }
        }
    }

    bail!("unreachable: fetch loop exhausted without returning")
}

async fn fetch(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url).await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
