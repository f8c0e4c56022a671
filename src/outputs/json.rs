//! The classified snapshot: one pretty-printed JSON document per run.
//!
//! The derived corpus is never appended to. Each classification run rewrites
//! it whole, going through a sibling temp file so readers never see a
//! half-written snapshot.

use crate::models::ClassifiedSnapshot;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`ClassifiedSnapshot`] to `path`, replacing any previous file.
///
/// # Errors
///
/// Returns an error if serialization, directory creation, the write or the
/// final rename fails.
#[instrument(level = "info", skip_all, fields(path = %path.display(), records = snapshot.records.len()))]
pub async fn write_snapshot(snapshot: &ClassifiedSnapshot, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(snapshot)?;

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        info!(dir = %dir.display(), "Ensuring output directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    info!("Wrote classified snapshot");

    Ok(())
}

/// Read a snapshot written by [`write_snapshot`].
pub async fn read_snapshot(path: &Path) -> Result<ClassifiedSnapshot, Box<dyn Error>> {
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassificationSummary;
    use chrono::Utc;

    fn snapshot(kept: usize) -> ClassifiedSnapshot {
        ClassifiedSnapshot {
            generated_at: Utc::now(),
            input: "data/raw/corpus.jsonl".to_string(),
            summary: ClassificationSummary {
                kept,
                ..ClassificationSummary::default()
            },
            records: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_write_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed/classified.json");

        write_snapshot(&snapshot(1), &path).await.unwrap();
        write_snapshot(&snapshot(7), &path).await.unwrap();

        let back = read_snapshot(&path).await.unwrap();
        assert_eq!(back.summary.kept, 7);
        assert_eq!(back.input, "data/raw/corpus.jsonl");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
