//! Small helpers shared across the pipeline.

use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

/// Clip `s` to at most `max` bytes for a log line or error message, noting how
/// much was cut. Never splits a character.
///
/// ```ignore
/// assert_eq!(clip_for_log("denied", 64), "denied");
/// assert_eq!(clip_for_log("approved at 5k", 8), "approved… [6 more bytes]");
/// ```
pub fn clip_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!("{}… [{} more bytes]", &s[..cut], s.len() - cut)
}

/// True when JSON decoding failed because the input ended early, which is how
/// a model answer cut off by its token limit shows up.
pub fn is_incomplete_json(err: &serde_json::Error) -> bool {
    err.is_eof()
}

/// Create `dir` if missing and prove it accepts writes.
///
/// # Errors
///
/// Fails when the directory cannot be created or a marker file cannot be written
/// into it.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn ensure_writable_dir(dir: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(dir).await?;
    let marker = dir.join(".write_check");
    fs::write(&marker, b"").await?;
    fs::remove_file(&marker).await.ok();
    info!("Output directory accepts writes");
    Ok(())
}

/// A file is returned as is; a directory resolves to its lexically last file
/// with the given extension, which for timestamped corpus files is the newest.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), extension))]
pub async fn resolve_input(path: &Path, extension: &str) -> Result<PathBuf, Box<dyn Error>> {
    if !fs::metadata(path).await?.is_dir() {
        return Ok(path.to_path_buf());
    }
    let mut latest: Option<PathBuf> = None;
    let mut dir = fs::read_dir(path).await?;
    while let Some(entry) = dir.next_entry().await? {
        let candidate = entry.path();
        if candidate.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if latest.as_ref().is_none_or(|l| candidate.file_name() > l.file_name()) {
            latest = Some(candidate);
        }
    }
    let latest = latest.ok_or_else(|| {
        format!("no .{extension} files found in {}", path.display())
    })?;
    debug!(file = %latest.display(), "Resolved most recent input file");
    Ok(latest)
}
