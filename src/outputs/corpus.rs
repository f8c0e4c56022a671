//! The raw corpus: one JSON object per line, append-only.
//!
//! Each line is a [`CorpusEntry`]. Collection runs only ever append, so a file
//! can be shared by many runs and its `id` column is the persistent dedup set.
//!
//! Reading is lenient: a missing file is an empty corpus and a malformed line
//! is skipped with a warning. Writing is strict: a failed append is fatal for
//! the run.

use crate::error::CorpusError;
use crate::models::CorpusEntry;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Just the dedup key; lets a line with an otherwise broken record still
/// contribute its identifier.
#[derive(Deserialize)]
struct IdRow {
    id: String,
}

fn io_error(path: &Path, source: std::io::Error) -> CorpusError {
    CorpusError::Io {
        path: path.to_path_buf(),
        source,
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, CorpusError> {
    match fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

/// Identifiers already present in the corpus.
///
/// Never fails: an unreadable file is logged and treated as empty, which at
/// worst lets a previously seen post be collected again.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_ids(path: &Path) -> HashSet<String> {
    let raw = match read_optional(path).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            info!("No existing corpus; starting empty");
            return HashSet::new();
        }
        Err(e) => {
            warn!(error = %e, "Existing corpus unreadable; starting empty");
            return HashSet::new();
        }
    };

    let mut malformed = 0usize;
    let ids: HashSet<String> = raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<IdRow>(line) {
            Ok(row) => Some(row.id),
            Err(_) => {
                malformed += 1;
                None
            }
        })
        .collect();

    if malformed > 0 {
        warn!(malformed, "Skipped corpus lines without a readable id");
    }
    info!(known = ids.len(), "Loaded known identifiers");
    ids
}

/// Every well-formed entry in the corpus, in file order.
///
/// # Errors
///
/// Returns [`CorpusError::Io`] if the file exists but cannot be read. A
/// missing file yields an empty list.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_entries(path: &Path) -> Result<Vec<CorpusEntry>, CorpusError> {
    let Some(raw) = read_optional(path).await? else {
        warn!("Corpus file does not exist");
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for (n, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CorpusEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line = n + 1, error = %e, "Skipping malformed corpus line"),
        }
    }
    info!(entries = entries.len(), "Read corpus");
    Ok(entries)
}

/// Append entries to the corpus, creating it (and its directory) if needed.
///
/// All lines go out in a single write. Returns the number of lines appended.
///
/// # Errors
///
/// Any serialization or I/O failure.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = entries.len()))]
pub async fn append_entries(path: &Path, entries: &[CorpusEntry]) -> Result<usize, CorpusError> {
    if entries.is_empty() {
        debug!("Nothing to append");
        return Ok(0);
    }

    let mut buf = String::new();
    for entry in entries {
        buf.push_str(&serde_json::to_string(entry)?);
        buf.push('\n');
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| io_error(path, e))?;
    file.write_all(buf.as_bytes())
        .await
        .map_err(|e| io_error(path, e))?;
    file.flush().await.map_err(|e| io_error(path, e))?;

    info!(appended = entries.len(), "Appended to corpus");
    Ok(entries.len())
}

/// Number of non-empty lines in the corpus; zero when the file is missing.
pub async fn count_rows(path: &Path) -> Result<usize, CorpusError> {
    Ok(read_optional(path)
        .await?
        .map(|raw| raw.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0))
}
