//! Persistence for both corpora.
//!
//! # Submodules
//!
//! - [`corpus`]: The append-only raw corpus (JSON lines), read by both stages
//! - [`json`]: The classified snapshot, rewritten whole on every classification run
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── raw/
//! │   └── corpus.jsonl        # one CorpusEntry per line, appended by `collect`
//! └── processed/
//!     └── classified.json     # ClassifiedSnapshot, replaced by `classify`
//! ```

pub mod corpus;
pub mod json;
