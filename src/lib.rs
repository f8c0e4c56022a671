//! # Card Outcome Miner
//!
//! Collects first-hand credit-card application reports from forum search and
//! turns them into labeled approval/denial records with the applicant numbers
//! they mention.
//!
//! ## Architecture
//!
//! The pipeline runs in two independent stages, each one CLI subcommand:
//!
//! 1. **Collection** ([`collect`]): fan (source, phrase) units out over a
//!    bounded pool, gate every search result through dedup, recency, product
//!    and relevance checks, and append the accepted posts to the raw corpus
//! 2. **Classification** ([`reconcile`]): run the deterministic rules in
//!    [`classify`] over the corpus, consult the [`secondary`] classifier for
//!    uncertain records, reconcile the two and write the curated snapshot
//!
//! Both stages share the [`config`] catalog of tracked products.

pub mod classify;
pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod models;
pub mod outputs;
pub mod reconcile;
pub mod scrapers;
pub mod secondary;
pub mod utils;
