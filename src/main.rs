//! ## Usage
//!
//! ```sh
//! card_outcome_miner collect --config freedom.yaml
//! card_outcome_miner classify --input data/raw --mode selective --threshold 5
//! ```

use card_outcome_miner::classify::CardClassifier;
use card_outcome_miner::cli::{ClassifyArgs, Cli, CollectArgs, Command};
use card_outcome_miner::collect::CollectionScheduler;
use card_outcome_miner::config::CollectionConfig;
use card_outcome_miner::models::{ClassifiedSnapshot, OutcomeLabel};
use card_outcome_miner::outputs::{corpus, json};
use card_outcome_miner::reconcile::{HybridReconciler, ReconcileOptions, ValidationMode};
use card_outcome_miner::scrapers::reddit::{RedditCredentials, RedditSearch};
use card_outcome_miner::secondary::ollama::OllamaClassifier;
use card_outcome_miner::secondary::retry::RetryClassifier;
use card_outcome_miner::utils::{ensure_writable_dir, resolve_input};
use chrono::Utc;
use clap::Parser;
use itertools::Itertools;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let result = match args.command {
        Command::Collect(args) => run_collect(args).await,
        Command::Classify(args) => run_classify(args).await,
    };

    let elapsed_ms = start_time.elapsed().as_millis() as u64;
    match &result {
        Ok(()) => info!(elapsed_ms, "Run finished"),
        Err(e) => error!(elapsed_ms, error = %e, "Run failed"),
    }
    result
}

#[instrument(level = "info", skip_all, fields(corpus = %args.corpus.display()))]
async fn run_collect(args: CollectArgs) -> Result<(), Box<dyn Error>> {
    let mut config = CollectionConfig::load(args.config.as_deref()).await?;
    if let Some(max_new) = args.max_new {
        config.max_new_items = max_new;
    }
    if let Some(workers) = args.workers {
        config.workers = workers.max(1);
    }

    let credentials = match (args.reddit_app_id, args.reddit_app_secret) {
        (Some(client_id), Some(client_secret)) => Some(RedditCredentials {
            client_id,
            client_secret,
        }),
        (None, None) => None,
        _ => {
            warn!("Reddit OAuth needs both an app id and a secret; searching anonymously");
            None
        }
    };
    let search = RedditSearch::new(
        &args.user_agent,
        credentials,
        Duration::from_secs(args.timeout_secs),
    )?;

    let scheduler = CollectionScheduler::new(search, config)?;
    let summary = scheduler.run(&args.corpus).await?;
    let stats = summary.stats;
    info!(
        new_records = summary.new_records,
        total_corpus_size = summary.total_corpus_size,
        units = stats.units,
        accepted = stats.accepted,
        skipped_duplicate = stats.skipped_duplicate,
        skipped_stale = stats.skipped_stale,
        skipped_no_card = stats.skipped_no_card,
        skipped_irrelevant = stats.skipped_irrelevant,
        errors = stats.errors,
        "Collection summary"
    );
    Ok(())
}

#[instrument(level = "info", skip_all, fields(input = %args.input.display(), output = %args.output.display()))]
async fn run_classify(args: ClassifyArgs) -> Result<(), Box<dyn Error>> {
    let config = CollectionConfig::load(args.config.as_deref()).await?;
    let cards = CardClassifier::new(&config.catalog)?;

    // Early check: fail before any model calls if the output cannot be written.
    if let Some(dir) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_writable_dir(dir).await?;
    }

    let input = resolve_input(&args.input, "jsonl").await?;
    let entries = corpus::read_entries(&input).await?;
    info!(input = %input.display(), entries = entries.len(), "Loaded raw corpus");

    let mut mode = args.validation_mode();
    let secondary = if mode == ValidationMode::RulesOnly {
        None
    } else {
        let ollama = OllamaClassifier::new(
            &args.endpoint,
            &args.model,
            args.confidence_scale,
            Duration::from_secs(args.timeout_secs),
        )?;
        match ollama.ping().await {
            Ok(()) => Some(RetryClassifier::new(
                ollama,
                args.secondary_retries,
                Duration::from_secs(1),
            )),
            Err(e) => {
                warn!(error = %e, endpoint = %args.endpoint, "Secondary classifier unavailable; continuing with rules only");
                None
            }
        }
    };
    if secondary.is_none() {
        mode = ValidationMode::RulesOnly;
    }

    let options = ReconcileOptions {
        profile: args.profile,
        min_confidence: args.min_confidence,
        mode,
        scale: args.confidence_scale,
    };
    let reconciler = HybridReconciler::new(&cards, &config.catalog.family_name, options);
    let (records, summary) = reconciler.run(&entries, secondary.as_ref()).await;

    let by_label = records.iter().counts_by(|r| r.final_label);
    let by_product = records.iter().counts_by(|r| r.product.to_string());
    info!(
        approved = by_label.get(&OutcomeLabel::Approved).copied().unwrap_or(0),
        denied = by_label.get(&OutcomeLabel::Denied).copied().unwrap_or(0),
        products = ?by_product,
        "Curated record breakdown"
    );

    let snapshot = ClassifiedSnapshot {
        generated_at: Utc::now(),
        input: input.display().to_string(),
        summary,
        records,
    };
    json::write_snapshot(&snapshot, &args.output).await?;
    info!(
        kept = summary.kept,
        total = summary.total,
        secondary_consulted = summary.secondary_consulted,
        secondary_overrides = summary.secondary_overrides,
        secondary_failures = summary.secondary_failures,
        "Classification summary"
    );
    Ok(())
}
