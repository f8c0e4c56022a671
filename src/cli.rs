//! Command-line interface definitions.
//!
//! Two subcommands, one per pipeline stage. Credentials and service endpoints
//! can come from environment variables instead of flags.

use crate::reconcile::{FilterProfile, ValidationMode};
use crate::secondary::ConfidenceScale;
use crate::secondary::ollama::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for the card outcome miner.
///
/// # Examples
///
/// ```sh
/// # Collect into the default corpus with built-in sources and phrases
/// card_outcome_miner collect
///
/// # Collect with a custom config and a smaller budget
/// card_outcome_miner collect --config freedom.yaml --max-new 100
///
/// # Classify the newest corpus in a directory, consulting the model for every record
/// card_outcome_miner classify --input data/raw --mode full
///
/// # Rules only, broad profile
/// card_outcome_miner classify --no-secondary --profile broad
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search forums and append newly found reports to the raw corpus
    Collect(CollectArgs),
    /// Label the raw corpus and write the curated snapshot
    Classify(ClassifyArgs),
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Optional path to a collection config YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Raw corpus file (JSON lines); created if missing
    #[arg(long, default_value = "data/raw/corpus.jsonl")]
    pub corpus: PathBuf,

    /// Override the config's cap on newly accepted posts
    #[arg(long)]
    pub max_new: Option<usize>,

    /// Override the config's number of concurrent units
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Reddit app id; enables OAuth together with the secret
    #[arg(long, env = "REDDIT_APP_ID")]
    pub reddit_app_id: Option<String>,

    /// Reddit app secret
    #[arg(long, env = "REDDIT_APP_SECRET", hide_env_values = true)]
    pub reddit_app_secret: Option<String>,

    /// User agent sent to Reddit
    #[arg(long, env = "REDDIT_APP_NAME", default_value = "card_outcome_miner/0.1")]
    pub user_agent: String,

    /// Per-request timeout for search calls, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// When to ask the secondary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Every record that passes the rule filter
    Full,
    /// Only records whose rule confidence is below --threshold
    Selective,
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Raw corpus file, or a directory whose newest .jsonl file is used
    #[arg(short, long, default_value = "data/raw/corpus.jsonl")]
    pub input: PathBuf,

    /// Classified snapshot to write
    #[arg(short, long, default_value = "data/processed/classified.json")]
    pub output: PathBuf,

    /// Collection config; only its product catalog is used here
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FilterProfile::Strict)]
    pub profile: FilterProfile,

    /// Override the profile's minimum rule confidence
    #[arg(long)]
    pub min_confidence: Option<u32>,

    #[arg(long, value_enum, default_value_t = ModeArg::Selective)]
    pub mode: ModeArg,

    /// Rule confidence below which selective mode asks the model
    #[arg(long, default_value_t = 5)]
    pub threshold: u32,

    /// Skip the secondary classifier entirely
    #[arg(long)]
    pub no_secondary: bool,

    /// Model name served by Ollama
    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Ollama endpoint
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Scale the model reports confidence on
    #[arg(long, value_enum, default_value_t = ConfidenceScale::Ten)]
    pub confidence_scale: ConfidenceScale,

    /// Retries on transport errors per secondary call
    #[arg(long, default_value_t = 0)]
    pub secondary_retries: usize,

    /// Per-request timeout for secondary calls, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl ClassifyArgs {
    /// The validation mode these flags ask for.
    pub fn validation_mode(&self) -> ValidationMode {
        if self.no_secondary {
            return ValidationMode::RulesOnly;
        }
        match self.mode {
            ModeArg::Full => ValidationMode::Full,
            ModeArg::Selective => ValidationMode::Selective {
                threshold: self.threshold,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_defaults() {
        let cli = Cli::parse_from(["card_outcome_miner", "collect"]);
        let Command::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.corpus, PathBuf::from("data/raw/corpus.jsonl"));
        assert!(args.config.is_none());
        assert!(args.max_new.is_none());
        assert_eq!(args.timeout_secs, 30);
    }

    #[test]
    fn test_collect_overrides() {
        let cli = Cli::parse_from([
            "card_outcome_miner",
            "collect",
            "-c",
            "freedom.yaml",
            "--max-new",
            "25",
            "-w",
            "8",
            "--corpus",
            "/tmp/c.jsonl",
        ]);
        let Command::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.config, Some(PathBuf::from("freedom.yaml")));
        assert_eq!(args.max_new, Some(25));
        assert_eq!(args.workers, Some(8));
        assert_eq!(args.corpus, PathBuf::from("/tmp/c.jsonl"));
    }

    #[test]
    fn test_classify_defaults() {
        let cli = Cli::parse_from(["card_outcome_miner", "classify"]);
        let Command::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(args.profile, FilterProfile::Strict);
        assert_eq!(args.confidence_scale, ConfidenceScale::Ten);
        assert_eq!(args.secondary_retries, 0);
        assert_eq!(
            args.validation_mode(),
            ValidationMode::Selective { threshold: 5 }
        );
    }

    #[test]
    fn test_classify_flags() {
        let cli = Cli::parse_from([
            "card_outcome_miner",
            "classify",
            "--profile",
            "broad",
            "--mode",
            "full",
            "--min-confidence",
            "2",
            "--confidence-scale",
            "hundred",
        ]);
        let Command::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(args.profile, FilterProfile::Broad);
        assert_eq!(args.min_confidence, Some(2));
        assert_eq!(args.confidence_scale, ConfidenceScale::Hundred);
        assert_eq!(args.validation_mode(), ValidationMode::Full);
    }

    #[test]
    fn test_no_secondary_wins_over_mode() {
        let cli = Cli::parse_from(["card_outcome_miner", "classify", "--mode", "full", "--no-secondary"]);
        let Command::Classify(args) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(args.validation_mode(), ValidationMode::RulesOnly);
    }
}
