//! Command-line interface definitions.
//!
//! Global options apply to every subcommand; the configuration file can also
//! be supplied through `NEWS_FINGERPRINT_CONFIG`.

use clap::{Parser, Subcommand};

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Fingerprint a few article bodies
/// news_fingerprint fingerprint a.txt b.txt
///
/// # Flag near-duplicates and write a JSON report
/// news_fingerprint dedupe articles/*.txt -j ./json
///
/// # Ask whether a failed item may be retried
/// news_fingerprint eligible --retry-count 1 \
///     --last-attempt 2025-05-06T10:00:00Z --created-at 2025-05-06T09:00:00Z
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, global = true, env = "NEWS_FINGERPRINT_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the fingerprint of each file
    Fingerprint {
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Print the Hamming distance between two files' fingerprints
    Distance { a: String, b: String },

    /// Flag near-duplicates among files, earliest argument wins
    Dedupe {
        #[arg(required = true)]
        files: Vec<String>,

        /// Output directory for the JSON report
        #[arg(short, long)]
        json_output_dir: Option<String>,
    },

    /// Decide whether a failed work item may be retried now
    Eligible {
        /// Failed attempts so far (0 = never attempted)
        #[arg(long, default_value_t = 0)]
        retry_count: u32,

        /// RFC 3339 time of the last failed attempt
        #[arg(long)]
        last_attempt: Option<String>,

        /// RFC 3339 time the item was first scraped
        #[arg(long)]
        created_at: String,

        /// RFC 3339 time to evaluate at (defaults to now)
        #[arg(long)]
        now: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_parsing() {
        let cli = Cli::parse_from(["news_fingerprint", "fingerprint", "a.txt", "b.txt"]);
        assert_eq!(
            cli.command,
            Command::Fingerprint {
                files: vec!["a.txt".into(), "b.txt".into()]
            }
        );
    }

    #[test]
    fn test_dedupe_short_flags() {
        let cli = Cli::parse_from([
            "news_fingerprint",
            "dedupe",
            "a.txt",
            "b.txt",
            "-j",
            "/tmp/json",
            "-c",
            "/tmp/config.yaml",
        ]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/config.yaml"));
        match cli.command {
            Command::Dedupe {
                files,
                json_output_dir,
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(json_output_dir.as_deref(), Some("/tmp/json"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_eligible_defaults() {
        let cli = Cli::parse_from([
            "news_fingerprint",
            "eligible",
            "--created-at",
            "2025-05-06T09:00:00Z",
        ]);
        assert_eq!(
            cli.command,
            Command::Eligible {
                retry_count: 0,
                last_attempt: None,
                created_at: "2025-05-06T09:00:00Z".into(),
                now: None,
            }
        );
    }

    #[test]
    fn test_missing_files_rejected() {
        assert!(Cli::try_parse_from(["news_fingerprint", "fingerprint"]).is_err());
        assert!(Cli::try_parse_from(["news_fingerprint", "distance", "a.txt"]).is_err());
    }
}
