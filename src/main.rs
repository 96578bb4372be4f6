//! # News Fingerprint CLI
//!
//! Command-line front end for the fingerprint engine and retry scheduler.
//!
//! ## Usage
//!
//! ```sh
//! news_fingerprint fingerprint a.txt b.txt
//! news_fingerprint distance a.txt b.txt
//! news_fingerprint dedupe articles/*.txt -j ./json
//! news_fingerprint eligible --retry-count 2 \
//!     --last-attempt 2025-05-06T10:00:00Z --created-at 2025-05-06T02:00:00Z
//! ```

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{Cli, Command};
use news_fingerprint::config::Config;
use news_fingerprint::dedupe::dedupe_articles;
use news_fingerprint::fingerprint::is_near_duplicate;
use news_fingerprint::is_retry_eligible;
use news_fingerprint::models::Article;
use news_fingerprint::outputs::json;
use news_fingerprint::store::LinearStore;
use news_fingerprint::utils::{ensure_writable_dir, parse_timestamp};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = Config::load_or_default(args.config.as_deref()).await?;

    match args.command {
        Command::Fingerprint { files } => {
            let hasher = config.fingerprint.hasher();
            for article in read_articles(&files).await? {
                let fp = hasher.compute(&article.content);
                println!("{fp}  {}", article.source);
            }
        }
        Command::Distance { a, b } => {
            let hasher = config.fingerprint.hasher();
            let articles = read_articles(&[a, b]).await?;
            let fa = hasher.compute(&articles[0].content);
            let fb = hasher.compute(&articles[1].content);
            let distance = hasher.distance(fa, fb);
            let verdict = if is_near_duplicate(fa, fb, config.fingerprint.duplicate_threshold) {
                "near-duplicate"
            } else {
                "distinct"
            };
            println!("{distance}  {verdict}");
        }
        Command::Dedupe {
            files,
            json_output_dir,
        } => {
            let articles = read_articles(&files).await?;
            let store = LinearStore::new();
            let report = dedupe_articles(&articles, &store, 0, &config.fingerprint, Utc::now());

            for entry in &report.entries {
                println!("{}  {}", entry.fingerprint, serde_json::to_string(&entry.verdict)?);
            }

            if let Some(dir) = json_output_dir {
                ensure_writable_dir(&dir).await?;
                let path = json::write_report(&report, &dir).await?;
                info!(path = %path.display(), "Wrote dedupe report");
            }

            info!(
                articles = report.entries.len(),
                duplicates = report.duplicates().count(),
                "Dedupe finished"
            );
        }
        Command::Eligible {
            retry_count,
            last_attempt,
            created_at,
            now,
        } => {
            let now = match now {
                Some(s) => parse_timestamp(&s)?,
                None => Utc::now(),
            };
            let created_at = parse_timestamp(&created_at)?;
            let last_attempt = last_attempt.as_deref().map(parse_timestamp).transpose()?;
            let policy = config.retry.policy();

            let eligible = is_retry_eligible(
                retry_count,
                last_attempt,
                now.signed_duration_since(created_at),
                now,
                &policy,
            );
            println!("{eligible}");
        }
    }

    let elapsed = start_time.elapsed();
    debug!(elapsed_ms = elapsed.as_millis() as u64, "Finished");

    Ok(())
}

#[instrument(level = "debug", skip_all, fields(count = paths.len()))]
async fn read_articles(paths: &[String]) -> Result<Vec<Article>, Box<dyn Error>> {
    let mut articles = Vec::with_capacity(paths.len());
    for path in paths {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("failed to read {path}: {e}"))?;
        articles.push(Article {
            source: path.clone(),
            content,
        });
    }
    Ok(articles)
}
