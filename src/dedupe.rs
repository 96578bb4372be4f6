//! Duplicate screening over a list of articles, in order.
//!
//! Each article is admitted into the fingerprint store in turn, so the
//! first copy of a story is kept and later near-copies point back at it.
//! The store may already hold fingerprints from earlier runs; articles are
//! compared against those too.

use crate::config::FingerprintConfig;
use crate::models::{Article, DedupeEntry, DedupeReport, Verdict};
use crate::store::{Admission, FingerprintStore, ItemId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Screen `articles` in order, admitting them as ids `first_id`,
/// `first_id + 1`, and so on. Those ids must not already be in `store`.
#[instrument(level = "info", skip_all, fields(count = articles.len(), first_id = first_id, threshold = config.duplicate_threshold))]
pub fn dedupe_articles<F>(
    articles: &[Article],
    store: &F,
    first_id: ItemId,
    config: &FingerprintConfig,
    now: DateTime<Utc>,
) -> DedupeReport
where
    F: FingerprintStore,
{
    let hasher = config.hasher();
    let mut entries = Vec::with_capacity(articles.len());
    let mut admitted: HashMap<ItemId, &str> = HashMap::new();

    for (id, article) in (first_id..).zip(articles) {
        let fingerprint = hasher.compute(&article.content);
        let verdict = if article.content.chars().count() < config.min_content_length {
            Verdict::ShortContent
        } else {
            match store.admit(id, fingerprint, config.duplicate_threshold) {
                Admission::Unique => {
                    admitted.insert(id, &article.source);
                    Verdict::Unique
                }
                Admission::Uninformative => Verdict::ShortContent,
                Admission::Duplicate(m) => {
                    let of = admitted.get(&m.id).map(|s| s.to_string());
                    warn!(
                        source = %article.source,
                        duplicate_id = m.id,
                        duplicate_of = of.as_deref().unwrap_or("-"),
                        distance = m.distance,
                        "Near-duplicate article"
                    );
                    Verdict::Duplicate {
                        id: m.id,
                        of,
                        distance: m.distance,
                    }
                }
            }
        };
        entries.push(DedupeEntry {
            source: article.source.clone(),
            fingerprint,
            verdict,
        });
    }

    let report = DedupeReport {
        generated_at: now,
        threshold: config.duplicate_threshold,
        entries,
    };
    info!(
        total = report.entries.len(),
        duplicates = report.duplicates().count(),
        "Dedupe complete"
    );
    report
}
