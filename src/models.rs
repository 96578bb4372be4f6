//! Data models for work items and run reports.
//!
//! - [`Article`]: a body of text and where it came from
//! - [`WorkItem`]: an article awaiting enrichment, with its retry bookkeeping
//! - [`DedupeReport`]: outcome of fingerprinting a set of articles
//! - [`BatchReport`]: counts from one pipeline batch

use crate::fingerprint::Fingerprint;
use crate::retry::RetryState;
use crate::store::ItemId;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A raw article body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// The source URL or file path of the article.
    pub source: String,
    /// The raw text content.
    pub content: String,
}

/// An article waiting to be summarized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    pub title: String,
    pub body: String,
    /// When the article was first scraped; drives the age cutoff.
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retry: RetryState,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<Fingerprint>,
}

impl WorkItem {
    pub fn new(id: ItemId, title: impl Into<String>, body: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            created_at,
            retry: RetryState::default(),
            summary: None,
            fingerprint: None,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.created_at)
    }
}

/// Verdict for one article in a dedupe run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Unique,
    /// Near-copy of stored item `id`. `of` names its source when that item
    /// was admitted in the same run.
    Duplicate {
        id: ItemId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        of: Option<String>,
        distance: u32,
    },
    /// Body too short (or without qualifying tokens) to compare.
    ShortContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeEntry {
    pub source: String,
    pub fingerprint: Fingerprint,
    #[serde(flatten)]
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeReport {
    pub generated_at: DateTime<Utc>,
    pub threshold: u32,
    pub entries: Vec<DedupeEntry>,
}

impl DedupeReport {
    pub fn duplicates(&self) -> impl Iterator<Item = &DedupeEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.verdict, Verdict::Duplicate { .. }))
    }
}

/// Counts from one pipeline batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub selected: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duplicates: usize,
}
