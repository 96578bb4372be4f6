//! Batch processing of work items: screening, duplicate admission, and
//! summarization with retry bookkeeping.
//!
//! # Batch flow
//!
//! 1. **Select**: up to `batch_size` eligible items, newest first.
//! 2. **Screen** (sequential, oldest first): reject empty and cookie-wall
//!    bodies, admit substantial bodies into the fingerprint store, drop
//!    near-duplicates of earlier articles, reject paywalls.
//! 3. **Summarize** (concurrent, `workers` at a time): run the fallback
//!    chain and record success or failure on the work store.
//!
//! Screening runs oldest first so that, within a batch, the earlier copy of
//! a republished story is the one retained.

use crate::config::Config;
use crate::content::{has_paywall, is_cookie_consent};
use crate::fingerprint::{Fingerprint, SimHasher};
use crate::models::{BatchReport, WorkItem};
use crate::providers::Summarizer;
use crate::retry::RetryPolicy;
use crate::store::{Admission, FingerprintStore, ItemId, Match};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, warn};

/// Persisted work items. Implementations serialize updates per item.
pub trait WorkStore {
    /// Items still needing a summary that the policy allows at `now`,
    /// newest first, at most `limit`.
    fn eligible(&self, now: DateTime<Utc>, policy: &RetryPolicy, limit: usize) -> Vec<WorkItem>;

    /// Returns `false` if the item no longer exists.
    fn record_failure(&self, id: ItemId, now: DateTime<Utc>) -> bool;

    fn record_success(&self, id: ItemId, summary: String, fingerprint: Option<Fingerprint>) -> bool;

    fn remove(&self, id: ItemId) -> Option<WorkItem>;

    /// Give every failed item a fresh retry counter. Returns how many.
    fn reset_failed(&self) -> usize;
}

/// Work store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkStore {
    items: Mutex<BTreeMap<ItemId, WorkItem>>,
}

impl InMemoryWorkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, BTreeMap<ItemId, WorkItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, item: WorkItem) {
        self.items().insert(item.id, item);
    }

    pub fn get(&self, id: ItemId) -> Option<WorkItem> {
        self.items().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

impl WorkStore for InMemoryWorkStore {
    fn eligible(&self, now: DateTime<Utc>, policy: &RetryPolicy, limit: usize) -> Vec<WorkItem> {
        let mut items = self
            .items()
            .values()
            .filter(|item| item.summary.is_none())
            .filter(|item| item.retry.is_eligible(item.age(now), now, policy))
            .cloned()
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        items.truncate(limit);
        items
    }

    fn record_failure(&self, id: ItemId, now: DateTime<Utc>) -> bool {
        match self.items().get_mut(&id) {
            Some(item) => {
                item.retry.record_failure(now);
                true
            }
            None => false,
        }
    }

    fn record_success(&self, id: ItemId, summary: String, fingerprint: Option<Fingerprint>) -> bool {
        match self.items().get_mut(&id) {
            Some(item) => {
                item.retry.record_success();
                item.summary = Some(summary);
                if fingerprint.is_some() {
                    item.fingerprint = fingerprint;
                }
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: ItemId) -> Option<WorkItem> {
        self.items().remove(&id)
    }

    fn reset_failed(&self) -> usize {
        let mut items = self.items();
        let mut count = 0;
        for item in items.values_mut().filter(|i| i.retry.failed) {
            item.retry.reset_counter();
            count += 1;
        }
        info!(count, "Reset retry counters for failed items");
        count
    }
}

/// Why an item was recorded as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoContent,
    CookieConsent,
    Paywall,
    Summarizer,
}

/// What happened to one item in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(FailureReason),
    Duplicate(Match),
}

enum Screened {
    Ready(WorkItem, Option<Fingerprint>),
    Done(Outcome),
}

/// One scan over a work store.
pub struct Pipeline<'a, W, F, S> {
    work: &'a W,
    fingerprints: &'a F,
    summarizer: &'a S,
    config: &'a Config,
    policy: RetryPolicy,
    hasher: SimHasher,
}

impl<'a, W, F, S> Pipeline<'a, W, F, S>
where
    W: WorkStore,
    F: FingerprintStore,
    S: Summarizer,
{
    pub fn new(work: &'a W, fingerprints: &'a F, summarizer: &'a S, config: &'a Config) -> Self {
        Self {
            work,
            fingerprints,
            summarizer,
            config,
            policy: config.retry.policy(),
            hasher: config.fingerprint.hasher(),
        }
    }

    fn fail(&self, id: ItemId, now: DateTime<Utc>, reason: FailureReason) -> Outcome {
        if !self.work.record_failure(id, now) {
            warn!(id, "Failed item vanished from work store");
        }
        Outcome::Failed(reason)
    }

    fn screen(&self, item: WorkItem, now: DateTime<Utc>) -> Screened {
        let chars = item.body.chars().count();
        if chars < self.config.pipeline.min_summary_input {
            debug!(id = item.id, chars, "No usable content");
            return Screened::Done(self.fail(item.id, now, FailureReason::NoContent));
        }
        if is_cookie_consent(&item.body) {
            debug!(id = item.id, "Body is cookie consent or region block");
            return Screened::Done(self.fail(item.id, now, FailureReason::CookieConsent));
        }

        let mut fingerprint = None;
        if chars >= self.config.fingerprint.min_content_length {
            let fp = self.hasher.compute(&item.body);
            match self
                .fingerprints
                .admit(item.id, fp, self.config.fingerprint.duplicate_threshold)
            {
                Admission::Duplicate(m) => {
                    info!(id = item.id, duplicate_of = m.id, distance = m.distance, "Dropping near-duplicate");
                    self.work.remove(item.id);
                    return Screened::Done(Outcome::Duplicate(m));
                }
                Admission::Unique => fingerprint = Some(fp),
                Admission::Uninformative => {}
            }
        } else {
            debug!(id = item.id, chars, "Content too short for duplicate check");
        }

        if has_paywall(&item.body) {
            debug!(id = item.id, "Paywall detected");
            return Screened::Done(self.fail(item.id, now, FailureReason::Paywall));
        }
        Screened::Ready(item, fingerprint)
    }

    async fn summarize(&self, item: WorkItem, fingerprint: Option<Fingerprint>, now: DateTime<Utc>) -> Outcome {
        debug!(id = item.id, retry_count = item.retry.retry_count, "Summarizing");
        match self.summarizer.summarize(&item.title, &item.body).await {
            Ok(summary) => {
                self.work.record_success(item.id, summary, fingerprint);
                info!(id = item.id, "Successfully processed item");
                Outcome::Succeeded
            }
            Err(e) => {
                error!(id = item.id, error = %e, "Summarization failed");
                self.fail(item.id, now, FailureReason::Summarizer)
            }
        }
    }

    /// Select, screen and summarize one batch.
    #[instrument(level = "info", skip(self), fields(batch_size = self.config.pipeline.batch_size, workers = self.config.pipeline.workers))]
    pub async fn run_batch(&self, now: DateTime<Utc>) -> BatchReport {
        let mut items = self
            .work
            .eligible(now, &self.policy, self.config.pipeline.batch_size);
        let mut report = BatchReport {
            selected: items.len(),
            ..BatchReport::default()
        };
        if items.is_empty() {
            info!("No items need summarization");
            return report;
        }
        info!(count = items.len(), "Selected items");

        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let mut outcomes = Vec::with_capacity(items.len());
        let mut ready = Vec::new();
        for item in items {
            match self.screen(item, now) {
                Screened::Ready(item, fp) => ready.push((item, fp)),
                Screened::Done(outcome) => outcomes.push(outcome),
            }
        }

        let summarized: Vec<Outcome> = stream::iter(ready)
            .map(|(item, fp)| self.summarize(item, fp, now))
            .buffer_unordered(self.config.pipeline.workers.max(1))
            .collect()
            .await;
        outcomes.extend(summarized);

        for outcome in outcomes {
            match outcome {
                Outcome::Succeeded => report.succeeded += 1,
                Outcome::Failed(_) => report.failed += 1,
                Outcome::Duplicate(_) => report.duplicates += 1,
            }
        }
        info!(
            selected = report.selected,
            succeeded = report.succeeded,
            failed = report.failed,
            duplicates = report.duplicates,
            "Batch complete"
        );
        report
    }
}
