//! # News Fingerprint
//!
//! Near-duplicate detection and retry scheduling for a news scraping and
//! summarization pipeline.
//!
//! ## Features
//!
//! - 64-bit SimHash fingerprints of article bodies ([`fingerprint`])
//! - Fingerprint stores with atomic check-then-insert admission, either a
//!   linear scan or a band index ([`store`])
//! - Backoff and age-cutoff scheduling for failed summarization attempts
//!   ([`retry`])
//! - Cookie wall, paywall and refusal screening ([`content`])
//! - Ordered summarizer fallback chains with per-backend backoff
//!   ([`providers`])
//! - A concurrent batch processor tying it all together ([`pipeline`])
//!
//! ## Example
//!
//! ```
//! use news_fingerprint::fingerprint::{fingerprint, hamming_distance};
//!
//! let a = fingerprint("Regulators approved the grid overhaul on Tuesday afternoon");
//! let b = fingerprint("regulators APPROVED the grid overhaul on tuesday afternoon");
//! assert_eq!(hamming_distance(a, b), 0);
//! assert_eq!(fingerprint("a b c"), 0);
//! ```

pub mod config;
pub mod content;
pub mod dedupe;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod providers;
pub mod retry;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, SimHasher, fingerprint, hamming_distance};
pub use retry::{RetryPolicy, RetryState, is_retry_eligible};
