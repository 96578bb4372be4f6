//! Screening of fetched article bodies and provider summaries.
//!
//! Fetchers regularly come back with something other than the article: a
//! cookie banner, a region block, a paywall teaser. Summarizers sometimes
//! answer with an apology instead of a summary. These checks catch both so
//! the item is recorded as a failure and retried later instead of stored.

use once_cell::sync::Lazy;
use regex::{RegexSet, RegexSetBuilder};

/// Summaries longer than this many words get cut down.
pub const SUMMARY_MAX_WORDS: usize = 350;
/// Word count a clamped summary is cut to.
pub const SUMMARY_CLAMP_WORDS: usize = 300;

fn phrase_set(phrases: &[&str]) -> RegexSet {
    RegexSetBuilder::new(phrases.iter().map(|p| regex::escape(p)))
        .case_insensitive(true)
        .build()
        .expect("escaped literal phrases always compile")
}

static COOKIE_STRONG: Lazy<RegexSet> = Lazy::new(|| {
    phrase_set(&[
        "cookie consent",
        "cookie policy",
        "cookie settings",
        "cookie preferences",
        "manage cookies",
        "accept cookies",
        "reject cookies",
        "accept all cookies",
        "we use cookies",
        "this site uses cookies",
        "uses cookies to",
        "consent to the use",
        "consent preferences",
        "third-party cookies",
        "third party cookies",
        "strictly necessary cookies",
        "functional cookies",
        "performance cookies",
        "targeting cookies",
        "advertising cookies",
        "analytics cookies",
        "content not available in your region",
        "not available in your location",
        "access denied from your location",
        "content is not available in",
        "service is not available",
        "this content is currently unavailable",
        "yahoo is part of the yahoo family",
        "oath and our partners",
    ])
});

static COOKIE_WEAK: Lazy<RegexSet> = Lazy::new(|| {
    phrase_set(&[
        "privacy policy notice",
        "privacy settings",
        "your privacy choices",
        "your privacy rights",
        "manage your privacy",
        "tracking technology",
        "tracking technologies",
        "opt-out instructions",
        "opt out of",
        "data processing",
        "personal data",
        "gdpr",
        "ccpa",
        "california consumer privacy",
        "legitimate interest",
        "legitimate business interest",
        "continue to yahoo",
        "sign in to continue",
        "create an account",
    ])
});

static PAYWALL: Lazy<RegexSet> = Lazy::new(|| {
    phrase_set(&[
        "this site is now part ofversant",
        "part of versant",
        "subscribe to read",
        "subscribers only",
        "subscriber exclusive",
        "premium content",
        "create a free account",
        "sign in to continue",
        "subscription required",
        "become a member",
        "unlock this article",
        "register to read",
        "paywall",
        "exclusive to subscribers",
    ])
});

static PAYWALL_SHORT: Lazy<RegexSet> =
    Lazy::new(|| phrase_set(&["subscribe", "sign in", "log in", "member only"]));

static REFUSAL: Lazy<RegexSet> = Lazy::new(|| {
    phrase_set(&[
        "I apologize, but",
        "I cannot provide a summary",
        "I cannot create a summary",
        "cannot be created",
        "cannot be generated",
        "does not contain substantial information",
        "appears to be incomplete",
        "appears to be corrupted",
        "appears to be a privacy policy",
        "insufficient information",
        "privacy policy and consent form",
        "privacy policy or consent",
        "consent form",
        "corrupted or unreadable",
        "article content appears to be",
        "article text appears to be",
        "provided text appears to be",
        "provided text is not",
        "text is not the article",
        "is not the article content",
        "article content is absent",
        "actual article content is absent",
        "without the actual article",
        "article content is corrupted",
        "content is corrupted",
    ])
});

/// Cookie banners, consent walls and region blocks.
///
/// Two strong phrases, or one strong plus two weak, is enough. Under 2000
/// characters one of each already counts.
pub fn is_cookie_consent(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let strong = COOKIE_STRONG.matches(text).iter().count();
    let weak = COOKIE_WEAK.matches(text).iter().count();

    strong >= 2
        || (strong >= 1 && weak >= 2)
        || (strong >= 1 && weak >= 1 && text.chars().count() < 2000)
}

pub fn has_paywall(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    PAYWALL.is_match(text) || (text.chars().count() < 300 && PAYWALL_SHORT.is_match(text))
}

/// Provider answered with an apology or a complaint about the input.
pub fn looks_like_refusal(summary: &str) -> bool {
    REFUSAL.is_match(summary)
}

/// Cut summaries over [`SUMMARY_MAX_WORDS`] words down to
/// [`SUMMARY_CLAMP_WORDS`]; shorter ones pass through untouched.
pub fn clamp_summary(summary: &str) -> String {
    let words = summary.split_whitespace().collect::<Vec<_>>();
    if words.len() > SUMMARY_MAX_WORDS {
        words[..SUMMARY_CLAMP_WORDS].join(" ")
    } else {
        summary.to_string()
    }
}
