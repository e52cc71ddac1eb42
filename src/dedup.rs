//! Duplicate detection: exact keys and fuzzy title similarity.
//!
//! Two independent tests mark an entry as a duplicate:
//!
//! 1. **Exact**: its dedup key (hash of normalized title + registrable
//!    domain) matches an already-known article.
//! 2. **Fuzzy**: its normalized title scores at least
//!    [`FUZZY_THRESHOLD`] out of 100 against any already-known title,
//!    regardless of domain.
//!
//! The fuzzy test compares every candidate against every known title with no
//! domain or time-window restriction. As the store grows this can false-merge
//! unrelated stories with generically similar headlines; bounding the
//! comparison window to recent articles is the tunable to reach for first.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::models::Article;
use crate::utils::{hash_hex, registrable_domain};

/// Minimum token-set similarity (0-100) for the fuzzy duplicate test.
pub const FUZZY_THRESHOLD: u32 = 90;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Normalize a title for comparison: lowercase, collapse every run of
/// characters outside `[a-z0-9]` to a single space, trim.
///
/// Deliberately ASCII-only so that æ/ø/å and punctuation both act as token
/// separators and spelling variants of the same headline normalize alike.
pub fn normalize(title: &str) -> String {
    NON_ALNUM
        .replace_all(&title.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Exact-duplicate key: hash of the normalized title and the registrable
/// domain of the link. Invariant to case, punctuation, and any part of the
/// URL that does not change its registrable domain.
pub fn dedup_key(title: &str, link: &str) -> String {
    hash_hex(&format!("{}|{}", normalize(title), registrable_domain(link)))
}

/// Token-set similarity between two normalized strings, scored 0-100.
///
/// Splits both strings into whitespace token sets and scores the pairwise
/// edit similarity of the intersection and the two set-union remainders,
/// taking the maximum. Robust to word reordering and to one title being a
/// token subset of the other (a subset scores 100).
pub fn token_set_ratio(a: &str, b: &str) -> u32 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let intersection = join(tokens_a.intersection(&tokens_b));
    let only_a = join(tokens_a.difference(&tokens_b));
    let only_b = join(tokens_b.difference(&tokens_a));

    let combined_a = concat(&intersection, &only_a);
    let combined_b = concat(&intersection, &only_b);

    let score = [
        strsim::normalized_levenshtein(&intersection, &combined_a),
        strsim::normalized_levenshtein(&intersection, &combined_b),
        strsim::normalized_levenshtein(&combined_a, &combined_b),
    ]
    .into_iter()
    .fold(0.0_f64, f64::max);

    (score * 100.0).round() as u32
}

fn join<'a>(tokens: impl Iterator<Item = &'a &'a str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

fn concat(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (_, true) => head.to_string(),
        (true, false) => tail.to_string(),
        (false, false) => format!("{head} {tail}"),
    }
}

/// The accumulated known-set a candidate is tested against: dedup keys for
/// the exact check, normalized titles for the fuzzy check.
///
/// One index is snapshotted from the store before the concurrent phase and
/// stays read-only; a second one accumulates entries accepted during the run.
#[derive(Debug, Default)]
pub struct DedupIndex {
    keys: HashSet<String>,
    titles: Vec<String>,
}

impl DedupIndex {
    pub fn from_articles(articles: &[Article]) -> Self {
        let mut index = DedupIndex::default();
        for article in articles {
            index.insert(normalize(&article.title), article.dedup_key.clone());
        }
        index
    }

    pub fn insert(&mut self, normalized_title: String, key: String) {
        self.keys.insert(key);
        self.titles.push(normalized_title);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Linear fuzzy scan over every known title.
    pub fn has_similar_title(&self, normalized_title: &str) -> bool {
        self.titles.iter().any(|known| {
            let score = token_set_ratio(normalized_title, known);
            if score >= FUZZY_THRESHOLD {
                debug!(score, title = %normalized_title, known = %known, "Fuzzy duplicate");
                true
            } else {
                false
            }
        })
    }

    /// Either duplicate test against this index alone.
    pub fn is_duplicate(&self, normalized_title: &str, key: &str) -> bool {
        self.contains_key(key) || self.has_similar_title(normalized_title)
    }
}

/// Either duplicate test against the store snapshot or the in-run
/// accumulator. Candidates are tested in processing order, so the first-seen
/// entry with a given effective identity wins.
pub fn is_known(snapshot: &DedupIndex, accepted: &DedupIndex, title: &str, link: &str) -> bool {
    let normalized = normalize(title);
    let key = dedup_key(title, link);
    snapshot.is_duplicate(&normalized, &key) || accepted.is_duplicate(&normalized, &key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_punctuation_and_case() {
        assert_eq!(normalize("Ny bru: over FJORDEN!"), "ny bru over fjorden");
        assert_eq!(normalize("  flere   mellomrom  "), "flere mellomrom");
        assert_eq!(normalize("Bodø–Glimt vant"), "bod glimt vant");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_dedup_key_invariant_to_case_and_punctuation() {
        let a = dedup_key("Ny bru over fjorden", "https://avisa.no/sak/1");
        let b = dedup_key("NY BRU, over fjorden!", "https://avisa.no/sak/2?utm=x");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedup_key_differs_across_domains() {
        let a = dedup_key("Ny bru over fjorden", "https://avisa.no/sak");
        let b = dedup_key("Ny bru over fjorden", "https://nrk.no/sak");
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_set_ratio_reordering() {
        assert_eq!(token_set_ratio("bru ny fjorden over", "ny bru over fjorden"), 100);
    }

    #[test]
    fn test_token_set_ratio_subset_scores_full() {
        assert_eq!(token_set_ratio("ny bru", "ny bru over fjorden"), 100);
    }

    #[test]
    fn test_token_set_ratio_disjoint_is_low() {
        assert!(token_set_ratio("kommunestyret vedtok budsjett", "fotballkampen endte uavgjort") < 50);
    }

    #[test]
    fn test_token_set_ratio_empty() {
        assert_eq!(token_set_ratio("", "noko"), 0);
        assert_eq!(token_set_ratio("", ""), 0);
    }

    #[test]
    fn test_index_exact_and_fuzzy() {
        let mut index = DedupIndex::default();
        index.insert(
            normalize("Ny bru over fjorden opna i dag"),
            dedup_key("Ny bru over fjorden opna i dag", "https://avisa.no/sak"),
        );

        // Same title, same domain: exact hit.
        assert!(index.is_duplicate(
            &normalize("Ny bru over fjorden opna i dag"),
            &dedup_key("Ny bru over fjorden opna i dag", "https://avisa.no/annan"),
        ));
        // Near-identical title on another domain: fuzzy hit.
        assert!(index.is_duplicate(
            &normalize("Ny bru over fjorden opna"),
            &dedup_key("Ny bru over fjorden opna", "https://nrk.no/sak"),
        ));
        // Unrelated title.
        assert!(!index.is_duplicate(
            &normalize("Skulen får nytt tak"),
            &dedup_key("Skulen får nytt tak", "https://nrk.no/sak"),
        ));
    }
}
