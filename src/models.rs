//! Data models for feed sources, persisted articles, and run accounting.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Source`]: a configured feed to ingest
//! - [`Article`]: the persisted unit in the article store
//! - [`GeoTag`] / [`GeoKind`]: geographic tags attached to an article
//! - [`Gazetteer`]: the place-name lists used for geo tagging
//! - [`RunStats`]: per-run counters for observability
//!
//! The serialized field names and their order match the on-disk store format,
//! so the structs here double as the persistence schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::parse_timestamp;

/// A configured feed source, loaded once per run from `sources.json`.
///
/// Only sources with `kind == "feed"` are processed; the field defaults to
/// `"feed"` when absent so hand-maintained source lists stay short.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Source {
    /// Human-readable source name, copied onto each article.
    pub name: String,
    /// The feed document URL.
    pub url: String,
    /// Source kind; only `"feed"` sources are ingested.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Region used when neither the gazetteer nor the domain map matches.
    #[serde(default)]
    pub default_region: Option<String>,
    /// Free-form license hint copied onto each article.
    #[serde(default)]
    pub license_hint: Option<String>,
}

fn default_kind() -> String {
    "feed".to_string()
}

/// The granularity of a geographic tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoKind {
    Kommune,
    Fylke,
    Region,
}

/// A single geographic tag on an article.
///
/// Gazetteer matches produce `kommune`/`fylke` tags; the fallback chain
/// (domain map, then source default) produces at most one `region` tag.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeoTag {
    #[serde(rename = "type")]
    pub kind: GeoKind,
    pub name: String,
}

impl GeoTag {
    pub fn region(name: impl Into<String>) -> Self {
        GeoTag {
            kind: GeoKind::Region,
            name: name.into(),
        }
    }
}

/// Place-name lists for geo tagging, loaded from `geography.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Gazetteer {
    /// Municipality names.
    #[serde(default)]
    pub kommunar: Vec<String>,
    /// County names.
    #[serde(default)]
    pub fylke: Vec<String>,
}

/// A persisted article, created once during a run and never mutated after
/// being accepted into the store.
///
/// # Identity
///
/// * `id` is derived solely from the canonical link, so re-fetching the same
///   URL in a later run reproduces the same id.
/// * `dedup` is the exact-duplicate key (normalized title + registrable
///   domain) and is unique across the persisted store at all times.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Article {
    /// Display identity: first 16 hex chars of the link hash.
    pub id: String,
    /// Exact-duplicate key.
    #[serde(rename = "dedup")]
    pub dedup_key: String,
    pub title: String,
    /// Truncated summary, at most 220 characters.
    pub ingress: String,
    pub url: String,
    /// Registrable domain of `url`.
    pub domain: String,
    /// RFC 3339 publication timestamp (UTC).
    pub published_at: String,
    /// RFC 3339 fetch timestamp (UTC).
    pub fetched_at: String,
    /// Sorted category tags.
    pub categories: Vec<String>,
    /// Geographic tags, gazetteer matches first.
    pub geo: Vec<GeoTag>,
    pub license_hint: Option<String>,
    pub license_url: Option<String>,
    /// Width label (`"320"`, `"640"`, `"1024"`) to asset-relative file path.
    pub image_variants: BTreeMap<String, String>,
    pub image_alt: Option<String>,
    pub source_name: Option<String>,
}

impl Article {
    /// Millisecond timestamp used for store ordering: `published_at`, falling
    /// back to `fetched_at`, falling back to epoch zero so articles with
    /// unparseable timestamps sort as oldest.
    pub fn effective_timestamp(&self) -> i64 {
        parse_timestamp(&self.published_at)
            .or_else(|| parse_timestamp(&self.fetched_at))
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Counters accumulated over a run, reported in the final summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    /// Sources whose feed fetch or parse failed.
    pub sources_failed: usize,
    /// Feed entries considered (after the per-source cap).
    pub entries_seen: usize,
    /// Entries dropped as exact or fuzzy duplicates.
    pub duplicates_suppressed: usize,
    /// Article pages that could not be fetched.
    pub pages_failed: usize,
    /// Image renditions written.
    pub images_written: usize,
}

impl RunStats {
    pub fn absorb(&mut self, other: &RunStats) {
        self.sources_failed += other.sources_failed;
        self.entries_seen += other.entries_seen;
        self.duplicates_suppressed += other.duplicates_suppressed;
        self.pages_failed += other.pages_failed;
        self.images_written += other.images_written;
    }
}

/// Test fixture shared by the store and pipeline tests.
#[cfg(test)]
pub(crate) fn sample_article() -> Article {
    Article {
        id: "0011223344556677".to_string(),
        dedup_key: "abc".to_string(),
        title: "Ny bru over fjorden".to_string(),
        ingress: "Kommunen opnar ny bru.".to_string(),
        url: "https://avisa.no/nyhende/bru".to_string(),
        domain: "avisa.no".to_string(),
        published_at: "2024-02-01T08:00:00+00:00".to_string(),
        fetched_at: "2024-02-01T09:00:00+00:00".to_string(),
        categories: vec!["samferdsle".to_string()],
        geo: vec![GeoTag::region("Vestland")],
        license_hint: None,
        license_url: None,
        image_variants: BTreeMap::new(),
        image_alt: None,
        source_name: Some("Avisa".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_defaults_to_feed() {
        let src: Source =
            serde_json::from_str(r#"{"name": "NRK", "url": "https://nrk.no/rss"}"#).unwrap();
        assert_eq!(src.kind, "feed");
        assert!(src.default_region.is_none());
    }

    #[test]
    fn geo_tag_serializes_with_type_field() {
        let tag = GeoTag {
            kind: GeoKind::Kommune,
            name: "Voss".to_string(),
        };
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, r#"{"type":"kommune","name":"Voss"}"#);
    }

    #[test]
    fn effective_timestamp_falls_back_to_fetched_at() {
        let mut article = sample_article();
        article.published_at = "not a date".to_string();
        article.fetched_at = "2024-03-01T12:00:00+00:00".to_string();
        assert!(article.effective_timestamp() > 0);

        article.fetched_at = "also junk".to_string();
        assert_eq!(article.effective_timestamp(), 0);
    }
}
