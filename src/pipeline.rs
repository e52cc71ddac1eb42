//! The ingestion pipeline.
//!
//! One task per configured source runs concurrently: fetch the feed, walk its
//! entries in order, enrich each with page metadata, image renditions, and
//! classification. Entries within a source are processed sequentially so the
//! duplicate ordering stays well-defined. All tasks are awaited at a single
//! barrier, after which a single-threaded duplicate pass (source-config
//! order outer, feed-entry order inner) decides which candidates survive.
//!
//! During the concurrent phase a task consults only the read-only store
//! snapshot and its own candidates, so known articles are rejected before any
//! page fetch without racing sibling tasks; the post-barrier pass is the
//! authority for cross-source duplicates.

use chrono::SecondsFormat;
use futures::future::join_all;
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

use crate::classify::Classifier;
use crate::config::PipelineConfig;
use crate::dedup::{self, DedupIndex};
use crate::extract::{self, PageMeta};
use crate::fetch;
use crate::images;
use crate::models::{Article, RunStats, Source};
use crate::outputs::proof;
use crate::utils::{now_iso, registrable_domain, short_hash, truncate_chars};

/// Entries considered per source, counted before usability filtering, to
/// bound cost from abnormally large feeds.
const MAX_ENTRIES_PER_SOURCE: usize = 50;

const INGRESS_MAX_CHARS: usize = 220;

/// What a run produced: the surviving articles plus its counters.
#[derive(Debug)]
pub struct RunOutcome {
    pub accepted: Vec<Article>,
    pub stats: RunStats,
}

/// A feed entry with the fields the pipeline needs. Entries without a link
/// and a non-empty title never become one of these.
#[derive(Debug)]
struct FeedEntry {
    link: String,
    title: String,
    summary: Option<String>,
    /// RFC 3339, from the entry's published timestamp falling back to its
    /// updated timestamp.
    published: Option<String>,
}

/// Parse a feed document into usable entries, feed order preserved.
fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>, feed_rs::parser::ParseFeedError> {
    let feed = feed_rs::parser::parse(bytes)?;
    let entries = feed
        .entries
        .into_iter()
        .take(MAX_ENTRIES_PER_SOURCE)
        .filter_map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone())?;
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())?;
            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true));
            let summary = entry.summary.map(|s| s.content);
            Some(FeedEntry {
                link,
                title,
                summary,
                published,
            })
        })
        .collect();
    Ok(entries)
}

/// Fetch and process one source. Failures are isolated here: a source whose
/// feed cannot be fetched or parsed contributes zero candidates and does not
/// abort sibling sources.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
async fn process_source(
    client: &Client,
    source: &Source,
    classifier: &Classifier,
    snapshot: &DedupIndex,
    cfg: &PipelineConfig,
) -> (Vec<Article>, RunStats) {
    let mut stats = RunStats::default();
    let mut candidates: Vec<Article> = Vec::new();
    let mut own = DedupIndex::default();

    let bytes = match fetch::fetch_bytes(client, &source.url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(url = %source.url, error = %e, "Feed fetch failed; source contributes nothing");
            stats.sources_failed = 1;
            return (candidates, stats);
        }
    };
    let entries = match parse_feed(&bytes) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(url = %source.url, error = %e, "Feed parse failed; source contributes nothing");
            stats.sources_failed = 1;
            return (candidates, stats);
        }
    };
    info!(count = entries.len(), "Parsed feed entries");

    for entry in entries {
        stats.entries_seen += 1;
        // Early rejection against the store snapshot and this task's own
        // candidates saves the page fetch; cross-source duplicates are the
        // post-barrier pass's job.
        if dedup::is_known(snapshot, &own, &entry.title, &entry.link) {
            stats.duplicates_suppressed += 1;
            debug!(link = %entry.link, "Skipping known entry");
            continue;
        }
        let article = build_article(client, source, classifier, cfg, entry, &mut stats).await;
        own.insert(dedup::normalize(&article.title), article.dedup_key.clone());
        candidates.push(article);
    }
    (candidates, stats)
}

/// Assemble one article from a feed entry: page metadata, proof artifacts,
/// image renditions, classification. Every enrichment is best-effort; the
/// entry proceeds on feed-supplied fields when the page yields nothing.
async fn build_article(
    client: &Client,
    source: &Source,
    classifier: &Classifier,
    cfg: &PipelineConfig,
    entry: FeedEntry,
    stats: &mut RunStats,
) -> Article {
    let fetched_at = now_iso();

    let (meta, image_alt) = match fetch::fetch_text(client, &entry.link).await {
        Ok(page) => {
            if page.status >= 400 {
                debug!(status = page.status, url = %entry.link, "Page responded with error status; mining body anyway");
            }
            let meta = extract::page_meta(&page.body, &entry.link);
            proof::write_proof(&cfg.proof_dir, &entry.link, &page.body, &page.headers).await;
            let alt = meta
                .image_alt
                .clone()
                .or_else(|| meta.title.clone())
                .unwrap_or_else(|| entry.title.clone());
            (meta, Some(alt))
        }
        Err(e) => {
            warn!(url = %entry.link, error = %e, "Page fetch failed; continuing on feed fields");
            stats.pages_failed += 1;
            (PageMeta::default(), None)
        }
    };

    let mut image_variants = BTreeMap::new();
    if let Some(image_url) = &meta.image {
        match fetch::fetch_bytes(client, image_url).await {
            Ok(blob) => {
                image_variants =
                    images::write_variants(&blob, &short_hash(image_url, 12), &cfg.image_dir);
                stats.images_written += image_variants.len();
            }
            Err(e) => debug!(url = %image_url, error = %e, "Image fetch failed; entry keeps no variants"),
        }
    }

    let ingress = meta
        .description
        .clone()
        .or(entry.summary)
        .unwrap_or_default();
    let full_text = format!("{} {}", entry.title, ingress);
    let categories = classifier.categories(&full_text);
    let geo = classifier.geo(&full_text, &entry.link, source.default_region.as_deref());

    Article {
        id: short_hash(&entry.link, 16),
        dedup_key: dedup::dedup_key(&entry.title, &entry.link),
        title: entry.title,
        ingress: truncate_chars(ingress.trim(), INGRESS_MAX_CHARS),
        url: entry.link.clone(),
        domain: registrable_domain(&entry.link),
        published_at: entry.published.unwrap_or_else(|| fetched_at.clone()),
        fetched_at,
        categories,
        geo,
        license_hint: source.license_hint.clone(),
        license_url: meta.license_url,
        image_variants,
        image_alt,
        source_name: Some(source.name.clone()),
    }
}

/// The authoritative duplicate pass, run after the concurrency barrier.
///
/// Candidates are tested in source-config order, then feed-entry order,
/// against the store snapshot and everything accepted earlier in the pass,
/// so the first-seen entry with a given effective identity wins and later
/// near-duplicates are dropped.
fn suppress_duplicates(
    per_source: Vec<Vec<Article>>,
    snapshot: &DedupIndex,
    stats: &mut RunStats,
) -> Vec<Article> {
    let mut accepted_index = DedupIndex::default();
    let mut accepted = Vec::new();
    for candidates in per_source {
        for article in candidates {
            let normalized = dedup::normalize(&article.title);
            if snapshot.is_duplicate(&normalized, &article.dedup_key)
                || accepted_index.is_duplicate(&normalized, &article.dedup_key)
            {
                stats.duplicates_suppressed += 1;
                debug!(id = %article.id, title = %article.title, "Dropped duplicate candidate");
                continue;
            }
            accepted_index.insert(normalized, article.dedup_key.clone());
            accepted.push(article);
        }
    }
    accepted
}

/// Run the whole ingestion phase: concurrent per-source fetch, barrier,
/// duplicate pass. The caller merges the outcome into the store.
pub async fn run(
    cfg: &PipelineConfig,
    sources: &[Source],
    classifier: &Classifier,
    existing: &[Article],
) -> RunOutcome {
    let client = fetch::build_client();
    let snapshot = DedupIndex::from_articles(existing);

    let feed_sources: Vec<&Source> = sources.iter().filter(|s| s.kind == "feed").collect();
    info!(
        sources = feed_sources.len(),
        known_articles = existing.len(),
        "Starting concurrent feed ingestion"
    );

    let results = join_all(
        feed_sources
            .iter()
            .map(|source| process_source(&client, source, classifier, &snapshot, cfg)),
    )
    .await;

    let mut stats = RunStats::default();
    let mut per_source = Vec::with_capacity(results.len());
    for (candidates, source_stats) in results {
        stats.absorb(&source_stats);
        per_source.push(candidates);
    }

    let accepted = suppress_duplicates(per_source, &snapshot, &mut stats);
    info!(
        accepted = accepted.len(),
        entries_seen = stats.entries_seen,
        duplicates = stats.duplicates_suppressed,
        sources_failed = stats.sources_failed,
        pages_failed = stats.pages_failed,
        "Ingestion phase complete"
    );
    RunOutcome { accepted, stats }
}
