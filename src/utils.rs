//! Helpers for hashing, domain extraction, timestamps, and file system checks.
//!
//! Everything identity-related lives here: the content hashes behind article
//! ids, dedup keys, image base names, and proof filenames all go through
//! [`hash_hex`] so the whole crate derives identifiers the same way.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// SHA-256 of `s`, as a lowercase hex string.
pub fn hash_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// First `n` hex chars of the SHA-256 of `s`.
///
/// Used for article ids (16 chars) and image base names (12 chars).
pub fn short_hash(s: &str, n: usize) -> String {
    let mut h = hash_hex(s);
    h.truncate(n);
    h
}

/// Registrable domain of a URL: the domain plus public suffix, ignoring
/// subdomains (`https://www.avisa.example.co.uk/x` -> `example.co.uk`).
///
/// Falls back to the raw host when the suffix lookup fails, and to an empty
/// string when the URL does not parse at all.
pub fn registrable_domain(url_str: &str) -> String {
    let Ok(parsed) = url::Url::parse(url_str) else {
        return String::new();
    };
    let Some(host) = parsed.host_str() else {
        return String::new();
    };
    match psl::domain_str(host) {
        Some(domain) => domain.to_string(),
        None => host.to_string(),
    }
}

/// Current UTC time as an RFC 3339 string, the timestamp format used across
/// the store.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored or feed-supplied timestamp.
///
/// Accepts RFC 3339 and RFC 2822 (the two formats seen in practice); anything
/// else is `None` and the caller decides the fallback.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Truncate a string to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if missing, then performs a write test by creating
/// and immediately deleting a probe file. The store rewrite at the end of a
/// run must not be the first moment we learn the disk is read-only.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            debug!("Directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Create a directory tree, logging success at debug level.
pub async fn ensure_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    Ok(())
}

/// Log a short elapsed-time summary for the whole run.
pub fn log_elapsed(start: std::time::Instant) {
    let elapsed = start.elapsed();
    info!(
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_is_stable() {
        assert_eq!(hash_hex("abc"), hash_hex("abc"));
        assert_ne!(hash_hex("abc"), hash_hex("abd"));
        assert_eq!(hash_hex("abc").len(), 64);
    }

    #[test]
    fn test_short_hash_lengths() {
        assert_eq!(short_hash("https://avisa.no/sak", 16).len(), 16);
        assert_eq!(short_hash("https://avisa.no/bilete.jpg", 12).len(), 12);
        assert!(hash_hex("x").starts_with(&short_hash("x", 12)));
    }

    #[test]
    fn test_registrable_domain_strips_subdomains() {
        assert_eq!(
            registrable_domain("https://www.nrk.no/vestland/sak-123"),
            "nrk.no"
        );
        assert_eq!(
            registrable_domain("https://news.example.co.uk/a?b=c#d"),
            "example.co.uk"
        );
    }

    #[test]
    fn test_registrable_domain_ignores_query_and_fragment() {
        let a = registrable_domain("https://avisa.no/sak?utm=x");
        let b = registrable_domain("https://avisa.no/annan-sak#topp");
        assert_eq!(a, b);
    }

    #[test]
    fn test_registrable_domain_unparseable() {
        assert_eq!(registrable_domain("not a url"), "");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-02-01T08:00:00+00:00").is_some());
        assert!(parse_timestamp("Thu, 01 Feb 2024 08:00:00 +0000").is_some());
        assert!(parse_timestamp("1970").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("kort", 220), "kort");
        assert_eq!(truncate_chars("blåbærsyltetøy", 6), "blåbær");
        let long = "ø".repeat(300);
        assert_eq!(truncate_chars(&long, 220).chars().count(), 220);
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
