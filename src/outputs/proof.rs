//! Proof artifacts: retained raw copies of fetched pages.
//!
//! For every successfully fetched article page, the raw body and the response
//! headers are written under a dated directory, keyed by the link hash. These
//! records are write-once evidence of what was observed at fetch time; the
//! pipeline never reads them back, and a failed write must never fail the
//! entry; errors are logged and forgotten.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::utils::hash_hex;

/// Write the proof pair for one fetched page: `<day>/<hash>.html` and
/// `<day>/<hash>.headers.json`. Best-effort.
pub async fn write_proof(
    proof_dir: &Path,
    link: &str,
    body: &str,
    headers: &BTreeMap<String, String>,
) {
    let day = Utc::now().format("%Y%m%d").to_string();
    let dir = proof_dir.join(&day);
    if let Err(e) = fs::create_dir_all(&dir).await {
        warn!(path = %dir.display(), error = %e, "Could not create proof directory");
        return;
    }

    let key = hash_hex(link);
    if let Err(e) = fs::write(dir.join(format!("{key}.html")), body).await {
        warn!(link, error = %e, "Could not write page proof");
    }
    match serde_json::to_string_pretty(headers) {
        Ok(json) => {
            if let Err(e) = fs::write(dir.join(format!("{key}.headers.json")), json).await {
                warn!(link, error = %e, "Could not write header proof");
            }
        }
        Err(e) => warn!(link, error = %e, "Could not serialize headers"),
    }
    debug!(link, day, "Wrote proof artifacts");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_proof_pair_is_written_under_dated_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let headers =
            BTreeMap::from([("content-type".to_string(), "text/html".to_string())]);
        let link = "https://avisa.no/sak";

        write_proof(tmp.path(), link, "<html>prov</html>", &headers).await;

        let day = Utc::now().format("%Y%m%d").to_string();
        let key = hash_hex(link);
        let html = tmp.path().join(&day).join(format!("{key}.html"));
        let head = tmp.path().join(&day).join(format!("{key}.headers.json"));
        assert_eq!(
            tokio::fs::read_to_string(&html).await.unwrap(),
            "<html>prov</html>"
        );
        let parsed: BTreeMap<String, String> =
            serde_json::from_str(&tokio::fs::read_to_string(&head).await.unwrap()).unwrap();
        assert_eq!(parsed, headers);
    }

    #[tokio::test]
    async fn test_unwritable_proof_dir_is_tolerated() {
        // Points at a file, so create_dir_all fails; the call must not panic.
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blokkert");
        tokio::fs::write(&blocker, "fil").await.unwrap();
        write_proof(&blocker, "https://avisa.no/sak", "body", &BTreeMap::new()).await;
    }
}
