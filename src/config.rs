//! Pipeline configuration: resolved paths and JSON config loading.
//!
//! [`PipelineConfig`] is built once from the CLI and injected into the
//! pipeline; nothing below `main` reads the environment or invents paths.
//! Config files degrade to empty defaults when missing or corrupt, so the run
//! proceeds with reduced classification coverage rather than aborting.

use serde::de::DeserializeOwned;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cli::Cli;
use crate::utils::{ensure_dir, ensure_writable_dir};

/// Every path the pipeline touches, resolved up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the article store.
    pub data_dir: PathBuf,
    /// Directory image renditions are written into.
    pub image_dir: PathBuf,
    /// Directory proof artifacts are written into (dated subdirectories).
    pub proof_dir: PathBuf,
    /// The article store file.
    pub store_path: PathBuf,
    pub sources_path: PathBuf,
    pub keywords_path: PathBuf,
    pub gazetteer_path: PathBuf,
    pub domain_map_path: PathBuf,
}

impl PipelineConfig {
    /// Resolve all paths from the CLI, applying the default site layout for
    /// anything not overridden.
    pub fn from_cli(cli: &Cli) -> Self {
        let site = &cli.site_root;
        let store_path = cli
            .store_file
            .clone()
            .unwrap_or_else(|| site.join("assets/data/articles.json"));
        let data_dir = store_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| site.join("assets/data"));
        let config_dir = cli
            .config_dir
            .clone()
            .unwrap_or_else(|| site.join("config"));
        PipelineConfig {
            data_dir,
            image_dir: cli
                .image_dir
                .clone()
                .unwrap_or_else(|| site.join("assets/images")),
            proof_dir: cli
                .proof_dir
                .clone()
                .unwrap_or_else(|| site.join("assets/proof")),
            store_path,
            sources_path: config_dir.join("sources.json"),
            keywords_path: config_dir.join("categories_keywords.json"),
            gazetteer_path: config_dir.join("geography.json"),
            domain_map_path: config_dir.join("domain_regions.json"),
        }
    }

    /// Create the output directories and verify the data directory is
    /// writable before any network work starts.
    pub async fn prepare_dirs(&self) -> Result<(), Box<dyn Error>> {
        ensure_writable_dir(&self.data_dir).await?;
        ensure_dir(&self.image_dir).await?;
        ensure_dir(&self.proof_dir).await?;
        Ok(())
    }
}

/// Load a JSON config file, substituting the type's default when the file is
/// missing or does not parse. `what` names the config in the warning.
pub async fn load_json_or_default<T>(path: &Path, what: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read {what}; using empty default");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not parse {what}; using empty default");
            T::default()
        }
    }
}
