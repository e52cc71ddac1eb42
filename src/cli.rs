//! Command-line interface definitions.
//!
//! All paths derive from a single site root; individual directories can be
//! overridden for testing or unusual layouts. Flags can also be provided via
//! environment variables where noted.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the feed ingestion pipeline.
///
/// # Examples
///
/// ```sh
/// # Default layout under the site root
/// lokalnytt --site-root /srv/lokalnytt/site
///
/// # Store file somewhere else
/// lokalnytt -s ./site --store-file /tmp/articles.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Site root directory containing assets/ and config/
    #[arg(short, long, env = "LOKALNYTT_SITE")]
    pub site_root: PathBuf,

    /// Article store file (default: <site-root>/assets/data/articles.json)
    #[arg(long)]
    pub store_file: Option<PathBuf>,

    /// Image rendition directory (default: <site-root>/assets/images)
    #[arg(long)]
    pub image_dir: Option<PathBuf>,

    /// Proof artifact directory (default: <site-root>/assets/proof)
    #[arg(long)]
    pub proof_dir: Option<PathBuf>,

    /// Configuration directory (default: <site-root>/config)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}
