use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use prism_model::MediaId;

#[derive(Parser, Debug)]
#[command(name = "prismctl", version)]
#[command(about = "Ingest images and maintain their derived variants")]
pub struct Cli {
    /// Path to prism.toml (defaults to ./prism.toml or ./config/prism.toml)
    #[arg(long, global = true, env = "PRISM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Alternate .env file to load before reading the environment
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Print machine-readable JSON instead of a summary
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply database migrations and exit
    Migrate,
    /// Store an image and generate its variants
    Ingest {
        file: PathBuf,
        /// Declared MIME type; guessed from the extension when omitted
        #[arg(long)]
        mime: Option<String>,
    },
    /// Print one media record
    Show { id: MediaId },
    /// Delete a record and every blob it references
    Delete { id: MediaId },
    /// Measure originals whose dimensions were never recorded
    Repair,
    /// Regenerate variants for every record under the current sizing policy
    Reprocess,
}

/// Best-effort MIME type for a file name. Decoding falls back to content
/// sniffing, so an unknown extension is not fatal.
pub fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg" | "jpe") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}
