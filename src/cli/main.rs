use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use media_enrich::config::Config;
use media_enrich::geo::GeoResolver;
use media_enrich::pipeline::{self, MetadataMap, StoredFileDescriptor};

/// Extensions the debug CLI will pick up when walking directories.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff", "gif", "bmp"];

#[derive(Parser, Debug)]
#[command(
    name = "media-enrich",
    version,
    about = "Run the enrichment pipeline against image files and print the merged metadata"
)]
struct Cli {
    /// Image files or directories to enrich
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: read GAODE_API_KEY / GOOGLE_API_KEY /
    /// PUBLIC_DIR / NODE_ENV from the environment)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let images = collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    log::info!("Found {} image(s) to enrich", images.len());
    if config.geocoding.amap_key.is_empty() && config.geocoding.google_key.is_empty() {
        log::warn!("No geocoding credentials configured; GPS positions will not be resolved");
    }

    let resolver = GeoResolver::new(config.geocoding.clone());

    let mut reports = Vec::new();
    let total = images.len();

    for (i, path) in images.iter().enumerate() {
        log::info!("[{}/{}] Enriching: {}", i + 1, total, path.display());

        let descriptor = descriptor_for(path, i as i64 + 1);
        let outcome = pipeline::enrich(&descriptor, &resolver, &config).await;

        if outcome.is_skipped() {
            log::warn!("  Skipped (file could not be resolved)");
        } else {
            let staged: Vec<&str> = ["blurHash", "exif", "location", "metadata"]
                .into_iter()
                .filter(|key| outcome.metadata().contains_key(*key))
                .collect();
            log::info!(
                "  Extracted: {}",
                if staged.is_empty() {
                    "nothing".to_string()
                } else {
                    staged.join(", ")
                }
            );
        }

        reports.push(serde_json::json!({
            "path": path.display().to_string(),
            "skipped": outcome.is_skipped(),
            "metadata": serde_json::Value::Object(outcome.into_metadata()),
        }));
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    Ok(())
}

/// Build a synthetic descriptor for a local file, the way the storage
/// backend would describe it.
fn descriptor_for(path: &Path, id: i64) -> StoredFileDescriptor {
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    let hash = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    StoredFileDescriptor {
        id,
        name: path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string(),
        url: absolute.to_string_lossy().into_owned(),
        hash,
        mime: mime_for(&ext).to_string(),
        ext,
        provider: "local".to_string(),
        provider_metadata: MetadataMap::new(),
    }
}

fn mime_for(ext: &str) -> &'static str {
    match ext {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".webp" => "image/webp",
        ".tif" | ".tiff" => "image/tiff",
        ".gif" => "image/gif",
        ".bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Collect supported image files from the given paths. Directories are
/// walked recursively, following symlinks.
fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
