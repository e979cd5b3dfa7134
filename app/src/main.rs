use anyhow::{bail, Context, Result};
use capture_metadata::ExifMetadataSource;
use clap::Parser;
use folder_view::{
    BrowserEvent, EntryIcon, FolderBrowser, ListEntry, MetadataView, SortColumn, SortDirection,
    SortOrder,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thumbnail_cache::{ThumbnailCache, ThumbnailStore};

mod config;

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Browse a folder of photos with a persistent thumbnail cache")]
struct Cli {
    /// Folder to open (defaults to the current directory)
    folder: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Thumbnail cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Thumbnail bounding box edge in pixels
    #[arg(long)]
    size: Option<u32>,

    /// JPEG quality for generated thumbnails (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Sort column: name, modified or size
    #[arg(long)]
    sort: Option<SortColumn>,

    /// Sort in descending order
    #[arg(long)]
    descending: bool,

    /// Show capture metadata for the entry with this name
    #[arg(long)]
    select: Option<String>,

    /// Give up waiting for background work after this many seconds
    #[arg(long, default_value = "120")]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = resolve_config(&cli)?;
    let folder = match &cli.folder {
        Some(folder) => folder.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let timeout = Duration::from_secs(cli.timeout_secs);

    let cache_root = config.cache_root();
    let store = ThumbnailStore::open(&cache_root)
        .with_context(|| format!("Failed to open thumbnail cache at {}", cache_root.display()))?;
    let cache = Arc::new(ThumbnailCache::new(store, config.thumbnail_params()));
    let mut browser = FolderBrowser::new(Arc::clone(&cache), Arc::new(ExifMetadataSource::new()))
        .with_sort_order(config.sort);

    println!("📂 Opening {}", folder.display());
    browser.open_folder(&folder);

    for event in browser.run_until_idle(timeout) {
        match event {
            BrowserEvent::FolderFailed { folder, error } => {
                bail!("Could not list {}: {}", folder.display(), error)
            }
            BrowserEvent::FolderLoaded {
                total,
                cached,
                pending,
                ..
            } => {
                println!(
                    "📸 {} entries ({} thumbnails cached, {} to generate)",
                    total, cached, pending
                );
            }
            _ => {}
        }
    }

    if !browser.is_idle() {
        println!("⚠️  Background work still running after {}s", cli.timeout_secs);
        if let Some(progress) = browser.prefetch_progress() {
            println!(
                "   {} of {} thumbnails done ({:.0}%)",
                progress.completed + progress.failed,
                progress.total,
                progress.completion_percentage()
            );
        }
    }

    print_entries(browser.entries());

    if let Some(name) = &cli.select {
        if browser.select_by_name(name) {
            browser.run_until_idle(timeout);
            print_metadata(name, browser.metadata_view());
        } else {
            println!("⚠️  No entry named {}", name);
        }
    }

    let stats = cache.stats();
    println!(
        "\n🗂  Cache: {} hits, {} generated, {} failed ({:.0}% hit rate) in {}",
        stats.hits,
        stats.generated,
        stats.failures,
        stats.hit_rate(),
        cache.store().root().display()
    );

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Config file first, then command line flags on top.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;

    if let Some(cache_dir) = &cli.cache_dir {
        config.cache_dir = Some(cache_dir.clone());
    }
    if let Some(size) = cli.size {
        config.thumbnail_size = size;
    }
    if let Some(quality) = cli.quality {
        config.thumbnail_quality = quality;
    }
    if cli.sort.is_some() || cli.descending {
        let direction = if cli.descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        config.sort = SortOrder::new(cli.sort.unwrap_or(config.sort.column), direction);
    }

    Ok(config)
}

fn print_entries(entries: &[ListEntry]) {
    println!("\n{:<4} {:<40} {:>12} {:>10}", "", "NAME", "RESOLUTION", "SIZE");
    for entry in entries {
        let marker = match entry.visual().icon {
            EntryIcon::Folder => "📁",
            EntryIcon::Thumbnail => "🖼 ",
            EntryIcon::Placeholder => "⏳",
            EntryIcon::File => "📄",
        };
        let size = if entry.is_folder() {
            String::new()
        } else {
            format_size(entry.item().size_bytes)
        };
        println!(
            "{:<4} {:<40} {:>12} {:>10}",
            marker,
            entry.display_name(),
            entry.visual().resolution_label.clone().unwrap_or_default(),
            size
        );
    }
}

fn print_metadata(name: &str, view: &MetadataView) {
    println!("\n📋 {}", name);
    match view {
        MetadataView::Loaded { metadata, .. } => {
            if let Some(captured_at) = metadata.captured_at {
                println!("  Captured: {}", captured_at.format("%Y-%m-%d %H:%M:%S"));
            }
            if let Some(camera) = metadata.camera_label() {
                println!("  Camera:   {}", camera);
            }
            if let Some(position) = metadata.format_coordinates() {
                println!("  Location: {}", position);
            }
        }
        MetadataView::NotAvailable { .. } => println!("  No capture metadata available"),
        MetadataView::Loading { .. } => println!("  Metadata still loading"),
        MetadataView::Empty => println!("  Folders have no capture metadata"),
    }
}

fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_flags_override_config_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "thumbnail_size": 512, "thumbnail_quality": 60 }"#)?;

        let cli = Cli::try_parse_from([
            "folio",
            "/photos",
            "--config",
            config_path.to_str().expect("utf-8 temp path"),
            "--quality",
            "95",
            "--sort",
            "size",
            "--descending",
        ])?;
        assert_eq!(cli.folder, Some(PathBuf::from("/photos")));

        let config = resolve_config(&cli)?;
        assert_eq!(config.thumbnail_size, 512);
        assert_eq!(config.thumbnail_quality, 95);
        assert_eq!(config.sort, SortOrder::new(SortColumn::Size, SortDirection::Descending));
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_sort_column() {
        assert!(Cli::try_parse_from(["folio", "--sort", "colour"]).is_err());
    }
}
