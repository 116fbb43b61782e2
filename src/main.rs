// Command line entry point. Optimizes the given images as a single batch and
// writes the result (one file, or a zip archive) into the output directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use batch_image_optimizer::{
    ArchiveFinalizer, BatchProcessor, Configuration, ErrorRecord, ImageCodec, ImageStore,
    JsonFileStore, PoolSettings, RawImage, SettingsHandle,
};

#[derive(Parser)]
#[command(name = "batch-image-optimizer")]
#[command(about = "Resize and re-encode a batch of images")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// JSON file holding the resize, compression and export sections
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Directory the optimized image or archive is written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    out: PathBuf,

    /// Upper bound on worker threads
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Fail the batch when one image takes longer than this
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Images to optimize
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,
}

impl Cli {
    fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_workers: self.workers,
            item_timeout_ms: self.timeout_ms,
            ..PoolSettings::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(false)
        .with_target(false)
        .compact()
        .init();

    info!("=== Batch Image Optimizer ===");

    let settings = match &args.settings {
        Some(path) => {
            let store = JsonFileStore::open(path)
                .with_context(|| format!("cannot open settings file {}", path.display()))?;
            SettingsHandle::load(Arc::new(store))
        }
        None => SettingsHandle::new(Configuration::default())?,
    };
    debug!("Using settings: {:?}", settings.snapshot());

    let store = Arc::new(ImageStore::new());
    let processor = BatchProcessor::new(
        Arc::clone(&store),
        Arc::new(ImageCodec),
        Arc::new(ArchiveFinalizer::new(&args.out)),
        Arc::new(settings),
        args.pool_settings(),
    );

    let mut updates = store.subscribe();
    let progress = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            if snapshot.in_flight && snapshot.processed > 0 {
                info!(
                    "Progress: {}/{} ({}%)",
                    snapshot.processed,
                    snapshot.total,
                    snapshot.progress_percentage()
                );
            }
        }
    });

    processor.add_items(args.files.iter().map(RawImage::from_path).collect())?;
    let outcome = processor.run_batch().await;
    progress.abort();

    match outcome {
        Ok(summary) => {
            info!(
                "Done: {} images, {} -> {} bytes",
                summary.processed, summary.original_bytes, summary.processed_bytes
            );
            processor.acknowledge_success()?;
            Ok(())
        }
        Err(e) => {
            let record = ErrorRecord::from(&e);
            error!("{}", record.message);
            if let Some(cause) = &record.cause {
                debug!("Cause: {}", cause);
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_required() {
        assert!(Cli::try_parse_from(["batch-image-optimizer"]).is_err());
        assert!(Cli::try_parse_from(["batch-image-optimizer", "--out", "dist"]).is_err());
    }

    #[test]
    fn options_map_onto_pool_settings() {
        let cli = Cli::try_parse_from([
            "batch-image-optimizer",
            "--workers", "3",
            "--timeout-ms", "1500",
            "a.png",
            "b.jpg",
        ])
        .unwrap();

        assert_eq!(cli.out, PathBuf::from("."));
        assert_eq!(cli.files, [PathBuf::from("a.png"), PathBuf::from("b.jpg")]);

        let pool = cli.pool_settings();
        assert_eq!(pool.max_workers, Some(3));
        assert_eq!(pool.item_timeout_ms, Some(1500));
        assert_eq!(pool.reserved_cores, 0);
    }
}
