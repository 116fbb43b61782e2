//! Writes finished batches into an output directory.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::ProcessedImage;
use crate::export::Finalizer;
use crate::utils::{OptimizerError, OptimizerResult, available_path, ensure_dir, unique_name};

/// Exports a single image as-is and larger batches as one zip archive.
#[derive(Debug, Clone)]
pub struct ArchiveFinalizer {
    output_dir: PathBuf,
}

impl ArchiveFinalizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl Finalizer for ArchiveFinalizer {
    async fn finalize(&self, images: &[ProcessedImage]) -> OptimizerResult<()> {
        let (name, data) = match images {
            [] => return Ok(()),
            [single] => (single.name.clone(), single.data.to_vec()),
            many => {
                let owned = many.to_vec();
                let data = tokio::task::spawn_blocking(move || build_archive(&owned))
                    .await
                    .map_err(|e| OptimizerError::aggregation(format!("Archive task failed: {e}")))??;
                (archive_name(Local::now()), data)
            }
        };

        ensure_dir(&self.output_dir).await?;
        let path = available_path(&self.output_dir, &name);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| OptimizerError::aggregation(format!(
                "Cannot write {}: {}", path.display(), e
            )))?;

        info!("Exported {} image(s) to {}", images.len(), path.display());
        Ok(())
    }
}

/// `resized-images-18.10.26_14.30.zip` style archive name.
pub fn archive_name(now: DateTime<Local>) -> String {
    format!("resized-images-{}.zip", now.format("%d.%m.%y_%H.%M"))
}

/// Packs `images` into an in-memory zip archive.
///
/// Entries are stored uncompressed since the payloads are already encoded
/// images; clashing names get a ` (n)` suffix.
pub fn build_archive(images: &[ProcessedImage]) -> OptimizerResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut taken = HashSet::new();

    for image in images {
        let name = unique_name(&image.name, &mut taken);
        debug!("Adding {} to archive", name);

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer
            .start_file(name.clone(), options)
            .map_err(|e| OptimizerError::aggregation(format!("Failed to add {name} to zip: {e}")))?;
        writer
            .write_all(&image.data)
            .map_err(|e| OptimizerError::aggregation(format!("Failed to add {name} to zip: {e}")))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| OptimizerError::aggregation(format!("Failed to close zip file: {e}")))?;
    Ok(cursor.into_inner())
}
