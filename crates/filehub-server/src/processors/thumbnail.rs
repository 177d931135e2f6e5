//! File queue consumer: derives fixed-width thumbnails for uploaded images.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::jobs::{FileJob, JobError, JobProcessor, QueueName};
use crate::storage::Store;

/// Target widths, largest first.
pub const THUMBNAIL_WIDTHS: [u32; 3] = [500, 250, 100];

/// Tallest thumbnail that will be written.
pub const MAX_THUMBNAIL_HEIGHT: u32 = 4096;

/// Thumbnail derivation errors. Never fatal to the job.
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Thumbnail task failed: {0}")]
    Task(String),

    #[error("Thumbnail at width {width} would be {height}px tall")]
    TooTall { width: u32, height: u64 },
}

/// Where the thumbnail of `local_path` at `width` lives: `<local_path>_<width>`.
pub fn thumbnail_path(local_path: &str, width: u32) -> PathBuf {
    PathBuf::from(format!("{local_path}_{width}"))
}

/// Decode `local_path`, resize it to `width` keeping the aspect ratio, and
/// write it next to the source. The source's format is kept when it can be
/// encoded, otherwise PNG is written.
pub async fn generate_thumbnail(local_path: &str, width: u32) -> Result<PathBuf, ThumbnailError> {
    let source = PathBuf::from(local_path);
    let target = thumbnail_path(local_path, width);

    tokio::task::spawn_blocking(move || {
        resize_to(&source, &target, width)?;
        Ok(target)
    })
    .await
    .map_err(|e| ThumbnailError::Task(e.to_string()))?
}

fn resize_to(source: &Path, target: &Path, width: u32) -> Result<(), ThumbnailError> {
    let reader = ImageReader::open(source)?.with_guessed_format()?;
    let format = reader
        .format()
        .filter(ImageFormat::writing_enabled)
        .unwrap_or(ImageFormat::Png);
    let image = reader.decode()?;

    let height = scaled_height(image.width(), image.height(), width);
    if height > u64::from(MAX_THUMBNAIL_HEIGHT) {
        return Err(ThumbnailError::TooTall { width, height });
    }

    let resized = image.resize(width, MAX_THUMBNAIL_HEIGHT, FilterType::Triangle);
    resized.save_with_format(target, format)?;
    Ok(())
}

/// Height of a `src_width` x `src_height` image scaled to `width`.
fn scaled_height(src_width: u32, src_height: u32, width: u32) -> u64 {
    (u64::from(src_height) * u64::from(width)).div_ceil(u64::from(src_width.max(1)))
}

/// Drains `fileQueue`.
#[derive(Clone)]
pub struct ThumbnailProcessor {
    store: Store,
}

impl ThumbnailProcessor {
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(file_id = %job.file_id))]
    async fn thumbnails(&self, job: FileJob) -> Result<(), JobError> {
        let file = self
            .store
            .files()?
            .find_owned(&job.file_id, &job.user_id)
            .await?
            .ok_or_else(|| JobError::NotFound("File not found".into()))?;

        let local_path = file
            .local_path
            .ok_or_else(|| JobError::Failed(format!("File {} has no local path", file.id)))?;

        let mut written = 0usize;
        for width in THUMBNAIL_WIDTHS {
            match generate_thumbnail(&local_path, width).await {
                Ok(path) => {
                    debug!(width, path = %path.display(), "Thumbnail written");
                    written += 1;
                }
                Err(e) => warn!(width, error = %e, "Thumbnail generation failed"),
            }
        }

        info!(written, total = THUMBNAIL_WIDTHS.len(), "Thumbnails generated");
        Ok(())
    }
}

impl JobProcessor for ThumbnailProcessor {
    fn queue(&self) -> QueueName {
        QueueName::File
    }

    async fn process(&self, payload: &Value) -> Result<(), JobError> {
        let job = FileJob::from_payload(payload)?;
        self.thumbnails(job).await
    }
}
