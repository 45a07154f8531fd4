use crate::error::{StoryError, StoryResult};
use crate::generator::{GenerationResult, NamedImage};
use crate::{logok, logw};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const DEFAULT_NAME_LEN: usize = 8;
pub const THUMBNAIL_EDGE: u32 = 256;

/// Opaque alphanumeric name; carries no meaning and is not derived from the topic.
pub fn random_filename(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Deflated ZIP holding every scene image under its own name.
pub fn images_zip(images: &[NamedImage]) -> StoryResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for img in images {
        zip.start_file(img.name.as_str(), options)
            .map_err(|e| StoryError::Delivery(format!("zip entry {}: {e}", img.name)))?;
        zip.write_all(&img.bytes)
            .map_err(|e| StoryError::io(format!("zip write {}", img.name), e))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| StoryError::Delivery(format!("zip finish: {e}")))?;
    Ok(cursor.into_inner())
}

/// PNG preview no larger than `max_edge` on either side.
pub fn thumbnail(bytes: &[u8], max_edge: u32) -> StoryResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| StoryError::Delivery(format!("decode image: {e}")))?;
    let thumb = img.thumbnail(max_edge, max_edge);

    let mut out = Cursor::new(Vec::new());
    thumb
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .map_err(|e| StoryError::Delivery(format!("encode thumbnail: {e}")))?;
    Ok(out.into_inner())
}

/// Holds the most recent run so a redraw does not lose it.
#[derive(Debug, Default)]
pub struct ResultSlot {
    last: Option<GenerationResult>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was held before.
    pub fn store(&mut self, result: GenerationResult) -> &GenerationResult {
        self.last.insert(result)
    }

    pub fn current(&self) -> Option<&GenerationResult> {
        self.last.as_ref()
    }

    pub fn clear(&mut self) -> Option<GenerationResult> {
        self.last.take()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub base_name: String,
    pub video: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub thumbnails: Vec<PathBuf>,
}

async fn write_file(path: &Path, bytes: &[u8]) -> StoryResult<()> {
    fs::write(path, bytes)
        .await
        .map_err(|e| StoryError::io(format!("Failed to write {}", path.display()), e))
}

/// Writes the video, the image archive and per-scene thumbnails into `dir`
/// under one random base name. Partial results export whatever they carry.
pub async fn export(result: &GenerationResult, dir: &Path) -> StoryResult<ExportedFiles> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| StoryError::io(format!("Failed to create dir {}", dir.display()), e))?;

    let mut files = ExportedFiles {
        base_name: random_filename(DEFAULT_NAME_LEN),
        ..ExportedFiles::default()
    };

    if let Some(video) = &result.video_bytes {
        let path = dir.join(format!("{}.mp4", files.base_name));
        write_file(&path, video).await?;
        logok(format!("Wrote video: {}", path.display()));
        files.video = Some(path);
    }

    if !result.images.is_empty() {
        let archive = images_zip(&result.images)?;
        let path = dir.join(format!("{}_images.zip", files.base_name));
        write_file(&path, &archive).await?;
        logok(format!("Wrote image archive: {}", path.display()));
        files.archive = Some(path);
    }

    for img in &result.images {
        match thumbnail(&img.bytes, THUMBNAIL_EDGE) {
            Ok(png) => {
                let path = dir.join(format!(
                    "{}_scene_{}_thumb.png",
                    files.base_name, img.scene_index
                ));
                write_file(&path, &png).await?;
                files.thumbnails.push(path);
            }
            Err(err) => logw(format!("No preview for {}: {}", img.name, err)),
        }
    }

    Ok(files)
}
