use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::camera::device::{CameraDevice, CapturedImage};
use crate::common::{FaceGateError, Result};

/// Serves a photo from disk instead of a live camera. Non-JPEG files are
/// re-encoded.
pub struct FileCamera {
    path: PathBuf,
    jpeg_quality: u8,
    started: bool,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self { path: path.into(), jpeg_quality, started: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path, jpeg_quality: u8) -> Result<CapturedImage> {
        let data = std::fs::read(path)
            .map_err(|e| FaceGateError::Capture(format!("Failed to read {}: {}", path.display(), e)))?;

        if data.starts_with(&[0xFF, 0xD8]) {
            return CapturedImage::from_jpeg(data);
        }

        let decoded = image::load_from_memory(&data)?;
        CapturedImage::encode(&decoded, jpeg_quality)
    }
}

#[async_trait]
impl CameraDevice for FileCamera {
    async fn start(&mut self) -> Result<()> {
        if !self.path.is_file() {
            return Err(FaceGateError::Capture(format!("No image at {}", self.path.display())));
        }
        self.started = true;
        Ok(())
    }

    async fn take_picture(&mut self) -> Result<CapturedImage> {
        if !self.started {
            return Err(FaceGateError::Capture("Camera is not started".into()));
        }
        let path = self.path.clone();
        let quality = self.jpeg_quality;
        tokio::task::spawn_blocking(move || Self::load(&path, quality))
            .await
            .map_err(|e| FaceGateError::Capture(format!("Image load task failed: {}", e)))?
    }

    fn stop(&mut self) {
        self.started = false;
    }
}
