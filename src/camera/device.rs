use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::common::{FaceGateError, Result};

pub const JPEG_MIME: &str = "image/jpeg";

/// A single still photo, held in memory as JPEG.
///
/// Not `Clone`: the image moves from the session into the payload and is
/// dropped once the submission completes.
pub struct CapturedImage {
    data: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl CapturedImage {
    /// Wrap bytes that are already JPEG encoded.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self> {
        if !data.starts_with(&[0xFF, 0xD8]) {
            return Err(FaceGateError::Capture("Frame is not JPEG encoded".into()));
        }
        Ok(Self { data, captured_at: Utc::now() })
    }

    pub fn encode(image: &DynamicImage, quality: u8) -> Result<Self> {
        let mut data = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut data, quality);
            match image {
                DynamicImage::ImageLuma8(gray) => {
                    encoder.encode(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)?
                }
                other => {
                    let rgb = other.to_rgb8();
                    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?
                }
            }
        }
        Ok(Self { data, captured_at: Utc::now() })
    }

    pub fn mime_type(&self) -> &'static str {
        JPEG_MIME
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("bytes", &self.data.len())
            .field("mime", &JPEG_MIME)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// A camera that can produce one still photo at a time.
///
/// `start` acquires the hardware, `stop` releases it and must be safe to call
/// more than once.
#[async_trait]
pub trait CameraDevice: Send {
    async fn start(&mut self) -> Result<()>;
    async fn take_picture(&mut self) -> Result<CapturedImage>;
    fn stop(&mut self);
}

/// Tracks exclusive use of the physical camera.
#[derive(Debug, Clone, Default)]
pub struct CameraRegistry {
    in_use: Arc<AtomicBool>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<CameraRegistry> = OnceLock::new();
        GLOBAL.get_or_init(CameraRegistry::new).clone()
    }

    pub fn try_acquire(&self) -> Result<CameraLease> {
        self.in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FaceGateError::CameraBusy)?;
        Ok(CameraLease { in_use: Arc::clone(&self.in_use) })
    }

    pub fn in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }
}

/// Held while a session has the camera; released on drop.
#[derive(Debug)]
pub struct CameraLease {
    in_use: Arc<AtomicBool>,
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};

    #[test]
    fn lease_is_exclusive_until_dropped() {
        let registry = CameraRegistry::new();
        let lease = registry.try_acquire().unwrap();
        assert!(registry.in_use());
        assert!(matches!(registry.try_acquire(), Err(FaceGateError::CameraBusy)));

        drop(lease);
        assert!(!registry.in_use());
        assert!(registry.try_acquire().is_ok());
    }

    #[test]
    fn global_registry_is_shared() {
        let a = CameraRegistry::global();
        let b = CameraRegistry::global();
        assert!(Arc::ptr_eq(&a.in_use, &b.in_use));
    }

    #[test]
    fn rejects_non_jpeg_bytes() {
        assert!(CapturedImage::from_jpeg(b"\x89PNG".to_vec()).is_err());
    }

    #[test]
    fn encodes_grayscale_and_color_frames_as_jpeg() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(16, 8));
        let color = DynamicImage::ImageRgb8(RgbImage::new(16, 8));

        for frame in [gray, color] {
            let image = CapturedImage::encode(&frame, 70).unwrap();
            assert!(image.bytes().starts_with(&[0xFF, 0xD8]));
            assert_eq!(image.mime_type(), "image/jpeg");
        }
    }
}
