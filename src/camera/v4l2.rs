use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use std::fs;
use std::sync::{Arc, Mutex};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::camera::device::{CameraDevice, CapturedImage};
use crate::common::config::CameraConfig;
use crate::common::{FaceGateError, Result};

/// Special `device_index` value that triggers auto-detection.
pub const AUTO_DETECT_INDEX: u32 = 999;

#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
    pub features: Vec<String>,
    pub supports_color: bool,
    pub supports_capture: bool,
}

/// V4L2 webcam. The device node is opened on `start` and closed on `stop`.
pub struct V4l2Camera {
    config: CameraConfig,
    device: Option<Arc<Mutex<Device>>>,
}

impl V4l2Camera {
    pub fn new(config: &CameraConfig) -> Self {
        Self { config: config.clone(), device: None }
    }

    /// Device node path, when the index is fixed.
    pub fn device_path(config: &CameraConfig) -> Option<String> {
        (config.device_index != AUTO_DETECT_INDEX).then(|| format!("/dev/video{}", config.device_index))
    }

    /// List all available cameras with their capabilities
    pub fn list_all_cameras() -> Result<Vec<CameraInfo>> {
        let mut cameras = Vec::new();

        // Scan /dev/video* devices
        for entry in fs::read_dir("/dev")? {
            let path = entry?.path();
            let Some(index) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("video"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };

            let Ok(device) = Device::new(index as usize) else { continue };
            let Ok(caps) = device.query_caps() else { continue };

            let supports_capture = caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE);
            let mut features = Vec::new();
            if supports_capture {
                features.push("VIDEO_CAPTURE".to_string());
            }

            let mut supports_color = false;
            for fmt in device.enum_formats().unwrap_or_default() {
                match fmt.fourcc.str().unwrap_or("UNKNOWN") {
                    f @ ("MJPG" | "YUYV") => {
                        features.push(format!("Color ({})", f));
                        supports_color = true;
                    }
                    f @ "GREY" => features.push(format!("Grayscale ({})", f)),
                    _ => {}
                }
            }

            cameras.push(CameraInfo {
                index,
                name: caps.card.clone(),
                features,
                supports_color,
                supports_capture,
            });
        }

        cameras.sort_by_key(|c| c.index);
        Ok(cameras)
    }

    /// Pick a camera for face photos: a color capture device first, then any
    /// capture device, then `/dev/video0`.
    pub fn detect_camera() -> Result<u32> {
        let cameras = Self::list_all_cameras()?;

        let selected = cameras
            .iter()
            .find(|c| c.supports_capture && c.supports_color)
            .or_else(|| cameras.iter().find(|c| c.supports_capture));

        match selected {
            Some(camera) => {
                tracing::info!("Selected camera: /dev/video{} ({})", camera.index, camera.name);
                Ok(camera.index)
            }
            None => {
                tracing::warn!("No capture device detected, falling back to /dev/video0");
                Ok(0)
            }
        }
    }

    fn open_device(config: &CameraConfig) -> Result<Device> {
        let index = if config.device_index == AUTO_DETECT_INDEX {
            Self::detect_camera()?
        } else {
            config.device_index
        };

        tracing::info!("Opening camera device {}...", index);
        let device = Device::new(index as usize)
            .map_err(|e| FaceGateError::Capture(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device.query_caps()
            .map_err(|e| FaceGateError::Capture(format!("Failed to query capabilities: {}", e)))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            tracing::warn!("Device {} may not support standard video capture", index);
        }

        let mut fmt = device.format()
            .map_err(|e| FaceGateError::Capture(format!("Failed to get format: {}", e)))?;

        fmt.width = config.width;
        fmt.height = config.height;
        // Keep GREY for IR sensors, otherwise ask for MJPG so frames are already JPEG
        if fmt.fourcc.str().unwrap_or("") != "GREY" {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let actual = device.format()
            .map_err(|e| FaceGateError::Capture(format!("Failed to get final format: {}", e)))?;
        tracing::debug!(
            "Camera format: {}x{} {}",
            actual.width,
            actual.height,
            actual.fourcc.str().unwrap_or("????")
        );

        Ok(device)
    }

    fn grab_frame(device: &mut Device, config: &CameraConfig) -> Result<CapturedImage> {
        let fmt = device.format()
            .map_err(|e| FaceGateError::Capture(format!("Failed to get format: {}", e)))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(&mut *device, Type::VideoCapture, 4)
            .map_err(|e| FaceGateError::Capture(format!("Failed to create stream: {}", e)))?;

        // Let exposure settle before the real shot
        for i in 0..config.warmup_frames {
            stream.next()
                .map_err(|e| FaceGateError::Capture(format!("Failed to capture warmup frame {}: {}", i, e)))?;
            std::thread::sleep(std::time::Duration::from_millis(config.warmup_delay_ms));
        }

        let (buf, meta) = stream.next()
            .map_err(|e| FaceGateError::Capture(format!("Failed to capture: {}", e)))?;
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        let frame = &buf[..used];

        match fmt.fourcc.str().unwrap_or("") {
            "MJPG" => CapturedImage::from_jpeg(frame.to_vec()),
            "GREY" => {
                let gray = ImageBuffer::<Luma<u8>, _>::from_raw(fmt.width, fmt.height, frame.to_vec())
                    .ok_or_else(|| FaceGateError::Capture("Failed to create grayscale image buffer".into()))?;
                CapturedImage::encode(&DynamicImage::ImageLuma8(gray), config.jpeg_quality)
            }
            "YUYV" => {
                let rgb = yuyv_to_rgb(frame, fmt.width, fmt.height)?;
                CapturedImage::encode(&DynamicImage::ImageRgb8(rgb), config.jpeg_quality)
            }
            other => Err(FaceGateError::Capture(format!("Unsupported pixel format {}", other))),
        }
    }
}

#[async_trait]
impl CameraDevice for V4l2Camera {
    async fn start(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }
        let config = self.config.clone();
        let device = tokio::task::spawn_blocking(move || Self::open_device(&config))
            .await
            .map_err(|e| FaceGateError::Capture(format!("Camera task failed: {}", e)))??;
        self.device = Some(Arc::new(Mutex::new(device)));
        Ok(())
    }

    async fn take_picture(&mut self) -> Result<CapturedImage> {
        let device = self.device.clone()
            .ok_or_else(|| FaceGateError::Capture("Camera is not started".into()))?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let mut device = device.lock()
                .map_err(|_| FaceGateError::Capture("Camera handle poisoned".into()))?;
            Self::grab_frame(&mut device, &config)
        })
        .await
        .map_err(|e| FaceGateError::Capture(format!("Camera task failed: {}", e)))?
    }

    fn stop(&mut self) {
        if self.device.take().is_some() {
            tracing::debug!("Camera device closed");
        }
    }
}

/// Packed YUYV 4:2:2 to RGB (BT.601).
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<ImageBuffer<Rgb<u8>, Vec<u8>>> {
    let expected = (width as usize) * (height as usize) * 2;
    if data.len() < expected {
        return Err(FaceGateError::Capture(format!(
            "YUYV frame too short: {} bytes, expected {}", data.len(), expected
        )));
    }

    let mut rgb = Vec::with_capacity((width as usize) * (height as usize) * 3);
    for chunk in data[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0] as f32, chunk[1] as f32 - 128.0, chunk[2] as f32, chunk[3] as f32 - 128.0);
        for y in [y0, y1] {
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }

    ImageBuffer::from_raw(width, height, rgb)
        .ok_or_else(|| FaceGateError::Capture("Failed to create RGB image buffer".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_gray_converts_to_gray_rgb() {
        // Two pixels of mid gray with neutral chroma.
        let frame = [128u8, 128, 128, 128];
        let rgb = yuyv_to_rgb(&frame, 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([128, 128, 128]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([128, 128, 128]));
    }

    #[test]
    fn yuyv_rejects_short_frame() {
        assert!(yuyv_to_rgb(&[0u8; 6], 2, 2).is_err());
    }

    #[test]
    fn device_path_is_none_for_auto_detect() {
        let mut config = CameraConfig::default();
        assert_eq!(V4l2Camera::device_path(&config).as_deref(), Some("/dev/video0"));
        config.device_index = AUTO_DETECT_INDEX;
        assert_eq!(V4l2Camera::device_path(&config), None);
    }
}
