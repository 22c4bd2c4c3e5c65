use thiserror::Error;

use crate::camera::permission::CameraAuthorization;
use crate::camera::session::CaptureSessionState;

#[derive(Error, Debug)]
pub enum FaceGateError {
    #[error("Camera permission not granted (authorization: {0:?})")]
    Permission(CameraAuthorization),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Camera is already in use by another capture session")]
    CameraBusy,

    #[error("Capture cancelled")]
    Cancelled,

    #[error("Capture session is {found:?}, expected {expected:?}")]
    InvalidState {
        expected: CaptureSessionState,
        found: CaptureSessionState,
    },

    #[error("A submission is already in flight")]
    ConcurrentSubmission,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FaceGateError>;
