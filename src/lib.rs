// Core modules
pub mod camera;
pub mod cli;
pub mod common;
pub mod core;
pub mod service;

// Re-export commonly used types
pub use camera::{
    CameraAuthorization, CameraDevice, CameraRegistry, CancelHandle, CaptureSession,
    CaptureSessionState, CapturedImage, FileCamera, PermissionGate, PermissionProvider, V4l2Camera,
};
pub use common::{Config, FaceGateError, Result};
pub use self::core::{
    classify, AppTransition, Collaborators, Feedback, FlowOptions, Identity, NavigationAction,
    Navigator, NextStep, PayloadBuilder, Resolution, ScreenId, SessionResultHandler,
    SubmissionIntent, SubmissionOutcome, SubmissionPayload, UploadCoordinator, VerificationFlow,
};
pub use service::{HttpTransport, RecognitionTransport, TransportError, TransportResponse};

// Shorter paths for the most used modules
pub mod config {
    pub use crate::common::config::*;
}
pub mod error {
    pub use crate::common::error::*;
}
