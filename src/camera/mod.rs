pub mod device;
pub mod file;
pub mod permission;
pub mod session;
pub mod v4l2;

pub use device::{CameraDevice, CameraLease, CameraRegistry, CapturedImage};
pub use file::FileCamera;
pub use permission::{CameraAuthorization, PermissionGate, PermissionProvider};
pub use session::{CancelHandle, CaptureSession, CaptureSessionState};
pub use v4l2::{CameraInfo, V4l2Camera};
