use async_trait::async_trait;
use std::sync::Arc;

use crate::common::{FaceGateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraAuthorization {
    Undetermined,
    Granted,
    Denied,
}

/// Platform camera-permission subsystem.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Current platform state, without prompting.
    async fn query(&self) -> CameraAuthorization;
    /// Prompt the user and wait for an answer.
    async fn request(&self) -> CameraAuthorization;
}

/// Owns the camera authorization for one screen.
///
/// The state only moves forward from `Undetermined`: once the user has
/// answered, the gate never prompts again and never reverts.
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    state: CameraAuthorization,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            state: CameraAuthorization::Undetermined,
        }
    }

    /// Last known authorization, without touching the platform.
    pub fn authorization(&self) -> CameraAuthorization {
        self.state
    }

    pub async fn current_authorization(&mut self) -> CameraAuthorization {
        if self.state == CameraAuthorization::Undetermined {
            self.state = self.provider.query().await;
        }
        self.state
    }

    pub async fn request_authorization(&mut self) -> CameraAuthorization {
        if self.current_authorization().await != CameraAuthorization::Undetermined {
            return self.state;
        }

        tracing::info!("Requesting camera permission");
        let answer = self.provider.request().await;
        if answer != CameraAuthorization::Undetermined {
            self.state = answer;
        }
        tracing::info!("Camera permission: {:?}", self.state);
        self.state
    }

    /// Read, request if needed, and fail unless granted.
    pub async fn ensure_granted(&mut self) -> Result<CameraAuthorization> {
        match self.request_authorization().await {
            CameraAuthorization::Granted => Ok(CameraAuthorization::Granted),
            other => Err(FaceGateError::Permission(other)),
        }
    }
}
