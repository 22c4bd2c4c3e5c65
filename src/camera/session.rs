use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::camera::device::{CameraDevice, CameraLease, CameraRegistry, CapturedImage};
use crate::camera::permission::CameraAuthorization;
use crate::common::{FaceGateError, Result};
use crate::core::identity::Identity;
use crate::core::payload::CuilPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSessionState {
    Idle,
    CameraActive,
    Capturing,
    Captured,
    /// Terminal: the owning screen is gone.
    Closed,
}

#[derive(Debug, Default)]
struct Signal {
    epoch: AtomicU64,
    token: Mutex<CancellationToken>,
}

/// Cancels a session from outside the task that drives it.
///
/// Every cancel or close bumps the session epoch; work started under an
/// older epoch is stale and its result must be discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    signal: Arc<Signal>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.signal.epoch.fetch_add(1, Ordering::SeqCst);
        self.token().cancel();
    }

    pub fn epoch(&self) -> u64 {
        self.signal.epoch.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token().is_cancelled()
    }

    fn token(&self) -> MutexGuard<'_, CancellationToken> {
        self.signal.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Token for the operation in progress. Cancelled once the host cancels
    /// or the session closes.
    pub(crate) fn current(&self) -> CancellationToken {
        self.token().clone()
    }

    /// Forget cancels from earlier operations and return the epoch the new
    /// operation runs under.
    fn rearm(&self) -> u64 {
        let mut token = self.token();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        self.epoch()
    }
}

/// Camera lifecycle for one screen: open, take one photo, hand it off.
pub struct CaptureSession {
    device: Box<dyn CameraDevice>,
    registry: CameraRegistry,
    policy: CuilPolicy,
    state: CaptureSessionState,
    identity: Option<Identity>,
    lease: Option<CameraLease>,
    image: Option<CapturedImage>,
    cancel: CancelHandle,
}

impl CaptureSession {
    pub fn new(device: Box<dyn CameraDevice>, registry: CameraRegistry, policy: CuilPolicy) -> Self {
        Self {
            device,
            registry,
            policy,
            state: CaptureSessionState::Idle,
            identity: None,
            lease: None,
            image: None,
            cancel: CancelHandle::default(),
        }
    }

    pub fn state(&self) -> CaptureSessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn has_camera(&self) -> bool {
        self.lease.is_some()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.cancel.epoch()
    }

    /// Start a new camera operation. Cancels issued before this point no
    /// longer apply; the returned epoch identifies the operation.
    pub fn begin(&mut self) -> u64 {
        self.cancel.rearm()
    }

    /// Validate, reserve the camera and start it.
    pub async fn open(&mut self, authorization: CameraAuthorization, identity: Identity) -> Result<()> {
        let epoch = self.begin();
        self.open_since(epoch, authorization, identity).await
    }

    /// Like [`open`](Self::open) for an operation begun earlier with
    /// [`begin`](Self::begin). Fails with `Cancelled` if the session was
    /// cancelled or closed since then.
    pub async fn open_since(
        &mut self,
        epoch: u64,
        authorization: CameraAuthorization,
        identity: Identity,
    ) -> Result<()> {
        self.expect(CaptureSessionState::Idle)?;

        let token = self.cancel.current();
        if token.is_cancelled() || self.cancel.epoch() != epoch {
            tracing::debug!("Open abandoned, session cancelled since epoch {}", epoch);
            return Err(FaceGateError::Cancelled);
        }

        if authorization != CameraAuthorization::Granted {
            return Err(FaceGateError::Permission(authorization));
        }
        self.policy.check(&identity)?;

        let lease = self.registry.try_acquire()?;

        let started = tokio::select! {
            biased;
            _ = token.cancelled() => Err(FaceGateError::Cancelled),
            result = self.device.start() => result,
        };
        if let Err(e) = started {
            self.device.stop();
            return Err(e);
        }

        tracing::debug!("Capture session opened");
        self.lease = Some(lease);
        self.identity = Some(identity);
        self.state = CaptureSessionState::CameraActive;
        Ok(())
    }

    /// Take exactly one photo. A device failure leaves the camera active so
    /// the user can try again.
    pub async fn capture(&mut self) -> Result<()> {
        self.expect(CaptureSessionState::CameraActive)?;
        self.state = CaptureSessionState::Capturing;

        let token = self.cancel.current();
        let taken = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.device.take_picture() => Some(result),
        };

        match taken {
            None => {
                tracing::debug!("Capture cancelled");
                self.close();
                Err(FaceGateError::Cancelled)
            }
            Some(Ok(image)) => {
                tracing::debug!("Captured {} byte photo", image.len());
                self.image = Some(image);
                self.state = CaptureSessionState::Captured;
                Ok(())
            }
            Some(Err(e)) => {
                tracing::warn!("Failed to capture photo: {}", e);
                self.state = CaptureSessionState::CameraActive;
                Err(match e {
                    FaceGateError::Capture(msg) => FaceGateError::Capture(msg),
                    other => FaceGateError::Capture(other.to_string()),
                })
            }
        }
    }

    /// Throw away the captured photo and go back to the live camera.
    pub fn retake(&mut self) -> Result<()> {
        self.expect(CaptureSessionState::Captured)?;
        self.image = None;
        self.state = CaptureSessionState::CameraActive;
        Ok(())
    }

    /// Hand off the photo. Releases the camera and returns to `Idle`; the
    /// epoch is kept so the submission that follows is not considered stale.
    pub fn commit(&mut self) -> Result<(Identity, CapturedImage)> {
        self.expect(CaptureSessionState::Captured)?;

        let (identity, image) = match (self.identity.take(), self.image.take()) {
            (Some(identity), Some(image)) => (identity, image),
            _ => {
                self.close();
                return Err(FaceGateError::Capture("Captured photo is missing".into()));
            }
        };

        self.release();
        self.state = CaptureSessionState::Idle;
        Ok((identity, image))
    }

    /// Valid from any state. Discards any uncommitted photo and releases the
    /// camera.
    pub fn close(&mut self) {
        self.release();
        self.image = None;
        self.identity = None;
        self.cancel.cancel();
        if self.state != CaptureSessionState::Closed {
            self.state = CaptureSessionState::Idle;
        }
    }

    /// Close for good; later `open` calls fail.
    pub fn shutdown(&mut self) {
        self.close();
        self.state = CaptureSessionState::Closed;
    }

    fn release(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.device.stop();
            drop(lease);
            tracing::debug!("Camera released");
        }
    }

    fn expect(&self, expected: CaptureSessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(FaceGateError::InvalidState { expected, found: self.state })
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}
