//! One verification flow per screen.
//!
//! [`VerificationFlow`] owns a permission gate, a capture session, a payload
//! builder, an upload coordinator and a result handler for a single intent.
//! Register and recognize screens differ only in the intent they pass in.

use std::sync::Arc;
use std::time::Duration;

use crate::camera::device::{CameraDevice, CameraRegistry};
use crate::camera::permission::{CameraAuthorization, PermissionGate, PermissionProvider};
use crate::camera::session::{CancelHandle, CaptureSession, CaptureSessionState};
use crate::common::{Config, FaceGateError, Result};
use crate::core::coordinator::UploadCoordinator;
use crate::core::identity::Identity;
use crate::core::outcome::SubmissionOutcome;
use crate::core::payload::{CuilPolicy, PayloadBuilder, SubmissionIntent};
use crate::core::result::{Navigator, Resolution, ScreenId, SessionResultHandler};
use crate::service::client::RecognitionTransport;

#[derive(Debug, Clone)]
pub struct FlowOptions {
    pub recognize_requires_cuil: bool,
    pub timeout: Duration,
    pub home_screen: ScreenId,
}

impl FlowOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recognize_requires_cuil: config.recognition.require_cuil,
            timeout: config.service.timeout(),
            home_screen: ScreenId::new(config.navigation.home_screen.trim()),
        }
    }
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// External collaborators a flow drives.
pub struct Collaborators {
    pub permissions: Arc<dyn PermissionProvider>,
    pub camera: Box<dyn CameraDevice>,
    pub transport: Arc<dyn RecognitionTransport>,
    pub navigator: Arc<dyn Navigator>,
    pub registry: CameraRegistry,
}

pub struct VerificationFlow {
    intent: SubmissionIntent,
    gate: PermissionGate,
    session: CaptureSession,
    builder: PayloadBuilder,
    coordinator: UploadCoordinator,
    handler: SessionResultHandler,
    navigator: Arc<dyn Navigator>,
}

impl VerificationFlow {
    pub fn new(intent: SubmissionIntent, options: FlowOptions, deps: Collaborators) -> Self {
        let policy = CuilPolicy::for_intent(intent, options.recognize_requires_cuil);

        Self {
            intent,
            gate: PermissionGate::new(deps.permissions),
            session: CaptureSession::new(deps.camera, deps.registry, policy),
            builder: PayloadBuilder::new(intent, policy),
            coordinator: UploadCoordinator::new(intent, deps.transport, options.timeout),
            handler: SessionResultHandler::new(intent, options.home_screen),
            navigator: deps.navigator,
        }
    }

    pub fn intent(&self) -> SubmissionIntent {
        self.intent
    }

    pub fn state(&self) -> CaptureSessionState {
        self.session.state()
    }

    pub fn authorization(&self) -> CameraAuthorization {
        self.gate.authorization()
    }

    pub fn is_submitting(&self) -> bool {
        self.coordinator.is_busy()
    }

    /// Handle for the host to cancel camera work or abandon an in-flight
    /// submission, e.g. when the user navigates away.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.session.cancel_handle()
    }

    pub async fn request_camera(&mut self) -> CameraAuthorization {
        self.gate.request_authorization().await
    }

    /// Check the identity, obtain camera permission and open the camera.
    ///
    /// A cancel that arrives while the permission prompt is open abandons
    /// the attempt with `Cancelled`.
    pub async fn open_camera(&mut self, identity: Identity) -> Result<()> {
        let epoch = self.session.begin();
        // No point prompting for the camera if the form is incomplete.
        self.builder.policy().check(&identity)?;

        let token = self.session.cancel_handle().current();
        let granted = tokio::select! {
            biased;
            _ = token.cancelled() => Err(FaceGateError::Cancelled),
            result = self.gate.ensure_granted() => result,
        };
        // The prompt itself may have been interrupted into a cancel.
        if token.is_cancelled() {
            return Err(FaceGateError::Cancelled);
        }
        let authorization = granted?;

        self.session.open_since(epoch, authorization, identity).await
    }

    pub async fn capture(&mut self) -> Result<()> {
        self.session.capture().await
    }

    pub fn retake(&mut self) -> Result<()> {
        self.session.retake()
    }

    /// Submit the captured photo and resolve the outcome.
    ///
    /// Returns `Ok(None)` when the session was cancelled before the upload
    /// started, or cancelled or closed while the request was in flight; a
    /// late outcome is dropped without touching the session or navigation.
    pub async fn submit(&mut self) -> Result<Option<Resolution>> {
        if self.session.cancel_handle().is_cancelled() {
            tracing::info!("Session cancelled before submission, dropping the photo");
            self.session.close();
            return Ok(None);
        }

        let epoch = self.session.epoch();
        let (identity, image) = self.session.commit()?;

        let payload = match self.builder.build(identity, image) {
            Ok(payload) => payload,
            Err(FaceGateError::Validation(reason)) => {
                return Ok(Some(self.finish(SubmissionOutcome::ValidationError { reason })));
            }
            Err(e) => return Err(e),
        };

        let outcome = match self.coordinator.submit(payload).await {
            Ok(outcome) => outcome,
            Err(FaceGateError::ConcurrentSubmission) => return Ok(Some(Resolution::silent())),
            Err(e) => return Err(e),
        };

        if self.session.epoch() != epoch {
            tracing::info!("Discarding {} outcome for a closed session", outcome.label());
            return Ok(None);
        }

        Ok(Some(self.finish(outcome)))
    }

    /// Open, capture and submit in one go. Every failure is resolved into
    /// feedback and the camera is released before this returns.
    ///
    /// Returns `None` when the flow was cancelled at any point.
    pub async fn run_once(&mut self, identity: Identity) -> Option<Resolution> {
        if let Err(e) = self.open_camera(identity).await {
            return self.fail_unless_cancelled(&e);
        }
        if let Err(e) = self.capture().await {
            let resolution = self.fail_unless_cancelled(&e);
            self.session.close();
            return resolution;
        }
        match self.submit().await {
            Ok(resolution) => resolution,
            Err(e) => self.fail_unless_cancelled(&e),
        }
    }

    /// Resolve an error into feedback, closing the session when the
    /// resolution asks for it.
    pub fn fail(&mut self, err: &FaceGateError) -> Resolution {
        let resolution = self.handler.resolve_error(err);
        if resolution.close_session {
            self.session.close();
        }
        resolution
    }

    fn fail_unless_cancelled(&mut self, err: &FaceGateError) -> Option<Resolution> {
        match err {
            FaceGateError::Cancelled => {
                self.session.close();
                None
            }
            other => Some(self.fail(other)),
        }
    }

    /// User dismissed the camera.
    pub fn cancel(&mut self) {
        self.session.close();
    }

    /// The screen is going away.
    pub fn leave(&mut self) {
        self.session.shutdown();
    }

    fn finish(&mut self, outcome: SubmissionOutcome) -> Resolution {
        let resolution = self.handler.resolve(&outcome);
        if resolution.close_session {
            self.session.close();
        }
        self.handler.apply(&resolution, self.navigator.as_ref());
        resolution
    }
}
