use std::fmt;

use crate::camera::permission::CameraAuthorization;
use crate::common::FaceGateError;
use crate::core::outcome::SubmissionOutcome;
use crate::core::payload::SubmissionIntent;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScreenId(String);

impl ScreenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Navigation service owned by the host application.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, screen: &ScreenId);
    fn replace(&self, screen: &ScreenId);
}

/// What the presentation layer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Success { message: String },
    /// Attached to a form field.
    FieldError { field: &'static str, message: String },
    /// A specific business refusal (unknown face, already enrolled).
    Denied { message: String },
    /// Generic failure; the user may retry.
    Failure { message: String },
    /// The camera cannot be used until the user grants access.
    PermissionRequired { message: String },
}

impl Feedback {
    pub fn message(&self) -> &str {
        match self {
            Feedback::Success { message }
            | Feedback::FieldError { message, .. }
            | Feedback::Denied { message }
            | Feedback::Failure { message }
            | Feedback::PermissionRequired { message } => message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTransition {
    Registered,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationAction {
    NavigateTo(ScreenId),
    Replace(ScreenId),
}

/// Where the screen ends up after a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Left the screen.
    Leave,
    /// Back to the identity form; the camera stays closed.
    IdentityForm,
    /// Stay on the camera entry screen; the user may capture again.
    CameraEntry,
    /// Nothing changes.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub feedback: Option<Feedback>,
    pub close_session: bool,
    pub transition: Option<AppTransition>,
    pub navigation: Option<NavigationAction>,
    pub next: NextStep,
}

impl Resolution {
    pub fn silent() -> Self {
        Self {
            feedback: None,
            close_session: false,
            transition: None,
            navigation: None,
            next: NextStep::Unchanged,
        }
    }

    fn stay(feedback: Feedback, close_session: bool, next: NextStep) -> Self {
        Self {
            feedback: Some(feedback),
            close_session,
            transition: None,
            navigation: None,
            next,
        }
    }
}

pub struct SessionResultHandler {
    intent: SubmissionIntent,
    home: ScreenId,
}

impl SessionResultHandler {
    pub fn new(intent: SubmissionIntent, home: ScreenId) -> Self {
        Self { intent, home }
    }

    pub fn resolve(&self, outcome: &SubmissionOutcome) -> Resolution {
        match outcome {
            SubmissionOutcome::Success { message } => Resolution {
                feedback: Some(Feedback::Success { message: message.clone() }),
                close_session: true,
                transition: Some(match self.intent {
                    SubmissionIntent::Register => AppTransition::Registered,
                    SubmissionIntent::Recognize => AppTransition::Authenticated,
                }),
                navigation: Some(NavigationAction::Replace(self.home.clone())),
                next: NextStep::Leave,
            },
            SubmissionOutcome::ValidationError { reason } => Resolution::stay(
                Feedback::FieldError { field: "cuil", message: reason.clone() },
                true,
                NextStep::IdentityForm,
            ),
            SubmissionOutcome::NoMatch => Resolution::stay(
                Feedback::Denied { message: "Face not recognized. Try again.".into() },
                true,
                NextStep::CameraEntry,
            ),
            SubmissionOutcome::Duplicate => Resolution::stay(
                Feedback::Denied { message: "This CUIL already has a registered face.".into() },
                true,
                NextStep::CameraEntry,
            ),
            SubmissionOutcome::ServerError { message, .. } => Resolution::stay(
                Feedback::Failure { message: format!("{}: {}", self.failure_message(), message) },
                true,
                NextStep::CameraEntry,
            ),
            SubmissionOutcome::NetworkError { .. } => Resolution::stay(
                Feedback::Failure {
                    message: "Could not connect to the recognition service.".into(),
                },
                true,
                NextStep::CameraEntry,
            ),
        }
    }

    /// Resolve an error raised before or around a submission.
    pub fn resolve_error(&self, err: &FaceGateError) -> Resolution {
        match err {
            FaceGateError::ConcurrentSubmission | FaceGateError::Cancelled => Resolution::silent(),
            FaceGateError::Validation(reason) => {
                self.resolve(&SubmissionOutcome::ValidationError { reason: reason.clone() })
            }
            FaceGateError::Permission(authorization) => Resolution::stay(
                Feedback::PermissionRequired { message: permission_message(*authorization).into() },
                true,
                NextStep::IdentityForm,
            ),
            // The session stays open so the user can take another photo.
            FaceGateError::Capture(msg) => Resolution::stay(
                Feedback::Failure { message: format!("Could not take the photo: {}", msg) },
                false,
                NextStep::Unchanged,
            ),
            FaceGateError::CameraBusy => Resolution::stay(
                Feedback::Failure { message: "The camera is in use by another screen.".into() },
                false,
                NextStep::CameraEntry,
            ),
            other => Resolution::stay(
                Feedback::Failure { message: other.to_string() },
                true,
                NextStep::CameraEntry,
            ),
        }
    }

    pub fn apply(&self, resolution: &Resolution, navigator: &dyn Navigator) {
        match &resolution.navigation {
            Some(NavigationAction::NavigateTo(screen)) => navigator.navigate_to(screen),
            Some(NavigationAction::Replace(screen)) => navigator.replace(screen),
            None => {}
        }
    }

    fn failure_message(&self) -> &'static str {
        match self.intent {
            SubmissionIntent::Register => "Could not register the face",
            SubmissionIntent::Recognize => "Could not verify the face",
        }
    }
}

fn permission_message(authorization: CameraAuthorization) -> &'static str {
    match authorization {
        CameraAuthorization::Denied => {
            "Camera access was denied. Enable it in the system settings to continue."
        }
        _ => "We need permission to use the camera.",
    }
}
