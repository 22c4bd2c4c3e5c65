pub mod coordinator;
pub mod flow;
pub mod identity;
pub mod outcome;
pub mod payload;
pub mod result;

pub use coordinator::{InFlightGuard, UploadCoordinator};
pub use flow::{Collaborators, FlowOptions, VerificationFlow};
pub use identity::Identity;
pub use outcome::{classify, SubmissionOutcome};
pub use payload::{CuilPolicy, FormPart, PayloadBuilder, SubmissionIntent, SubmissionPayload};
pub use result::{
    AppTransition, Feedback, NavigationAction, Navigator, NextStep, Resolution, ScreenId,
    SessionResultHandler,
};
