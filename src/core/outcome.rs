//! Classification of raw service responses into [`SubmissionOutcome`]s.

use crate::core::payload::SubmissionIntent;
use crate::service::protocol::ServiceReply;

pub const DEFAULT_REGISTER_MESSAGE: &str = "Face registered successfully";
pub const DEFAULT_RECOGNIZE_MESSAGE: &str = "Face recognized";
pub const GENERIC_SERVER_MESSAGE: &str = "The recognition service rejected the request";

/// Result of one submission. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success { message: String },
    ValidationError { reason: String },
    /// Recognize only: no enrolled face matched.
    NoMatch,
    /// Register only: the CUIL already has an enrolled face.
    Duplicate,
    ServerError { status: u16, message: String },
    NetworkError { cause: String },
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Success { .. } => "success",
            SubmissionOutcome::ValidationError { .. } => "validation_error",
            SubmissionOutcome::NoMatch => "no_match",
            SubmissionOutcome::Duplicate => "duplicate",
            SubmissionOutcome::ServerError { .. } => "server_error",
            SubmissionOutcome::NetworkError { .. } => "network_error",
        }
    }
}

/// Map an HTTP status and body to an outcome.
///
/// 2xx bodies are inspected for semantic rejection. Outside 2xx, `409` on
/// register and `404` on recognize are the service's way of reporting a
/// duplicate enrollment and an unknown face; every other status is a
/// server error carrying the body's message when there is one.
pub fn classify(intent: SubmissionIntent, status: u16, body: &[u8]) -> SubmissionOutcome {
    let reply = ServiceReply::parse(body);
    let message = reply.as_ref().and_then(|r| r.message()).map(str::to_string);

    if (200..300).contains(&status) {
        return match intent {
            SubmissionIntent::Register => {
                if reply.as_ref().is_some_and(ServiceReply::is_rejection) {
                    SubmissionOutcome::Duplicate
                } else {
                    SubmissionOutcome::Success {
                        message: message.unwrap_or_else(|| DEFAULT_REGISTER_MESSAGE.to_string()),
                    }
                }
            }
            SubmissionIntent::Recognize => {
                if reply.as_ref().is_some_and(ServiceReply::is_match) {
                    SubmissionOutcome::Success {
                        message: message.unwrap_or_else(|| DEFAULT_RECOGNIZE_MESSAGE.to_string()),
                    }
                } else {
                    SubmissionOutcome::NoMatch
                }
            }
        };
    }

    match (intent, status) {
        (SubmissionIntent::Register, 409) => SubmissionOutcome::Duplicate,
        (SubmissionIntent::Recognize, 404) => SubmissionOutcome::NoMatch,
        _ => SubmissionOutcome::ServerError {
            status,
            message: message.unwrap_or_else(|| GENERIC_SERVER_MESSAGE.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionIntent::{Recognize, Register};

    #[test]
    fn register_ok_uses_server_message() {
        assert_eq!(
            classify(Register, 200, br#"{"message":"ok"}"#),
            SubmissionOutcome::Success { message: "ok".into() }
        );
    }

    #[test]
    fn register_ok_without_body_uses_default_message() {
        assert_eq!(
            classify(Register, 201, b""),
            SubmissionOutcome::Success { message: DEFAULT_REGISTER_MESSAGE.into() }
        );
    }

    #[test]
    fn register_conflict_is_duplicate() {
        assert_eq!(
            classify(Register, 409, br#"{"message":"already registered"}"#),
            SubmissionOutcome::Duplicate
        );
    }

    #[test]
    fn register_ok_with_duplicate_flag_is_duplicate() {
        assert_eq!(
            classify(Register, 200, br#"{"duplicate":true,"message":"exists"}"#),
            SubmissionOutcome::Duplicate
        );
    }

    #[test]
    fn recognize_not_found_is_no_match() {
        assert_eq!(
            classify(Recognize, 404, br#"{"message":"no match"}"#),
            SubmissionOutcome::NoMatch
        );
    }

    #[test]
    fn recognize_ok_requires_positive_match() {
        assert_eq!(classify(Recognize, 200, br#"{"match":false}"#), SubmissionOutcome::NoMatch);
        assert_eq!(classify(Recognize, 200, br#"{"message":"hola"}"#), SubmissionOutcome::NoMatch);
        assert_eq!(
            classify(Recognize, 200, br#"{"match":true,"message":"Bienvenido"}"#),
            SubmissionOutcome::Success { message: "Bienvenido".into() }
        );
    }

    #[test]
    fn conflict_on_recognize_is_server_error() {
        assert_eq!(
            classify(Recognize, 409, b""),
            SubmissionOutcome::ServerError { status: 409, message: GENERIC_SERVER_MESSAGE.into() }
        );
    }

    #[test]
    fn server_error_prefers_body_message() {
        assert_eq!(
            classify(Register, 500, br#"{"message":"model offline"}"#),
            SubmissionOutcome::ServerError { status: 500, message: "model offline".into() }
        );
        assert_eq!(
            classify(Register, 502, b"<html>bad gateway</html>"),
            SubmissionOutcome::ServerError { status: 502, message: GENERIC_SERVER_MESSAGE.into() }
        );
    }
}
