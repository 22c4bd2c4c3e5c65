use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{FaceGateError, Result};
use crate::core::outcome::{classify, SubmissionOutcome};
use crate::core::payload::{SubmissionIntent, SubmissionPayload};
use crate::service::client::RecognitionTransport;

/// Single-submission flag for one coordinator.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    busy: AtomicBool,
}

impl InFlightGuard {
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn try_enter(&self) -> Option<InFlightTicket<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightTicket { busy: &self.busy })
    }
}

/// Clears the guard when dropped, including when the submitting future is
/// dropped mid-flight.
pub struct InFlightTicket<'a> {
    busy: &'a AtomicBool,
}

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Submits payloads for one intent, at most one at a time, without retries.
pub struct UploadCoordinator {
    intent: SubmissionIntent,
    transport: Arc<dyn RecognitionTransport>,
    timeout: Duration,
    guard: InFlightGuard,
}

impl UploadCoordinator {
    pub fn new(intent: SubmissionIntent, transport: Arc<dyn RecognitionTransport>, timeout: Duration) -> Self {
        Self {
            intent,
            transport,
            timeout,
            guard: InFlightGuard::default(),
        }
    }

    pub fn intent(&self) -> SubmissionIntent {
        self.intent
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Send one payload and classify the answer.
    ///
    /// Fails with [`FaceGateError::ConcurrentSubmission`] without touching the
    /// network while another submission is in flight. Transport failures and
    /// timeouts come back as [`SubmissionOutcome::NetworkError`].
    pub async fn submit(&self, payload: SubmissionPayload) -> Result<SubmissionOutcome> {
        let _ticket = self.guard.try_enter().ok_or(FaceGateError::ConcurrentSubmission)?;

        if payload.intent() != self.intent {
            return Err(FaceGateError::Validation(format!(
                "Payload built for {} submitted to the {} coordinator",
                payload.intent(),
                self.intent
            )));
        }

        tracing::info!("Submitting {} request ({} byte image)", self.intent, payload.image().len());

        let outcome = match tokio::time::timeout(self.timeout, self.transport.send(payload)).await {
            Err(_) => SubmissionOutcome::NetworkError {
                cause: format!("No response within {} ms", self.timeout.as_millis()),
            },
            Ok(Err(e)) => SubmissionOutcome::NetworkError { cause: e.to_string() },
            Ok(Ok(response)) => classify(self.intent, response.status, &response.body),
        };

        match &outcome {
            SubmissionOutcome::Success { .. } => {
                tracing::info!("{} succeeded", self.intent)
            }
            SubmissionOutcome::NetworkError { cause } => {
                tracing::warn!("{} failed to reach the service: {}", self.intent, cause)
            }
            SubmissionOutcome::ServerError { status, message } => {
                tracing::warn!("{} rejected with HTTP {}: {}", self.intent, status, message)
            }
            other => tracing::info!("{} finished: {}", self.intent, other.label()),
        }

        Ok(outcome)
    }
}
