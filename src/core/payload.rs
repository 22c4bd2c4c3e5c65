use std::fmt;

use crate::camera::device::CapturedImage;
use crate::common::Result;
use crate::core::identity::Identity;
use crate::service::protocol::{
    CUIL_PART, IMAGE_FILE_NAME, IMAGE_PART, NAME_PART, RECOGNIZE_PATH, REGISTER_PATH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionIntent {
    Register,
    Recognize,
}

impl SubmissionIntent {
    pub fn path(&self) -> &'static str {
        match self {
            SubmissionIntent::Register => REGISTER_PATH,
            SubmissionIntent::Recognize => RECOGNIZE_PATH,
        }
    }
}

impl fmt::Display for SubmissionIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionIntent::Register => write!(f, "register"),
            SubmissionIntent::Recognize => write!(f, "recognize"),
        }
    }
}

/// Whether an identity must carry a CUIL for a given intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CuilPolicy {
    Required,
    Optional,
}

impl CuilPolicy {
    /// Registration always needs a CUIL; recognition follows configuration.
    pub fn for_intent(intent: SubmissionIntent, recognize_requires_cuil: bool) -> Self {
        match intent {
            SubmissionIntent::Register => CuilPolicy::Required,
            SubmissionIntent::Recognize if recognize_requires_cuil => CuilPolicy::Required,
            SubmissionIntent::Recognize => CuilPolicy::Optional,
        }
    }

    pub fn check(&self, identity: &Identity) -> Result<()> {
        match self {
            CuilPolicy::Required => identity.require_cuil(),
            CuilPolicy::Optional => Ok(()),
        }
    }
}

/// One multipart form part.
#[derive(Debug, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        file_name: &'static str,
        mime: &'static str,
        data: Vec<u8>,
    },
}

impl FormPart {
    pub fn name(&self) -> &'static str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// A built submission. Owns the captured image; consumed when sent, so the
/// same image cannot be submitted twice.
#[derive(Debug)]
pub struct SubmissionPayload {
    intent: SubmissionIntent,
    cuil: Option<String>,
    name: Option<String>,
    image: CapturedImage,
}

impl SubmissionPayload {
    pub fn intent(&self) -> SubmissionIntent {
        self.intent
    }

    pub fn cuil(&self) -> Option<&str> {
        self.cuil.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn image(&self) -> &CapturedImage {
        &self.image
    }

    /// Text parts first, then the image part.
    pub fn into_parts(self) -> Vec<FormPart> {
        let mut parts = Vec::with_capacity(3);
        if let Some(cuil) = self.cuil {
            parts.push(FormPart::Text { name: CUIL_PART, value: cuil });
        }
        if let Some(name) = self.name {
            parts.push(FormPart::Text { name: NAME_PART, value: name });
        }
        let mime = self.image.mime_type();
        parts.push(FormPart::File {
            name: IMAGE_PART,
            file_name: IMAGE_FILE_NAME,
            mime,
            data: self.image.into_bytes(),
        });
        parts
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PayloadBuilder {
    intent: SubmissionIntent,
    policy: CuilPolicy,
}

impl PayloadBuilder {
    pub fn new(intent: SubmissionIntent, policy: CuilPolicy) -> Self {
        Self { intent, policy }
    }

    pub fn intent(&self) -> SubmissionIntent {
        self.intent
    }

    pub fn policy(&self) -> CuilPolicy {
        self.policy
    }

    pub fn build(&self, identity: Identity, image: CapturedImage) -> Result<SubmissionPayload> {
        self.policy.check(&identity)?;

        let cuil = identity.has_cuil().then(|| identity.cuil().to_string());
        let name = match self.intent {
            // Register always sends `name`, empty when the form did not collect one.
            SubmissionIntent::Register => Some(identity.name().unwrap_or_default().to_string()),
            SubmissionIntent::Recognize => None,
        };

        Ok(SubmissionPayload {
            intent: self.intent,
            cuil,
            name,
            image,
        })
    }
}
