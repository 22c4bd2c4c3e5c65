use crate::common::{FaceGateError, Result};

/// Identity fields collected by the form that precedes a capture.
///
/// Values are trimmed on construction. An empty `cuil` is representable so
/// that face-only recognition can be expressed; whether it is acceptable is
/// decided by [`CuilPolicy`](crate::core::payload::CuilPolicy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    cuil: String,
    name: Option<String>,
}

impl Identity {
    pub fn new(cuil: impl AsRef<str>, name: Option<&str>) -> Self {
        Self {
            cuil: cuil.as_ref().trim().to_string(),
            name: name.map(|n| n.trim().to_string()),
        }
    }

    pub fn with_cuil(cuil: impl AsRef<str>) -> Self {
        Self::new(cuil, None)
    }

    /// Identity for recognition without a CUIL hint.
    pub fn face_only() -> Self {
        Self::new("", None)
    }

    pub fn cuil(&self) -> &str {
        &self.cuil
    }

    pub fn has_cuil(&self) -> bool {
        !self.cuil.is_empty()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn require_cuil(&self) -> Result<()> {
        if self.has_cuil() {
            Ok(())
        } else {
            Err(FaceGateError::Validation(
                "A CUIL is required before capturing a face".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_fields() {
        let identity = Identity::new("  20123456789 ", Some(" Juan Perez "));
        assert_eq!(identity.cuil(), "20123456789");
        assert_eq!(identity.name(), Some("Juan Perez"));
    }

    #[test]
    fn whitespace_cuil_is_empty() {
        let identity = Identity::with_cuil("   ");
        assert!(!identity.has_cuil());
        assert!(matches!(identity.require_cuil(), Err(FaceGateError::Validation(_))));
    }

    #[test]
    fn face_only_has_no_cuil() {
        assert!(!Identity::face_only().has_cuil());
        assert_eq!(Identity::face_only().name(), None);
    }
}
