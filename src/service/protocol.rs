use serde::Deserialize;

// Endpoints, relative to the configured base URL
pub const REGISTER_PATH: &str = "/register";
pub const RECOGNIZE_PATH: &str = "/recognize";

// Multipart part names
pub const CUIL_PART: &str = "cuil";
pub const NAME_PART: &str = "name";
pub const IMAGE_PART: &str = "image";
pub const IMAGE_FILE_NAME: &str = "photo.jpg";

/// JSON body returned by both endpoints. Every field is optional; the
/// service only guarantees `message`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ServiceReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default, rename = "match", alias = "matched")]
    pub matched: Option<bool>,
    #[serde(default, alias = "already_registered")]
    pub duplicate: Option<bool>,
    #[serde(default)]
    pub cuil: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ServiceReply {
    /// Parse a response body; anything that is not a JSON object yields `None`.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    pub fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    /// A 2xx registration reply that nevertheless refuses the enrollment.
    pub fn is_rejection(&self) -> bool {
        self.duplicate == Some(true) || self.success == Some(false)
    }

    /// A 2xx recognition reply that positively identifies someone.
    pub fn is_match(&self) -> bool {
        if self.matched == Some(false) || self.success == Some(false) {
            return false;
        }
        self.matched == Some(true) || self.success == Some(true) || self.cuil.is_some()
    }
}
