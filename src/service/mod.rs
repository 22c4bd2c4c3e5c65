pub mod client;
pub mod protocol;

pub use client::{HttpTransport, RecognitionTransport, TransportError, TransportResponse};
pub use protocol::ServiceReply;
