//! HTTP transport to the recognition service.
//!
//! [`HttpTransport`] posts a [`SubmissionPayload`] as `multipart/form-data`
//! to the endpoint selected by its intent using [`reqwest`]. It does not
//! interpret the response; classification happens in
//! [`classify`](crate::core::outcome::classify).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use std::collections::BTreeMap;

use crate::common::config::ServiceConfig;
use crate::core::payload::{FormPart, SubmissionIntent, SubmissionPayload};

/// Raw response as seen on the wire.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Errors from the transport layer. All of them classify as a network error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request failed after a connection was made (TLS, protocol,
    /// body read, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// No answer within the configured bound.
    #[error("Request timed out")]
    Timeout,

    /// The service could not be reached (DNS, refused, unreachable).
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Unreachable(e.to_string())
        } else {
            TransportError::Request(e)
        }
    }
}

/// Sends one payload and returns the raw response.
#[async_trait]
pub trait RecognitionTransport: Send + Sync {
    async fn send(&self, payload: SubmissionPayload) -> Result<TransportResponse, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ServiceConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Self::with_client(client, &config.base_url, &config.headers)
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            headers: build_headers(headers)?,
        })
    }

    pub fn endpoint(&self, intent: SubmissionIntent) -> String {
        format!("{}{}", self.base_url, intent.path())
    }

    fn form(payload: SubmissionPayload) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for part in payload.into_parts() {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File { name, file_name, mime, data } => {
                    let part = Part::bytes(data).file_name(file_name).mime_str(mime)?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl RecognitionTransport for HttpTransport {
    async fn send(&self, payload: SubmissionPayload) -> Result<TransportResponse, TransportError> {
        let url = self.endpoint(payload.intent());
        tracing::debug!("POST {} ({} byte image)", url, payload.image().len());

        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .multipart(Self::form(payload)?)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        tracing::debug!("{} answered HTTP {} with {} bytes", url, status, body.len());

        Ok(TransportResponse { status, body })
    }
}

fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::InvalidHeader { name: name.clone(), reason: e.to_string() }
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::InvalidHeader { name: name.clone(), reason: e.to_string() }
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_intent_path() {
        let transport = HttpTransport::new(&ServiceConfig {
            base_url: "http://localhost:5000/".into(),
            ..ServiceConfig::default()
        })
        .unwrap();

        assert_eq!(transport.endpoint(SubmissionIntent::Register), "http://localhost:5000/register");
        assert_eq!(transport.endpoint(SubmissionIntent::Recognize), "http://localhost:5000/recognize");
    }

    #[test]
    fn default_headers_include_interstitial_skip() {
        let headers = build_headers(&ServiceConfig::default().headers).unwrap();
        assert_eq!(headers.get("skip_zrok_interstitial").unwrap(), "true");
    }

    #[test]
    fn rejects_invalid_header_name() {
        let headers = BTreeMap::from([("bad header".to_string(), "x".to_string())]);
        let err = build_headers(&headers).unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { .. }));
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let result = HttpTransport::with_client(reqwest::Client::new(), "not a url", &BTreeMap::new());
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    fn payload() -> SubmissionPayload {
        use crate::camera::device::CapturedImage;
        use crate::core::identity::Identity;
        use crate::core::payload::{CuilPolicy, PayloadBuilder};

        let image = CapturedImage::from_jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        PayloadBuilder::new(SubmissionIntent::Register, CuilPolicy::Required)
            .build(Identity::new("20123456789", None), image)
            .unwrap()
    }

    fn loopback(addr: std::net::SocketAddr, timeout: std::time::Duration) -> HttpTransport {
        let client = reqwest::Client::builder().no_proxy().timeout(timeout).build().unwrap();
        HttpTransport::with_client(client, &format!("http://{}", addr), &BTreeMap::new()).unwrap()
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = loopback(addr, std::time::Duration::from_secs(5)).send(payload()).await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn silent_service_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let holder = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let err = loopback(addr, std::time::Duration::from_millis(200)).send(payload()).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout), "{:?}", err);
        holder.abort();
    }
}
