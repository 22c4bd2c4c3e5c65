#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use face_gate::{
    CameraAuthorization, CameraDevice, CancelHandle, CameraRegistry, CapturedImage, Collaborators, FlowOptions,
    Navigator, PermissionProvider, RecognitionTransport, ScreenId, SubmissionIntent,
    SubmissionPayload, TransportError, TransportResponse, VerificationFlow,
};

/// Smallest byte string that passes as a JPEG.
pub const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];

pub struct StaticPermissions {
    answer: CameraAuthorization,
    prompt: Option<(Arc<Notify>, Arc<Notify>)>,
    interrupt: Option<OnceLock<CancelHandle>>,
    pub queries: AtomicUsize,
}

impl StaticPermissions {
    pub fn new(answer: CameraAuthorization) -> Self {
        Self { answer, prompt: None, interrupt: None, queries: AtomicUsize::new(0) }
    }

    /// Undetermined until asked. The prompt signals `shown`, then answers
    /// once `answered` is notified.
    pub fn prompting(answer: CameraAuthorization, shown: Arc<Notify>, answered: Arc<Notify>) -> Self {
        Self { prompt: Some((shown, answered)), ..Self::new(answer) }
    }

    /// Undetermined until asked. The user interrupts the prompt, which
    /// cancels the handle given to [`interrupt_into`](Self::interrupt_into).
    pub fn interrupted() -> Self {
        Self { interrupt: Some(OnceLock::new()), ..Self::new(CameraAuthorization::Undetermined) }
    }

    pub fn interrupt_into(&self, handle: CancelHandle) {
        if let Some(slot) = &self.interrupt {
            let _ = slot.set(handle);
        }
    }
}

#[async_trait]
impl PermissionProvider for StaticPermissions {
    async fn query(&self) -> CameraAuthorization {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.prompt.is_some() || self.interrupt.is_some() {
            CameraAuthorization::Undetermined
        } else {
            self.answer
        }
    }

    async fn request(&self) -> CameraAuthorization {
        if let Some((shown, answered)) = &self.prompt {
            shown.notify_one();
            answered.notified().await;
        }
        if let Some(handle) = self.interrupt.as_ref().and_then(OnceLock::get) {
            handle.cancel();
        }
        self.answer
    }
}

#[derive(Debug, Default)]
pub struct CameraCounters {
    pub starts: AtomicUsize,
    pub pictures: AtomicUsize,
    pub stops: AtomicUsize,
}

pub struct FakeCamera {
    counters: Arc<CameraCounters>,
}

impl FakeCamera {
    pub fn new(counters: Arc<CameraCounters>) -> Self {
        Self { counters }
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn start(&mut self) -> face_gate::Result<()> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn take_picture(&mut self) -> face_gate::Result<CapturedImage> {
        self.counters.pictures.fetch_add(1, Ordering::SeqCst);
        CapturedImage::from_jpeg(FAKE_JPEG.to_vec())
    }

    fn stop(&mut self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// What the scripted transport does with the next payload.
pub enum Reply {
    Respond(u16, &'static str),
    /// Never answers.
    Hang,
    /// Signals `entered`, then answers once `release` is notified.
    Gated { entered: Arc<Notify>, release: Arc<Notify>, status: u16, body: &'static str },
    /// The service cannot be reached.
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPayload {
    pub intent: SubmissionIntent,
    pub cuil: Option<String>,
    pub name: Option<String>,
    pub image_len: usize,
}

#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    pub sent: Mutex<Vec<SentPayload>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn sent(&self) -> Vec<SentPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecognitionTransport for ScriptedTransport {
    async fn send(&self, payload: SubmissionPayload) -> Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push(SentPayload {
            intent: payload.intent(),
            cuil: payload.cuil().map(str::to_string),
            name: payload.name().map(str::to_string),
            image_len: payload.image().len(),
        });

        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Unreachable);
        match reply {
            Reply::Respond(status, body) => Ok(TransportResponse { status, body: body.as_bytes().to_vec() }),
            Reply::Hang => std::future::pending().await,
            Reply::Gated { entered, release, status, body } => {
                entered.notify_one();
                release.notified().await;
                Ok(TransportResponse { status, body: body.as_bytes().to_vec() })
            }
            Reply::Unreachable => Err(TransportError::Unreachable("connection refused".into())),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    calls: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, screen: &ScreenId) {
        self.calls.lock().unwrap().push(format!("navigate:{}", screen));
    }

    fn replace(&self, screen: &ScreenId) {
        self.calls.lock().unwrap().push(format!("replace:{}", screen));
    }
}

/// A flow wired to fakes, plus handles to inspect them.
pub struct Harness {
    pub flow: VerificationFlow,
    pub permissions: Arc<StaticPermissions>,
    pub camera: Arc<CameraCounters>,
    pub transport: Arc<ScriptedTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub registry: CameraRegistry,
}

pub fn test_options() -> FlowOptions {
    FlowOptions {
        recognize_requires_cuil: true,
        timeout: Duration::from_millis(200),
        home_screen: ScreenId::new("Home"),
    }
}

pub fn harness(intent: SubmissionIntent, replies: impl IntoIterator<Item = Reply>) -> Harness {
    harness_with(intent, test_options(), CameraAuthorization::Granted, replies)
}

pub fn harness_with(
    intent: SubmissionIntent,
    options: FlowOptions,
    authorization: CameraAuthorization,
    replies: impl IntoIterator<Item = Reply>,
) -> Harness {
    harness_with_permissions(intent, options, StaticPermissions::new(authorization), replies)
}

pub fn harness_with_permissions(
    intent: SubmissionIntent,
    options: FlowOptions,
    permissions: StaticPermissions,
    replies: impl IntoIterator<Item = Reply>,
) -> Harness {
    let permissions = Arc::new(permissions);
    let camera = Arc::new(CameraCounters::default());
    let transport = Arc::new(ScriptedTransport::new(replies));
    let navigator = Arc::new(RecordingNavigator::default());
    let registry = CameraRegistry::new();

    let flow = VerificationFlow::new(
        intent,
        options,
        Collaborators {
            permissions: permissions.clone(),
            camera: Box::new(FakeCamera::new(camera.clone())),
            transport: transport.clone(),
            navigator: navigator.clone(),
            registry: registry.clone(),
        },
    );

    Harness { flow, permissions, camera, transport, navigator, registry }
}

/// A one-shot HTTP/1.1 responder on a random local port.
///
/// Returns the address and a handle resolving to the raw request text.
pub async fn serve_once(status: u16, body: &'static str) -> (SocketAddr, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;

        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request
    });

    (addr, handle)
}

/// Accepts connections and never answers.
pub async fn serve_silence() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            open.push(stream);
        }
    });

    addr
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let Some(header_end) = find(&raw, b"\r\n\r\n") else { continue };
        let head = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
        let body = &raw[header_end + 4..];

        if let Some(length) = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            if body.len() >= length {
                break;
            }
        } else if head.contains("transfer-encoding: chunked") {
            if body.ends_with(b"0\r\n\r\n") {
                break;
            }
        } else {
            break;
        }
    }

    String::from_utf8_lossy(&raw).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
