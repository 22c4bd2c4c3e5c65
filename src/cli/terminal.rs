use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::camera::permission::{CameraAuthorization, PermissionProvider};
use crate::camera::session::CancelHandle;
use crate::core::result::{Feedback, Navigator, Resolution, ScreenId};

/// Camera permission for a terminal session.
///
/// `query` reports `Denied` when the OS refuses access to the device node;
/// otherwise the user is asked once with a y/N prompt, unless `assume_yes`.
/// The prompt runs in raw mode, so Ctrl-C arrives as a key press; it cancels
/// the handle registered with [`cancel_on_interrupt`](Self::cancel_on_interrupt).
pub struct TerminalPermissions {
    device_path: Option<PathBuf>,
    assume_yes: bool,
    interrupt: OnceLock<CancelHandle>,
}

impl TerminalPermissions {
    pub fn new(device_path: Option<PathBuf>, assume_yes: bool) -> Self {
        Self { device_path, assume_yes, interrupt: OnceLock::new() }
    }

    pub fn cancel_on_interrupt(&self, handle: CancelHandle) {
        if self.interrupt.set(handle).is_err() {
            tracing::debug!("Interrupt handle already registered");
        }
    }
}

#[async_trait]
impl PermissionProvider for TerminalPermissions {
    async fn query(&self) -> CameraAuthorization {
        if let Some(path) = &self.device_path {
            if let Err(e) = std::fs::File::open(path) {
                if e.kind() == io::ErrorKind::PermissionDenied {
                    tracing::warn!("No access to {}: {}", path.display(), e);
                    return CameraAuthorization::Denied;
                }
            }
        }

        if self.assume_yes {
            CameraAuthorization::Granted
        } else {
            CameraAuthorization::Undetermined
        }
    }

    async fn request(&self) -> CameraAuthorization {
        if self.assume_yes {
            return CameraAuthorization::Granted;
        }

        let answer = tokio::task::spawn_blocking(|| prompt_yes_no("Allow face-gate to use the camera? [y/N] "))
            .await;

        match answer {
            Ok(Ok(Answer::Yes)) => CameraAuthorization::Granted,
            Ok(Ok(Answer::No)) => CameraAuthorization::Denied,
            Ok(Ok(Answer::Interrupt)) => {
                tracing::info!("Permission prompt interrupted");
                if let Some(handle) = self.interrupt.get() {
                    handle.cancel();
                }
                CameraAuthorization::Undetermined
            }
            Ok(Err(e)) => {
                tracing::warn!("Could not read permission answer: {}", e);
                CameraAuthorization::Undetermined
            }
            Err(e) => {
                tracing::warn!("Permission prompt task failed: {}", e);
                CameraAuthorization::Undetermined
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Interrupt,
}

fn prompt_yes_no(question: &str) -> io::Result<Answer> {
    print!("{}", question);
    io::stdout().flush()?;

    terminal::enable_raw_mode()?;
    let answer = read_answer();
    terminal::disable_raw_mode()?;

    println!();
    answer
}

fn read_answer() -> io::Result<Answer> {
    loop {
        if let Event::Key(key) = event::read()? {
            if let Some(answer) = answer_for(&key) {
                return Ok(answer);
            }
        }
    }
}

fn answer_for(key: &KeyEvent) -> Option<Answer> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Answer::Interrupt)
        }
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(Answer::Yes),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Enter | KeyCode::Esc => Some(Answer::No),
        _ => None,
    }
}

/// Logs navigation instead of switching screens.
#[derive(Debug, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate_to(&self, screen: &ScreenId) {
        tracing::info!("Navigate to {}", screen);
        println!("→ {}", screen);
    }

    fn replace(&self, screen: &ScreenId) {
        tracing::info!("Replace current screen with {}", screen);
        println!("⇒ {}", screen);
    }
}

pub fn render_resolution(resolution: &Resolution) {
    match &resolution.feedback {
        Some(Feedback::Success { message }) => println!("✅ {}", message),
        Some(Feedback::FieldError { field, message }) => println!("⚠️  {}: {}", field, message),
        Some(Feedback::Denied { message }) => println!("❌ {}", message),
        Some(Feedback::Failure { message }) => println!("⚠️  {}", message),
        Some(Feedback::PermissionRequired { message }) => println!("🔒 {}", message),
        None => {}
    }
}
