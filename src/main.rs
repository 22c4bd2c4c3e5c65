use face_gate::{
    camera::{CameraDevice, CameraRegistry, FileCamera, PermissionGate, V4l2Camera},
    cli::{render_resolution, ConsoleNavigator, TerminalPermissions},
    common::Config,
    core::{Collaborators, FlowOptions, Identity, NextStep, SubmissionIntent, VerificationFlow},
    service::HttpTransport,
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "face-gate")]
#[command(about = "Face registration and face login against a recognition service")]
struct Cli {
    /// Enable development mode (verbose logging, local config, defaults when no config exists)
    #[arg(long, global = true)]
    dev: bool,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Grant camera permission without prompting
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a face for a CUIL
    Register {
        #[arg(short, long)]
        cuil: String,
        #[arg(short, long)]
        name: Option<String>,
        /// Use a photo from disk instead of the camera
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Log in with a face
    Recognize {
        #[arg(short, long)]
        cuil: Option<String>,
        /// Use a photo from disk instead of the camera
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Take one photo and save it
    TestCamera {
        #[arg(short, long, default_value = "test_capture.jpg")]
        output: PathBuf,
    },
    /// List cameras and show which one auto-detection would pick
    DetectCamera,
    /// Load, validate and print the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let config = Config::load(cli.config.as_deref(), cli.dev)?;

    match cli.command {
        Commands::Register { cuil, name, image } => {
            let identity = Identity::new(&cuil, name.as_deref());
            run_flow(SubmissionIntent::Register, identity, image, &config, cli.yes).await
        }
        Commands::Recognize { cuil, image } => {
            let identity = cuil.map(Identity::with_cuil).unwrap_or_else(Identity::face_only);
            run_flow(SubmissionIntent::Recognize, identity, image, &config, cli.yes).await
        }
        Commands::TestCamera { output } => {
            let device_path = V4l2Camera::device_path(&config.camera).map(PathBuf::from);
            let mut gate = PermissionGate::new(Arc::new(TerminalPermissions::new(device_path, cli.yes)));
            gate.ensure_granted().await?;

            let _lease = CameraRegistry::global().try_acquire()?;
            let mut camera = V4l2Camera::new(&config.camera);
            camera.start().await?;
            let photo = camera.take_picture().await;
            camera.stop();

            let photo = photo?;
            std::fs::write(&output, photo.bytes())
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Saved {} byte photo to {}", photo.len(), output.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::DetectCamera => {
            println!("🔍 Detecting available cameras...\n");

            let cameras = V4l2Camera::list_all_cameras()?;
            if cameras.is_empty() {
                println!("❌ No cameras found!");
                println!("\nTroubleshooting:");
                println!("  1. Check if cameras are connected");
                println!("  2. Ensure you have permission to access /dev/video*");
                return Ok(ExitCode::FAILURE);
            }

            for camera in &cameras {
                println!("📷 /dev/video{}: {}", camera.index, camera.name);
                for feature in &camera.features {
                    println!("   - {}", feature);
                }
                println!();
            }

            let selected = V4l2Camera::detect_camera()?;
            println!("✅ Auto-detection picks /dev/video{}", selected);
            println!("\nSet `device_index = 999` in the [camera] section to use auto-detection.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_flow(
    intent: SubmissionIntent,
    identity: Identity,
    image: Option<PathBuf>,
    config: &Config,
    assume_yes: bool,
) -> Result<ExitCode> {
    // A photo from disk needs no camera permission.
    let assume_yes = assume_yes || image.is_some();

    let (camera, device_path): (Box<dyn CameraDevice>, Option<PathBuf>) = match image {
        Some(path) => (Box::new(FileCamera::new(path, config.camera.jpeg_quality)), None),
        None => (
            Box::new(V4l2Camera::new(&config.camera)),
            V4l2Camera::device_path(&config.camera).map(PathBuf::from),
        ),
    };

    let transport = HttpTransport::new(&config.service).context("Failed to set up HTTP transport")?;

    let permissions = Arc::new(TerminalPermissions::new(device_path, assume_yes));

    let mut flow = VerificationFlow::new(
        intent,
        FlowOptions::from_config(config),
        Collaborators {
            permissions: permissions.clone(),
            camera,
            transport: Arc::new(transport),
            navigator: Arc::new(ConsoleNavigator),
            registry: CameraRegistry::global(),
        },
    );

    let cancel = flow.cancel_handle();
    permissions.cancel_on_interrupt(cancel.clone());
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    println!("Look at the camera...");
    let resolution = flow.run_once(identity).await;
    flow.leave();
    ctrl_c.abort();

    match resolution {
        Some(resolution) => {
            render_resolution(&resolution);
            Ok(if resolution.next == NextStep::Leave { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        None => {
            println!("Cancelled");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}
