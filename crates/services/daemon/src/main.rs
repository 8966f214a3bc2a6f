//! GestureMedia session binary
//!
//! Wires camera, gesture classifier and remote player into one session and
//! reads keyboard controls from stdin.
//!
//! # Usage
//!
//! ```bash
//! # Keyboard controls only, against a local control server
//! GESTUREMEDIA_ACCESS_TOKEN=dev-token cargo run -p gesturemedia-daemon
//!
//! # Gestures from a directory of frames with an ONNX model
//! cargo run -p gesturemedia-daemon --features onnx -- \
//!   --config gesturemedia.toml \
//!   --frames-dir ./frames \
//!   --start
//!
//! # Live webcam
//! cargo run -p gesturemedia-daemon --features onnx,camera -- --config gesturemedia.toml
//! ```
//!
//! # Environment Variables
//!
//! - `GESTUREMEDIA_CONFIG`: config file path (same as `--config`)
//! - `GESTUREMEDIA_*`: per-setting overrides (see `gesturemedia_core::config`)
//! - `RUST_LOG`: logging level (default: `info`)

mod controls;
mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gesturemedia_core::capture::{CameraSession, ImageSequenceDevice};
use gesturemedia_core::classifier::Classifier;
use gesturemedia_core::config::{CameraConfig, Config, ModelConfig};
use gesturemedia_core::credential::SharedCredential;
use gesturemedia_core::pipeline::{GestureSession, GestureSessionBuilder};
use gesturemedia_core::remote::HttpPlaybackRemote;
use gesturemedia_core::status::{ChannelStatusSink, MultiStatusSink, TracingStatusSink};

use crate::controls::{ManualInput, HELP};

/// GestureMedia
///
/// Control a remote media player with hand gestures or the keyboard.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "GESTUREMEDIA_CONFIG")]
    config: Option<PathBuf>,

    /// Replay still images from this directory instead of a live camera
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Start gesture detection immediately
    #[arg(long, default_value_t = false)]
    start: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(args.config.as_ref()).context("failed to load configuration")?;
    if let Some(dir) = args.frames_dir {
        config.camera.frames_dir = Some(dir);
    }
    if args.start {
        config.detection.start_on_launch = true;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        remote = %config.remote.base_url,
        signed_in = config.remote.access_token.is_some(),
        "GestureMedia starting"
    );

    let session = build_session(&config).await?;
    if config.detection.start_on_launch {
        session.start_detection();
    }

    println!("{}", HELP);
    run_controls(&session).await?;

    session.shutdown().await;
    tracing::info!("GestureMedia shutdown complete");
    Ok(())
}

async fn build_session(config: &Config) -> Result<GestureSession> {
    let remote = HttpPlaybackRemote::new(config.remote.http_config())?;

    let credentials = Arc::new(match config.remote.credential() {
        Some(credential) => SharedCredential::with_credential(credential),
        None => {
            tracing::warn!("No access token configured; playback commands will be skipped");
            SharedCredential::new()
        }
    });

    let (channel_sink, status_rx) = ChannelStatusSink::with_default_capacity();
    let status = MultiStatusSink::new()
        .with_sink(Box::new(TracingStatusSink))
        .with_sink(Box::new(channel_sink));

    let builder = GestureSessionBuilder::new(Arc::new(remote), credentials, Arc::new(status)).with_config(config);

    let builder = match open_camera(&config.camera) {
        Err(e) => builder.detection_unavailable(e.to_string()),
        Ok(camera) => match build_classifier(&config.model).await {
            Ok(classifier) => builder.with_camera(Arc::new(camera), classifier),
            Err(reason) => {
                camera.close();
                builder.detection_unavailable(reason)
            }
        },
    };

    let session = builder.start();
    display::spawn(status_rx, session.state());
    Ok(session)
}

fn open_camera(config: &CameraConfig) -> gesturemedia_core::Result<CameraSession> {
    match &config.frames_dir {
        Some(dir) => CameraSession::open(Box::new(ImageSequenceDevice::new(dir))),
        None => open_webcam(config.device_index),
    }
}

#[cfg(feature = "camera")]
fn open_webcam(index: u32) -> gesturemedia_core::Result<CameraSession> {
    use gesturemedia_core::capture::NokhwaDevice;
    CameraSession::open(Box::new(NokhwaDevice::new(index)))
}

#[cfg(not(feature = "camera"))]
fn open_webcam(_index: u32) -> gesturemedia_core::Result<CameraSession> {
    Err(gesturemedia_core::Error::DeviceUnavailable(
        "no frames_dir configured and live capture needs the `camera` feature".to_string(),
    ))
}

#[cfg(feature = "onnx")]
async fn build_classifier(config: &ModelConfig) -> Result<Arc<dyn Classifier>, String> {
    use gesturemedia_core::classifier::{OnnxClassifier, OnnxClassifierConfig};

    let model_path = config.model_path.clone().ok_or("no model_path configured")?;
    let metadata_path = config
        .resolved_metadata_path()
        .ok_or("no metadata_path configured")?;

    let classifier = OnnxClassifier::new(OnnxClassifierConfig {
        model_path,
        metadata_path,
        input_size: config.input_size,
    });
    classifier.preload().await.map_err(|e| e.to_string())?;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "onnx"))]
async fn build_classifier(_config: &ModelConfig) -> Result<Arc<dyn Classifier>, String> {
    Err("built without the `onnx` feature".to_string())
}

/// Read keyboard controls until `quit`, end of input, or Ctrl+C
async fn run_controls(session: &GestureSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let pipeline = session.pipeline();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let input = match line.parse::<ManualInput>() {
            Ok(input) => input,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match input {
            ManualInput::Command(command) => {
                pipeline.handle_manual(command).await;
            }
            ManualInput::Gesture(label) => {
                pipeline.handle_gesture(label).await;
            }
            ManualInput::Refresh => {
                let outcome = pipeline.refresh_now().await;
                tracing::debug!(?outcome, "Manual refresh");
                println!("{}", display::describe_state(&session.state().snapshot()));
            }
            ManualInput::StartDetection => {
                if !session.start_detection() {
                    println!("gesture detection is unavailable");
                }
            }
            ManualInput::StopDetection => session.stop_detection(),
            ManualInput::Status => {
                println!("{}", display::describe_state(&session.state().snapshot()));
                println!(
                    "detection: {}",
                    match session.detection_phase() {
                        None => "unavailable".to_string(),
                        Some(_) if session.is_detecting() => "running".to_string(),
                        Some(phase) => format!("{:?}", phase).to_lowercase(),
                    }
                );
                if let Some(command) = pipeline.acknowledgements().visible() {
                    println!("last sent: {}", command);
                }
            }
            ManualInput::Help => println!("{}", HELP),
            ManualInput::Quit => break,
        }
    }

    Ok(())
}
