//! GestureMedia Core
//!
//! Camera gestures in, remote playback commands out. A classifier turns
//! frames into gesture labels, labels become playback commands, commands go
//! to a remote playback controller, and a reconciler keeps the local view of
//! shuffle/loop/now-playing in line with what the remote reports.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌─────────────────────┐
//! │ FrameSource│──▶│ Classifier │──▶│ InferenceScheduler  │  one inference at a time,
//! │ (camera)   │   │ (onnx)     │   │ (gate)              │  min interval between them
//! └────────────┘   └────────────┘   └──────────┬──────────┘
//!                                              │ DetectionEvent
//!                                              ▼
//!                  ┌────────────────────┐   ┌─────────────────────┐
//!                  │ GestureActionMapper│──▶│ CommandDispatcher   │──▶ remote controller
//!                  └─────────▲──────────┘   └──────────┬──────────┘        │
//!                            │ reads                    │ after send        │
//!                  ┌─────────┴──────────┐               ▼                   │
//!                  │ PlaybackReconciler │◀──────── refresh ◀────────────────┘
//!                  │ (sole writer)      │          (also on a timer)
//!                  └────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gesturemedia_core::credential::{Credential, SharedCredential};
//! use gesturemedia_core::pipeline::GestureSessionBuilder;
//! use gesturemedia_core::playback::PlaybackCommand;
//! use gesturemedia_core::remote::{HttpPlaybackRemote, HttpRemoteConfig};
//! use gesturemedia_core::status::TracingStatusSink;
//!
//! # async fn run() -> gesturemedia_core::Result<()> {
//! let remote = Arc::new(HttpPlaybackRemote::new(HttpRemoteConfig::default())?);
//! let credentials = Arc::new(SharedCredential::with_credential(Credential::new("token")));
//! let session = GestureSessionBuilder::new(remote, credentials, Arc::new(TracingStatusSink))
//!     .detection_unavailable("no camera")
//!     .start();
//!
//! session.pipeline().handle_manual(PlaybackCommand::Next).await;
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod classifier;
pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod gesture;
pub mod mapper;
pub mod pipeline;
pub mod playback;
pub mod reconciler;
pub mod remote;
pub mod scheduler;
pub mod status;

pub use error::{Error, Result};
