//! Frame source
//!
//! A [`CaptureDevice`] is opened exactly once into a [`CameraSession`], which
//! holds the device stream for the life of the session and releases it on
//! [`CameraSession::close`] or on drop, whichever comes first.
//!
//! Devices:
//! - [`ImageSequenceDevice`] - cycles through still images in a directory
//! - `NokhwaDevice` (feature `camera`) - live webcam

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Instant;

use crate::{Error, Result};

/// One RGB8 video frame
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
    captured_at: Instant,
}

impl Frame {
    /// Build a frame from tightly packed RGB8 pixels
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> std::result::Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(CaptureError::Read(format!(
                "frame {}x{} needs {} RGB bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
            captured_at: Instant::now(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Copy into an `image` buffer for resizing / preprocessing
    pub fn to_image(&self) -> image::RgbImage {
        // Dimensions were validated in `from_rgb`, so this cannot fail.
        image::RgbImage::from_raw(self.width, self.height, self.pixels.to_vec())
            .unwrap_or_else(|| image::RgbImage::new(self.width, self.height))
    }
}

/// Capture failures reported by devices
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to open device: {0}")]
    Open(String),

    #[error("failed to read frame: {0}")]
    Read(String),

    #[error("device stream closed")]
    Closed,
}

/// A camera-like device that can be opened once into a stream
pub trait CaptureDevice: Send {
    /// Human readable device name for logs
    fn name(&self) -> String;

    /// Acquire the device. The returned stream owns the OS handle.
    fn open(self: Box<Self>) -> std::result::Result<Box<dyn CaptureStream>, CaptureError>;
}

/// An open device stream
pub trait CaptureStream: Send {
    /// Read the current frame. `Ok(None)` means no frame is ready yet.
    fn read_frame(&mut self) -> std::result::Result<Option<Frame>, CaptureError>;

    /// Release the underlying device. Called exactly once.
    fn release(&mut self);
}

/// Anything the inference scheduler can pull frames from
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Current frame, or `None` when no frame is available right now
    async fn acquire(&self) -> Option<Frame>;
}

/// Scoped ownership of an open capture device
pub struct CameraSession {
    name: String,
    stream: Arc<Mutex<Option<Box<dyn CaptureStream>>>>,
}

impl CameraSession {
    /// Open the device. Failure here means detection is impossible for this
    /// session; callers degrade to manual controls.
    pub fn open(device: Box<dyn CaptureDevice>) -> Result<Self> {
        let name = device.name();
        let stream = device
            .open()
            .map_err(|e| Error::DeviceUnavailable(format!("{}: {}", name, e)))?;

        tracing::info!(device = %name, "Capture device opened");

        Ok(Self {
            name,
            stream: Arc::new(Mutex::new(Some(stream))),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.stream.lock().is_some()
    }

    /// Release the device. Idempotent.
    pub fn close(&self) {
        if let Some(mut stream) = self.stream.lock().take() {
            stream.release();
            tracing::info!(device = %self.name, "Capture device released");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl FrameSource for CameraSession {
    async fn acquire(&self) -> Option<Frame> {
        let stream = self.stream.clone();
        let name = self.name.clone();

        let result = tokio::task::spawn_blocking(move || {
            let mut guard = stream.lock();
            let stream = guard.as_mut()?;
            match stream.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(device = %name, "Frame read failed: {}", e);
                    None
                }
            }
        })
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!("Frame read task failed: {}", e);
            None
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ImageSequenceDevice
// ════════════════════════════════════════════════════════════════════════════

/// Replays still images (`.png`, `.jpg`, `.jpeg`) from a directory in name
/// order, looping forever.
pub struct ImageSequenceDevice {
    dir: PathBuf,
}

impl ImageSequenceDevice {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl CaptureDevice for ImageSequenceDevice {
    fn name(&self) -> String {
        format!("images:{}", self.dir.display())
    }

    fn open(self: Box<Self>) -> std::result::Result<Box<dyn CaptureStream>, CaptureError> {
        let files = Self::list_images(&self.dir).map_err(|e| CaptureError::Open(e.to_string()))?;
        if files.is_empty() {
            return Err(CaptureError::Open(format!(
                "no images found in {}",
                self.dir.display()
            )));
        }
        Ok(Box::new(ImageSequenceStream {
            files,
            position: 0,
        }))
    }
}

struct ImageSequenceStream {
    files: Vec<PathBuf>,
    position: usize,
}

impl CaptureStream for ImageSequenceStream {
    fn read_frame(&mut self) -> std::result::Result<Option<Frame>, CaptureError> {
        if self.files.is_empty() {
            return Err(CaptureError::Closed);
        }
        let path = &self.files[self.position % self.files.len()];
        self.position = self.position.wrapping_add(1);

        let decoded = image::open(path)
            .map_err(|e| CaptureError::Read(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        let (width, height) = decoded.dimensions();
        Frame::from_rgb(width, height, decoded.into_raw()).map(Some)
    }

    fn release(&mut self) {
        self.files.clear();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// NokhwaDevice - live webcam (feature = "camera")
// ════════════════════════════════════════════════════════════════════════════

/// Live webcam by index.
///
/// Camera handles are not `Send` on every backend, so the camera lives on a
/// dedicated capture thread and frames are requested over a channel.
#[cfg(feature = "camera")]
pub struct NokhwaDevice {
    index: u32,
}

#[cfg(feature = "camera")]
impl NokhwaDevice {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

#[cfg(feature = "camera")]
enum CameraRequest {
    Frame(std::sync::mpsc::Sender<std::result::Result<Frame, CaptureError>>),
    Stop,
}

#[cfg(feature = "camera")]
impl CaptureDevice for NokhwaDevice {
    fn name(&self) -> String {
        format!("camera:{}", self.index)
    }

    fn open(self: Box<Self>) -> std::result::Result<Box<dyn CaptureStream>, CaptureError> {
        use nokhwa::pixel_format::RgbFormat;
        use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
        use nokhwa::Camera;
        use std::sync::mpsc;

        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), CaptureError>>();
        let (request_tx, request_rx) = mpsc::channel::<CameraRequest>();
        let index = self.index;

        let thread = std::thread::Builder::new()
            .name(format!("gesturemedia-camera-{}", index))
            .spawn(move || {
                let format =
                    RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
                let mut camera = match Camera::new(CameraIndex::Index(index), format)
                    .and_then(|mut camera| camera.open_stream().map(|_| camera))
                {
                    Ok(camera) => camera,
                    Err(e) => {
                        let _ = ready_tx.send(Err(CaptureError::Open(e.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while let Ok(CameraRequest::Frame(reply)) = request_rx.recv() {
                    let frame = camera
                        .frame()
                        .and_then(|buffer| buffer.decode_image::<RgbFormat>())
                        .map_err(|e| CaptureError::Read(e.to_string()))
                        .and_then(|decoded| {
                            let (width, height) = (decoded.width(), decoded.height());
                            Frame::from_rgb(width, height, decoded.into_raw())
                        });
                    let _ = reply.send(frame);
                }

                if let Err(e) = camera.stop_stream() {
                    tracing::warn!("Failed to stop camera stream: {}", e);
                }
            })
            .map_err(|e| CaptureError::Open(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(NokhwaStream {
                requests: request_tx,
                thread: Some(thread),
            })),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::Open("capture thread exited".to_string())),
        }
    }
}

#[cfg(feature = "camera")]
struct NokhwaStream {
    requests: std::sync::mpsc::Sender<CameraRequest>,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(feature = "camera")]
impl CaptureStream for NokhwaStream {
    fn read_frame(&mut self) -> std::result::Result<Option<Frame>, CaptureError> {
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        self.requests
            .send(CameraRequest::Frame(reply_tx))
            .map_err(|_| CaptureError::Closed)?;
        reply_rx.recv().map_err(|_| CaptureError::Closed)?.map(Some)
    }

    fn release(&mut self) {
        let _ = self.requests.send(CameraRequest::Stop);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
