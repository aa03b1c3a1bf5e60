//! Camera lifecycle and still capture.
//!
//! The [`CaptureController`] moves between three states:
//!
//! ```text
//!   Idle --start--> Live --capture--> Captured
//!    ^               ^  <--retake---     |
//!    +----cancel-----+------cancel-------+
//! ```
//!
//! The camera stream is held only while Live or Captured and is stopped
//! exactly once when the controller returns to Idle or is dropped.

use std::fmt;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CameraConfig;
use crate::error::{Error, Result};

/// Encoding of a captured still.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    /// JPEG.
    Jpeg,
}

impl ImageEncoding {
    /// MIME type for data URIs.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// An encoded still frame.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    bytes: Vec<u8>,
    encoding: ImageEncoding,
    width: u32,
    height: u32,
    captured_at: DateTime<Utc>,
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("encoding", &self.encoding)
            .field("len", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

impl CapturedImage {
    /// Wrap already-encoded image bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>, encoding: ImageEncoding, width: u32, height: u32) -> Self {
        Self {
            bytes,
            encoding,
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    /// Encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoding tag.
    #[must_use]
    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    /// Frame dimensions.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// When the shutter was pressed.
    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Bare base64 of the encoded bytes, without any `data:` prefix.
    #[must_use]
    pub fn payload_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Encode an RGB frame as JPEG at the given quality (1-100).
///
/// # Errors
///
/// Returns an error if the encoder rejects the frame.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<CapturedImage> {
    let mut bytes = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
        encoder.encode_image(frame)?;
    }
    Ok(CapturedImage::new(
        bytes,
        ImageEncoding::Jpeg,
        frame.width(),
        frame.height(),
    ))
}

/// Requested frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl From<&CameraConfig> for Resolution {
    fn from(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
        }
    }
}

/// A source of video streams.
pub trait Camera: Send {
    /// The name of this camera (for logging).
    fn name(&self) -> &'static str;

    /// Acquire the device and start streaming.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened.
    fn open(&mut self, resolution: Resolution) -> Result<Box<dyn VideoStream>>;
}

/// An open camera stream.
pub trait VideoStream: Send {
    /// Read the current frame.
    ///
    /// # Errors
    ///
    /// Returns an error if no frame is available.
    fn grab_frame(&mut self) -> Result<RgbImage>;

    /// Release the device.
    fn stop(&mut self);
}

/// Owns an open stream and stops it when dropped.
struct LiveStream {
    inner: Box<dyn VideoStream>,
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

enum Phase {
    Idle,
    Live(LiveStream),
    Captured(LiveStream, CapturedImage),
}

/// Observable capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// Camera off.
    Idle,
    /// Camera streaming, no still held.
    Live,
    /// Still held, feed hidden.
    Captured,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Live => write!(f, "live"),
            Self::Captured => write!(f, "captured"),
        }
    }
}

/// Drives a [`Camera`] through the capture states.
pub struct CaptureController {
    camera: Box<dyn Camera>,
    resolution: Resolution,
    phase: Phase,
}

impl fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureController")
            .field("camera", &self.camera.name())
            .field("resolution", &self.resolution)
            .field("state", &self.state())
            .finish()
    }
}

impl CaptureController {
    /// Create an idle controller for the given camera.
    #[must_use]
    pub fn new(camera: Box<dyn Camera>, resolution: Resolution) -> Self {
        Self {
            camera,
            resolution,
            phase: Phase::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CaptureState {
        match self.phase {
            Phase::Idle => CaptureState::Idle,
            Phase::Live(_) => CaptureState::Live,
            Phase::Captured(..) => CaptureState::Captured,
        }
    }

    /// The held still, if any.
    #[must_use]
    pub fn image(&self) -> Option<&CapturedImage> {
        match &self.phase {
            Phase::Captured(_, image) => Some(image),
            _ => None,
        }
    }

    /// Go live. A held still is discarded; an open stream is reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the camera cannot be opened; the controller stays Idle.
    pub fn start(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => {
                let inner = self.camera.open(self.resolution)?;
                info!(camera = self.camera.name(), "camera started");
                self.phase = Phase::Live(LiveStream { inner });
            }
            Phase::Live(stream) | Phase::Captured(stream, _) => {
                self.phase = Phase::Live(stream);
            }
        }
        Ok(())
    }

    /// Take a still from the live stream.
    ///
    /// Does nothing unless Live. On failure the controller stays Live.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be read or encoded.
    pub fn capture(&mut self, jpeg_quality: u8) -> Result<Option<&CapturedImage>> {
        if !matches!(self.phase, Phase::Live(_)) {
            debug!(state = %self.state(), "capture ignored: no live stream");
            return Ok(None);
        }
        let frame = match &mut self.phase {
            Phase::Live(stream) => stream.inner.grab_frame()?,
            _ => return Ok(None),
        };
        let image = encode_jpeg(&frame, jpeg_quality)?;
        debug!(bytes = image.bytes().len(), "still captured");
        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Live(stream) => Phase::Captured(stream, image),
            other => other,
        };
        Ok(self.image())
    }

    /// Discard the held still and return to Live.
    pub fn retake(&mut self) {
        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Captured(stream, _) => Phase::Live(stream),
            other => other,
        };
    }

    /// Stop the camera and discard any held still.
    pub fn cancel(&mut self) {
        if !matches!(self.phase, Phase::Idle) {
            info!(camera = self.camera.name(), "camera stopped");
        }
        // Dropping the stream guard stops the device.
        self.phase = Phase::Idle;
    }

    /// Stop the current camera and switch to another. The controller is left Idle.
    pub fn replace_camera(&mut self, camera: Box<dyn Camera>) {
        self.cancel();
        debug!(from = self.camera.name(), to = camera.name(), "camera replaced");
        self.camera = camera;
    }
}

enum StillSource {
    File(PathBuf),
    Image(DynamicImage),
}

/// A camera that streams a fixed still image, read from a file or memory.
pub struct StillImageCamera {
    source: StillSource,
}

impl fmt::Debug for StillImageCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            StillSource::File(path) => path.display().to_string(),
            StillSource::Image(image) => format!("{}x{} image", image.width(), image.height()),
        };
        f.debug_struct("StillImageCamera")
            .field("source", &source)
            .finish()
    }
}

impl StillImageCamera {
    /// Stream the image at `path`; the file is read when the camera opens.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: StillSource::File(path.into()),
        }
    }

    /// Stream an in-memory image.
    #[must_use]
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            source: StillSource::Image(image),
        }
    }
}

impl Camera for StillImageCamera {
    fn name(&self) -> &'static str {
        "still-image"
    }

    fn open(&mut self, resolution: Resolution) -> Result<Box<dyn VideoStream>> {
        let image = match &self.source {
            StillSource::File(path) => image::open(path).map_err(|e| {
                Error::camera_unavailable(self.name(), format!("{}: {e}", path.display()))
            })?,
            StillSource::Image(image) => image.clone(),
        };
        let frame = image
            .resize(resolution.width, resolution.height, FilterType::Triangle)
            .to_rgb8();
        debug!(
            width = frame.width(),
            height = frame.height(),
            "still image stream opened"
        );
        Ok(Box::new(StillStream {
            frame,
            running: true,
        }))
    }
}

struct StillStream {
    frame: RgbImage,
    running: bool,
}

impl VideoStream for StillStream {
    fn grab_frame(&mut self) -> Result<RgbImage> {
        if !self.running {
            return Err(Error::camera_frame("stream stopped"));
        }
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        self.running = false;
    }
}
