use crate::config::CameraConfig;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageBuffer, RgbImage};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture as V4lCapture;
use v4l::{Device, FourCC};

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Unable to access camera: {0}")]
    DeviceOpen(String),
    #[error("Failed to capture frame: {0}")]
    Capture(String),
    #[error("Frame conversion failed: {0}")]
    Conversion(String),
    #[error("JPEG encoding failed: {0}")]
    Encode(String),
    #[error("Invalid image data")]
    InvalidImage,
    #[error("Failed to read image: {0}")]
    Read(#[from] image::ImageError),
}

/// Something that can hand out a live video stream (a camera).
pub trait VideoSource {
    type Stream: VideoStream;

    fn acquire(&mut self) -> Result<Self::Stream, CaptureError>;
}

/// A live stream. Holding one keeps the device busy until `stop`.
pub trait VideoStream {
    /// Current frame size; (0, 0) until the device has produced a frame.
    fn dimensions(&self) -> (u32, u32);
    fn grab(&mut self) -> Result<RgbImage, CaptureError>;
    /// Release the device. Must be idempotent.
    fn stop(&mut self);
}

/// A captured face image, held as a JPEG data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    data_url: String,
}

impl CapturedImage {
    /// Downsample a frame and encode it as a JPEG data URL
    pub fn encode(
        frame: &RgbImage,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Self, CaptureError> {
        let resized = if frame.dimensions() == (width, height) {
            frame.clone()
        } else {
            log::debug!(
                "Downscaling frame: {}x{} → {}x{}",
                frame.width(),
                frame.height(),
                width,
                height
            );
            image::imageops::resize(frame, width, height, FilterType::Triangle)
        };

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality)
            .encode_image(&resized)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;

        Ok(Self {
            data_url: format!("{}{}", DATA_URL_PREFIX, B64.encode(&jpeg)),
        })
    }

    /// Load an image file, scale it to at most `max_width` keeping the
    /// aspect ratio, and re-encode it.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        max_width: u32,
        quality: u8,
    ) -> Result<Self, CaptureError> {
        let img = image::open(path.as_ref())?.to_rgb8();
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidImage);
        }

        let scale = (max_width as f64 / width as f64).min(1.0);
        let target_width = ((width as f64 * scale) as u32).max(1);
        let target_height = ((height as f64 * scale) as u32).max(1);

        log::info!(
            "Loaded {} ({}x{}), sending {}x{}",
            path.as_ref().display(),
            width,
            height,
            target_width,
            target_height
        );
        Self::encode(&img, target_width, target_height, quality)
    }

    /// Wrap an existing data URL (or bare base64 string)
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
        }
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// The base64 body with any `data:...;base64,` prefix stripped
    pub fn base64_payload(&self) -> Result<&str, CaptureError> {
        let payload = match self.data_url.split_once(',') {
            Some((_, body)) => body,
            None => self.data_url.as_str(),
        };
        if payload.is_empty() {
            return Err(CaptureError::InvalidImage);
        }
        Ok(payload)
    }

    pub fn len(&self) -> usize {
        self.data_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_url.is_empty()
    }
}

/// Output settings for a capture
#[derive(Debug, Clone, Copy)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

impl From<&CameraConfig> for CaptureSettings {
    fn from(config: &CameraConfig) -> Self {
        Self {
            width: config.capture_width,
            height: config.capture_height,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Streaming,
    Captured,
}

enum CaptureState<T> {
    Idle,
    Streaming(T),
    Captured(CapturedImage),
}

/// Camera capture flow: idle → streaming → captured.
///
/// The stream is stopped on every way out of the streaming state,
/// including drop.
pub struct CaptureFlow<S: VideoSource> {
    source: S,
    settings: CaptureSettings,
    state: CaptureState<S::Stream>,
}

impl<S: VideoSource> CaptureFlow<S> {
    pub fn new(source: S, settings: CaptureSettings) -> Self {
        Self {
            source,
            settings,
            state: CaptureState::Idle,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        match self.state {
            CaptureState::Idle => CapturePhase::Idle,
            CaptureState::Streaming(_) => CapturePhase::Streaming,
            CaptureState::Captured(_) => CapturePhase::Captured,
        }
    }

    /// Acquire the camera. On failure the state is left untouched.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if let CaptureState::Streaming(_) = self.state {
            return Ok(());
        }
        let stream = self.source.acquire()?;
        log::debug!("Camera streaming");
        self.state = CaptureState::Streaming(stream);
        Ok(())
    }

    /// Grab a frame and encode it. A stream that has no frame size yet
    /// makes this a no-op returning `None`.
    pub fn capture(&mut self) -> Result<Option<CapturedImage>, CaptureError> {
        let CaptureState::Streaming(stream) = &mut self.state else {
            return Ok(None);
        };

        let (width, height) = stream.dimensions();
        if width == 0 || height == 0 {
            log::debug!("Video not ready, ignoring capture");
            return Ok(None);
        }

        let frame = stream.grab()?;
        let image = CapturedImage::encode(
            &frame,
            self.settings.width,
            self.settings.height,
            self.settings.jpeg_quality,
        )?;
        stream.stop();

        log::info!("Captured image ({} bytes)", image.len());
        self.state = CaptureState::Captured(image.clone());
        Ok(Some(image))
    }

    /// Drop the captured image and go straight back to streaming
    pub fn retake(&mut self) -> Result<(), CaptureError> {
        self.release();
        self.start()
    }

    /// Stop streaming without capturing
    pub fn cancel(&mut self) {
        self.release();
    }

    pub fn image(&self) -> Option<&CapturedImage> {
        match &self.state {
            CaptureState::Captured(image) => Some(image),
            _ => None,
        }
    }

    fn release(&mut self) {
        if let CaptureState::Streaming(stream) = &mut self.state {
            stream.stop();
        }
        self.state = CaptureState::Idle;
    }
}

impl<S: VideoSource> Drop for CaptureFlow<S> {
    fn drop(&mut self) {
        if let CaptureState::Streaming(stream) = &mut self.state {
            stream.stop();
        }
    }
}

/// V4L2 camera
pub struct V4lCamera {
    config: CameraConfig,
}

impl V4lCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Enumerate available camera devices
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let mut devices = Vec::new();

        for entry in std::fs::read_dir("/dev")
            .map_err(|e| CaptureError::DeviceOpen(format!("Failed to read /dev: {}", e)))?
        {
            let entry = entry.map_err(|e| CaptureError::DeviceOpen(e.to_string()))?;
            let path = entry.path();

            let is_video = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("video"))
                .unwrap_or(false);
            if is_video {
                if let Some(path_str) = path.to_str() {
                    devices.push(path_str.to_string());
                }
            }
        }

        devices.sort();
        Ok(devices)
    }
}

impl VideoSource for V4lCamera {
    type Stream = V4lStream;

    fn acquire(&mut self) -> Result<V4lStream, CaptureError> {
        let device_path = &self.config.device;

        let device = Device::with_path(device_path)
            .map_err(|e| CaptureError::DeviceOpen(format!("{}: {}", device_path, e)))?;

        let mut format = device
            .format()
            .map_err(|e| CaptureError::DeviceOpen(format!("Failed to get format: {}", e)))?;
        format.width = self.config.width;
        format.height = self.config.height;

        // Prefer MJPEG if available, fallback to YUYV
        for fourcc in [FourCC::new(b"MJPG"), FourCC::new(b"YUYV")] {
            format.fourcc = fourcc;
            if device.set_format(&format).is_ok() {
                break;
            }
        }

        let actual = device
            .format()
            .map_err(|e| CaptureError::DeviceOpen(format!("Failed to verify format: {}", e)))?;

        log::info!(
            "Camera opened: {} {}x{} {}",
            device_path,
            actual.width,
            actual.height,
            actual.fourcc
        );

        Ok(V4lStream {
            device: Some(device),
            width: actual.width,
            height: actual.height,
            format: actual.fourcc,
        })
    }
}

pub struct V4lStream {
    device: Option<Device>,
    width: u32,
    height: u32,
    format: FourCC,
}

impl VideoStream for V4lStream {
    fn dimensions(&self) -> (u32, u32) {
        match self.device {
            Some(_) => (self.width, self.height),
            None => (0, 0),
        }
    }

    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| CaptureError::Capture("camera already stopped".to_string()))?;

        let mut stream = MmapStream::with_buffers(device, BufType::VideoCapture, 4)
            .map_err(|e| CaptureError::Capture(format!("Failed to create stream: {}", e)))?;

        let (buf, _meta) = stream
            .next()
            .map_err(|e| CaptureError::Capture(format!("Failed to capture frame: {}", e)))?;

        match self.format.str() {
            Ok("MJPG") => decode_mjpeg(buf),
            Ok("YUYV") => decode_yuyv(buf, self.width, self.height),
            _ => Err(CaptureError::Conversion(format!(
                "Unsupported pixel format: {}",
                self.format
            ))),
        }
    }

    fn stop(&mut self) {
        if self.device.take().is_some() {
            log::debug!("Camera released");
        }
    }
}

/// Decode MJPEG frame to RGB
fn decode_mjpeg(data: &[u8]) -> Result<RgbImage, CaptureError> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| CaptureError::Conversion(format!("MJPEG decode failed: {}", e)))?;
    Ok(img.to_rgb8())
}

/// Decode YUYV 4:2:2 (Y0 U Y1 V per pixel pair) to RGB
fn decode_yuyv(data: &[u8], width: u32, height: u32) -> Result<RgbImage, CaptureError> {
    let (w, h) = (width as usize, height as usize);
    if data.len() < w * h * 2 {
        return Err(CaptureError::Conversion("YUYV buffer too small".to_string()));
    }

    let mut rgb = Vec::with_capacity(w * h * 3);
    for chunk in data[..w * h * 2].chunks_exact(4) {
        let u = chunk[1] as i32 - 128;
        let v = chunk[3] as i32 - 128;
        for y in [chunk[0] as i32, chunk[2] as i32] {
            rgb.push((y + ((1436 * v) >> 10)).clamp(0, 255) as u8);
            rgb.push((y - ((354 * u + 732 * v) >> 10)).clamp(0, 255) as u8);
            rgb.push((y + ((1814 * u) >> 10)).clamp(0, 255) as u8);
        }
    }

    ImageBuffer::from_raw(width, height, rgb)
        .ok_or_else(|| CaptureError::Conversion("Failed to create RGB image".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Events = Rc<RefCell<Vec<&'static str>>>;

    struct FakeCamera {
        events: Events,
        dimensions: (u32, u32),
        fail_acquire: bool,
    }

    struct FakeStream {
        events: Events,
        dimensions: (u32, u32),
        stopped: bool,
    }

    impl VideoSource for FakeCamera {
        type Stream = FakeStream;

        fn acquire(&mut self) -> Result<FakeStream, CaptureError> {
            if self.fail_acquire {
                return Err(CaptureError::DeviceOpen("permission denied".to_string()));
            }
            self.events.borrow_mut().push("acquire");
            Ok(FakeStream {
                events: Rc::clone(&self.events),
                dimensions: self.dimensions,
                stopped: false,
            })
        }
    }

    impl VideoStream for FakeStream {
        fn dimensions(&self) -> (u32, u32) {
            self.dimensions
        }

        fn grab(&mut self) -> Result<RgbImage, CaptureError> {
            let (w, h) = self.dimensions;
            Ok(RgbImage::from_pixel(w, h, Rgb([120, 90, 60])))
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.events.borrow_mut().push("stop");
            }
        }
    }

    fn settings() -> CaptureSettings {
        CaptureSettings {
            width: 320,
            height: 240,
            jpeg_quality: 70,
        }
    }

    fn camera(dimensions: (u32, u32)) -> (FakeCamera, Events) {
        let events: Events = Rc::new(RefCell::new(Vec::new()));
        let cam = FakeCamera {
            events: Rc::clone(&events),
            dimensions,
            fail_acquire: false,
        };
        (cam, events)
    }

    #[test]
    fn test_capture_releases_stream() {
        let (cam, events) = camera((640, 480));
        let mut flow = CaptureFlow::new(cam, settings());

        flow.start().unwrap();
        assert_eq!(flow.phase(), CapturePhase::Streaming);

        let image = flow.capture().unwrap().expect("image");
        assert!(image.data_url().starts_with("data:image/jpeg;base64,"));
        assert_eq!(flow.phase(), CapturePhase::Captured);
        assert_eq!(*events.borrow(), vec!["acquire", "stop"]);

        let payload = image.base64_payload().unwrap();
        let jpeg = B64.decode(payload).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
    }

    #[test]
    fn test_capture_without_dimensions_is_noop() {
        let (cam, events) = camera((0, 0));
        let mut flow = CaptureFlow::new(cam, settings());
        flow.start().unwrap();

        assert!(flow.capture().unwrap().is_none());
        assert_eq!(flow.phase(), CapturePhase::Streaming);
        assert!(flow.image().is_none());
        assert_eq!(*events.borrow(), vec!["acquire"]);
    }

    #[test]
    fn test_capture_while_idle_is_noop() {
        let (cam, _events) = camera((640, 480));
        let mut flow = CaptureFlow::new(cam, settings());
        assert!(flow.capture().unwrap().is_none());
        assert_eq!(flow.phase(), CapturePhase::Idle);
    }

    #[test]
    fn test_failed_acquire_keeps_idle() {
        let (mut cam, _events) = camera((640, 480));
        cam.fail_acquire = true;
        let mut flow = CaptureFlow::new(cam, settings());

        let err = flow.start().unwrap_err();
        assert!(err.to_string().contains("Unable to access camera"));
        assert_eq!(flow.phase(), CapturePhase::Idle);
    }

    #[test]
    fn test_retake_goes_back_to_streaming() {
        let (cam, events) = camera((640, 480));
        let mut flow = CaptureFlow::new(cam, settings());
        flow.start().unwrap();
        flow.capture().unwrap();

        flow.retake().unwrap();
        assert_eq!(flow.phase(), CapturePhase::Streaming);
        assert!(flow.image().is_none());
        assert_eq!(*events.borrow(), vec!["acquire", "stop", "acquire"]);
    }

    #[test]
    fn test_cancel_and_drop_stop_stream() {
        let (cam, events) = camera((640, 480));
        let mut flow = CaptureFlow::new(cam, settings());
        flow.start().unwrap();
        flow.cancel();
        assert_eq!(flow.phase(), CapturePhase::Idle);
        assert_eq!(*events.borrow(), vec!["acquire", "stop"]);

        flow.start().unwrap();
        drop(flow);
        assert_eq!(*events.borrow(), vec!["acquire", "stop", "acquire", "stop"]);
    }

    #[test]
    fn test_base64_payload() {
        let image = CapturedImage::from_data_url("data:image/jpeg;base64,QUJD");
        assert_eq!(image.base64_payload().unwrap(), "QUJD");

        let bare = CapturedImage::from_data_url("QUJD");
        assert_eq!(bare.base64_payload().unwrap(), "QUJD");

        let empty = CapturedImage::from_data_url("data:image/jpeg;base64,");
        assert!(matches!(empty.base64_payload(), Err(CaptureError::InvalidImage)));
    }

    #[test]
    fn test_from_file_scales_down_only() {
        let dir = tempfile::tempdir().unwrap();

        let wide = dir.path().join("wide.png");
        RgbImage::from_pixel(800, 600, Rgb([10, 20, 30])).save(&wide).unwrap();
        let image = CapturedImage::from_file(&wide, 400, 70).unwrap();
        let jpeg = B64.decode(image.base64_payload().unwrap()).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 300));

        let small = dir.path().join("small.png");
        RgbImage::from_pixel(200, 100, Rgb([10, 20, 30])).save(&small).unwrap();
        let image = CapturedImage::from_file(&small, 400, 70).unwrap();
        let jpeg = B64.decode(image.base64_payload().unwrap()).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
    }

    #[test]
    fn test_decode_yuyv_gray() {
        // Y=128, U=V=128 is mid gray
        let data = vec![128u8; 4 * 2 * 2];
        let rgb = decode_yuyv(&data, 4, 2).unwrap();
        assert_eq!(rgb.dimensions(), (4, 2));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([128, 128, 128]));

        assert!(decode_yuyv(&data[..4], 4, 2).is_err());
    }

    #[test]
    #[ignore] // Requires actual camera hardware
    fn test_v4l_capture() {
        let config = crate::config::Config::default().camera;
        let mut flow = CaptureFlow::new(V4lCamera::new(&config), (&config).into());
        flow.start().expect("Failed to open camera");
        let image = flow.capture().expect("Failed to capture").expect("no frame");
        assert!(!image.is_empty());
    }
}
