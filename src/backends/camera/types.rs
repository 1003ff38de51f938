// SPDX-License-Identifier: MPL-2.0
// Shared types for capture backend abstraction

//! Shared types for capture backends

use std::sync::Arc;
use std::time::Instant;

/// Frame data storage: pre-copied bytes, shared cheaply between the
/// capture thread and downstream pipeline stages.
#[derive(Clone)]
pub struct FrameData(pub Arc<[u8]>);

impl FrameData {
    pub fn from_slice(data: &[u8]) -> Self {
        Self(Arc::from(data))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameData({} bytes)", self.0.len())
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Pixel format of a captured frame
///
/// Covers the formats actually produced by `v4l2src`/`rtspsrc` appsink
/// pipelines and the stub backend. Every variant has a conversion to
/// packed RGB24 in [`super::format_converters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit RGB with alpha
    Rgba,
    /// 32-bit BGR with alpha (common GStreamer videoconvert output)
    Bgra,
    /// Planar 4:2:0 (Y, then U, then V)
    I420,
    /// Semi-planar 4:2:0 (Y, then interleaved UV)
    Nv12,
    /// Packed 4:2:2 (Y0 U Y1 V), the common raw webcam format
    Yuyv,
    /// 8-bit grayscale, single channel
    Gray8,
    /// 24-bit packed RGB, no alpha
    Rgb24,
    /// Already-encoded JPEG bytes (MJPEG sources); decoded via the `image`
    /// crate rather than through `format_converters`
    Mjpeg,
}

impl PixelFormat {
    pub fn from_gst_format(format: &str) -> Option<Self> {
        match format {
            "RGBA" | "RGBx" => Some(Self::Rgba),
            "BGRA" | "BGRx" => Some(Self::Bgra),
            "I420" | "YV12" => Some(Self::I420),
            "NV12" => Some(Self::Nv12),
            "YUY2" | "YUYV" => Some(Self::Yuyv),
            "GRAY8" | "Y8" => Some(Self::Gray8),
            "RGB" => Some(Self::Rgb24),
            "JPEG" | "MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }

    pub fn to_gst_format_string(self) -> &'static str {
        match self {
            Self::Rgba => "RGBA",
            Self::Bgra => "BGRA",
            Self::I420 => "I420",
            Self::Nv12 => "NV12",
            Self::Yuyv => "YUY2",
            Self::Gray8 => "GRAY8",
            Self::Rgb24 => "RGB",
            Self::Mjpeg => "JPEG",
        }
    }
}

/// A single frame pulled from a capture backend
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: FrameData,
    pub format: PixelFormat,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Decode to packed RGB24, the canonical format for detection/embedding
    /// and for re-encoding onto the MJPEG publisher.
    pub fn to_rgb24(&self) -> Option<Vec<u8>> {
        if self.format == PixelFormat::Mjpeg {
            let img = image::load_from_memory(&self.data).ok()?;
            return Some(img.to_rgb8().into_raw());
        }
        super::format_converters::to_rgb24(&self.data, self.width, self.height, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_roundtrip() {
        for (gst, fmt) in [
            ("RGBA", PixelFormat::Rgba),
            ("I420", PixelFormat::I420),
            ("NV12", PixelFormat::Nv12),
            ("YUY2", PixelFormat::Yuyv),
        ] {
            assert_eq!(PixelFormat::from_gst_format(gst), Some(fmt));
            assert_eq!(fmt.to_gst_format_string(), gst);
        }
    }

    #[test]
    fn test_frame_data_deref() {
        let frame = FrameData::from_slice(&[1, 2, 3]);
        assert_eq!(&*frame, &[1, 2, 3]);
        assert_eq!(frame.len(), 3);
    }
}
