// SPDX-License-Identifier: MPL-2.0
#![allow(dead_code)]

//! Capture backend abstraction
//!
//! Every camera source (builtin, USB, RTSP, ONVIF, or the deterministic
//! stub) is driven through the same [`CaptureBackend`] trait, so
//! [`crate::pipeline::CameraPipeline`] never branches on source kind after
//! construction.
//!
//! ```text
//! ┌──────────────────────┐
//! │     CameraPipeline    │
//! └──────────┬────────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  CaptureBackend Trait │
//! └──────────┬────────────┘
//!            │
//!     ┌──────┴───────┐
//!     ▼              ▼
//! ┌────────┐   ┌────────────┐
//! │GStreamer│   │StubCapture │
//! └────────┘   └────────────┘
//! ```

pub mod format_converters;
pub mod frame_loop;
pub mod gstreamer_backend;
pub mod stub_backend;
pub mod types;
pub mod v4l2_utils;

pub use types::*;

use crate::config::{CameraDescriptor, SourceKind};
use crate::errors::CameraError;

/// A running handle to a camera's raw frame stream.
///
/// A backend is constructed, opened once, and then polled with
/// [`CaptureBackend::read_frame`] from a dedicated capture thread (see
/// [`frame_loop::CaptureLoopController`]) until the pipeline shuts the
/// camera down.
pub trait CaptureBackend: Send {
    /// Open the configured source. Called once before the first read.
    fn open(&mut self) -> Result<(), CameraError>;

    /// Block until the next frame is available or the read deadline elapses.
    fn read_frame(&mut self) -> Result<CameraFrame, CameraError>;

    /// Release any held resources. Idempotent.
    fn close(&mut self);
}

/// Construct the capture backend appropriate for a camera's configured
/// source kind.
pub fn backend_for(descriptor: &CameraDescriptor) -> Box<dyn CaptureBackend> {
    match &descriptor.source {
        SourceKind::Stub => Box::new(stub_backend::StubCaptureBackend::new(descriptor)),
        other => Box::new(gstreamer_backend::GstreamerCaptureBackend::new(
            descriptor.id.clone(),
            other.clone(),
            descriptor.width,
            descriptor.height,
            descriptor.fps,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_for_stub_descriptor() {
        let descriptor = CameraDescriptor::stub("cam-test");
        let mut backend = backend_for(&descriptor);
        backend.open().expect("stub backend always opens");
        let frame = backend.read_frame().expect("stub backend always yields a frame");
        assert_eq!(frame.width, descriptor.width);
        assert_eq!(frame.height, descriptor.height);
    }
}
