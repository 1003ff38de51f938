// SPDX-License-Identifier: MPL-2.0

//! Deterministic synthetic capture backend
//!
//! Used by tests and by any [`crate::config::SourceKind::Stub`] camera
//! descriptor to exercise the full capture -> detect -> ... -> record
//! pipeline without hardware. Each frame is a moving gradient with a fixed
//! bright square ("face marker") whose position advances with the frame
//! counter, so a detector stub can find something consistent to report.

use super::types::{CameraFrame, FrameData, PixelFormat};
use super::CaptureBackend;
use crate::config::CameraDescriptor;
use crate::errors::CameraError;
use std::time::{Duration, Instant};

const MARKER_SIZE: u32 = 48;

pub struct StubCaptureBackend {
    width: u32,
    height: u32,
    frame_interval: Duration,
    frame_count: u64,
    opened: bool,
}

impl StubCaptureBackend {
    pub fn new(descriptor: &CameraDescriptor) -> Self {
        let fps = descriptor.fps.max(1);
        Self {
            width: descriptor.width,
            height: descriptor.height,
            frame_interval: Duration::from_millis(1000 / fps as u64),
            frame_count: 0,
            opened: false,
        }
    }

    /// Top-left corner of the synthetic face marker for a given frame index,
    /// sweeping left to right and wrapping.
    pub fn marker_position(&self, frame_count: u64) -> (u32, u32) {
        let max_x = self.width.saturating_sub(MARKER_SIZE).max(1);
        let step = (frame_count * 4) % (max_x as u64 * 2);
        let x = if step <= max_x as u64 {
            step as u32
        } else {
            (2 * max_x as u64 - step) as u32
        };
        let y = self.height.saturating_sub(MARKER_SIZE) / 2;
        (x, y)
    }

    fn render(&self, frame_count: u64) -> Vec<u8> {
        let (mx, my) = self.marker_position(frame_count);
        let mut buf = vec![0u8; (self.width * self.height * 3) as usize];
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = ((y * self.width + x) * 3) as usize;
                let gradient = (((x + frame_count as u32) % self.width) * 255 / self.width.max(1))
                    as u8;
                buf[idx] = gradient;
                buf[idx + 1] = (y * 255 / self.height.max(1)) as u8;
                buf[idx + 2] = 64;

                if x >= mx && x < mx + MARKER_SIZE && y >= my && y < my + MARKER_SIZE {
                    buf[idx] = 230;
                    buf[idx + 1] = 200;
                    buf[idx + 2] = 180;
                }
            }
        }
        buf
    }
}

impl CaptureBackend for StubCaptureBackend {
    fn open(&mut self) -> Result<(), CameraError> {
        self.opened = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<CameraFrame, CameraError> {
        if !self.opened {
            return Err(CameraError::Disconnected);
        }
        let data = self.render(self.frame_count);
        self.frame_count += 1;
        std::thread::sleep(self.frame_interval);
        Ok(CameraFrame {
            width: self.width,
            height: self.height,
            data: FrameData::from_slice(&data),
            format: PixelFormat::Rgb24,
            captured_at: Instant::now(),
        })
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_yields_requested_dimensions() {
        let mut descriptor = CameraDescriptor::stub("cam-a");
        descriptor.fps = 1000;
        let mut backend = StubCaptureBackend::new(&descriptor);
        backend.open().unwrap();
        let frame = backend.read_frame().unwrap();
        assert_eq!(frame.width, descriptor.width);
        assert_eq!(frame.height, descriptor.height);
        assert_eq!(frame.data.len(), (descriptor.width * descriptor.height * 3) as usize);
    }

    #[test]
    fn test_read_before_open_fails() {
        let descriptor = CameraDescriptor::stub("cam-a");
        let mut backend = StubCaptureBackend::new(&descriptor);
        assert!(backend.read_frame().is_err());
    }

    #[test]
    fn test_marker_sweeps_and_wraps() {
        let mut descriptor = CameraDescriptor::stub("cam-a");
        descriptor.width = 200;
        descriptor.height = 100;
        let backend = StubCaptureBackend::new(&descriptor);
        let (x0, _) = backend.marker_position(0);
        let (x_mid, _) = backend.marker_position(19);
        assert_ne!(x0, x_mid);
    }
}
