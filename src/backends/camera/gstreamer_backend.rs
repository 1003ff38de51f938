// SPDX-License-Identifier: MPL-2.0

//! GStreamer-backed capture for real camera sources
//!
//! Builds a `v4l2src`/`rtspsrc` -> `decodebin` -> `videoconvert` ->
//! `appsink` pipeline and pulls decoded RGB24 frames off the appsink with a
//! blocking, timed `pull_sample`. `decodebin` autoplugs hardware decoders
//! when the GStreamer install has them, so this backend does not hand-roll
//! a decoder-selection matrix.

use super::types::{CameraFrame, FrameData, PixelFormat};
use super::CaptureBackend;
use crate::config::SourceKind;
use crate::errors::CameraError;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PULL_TIMEOUT: gstreamer::ClockTime = gstreamer::ClockTime::from_seconds(2);
const STATE_CHANGE_TIMEOUT: gstreamer::ClockTime = gstreamer::ClockTime::from_seconds(5);

pub struct GstreamerCaptureBackend {
    camera_id: String,
    source: SourceKind,
    width: u32,
    height: u32,
    fps: u32,
    pipeline: Option<gstreamer::Pipeline>,
    appsink: Option<AppSink>,
}

impl GstreamerCaptureBackend {
    pub fn new(camera_id: String, source: SourceKind, width: u32, height: u32, fps: u32) -> Self {
        Self {
            camera_id,
            source,
            width,
            height,
            fps,
            pipeline: None,
            appsink: None,
        }
    }

    fn source_element(&self) -> Result<String, CameraError> {
        match &self.source {
            SourceKind::Builtin { index } | SourceKind::Usb { index } => {
                Ok(format!("v4l2src device=/dev/video{index}"))
            }
            SourceKind::Rtsp { url, .. } | SourceKind::Onvif { endpoint: url, .. } => {
                Ok(format!("rtspsrc location={url} latency=100"))
            }
            SourceKind::Stub => Err(CameraError::Open(
                "stub source routed to gstreamer backend".to_string(),
            )),
        }
    }

    fn build_pipeline_string(&self) -> Result<String, CameraError> {
        let source = self.source_element()?;
        Ok(format!(
            "{source} ! decodebin ! videoconvert ! video/x-raw,format=RGB,width={},height={} ! \
             queue max-size-buffers=2 leaky=downstream ! appsink name=sink sync=false max-buffers=2 drop=true",
            self.width, self.height
        ))
    }
}

impl CaptureBackend for GstreamerCaptureBackend {
    fn open(&mut self) -> Result<(), CameraError> {
        gstreamer::init().map_err(|e| CameraError::Open(e.to_string()))?;

        let pipeline_str = self.build_pipeline_string()?;
        info!(camera = %self.camera_id, pipeline = %pipeline_str, "launching capture pipeline");

        let element = gstreamer::parse::launch(&pipeline_str)
            .map_err(|e| CameraError::Open(format!("failed to parse pipeline: {e}")))?;
        let pipeline = element
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| CameraError::Open("pipeline cast failed".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Open("appsink element missing".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| CameraError::Open("appsink cast failed".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::Open(format!("failed to start pipeline: {e}")))?;

        let (result, state, _pending) = pipeline.state(STATE_CHANGE_TIMEOUT);
        if result.is_err() && state != gstreamer::State::Playing {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CameraError::Open(format!(
                "pipeline did not reach PLAYING (state: {state:?})"
            )));
        }

        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<CameraFrame, CameraError> {
        let appsink = self.appsink.as_ref().ok_or(CameraError::Disconnected)?;

        let sample = appsink
            .try_pull_sample(PULL_TIMEOUT)
            .ok_or(CameraError::ReadTimeout)?;

        let buffer = sample.buffer().ok_or(CameraError::Disconnected)?;
        let caps = sample
            .caps()
            .ok_or_else(|| CameraError::InvalidFormat("sample missing caps".to_string()))?;
        let video_info = VideoInfo::from_caps(caps)
            .map_err(|e| CameraError::InvalidFormat(e.to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::InvalidFormat(e.to_string()))?;

        Ok(CameraFrame {
            width: video_info.width(),
            height: video_info.height(),
            data: FrameData::from_slice(map.as_slice()),
            format: PixelFormat::Rgb24,
            captured_at: Instant::now(),
        })
    }

    fn close(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            debug!(camera = %self.camera_id, "stopping capture pipeline");
            let _ = pipeline.set_state(gstreamer::State::Null);
            let _ = pipeline.state(Duration::from_secs(2).into());
        }
        self.appsink = None;
    }
}

impl Drop for GstreamerCaptureBackend {
    fn drop(&mut self) {
        if self.pipeline.is_some() {
            warn!(camera = %self.camera_id, "capture backend dropped without close()");
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_element_for_usb() {
        let backend =
            GstreamerCaptureBackend::new("cam-1".into(), SourceKind::Usb { index: 2 }, 640, 480, 30);
        assert_eq!(backend.source_element().unwrap(), "v4l2src device=/dev/video2");
    }

    #[test]
    fn test_source_element_for_rtsp() {
        let backend = GstreamerCaptureBackend::new(
            "cam-1".into(),
            SourceKind::Rtsp {
                url: "rtsp://example/stream".into(),
                username: None,
                password: None,
            },
            640,
            480,
            30,
        );
        assert_eq!(
            backend.source_element().unwrap(),
            "rtspsrc location=rtsp://example/stream latency=100"
        );
    }

    #[test]
    fn test_source_element_rejects_stub() {
        let backend =
            GstreamerCaptureBackend::new("cam-1".into(), SourceKind::Stub, 640, 480, 30);
        assert!(backend.source_element().is_err());
    }
}
