// SPDX-License-Identifier: MPL-2.0

//! Per-camera MJPEG publisher
//!
//! Wraps a [`tokio::sync::watch`] channel so every subscriber always sees
//! only the most recently published frame — the "drop oldest, keep
//! latest" backpressure policy the rest of the pipeline's channels use,
//! applied here without a manual buffer since `watch` already holds
//! exactly one value. JPEG encoding only happens when at least one
//! subscriber is attached, so an unwatched camera does no encode work.

use crate::backends::camera::CameraFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct PublishedFrame {
    pub jpeg: Arc<Vec<u8>>,
    pub captured_at: Instant,
    pub is_placeholder: bool,
}

pub struct MjpegPublisher {
    camera_id: String,
    width: u32,
    height: u32,
    sender: watch::Sender<Option<PublishedFrame>>,
    subscriber_count: Arc<AtomicU64>,
}

impl MjpegPublisher {
    pub fn new(camera_id: String, width: u32, height: u32) -> Self {
        let (sender, _) = watch::channel(None);
        Self { camera_id, width, height, sender, subscriber_count: Arc::new(AtomicU64::new(0)) }
    }

    pub fn subscriber_count(&self) -> u64 {
        self.subscriber_count.load(Ordering::Relaxed)
    }

    /// Register a new subscriber. The returned handle decrements the
    /// publisher's subscriber count when dropped.
    pub fn subscribe(&self) -> MjpegSubscription {
        self.subscriber_count.fetch_add(1, Ordering::Relaxed);
        MjpegSubscription { receiver: self.sender.subscribe(), count: Arc::clone(&self.subscriber_count) }
    }

    /// Encode and publish a captured frame, skipping encode work entirely
    /// if nobody is currently subscribed.
    pub fn publish(&self, frame: &CameraFrame) {
        if self.subscriber_count() == 0 {
            return;
        }

        let Some(rgb) = frame.to_rgb24() else {
            warn!(camera = %self.camera_id, "frame could not be converted to RGB24 for MJPEG publish");
            return;
        };

        match encode_jpeg(&rgb, frame.width, frame.height) {
            Ok(jpeg) => {
                let _ = self.sender.send(Some(PublishedFrame {
                    jpeg: Arc::new(jpeg),
                    captured_at: frame.captured_at,
                    is_placeholder: false,
                }));
            }
            Err(e) => warn!(camera = %self.camera_id, error = %e, "jpeg encode failed"),
        }
    }

    /// Publish a synthesized "no signal" placeholder frame. Called by the
    /// pipeline at `placeholder_hz` while the camera has nothing to show.
    pub fn publish_placeholder(&self) {
        if self.subscriber_count() == 0 {
            return;
        }
        let rgb = placeholder_rgb(self.width, self.height);
        if let Ok(jpeg) = encode_jpeg(&rgb, self.width, self.height) {
            let _ = self.sender.send(Some(PublishedFrame {
                jpeg: Arc::new(jpeg),
                captured_at: Instant::now(),
                is_placeholder: true,
            }));
        }
    }
}

pub struct MjpegSubscription {
    receiver: watch::Receiver<Option<PublishedFrame>>,
    count: Arc<AtomicU64>,
}

impl MjpegSubscription {
    /// Wait for the next published frame, or return the current one
    /// immediately if it hasn't been seen yet.
    pub async fn next_frame(&mut self) -> Option<PublishedFrame> {
        if self.receiver.changed().await.is_err() {
            return None;
        }
        self.receiver.borrow().clone()
    }

    pub fn latest(&self) -> Option<PublishedFrame> {
        self.receiver.borrow().clone()
    }
}

impl Drop for MjpegSubscription {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
        debug!("mjpeg subscriber detached");
    }
}

fn encode_jpeg(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, image::ImageError> {
    use image::ImageEncoder;
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
    encoder.write_image(rgb, width, height, image::ExtendedColorType::Rgb8)?;
    Ok(buf)
}

fn placeholder_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut buf = vec![0u8; (width * height * 3) as usize];
    for px in buf.chunks_mut(3) {
        px[0] = 48;
        px[1] = 48;
        px[2] = 56;
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{FrameData, PixelFormat};

    fn test_frame(width: u32, height: u32) -> CameraFrame {
        CameraFrame {
            width,
            height,
            data: FrameData::from_slice(&vec![128u8; (width * height * 3) as usize]),
            format: PixelFormat::Rgb24,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_no_subscribers_skips_encode() {
        let publisher = MjpegPublisher::new("cam-a".to_string(), 16, 16);
        publisher.publish(&test_frame(16, 16));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_frame() {
        let publisher = MjpegPublisher::new("cam-a".to_string(), 16, 16);
        let mut subscription = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish(&test_frame(16, 16));
        let frame = subscription.next_frame().await.unwrap();
        assert!(!frame.is_placeholder);
        assert!(!frame.jpeg.is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_drop_decrements_count() {
        let publisher = MjpegPublisher::new("cam-a".to_string(), 16, 16);
        let subscription = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_placeholder_published_when_subscribed() {
        let publisher = MjpegPublisher::new("cam-a".to_string(), 8, 8);
        let mut subscription = publisher.subscribe();
        publisher.publish_placeholder();
        let frame = subscription.next_frame().await.unwrap();
        assert!(frame.is_placeholder);
    }
}
