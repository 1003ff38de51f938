// SPDX-License-Identifier: MPL-2.0

//! Shared V4L2 utility functions
//!
//! Used by local-device discovery (`crate::discovery::local`) to probe
//! `/dev/videoN` capability without spinning up a full capture pipeline.

use std::os::unix::io::{AsRawFd, RawFd};
use tracing::debug;

/// VIDIOC_QUERYCAP ioctl number
const VIDIOC_QUERYCAP: libc::c_ulong = 0x80685600;

/// VIDIOC_G_FMT ioctl number, `V4L2_BUF_TYPE_VIDEO_CAPTURE` format
const VIDIOC_G_FMT: libc::c_ulong = 0xc0cc5604;

/// VIDIOC_G_PARM ioctl number, streaming parameters (frame interval)
const VIDIOC_G_PARM: libc::c_ulong = 0xc0cc5615;

const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;

/// V4L2 capability structure for VIDIOC_QUERYCAP ioctl
#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

/// `struct v4l2_pix_format`, the capture-relevant prefix of the
/// `fmt.pix` union member of `struct v4l2_format`.
#[repr(C)]
struct V4l2PixFormat {
    width: u32,
    height: u32,
    pixelformat: u32,
    field: u32,
    bytesperline: u32,
    sizeimage: u32,
    colorspace: u32,
}

/// `struct v4l2_format` truncated to the `type` tag plus the `pix` union
/// member we read; the union's remaining bytes are padding we never touch.
#[repr(C)]
struct V4l2Format {
    buf_type: u32,
    pix: V4l2PixFormat,
    _union_padding: [u8; 156],
}

/// `struct v4l2_fract`
#[repr(C)]
#[derive(Default)]
struct V4l2Fract {
    numerator: u32,
    denominator: u32,
}

/// `struct v4l2_captureparm`, the capture-relevant prefix of the
/// `parm.capture` union member of `struct v4l2_streamparm`.
#[repr(C)]
struct V4l2CaptureParm {
    capability: u32,
    capture_mode: u32,
    timeperframe: V4l2Fract,
}

#[repr(C)]
struct V4l2StreamParm {
    buf_type: u32,
    capture: V4l2CaptureParm,
    _union_padding: [u8; 168],
}

/// Capability summary for a local V4L2 device
#[derive(Debug, Clone)]
pub struct V4l2DeviceInfo {
    pub driver: String,
    pub card: String,
    pub path: String,
    /// `(width, height)` as currently configured on the device, when the
    /// `VIDIOC_G_FMT` query succeeds.
    pub resolution: Option<(u32, u32)>,
    /// Frames per second derived from `VIDIOC_G_PARM`'s frame interval,
    /// when available and non-zero.
    pub fps: Option<f32>,
}

/// Query V4L2 capabilities for an open file descriptor.
fn query_v4l2_cap(fd: RawFd) -> Option<V4l2Capability> {
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP as _, &mut cap as *mut V4l2Capability) };
    if result < 0 { None } else { Some(cap) }
}

fn query_v4l2_resolution(fd: RawFd) -> Option<(u32, u32)> {
    let mut fmt: V4l2Format = unsafe { std::mem::zeroed() };
    fmt.buf_type = V4L2_BUF_TYPE_VIDEO_CAPTURE;
    let result = unsafe { libc::ioctl(fd, VIDIOC_G_FMT as _, &mut fmt as *mut V4l2Format) };
    if result < 0 || fmt.pix.width == 0 || fmt.pix.height == 0 {
        return None;
    }
    Some((fmt.pix.width, fmt.pix.height))
}

fn query_v4l2_fps(fd: RawFd) -> Option<f32> {
    let mut parm: V4l2StreamParm = unsafe { std::mem::zeroed() };
    parm.buf_type = V4L2_BUF_TYPE_VIDEO_CAPTURE;
    let result = unsafe { libc::ioctl(fd, VIDIOC_G_PARM as _, &mut parm as *mut V4l2StreamParm) };
    if result < 0 || parm.capture.timeperframe.denominator == 0 || parm.capture.timeperframe.numerator == 0 {
        return None;
    }
    Some(parm.capture.timeperframe.denominator as f32 / parm.capture.timeperframe.numerator as f32)
}

fn cstr_field(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).to_string()
}

/// Probe `/dev/video{index}`, returning `None` if it does not exist or does
/// not answer `VIDIOC_QUERYCAP`. A device that answers `VIDIOC_QUERYCAP`
/// but not the follow-up format/param queries is still reported, just
/// without `resolution`/`fps` populated.
pub fn probe_local_device(index: u32) -> Option<V4l2DeviceInfo> {
    let path = format!("/dev/video{index}");
    let file = std::fs::File::open(&path).ok()?;
    let fd = file.as_raw_fd();
    let cap = query_v4l2_cap(fd)?;

    let info = V4l2DeviceInfo {
        driver: cstr_field(&cap.driver),
        card: cstr_field(&cap.card),
        path: path.clone(),
        resolution: query_v4l2_resolution(fd),
        fps: query_v4l2_fps(fd),
    };
    debug!(path = %path, driver = %info.driver, card = %info.card, resolution = ?info.resolution, fps = ?info.fps, "probed local V4L2 device");
    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cstr_field_stops_at_nul() {
        let mut buf = [0u8; 8];
        buf[..5].copy_from_slice(b"abcde");
        assert_eq!(cstr_field(&buf), "abcde");
    }

    #[test]
    fn test_probe_nonexistent_device_is_none() {
        assert!(probe_local_device(9_999).is_none());
    }
}
