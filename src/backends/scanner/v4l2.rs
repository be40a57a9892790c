// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera scanner
//!
//! Opens a capture node, negotiates a small format and decodes a frame every
//! `frame_interval` on a dedicated capture thread.

use super::decoder::{LumaFrame, QrDecoder};
use crate::backends::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::{
    BackendError, BackendResult, CameraDevice, CodeBatch, CodeStream, ScanApi, ScanOptions,
};
use crate::constants::scan::{
    BATCH_CHANNEL_CAPACITY, CAPTURE_BUFFERS, CAPTURE_HEIGHT, CAPTURE_WIDTH,
};
use futures::channel::mpsc;
use std::io;
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Consecutive capture failures before the device is considered gone
const MAX_CAPTURE_ERRORS: u32 = 30;

/// Scanner backed by a Video4Linux2 capture device
#[derive(Debug, Default)]
pub struct V4l2Scanner;

impl V4l2Scanner {
    pub fn new() -> Self {
        Self
    }
}

/// Pixel layouts the capture loop can turn into luma
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameLayout {
    Yuyv,
    Grey,
    Mjpeg,
}

impl FrameLayout {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"GREY" => Some(Self::Grey),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }

    fn fourcc(&self) -> FourCC {
        match self {
            Self::Yuyv => FourCC::new(b"YUYV"),
            Self::Grey => FourCC::new(b"GREY"),
            Self::Mjpeg => FourCC::new(b"MJPG"),
        }
    }
}

/// Negotiate a capture format, trying YUYV first
fn configure(dev: &Device) -> io::Result<(Format, FrameLayout)> {
    let mut last_err = None;
    for layout in [FrameLayout::Yuyv, FrameLayout::Grey, FrameLayout::Mjpeg] {
        let wanted = Format::new(CAPTURE_WIDTH, CAPTURE_HEIGHT, layout.fourcc());
        match dev.set_format(&wanted) {
            // Drivers may silently substitute another fourcc
            Ok(actual) => match FrameLayout::from_fourcc(actual.fourcc) {
                Some(actual_layout) => return Ok((actual, actual_layout)),
                None => debug!(fourcc = %actual.fourcc, "Driver substituted unsupported format"),
            },
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("no supported pixel format")))
}

fn to_luma(buf: &[u8], format: &Format, layout: FrameLayout) -> Option<LumaFrame> {
    match layout {
        FrameLayout::Yuyv => Some(LumaFrame::from_yuyv(
            buf,
            format.width,
            format.height,
            format.stride,
        )),
        FrameLayout::Grey => Some(LumaFrame::from_grey(
            buf,
            format.width,
            format.height,
            format.stride,
        )),
        FrameLayout::Mjpeg => match LumaFrame::from_encoded(buf) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!(error = %e, "Dropping undecodable MJPEG frame");
                None
            }
        },
    }
}

/// State owned by the capture thread
struct CaptureState {
    stream: Stream<'static>,
    format: Format,
    layout: FrameLayout,
    sender: mpsc::Sender<CodeBatch>,
    last_decode: Option<Instant>,
    errors: u32,
}

impl ScanApi for V4l2Scanner {
    fn devices(&self) -> Vec<CameraDevice> {
        v4l::context::enum_devices()
            .into_iter()
            .filter_map(|node| {
                let path = node.path().to_string_lossy().to_string();
                let dev = Device::with_path(node.path()).ok()?;
                let caps = dev.query_caps().ok()?;
                if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                    return None;
                }
                let name = node.name().unwrap_or(caps.card);
                Some(CameraDevice::new(name, path))
            })
            .collect()
    }

    fn open_stream(
        &mut self,
        device: &CameraDevice,
        options: &ScanOptions,
    ) -> BackendResult<CodeStream> {
        let dev = Device::with_path(&device.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BackendError::DeviceNotFound(device.path.clone()),
            io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(e.to_string()),
            _ => BackendError::IoError(e.to_string()),
        })?;
        let (format, layout) = configure(&dev)?;

        info!(
            path = %device.path,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "V4L2 scan format configured"
        );

        let (sender, receiver) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
        let options = options.clone();
        let decoder = QrDecoder::new();

        let controller = CaptureLoopController::start_with_init(
            "v4l2-scan",
            move || {
                let stream = Stream::with_buffers(&dev, Type::VideoCapture, CAPTURE_BUFFERS)
                    .map_err(|e| format!("Failed to create stream: {}", e))?;
                Ok(CaptureState {
                    stream,
                    format,
                    layout,
                    sender,
                    last_decode: None,
                    errors: 0,
                })
            },
            move |state: &mut CaptureState, _stop| {
                let buf = match state.stream.next() {
                    Ok((buf, _meta)) => {
                        state.errors = 0;
                        buf
                    }
                    Err(e) => {
                        state.errors += 1;
                        warn!(error = %e, errors = state.errors, "Failed to capture frame");
                        return if state.errors >= MAX_CAPTURE_ERRORS {
                            LoopAction::Stop
                        } else {
                            LoopAction::Continue
                        };
                    }
                };

                // Keep dequeuing so the driver does not stall, decode at frame_interval
                if state
                    .last_decode
                    .is_some_and(|t| t.elapsed() < options.frame_interval)
                {
                    return LoopAction::Continue;
                }
                state.last_decode = Some(Instant::now());

                let Some(frame) = to_luma(buf, &state.format, state.layout) else {
                    return LoopAction::Continue;
                };
                let batch = decoder.decode_filtered(&frame, &options);
                if batch.is_empty() {
                    return LoopAction::Continue;
                }

                match state.sender.try_send(batch) {
                    Ok(()) => LoopAction::Continue,
                    Err(e) if e.is_disconnected() => LoopAction::Stop,
                    Err(_) => {
                        debug!("Batch channel full, dropping batch");
                        LoopAction::Continue
                    }
                }
            },
        );

        Ok(CodeStream::new(receiver, Box::new(controller)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_round_trips_fourcc() {
        for layout in [FrameLayout::Yuyv, FrameLayout::Grey, FrameLayout::Mjpeg] {
            assert_eq!(FrameLayout::from_fourcc(layout.fourcc()), Some(layout));
        }
        assert_eq!(FrameLayout::from_fourcc(FourCC::new(b"NV12")), None);
    }

    #[test]
    fn test_missing_device_is_reported() {
        let mut scanner = V4l2Scanner::new();
        let device = CameraDevice::new("Ghost", "/dev/video-does-not-exist");
        let err = scanner
            .open_stream(&device, &ScanOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::DeviceNotFound("/dev/video-does-not-exist".into())
        );
    }
}
