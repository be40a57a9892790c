// SPDX-License-Identifier: GPL-3.0-only

//! Still images as camera frames
//!
//! Each configured file is decoded once, in order, as if it were the next
//! frame from a camera. The stream ends after the last file.

use super::decoder::{LumaFrame, QrDecoder};
use crate::backends::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::{BackendError, BackendResult, CameraDevice, CodeStream, ScanApi, ScanOptions};
use crate::constants::scan::BATCH_CHANNEL_CAPACITY;
use futures::SinkExt;
use futures::channel::mpsc;
use std::path::PathBuf;
use tracing::{debug, warn};

const DEVICE_PATH: &str = "images:";

/// Scanner reading frames from image files
#[derive(Debug, Clone)]
pub struct ImageScanner {
    sources: Vec<PathBuf>,
}

impl ImageScanner {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self { sources }
    }
}

impl ScanApi for ImageScanner {
    fn devices(&self) -> Vec<CameraDevice> {
        if self.sources.is_empty() {
            return Vec::new();
        }
        vec![
            CameraDevice::new(format!("Image files ({})", self.sources.len()), DEVICE_PATH)
                .with_location("back"),
        ]
    }

    fn open_stream(
        &mut self,
        device: &CameraDevice,
        options: &ScanOptions,
    ) -> BackendResult<CodeStream> {
        if device.path != DEVICE_PATH || self.sources.is_empty() {
            return Err(BackendError::DeviceNotFound(device.path.clone()));
        }

        let (mut sender, receiver) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
        let options = options.clone();
        let decoder = QrDecoder::new();
        let mut pending = self.sources.clone().into_iter();

        let controller = CaptureLoopController::start("image-scan", move |stop| {
            let Some(path) = pending.next() else {
                return LoopAction::Stop;
            };

            let frame = match std::fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| LumaFrame::from_encoded(&bytes).map_err(|e| e.to_string()))
            {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable image");
                    return LoopAction::Continue;
                }
            };

            let batch = decoder.decode_filtered(&frame, &options);
            debug!(path = %path.display(), count = batch.len(), "Scanned image");

            if !batch.is_empty() {
                // Files are not frames that can be dropped; wait for room
                if futures::executor::block_on(sender.send(batch)).is_err() {
                    return LoopAction::Stop;
                }
            }

            if stop.wait(options.frame_interval) {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        });

        Ok(CodeStream::new(receiver, Box::new(controller)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_no_sources_means_no_device() {
        let scanner = ImageScanner::new(Vec::new());
        assert!(scanner.devices().is_empty());
        assert!(scanner.find_device(Default::default()).is_none());
    }

    #[tokio::test]
    async fn test_stream_ends_after_last_image() {
        let dir = tempfile::tempdir().unwrap();
        let blank = dir.path().join("blank.png");
        image::GrayImage::from_pixel(64, 64, image::Luma([255u8]))
            .save(&blank)
            .unwrap();
        let missing = dir.path().join("missing.png");

        let mut scanner = ImageScanner::new(vec![missing, blank]);
        let device = scanner.find_device(Default::default()).unwrap();
        let options = ScanOptions {
            frame_interval: Duration::from_millis(1),
            ..ScanOptions::default()
        };
        let mut stream = scanner.open_stream(&device, &options).unwrap();

        // Neither file holds a code, so the producer finishes without a batch
        assert_eq!(stream.next_batch().await, None);
    }
}
