// SPDX-License-Identifier: GPL-3.0-only

//! Scripted scanner for simulation and tests
//!
//! Batches are pushed through a [`ScannerFeed`] (tests) or emitted after a
//! delay by a capture thread (`--simulate`). The feed also counts open
//! streams so callers can check that a session never holds more than one.

use crate::backends::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::types::StreamHandle;
use crate::backends::{
    BackendError, BackendResult, CameraDevice, CodeBatch, CodeStream, CodeType, ScanApi,
    ScanOptions, ScannedCode,
};
use crate::constants::{SIMULATED_SCAN_DELAY, scan::BATCH_CHANNEL_CAPACITY};
use futures::channel::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct FeedState {
    /// Sender of the most recently opened stream
    current: Option<(u64, mpsc::Sender<CodeBatch>)>,
    next_id: u64,
    opens: usize,
    open_now: usize,
    max_open: usize,
    fail_next: Option<BackendError>,
}

/// Control and observation handle for a [`ScriptedScanner`]
#[derive(Debug, Clone, Default)]
pub struct ScannerFeed {
    state: Arc<Mutex<FeedState>>,
}

impl ScannerFeed {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        // A panicking test thread must not hide the counters from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver a batch to the open stream; false if none is open or it is full
    pub fn emit(&self, batch: CodeBatch) -> bool {
        let mut state = self.lock();
        match state.current.as_mut() {
            Some((_, sender)) => sender.try_send(batch).is_ok(),
            None => false,
        }
    }

    /// Close the open stream from the producer side (camera unplugged)
    pub fn end_stream(&self) {
        self.lock().current = None;
    }

    /// Make the next `open_stream` fail
    pub fn fail_next_open(&self, err: BackendError) {
        self.lock().fail_next = Some(err);
    }

    /// Streams opened so far
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// Streams currently open
    pub fn open_now(&self) -> usize {
        self.lock().open_now
    }

    /// Highest number of streams open at the same time
    pub fn max_concurrent(&self) -> usize {
        self.lock().max_open
    }
}

struct ScriptedHandle {
    id: u64,
    feed: ScannerFeed,
    closed: bool,
    auto: Option<CaptureLoopController>,
}

impl StreamHandle for ScriptedHandle {
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut auto) = self.auto.take() {
            auto.close();
        }
        let mut state = self.feed.lock();
        state.open_now = state.open_now.saturating_sub(1);
        if state.current.as_ref().is_some_and(|(id, _)| *id == self.id) {
            state.current = None;
        }
        debug!(id = self.id, "Scripted scan stream closed");
    }
}

/// Scanner whose frames are scripted
#[derive(Debug, Clone)]
pub struct ScriptedScanner {
    devices: Vec<CameraDevice>,
    feed: ScannerFeed,
    auto_batch: Option<(Duration, CodeBatch)>,
}

impl Default for ScriptedScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedScanner {
    /// One rear camera, batches pushed through [`ScriptedScanner::feed`]
    pub fn new() -> Self {
        Self::with_devices(vec![
            CameraDevice::new("Simulated camera", "sim:0").with_location("back"),
        ])
    }

    pub fn with_devices(devices: Vec<CameraDevice>) -> Self {
        Self {
            devices,
            feed: ScannerFeed::default(),
            auto_batch: None,
        }
    }

    /// Simulated camera that "sees" a QR code shortly after opening
    pub fn demo() -> Self {
        Self::new().with_auto_batch(
            SIMULATED_SCAN_DELAY,
            vec![ScannedCode::new(CodeType::Qr, "ABC123")],
        )
    }

    /// Emit `batch` `delay` after every open
    pub fn with_auto_batch(mut self, delay: Duration, batch: CodeBatch) -> Self {
        self.auto_batch = Some((delay, batch));
        self
    }

    pub fn feed(&self) -> ScannerFeed {
        self.feed.clone()
    }
}

impl ScanApi for ScriptedScanner {
    fn devices(&self) -> Vec<CameraDevice> {
        self.devices.clone()
    }

    fn open_stream(
        &mut self,
        device: &CameraDevice,
        _options: &ScanOptions,
    ) -> BackendResult<CodeStream> {
        if !self.devices.contains(device) {
            return Err(BackendError::DeviceNotFound(device.path.clone()));
        }

        let (sender, receiver) = mpsc::channel(BATCH_CHANNEL_CAPACITY);
        let id = {
            let mut state = self.feed.lock();
            if let Some(err) = state.fail_next.take() {
                return Err(err);
            }
            let id = state.next_id;
            state.next_id += 1;
            state.opens += 1;
            state.open_now += 1;
            state.max_open = state.max_open.max(state.open_now);
            state.current = Some((id, sender.clone()));
            id
        };
        debug!(id, path = %device.path, "Scripted scan stream opened");

        // The thread holds its own sender so end_stream() does not race it
        let auto = self.auto_batch.clone().map(|(delay, batch)| {
            let mut sender = sender;
            let mut pending = Some(batch);
            CaptureLoopController::start("scripted-scan", move |stop| {
                if stop.wait(delay) {
                    return LoopAction::Stop;
                }
                if let Some(batch) = pending.take() {
                    let _ = sender.try_send(batch);
                }
                LoopAction::Stop
            })
        });

        Ok(CodeStream::new(
            receiver,
            Box::new(ScriptedHandle {
                id,
                feed: self.feed.clone(),
                closed: false,
                auto,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_reaches_open_stream() {
        let mut scanner = ScriptedScanner::new();
        let feed = scanner.feed();
        let device = scanner.find_device(Default::default()).unwrap();

        assert!(!feed.emit(vec![ScannedCode::new(CodeType::Qr, "early")]));

        let mut stream = scanner.open_stream(&device, &ScanOptions::default()).unwrap();
        assert_eq!(feed.open_now(), 1);
        assert!(feed.emit(vec![ScannedCode::new(CodeType::Qr, "ABC123")]));
        assert_eq!(
            stream.next_batch().await,
            Some(vec![ScannedCode::new(CodeType::Qr, "ABC123")])
        );

        stream.close();
        assert_eq!(feed.open_now(), 0);
        assert!(!feed.emit(vec![ScannedCode::new(CodeType::Qr, "late")]));
    }

    #[tokio::test]
    async fn test_end_stream_closes_receiver() {
        let mut scanner = ScriptedScanner::new();
        let feed = scanner.feed();
        let device = scanner.find_device(Default::default()).unwrap();
        let mut stream = scanner.open_stream(&device, &ScanOptions::default()).unwrap();

        feed.end_stream();
        assert_eq!(stream.next_batch().await, None);
    }

    #[test]
    fn test_injected_open_failure() {
        let mut scanner = ScriptedScanner::new();
        let feed = scanner.feed();
        let device = scanner.find_device(Default::default()).unwrap();

        feed.fail_next_open(BackendError::NotAvailable("busy".into()));
        assert!(scanner.open_stream(&device, &ScanOptions::default()).is_err());
        assert!(scanner.open_stream(&device, &ScanOptions::default()).is_ok());
        assert_eq!(feed.open_count(), 1);
    }

    #[test]
    fn test_close_before_auto_batch_does_not_block() {
        let mut scanner = ScriptedScanner::new().with_auto_batch(
            Duration::from_secs(30),
            vec![ScannedCode::new(CodeType::Qr, "never")],
        );
        let feed = scanner.feed();
        let device = scanner.find_device(Default::default()).unwrap();
        let stream = scanner.open_stream(&device, &ScanOptions::default()).unwrap();

        let started = std::time::Instant::now();
        stream.close();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(feed.open_now(), 0);
    }

    #[tokio::test]
    async fn test_auto_batch() {
        let mut scanner = ScriptedScanner::new().with_auto_batch(
            Duration::from_millis(1),
            vec![ScannedCode::new(CodeType::Ean13, "7891234567895")],
        );
        let device = scanner.find_device(Default::default()).unwrap();
        let mut stream = scanner.open_stream(&device, &ScanOptions::default()).unwrap();
        let batch = stream.next_batch().await.unwrap();
        assert_eq!(batch[0].kind, CodeType::Ean13);
    }
}
