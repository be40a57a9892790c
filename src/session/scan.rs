// SPDX-License-Identifier: GPL-3.0-only

//! Single-shot code scanning session

use super::{CaptureResult, CaptureSession, PermissionGate, SessionState};
use crate::backends::{
    BackendError, Capability, CodeBatch, CodeStream, DeviceSelector, PermissionApi, ScanApi,
    ScanOptions,
};
use crate::errors::{SessionError, SessionResult};
use tracing::{debug, info, warn};

/// Event pulled from an open scan stream
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// All codes decoded from one frame
    Batch(CodeBatch),
    /// The producer closed the stream
    Ended,
}

/// Camera scanning session
///
/// The first non-empty batch is terminal: the stream is closed before the
/// batch is handed out, so a code decoded while the summary is on screen is
/// never delivered.
pub struct ScanSession<P, S> {
    gate: PermissionGate<P>,
    scanner: S,
    selector: DeviceSelector,
    options: ScanOptions,
    state: SessionState,
    stream: Option<CodeStream>,
}

impl<P: PermissionApi, S: ScanApi> ScanSession<P, S> {
    pub fn new(permissions: P, scanner: S, selector: DeviceSelector, options: ScanOptions) -> Self {
        Self {
            gate: PermissionGate::new(permissions, Capability::Camera),
            scanner,
            selector,
            options,
            state: SessionState::Idle,
            stream: None,
        }
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn is_stream_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the camera stream
    ///
    /// Requires a granted permission. Starting an active session is a no-op.
    pub fn start(&mut self) -> SessionResult<()> {
        if !self.gate.is_granted() {
            debug!(status = %self.gate.status(), "Refusing to open camera without permission");
            return Err(SessionError::PermissionDenied(Capability::Camera));
        }
        if self.state == SessionState::Active && self.stream.is_some() {
            return Ok(());
        }

        let device = self.scanner.find_device(self.selector).ok_or_else(|| {
            SessionError::CapabilityUnavailable(format!("no camera matches {}", self.selector))
        })?;

        let stream = self
            .scanner
            .open_stream(&device, &self.options)
            .map_err(|e| match e {
                BackendError::NotAvailable(_)
                | BackendError::DeviceNotFound(_)
                | BackendError::PermissionDenied(_) => {
                    SessionError::from_backend(Capability::Camera, e)
                }
                other => SessionError::StreamError(other.to_string()),
            });
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                // The device node refused us; the next retry must prompt
                if matches!(err, SessionError::PermissionDenied(_)) {
                    self.gate.revoke();
                }
                return Err(err);
            }
        };

        info!(device = %device.name, path = %device.path, "Scan stream opened");
        self.stream = Some(stream);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Wait for the next event from the open stream
    ///
    /// Pends forever while no stream is open, so it can sit in a `select!`
    /// next to user input.
    pub async fn next_event(&mut self) -> ScanEvent {
        match self.stream.as_mut() {
            Some(stream) => match stream.next_batch().await {
                Some(batch) => ScanEvent::Batch(batch),
                None => ScanEvent::Ended,
            },
            None => futures::future::pending().await,
        }
    }

    /// Non-blocking variant of [`next_event`](Self::next_event)
    pub fn poll_event(&mut self) -> Option<ScanEvent> {
        match self.stream.as_mut()?.try_next_batch()? {
            Some(batch) => Some(ScanEvent::Batch(batch)),
            None => Some(ScanEvent::Ended),
        }
    }

    /// Take a decoded batch
    ///
    /// Returns the results to present, or `None` when the batch is dropped:
    /// the session is not active (a late frame), or nothing in it matches
    /// the requested code types. A returned batch has already suspended the
    /// session.
    pub fn accept(&mut self, batch: CodeBatch) -> Option<Vec<CaptureResult>> {
        if self.state != SessionState::Active {
            debug!(count = batch.len(), state = %self.state, "Discarding late scan batch");
            return None;
        }

        let codes: Vec<_> = batch
            .into_iter()
            .filter(|code| self.options.accepts(code.kind))
            .collect();
        if codes.is_empty() {
            return None;
        }

        // Single shot: close the stream before anyone sees the result
        self.stop();
        info!(count = codes.len(), "Scan complete");
        Some(codes.into_iter().map(CaptureResult::from).collect())
    }

    /// The producer closed the stream
    ///
    /// Returns the error to surface, or `None` if the session was no longer
    /// active.
    pub fn ended(&mut self) -> Option<SessionError> {
        if self.state != SessionState::Active {
            return None;
        }
        warn!("Camera stream ended unexpectedly");
        self.stop();
        Some(SessionError::StreamError("camera stream ended".into()))
    }
}

impl<P: PermissionApi, S: ScanApi> CaptureSession for ScanSession<P, S> {
    type Permissions = P;

    fn capability(&self) -> Capability {
        Capability::Camera
    }

    fn gate(&self) -> &PermissionGate<P> {
        &self.gate
    }

    fn gate_mut(&mut self) -> &mut PermissionGate<P> {
        &mut self.gate
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
            debug!("Scan stream closed");
        }
        if self.state == SessionState::Active {
            self.state = SessionState::Suspended;
        }
    }

    fn reset_state(&mut self) {
        self.state = SessionState::Idle;
    }
}
