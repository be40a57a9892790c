// SPDX-License-Identifier: GPL-3.0-only

//! Location session: single fixes and continuous tracking

use super::{CaptureSession, FixReading, PermissionGate, SessionState};
use crate::backends::{
    BackendError, BackendResult, Capability, Fix, FixStream, LocationApi, LocationOptions,
    PermissionApi, WatchHandle,
};
use crate::errors::{SessionError, SessionResult};
use tracing::{debug, info, warn};

/// Event pulled from a running watch
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A fix or an error from the platform
    Update {
        handle: WatchHandle,
        outcome: BackendResult<Fix>,
    },
    /// The producer closed the watch
    Ended { handle: WatchHandle },
}

impl WatchEvent {
    pub fn handle(&self) -> WatchHandle {
        match self {
            WatchEvent::Update { handle, .. } | WatchEvent::Ended { handle } => *handle,
        }
    }
}

/// Outcome of accepting a watch event
#[derive(Debug, Clone, PartialEq)]
pub enum WatchUpdate {
    /// New fix; `count` is the number of fixes since the watch started
    Fix { reading: FixReading, count: u64 },
    /// The watch failed and was stopped
    Failed(SessionError),
}

/// Fine-location session
pub struct LocationSession<P, L> {
    gate: PermissionGate<P>,
    locator: L,
    single_fix: LocationOptions,
    watch_options: LocationOptions,
    state: SessionState,
    watch: Option<FixStream>,
    count: u64,
}

impl<P: PermissionApi, L: LocationApi> LocationSession<P, L> {
    pub fn new(permissions: P, locator: L) -> Self {
        Self::with_options(
            permissions,
            locator,
            LocationOptions::single_fix(),
            LocationOptions::watch(),
        )
    }

    pub fn with_options(
        permissions: P,
        locator: L,
        single_fix: LocationOptions,
        watch_options: LocationOptions,
    ) -> Self {
        Self {
            gate: PermissionGate::new(permissions, Capability::FineLocation),
            locator,
            single_fix,
            watch_options,
            state: SessionState::Idle,
            watch: None,
            count: 0,
        }
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    pub fn watch_handle(&self) -> Option<WatchHandle> {
        self.watch.as_ref().map(FixStream::handle)
    }

    /// Fixes received since the current watch started
    pub fn watch_count(&self) -> u64 {
        self.count
    }

    /// Map a backend failure, revoking the gate when the platform refused
    fn backend_error(&mut self, err: BackendError) -> SessionError {
        let err = SessionError::from_backend(Capability::FineLocation, err);
        if matches!(err, SessionError::PermissionDenied(_)) {
            self.gate.revoke();
        }
        err
    }

    fn require_permission(&self) -> SessionResult<()> {
        if self.gate.is_granted() {
            Ok(())
        } else {
            debug!(status = %self.gate.status(), "Refusing location request without permission");
            Err(SessionError::PermissionDenied(Capability::FineLocation))
        }
    }

    /// Request one fix
    ///
    /// The session is active while waiting and suspended afterwards,
    /// whatever the outcome. Waiting is bounded by the single-fix timeout.
    pub async fn get_once(&mut self) -> SessionResult<FixReading> {
        self.require_permission()?;
        if self.watch.is_some() {
            return Err(SessionError::Busy);
        }

        let options = self.single_fix;
        self.state = SessionState::Active;
        debug!(timeout_ms = options.timeout_ms, "Requesting single fix");

        let outcome = tokio::time::timeout(options.timeout(), self.locator.get_once(options)).await;
        self.state = SessionState::Suspended;

        match outcome {
            Ok(Ok(fix)) => {
                info!(latitude = fix.latitude, longitude = fix.longitude, "Single fix received");
                Ok(FixReading::from(&fix))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Single fix failed");
                Err(self.backend_error(e))
            }
            Err(_) => {
                warn!(timeout_ms = options.timeout_ms, "Single fix timed out");
                Err(SessionError::StreamTimeout)
            }
        }
    }

    /// Start continuous tracking
    ///
    /// Returns the running watch's handle if one is already open.
    pub fn start_watch(&mut self) -> SessionResult<WatchHandle> {
        self.require_permission()?;
        if let Some(handle) = self.watch_handle() {
            return Ok(handle);
        }

        let stream = match self.locator.watch(self.watch_options) {
            Ok(stream) => stream,
            Err(e) => return Err(self.backend_error(e)),
        };
        let handle = stream.handle();

        self.watch = Some(stream);
        self.count = 0;
        self.state = SessionState::Active;
        info!(%handle, "Watch started");
        Ok(handle)
    }

    /// Stop tracking and reset the counter
    pub fn stop_watch(&mut self) {
        let Some(stream) = self.watch.take() else {
            return;
        };
        let handle = stream.handle();
        drop(stream);
        self.locator.clear_watch(handle);
        self.count = 0;
        if self.state == SessionState::Active {
            self.state = SessionState::Suspended;
        }
        info!(%handle, "Watch stopped");
    }

    /// Wait for the next watch event
    ///
    /// Pends forever while no watch is running.
    pub async fn next_event(&mut self) -> WatchEvent {
        match self.watch.as_mut() {
            Some(stream) => {
                let handle = stream.handle();
                match stream.next_update().await {
                    Some(outcome) => WatchEvent::Update { handle, outcome },
                    None => WatchEvent::Ended { handle },
                }
            }
            None => futures::future::pending().await,
        }
    }

    /// Non-blocking variant of [`next_event`](Self::next_event)
    pub fn poll_event(&mut self) -> Option<WatchEvent> {
        let stream = self.watch.as_mut()?;
        let handle = stream.handle();
        Some(match stream.try_next_update()? {
            Some(outcome) => WatchEvent::Update { handle, outcome },
            None => WatchEvent::Ended { handle },
        })
    }

    /// Apply a watch event
    ///
    /// Events are dropped unless the session is active and the event belongs
    /// to the current watch, so nothing arrives after `stop_watch` returns.
    pub fn accept(&mut self, event: WatchEvent) -> Option<WatchUpdate> {
        if self.state != SessionState::Active || self.watch_handle() != Some(event.handle()) {
            debug!(handle = %event.handle(), state = %self.state, "Discarding stale watch event");
            return None;
        }

        match event {
            WatchEvent::Update {
                outcome: Ok(fix), ..
            } => {
                self.count += 1;
                debug!(count = self.count, "Watch fix");
                Some(WatchUpdate::Fix {
                    reading: FixReading::from(&fix),
                    count: self.count,
                })
            }
            WatchEvent::Update {
                outcome: Err(e), ..
            } => {
                warn!(error = %e, "Watch failed");
                self.stop_watch();
                Some(WatchUpdate::Failed(self.backend_error(e)))
            }
            WatchEvent::Ended { .. } => {
                warn!("Location updates ended");
                self.stop_watch();
                Some(WatchUpdate::Failed(SessionError::StreamError(
                    "location updates ended".into(),
                )))
            }
        }
    }
}

impl<P: PermissionApi, L: LocationApi> CaptureSession for LocationSession<P, L> {
    type Permissions = P;

    fn capability(&self) -> Capability {
        Capability::FineLocation
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
        self.stop_watch();
        if self.state == SessionState::Active {
            self.state = SessionState::Suspended;
        }
    }

    fn reset_state(&mut self) {
        self.state = SessionState::Idle;
        self.count = 0;
    }
}
