// SPDX-License-Identifier: GPL-3.0-only

//! Permission-gated capability sessions
//!
//! A session owns one capability stream and the permission gate guarding it:
//!
//! ```text
//! Idle ──mount──▶ permission check ──granted──▶ Active ──result/stop──▶ Suspended
//!  ▲                     │                                                 │
//!  │                  denied                                               │
//!  └─────────────────────┴──────────────────────unmount────────────────────┘
//! ```
//!
//! A stream is never open unless the gate reports `Granted`, and a session
//! holds at most one stream at a time.

mod gate;
mod location;
mod scan;

pub use gate::PermissionGate;
pub use location::{LocationSession, WatchEvent, WatchUpdate};
pub use scan::{ScanEvent, ScanSession};

use crate::backends::{Capability, Fix, PermissionApi, ScannedCode};
use crate::constants::location::MPS_TO_KMH;

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not mounted, or mounted without a stream yet
    #[default]
    Idle,
    /// Stream open and listening
    Active,
    /// Stream closed after a one-shot result or an explicit stop
    Suspended,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Active => write!(f, "active"),
            SessionState::Suspended => write!(f, "suspended"),
        }
    }
}

/// Location reading in display units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixReading {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub accuracy_m: Option<f64>,
}

impl From<&Fix> for FixReading {
    fn from(fix: &Fix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude_m: fix.altitude.filter(|a| a.is_finite()),
            // Platforms report unknown speed as a negative value
            speed_kmh: fix
                .speed
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(|s| s * MPS_TO_KMH),
            accuracy_m: fix.accuracy.filter(|a| a.is_finite() && *a >= 0.0),
        }
    }
}

/// One result delivered by a capability stream
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureResult {
    /// A decoded barcode or QR code
    Code(ScannedCode),
    /// A location fix
    Fix(FixReading),
}

impl From<ScannedCode> for CaptureResult {
    fn from(code: ScannedCode) -> Self {
        CaptureResult::Code(code)
    }
}

impl From<&Fix> for CaptureResult {
    fn from(fix: &Fix) -> Self {
        CaptureResult::Fix(FixReading::from(fix))
    }
}

/// Behavior shared by the scan and location sessions
///
/// The screen shell only needs these to mount, gate and tear down a session;
/// result handling is specific to each variant.
pub trait CaptureSession {
    type Permissions: PermissionApi;

    /// Capability this session streams
    fn capability(&self) -> Capability;

    fn gate(&self) -> &PermissionGate<Self::Permissions>;

    fn gate_mut(&mut self) -> &mut PermissionGate<Self::Permissions>;

    fn state(&self) -> SessionState;

    /// Close any open stream; Active becomes Suspended
    ///
    /// Safe to call repeatedly.
    fn stop(&mut self);

    /// Stop and return to Idle with the permission forgotten, so the next
    /// mount resolves it again
    fn unmount(&mut self) {
        self.stop();
        self.reset_state();
        self.gate_mut().reset();
    }

    /// Put the state machine back to Idle
    fn reset_state(&mut self);
}
