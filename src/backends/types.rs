// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capability backend abstraction

//! Shared types for capability backends

use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Device capability guarded by a runtime permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Camera frames (code scanning)
    Camera,
    /// Precise device location
    FineLocation,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Camera => write!(f, "camera"),
            Capability::FineLocation => write!(f, "fine-location"),
        }
    }
}

/// Authorization status of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionStatus {
    /// Never asked, or the user postponed the decision
    #[default]
    Undetermined,
    /// Access allowed
    Granted,
    /// Access refused by the user or blocked by the platform
    Denied,
}

impl PermissionStatus {
    /// Check if access is allowed
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Undetermined => write!(f, "undetermined"),
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
        }
    }
}

/// Which camera a scan session should open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceSelector {
    /// Rear-facing camera (first capture device when facing is unknown)
    #[default]
    Back,
    /// User-facing camera
    Front,
    /// Camera by enumeration index
    Index(usize),
}

impl DeviceSelector {
    /// Facing label a device must report to match this selector
    pub fn location(&self) -> Option<&'static str> {
        match self {
            DeviceSelector::Back => Some("back"),
            DeviceSelector::Front => Some("front"),
            DeviceSelector::Index(_) => None,
        }
    }

    /// Pick a device from an enumeration
    ///
    /// Back/Front prefer a device reporting that facing and fall back to the
    /// first device, since desktop webcams rarely report one.
    pub fn select<'a>(&self, devices: &'a [CameraDevice]) -> Option<&'a CameraDevice> {
        match self {
            DeviceSelector::Index(index) => devices.get(*index),
            selector => {
                let wanted = selector.location();
                devices
                    .iter()
                    .find(|d| d.location.as_deref() == wanted)
                    .or_else(|| devices.first())
            }
        }
    }
}

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceSelector::Back => write!(f, "back"),
            DeviceSelector::Front => write!(f, "front"),
            DeviceSelector::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String,             // Device node, image file, or scripted id
    pub location: Option<String>, // Camera location: "front", "back", or "external"
}

impl CameraDevice {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Barcode symbology tag
///
/// String forms follow the tags used by mobile code scanners
/// (`qr`, `ean-13`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CodeType {
    #[serde(rename = "qr")]
    Qr,
    #[serde(rename = "ean-13")]
    Ean13,
    #[serde(rename = "ean-8")]
    Ean8,
    #[serde(rename = "code-128")]
    Code128,
    #[serde(rename = "code-39")]
    Code39,
    #[serde(rename = "code-93")]
    Code93,
    #[serde(rename = "upc-a")]
    UpcA,
    #[serde(rename = "upc-e")]
    UpcE,
    #[serde(rename = "itf")]
    Itf,
    #[serde(rename = "codabar")]
    Codabar,
    #[serde(rename = "data-matrix")]
    DataMatrix,
    #[serde(rename = "pdf-417")]
    Pdf417,
    #[serde(rename = "aztec")]
    Aztec,
}

impl CodeType {
    pub const ALL: [CodeType; 13] = [
        CodeType::Qr,
        CodeType::Ean13,
        CodeType::Ean8,
        CodeType::Code128,
        CodeType::Code39,
        CodeType::Code93,
        CodeType::UpcA,
        CodeType::UpcE,
        CodeType::Itf,
        CodeType::Codabar,
        CodeType::DataMatrix,
        CodeType::Pdf417,
        CodeType::Aztec,
    ];

    /// Symbology tag
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::Qr => "qr",
            CodeType::Ean13 => "ean-13",
            CodeType::Ean8 => "ean-8",
            CodeType::Code128 => "code-128",
            CodeType::Code39 => "code-39",
            CodeType::Code93 => "code-93",
            CodeType::UpcA => "upc-a",
            CodeType::UpcE => "upc-e",
            CodeType::Itf => "itf",
            CodeType::Codabar => "codabar",
            CodeType::DataMatrix => "data-matrix",
            CodeType::Pdf417 => "pdf-417",
            CodeType::Aztec => "aztec",
        }
    }
}

impl std::fmt::Display for CodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        CodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| format!("unknown code type '{}'", s.trim()))
    }
}

/// One code decoded from a camera frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedCode {
    pub kind: CodeType,
    pub value: String,
}

impl ScannedCode {
    pub fn new(kind: CodeType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// All codes decoded from a single frame
pub type CodeBatch = Vec<ScannedCode>;

/// Options for opening a scan stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Symbologies to report; others are dropped
    pub code_types: BTreeSet<CodeType>,
    /// Minimum time between decoded frames
    pub frame_interval: Duration,
}

impl ScanOptions {
    pub fn new(code_types: impl IntoIterator<Item = CodeType>) -> Self {
        Self {
            code_types: code_types.into_iter().collect(),
            frame_interval: crate::constants::scan::FRAME_INTERVAL,
        }
    }

    /// Check if a symbology was requested
    pub fn accepts(&self, kind: CodeType) -> bool {
        self.code_types.contains(&kind)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new(crate::constants::scan::DEFAULT_CODE_TYPES)
    }
}

/// One location reading as delivered by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Ground speed in meters per second
    #[serde(default)]
    pub speed: Option<f64>,
    /// When the reading was taken
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            speed: None,
            timestamp: Utc::now(),
        }
    }

    /// Age of the reading relative to now
    pub fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or_default()
    }
}

/// Options for single-fix and watch requests
///
/// Durations are stored in milliseconds so the struct maps directly onto
/// the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationOptions {
    pub enable_high_accuracy: bool,
    /// Give up on a single fix after this long
    pub timeout_ms: u64,
    /// Accept a cached fix at most this old
    pub maximum_age_ms: u64,
    /// Minimum movement before a watch reports again (0 = every update)
    pub distance_filter_m: f64,
    /// Minimum time between watch updates
    pub min_interval_ms: u64,
}

impl LocationOptions {
    /// Options for a one-off position request
    pub fn single_fix() -> Self {
        use crate::constants::location;
        Self {
            enable_high_accuracy: true,
            timeout_ms: location::SINGLE_FIX_TIMEOUT.as_millis() as u64,
            maximum_age_ms: location::SINGLE_FIX_MAX_AGE.as_millis() as u64,
            distance_filter_m: location::WATCH_DISTANCE_FILTER_M,
            min_interval_ms: location::WATCH_MIN_INTERVAL.as_millis() as u64,
        }
    }

    /// Options for continuous tracking
    pub fn watch() -> Self {
        use crate::constants::location;
        Self {
            enable_high_accuracy: true,
            timeout_ms: location::SINGLE_FIX_TIMEOUT.as_millis() as u64,
            maximum_age_ms: 0,
            distance_filter_m: location::WATCH_DISTANCE_FILTER_M,
            min_interval_ms: location::WATCH_MIN_INTERVAL.as_millis() as u64,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn maximum_age(&self) -> Duration {
        Duration::from_millis(self.maximum_age_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self::single_fix()
    }
}

/// Opaque identifier of a running location watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(Uuid);

impl WatchHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch-{}", self.0.simple())
    }
}

/// Producer side of an open capability stream
///
/// Closing must be idempotent; the stream calls it on drop as well.
pub trait StreamHandle: Send {
    fn close(&mut self);
}

/// Open stream of decoded code batches
pub struct CodeStream {
    receiver: mpsc::Receiver<CodeBatch>,
    handle: Box<dyn StreamHandle>,
}

impl CodeStream {
    pub fn new(receiver: mpsc::Receiver<CodeBatch>, handle: Box<dyn StreamHandle>) -> Self {
        Self { receiver, handle }
    }

    /// Wait for the next batch; `None` once the producer is gone
    pub async fn next_batch(&mut self) -> Option<CodeBatch> {
        use futures::StreamExt;
        self.receiver.next().await
    }

    /// Non-blocking receive
    ///
    /// `None` while nothing is queued, `Some(None)` once the producer closed
    /// the stream.
    pub fn try_next_batch(&mut self) -> Option<Option<CodeBatch>> {
        use futures::{FutureExt, StreamExt};
        self.receiver.next().now_or_never()
    }

    /// Stop the producer and drop anything still queued
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.receiver.close();
        self.handle.close();
    }
}

impl Drop for CodeStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CodeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeStream").finish_non_exhaustive()
    }
}

/// Open location watch
pub struct FixStream {
    handle: WatchHandle,
    receiver: mpsc::Receiver<BackendResult<Fix>>,
}

impl FixStream {
    pub fn new(handle: WatchHandle, receiver: mpsc::Receiver<BackendResult<Fix>>) -> Self {
        Self { handle, receiver }
    }

    pub fn handle(&self) -> WatchHandle {
        self.handle
    }

    /// Wait for the next update; `None` once the producer is gone
    pub async fn next_update(&mut self) -> Option<BackendResult<Fix>> {
        use futures::StreamExt;
        self.receiver.next().await
    }

    /// Non-blocking receive, same contract as [`CodeStream::try_next_batch`]
    pub fn try_next_update(&mut self) -> Option<Option<BackendResult<Fix>>> {
        use futures::{FutureExt, StreamExt};
        self.receiver.next().now_or_never()
    }
}

impl std::fmt::Debug for FixStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixStream")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// The platform refused access
    PermissionDenied(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// The platform gave up waiting for a result
    Timeout,
    /// The stream producer went away
    StreamClosed,
    /// General I/O error
    IoError(String),
    /// D-Bus call failed
    DBus(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Timeout => write!(f, "Timed out"),
            BackendError::StreamClosed => write!(f, "Stream closed"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::DBus(msg) => write!(f, "D-Bus error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

impl From<zbus::Error> for BackendError {
    fn from(err: zbus::Error) -> Self {
        match &err {
            zbus::Error::MethodError(name, _, _) if name.as_str().ends_with("AccessDenied") => {
                BackendError::PermissionDenied(err.to_string())
            }
            zbus::Error::MethodError(name, _, _)
                if name.as_str().ends_with("ServiceUnknown")
                    || name.as_str().ends_with("NameHasNoOwner") =>
            {
                BackendError::NotAvailable(err.to_string())
            }
            zbus::Error::Address(_) | zbus::Error::InputOutput(_) => {
                BackendError::NotAvailable(err.to_string())
            }
            _ => BackendError::DBus(err.to_string()),
        }
    }
}

impl From<zbus::fdo::Error> for BackendError {
    fn from(err: zbus::fdo::Error) -> Self {
        match err {
            zbus::fdo::Error::AccessDenied(msg) => BackendError::PermissionDenied(msg),
            zbus::fdo::Error::ServiceUnknown(msg) => BackendError::NotAvailable(msg),
            other => BackendError::DBus(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_type_tags_round_trip() {
        for kind in CodeType::ALL {
            assert_eq!(kind.as_str().parse::<CodeType>(), Ok(kind));
        }
        assert_eq!("EAN-13".parse::<CodeType>(), Ok(CodeType::Ean13));
        assert!("maxicode".parse::<CodeType>().is_err());
    }

    #[test]
    fn test_code_type_serde_uses_tags() {
        let json = serde_json::to_string(&vec![CodeType::Qr, CodeType::Ean8]).unwrap();
        assert_eq!(json, r#"["qr","ean-8"]"#);
    }

    #[test]
    fn test_selector_prefers_matching_location() {
        let devices = vec![
            CameraDevice::new("Front cam", "/dev/video0").with_location("front"),
            CameraDevice::new("Rear cam", "/dev/video2").with_location("back"),
        ];
        assert_eq!(
            DeviceSelector::Back.select(&devices).map(|d| d.path.as_str()),
            Some("/dev/video2")
        );
        assert_eq!(
            DeviceSelector::Front.select(&devices).map(|d| d.path.as_str()),
            Some("/dev/video0")
        );
        assert!(DeviceSelector::Index(5).select(&devices).is_none());
    }

    #[test]
    fn test_selector_falls_back_to_first_device() {
        let devices = vec![CameraDevice::new("Webcam", "/dev/video0")];
        assert_eq!(
            DeviceSelector::Back.select(&devices).map(|d| d.name.as_str()),
            Some("Webcam")
        );
        assert!(DeviceSelector::Back.select(&[]).is_none());
    }

    #[test]
    fn test_single_fix_defaults() {
        let options = LocationOptions::single_fix();
        assert!(options.enable_high_accuracy);
        assert_eq!(options.timeout(), Duration::from_secs(15));
        assert_eq!(options.maximum_age(), Duration::from_secs(10));
    }

    #[test]
    fn test_watch_defaults() {
        let options = LocationOptions::watch();
        assert_eq!(options.distance_filter_m, 0.0);
        assert_eq!(options.min_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_watch_handles_are_unique() {
        assert_ne!(WatchHandle::new(), WatchHandle::new());
    }
}
