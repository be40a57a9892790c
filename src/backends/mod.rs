// SPDX-License-Identifier: MPL-2.0

//! Capability backend abstraction layer
//!
//! Sessions never talk to hardware or platform services directly. They are
//! handed three narrow interfaces and every adapter implements one of them:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │           Sessions (scan / location)                │
//! └──────┬──────────────────┬──────────────────┬────────┘
//!        │                  │                  │
//! ┌──────┴───────┐   ┌──────┴───────┐   ┌──────┴───────┐
//! │PermissionApi │   │   ScanApi    │   │ LocationApi  │
//! │ prompt       │   │ v4l2         │   │ geoclue      │
//! │ channel      │   │ images       │   │ scripted     │
//! │ policy       │   │ scripted     │   │ (walk/replay)│
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`permission`]: runtime permission adapters
//! - [`scanner`]: camera code scanners and the shared QR decoder
//! - [`location`]: location providers and the cached-fix tolerance
//! - [`frame_loop`]: capture thread lifecycle shared by the scanners

pub mod frame_loop;
pub mod location;
pub mod permission;
pub mod scanner;
pub mod types;

pub use types::*;

use crate::config::{Config, LocationBackendType, PermissionPolicy, ScannerBackendType};
use futures::future::BoxFuture;

/// Runtime permission interface
pub trait PermissionApi: Send {
    /// Current status without prompting
    fn check(&self, capability: Capability) -> PermissionStatus;

    /// Ask the user (or platform) for access
    ///
    /// Resolves once the user answered. An `Err` means the prompt itself
    /// failed; callers treat that as a refusal.
    fn request(&mut self, capability: Capability) -> BoxFuture<'_, BackendResult<PermissionStatus>>;
}

/// Camera code scanning interface
pub trait ScanApi: Send {
    /// Enumerate capture devices
    fn devices(&self) -> Vec<CameraDevice>;

    /// Resolve a selector against the current enumeration
    fn find_device(&self, selector: DeviceSelector) -> Option<CameraDevice> {
        selector.select(&self.devices()).cloned()
    }

    /// Start decoding frames from `device`
    ///
    /// The returned stream owns the producer; dropping it stops capture.
    fn open_stream(&mut self, device: &CameraDevice, options: &ScanOptions)
    -> BackendResult<CodeStream>;
}

/// Location interface
pub trait LocationApi: Send {
    /// Deliver a single fix
    ///
    /// Adapters may answer from a cached fix no older than
    /// `options.maximum_age()`. The caller bounds the wait with
    /// `options.timeout()`.
    fn get_once(&mut self, options: LocationOptions) -> BoxFuture<'_, BackendResult<Fix>>;

    /// Start delivering fixes until [`LocationApi::clear_watch`]
    fn watch(&mut self, options: LocationOptions) -> BackendResult<FixStream>;

    /// Stop a watch; unknown handles are ignored
    fn clear_watch(&mut self, handle: WatchHandle);
}

impl<T: PermissionApi + ?Sized> PermissionApi for Box<T> {
    fn check(&self, capability: Capability) -> PermissionStatus {
        (**self).check(capability)
    }

    fn request(
        &mut self,
        capability: Capability,
    ) -> BoxFuture<'_, BackendResult<PermissionStatus>> {
        (**self).request(capability)
    }
}

impl<T: ScanApi + ?Sized> ScanApi for Box<T> {
    fn devices(&self) -> Vec<CameraDevice> {
        (**self).devices()
    }

    fn find_device(&self, selector: DeviceSelector) -> Option<CameraDevice> {
        (**self).find_device(selector)
    }

    fn open_stream(
        &mut self,
        device: &CameraDevice,
        options: &ScanOptions,
    ) -> BackendResult<CodeStream> {
        (**self).open_stream(device, options)
    }
}

impl<T: LocationApi + ?Sized> LocationApi for Box<T> {
    fn get_once(&mut self, options: LocationOptions) -> BoxFuture<'_, BackendResult<Fix>> {
        (**self).get_once(options)
    }

    fn watch(&mut self, options: LocationOptions) -> BackendResult<FixStream> {
        (**self).watch(options)
    }

    fn clear_watch(&mut self, handle: WatchHandle) {
        (**self).clear_watch(handle)
    }
}

/// Create the permission adapter for a CLI subcommand
///
/// `Prompt` asks on the terminal; the terminal UI builds
/// [`permission::ChannelPermissions`] itself.
pub fn create_permissions(policy: PermissionPolicy) -> Box<dyn PermissionApi> {
    match policy {
        PermissionPolicy::Prompt => Box::new(permission::PromptPermissions::new()),
        PermissionPolicy::Grant => Box::new(permission::PolicyPermissions::grant_all()),
        PermissionPolicy::Deny => Box::new(permission::PolicyPermissions::deny_all()),
    }
}

/// Create the scanner selected by the configuration
///
/// `simulate` forces the scripted scanner regardless of the configured one.
pub fn create_scanner(config: &Config, simulate: bool) -> Box<dyn ScanApi> {
    let backend = if simulate {
        ScannerBackendType::Simulated
    } else {
        config.scanner_backend
    };

    match backend {
        ScannerBackendType::V4l2 => Box::new(scanner::V4l2Scanner::new()),
        ScannerBackendType::Images => {
            Box::new(scanner::ImageScanner::new(config.image_sources.clone()))
        }
        ScannerBackendType::Simulated => Box::new(scanner::ScriptedScanner::demo()),
    }
}

/// Create the location provider selected by the configuration
pub fn create_locator(config: &Config, simulate: bool) -> BackendResult<Box<dyn LocationApi>> {
    let backend = if simulate && config.location_backend == LocationBackendType::GeoClue {
        LocationBackendType::Simulated
    } else {
        config.location_backend
    };

    Ok(match backend {
        LocationBackendType::GeoClue => Box::new(location::GeoClueLocation::new(
            config.geoclue_desktop_id.clone(),
        )),
        LocationBackendType::Replay => {
            let path = config.replay_path.as_deref().ok_or_else(|| {
                BackendError::NotAvailable("no replay file configured".to_string())
            })?;
            Box::new(location::ScriptedLocation::replay(path)?)
        }
        LocationBackendType::Simulated => Box::new(location::ScriptedLocation::walk()),
    })
}
