// SPDX-License-Identifier: GPL-3.0-only

//! Permission gate for one capability

use crate::backends::{Capability, PermissionApi, PermissionStatus};
use tracing::{debug, info, warn};

/// Tracks the authorization status of one capability
///
/// The status starts `Undetermined` and only changes through
/// [`resolve`](Self::resolve), [`request`](Self::request),
/// [`revoke`](Self::revoke) or [`reset`](Self::reset). It is never persisted.
pub struct PermissionGate<P> {
    api: P,
    capability: Capability,
    status: PermissionStatus,
    /// The backend refused access although the gate had granted it
    revoked: bool,
}

impl<P: PermissionApi> PermissionGate<P> {
    pub fn new(api: P, capability: Capability) -> Self {
        Self {
            api,
            capability,
            status: PermissionStatus::Undetermined,
            revoked: false,
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn status(&self) -> PermissionStatus {
        self.status
    }

    pub fn is_granted(&self) -> bool {
        self.status.is_granted()
    }

    /// Query the platform without prompting
    pub fn resolve(&mut self) -> PermissionStatus {
        self.status = if self.revoked {
            PermissionStatus::Denied
        } else {
            self.api.check(self.capability)
        };
        debug!(capability = %self.capability, status = %self.status, "Permission resolved");
        self.status
    }

    /// Prompt for access
    ///
    /// Returns immediately if the platform already grants it, unless access
    /// was revoked since. A prompt that fails is treated as a refusal.
    pub async fn request(&mut self) -> PermissionStatus {
        if !self.revoked && self.api.check(self.capability).is_granted() {
            self.status = PermissionStatus::Granted;
            return self.status;
        }

        self.status = match self.api.request(self.capability).await {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    capability = %self.capability,
                    error = %e,
                    "Permission request failed, treating as denied"
                );
                PermissionStatus::Denied
            }
        };
        self.revoked = false;
        info!(capability = %self.capability, status = %self.status, "Permission requested");
        self.status
    }

    /// Record that the backend refused access mid-operation
    ///
    /// The status becomes `Denied` and the next [`request`](Self::request)
    /// prompts even if the permission store still reports a grant.
    pub fn revoke(&mut self) {
        warn!(capability = %self.capability, "Access refused by the platform");
        self.status = PermissionStatus::Denied;
        self.revoked = true;
    }

    /// Resolve, and prompt when not already granted
    pub async fn ensure(&mut self) -> PermissionStatus {
        if self.resolve().is_granted() {
            return self.status;
        }
        self.request().await
    }

    /// Forget the status
    pub fn reset(&mut self) {
        self.status = PermissionStatus::Undetermined;
        self.revoked = false;
    }

    pub fn api(&self) -> &P {
        &self.api
    }
}
