// SPDX-License-Identifier: GPL-3.0-only

//! Permissions answered by a fixed policy or a script of answers

use super::Remembered;
use crate::backends::{BackendResult, Capability, PermissionApi, PermissionStatus};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Shared counters for observing a [`PolicyPermissions`] after it was moved
/// into a session
#[derive(Debug, Clone, Default)]
pub struct PermissionProbe {
    requests: Arc<Mutex<Vec<Capability>>>,
}

impl PermissionProbe {
    /// Number of prompts shown so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Capabilities prompted for, in order
    pub fn requested(&self) -> Vec<Capability> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, capability: Capability) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(capability);
        }
    }
}

/// Permission adapter with predetermined answers
///
/// Scripted answers are consumed one per `request`; once they run out the
/// fallback answer is used. Answers are remembered, so `check` reports the
/// most recent one like a platform permission store would.
pub struct PolicyPermissions {
    remembered: Remembered,
    script: VecDeque<BackendResult<PermissionStatus>>,
    fallback: PermissionStatus,
    probe: PermissionProbe,
}

impl PolicyPermissions {
    /// Every request is granted; nothing is pre-authorized
    pub fn grant_all() -> Self {
        Self::scripted(Vec::new(), PermissionStatus::Granted)
    }

    /// Every request is denied
    pub fn deny_all() -> Self {
        Self::scripted(Vec::new(), PermissionStatus::Denied)
    }

    /// Capabilities already authorized before the screen opens
    pub fn pre_granted(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        let mut policy = Self::grant_all();
        for capability in capabilities {
            policy.remembered.set(capability, PermissionStatus::Granted);
        }
        policy
    }

    /// Answer requests from `script`, then with `fallback`
    pub fn scripted(
        script: impl IntoIterator<Item = BackendResult<PermissionStatus>>,
        fallback: PermissionStatus,
    ) -> Self {
        Self {
            remembered: Remembered::default(),
            script: script.into_iter().collect(),
            fallback,
            probe: PermissionProbe::default(),
        }
    }

    /// Handle for inspecting prompts after the adapter is moved
    pub fn probe(&self) -> PermissionProbe {
        self.probe.clone()
    }
}

impl PermissionApi for PolicyPermissions {
    fn check(&self, capability: Capability) -> PermissionStatus {
        self.remembered.get(capability)
    }

    fn request(
        &mut self,
        capability: Capability,
    ) -> BoxFuture<'_, BackendResult<PermissionStatus>> {
        self.probe.record(capability);
        let answer = self.script.pop_front().unwrap_or(Ok(self.fallback));
        if let Ok(status) = answer {
            self.remembered.set(capability, status);
        }
        debug!(%capability, ?answer, "Answered permission request from policy");
        Box::pin(async move { answer })
    }
}
