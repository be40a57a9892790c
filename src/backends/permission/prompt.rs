// SPDX-License-Identifier: GPL-3.0-only

//! Permission prompt on the controlling terminal

use super::{Remembered, parse_answer};
use crate::backends::{BackendError, BackendResult, Capability, PermissionApi, PermissionStatus};
use crate::fl;
use futures::future::BoxFuture;
use std::io::{self, BufRead, Write};
use tracing::{debug, info};

/// Asks `[s/N]` on stderr and reads the answer from stdin
#[derive(Debug, Default)]
pub struct PromptPermissions {
    remembered: Remembered,
}

impl PromptPermissions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Localized prompt text for a capability
pub fn prompt_text(capability: Capability) -> (String, String) {
    match capability {
        Capability::Camera => (fl!("permission-title-camera"), fl!("permission-message-camera")),
        Capability::FineLocation => (
            fl!("permission-title-location"),
            fl!("permission-message-location"),
        ),
    }
}

fn ask(capability: Capability) -> io::Result<PermissionStatus> {
    let (title, message) = prompt_text(capability);
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{}", title)?;
    write!(stderr, "{} {} ", message, fl!("permission-prompt-suffix"))?;
    stderr.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        // EOF: nobody to ask
        return Ok(PermissionStatus::Undetermined);
    }
    Ok(parse_answer(&line))
}

impl PermissionApi for PromptPermissions {
    fn check(&self, capability: Capability) -> PermissionStatus {
        self.remembered.get(capability)
    }

    fn request(
        &mut self,
        capability: Capability,
    ) -> BoxFuture<'_, BackendResult<PermissionStatus>> {
        Box::pin(async move {
            debug!(%capability, "Prompting for permission on the terminal");
            let status = tokio::task::spawn_blocking(move || ask(capability))
                .await
                .map_err(|e| BackendError::Other(format!("prompt task failed: {}", e)))??;
            info!(%capability, %status, "Permission answered");
            self.remembered.set(capability, status);
            Ok(status)
        })
    }
}
