// SPDX-License-Identifier: GPL-3.0-only

//! Permission prompts forwarded to a UI loop
//!
//! The terminal UI cannot block on stdin while it owns the screen, so
//! requests travel over a channel. The UI draws a dialog, reads the user's
//! key and answers through the request's reply sender.

use super::Remembered;
use crate::backends::{BackendError, BackendResult, Capability, PermissionApi, PermissionStatus};
use futures::channel::oneshot;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Receiving side held by the UI loop
pub type PromptReceiver = mpsc::UnboundedReceiver<PromptRequest>;

/// User's choice in the dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Allow,
    Deny,
    /// "Ask later": the decision stays undetermined
    Later,
}

impl From<PromptAnswer> for PermissionStatus {
    fn from(answer: PromptAnswer) -> Self {
        match answer {
            PromptAnswer::Allow => PermissionStatus::Granted,
            PromptAnswer::Deny => PermissionStatus::Denied,
            PromptAnswer::Later => PermissionStatus::Undetermined,
        }
    }
}

/// A pending permission dialog
#[derive(Debug)]
pub struct PromptRequest {
    pub capability: Capability,
    reply: oneshot::Sender<PromptAnswer>,
}

impl PromptRequest {
    /// Answer the dialog; a requester that gave up is ignored
    pub fn answer(self, answer: PromptAnswer) {
        debug!(capability = %self.capability, ?answer, "Prompt answered");
        let _ = self.reply.send(answer);
    }
}

/// Permission adapter whose prompts are shown by another task
///
/// Clones share the dialog; each clone remembers its own answers.
#[derive(Clone)]
pub struct ChannelPermissions {
    remembered: Remembered,
    sender: mpsc::UnboundedSender<PromptRequest>,
}

impl ChannelPermissions {
    pub fn new() -> (Self, PromptReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                remembered: Remembered::default(),
                sender,
            },
            receiver,
        )
    }
}

impl PermissionApi for ChannelPermissions {
    fn check(&self, capability: Capability) -> PermissionStatus {
        self.remembered.get(capability)
    }

    fn request(
        &mut self,
        capability: Capability,
    ) -> BoxFuture<'_, BackendResult<PermissionStatus>> {
        Box::pin(async move {
            let (reply, answer) = oneshot::channel();
            self.sender
                .send(PromptRequest { capability, reply })
                .map_err(|_| BackendError::NotAvailable("permission dialog closed".into()))?;

            // Dropping the request without answering counts as a failure
            let answer = answer
                .await
                .map_err(|_| BackendError::Other("permission dialog dismissed".into()))?;

            let status = PermissionStatus::from(answer);
            info!(%capability, %status, "Permission answered");
            self.remembered.set(capability, status);
            Ok(status)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_waits_for_ui_answer() {
        let (mut permissions, mut prompts) = ChannelPermissions::new();

        let ui = tokio::spawn(async move {
            let request = prompts.recv().await.unwrap();
            assert_eq!(request.capability, Capability::FineLocation);
            request.answer(PromptAnswer::Allow);
        });

        let status = permissions.request(Capability::FineLocation).await;
        assert_eq!(status, Ok(PermissionStatus::Granted));
        assert_eq!(
            permissions.check(Capability::FineLocation),
            PermissionStatus::Granted
        );
        ui.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_request_is_an_error() {
        let (mut permissions, mut prompts) = ChannelPermissions::new();

        let ui = tokio::spawn(async move {
            drop(prompts.recv().await);
        });

        assert!(permissions.request(Capability::Camera).await.is_err());
        assert_eq!(permissions.check(Capability::Camera), PermissionStatus::Undetermined);
        ui.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_ui_is_an_error() {
        let (mut permissions, prompts) = ChannelPermissions::new();
        drop(prompts);
        assert!(matches!(
            permissions.request(Capability::Camera).await,
            Err(BackendError::NotAvailable(_))
        ));
    }
}
