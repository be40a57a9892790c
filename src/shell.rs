// SPDX-License-Identifier: GPL-3.0-only

//! Screen shell
//!
//! Owns one capture session and its presenter behind a single
//! `capability_visible` toggle. Opening mounts the session and resolves its
//! permission; closing stops any stream, unmounts and hides the screen.
//!
//! Modal dismissal does not close the screen directly: the completion handed
//! to the presenter queues [`ShellCommand::Close`], and the shell drains its
//! queue right after dismissing.

use crate::backends::{Capability, LocationApi, PermissionApi, PermissionStatus, ScanApi};
use crate::errors::SessionError;
use crate::presenter::{Completion, PresentMode, ResultPresenter};
use crate::session::{
    CaptureResult, CaptureSession, LocationSession, ScanEvent, ScanSession, WatchEvent,
    WatchUpdate,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info};

/// Requests queued by presenter completions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Close,
}

pub struct ScreenShell<S> {
    session: S,
    presenter: ResultPresenter,
    capability_visible: bool,
    command_tx: UnboundedSender<ShellCommand>,
    command_rx: UnboundedReceiver<ShellCommand>,
}

impl<S: CaptureSession> ScreenShell<S> {
    pub fn new(session: S) -> Self {
        let (command_tx, command_rx) = unbounded_channel();
        Self {
            presenter: ResultPresenter::new(session.capability()),
            session,
            capability_visible: false,
            command_tx,
            command_rx,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn presenter(&self) -> &ResultPresenter {
        &self.presenter
    }

    pub fn is_visible(&self) -> bool {
        self.capability_visible
    }

    pub fn capability(&self) -> Capability {
        self.session.capability()
    }

    /// Show the screen and resolve the permission, prompting if needed
    pub async fn mount(&mut self) -> PermissionStatus {
        self.capability_visible = true;
        self.presenter.reset();
        info!(capability = %self.capability(), "Mounting screen");

        let status = self.session.gate_mut().ensure().await;
        self.show_permission(status);
        status
    }

    /// Ask for the permission again from the "permission missing" view
    pub async fn retry_permission(&mut self) -> PermissionStatus {
        let status = self.session.gate_mut().request().await;
        if status.is_granted() {
            self.presenter.reset();
        }
        self.show_permission(status);
        status
    }

    fn show_permission(&mut self, status: PermissionStatus) {
        if !status.is_granted() {
            self.presenter
                .show_error(&SessionError::PermissionDenied(self.capability()));
        }
    }

    /// Stop everything and hide the screen
    pub fn close(&mut self) {
        self.session.stop();
        self.session.unmount();
        self.capability_visible = false;
        self.presenter.reset();
        info!(capability = %self.capability(), "Screen closed");
    }

    /// Dismiss the modal summary; returns false when none was open
    pub fn dismiss(&mut self) -> bool {
        let dismissed = self.presenter.dismiss();
        self.drain_commands();
        dismissed
    }

    pub fn dismiss_notice(&mut self) {
        self.presenter.dismiss_notice();
    }

    /// Run queued commands
    pub fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            debug!(?command, "Shell command");
            match command {
                ShellCommand::Close => self.close(),
            }
        }
    }

    fn close_on_dismiss(&self) -> Completion {
        let commands = self.command_tx.clone();
        Box::new(move || {
            let _ = commands.send(ShellCommand::Close);
        })
    }

    fn report(&mut self, err: &SessionError) {
        debug!(error = %err, "Session error");
        self.presenter.show_error(err);
    }
}

impl<P: PermissionApi, C: ScanApi> ScreenShell<ScanSession<P, C>> {
    /// Mount the scan screen; scanning starts on [`start`](Self::start)
    pub async fn open(&mut self) -> PermissionStatus {
        self.mount().await
    }

    /// Open the camera stream; returns false if it could not be opened
    pub fn start(&mut self) -> bool {
        if !self.capability_visible {
            return false;
        }
        match self.session.start() {
            Ok(()) => true,
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    pub async fn next_event(&mut self) -> ScanEvent {
        self.session.next_event().await
    }

    /// Apply one scan event to the session and the view
    pub fn apply(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Batch(batch) => {
                if let Some(results) = self.session.accept(batch) {
                    let on_dismiss = Some(self.close_on_dismiss());
                    self.presenter
                        .present(results, PresentMode::Modal { on_dismiss });
                }
            }
            ScanEvent::Ended => {
                if let Some(err) = self.session.ended() {
                    self.report(&err);
                }
            }
        }
    }

    /// Apply every queued event; returns whether any was applied
    pub fn poll(&mut self) -> bool {
        let mut applied = false;
        while let Some(event) = self.session.poll_event() {
            self.apply(event);
            applied = true;
        }
        applied
    }
}

impl<P: PermissionApi, L: LocationApi> ScreenShell<LocationSession<P, L>> {
    /// Mount the location screen and request a first fix once granted
    pub async fn open(&mut self) -> PermissionStatus {
        let status = self.mount().await;
        if status.is_granted() {
            self.locate_once().await;
        }
        status
    }

    /// Show the current position; returns false on failure
    pub async fn locate_once(&mut self) -> bool {
        if !self.capability_visible {
            return false;
        }
        match self.session.get_once().await {
            Ok(reading) => {
                self.presenter.present(
                    vec![CaptureResult::Fix(reading)],
                    PresentMode::Live { watch_count: None },
                );
                true
            }
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Start continuous tracking; returns false if the watch was refused
    pub fn start_tracking(&mut self) -> bool {
        if !self.capability_visible {
            return false;
        }
        match self.session.start_watch() {
            Ok(_) => {
                self.presenter.set_tracking(Some(self.session.watch_count()));
                true
            }
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    pub fn stop_tracking(&mut self) {
        self.session.stop_watch();
        self.presenter.set_tracking(None);
    }

    pub fn is_tracking(&self) -> bool {
        self.session.is_watching()
    }

    pub async fn next_event(&mut self) -> WatchEvent {
        self.session.next_event().await
    }

    /// Apply one watch event to the session and the view
    pub fn apply(&mut self, event: WatchEvent) {
        match self.session.accept(event) {
            Some(WatchUpdate::Fix { reading, count }) => self.presenter.present(
                vec![CaptureResult::Fix(reading)],
                PresentMode::Live {
                    watch_count: Some(count),
                },
            ),
            Some(WatchUpdate::Failed(err)) => {
                self.presenter.set_tracking(None);
                self.report(&err);
            }
            None => {}
        }
    }

    /// Apply every queued event; returns whether any was applied
    pub fn poll(&mut self) -> bool {
        let mut applied = false;
        while let Some(event) = self.session.poll_event() {
            self.apply(event);
            applied = true;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::permission::PolicyPermissions;
    use crate::backends::scanner::ScriptedScanner;
    use crate::backends::{DeviceSelector, ScanOptions};
    use crate::presenter::PresenterView;
    use crate::session::SessionState;

    type ScanShell = ScreenShell<ScanSession<PolicyPermissions, ScriptedScanner>>;

    fn scan_shell(permissions: PolicyPermissions) -> ScanShell {
        ScreenShell::new(ScanSession::new(
            permissions,
            ScriptedScanner::new(),
            DeviceSelector::Back,
            ScanOptions::default(),
        ))
    }

    #[tokio::test]
    async fn test_denied_mount_shows_permission_missing() {
        let mut shell = scan_shell(PolicyPermissions::deny_all());
        assert_eq!(shell.open().await, PermissionStatus::Denied);
        assert!(shell.is_visible());
        assert!(matches!(
            shell.presenter().view(),
            PresenterView::PermissionMissing { .. }
        ));
        assert!(!shell.start());
        assert_eq!(shell.session().scanner().feed().open_count(), 0);
    }

    #[tokio::test]
    async fn test_close_hides_and_resets() {
        let mut shell = scan_shell(PolicyPermissions::grant_all());
        shell.open().await;
        assert!(shell.start());

        shell.close();
        assert!(!shell.is_visible());
        assert_eq!(shell.session().state(), SessionState::Idle);
        assert_eq!(shell.session().scanner().feed().open_now(), 0);
        assert_eq!(shell.presenter().view(), &PresenterView::Awaiting);
    }

    #[tokio::test]
    async fn test_start_after_close_is_refused() {
        let mut shell = scan_shell(PolicyPermissions::grant_all());
        shell.open().await;
        shell.close();
        assert!(!shell.start());
    }

    #[test]
    fn test_dismiss_without_modal_keeps_screen() {
        let mut shell = scan_shell(PolicyPermissions::grant_all());
        assert!(!shell.dismiss());
        assert!(!shell.is_visible());
    }
}
