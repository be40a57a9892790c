// SPDX-License-Identifier: GPL-3.0-only

//! Result presentation
//!
//! Turns delivered results and session errors into view state. The view is
//! plain data; the terminal front end and the CLI both render it.
//!
//! Two modes:
//! - **Modal**: a dismissible summary of a scanned batch. Dismissal runs the
//!   completion the caller handed in, which is how the screen learns it
//!   should close.
//! - **Live**: a readout replaced on every fix, with an optional tracking
//!   counter.

pub mod format;

use crate::backends::Capability;
use crate::errors::SessionError;
use crate::fl;
use crate::session::{CaptureResult, FixReading};
use tracing::debug;

/// Runs once when a modal summary is dismissed
pub type Completion = Box<dyn FnOnce() + Send>;

/// How a batch of results should be shown
pub enum PresentMode {
    Modal { on_dismiss: Option<Completion> },
    Live { watch_count: Option<u64> },
}

/// Dismissible summary of a scanned batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalSummary {
    pub title: String,
    pub entries: Vec<String>,
    pub button: String,
}

/// Most recent fix plus the tracking counter
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveReadout {
    pub reading: Option<FixReading>,
    /// Fixes since tracking started; `None` when not tracking
    pub watch_count: Option<u64>,
}

impl LiveReadout {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = match &self.reading {
            Some(reading) => format::reading_lines(reading),
            None => vec![fl!("location-awaiting")],
        };
        if let Some(count) = self.watch_count {
            lines.push(format::tracking_line(count));
        }
        lines
    }
}

/// Transient message shown over the current view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenterView {
    /// Nothing delivered yet
    Awaiting,
    /// Access not granted; `action` labels the re-request affordance
    PermissionMissing {
        capability: Capability,
        message: String,
        action: String,
    },
    /// No device or service backs the capability
    Unavailable { message: String },
    Modal(ModalSummary),
    Live(LiveReadout),
}

/// View state of one screen
pub struct ResultPresenter {
    capability: Capability,
    view: PresenterView,
    notice: Option<Notice>,
    on_dismiss: Option<Completion>,
    modals_shown: usize,
}

impl ResultPresenter {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            view: PresenterView::Awaiting,
            notice: None,
            on_dismiss: None,
            modals_shown: 0,
        }
    }

    pub fn view(&self) -> &PresenterView {
        &self.view
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Modal summaries presented since creation
    pub fn modals_shown(&self) -> usize {
        self.modals_shown
    }

    pub fn is_modal_open(&self) -> bool {
        matches!(self.view, PresenterView::Modal(_))
    }

    /// Show delivered results
    pub fn present(&mut self, results: Vec<CaptureResult>, mode: PresentMode) {
        match mode {
            PresentMode::Modal { on_dismiss } => {
                if results.is_empty() {
                    debug!("Nothing to summarize");
                    return;
                }
                let entries = results
                    .iter()
                    .enumerate()
                    .map(|(i, result)| format::result_entry(i + 1, result))
                    .collect::<Vec<_>>();
                self.view = PresenterView::Modal(ModalSummary {
                    title: format::summary_title(entries.len()),
                    entries,
                    button: fl!("scan-modal-ok"),
                });
                self.on_dismiss = on_dismiss;
                self.modals_shown += 1;
            }
            PresentMode::Live { watch_count } => {
                let latest = results.iter().rev().find_map(|result| match result {
                    CaptureResult::Fix(reading) => Some(*reading),
                    CaptureResult::Code(_) => None,
                });
                let reading = latest.or_else(|| self.readout().and_then(|r| r.reading));
                self.view = PresenterView::Live(LiveReadout {
                    reading,
                    watch_count,
                });
            }
        }
    }

    fn readout(&self) -> Option<&LiveReadout> {
        match &self.view {
            PresenterView::Live(readout) => Some(readout),
            _ => None,
        }
    }

    /// Map a session error onto the view
    pub fn show_error(&mut self, err: &SessionError) {
        match err {
            SessionError::PermissionDenied(capability) => {
                let (message, action) = match capability {
                    Capability::Camera => (
                        fl!("camera-permission-missing"),
                        fl!("camera-permission-request"),
                    ),
                    Capability::FineLocation => (
                        fl!("location-permission-missing"),
                        fl!("location-permission-request"),
                    ),
                };
                self.view = PresenterView::PermissionMissing {
                    capability: *capability,
                    message,
                    action,
                };
            }
            SessionError::CapabilityUnavailable(detail) => {
                debug!(%detail, "Capability unavailable");
                let message = match self.capability {
                    Capability::Camera => fl!("camera-unavailable"),
                    Capability::FineLocation => fl!("location-unavailable"),
                };
                self.view = PresenterView::Unavailable { message };
            }
            SessionError::StreamTimeout => self.notify(fl!("error-timeout")),
            SessionError::Busy => self.notify(fl!("error-busy")),
            SessionError::StreamError(message) => {
                self.notify(fl!("error-failure", message = message.as_str()))
            }
        }
    }

    fn notify(&mut self, message: String) {
        self.notice = Some(Notice {
            title: fl!("error-title"),
            message,
        });
    }

    /// Close the modal summary and run its completion
    ///
    /// Returns false when no modal was open.
    pub fn dismiss(&mut self) -> bool {
        if !self.is_modal_open() {
            return false;
        }
        self.view = PresenterView::Awaiting;
        if let Some(completion) = self.on_dismiss.take() {
            completion();
        }
        true
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Update or drop the tracking counter line
    pub fn set_tracking(&mut self, watch_count: Option<u64>) {
        match &mut self.view {
            PresenterView::Live(readout) => readout.watch_count = watch_count,
            _ if watch_count.is_some() => {
                self.view = PresenterView::Live(LiveReadout {
                    reading: None,
                    watch_count,
                });
            }
            _ => {}
        }
    }

    /// Back to the placeholder; a pending completion is dropped unrun
    pub fn reset(&mut self) {
        self.view = PresenterView::Awaiting;
        self.notice = None;
        self.on_dismiss = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{CodeType, ScannedCode};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn codes(values: &[(CodeType, &str)]) -> Vec<CaptureResult> {
        values
            .iter()
            .map(|(kind, value)| CaptureResult::Code(ScannedCode::new(*kind, *value)))
            .collect()
    }

    fn reading(latitude: f64) -> FixReading {
        FixReading {
            latitude,
            longitude: -46.6,
            altitude_m: Some(760.0),
            speed_kmh: None,
            accuracy_m: Some(5.0),
        }
    }

    #[test]
    fn test_single_code_is_still_indexed() {
        let mut presenter = ResultPresenter::new(Capability::Camera);
        presenter.present(
            codes(&[(CodeType::Qr, "ABC123")]),
            PresentMode::Modal { on_dismiss: None },
        );

        let PresenterView::Modal(summary) = presenter.view() else {
            panic!("expected modal, got {:?}", presenter.view());
        };
        assert_eq!(summary.title, "Código digitalizado");
        assert_eq!(summary.entries, vec!["1. Tipo: qr, Dado: ABC123"]);
        assert_eq!(summary.button, "Ok");
    }

    #[test]
    fn test_several_codes_in_delivery_order() {
        let mut presenter = ResultPresenter::new(Capability::Camera);
        presenter.present(
            codes(&[
                (CodeType::Qr, "first"),
                (CodeType::Ean8, "96385074"),
                (CodeType::Qr, "third"),
            ]),
            PresentMode::Modal { on_dismiss: None },
        );

        let PresenterView::Modal(summary) = presenter.view() else {
            panic!("expected modal");
        };
        assert_eq!(summary.title, "Códigos digitalizados (3)");
        assert_eq!(summary.entries[0], "1. Tipo: qr, Dado: first");
        assert_eq!(summary.entries[1], "2. Tipo: ean-8, Dado: 96385074");
        assert_eq!(summary.entries[2], "3. Tipo: qr, Dado: third");
    }

    #[test]
    fn test_empty_batch_shows_nothing() {
        let mut presenter = ResultPresenter::new(Capability::Camera);
        presenter.present(Vec::new(), PresentMode::Modal { on_dismiss: None });
        assert_eq!(presenter.view(), &PresenterView::Awaiting);
        assert_eq!(presenter.modals_shown(), 0);
    }

    #[test]
    fn test_dismiss_runs_completion_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut presenter = ResultPresenter::new(Capability::Camera);
        presenter.present(
            codes(&[(CodeType::Qr, "ABC123")]),
            PresentMode::Modal {
                on_dismiss: Some(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            },
        );

        assert!(presenter.dismiss());
        assert!(!presenter.dismiss());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(presenter.view(), &PresenterView::Awaiting);
    }

    #[test]
    fn test_live_keeps_last_reading_when_only_counter_changes() {
        let mut presenter = ResultPresenter::new(Capability::FineLocation);
        presenter.present(
            vec![CaptureResult::Fix(reading(-23.5))],
            PresentMode::Live {
                watch_count: Some(1),
            },
        );
        presenter.present(
            Vec::new(),
            PresentMode::Live {
                watch_count: Some(2),
            },
        );

        let PresenterView::Live(readout) = presenter.view() else {
            panic!("expected live readout");
        };
        assert_eq!(readout.reading, Some(reading(-23.5)));
        assert_eq!(
            readout.lines().last().map(String::as_str),
            Some("Rastreando continuamente... (2)")
        );
    }

    #[test]
    fn test_set_tracking_none_drops_counter_line() {
        let mut presenter = ResultPresenter::new(Capability::FineLocation);
        presenter.set_tracking(Some(0));
        presenter.set_tracking(None);

        let PresenterView::Live(readout) = presenter.view() else {
            panic!("expected live readout");
        };
        assert_eq!(readout.lines(), vec!["Aguarde..."]);
    }

    #[test]
    fn test_errors_map_to_views_and_notices() {
        let mut presenter = ResultPresenter::new(Capability::FineLocation);

        presenter.show_error(&SessionError::StreamTimeout);
        assert_eq!(presenter.view(), &PresenterView::Awaiting);
        assert!(presenter.notice().is_some());
        presenter.dismiss_notice();

        presenter.show_error(&SessionError::CapabilityUnavailable("no geoclue".into()));
        assert_eq!(
            presenter.view(),
            &PresenterView::Unavailable {
                message: "Serviço de localização indisponível".into()
            }
        );

        presenter.show_error(&SessionError::PermissionDenied(Capability::FineLocation));
        assert!(matches!(
            presenter.view(),
            PresenterView::PermissionMissing {
                capability: Capability::FineLocation,
                ..
            }
        ));

        presenter.show_error(&SessionError::StreamError("gone".into()));
        assert_eq!(
            presenter.notice().map(|n| n.message.as_str()),
            Some("Falha: gone")
        );
    }
}
