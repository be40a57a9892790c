// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the scan screen: permission gating, the one-shot
//! modal and shell teardown

use capscreens::backends::permission::{ChannelPermissions, PolicyPermissions, PromptAnswer};
use capscreens::backends::scanner::ScriptedScanner;
use capscreens::backends::{
    Capability, CodeType, DeviceSelector, PermissionStatus, ScanOptions, ScannedCode,
};
use capscreens::presenter::PresenterView;
use capscreens::session::{CaptureSession, ScanEvent, ScanSession, SessionState};
use capscreens::shell::ScreenShell;
use capscreens::{CaptureResult, SessionError};
use std::time::Duration;

type Shell = ScreenShell<ScanSession<PolicyPermissions, ScriptedScanner>>;

fn shell_with(permissions: PolicyPermissions) -> Shell {
    ScreenShell::new(ScanSession::new(
        permissions,
        ScriptedScanner::new(),
        DeviceSelector::Back,
        ScanOptions::default(),
    ))
}

fn qr(value: &str) -> ScannedCode {
    ScannedCode::new(CodeType::Qr, value)
}

/// Pull the next event the way the UI loop does
async fn pump(shell: &mut Shell) {
    let event = tokio::time::timeout(Duration::from_secs(5), shell.next_event())
        .await
        .expect("no scan event");
    shell.apply(event);
}

#[tokio::test]
async fn test_no_stream_without_grant() {
    let cases = [
        (
            PolicyPermissions::scripted(
                [Ok(PermissionStatus::Undetermined)],
                PermissionStatus::Undetermined,
            ),
            PermissionStatus::Undetermined,
        ),
        (PolicyPermissions::deny_all(), PermissionStatus::Denied),
    ];

    for (permissions, expected) in cases {
        let mut shell = shell_with(permissions);
        let feed = shell.session().scanner().feed();

        assert_eq!(shell.open().await, expected);
        assert!(!shell.start(), "start must fail while {}", expected);
        assert_eq!(
            shell.session_mut().start(),
            Err(SessionError::PermissionDenied(Capability::Camera))
        );
        assert_eq!(feed.open_count(), 0);
        assert_eq!(shell.session().state(), SessionState::Idle);
    }

    let mut shell = shell_with(PolicyPermissions::grant_all());
    assert_eq!(shell.open().await, PermissionStatus::Granted);
    assert!(shell.start());
    assert_eq!(shell.session().scanner().feed().open_count(), 1);
}

#[test]
fn test_unresolved_session_refuses_to_start() {
    // Pre-granted on the platform, but the gate was never resolved
    let mut session = ScanSession::new(
        PolicyPermissions::pre_granted([Capability::Camera]),
        ScriptedScanner::new(),
        DeviceSelector::Back,
        ScanOptions::default(),
    );
    assert_eq!(
        session.start(),
        Err(SessionError::PermissionDenied(Capability::Camera))
    );
    assert_eq!(session.scanner().feed().open_count(), 0);
}

#[tokio::test]
async fn test_at_most_one_stream() {
    let mut shell = shell_with(PolicyPermissions::grant_all());
    let feed = shell.session().scanner().feed();
    shell.open().await;

    assert!(shell.start());
    assert!(shell.start());
    shell.session_mut().stop();
    assert!(shell.start());
    shell.session_mut().stop();
    shell.session_mut().stop();
    assert!(shell.start());
    shell.close();
    shell.open().await;
    assert!(shell.start());
    assert!(shell.start());

    assert_eq!(feed.open_count(), 4);
    assert_eq!(feed.max_concurrent(), 1);
    assert_eq!(feed.open_now(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_permission_prompt_then_stop() {
    let (permissions, mut prompts) = ChannelPermissions::new();
    let mut shell = ScreenShell::new(ScanSession::new(
        permissions,
        ScriptedScanner::new(),
        DeviceSelector::Back,
        ScanOptions::default(),
    ));
    let feed = shell.session().scanner().feed();

    // Nobody answers the dialog; the user backs out instead
    let cancelled = tokio::time::timeout(Duration::from_secs(1), shell.open()).await;
    assert!(cancelled.is_err());
    let request = prompts.try_recv().expect("dialog shown");
    assert_eq!(request.capability, Capability::Camera);

    shell.session_mut().stop();
    assert_ne!(shell.session().state(), SessionState::Active);
    assert!(!shell.session().is_stream_open());
    assert!(!shell.start());
    assert_eq!(feed.open_count(), 0);

    // An answer arriving after the cancel changes nothing
    request.answer(PromptAnswer::Allow);
    assert!(!shell.start());
    assert_eq!(feed.open_count(), 0);

    shell.close();
    assert!(!shell.is_visible());
}

#[tokio::test]
async fn test_stop_after_stream_open_suspends() {
    let mut shell = shell_with(PolicyPermissions::grant_all());
    let feed = shell.session().scanner().feed();
    shell.open().await;
    assert!(shell.start());

    shell.session_mut().stop();
    assert_eq!(shell.session().state(), SessionState::Suspended);
    assert!(!shell.session().is_stream_open());
    assert_eq!(feed.open_now(), 0);
}

#[tokio::test]
async fn test_batch_suspends_before_modal() {
    let mut session = ScanSession::new(
        PolicyPermissions::pre_granted([Capability::Camera]),
        ScriptedScanner::new(),
        DeviceSelector::Back,
        ScanOptions::default(),
    );
    session.gate_mut().resolve();
    session.start().unwrap();
    let feed = session.scanner().feed();

    assert!(feed.emit(vec![qr("one"), qr("two"), qr("three")]));
    let ScanEvent::Batch(batch) = session.next_event().await else {
        panic!("expected a batch");
    };

    let results = session.accept(batch).expect("batch accepted");
    // Already suspended and closed when the results are handed out
    assert_eq!(session.state(), SessionState::Suspended);
    assert!(!session.is_stream_open());
    assert_eq!(feed.open_now(), 0);
    assert_eq!(
        results,
        vec![
            CaptureResult::Code(qr("one")),
            CaptureResult::Code(qr("two")),
            CaptureResult::Code(qr("three")),
        ]
    );

    // A frame decoded afterwards is never delivered
    assert!(!feed.emit(vec![qr("late")]));
    assert_eq!(session.accept(vec![qr("late")]), None);
}

#[tokio::test]
async fn test_one_modal_with_every_code() {
    let mut shell = shell_with(PolicyPermissions::grant_all());
    let feed = shell.session().scanner().feed();
    shell.open().await;
    shell.start();

    assert!(feed.emit(vec![
        qr("https://example.org"),
        ScannedCode::new(CodeType::Ean13, "7891234567895"),
    ]));
    pump(&mut shell).await;

    assert_eq!(shell.presenter().modals_shown(), 1);
    let PresenterView::Modal(summary) = shell.presenter().view() else {
        panic!("expected modal, got {:?}", shell.presenter().view());
    };
    assert_eq!(summary.title, "Códigos digitalizados (2)");
    assert_eq!(
        summary.entries,
        vec![
            "1. Tipo: qr, Dado: https://example.org",
            "2. Tipo: ean-13, Dado: 7891234567895",
        ]
    );

    // Nothing else can reach the presenter
    assert!(!shell.poll());
    assert_eq!(shell.presenter().modals_shown(), 1);
}

#[tokio::test]
async fn test_empty_batch_shows_no_modal() {
    let mut shell = shell_with(PolicyPermissions::grant_all());
    let feed = shell.session().scanner().feed();
    shell.open().await;
    shell.start();

    assert!(feed.emit(Vec::new()));
    pump(&mut shell).await;

    assert_eq!(shell.presenter().modals_shown(), 0);
    assert_eq!(shell.presenter().view(), &PresenterView::Awaiting);
    assert_eq!(shell.session().state(), SessionState::Active);
}

#[tokio::test]
async fn test_stop_twice_equals_stop_once() {
    let mut once = shell_with(PolicyPermissions::grant_all());
    let mut twice = shell_with(PolicyPermissions::grant_all());
    for shell in [&mut once, &mut twice] {
        shell.open().await;
        shell.start();
    }

    once.session_mut().stop();
    twice.session_mut().stop();
    twice.session_mut().stop();

    assert_eq!(once.session().state(), twice.session().state());
    assert_eq!(once.session().state(), SessionState::Suspended);
    assert_eq!(
        once.session().scanner().feed().open_now(),
        twice.session().scanner().feed().open_now()
    );
    assert_eq!(once.presenter().view(), twice.presenter().view());
}

#[tokio::test]
async fn test_stream_end_is_reported() {
    let mut shell = shell_with(PolicyPermissions::grant_all());
    shell.open().await;
    shell.start();
    shell.session().scanner().feed().end_stream();
    pump(&mut shell).await;

    assert_eq!(shell.session().state(), SessionState::Suspended);
    let notice = shell.presenter().notice().expect("notice shown");
    assert!(notice.message.starts_with("Falha:"));
}

#[tokio::test]
async fn test_no_camera_shows_unavailable() {
    let mut shell = ScreenShell::new(ScanSession::new(
        PolicyPermissions::grant_all(),
        ScriptedScanner::with_devices(Vec::new()),
        DeviceSelector::Back,
        ScanOptions::default(),
    ));
    shell.open().await;

    assert!(!shell.start());
    assert_eq!(
        shell.presenter().view(),
        &PresenterView::Unavailable {
            message: "Nenhum dispositivo de câmera encontrado".into()
        }
    );
}

#[tokio::test]
async fn test_denied_then_granted_scan_scenario() {
    let permissions = PolicyPermissions::scripted(
        [Ok(PermissionStatus::Denied), Ok(PermissionStatus::Granted)],
        PermissionStatus::Denied,
    );
    let probe = permissions.probe();
    let mut shell = shell_with(permissions);
    let feed = shell.session().scanner().feed();

    // Undetermined, prompted, denied
    assert_eq!(shell.session().gate().status(), PermissionStatus::Undetermined);
    assert_eq!(shell.open().await, PermissionStatus::Denied);
    let PresenterView::PermissionMissing { action, .. } = shell.presenter().view() else {
        panic!("expected permission missing view");
    };
    assert_eq!(action, "Pedir permissão para acessar câmera");

    // Retry from the affordance, granted this time
    assert_eq!(shell.retry_permission().await, PermissionStatus::Granted);
    assert_eq!(shell.presenter().view(), &PresenterView::Awaiting);
    assert_eq!(probe.request_count(), 2);

    assert!(shell.start());
    assert!(feed.emit(vec![qr("ABC123")]));
    pump(&mut shell).await;

    assert_eq!(shell.session().state(), SessionState::Suspended);
    let PresenterView::Modal(summary) = shell.presenter().view() else {
        panic!("expected modal");
    };
    assert_eq!(summary.title, "Código digitalizado");
    assert_eq!(summary.entries, vec!["1. Tipo: qr, Dado: ABC123"]);

    // Dismissal closes the screen through the queued command
    assert!(shell.dismiss());
    assert!(!shell.is_visible());
    assert_eq!(shell.session().state(), SessionState::Idle);
    assert_eq!(shell.session().gate().status(), PermissionStatus::Undetermined);
    assert_eq!(feed.open_now(), 0);
    assert_eq!(feed.open_count(), 1);
}

#[tokio::test]
async fn test_demo_scanner_delivers_after_delay() {
    let mut shell = ScreenShell::new(ScanSession::new(
        PolicyPermissions::grant_all(),
        ScriptedScanner::new().with_auto_batch(Duration::from_millis(20), vec![qr("ABC123")]),
        DeviceSelector::Back,
        ScanOptions::default(),
    ));
    shell.open().await;
    assert!(shell.start());
    pump(&mut shell).await;

    assert!(shell.presenter().is_modal_open());
    assert!(shell.dismiss());
    assert!(!shell.is_visible());
}
