// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the capability screens
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning one batch of codes
//! - Printing the current position
//! - Tracking the position until interrupted

use capscreens::backends::{self, ScanApi};
use capscreens::config::Config;
use capscreens::fl;
use capscreens::presenter::{PresenterView, ResultPresenter};
use capscreens::session::{LocationSession, ScanSession};
use capscreens::shell::ScreenShell;
use tokio::sync::mpsc;
use tracing::{debug, info};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Ctrl+C as a channel the command loops can select on
fn interrupts() -> Result<mpsc::UnboundedReceiver<()>, ctrlc::Error> {
    let (sender, receiver) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = sender.send(());
    })?;
    Ok(receiver)
}

/// Print the presenter's view; returns an error for views that end a command
fn print_view(presenter: &ResultPresenter) -> CliResult {
    if let Some(notice) = presenter.notice() {
        return Err(format!("{}: {}", notice.title, notice.message).into());
    }

    match presenter.view() {
        PresenterView::Awaiting => {}
        PresenterView::PermissionMissing { message, .. } => return Err(message.clone().into()),
        PresenterView::Unavailable { message } => return Err(message.clone().into()),
        PresenterView::Modal(summary) => {
            println!("{}", summary.title);
            for entry in &summary.entries {
                println!("  {}", entry);
            }
        }
        PresenterView::Live(readout) => {
            for line in readout.lines() {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

/// List all available cameras
pub fn list_devices(config: &Config, simulate: bool) -> CliResult {
    let scanner = backends::create_scanner(config, simulate);
    let devices = scanner.devices();

    if devices.is_empty() {
        println!("{}", fl!("camera-unavailable"));
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {}", index, device.name);
        println!("      Path: {}", device.path);
        if let Some(location) = &device.location {
            println!("      Facing: {}", location);
        }
        println!();
    }

    Ok(())
}

/// Scan until one batch of codes is read, then print the summary
pub async fn scan(config: &Config, simulate: bool) -> CliResult {
    let mut shell = ScreenShell::new(ScanSession::new(
        backends::create_permissions(config.permission_policy),
        backends::create_scanner(config, simulate),
        config.camera,
        config.scan_options(),
    ));
    let mut interrupted = interrupts()?;

    if !shell.open().await.is_granted() || !shell.start() {
        let result = print_view(shell.presenter());
        shell.close();
        return result;
    }
    eprintln!("{}", fl!("scan-hint"));

    loop {
        tokio::select! {
            event = shell.next_event() => shell.apply(event),
            _ = interrupted.recv() => {
                info!("Scan interrupted");
                shell.close();
                return Ok(());
            }
        }

        if shell.presenter().is_modal_open() || shell.presenter().notice().is_some() {
            let result = print_view(shell.presenter());
            // Dismissing the summary closes the screen
            if !shell.dismiss() {
                shell.close();
            }
            return result;
        }
    }
}

/// Print one position fix
pub async fn locate(config: &Config, simulate: bool) -> CliResult {
    let mut shell = ScreenShell::new(LocationSession::with_options(
        backends::create_permissions(config.permission_policy),
        backends::create_locator(config, simulate)?,
        config.single_fix,
        config.watch,
    ));
    let mut interrupted = interrupts()?;

    eprintln!("{}", fl!("location-awaiting"));
    tokio::select! {
        _ = shell.open() => {}
        _ = interrupted.recv() => {
            info!("Locate interrupted");
            shell.close();
            return Ok(());
        }
    }

    let result = print_view(shell.presenter());
    shell.close();
    result
}

/// Print every fix until Ctrl+C or `count` fixes
pub async fn track(config: &Config, simulate: bool, count: Option<u64>) -> CliResult {
    let mut shell = ScreenShell::new(LocationSession::with_options(
        backends::create_permissions(config.permission_policy),
        backends::create_locator(config, simulate)?,
        config.single_fix,
        config.watch,
    ));
    let mut interrupted = interrupts()?;

    if !shell.mount().await.is_granted() || !shell.start_tracking() {
        let result = print_view(shell.presenter());
        shell.close();
        return result;
    }
    eprintln!("{}", fl!("location-awaiting"));

    let mut result = Ok(());
    let mut printed = 0;
    loop {
        tokio::select! {
            event = shell.next_event() => shell.apply(event),
            _ = interrupted.recv() => {
                info!("Tracking interrupted");
                break;
            }
        }

        // A failed watch has already been stopped by the session
        if shell.presenter().notice().is_some() || !shell.is_tracking() {
            result = print_view(shell.presenter());
            break;
        }

        let received = shell.session().watch_count();
        if received > printed {
            printed = received;
            println!();
            print_view(shell.presenter())?;
        }
        if count.is_some_and(|limit| printed >= limit) {
            debug!(printed, "Fix limit reached");
            break;
        }
    }

    shell.stop_tracking();
    shell.close();
    result
}
