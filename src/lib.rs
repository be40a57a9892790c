// SPDX-License-Identifier: MPL-2.0

//! Permission-gated capability screens
//!
//! This library provides a camera code-scanning screen and a location screen
//! built on one shared core: a capture session that only opens its hardware
//! stream once the matching runtime permission is granted.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Permission, camera scanning and location adapters
//! - [`session`]: Permission gate and the scan/location capture sessions
//! - [`presenter`]: Turns results and errors into view state
//! - [`shell`]: Mounts a session and wires it to a presenter
//! - [`terminal`]: ratatui front end hosting both screens
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let mut shell = ScreenShell::new(ScanSession::new(
//!     PolicyPermissions::grant_all(),
//!     ScriptedScanner::demo(),
//!     DeviceSelector::Back,
//!     ScanOptions::default(),
//! ));
//! shell.open().await;
//! shell.start();
//! let event = shell.next_event().await;
//! shell.apply(event);
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod i18n;
pub mod presenter;
pub mod session;
pub mod shell;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult, SessionError, SessionResult};
pub use presenter::{PresentMode, PresenterView, ResultPresenter};
pub use session::{CaptureResult, CaptureSession, LocationSession, ScanSession, SessionState};
pub use shell::ScreenShell;
