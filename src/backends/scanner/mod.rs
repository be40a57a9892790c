// SPDX-License-Identifier: GPL-3.0-only

//! Code scanners
//!
//! - [`V4l2Scanner`]: live camera frames
//! - [`ImageScanner`]: image files as frames
//! - [`ScriptedScanner`]: scripted batches for simulation and tests
//!
//! The first two decode through the shared [`QrDecoder`].

pub mod decoder;
mod image_source;
mod scripted;
mod v4l2;

pub use decoder::{LumaFrame, QrDecoder};
pub use image_source::ImageScanner;
pub use scripted::{ScannerFeed, ScriptedScanner};
pub use v4l2::V4l2Scanner;
