// SPDX-License-Identifier: GPL-3.0-only

//! Display formatting for delivered results

use crate::backends::ScannedCode;
use crate::constants::location::{COORDINATE_DECIMALS, METRIC_DECIMALS};
use crate::fl;
use crate::session::{CaptureResult, FixReading};

/// Placeholder for a value the platform did not report
pub const MISSING: &str = "-";

pub fn coordinate(value: f64) -> String {
    format!("{:.*}", COORDINATE_DECIMALS, value)
}

/// Distance in meters, two decimals
pub fn meters(value: Option<f64>) -> String {
    match value {
        Some(m) => format!("{:.*} m", METRIC_DECIMALS, m),
        None => MISSING.to_string(),
    }
}

/// Speed already converted to km/h
pub fn speed(value: Option<f64>) -> String {
    match value {
        Some(kmh) => format!("{:.*} km/h", METRIC_DECIMALS, kmh),
        None => MISSING.to_string(),
    }
}

/// Modal title for a batch of `count` codes
pub fn summary_title(count: usize) -> String {
    if count == 1 {
        fl!("scan-title-single")
    } else {
        fl!("scan-title-multiple", count = count)
    }
}

/// One modal line; `index` is 1-based
pub fn code_entry(index: usize, code: &ScannedCode) -> String {
    fl!(
        "scan-entry",
        index = index,
        kind = code.kind.as_str(),
        value = code.value.as_str()
    )
}

/// One modal line for any result
pub fn result_entry(index: usize, result: &CaptureResult) -> String {
    match result {
        CaptureResult::Code(code) => code_entry(index, code),
        CaptureResult::Fix(reading) => format!(
            "{}. {}, {}",
            index,
            coordinate(reading.latitude),
            coordinate(reading.longitude)
        ),
    }
}

/// Readout lines for a fix
pub fn reading_lines(reading: &FixReading) -> Vec<String> {
    vec![
        fl!("location-current"),
        fl!("location-latitude", value = coordinate(reading.latitude)),
        fl!("location-longitude", value = coordinate(reading.longitude)),
        fl!("location-altitude", value = meters(reading.altitude_m)),
        fl!("location-speed", value = speed(reading.speed_kmh)),
        fl!("location-accuracy", value = meters(reading.accuracy_m)),
    ]
}

pub fn tracking_line(count: u64) -> String {
    fl!("location-tracking", count = count)
}
