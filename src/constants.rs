// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application identifier (config directory, GeoClue desktop id, log file)
pub const APP_ID: &str = "capscreens";

/// Code scanning constants
pub mod scan {
    use crate::backends::CodeType;
    use std::time::Duration;

    /// Symbologies reported when the configuration names none
    pub const DEFAULT_CODE_TYPES: [CodeType; 3] = [CodeType::Qr, CodeType::Ean13, CodeType::Ean8];

    /// Minimum time between decoded frames
    ///
    /// Decoding every frame of a 30fps stream wastes CPU; a code held in
    /// front of the camera is still picked up within a tenth of a second.
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);

    /// Frames are downscaled so their longest side is at most this many pixels
    pub const MAX_DECODE_DIMENSION: u32 = 640;

    /// Preferred capture resolution for V4L2 devices
    pub const CAPTURE_WIDTH: u32 = 640;
    pub const CAPTURE_HEIGHT: u32 = 480;

    /// Number of memory-mapped V4L2 buffers
    pub const CAPTURE_BUFFERS: u32 = 4;

    /// Decoded batches buffered between the capture thread and the session
    pub const BATCH_CHANNEL_CAPACITY: usize = 4;
}

/// Location constants
pub mod location {
    use std::time::Duration;

    /// Give up on a single fix after this long
    pub const SINGLE_FIX_TIMEOUT: Duration = Duration::from_secs(15);

    /// Accept a cached fix for a single request if it is at most this old
    pub const SINGLE_FIX_MAX_AGE: Duration = Duration::from_secs(10);

    /// Minimum time between watch updates
    pub const WATCH_MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Report every movement while watching
    pub const WATCH_DISTANCE_FILTER_M: f64 = 0.0;

    /// Platform speed unit (m/s) to display unit (km/h)
    pub const MPS_TO_KMH: f64 = 3.6;

    /// Fixes buffered between the watch producer and the session
    pub const FIX_CHANNEL_CAPACITY: usize = 16;

    /// Decimal places shown for latitude/longitude
    pub const COORDINATE_DECIMALS: usize = 6;

    /// Decimal places shown for altitude, accuracy and speed
    pub const METRIC_DECIMALS: usize = 2;
}

/// GeoClue2 D-Bus constants
pub mod geoclue {
    pub const SERVICE: &str = "org.freedesktop.GeoClue2";
    pub const MANAGER_PATH: &str = "/org/freedesktop/GeoClue2/Manager";
    pub const MANAGER_INTERFACE: &str = "org.freedesktop.GeoClue2.Manager";
    pub const CLIENT_INTERFACE: &str = "org.freedesktop.GeoClue2.Client";
    pub const LOCATION_INTERFACE: &str = "org.freedesktop.GeoClue2.Location";

    /// GClueAccuracyLevel values
    pub const ACCURACY_CITY: u32 = 4;
    pub const ACCURACY_EXACT: u32 = 8;

    /// Altitude reported when unknown (-DBL_MAX)
    pub const UNKNOWN_ALTITUDE: f64 = -f64::MAX;
}

/// Terminal UI timing
pub mod ui {
    use std::time::Duration;

    /// Redraw/poll period of the terminal loop
    pub const TICK: Duration = Duration::from_millis(16);
}

/// Delay between scripted location fixes in simulation mode
pub const SIMULATED_FIX_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before the scripted scanner "sees" its demo code
pub const SIMULATED_SCAN_DELAY: Duration = Duration::from_millis(1500);
