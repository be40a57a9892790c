// SPDX-License-Identifier: GPL-3.0-only

//! GeoClue2 location provider
//!
//! Talks to `org.freedesktop.GeoClue2` on the system bus. Each request gets
//! its own bus connection and client object; GeoClue releases the client
//! when the connection goes away, so dropping a request future or aborting a
//! watch task is enough to stop location updates.

use super::FixCache;
use crate::backends::{
    BackendError, BackendResult, Fix, FixStream, LocationApi, LocationOptions, WatchHandle,
};
use crate::constants::geoclue::{
    ACCURACY_CITY, ACCURACY_EXACT, CLIENT_INTERFACE, LOCATION_INTERFACE, MANAGER_INTERFACE,
    MANAGER_PATH, SERVICE, UNKNOWN_ALTITUDE,
};
use crate::constants::location::FIX_CHANNEL_CAPACITY;
use chrono::Utc;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::zvariant::OwnedObjectPath;

/// Location provider backed by GeoClue2
pub struct GeoClueLocation {
    desktop_id: String,
    cache: Arc<Mutex<FixCache>>,
    watches: HashMap<WatchHandle, JoinHandle<()>>,
}

impl GeoClueLocation {
    pub fn new(desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: desktop_id.into(),
            cache: Arc::new(Mutex::new(FixCache::default())),
            watches: HashMap::new(),
        }
    }
}

/// A started GeoClue client and its update signal stream
struct GeoClueClient {
    connection: zbus::Connection,
    client_path: OwnedObjectPath,
    updates: zbus::proxy::SignalStream<'static>,
}

impl GeoClueClient {
    /// Create, configure and start a client
    async fn start(desktop_id: &str, options: &LocationOptions) -> BackendResult<Self> {
        let connection = zbus::Connection::system()
            .await
            .map_err(|e| BackendError::NotAvailable(format!("system bus: {}", e)))?;

        let manager =
            zbus::Proxy::new(&connection, SERVICE, MANAGER_PATH, MANAGER_INTERFACE).await?;
        let client_path: OwnedObjectPath = manager.call("GetClient", &()).await?;

        let client =
            zbus::Proxy::new(&connection, SERVICE, client_path.as_str(), CLIENT_INTERFACE).await?;

        let accuracy = if options.enable_high_accuracy {
            ACCURACY_EXACT
        } else {
            ACCURACY_CITY
        };
        let time_threshold = options.min_interval().as_secs_f64().ceil() as u32;

        client.set_property("DesktopId", desktop_id).await?;
        client.set_property("RequestedAccuracyLevel", accuracy).await?;
        client
            .set_property("DistanceThreshold", options.distance_filter_m.round() as u32)
            .await?;
        client.set_property("TimeThreshold", time_threshold).await?;

        // Subscribe before starting so the first update is not missed
        let updates = client.receive_signal("LocationUpdated").await?;
        let _: () = client.call("Start", &()).await?;

        info!(
            client = %client_path,
            accuracy,
            time_threshold,
            "GeoClue client started"
        );

        Ok(Self {
            connection,
            client_path,
            updates,
        })
    }

    /// Wait for the next `LocationUpdated` signal and read the new location
    async fn next_fix(&mut self) -> BackendResult<Fix> {
        let message = self.updates.next().await.ok_or(BackendError::StreamClosed)?;
        let (_old, new): (OwnedObjectPath, OwnedObjectPath) = message.body().deserialize()?;
        self.read_location(&new).await
    }

    async fn read_location(&self, path: &OwnedObjectPath) -> BackendResult<Fix> {
        let location =
            zbus::Proxy::new(&self.connection, SERVICE, path.as_str(), LOCATION_INTERFACE).await?;

        let latitude: f64 = location.get_property("Latitude").await?;
        let longitude: f64 = location.get_property("Longitude").await?;
        let accuracy: f64 = location.get_property("Accuracy").await?;
        let altitude: f64 = location.get_property("Altitude").await.unwrap_or(UNKNOWN_ALTITUDE);
        let speed: f64 = location.get_property("Speed").await.unwrap_or(-1.0);

        let fix = Fix {
            latitude,
            longitude,
            altitude: known_altitude(altitude),
            accuracy: (accuracy >= 0.0).then_some(accuracy),
            speed: (speed >= 0.0).then_some(speed),
            timestamp: Utc::now(),
        };

        debug!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            accuracy = ?fix.accuracy,
            "GeoClue location update"
        );
        Ok(fix)
    }

    async fn stop(self) {
        match zbus::Proxy::new(
            &self.connection,
            SERVICE,
            self.client_path.as_str(),
            CLIENT_INTERFACE,
        )
        .await
        {
            Ok(client) => {
                let stopped: zbus::Result<()> = client.call("Stop", &()).await;
                if let Err(e) = stopped {
                    debug!(error = %e, "Failed to stop GeoClue client");
                }
            }
            Err(e) => debug!(error = %e, "Failed to reach GeoClue client"),
        }
    }
}

/// GeoClue reports an unknown altitude as -DBL_MAX
fn known_altitude(altitude: f64) -> Option<f64> {
    (altitude.is_finite() && altitude > UNKNOWN_ALTITUDE / 2.0).then_some(altitude)
}

fn remember(cache: &Mutex<FixCache>, fix: &Fix) {
    if let Ok(mut cache) = cache.lock() {
        cache.store(fix);
    }
}

impl LocationApi for GeoClueLocation {
    fn get_once(&mut self, options: LocationOptions) -> BoxFuture<'_, BackendResult<Fix>> {
        Box::pin(async move {
            let cached = self
                .cache
                .lock()
                .ok()
                .and_then(|c| c.fresh(options.maximum_age()));
            if let Some(fix) = cached {
                debug!("Answering single fix from cache");
                return Ok(fix);
            }

            let mut client = GeoClueClient::start(&self.desktop_id, &options).await?;
            let fix = client.next_fix().await;
            client.stop().await;

            let fix = fix?;
            remember(&self.cache, &fix);
            Ok(fix)
        })
    }

    fn watch(&mut self, options: LocationOptions) -> BackendResult<FixStream> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| BackendError::NotAvailable("no async runtime for watch".into()))?;

        let handle = WatchHandle::new();
        let (mut sender, receiver) = mpsc::channel(FIX_CHANNEL_CAPACITY);
        let desktop_id = self.desktop_id.clone();
        let cache = Arc::clone(&self.cache);

        let task = runtime.spawn(async move {
            let mut client = match GeoClueClient::start(&desktop_id, &options).await {
                Ok(client) => client,
                Err(e) => {
                    warn!(error = %e, "Failed to start GeoClue watch");
                    let _ = sender.send(Err(e)).await;
                    return;
                }
            };

            loop {
                let update = client.next_fix().await;
                if let Ok(fix) = &update {
                    remember(&cache, fix);
                }
                let failed = update.is_err();
                if sender.send(update).await.is_err() || failed {
                    break;
                }
            }

            client.stop().await;
        });

        info!(%handle, "GeoClue watch started");
        self.watches.insert(handle, task);
        Ok(FixStream::new(handle, receiver))
    }

    fn clear_watch(&mut self, handle: WatchHandle) {
        if let Some(task) = self.watches.remove(&handle) {
            task.abort();
            info!(%handle, "GeoClue watch cleared");
        }
    }
}

impl Drop for GeoClueLocation {
    fn drop(&mut self) {
        for (_, task) in self.watches.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_altitude() {
        assert_eq!(known_altitude(UNKNOWN_ALTITUDE), None);
        assert_eq!(known_altitude(f64::NAN), None);
        assert_eq!(known_altitude(760.5), Some(760.5));
        assert_eq!(known_altitude(-12.0), Some(-12.0));
    }

    #[test]
    fn test_watch_without_runtime_is_unavailable() {
        let mut geoclue = GeoClueLocation::new("capscreens");
        assert!(matches!(
            geoclue.watch(LocationOptions::watch()),
            Err(BackendError::NotAvailable(_))
        ));
    }

    #[test]
    fn test_clear_unknown_watch_is_ignored() {
        let mut geoclue = GeoClueLocation::new("capscreens");
        geoclue.clear_watch(WatchHandle::new());
    }
}
