// SPDX-License-Identifier: GPL-3.0-only

//! Scripted location provider
//!
//! Three sources of fixes:
//! - a [`LocationFeed`] that tests push fixes and failures through
//! - a simulated walk (`--simulate`)
//! - a JSON-lines replay file, one serialized [`Fix`] per line
//!
//! Walk and replay fixes are played in a loop, one per interval, with fresh
//! timestamps.

use super::FixCache;
use crate::backends::{
    BackendError, BackendResult, Fix, FixStream, LocationApi, LocationOptions, WatchHandle,
};
use crate::constants::SIMULATED_FIX_INTERVAL;
use crate::constants::location::FIX_CHANNEL_CAPACITY;
use chrono::Utc;
use futures::SinkExt;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Meters per degree of latitude
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Default)]
struct FeedState {
    /// Answers for upcoming single requests
    once: VecDeque<BackendResult<Fix>>,
    watches: HashMap<WatchHandle, mpsc::Sender<BackendResult<Fix>>>,
    get_once_calls: usize,
    watch_calls: usize,
    cleared: Vec<WatchHandle>,
}

/// Control and observation handle for a [`ScriptedLocation`]
#[derive(Debug, Clone, Default)]
pub struct LocationFeed {
    state: Arc<Mutex<FeedState>>,
}

impl LocationFeed {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer the next single request with `result`
    pub fn queue_once(&self, result: BackendResult<Fix>) {
        self.lock().once.push_back(result);
    }

    /// Deliver an update to every running watch; returns how many got it
    pub fn emit(&self, update: BackendResult<Fix>) -> usize {
        let mut state = self.lock();
        state
            .watches
            .values_mut()
            .map(|sender| sender.try_send(update.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }

    /// Deliver an update to one running watch
    pub fn emit_to(&self, handle: WatchHandle, update: BackendResult<Fix>) -> bool {
        self.lock()
            .watches
            .get_mut(&handle)
            .is_some_and(|sender| sender.try_send(update).is_ok())
    }

    /// Number of `get_once` calls
    pub fn get_once_calls(&self) -> usize {
        self.lock().get_once_calls
    }

    /// Number of `watch` calls
    pub fn watch_calls(&self) -> usize {
        self.lock().watch_calls
    }

    /// Watches currently running
    pub fn active_watches(&self) -> Vec<WatchHandle> {
        self.lock().watches.keys().copied().collect()
    }

    /// Handles passed to `clear_watch`, in order
    pub fn cleared(&self) -> Vec<WatchHandle> {
        self.lock().cleared.clone()
    }
}

/// Location provider with scripted fixes
pub struct ScriptedLocation {
    feed: LocationFeed,
    cache: FixCache,
    /// Points played by single requests and watches when the feed is empty
    track: Option<Arc<Vec<Fix>>>,
    cursor: usize,
    interval: Duration,
    tasks: HashMap<WatchHandle, JoinHandle<()>>,
}

impl Default for ScriptedLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLocation {
    /// Provider driven only through its [`LocationFeed`]
    ///
    /// A single request with nothing queued never resolves, like a platform
    /// that cannot get a fix.
    pub fn new() -> Self {
        Self {
            feed: LocationFeed::default(),
            cache: FixCache::default(),
            track: None,
            cursor: 0,
            interval: SIMULATED_FIX_INTERVAL,
            tasks: HashMap::new(),
        }
    }

    /// Simulated walk through central São Paulo
    pub fn walk() -> Self {
        Self::from_track(simulated_walk(120))
    }

    /// Replay fixes from a JSON-lines file
    pub fn replay(path: &Path) -> BackendResult<Self> {
        let fixes = load_replay(path)?;
        info!(path = %path.display(), count = fixes.len(), "Loaded location replay");
        Ok(Self::from_track(fixes))
    }

    fn from_track(track: Vec<Fix>) -> Self {
        let mut location = Self::new();
        if !track.is_empty() {
            location.track = Some(Arc::new(track));
        }
        location
    }

    /// Change the delay between played fixes
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn feed(&self) -> LocationFeed {
        self.feed.clone()
    }

    fn next_track_fix(&mut self) -> Option<Fix> {
        let track = self.track.as_ref()?;
        let mut fix = track[self.cursor % track.len()].clone();
        self.cursor += 1;
        fix.timestamp = Utc::now();
        Some(fix)
    }
}

/// Load a JSON-lines file of fixes; blank lines are skipped
pub fn load_replay(path: &Path) -> BackendResult<Vec<Fix>> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|e| BackendError::Other(format!("line {}: {}", index + 1, e)))
        })
        .collect()
}

/// Points along a straight walk heading north-east at about 1.4 m/s
fn simulated_walk(points: usize) -> Vec<Fix> {
    const START: (f64, f64) = (-23.550520, -46.633308);
    const SPEED_MPS: f64 = 1.4;

    let step = SPEED_MPS * SIMULATED_FIX_INTERVAL.as_secs_f64();
    let lat_step = step * std::f64::consts::FRAC_1_SQRT_2 / METERS_PER_DEGREE;
    let lon_step = step * std::f64::consts::FRAC_1_SQRT_2
        / (METERS_PER_DEGREE * START.0.to_radians().cos());

    (0..points)
        .map(|i| {
            let mut fix = Fix::new(START.0 + lat_step * i as f64, START.1 + lon_step * i as f64);
            fix.altitude = Some(760.0 + (i % 10) as f64 * 0.25);
            fix.accuracy = Some(5.0);
            fix.speed = Some(SPEED_MPS);
            fix
        })
        .collect()
}

impl LocationApi for ScriptedLocation {
    fn get_once(&mut self, options: LocationOptions) -> BoxFuture<'_, BackendResult<Fix>> {
        let queued = {
            let mut state = self.feed.lock();
            state.get_once_calls += 1;
            state.once.pop_front()
        };

        let answer = match queued {
            Some(answer) => Some(answer),
            None => self
                .cache
                .fresh(options.maximum_age())
                .or_else(|| self.next_track_fix())
                .map(Ok),
        };

        if let Some(Ok(fix)) = &answer {
            self.cache.store(fix);
        }
        debug!(answered = answer.is_some(), "Scripted single fix request");

        Box::pin(async move {
            match answer {
                Some(answer) => answer,
                None => futures::future::pending().await,
            }
        })
    }

    fn watch(&mut self, _options: LocationOptions) -> BackendResult<FixStream> {
        let handle = WatchHandle::new();
        let (sender, receiver) = mpsc::channel(FIX_CHANNEL_CAPACITY);

        {
            let mut state = self.feed.lock();
            state.watch_calls += 1;
            state.watches.insert(handle, sender.clone());
        }

        if let Some(track) = self.track.clone() {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|_| BackendError::NotAvailable("no async runtime for watch".into()))?;
            let interval = self.interval;
            let start = self.cursor;
            let mut sender = sender;

            let task = runtime.spawn(async move {
                for i in start.. {
                    tokio::time::sleep(interval).await;
                    let mut fix = track[i % track.len()].clone();
                    fix.timestamp = Utc::now();
                    if sender.send(Ok(fix)).await.is_err() {
                        break;
                    }
                }
            });
            self.tasks.insert(handle, task);
        }

        info!(%handle, "Scripted watch started");
        Ok(FixStream::new(handle, receiver))
    }

    fn clear_watch(&mut self, handle: WatchHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
        let mut state = self.feed.lock();
        state.watches.remove(&handle);
        state.cleared.push(handle);
        debug!(%handle, "Scripted watch cleared");
    }
}

impl Drop for ScriptedLocation {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
