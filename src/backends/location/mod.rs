// SPDX-License-Identifier: GPL-3.0-only

//! Location providers
//!
//! - [`GeoClueLocation`]: GeoClue2 over the system bus
//! - [`ScriptedLocation`]: scripted fixes, a simulated walk, or a replayed
//!   JSON-lines file
//!
//! Both answer single requests from a [`FixCache`] when the last fix is
//! recent enough.

mod geoclue;
mod scripted;

pub use geoclue::GeoClueLocation;
pub use scripted::{LocationFeed, ScriptedLocation, load_replay};

use super::Fix;
use std::time::Duration;

/// Most recent fix seen by a provider
#[derive(Debug, Clone, Default)]
pub struct FixCache {
    last: Option<Fix>,
}

impl FixCache {
    /// Cached fix if it is no older than `max_age`
    ///
    /// A zero `max_age` always misses.
    pub fn fresh(&self, max_age: Duration) -> Option<Fix> {
        if max_age.is_zero() {
            return None;
        }
        self.last.as_ref().filter(|fix| fix.age() <= max_age).cloned()
    }

    pub fn store(&mut self, fix: &Fix) {
        let newer = self
            .last
            .as_ref()
            .is_none_or(|last| last.timestamp <= fix.timestamp);
        if newer {
            self.last = Some(fix.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_fresh_respects_max_age() {
        let mut cache = FixCache::default();
        assert!(cache.fresh(Duration::from_secs(10)).is_none());

        let mut old = Fix::new(-23.5, -46.6);
        old.timestamp = Utc::now() - chrono::Duration::seconds(30);
        cache.store(&old);
        assert!(cache.fresh(Duration::from_secs(10)).is_none());
        assert!(cache.fresh(Duration::from_secs(60)).is_some());

        let recent = Fix::new(-23.6, -46.7);
        cache.store(&recent);
        assert_eq!(cache.fresh(Duration::from_secs(10)), Some(recent));
        assert!(cache.fresh(Duration::ZERO).is_none());
    }

    #[test]
    fn test_store_keeps_newest() {
        let mut cache = FixCache::default();
        let recent = Fix::new(1.0, 1.0);
        let mut stale = Fix::new(2.0, 2.0);
        stale.timestamp = recent.timestamp - chrono::Duration::seconds(5);

        cache.store(&recent);
        cache.store(&stale);
        assert_eq!(cache.fresh(Duration::from_secs(60)), Some(recent));
    }
}
