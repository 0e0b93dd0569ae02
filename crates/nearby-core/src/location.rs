//! Location fixes and the fix-quality heuristic
//!
//! Fixes arrive from whatever positioning providers the platform offers, at
//! different rates and accuracies. Picking "most recent" alone jitters when a
//! low-accuracy provider fires more often than a high-accuracy one, so the
//! heuristic weighs age and accuracy together.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::Timestamp;
use crate::{NearbyError, Result};

/// Age difference beyond which a fix unconditionally wins or loses
pub const SIGNIFICANT_AGE_MS: i64 = 2 * 60 * 1000;

/// Accuracy degradation beyond which a newer same-provider fix is rejected
pub const SIGNIFICANT_ACCURACY_LOSS: f64 = 200.0;

// ----------------------------------------------------------------------------
// Location Fix
// ----------------------------------------------------------------------------

/// One position report from a location provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Name of the provider that produced the fix
    pub provider: String,
    /// When the fix was taken
    pub timestamp: Timestamp,
    /// Estimated accuracy radius; lower is better
    pub accuracy: f64,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// Decide whether `candidate` should replace the currently held best fix.
///
/// A fix always beats no fix. A fix more than two minutes newer than the
/// current one unconditionally wins (the device has likely moved); more than
/// two minutes older unconditionally loses. Within that window, accuracy and
/// provider continuity break the tie.
pub fn is_better_fix(candidate: &LocationFix, current: Option<&LocationFix>) -> bool {
    let Some(current) = current else {
        return true;
    };

    let time_delta = candidate.timestamp.signed_delta(current.timestamp);
    let significantly_newer = time_delta > SIGNIFICANT_AGE_MS;
    let significantly_older = time_delta < -SIGNIFICANT_AGE_MS;
    let newer = time_delta > 0;

    if significantly_newer {
        return true;
    }
    if significantly_older {
        return false;
    }

    let accuracy_delta = candidate.accuracy - current.accuracy;
    let less_accurate = accuracy_delta > 0.0;
    let more_accurate = accuracy_delta < 0.0;
    let significantly_less_accurate = accuracy_delta > SIGNIFICANT_ACCURACY_LOSS;
    let same_provider = candidate.provider == current.provider;

    if more_accurate {
        return true;
    }
    if newer && !less_accurate {
        return true;
    }
    if newer && !significantly_less_accurate && same_provider {
        return true;
    }
    false
}

// ----------------------------------------------------------------------------
// Location Source
// ----------------------------------------------------------------------------

/// Subscription to a stream of location fixes.
///
/// `subscribe` fails when no positioning provider is available, which callers
/// treat as "this transport does not run this session".
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<LocationFix>>;
}

/// [`LocationSource`] backed by an in-process channel, for tests, demos, and
/// platforms that push fixes from their own glue code.
pub struct ChannelLocationSource {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<LocationFix>>>,
}

impl ChannelLocationSource {
    /// Create a source and the sender that feeds it
    pub fn new() -> (mpsc::UnboundedSender<LocationFix>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            sender,
            Self {
                receiver: Mutex::new(Some(receiver)),
            },
        )
    }
}

#[async_trait]
impl LocationSource for ChannelLocationSource {
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<LocationFix>> {
        self.receiver
            .lock()
            .expect("location source lock poisoned")
            .take()
            .ok_or_else(|| NearbyError::LocationUnavailable("already subscribed".to_string()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(provider: &str, timestamp_ms: u64, accuracy: f64) -> LocationFix {
        LocationFix {
            provider: provider.to_string(),
            timestamp: Timestamp::new(timestamp_ms),
            accuracy,
            latitude: 52.0,
            longitude: 4.0,
        }
    }

    #[test]
    fn any_fix_beats_no_fix() {
        assert!(is_better_fix(&fix("gps", 1_000, 500.0), None));
    }

    #[test]
    fn repeated_identical_fix_never_replaces() {
        let held = fix("gps", 1_000, 50.0);
        assert!(!is_better_fix(&held.clone(), Some(&held)));
    }

    #[test]
    fn significantly_newer_fix_always_wins() {
        let held = fix("gps", 1_000, 10.0);
        let candidate = fix("network", 1_000 + 120_001, 10_000.0);
        assert!(is_better_fix(&candidate, Some(&held)));
    }

    #[test]
    fn significantly_older_fix_always_loses() {
        let held = fix("network", 200_000, 10_000.0);
        let candidate = fix("gps", 200_000 - 120_001, 1.0);
        assert!(!is_better_fix(&candidate, Some(&held)));
    }

    #[test]
    fn more_accurate_fix_wins_within_window() {
        let held = fix("network", 10_000, 500.0);
        let candidate = fix("gps", 9_000, 50.0);
        assert!(is_better_fix(&candidate, Some(&held)));
    }

    #[test]
    fn newer_and_equally_accurate_fix_wins() {
        let held = fix("network", 10_000, 100.0);
        let candidate = fix("gps", 11_000, 100.0);
        assert!(is_better_fix(&candidate, Some(&held)));
    }

    #[test]
    fn newer_slightly_worse_fix_wins_only_from_same_provider() {
        let held = fix("network", 10_000, 100.0);
        let same_provider = fix("network", 11_000, 250.0);
        let other_provider = fix("gps", 11_000, 250.0);
        assert!(is_better_fix(&same_provider, Some(&held)));
        assert!(!is_better_fix(&other_provider, Some(&held)));
    }

    #[test]
    fn newer_but_significantly_worse_fix_loses_even_from_same_provider() {
        let held = fix("network", 10_000, 100.0);
        let candidate = fix("network", 11_000, 301.0);
        assert!(!is_better_fix(&candidate, Some(&held)));
    }

    #[tokio::test]
    async fn channel_source_subscribes_once() {
        let (sender, source) = ChannelLocationSource::new();
        let mut receiver = source.subscribe().await.unwrap();
        sender.send(fix("gps", 1_000, 10.0)).unwrap();
        assert_eq!(receiver.recv().await.unwrap().provider, "gps");

        assert!(matches!(
            source.subscribe().await,
            Err(NearbyError::LocationUnavailable(_))
        ));
    }
}
