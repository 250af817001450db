//! Best-effort band-level telemetry.
//!
//! A single-slot latest-value channel: the animator publishes the current
//! band energies on a throttled cadence, display consumers read whenever
//! they like. No ordering or delivery guarantees beyond last-write-wins.

use std::sync::{Arc, Mutex};

/// Published band energies as of the most recent throttled tick
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandLevels {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

/// Shared latest-value slot for band telemetry.
///
/// Clones share the same slot. Publishing never blocks: if the slot is
/// contended the update is dropped, the next publish wins instead.
#[derive(Clone, Default)]
pub struct TelemetryChannel {
    slot: Arc<Mutex<BandLevels>>,
}

impl TelemetryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the latest levels (best-effort, non-blocking)
    pub fn publish(&self, levels: BandLevels) {
        if let Ok(mut slot) = self.slot.try_lock() {
            *slot = levels;
        }
    }

    /// Read the most recently published levels
    pub fn latest(&self) -> BandLevels {
        self.slot.lock().map(|slot| *slot).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_starts_at_zero() {
        let channel = TelemetryChannel::new();
        assert_eq!(channel.latest(), BandLevels::default());
    }

    #[test]
    fn test_latest_value_wins() {
        let channel = TelemetryChannel::new();
        channel.publish(BandLevels {
            low: 0.1,
            mid: 0.2,
            high: 0.3,
        });
        channel.publish(BandLevels {
            low: 0.4,
            mid: 0.5,
            high: 0.6,
        });

        let latest = channel.latest();
        assert_eq!(latest.low, 0.4);
        assert_eq!(latest.mid, 0.5);
        assert_eq!(latest.high, 0.6);
    }

    #[test]
    fn test_clones_share_the_slot() {
        let channel = TelemetryChannel::new();
        let reader = channel.clone();

        channel.publish(BandLevels {
            low: 0.7,
            mid: 0.0,
            high: 0.0,
        });
        assert_eq!(reader.latest().low, 0.7);
    }
}
