//! Alert state machines.
//!
//! `MetricAlarm` keeps a metric from re-alerting every tick while it stays
//! above the watermark; `DedupCache` keeps one-shot alerts (processes,
//! sessions) from repeating within a TTL window.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Hysteresis alarm for a single metric.
///
/// Raises once when the reading crosses `high`, then stays silent until the
/// reading drops below `low`. With `low == high` this degenerates to a plain
/// threshold with repeat suppression.
#[derive(Debug, Clone)]
pub struct MetricAlarm {
    high: f32,
    low: f32,
    alerted: bool,
}

impl MetricAlarm {
    pub fn new(high: f32, low: f32) -> Self {
        Self {
            high,
            low: low.min(high),
            alerted: false,
        }
    }

    /// Feed one reading. Returns true when an alert should be sent.
    pub fn observe(&mut self, reading: f32) -> bool {
        if self.alerted {
            if reading < self.low {
                self.alerted = false;
            }
            false
        } else if reading > self.high {
            self.alerted = true;
            true
        } else {
            false
        }
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted
    }
}

/// TTL-expiring seen-set.
///
/// Entries expire `ttl` after insertion, so a long-lived condition alerts
/// again after the window instead of being silenced forever, and the set
/// stays bounded.
#[derive(Debug)]
pub struct DedupCache<K> {
    ttl: Duration,
    seen: HashMap<K, Instant>,
}

impl<K: Eq + Hash> DedupCache<K> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: HashMap::new(),
        }
    }

    /// Record `key`; returns true if it was not already present (unexpired).
    pub fn insert_if_new(&mut self, key: K) -> bool {
        let now = Instant::now();
        self.seen
            .retain(|_, inserted| now.duration_since(*inserted) < self.ttl);

        match self.seen.get(&key) {
            Some(_) => false,
            None => {
                self.seen.insert(key, now);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_fires_once_above_high() {
        let mut alarm = MetricAlarm::new(80.0, 80.0);
        assert!(alarm.observe(90.0));
        assert!(!alarm.observe(90.0));
        assert!(!alarm.observe(85.0));
    }

    #[test]
    fn test_alarm_single_threshold_sequence() {
        // [90, 90, 70, 95] against high=low=80 fires exactly twice.
        let mut alarm = MetricAlarm::new(80.0, 80.0);
        let fired: Vec<bool> = [90.0, 90.0, 70.0, 95.0]
            .iter()
            .map(|&r| alarm.observe(r))
            .collect();
        assert_eq!(fired, vec![true, false, false, true]);
    }

    #[test]
    fn test_alarm_distinct_marks_need_drop_below_low() {
        let mut alarm = MetricAlarm::new(80.0, 70.0);
        assert!(alarm.observe(90.0));
        // Hovering between the marks does not re-arm.
        assert!(!alarm.observe(75.0));
        assert!(!alarm.observe(85.0));
        // Below low clears; next excursion alerts again.
        assert!(!alarm.observe(65.0));
        assert!(alarm.observe(85.0));
    }

    #[test]
    fn test_alarm_exact_high_does_not_fire() {
        let mut alarm = MetricAlarm::new(80.0, 70.0);
        assert!(!alarm.observe(80.0));
        assert!(!alarm.is_alerted());
    }

    #[test]
    fn test_alarm_low_clamped_to_high() {
        let mut alarm = MetricAlarm::new(80.0, 95.0);
        assert!(alarm.observe(90.0));
        assert!(!alarm.observe(85.0));
        assert!(!alarm.observe(79.0));
        assert!(alarm.observe(81.0));
    }

    #[test]
    fn test_dedup_suppresses_repeats() {
        let mut cache = DedupCache::new(Duration::from_secs(60));
        assert!(cache.insert_if_new((1234_u32, "stress".to_string())));
        assert!(!cache.insert_if_new((1234_u32, "stress".to_string())));
        assert!(cache.insert_if_new((5678_u32, "stress".to_string())));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_dedup_expires_after_ttl() {
        let mut cache = DedupCache::new(Duration::ZERO);
        assert!(cache.insert_if_new("key"));
        assert!(cache.insert_if_new("key"));
    }

    #[test]
    fn test_dedup_purges_expired_entries() {
        let mut cache = DedupCache::new(Duration::ZERO);
        cache.insert_if_new("a");
        cache.insert_if_new("b");
        assert!(cache.len() <= 1);
    }
}
