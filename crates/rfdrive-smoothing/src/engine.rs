//! Dual-state tag smoothing.
//!
//! Raw inventory rounds are noisy: a tag at the edge of the field appears
//! and disappears between rounds. The engine keeps every sighting in one of
//! two EPC-keyed collections, `glimpsed` (seen, not yet trusted) and
//! `observed` (confirmed present), and reports only the observed ones.
//! Promotion from glimpsed to observed is driven by a sighting-count or an
//! age threshold; inactivity demotes in the other direction by expiring
//! entries outright.

use crate::ordered_map::OrderedMap;
use rfdrive_core::config::TagSmoothingSettings;
use rfdrive_core::error::{Result, RfError};
use rfdrive_core::types::TagData;
use std::time::{Duration, Instant};
use tracing::trace;

/// One tracked tag: the retained sighting plus its presence statistics.
#[derive(Debug)]
struct SmoothedEntry {
    tag: TagData,
    seen_count: u32,
    first_seen: Instant,
    last_seen: Instant,
}

impl SmoothedEntry {
    fn new(tag: TagData, now: Instant) -> Self {
        Self {
            tag,
            seen_count: 0,
            first_seen: now,
            last_seen: now,
        }
    }

    fn seen(&mut self, now: Instant) {
        self.seen_count += 1;
        self.last_seen = now;
    }
}

/// Deduplicating presence tracker over inventory results.
///
/// An EPC lives in at most one of the two internal collections at any time;
/// promotion moves the entry, never copies it. Both collections keep
/// most-recently-seen-last order, so expiry only ever has to inspect a
/// prefix at the head.
pub struct TagSmoothingEngine {
    enabled: bool,
    glimpsed_timeout: Option<Duration>,
    observed_time_threshold: Option<Duration>,
    observed_count_threshold: Option<u32>,
    lost_timeout: Option<Duration>,
    glimpsed: OrderedMap<Vec<u8>, SmoothedEntry>,
    observed: OrderedMap<Vec<u8>, SmoothedEntry>,
}

impl TagSmoothingEngine {
    /// Build an engine from settings.
    ///
    /// # Errors
    ///
    /// Returns a parameter error when neither the observed count threshold
    /// nor the observed time threshold is set, since promotion would then
    /// have no trigger.
    pub fn new(settings: &TagSmoothingSettings) -> Result<Self> {
        if settings.observed_count_threshold.is_none()
            && settings.observed_time_threshold_ms.is_none()
        {
            return Err(RfError::parameter(
                "either the observed count threshold or the observed time \
                 threshold must be set when using tag smoothing",
            ));
        }
        Ok(Self {
            enabled: settings.enabled,
            glimpsed_timeout: settings.glimpsed_timeout_ms.map(Duration::from_millis),
            observed_time_threshold: settings
                .observed_time_threshold_ms
                .map(Duration::from_millis),
            observed_count_threshold: settings.observed_count_threshold,
            lost_timeout: settings.lost_timeout_ms.map(Duration::from_millis),
            glimpsed: OrderedMap::new(),
            observed: OrderedMap::new(),
        })
    }

    /// Whether smoothing is applied to execution results.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Feed one batch of sightings into the tracker.
    ///
    /// An empty batch is meaningful: it still advances expiry, dropping
    /// entries that have gone quiet.
    pub fn process(&mut self, batch: &[TagData]) {
        self.process_at(batch, Instant::now());
    }

    /// [`TagSmoothingEngine::process`] against an explicit clock, for
    /// deterministic replay.
    pub fn process_at(&mut self, batch: &[TagData], now: Instant) {
        for tag in batch {
            self.process_tag(tag, now);
        }
        self.remove_expired(now);
    }

    /// Snapshot of the observed tags, least-recently-seen first.
    pub fn result_list(&self) -> Vec<TagData> {
        self.observed.values().map(|entry| entry.tag.clone()).collect()
    }

    fn process_tag(&mut self, tag: &TagData, now: Instant) {
        let key = tag.epc.clone();
        let count_threshold = self.observed_count_threshold;
        let time_threshold = self.observed_time_threshold;

        let observed = self.observed.contains_key(&key);
        let map = if observed {
            &mut self.observed
        } else {
            &mut self.glimpsed
        };

        if map.touch(&key).is_none() {
            map.insert(key.clone(), SmoothedEntry::new(tag.clone(), now));
        }
        let Some(entry) = map.get_mut(&key) else {
            return;
        };
        entry.seen(now);
        entry.tag.update_from(tag);

        let promote = !observed
            && (count_threshold.is_some_and(|threshold| entry.seen_count > threshold)
                || time_threshold
                    .is_some_and(|threshold| now.duration_since(entry.first_seen) > threshold));
        let seen_count = entry.seen_count;

        if promote && let Some(entry) = self.glimpsed.remove(&key) {
            trace!(epc = ?key, seen_count, "tag promoted to observed");
            self.observed.insert(key, entry);
        }
    }

    /// Drop stale entries from the head of each collection.
    ///
    /// Stops at the first live head; move-to-tail on every sighting
    /// guarantees nothing behind it can be older.
    fn remove_expired(&mut self, now: Instant) {
        if let Some(timeout) = self.glimpsed_timeout {
            while self
                .glimpsed
                .peek_head()
                .is_some_and(|(_, entry)| now.duration_since(entry.last_seen) > timeout)
            {
                self.glimpsed.pop_head();
            }
        }
        if let Some(timeout) = self.lost_timeout {
            while self
                .observed
                .peek_head()
                .is_some_and(|(_, entry)| now.duration_since(entry.last_seen) > timeout)
            {
                if let Some((key, _)) = self.observed.pop_head() {
                    trace!(epc = ?key, "observed tag lost");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TagSmoothingSettings {
        TagSmoothingSettings {
            enabled: true,
            glimpsed_timeout_ms: Some(30),
            observed_time_threshold_ms: None,
            observed_count_threshold: Some(1),
            lost_timeout_ms: Some(60),
        }
    }

    fn tag(epc: &[u8]) -> TagData {
        TagData::with_epc(0, epc.to_vec())
    }

    fn epcs(engine: &TagSmoothingEngine) -> Vec<Vec<u8>> {
        engine.result_list().into_iter().map(|t| t.epc).collect()
    }

    #[test]
    fn test_requires_a_promotion_threshold() {
        let bare = TagSmoothingSettings {
            enabled: true,
            glimpsed_timeout_ms: Some(30),
            observed_time_threshold_ms: None,
            observed_count_threshold: None,
            lost_timeout_ms: Some(60),
        };
        assert!(TagSmoothingEngine::new(&bare).is_err());
        assert!(TagSmoothingEngine::new(&settings()).is_ok());
    }

    #[test]
    fn test_single_sighting_stays_glimpsed() {
        let mut engine = TagSmoothingEngine::new(&settings()).unwrap();
        engine.process_at(&[tag(b"T1")], Instant::now());
        assert!(engine.result_list().is_empty());
    }

    #[test]
    fn test_second_sighting_promotes_by_count() {
        let mut engine = TagSmoothingEngine::new(&settings()).unwrap();
        let now = Instant::now();
        engine.process_at(&[tag(b"T1")], now);
        engine.process_at(&[tag(b"T1")], now);
        assert_eq!(epcs(&engine), vec![b"T1".to_vec()]);
    }

    #[test]
    fn test_count_threshold_is_strict() {
        let mut config = settings();
        config.observed_count_threshold = Some(2);
        let mut engine = TagSmoothingEngine::new(&config).unwrap();
        let now = Instant::now();
        engine.process_at(&[tag(b"T1")], now);
        engine.process_at(&[tag(b"T1")], now);
        assert!(engine.result_list().is_empty());
        engine.process_at(&[tag(b"T1")], now);
        assert_eq!(epcs(&engine), vec![b"T1".to_vec()]);
    }

    #[test]
    fn test_promotes_by_age() {
        let config = TagSmoothingSettings {
            enabled: true,
            glimpsed_timeout_ms: None,
            observed_time_threshold_ms: Some(50),
            observed_count_threshold: None,
            lost_timeout_ms: None,
        };
        let mut engine = TagSmoothingEngine::new(&config).unwrap();
        let start = Instant::now();
        engine.process_at(&[tag(b"T1")], start);
        assert!(engine.result_list().is_empty());
        // Exactly at the threshold: still glimpsed (strictly greater).
        engine.process_at(&[tag(b"T1")], start + Duration::from_millis(50));
        assert!(engine.result_list().is_empty());
        engine.process_at(&[tag(b"T1")], start + Duration::from_millis(51));
        assert_eq!(epcs(&engine), vec![b"T1".to_vec()]);
    }

    #[test]
    fn test_observed_entry_is_lost_after_timeout() {
        let mut engine = TagSmoothingEngine::new(&settings()).unwrap();
        let start = Instant::now();
        engine.process_at(&[tag(b"T1")], start);
        engine.process_at(&[tag(b"T1")], start);
        assert_eq!(epcs(&engine), vec![b"T1".to_vec()]);

        // 61 ms of silence, then an empty batch drives expiry.
        engine.process_at(&[], start + Duration::from_millis(61));
        assert!(engine.result_list().is_empty());
    }

    #[test]
    fn test_glimpsed_entry_expires_quietly() {
        let mut engine = TagSmoothingEngine::new(&settings()).unwrap();
        let start = Instant::now();
        engine.process_at(&[tag(b"T1")], start);
        engine.process_at(&[], start + Duration::from_millis(31));
        // A new sighting starts over at count 1: no promotion.
        engine.process_at(&[tag(b"T1")], start + Duration::from_millis(32));
        assert!(engine.result_list().is_empty());
    }

    #[test]
    fn test_expiry_stops_at_first_live_head() {
        let mut engine = TagSmoothingEngine::new(&settings()).unwrap();
        let start = Instant::now();
        for t in [b"T1", b"T2"] {
            engine.process_at(&[tag(t)], start);
            engine.process_at(&[tag(t)], start);
        }
        // Keep T2 fresh while T1 goes quiet.
        engine.process_at(&[tag(b"T2")], start + Duration::from_millis(40));
        engine.process_at(&[], start + Duration::from_millis(70));
        assert_eq!(epcs(&engine), vec![b"T2".to_vec()]);
    }

    #[test]
    fn test_sighting_updates_retained_tag_but_not_epc() {
        let mut engine = TagSmoothingEngine::new(&settings()).unwrap();
        let now = Instant::now();
        engine.process_at(&[tag(b"T1")], now);

        let mut update = tag(b"T1");
        update.antenna_id = 3;
        update.rssi = -48;
        engine.process_at(&[update], now);

        let result = engine.result_list();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].epc, b"T1".to_vec());
        assert_eq!(result[0].antenna_id, 3);
        assert_eq!(result[0].rssi, -48);
    }

    #[test]
    fn test_result_list_keeps_observed_order() {
        let mut engine = TagSmoothingEngine::new(&settings()).unwrap();
        let now = Instant::now();
        for t in [b"T1", b"T2", b"T3"] {
            engine.process_at(&[tag(t)], now);
            engine.process_at(&[tag(t)], now);
        }
        // Touching T1 moves it to the tail of the observed order.
        engine.process_at(&[tag(b"T1")], now);
        assert_eq!(
            epcs(&engine),
            vec![b"T2".to_vec(), b"T3".to_vec(), b"T1".to_vec()]
        );
    }

    #[test]
    fn test_epc_never_in_both_collections() {
        let mut engine = TagSmoothingEngine::new(&settings()).unwrap();
        let now = Instant::now();
        engine.process_at(&[tag(b"T1")], now);
        engine.process_at(&[tag(b"T1")], now);
        assert!(!engine.glimpsed.contains_key(b"T1".as_slice()));
        assert!(engine.observed.contains_key(b"T1".as_slice()));
    }

    #[test]
    fn test_enabled_flag_is_reported() {
        let mut config = settings();
        config.enabled = false;
        let engine = TagSmoothingEngine::new(&config).unwrap();
        assert!(!engine.is_enabled());
    }
}
