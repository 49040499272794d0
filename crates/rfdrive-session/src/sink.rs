//! Observability sink for tag sightings.

use rfdrive_core::types::TagData;
use tracing::debug;

/// One "tag observed" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEvent {
    /// When the result batch containing the tag was returned.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// EPC bytes of the tag.
    pub epc: Vec<u8>,
    /// Antenna the tag was seen on.
    pub antenna_id: u16,
    /// Signal strength of the sighting.
    pub rssi: i16,
}

impl TagEvent {
    /// Build an event from a result-list entry, stamped with the current
    /// time.
    pub fn from_tag(tag: &TagData) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            epc: tag.epc.clone(),
            antenna_id: tag.antenna_id,
            rssi: tag.rssi,
        }
    }
}

/// Receiver of tag-observed events.
///
/// Delivery is fire-and-forget: the session emits one event per returned
/// [`TagData`] and never lets a sink failure fail the execution, so
/// implementations must not block and should swallow their own errors.
pub trait TagEventSink: Send + Sync {
    fn tag_observed(&self, event: TagEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl TagEventSink for NullSink {
    fn tag_observed(&self, _event: TagEvent) {}
}

/// Sink that logs every event at debug level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TagEventSink for TracingSink {
    fn tag_observed(&self, event: TagEvent) {
        debug!(
            epc = ?event.epc,
            antenna_id = event.antenna_id,
            rssi = event.rssi,
            "tag observed"
        );
    }
}
