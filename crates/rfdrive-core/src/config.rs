//! Configuration model of the reader driver.
//!
//! These types describe the in-memory shape of the reader configuration.
//! Loading and persisting them is the job of an external store behind the
//! `ConfigStore` seam in the session crate; this module only defines the
//! structure and its validation rules.

use crate::error::{Result, RfError};
use crate::types::{SelectionMask, TagOperation};
use serde::{Deserialize, Serialize};

/// Keep-alive heartbeat settings for a bound consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepAliveConfiguration {
    /// Whether a heartbeat task is started when a consumer binds.
    pub enabled: bool,
    /// Heartbeat interval in milliseconds. Must be positive.
    pub interval_ms: u64,
}

impl KeepAliveConfiguration {
    /// A disabled keep-alive configuration.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            interval_ms: 0,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a parameter error when the heartbeat is enabled with a
    /// non-positive interval.
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.interval_ms == 0 {
            return Err(RfError::parameter(
                "keep-alive interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Tag smoothing settings.
///
/// All durations are milliseconds. An unset timeout means the corresponding
/// criterion never expires; an unset threshold means promotion never
/// triggers on that criterion. At least one of the two promotion thresholds
/// must be set for the settings to be usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSmoothingSettings {
    /// Whether smoothing is applied to execution results.
    pub enabled: bool,
    /// Inactivity timeout for glimpsed (not yet confirmed) entries.
    pub glimpsed_timeout_ms: Option<u64>,
    /// Age after which a glimpsed entry is promoted to observed.
    pub observed_time_threshold_ms: Option<u64>,
    /// Sighting count above which a glimpsed entry is promoted to observed.
    pub observed_count_threshold: Option<u32>,
    /// Inactivity timeout after which an observed entry counts as lost.
    pub lost_timeout_ms: Option<u64>,
}

/// RSSI acceptance window applied by the hardware during inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssiFilter {
    pub min_rssi: i16,
    pub max_rssi: i16,
}

/// Gen2 singulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingulationControl {
    /// Gen2 session (0-3) used for inventory rounds.
    pub session: u8,
    /// Number of inventory rounds per execution.
    pub rounds: u16,
    /// Tag transit time in milliseconds.
    pub transit_time_ms: u16,
}

/// How an antenna port participates in execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectType {
    /// Use the port if the hardware detects an antenna on it.
    Auto,
    /// Always use the port.
    True,
    /// Never use the port.
    False,
}

/// Per-antenna RF settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntennaConfiguration {
    /// Antenna port id, 1-based.
    pub id: u16,
    /// Transmit power index into the active region's power table.
    pub transmit_power: u16,
    /// Receive sensitivity index.
    pub receive_sensitivity: u16,
    /// Channel index within the active region's channel plan.
    pub channel_index: u16,
    /// Hop table id within the active region.
    pub hop_table_id: u16,
    /// Port participation mode.
    pub connect: ConnectType,
}

/// Inventory-related settings: default filters and RF fine-tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Default selection masks substituted when a caller executes without
    /// filters, in application order.
    pub selection_masks: Vec<SelectionMask>,
    /// RSSI acceptance window, if restricted.
    pub rssi_filter: Option<RssiFilter>,
    /// Singulation parameters, if overridden.
    pub singulation_control: Option<SingulationControl>,
    /// Tag smoothing settings, if configured.
    pub tag_smoothing: Option<TagSmoothingSettings>,
}

/// The complete in-memory reader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfConfiguration {
    /// Id of the active regulatory region.
    pub region: String,
    /// Per-antenna settings, ordered by port id.
    pub antennas: Vec<AntennaConfiguration>,
    /// Heartbeat settings for bound consumers.
    pub keep_alive: KeepAliveConfiguration,
    /// Inventory settings.
    pub inventory: InventorySettings,
}

impl RfConfiguration {
    /// Factory defaults: unspecified region, no antennas tuned, keep-alive
    /// off, no default filters.
    pub fn defaults() -> Self {
        Self {
            region: UNSPECIFIED_REGION_ID.to_string(),
            antennas: Vec::new(),
            keep_alive: KeepAliveConfiguration::disabled(),
            inventory: InventorySettings::default(),
        }
    }
}

/// Region id of the regulatory-neutral profile active before a region is
/// chosen. Transmit is effectively disabled under it.
pub const UNSPECIFIED_REGION_ID: &str = "Unspecified";

/// Regulatory capability profile of a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryCapabilities {
    /// Communication standard identifier (e.g. ETSI 302-208, FCC part 15).
    pub communication_standard: String,
    /// Channel plan center frequencies in kHz.
    pub channels_khz: Vec<u32>,
    /// Maximum permitted transmit power in centi-dBm ERP/EIRP.
    pub max_transmit_power: u16,
    /// Whether the region requires frequency hopping.
    pub hopping: bool,
}

/// A regulatory capability profile bound to an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub regulatory: RegulatoryCapabilities,
}

/// Selector for configuration queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationType {
    All,
    KeepAlive,
    Inventory,
    Antenna,
}

/// One externally visible configuration item.
///
/// `get_configuration` returns these, `set_configuration` accepts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigurationItem {
    KeepAlive(KeepAliveConfiguration),
    Inventory(InventorySettings),
    Antenna(AntennaConfiguration),
}

/// Selector for capability queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityType {
    All,
    Device,
    Regulatory,
}

/// A capability record of the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Capability {
    Device {
        manufacturer: String,
        model: String,
        firmware_version: String,
        max_antennas: u16,
    },
    Regulatory(RegulatoryCapabilities),
}

/// Default operations a consumer may associate with sightings.
///
/// Not interpreted by the core; carried for consumers that script follow-up
/// operations per tag.
pub type OperationList = Vec<TagOperation>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_alive_validation() {
        let ok = KeepAliveConfiguration {
            enabled: true,
            interval_ms: 500,
        };
        assert!(ok.validate().is_ok());

        let zero = KeepAliveConfiguration {
            enabled: true,
            interval_ms: 0,
        };
        assert!(zero.validate().is_err());

        // A disabled heartbeat never validates its interval.
        assert!(KeepAliveConfiguration::disabled().validate().is_ok());
    }

    #[test]
    fn test_default_configuration() {
        let config = RfConfiguration::defaults();
        assert_eq!(config.region, UNSPECIFIED_REGION_ID);
        assert!(config.antennas.is_empty());
        assert!(!config.keep_alive.enabled);
        assert!(config.inventory.selection_masks.is_empty());
        assert!(config.inventory.tag_smoothing.is_none());
    }

    #[test]
    fn test_configuration_clone_is_deep() {
        let mut config = RfConfiguration::defaults();
        config.inventory.selection_masks.push(SelectionMask {
            bank: crate::types::MemoryBank::Epc,
            bit_offset: 32,
            bit_length: 16,
            mask: vec![0x30, 0x08],
        });

        let snapshot = config.clone();
        config.inventory.selection_masks.clear();
        config.region = "FCC".into();

        assert_eq!(snapshot.inventory.selection_masks.len(), 1);
        assert_eq!(snapshot.region, UNSPECIFIED_REGION_ID);
    }
}
