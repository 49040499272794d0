//! Configuration management: store seam, region catalog, and the manager
//! that owns the live configuration.
//!
//! Persistence itself is out of scope for the driver core; the
//! [`ConfigStore`] trait is the seam a deployment plugs its file or
//! flash-backed store into, and [`InMemoryConfigStore`] backs tests and
//! development setups.

use rfdrive_core::config::{
    AntennaConfiguration, ConfigurationItem, ConfigurationType, InventorySettings,
    KeepAliveConfiguration, Region, RegulatoryCapabilities, RfConfiguration,
    TagSmoothingSettings, UNSPECIFIED_REGION_ID,
};
use rfdrive_core::error::{Result, RfError};
use rfdrive_core::types::SelectionMask;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Persistence seam for the reader configuration.
pub trait ConfigStore: Send + Sync {
    /// Load the persisted configuration, or `None` if none exists.
    fn load(&self) -> Result<Option<RfConfiguration>>;

    /// Persist the given configuration.
    fn save(&self, config: &RfConfiguration) -> Result<()>;

    /// Delete the persisted configuration.
    fn reset(&self) -> Result<()>;
}

/// Volatile store for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    slot: Mutex<Option<RfConfiguration>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a configuration.
    pub fn with_config(config: RfConfiguration) -> Self {
        Self {
            slot: Mutex::new(Some(config)),
        }
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load(&self) -> Result<Option<RfConfiguration>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| RfError::implementation("configuration store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn save(&self, config: &RfConfiguration) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| RfError::implementation("configuration store lock poisoned"))?;
        *slot = Some(config.clone());
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| RfError::implementation("configuration store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// Catalog of regulatory regions the reader may operate in.
///
/// Always contains the regulatory-neutral "Unspecified" profile active
/// before a region is chosen.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

impl RegionCatalog {
    /// Build a catalog from the given profiles, adding the "Unspecified"
    /// profile if absent.
    pub fn new(mut regions: Vec<Region>) -> Self {
        if !regions.iter().any(|r| r.id == UNSPECIFIED_REGION_ID) {
            regions.insert(0, Self::unspecified());
        }
        Self { regions }
    }

    /// The catalog shipped with the driver: ETSI Europe and FCC North
    /// America profiles.
    pub fn builtin() -> Self {
        Self::new(vec![
            Region {
                id: "EU".to_string(),
                regulatory: RegulatoryCapabilities {
                    communication_standard: "ETSI EN 302 208".to_string(),
                    channels_khz: vec![865_700, 866_300, 866_900, 867_500],
                    max_transmit_power: 3_300,
                    hopping: false,
                },
            },
            Region {
                id: "FCC".to_string(),
                regulatory: RegulatoryCapabilities {
                    communication_standard: "FCC Part 15.247".to_string(),
                    channels_khz: (0..50u32).map(|i| 902_750 + i * 500).collect(),
                    max_transmit_power: 3_600,
                    hopping: true,
                },
            },
        ])
    }

    fn unspecified() -> Region {
        Region {
            id: UNSPECIFIED_REGION_ID.to_string(),
            regulatory: RegulatoryCapabilities {
                communication_standard: UNSPECIFIED_REGION_ID.to_string(),
                channels_khz: Vec::new(),
                max_transmit_power: 0,
                hopping: false,
            },
        }
    }

    /// Look up a region profile by id.
    pub fn get(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Ids of all known regions.
    pub fn ids(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.id.clone()).collect()
    }
}

impl Default for RegionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Which parts of the configuration an apply touched.
///
/// The session controller uses these to restart the keep-alive heartbeat
/// and rebuild the smoothing engine only when their settings actually
/// changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChanges {
    pub keep_alive: bool,
    pub inventory: bool,
    pub antennas: bool,
}

/// Owner of the live reader configuration.
///
/// All mutation goes through [`ConfigurationManager::apply`], which
/// validates first and persists last: a failed apply leaves both the
/// in-memory configuration and the store exactly as they were.
pub struct ConfigurationManager {
    store: Box<dyn ConfigStore>,
    catalog: RegionCatalog,
    config: RfConfiguration,
}

impl ConfigurationManager {
    pub fn new(store: Box<dyn ConfigStore>, catalog: RegionCatalog) -> Self {
        Self {
            store,
            catalog,
            config: RfConfiguration::defaults(),
        }
    }

    /// Load the persisted configuration, falling back to factory defaults
    /// when none exists or the persisted region is unknown.
    pub fn load(&mut self) -> Result<()> {
        match self.store.load()? {
            Some(config) if self.catalog.get(&config.region).is_some() => {
                debug!(region = %config.region, "loaded persisted configuration");
                self.config = config;
            }
            Some(config) => {
                warn!(
                    region = %config.region,
                    "persisted configuration names an unknown region, using defaults"
                );
                self.config = RfConfiguration::defaults();
            }
            None => {
                debug!("no persisted configuration, using defaults");
                self.config = RfConfiguration::defaults();
            }
        }
        Ok(())
    }

    /// Externally visible configuration items of the requested type.
    ///
    /// For antenna queries, `antenna_id` 0 means all antennas.
    pub fn configuration(
        &self,
        ty: ConfigurationType,
        antenna_id: u16,
    ) -> Vec<ConfigurationItem> {
        let mut items = Vec::new();
        if matches!(ty, ConfigurationType::All | ConfigurationType::KeepAlive) {
            items.push(ConfigurationItem::KeepAlive(self.config.keep_alive.clone()));
        }
        if matches!(ty, ConfigurationType::All | ConfigurationType::Inventory) {
            items.push(ConfigurationItem::Inventory(self.config.inventory.clone()));
        }
        if matches!(ty, ConfigurationType::All | ConfigurationType::Antenna) {
            items.extend(
                self.config
                    .antennas
                    .iter()
                    .filter(|a| antenna_id == 0 || a.id == antenna_id)
                    .cloned()
                    .map(ConfigurationItem::Antenna),
            );
        }
        items
    }

    /// Validate and apply a batch of configuration items, then persist.
    ///
    /// # Errors
    ///
    /// Returns a parameter error for invalid settings and an
    /// implementation error for persistence failures. In both cases the
    /// in-memory configuration is rolled back to the pre-apply snapshot.
    pub fn apply(&mut self, items: Vec<ConfigurationItem>) -> Result<ConfigChanges> {
        let snapshot = self.config.clone();
        match self.apply_items(items) {
            Ok(changes) => {
                if let Err(err) = self.store.save(&self.config) {
                    self.config = snapshot;
                    return Err(err);
                }
                Ok(changes)
            }
            Err(err) => {
                self.config = snapshot;
                Err(err)
            }
        }
    }

    fn apply_items(&mut self, items: Vec<ConfigurationItem>) -> Result<ConfigChanges> {
        let mut changes = ConfigChanges::default();
        for item in items {
            match item {
                ConfigurationItem::KeepAlive(keep_alive) => {
                    keep_alive.validate()?;
                    self.config.keep_alive = keep_alive;
                    changes.keep_alive = true;
                }
                ConfigurationItem::Inventory(inventory) => {
                    if let Some(smoothing) = &inventory.tag_smoothing {
                        validate_smoothing(smoothing)?;
                    }
                    self.config.inventory = inventory;
                    changes.inventory = true;
                }
                ConfigurationItem::Antenna(antenna) => {
                    if antenna.id == 0 {
                        return Err(RfError::parameter("antenna id must be non-zero"));
                    }
                    match self.config.antennas.iter_mut().find(|a| a.id == antenna.id) {
                        Some(existing) => *existing = antenna,
                        None => self.config.antennas.push(antenna),
                    }
                    changes.antennas = true;
                }
            }
        }
        Ok(changes)
    }

    /// Copy of the live configuration, for rollback across collaborator
    /// calls.
    pub fn snapshot(&self) -> RfConfiguration {
        self.config.clone()
    }

    /// Restore a snapshot after a collaborator rejected an applied change.
    pub fn restore(&mut self, snapshot: RfConfiguration) {
        if let Err(err) = self.store.save(&snapshot) {
            warn!(%err, "failed to persist restored configuration");
        }
        self.config = snapshot;
    }

    /// Drop the persisted configuration and return to factory defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.store.reset()?;
        self.config = RfConfiguration::defaults();
        Ok(())
    }

    /// Id of the active region.
    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Profile of the active region.
    pub fn active_region(&self) -> Result<&Region> {
        self.region_profile(&self.config.region)
    }

    /// Look up a region profile, failing for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns a parameter error when the id is not in the catalog.
    pub fn region_profile(&self, id: &str) -> Result<&Region> {
        self.catalog
            .get(id)
            .ok_or_else(|| RfError::parameter(format!("unknown region: {id}")))
    }

    /// Record a region change after the hardware accepted it.
    pub fn commit_region(&mut self, id: &str) -> Result<()> {
        self.config.region = id.to_string();
        self.store.save(&self.config)
    }

    /// Ids of all regions the reader supports.
    pub fn supported_regions(&self) -> Vec<String> {
        self.catalog.ids()
    }

    pub fn default_filters(&self) -> &[SelectionMask] {
        &self.config.inventory.selection_masks
    }

    pub fn keep_alive(&self) -> &KeepAliveConfiguration {
        &self.config.keep_alive
    }

    pub fn tag_smoothing(&self) -> Option<&TagSmoothingSettings> {
        self.config.inventory.tag_smoothing.as_ref()
    }

    pub fn inventory(&self) -> &InventorySettings {
        &self.config.inventory
    }

    pub fn antennas(&self) -> &[AntennaConfiguration] {
        &self.config.antennas
    }
}

/// Smoothing settings need a defined promotion trigger to be usable.
fn validate_smoothing(settings: &TagSmoothingSettings) -> Result<()> {
    if settings.observed_count_threshold.is_none() && settings.observed_time_threshold_ms.is_none()
    {
        return Err(RfError::parameter(
            "either the observed count threshold or the observed time \
             threshold must be set when using tag smoothing",
        ));
    }
    Ok(())
}
