//! Session arbitration and operation serialization.
//!
//! One physical reader is one serially-accessed resource: a single
//! [`SessionController`] owns the hardware handle, and every public
//! operation runs under one coarse execution lock. Exactly one consumer is
//! bound at a time; a second consumer requesting the session triggers a
//! handoff protocol in which the incumbent is notified and the requester
//! waits, bounded by an absolute deadline, for the incumbent to release.

use crate::config::{ConfigChanges, ConfigStore, ConfigurationManager, RegionCatalog};
use crate::consumer::SessionConsumer;
use crate::hardware::HardwareManager;
use crate::keepalive::KeepAliveService;
use crate::sink::{NullSink, TagEvent, TagEventSink};
use rfdrive_core::config::{Capability, CapabilityType, ConfigurationItem, ConfigurationType};
use rfdrive_core::constants::MAX_HARDWARE_FILTERS;
use rfdrive_core::error::{Result, RfError};
use rfdrive_core::types::{Filter, TagData, TagOperation};
use rfdrive_filter::filter_from_selection_mask;
use rfdrive_smoothing::TagSmoothingEngine;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Manufacturer reported in device capabilities.
pub const DEVICE_MANUFACTURER: &str = "rfdrive";

/// Model reported in device capabilities.
pub const DEVICE_MODEL: &str = "rfdrive UHF reader";

/// Who currently holds the session.
enum Binding {
    /// No consumer is bound.
    Idle,
    /// One consumer holds the session.
    Bound(Weak<dyn SessionConsumer>),
    /// A new consumer is waiting for the incumbent to release. Only the
    /// newest waiter's deadline is tracked; a later request supersedes an
    /// earlier one.
    Evicting {
        incumbent: Weak<dyn SessionConsumer>,
        deadline: Instant,
    },
}

struct Inner<H> {
    hardware: H,
    config: ConfigurationManager,
    binding: Binding,
    keep_alive: Option<KeepAliveService>,
    smoothing: Option<TagSmoothingEngine>,
    /// One warning per session when the filter count exceeds the hardware
    /// slots; rearmed on every bind.
    filter_warning_pending: bool,
}

impl<H> Inner<H> {
    fn bound_consumer(&self) -> Result<Weak<dyn SessionConsumer>> {
        match &self.binding {
            Binding::Idle => Err(RfError::ConnectionRequired),
            Binding::Bound(consumer) | Binding::Evicting {
                incumbent: consumer,
                ..
            } => Ok(consumer.clone()),
        }
    }

    fn bind(&mut self, consumer: Weak<dyn SessionConsumer>) {
        self.binding = Binding::Bound(consumer.clone());
        self.filter_warning_pending = true;
        self.restart_keep_alive(consumer);
    }

    /// Stop any running heartbeat and start a new one if the configuration
    /// asks for it.
    ///
    /// The predecessor is stopped, not joined: once `stop` returns no new
    /// heartbeat cycle starts (at most one in-flight beat may still
    /// complete), and joining here would hold the execution lock across a
    /// callback that may re-enter the session.
    fn restart_keep_alive(&mut self, consumer: Weak<dyn SessionConsumer>) {
        if let Some(service) = self.keep_alive.take() {
            service.stop();
        }
        let keep_alive = self.config.keep_alive();
        if keep_alive.enabled && keep_alive.interval_ms > 0 {
            self.keep_alive = Some(KeepAliveService::start(
                consumer,
                Duration::from_millis(keep_alive.interval_ms),
            ));
        }
    }

    fn restart_keep_alive_if_bound(&mut self) {
        if let Ok(consumer) = self.bound_consumer() {
            self.restart_keep_alive(consumer);
        }
    }
}

/// The single owner of a physical reader.
///
/// Generic over the [`HardwareManager`] implementation; all state sits
/// behind one `tokio::sync::Mutex`, serializing execution, configuration,
/// and region operations against each other. The keep-alive heartbeat runs
/// outside that lock.
///
/// # Examples
///
/// ```
/// use rfdrive_session::config::{InMemoryConfigStore, RegionCatalog};
/// use rfdrive_session::mock::MockHardwareManager;
/// use rfdrive_session::SessionController;
///
/// # #[tokio::main]
/// # async fn main() -> rfdrive_core::Result<()> {
/// let (hardware, _handle) = MockHardwareManager::new();
/// let session = SessionController::new(
///     hardware,
///     Box::new(InMemoryConfigStore::new()),
///     RegionCatalog::builtin(),
/// )
/// .await?;
/// assert!(session.supported_regions().await.contains(&"EU".to_string()));
/// # Ok(())
/// # }
/// ```
pub struct SessionController<H> {
    inner: Mutex<Inner<H>>,
    handoff: Notify,
    sink: Arc<dyn TagEventSink>,
}

impl<H: HardwareManager> SessionController<H> {
    /// Bring up the hardware, load the configuration, and build an idle
    /// session with no observability sink.
    ///
    /// # Errors
    ///
    /// Returns an implementation error when the hardware cannot be opened
    /// or the persisted configuration cannot be read, and a parameter
    /// error when the persisted smoothing settings are unusable.
    pub async fn new(
        hardware: H,
        store: Box<dyn ConfigStore>,
        catalog: RegionCatalog,
    ) -> Result<Self> {
        Self::with_sink(hardware, store, catalog, Arc::new(NullSink)).await
    }

    /// Like [`SessionController::new`], with a tag-observed event sink.
    pub async fn with_sink(
        mut hardware: H,
        store: Box<dyn ConfigStore>,
        catalog: RegionCatalog,
        sink: Arc<dyn TagEventSink>,
    ) -> Result<Self> {
        hardware.open_connection().await?;

        let mut config = ConfigurationManager::new(store, catalog);
        config.load()?;
        let region = config.active_region()?.clone();
        hardware.set_region(&region, config.antennas()).await?;

        let smoothing = config
            .tag_smoothing()
            .map(TagSmoothingEngine::new)
            .transpose()?;

        info!(region = %region.id, "session controller started");
        Ok(Self {
            inner: Mutex::new(Inner {
                hardware,
                config,
                binding: Binding::Idle,
                keep_alive: None,
                smoothing,
                filter_warning_pending: true,
            }),
            handoff: Notify::new(),
            sink,
        })
    }

    /// Bind a consumer to the session.
    ///
    /// When the session is idle the binding happens immediately. When
    /// another consumer holds it, the incumbent is notified once via
    /// [`SessionConsumer::connection_attempted`] and the caller waits until
    /// the incumbent releases or `timeout` elapses. The wait re-checks its
    /// condition on every wake and runs against an absolute deadline.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::ConnectionTimeout`] when the incumbent does not
    /// release in time; the existing binding stays untouched.
    pub async fn open_connection(
        &self,
        consumer: Arc<dyn SessionConsumer>,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut incumbent_notified = false;
        loop {
            let mut inner = self.inner.lock().await;

            let incumbent = match &inner.binding {
                Binding::Idle => None,
                Binding::Bound(incumbent)
                | Binding::Evicting { incumbent, .. } => Some(incumbent.clone()),
            };
            let Some(incumbent) = incumbent else {
                inner.bind(Arc::downgrade(&consumer));
                info!("session bound");
                return Ok(());
            };

            if !incumbent_notified {
                incumbent_notified = true;
                if let Some(current) = incumbent.upgrade() {
                    debug!("signaling bound consumer about connection attempt");
                    current.connection_attempted();
                }
            }

            inner.binding = Binding::Evicting {
                incumbent,
                deadline,
            };

            // Arm the wakeup before releasing the lock so a release landing
            // in between cannot be missed.
            let notified = self.handoff.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            drop(inner);

            if timeout_at(deadline, notified).await.is_err() {
                let mut inner = self.inner.lock().await;
                // Only this waiter's eviction record is cleared; a newer
                // waiter's deadline stays in place.
                let rebind = match &inner.binding {
                    Binding::Evicting {
                        incumbent,
                        deadline: pending,
                    } if *pending == deadline => Some(incumbent.clone()),
                    _ => None,
                };
                if let Some(incumbent) = rebind {
                    inner.binding = Binding::Bound(incumbent);
                }
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "connection handoff timed out"
                );
                return Err(RfError::connection_timeout(timeout.as_millis() as u64));
            }
            // Woken up; loop to re-check the binding state.
        }
    }

    /// Release the session.
    ///
    /// Clears the binding, stops the heartbeat, and wakes any handoff
    /// waiter. Idempotent: calling it with no active binding is a no-op.
    pub async fn close_connection(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(service) = inner.keep_alive.take() {
            service.stop();
        }
        if !matches!(inner.binding, Binding::Idle) {
            info!("session released");
        }
        inner.binding = Binding::Idle;
        self.handoff.notify_waiters();
    }

    /// Run one inventory-and-operate round.
    ///
    /// With no filters supplied, the configured default selection masks are
    /// substituted. A filter count above the hardware slot limit degrades
    /// silently: the round is skipped, an empty result is returned, and one
    /// warning is logged per session. Raw hardware results pass through the
    /// smoothing engine when one is configured and enabled; every returned
    /// tag additionally fires a best-effort observed event on the sink.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::ConnectionRequired`] with no bound consumer, and
    /// an implementation error when the hardware fails.
    pub async fn execute(
        &self,
        antennas: &[u16],
        filters: Vec<Filter>,
        operations: &[TagOperation],
    ) -> Result<Vec<TagData>> {
        let mut inner = self.inner.lock().await;
        let consumer = inner.bound_consumer()?;

        let filters = if filters.is_empty() {
            inner
                .config
                .default_filters()
                .iter()
                .map(filter_from_selection_mask)
                .collect()
        } else {
            filters
        };

        if filters.len() > MAX_HARDWARE_FILTERS {
            if inner.filter_warning_pending {
                inner.filter_warning_pending = false;
                warn!(
                    count = filters.len(),
                    max = MAX_HARDWARE_FILTERS,
                    "filter count exceeds hardware slots, skipping execution"
                );
            }
            return Ok(Vec::new());
        }

        let raw = inner
            .hardware
            .execute(antennas, &filters, operations, consumer)
            .await?;

        let results = match inner.smoothing.as_mut() {
            Some(engine) if engine.is_enabled() => {
                engine.process(&raw);
                engine.result_list()
            }
            _ => raw,
        };

        for tag in &results {
            self.sink.tag_observed(TagEvent::from_tag(tag));
        }
        Ok(results)
    }

    /// Externally visible configuration of the requested type. For antenna
    /// queries, id 0 selects all antennas.
    pub async fn get_configuration(
        &self,
        ty: ConfigurationType,
        antenna_id: u16,
    ) -> Vec<ConfigurationItem> {
        self.inner.lock().await.config.configuration(ty, antenna_id)
    }

    /// Apply a batch of configuration items.
    ///
    /// Accepted antenna and RF-tuning changes are forwarded to the
    /// hardware, the smoothing engine is rebuilt when inventory settings
    /// changed, and the heartbeat is restarted when keep-alive settings
    /// changed while a consumer is bound.
    ///
    /// # Errors
    ///
    /// Returns a parameter error for invalid items and an implementation
    /// error for persistence or hardware failures; in all cases no part of
    /// the batch remains applied.
    pub async fn set_configuration(&self, items: Vec<ConfigurationItem>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let snapshot = inner.config.snapshot();
        let changes = inner.config.apply(items)?;

        if let Err(err) = Self::push_to_hardware(&mut inner, &changes).await {
            inner.config.restore(snapshot);
            return Err(err);
        }

        if changes.inventory {
            let smoothing = inner
                .config
                .tag_smoothing()
                .map(TagSmoothingEngine::new)
                .transpose()?;
            inner.smoothing = smoothing;
        }
        if changes.keep_alive {
            inner.restart_keep_alive_if_bound();
        }
        Ok(())
    }

    /// Forward accepted configuration changes to the hardware.
    async fn push_to_hardware(inner: &mut Inner<H>, changes: &ConfigChanges) -> Result<()> {
        if changes.antennas {
            let antennas = inner.config.antennas().to_vec();
            for antenna in &antennas {
                inner.hardware.set_antenna_configuration(antenna).await?;
            }
        }
        if changes.inventory {
            let inventory = inner.config.inventory().clone();
            if let Some(rssi) = inventory.rssi_filter {
                inner.hardware.set_rssi_filter(&rssi).await?;
            }
            if let Some(singulation) = inventory.singulation_control {
                inner.hardware.set_singulation_control(&singulation).await?;
            }
        }
        Ok(())
    }

    /// Return to factory defaults, dropping the persisted configuration.
    pub async fn reset_configuration(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.config.reset()?;
        inner.smoothing = None;

        let region = inner.config.active_region()?.clone();
        let antennas = inner.config.antennas().to_vec();
        inner.hardware.set_region(&region, &antennas).await?;

        // Defaults disable the heartbeat; this stops a running one.
        inner.restart_keep_alive_if_bound();
        Ok(())
    }

    /// Id of the active regulatory region.
    pub async fn region(&self) -> String {
        self.inner.lock().await.config.region().to_string()
    }

    /// Switch the reader to another regulatory region.
    ///
    /// The hardware is reconfigured first; only an accepted switch is
    /// committed and persisted.
    ///
    /// # Errors
    ///
    /// Returns a parameter error for an unknown region id.
    pub async fn set_region(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.config.region() == id {
            return Ok(());
        }
        let region = inner.config.region_profile(id)?.clone();
        let antennas = inner.config.antennas().to_vec();
        inner.hardware.set_region(&region, &antennas).await?;
        inner.config.commit_region(id)?;
        info!(region = id, "regulatory region changed");
        Ok(())
    }

    /// Ids of all regions the reader supports.
    pub async fn supported_regions(&self) -> Vec<String> {
        self.inner.lock().await.config.supported_regions()
    }

    /// Capability records of the reader.
    pub async fn get_capabilities(&self, ty: CapabilityType) -> Result<Vec<Capability>> {
        let inner = self.inner.lock().await;
        let mut capabilities = Vec::new();
        if matches!(ty, CapabilityType::All | CapabilityType::Device) {
            capabilities.push(Capability::Device {
                manufacturer: DEVICE_MANUFACTURER.to_string(),
                model: DEVICE_MODEL.to_string(),
                firmware_version: inner.hardware.firmware_version().await?,
                max_antennas: inner.hardware.max_antennas().await?,
            });
        }
        if matches!(ty, CapabilityType::All | CapabilityType::Regulatory) {
            capabilities.push(Capability::Regulatory(
                inner.config.active_region()?.regulatory.clone(),
            ));
        }
        Ok(capabilities)
    }

    /// Firmware version of the transceiver.
    pub async fn firmware_version(&self) -> Result<String> {
        self.inner.lock().await.hardware.firmware_version().await
    }

    /// Flash the firmware image staged on the device.
    pub async fn install_firmware(&self) -> Result<()> {
        self.inner.lock().await.hardware.install_firmware().await
    }

    /// Tear the session down: release the binding, join the heartbeat, and
    /// close the hardware connection.
    pub async fn shutdown(&self) -> Result<()> {
        let service = {
            let mut inner = self.inner.lock().await;
            inner.binding = Binding::Idle;
            self.handoff.notify_waiters();
            inner.keep_alive.take()
        };
        // Joined outside the lock so a final in-flight callback cannot
        // deadlock against it.
        if let Some(service) = service {
            service.shutdown().await;
        }
        self.inner.lock().await.hardware.close_connection().await
    }
}
