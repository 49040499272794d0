//! Hardware manager abstraction.
//!
//! The session controller treats the RF transceiver as an opaque
//! capability behind this trait. A production implementation drives a
//! reader chipset; [`MockHardwareManager`](crate::mock::MockHardwareManager)
//! simulates one for tests and development.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT) and is therefore not object-safe; the session controller is
//! generic over it instead of boxing it.

#![allow(async_fn_in_trait)]

use crate::consumer::SessionConsumer;
use rfdrive_core::config::{AntennaConfiguration, Region, RssiFilter, SingulationControl};
use rfdrive_core::error::Result;
use rfdrive_core::types::{Filter, TagData, TagOperation};
use std::sync::Weak;

/// RF transceiver capability.
///
/// Filters arriving at [`HardwareManager::execute`] are already defaulted
/// by the session controller but not decomposed: an implementation whose
/// hardware enforces the 255-bit slot limit calls
/// [`split_by_mask`](rfdrive_filter::split_by_mask) itself before loading
/// its select registers.
pub trait HardwareManager: Send + Sync {
    /// Bring up the transceiver.
    ///
    /// # Errors
    ///
    /// Returns an implementation error when the device cannot be reached.
    async fn open_connection(&mut self) -> Result<()>;

    /// Shut the transceiver down. Idempotent.
    async fn close_connection(&mut self) -> Result<()>;

    /// Run one inventory-and-operate round.
    ///
    /// Singulates tags on the given antennas under the given filters, runs
    /// the operation batch against each, and returns one [`TagData`] per
    /// sighted tag. The consumer reference lets implementations inject
    /// per-tag operations via
    /// [`SessionConsumer::operations_for`].
    ///
    /// # Errors
    ///
    /// Returns an implementation error on transceiver failure.
    async fn execute(
        &mut self,
        antennas: &[u16],
        filters: &[Filter],
        operations: &[TagOperation],
        consumer: Weak<dyn SessionConsumer>,
    ) -> Result<Vec<TagData>>;

    /// Id of the regulatory region the transceiver currently operates in.
    async fn region(&self) -> Result<String>;

    /// Switch the transceiver to a regulatory region, re-applying the
    /// antenna configuration under the new channel plan.
    async fn set_region(
        &mut self,
        region: &Region,
        antennas: &[AntennaConfiguration],
    ) -> Result<()>;

    /// Apply one antenna's RF settings.
    async fn set_antenna_configuration(&mut self, antenna: &AntennaConfiguration) -> Result<()>;

    /// The RSSI acceptance window, if the hardware restricts one.
    async fn rssi_filter(&self) -> Result<Option<RssiFilter>>;

    /// Restrict inventory to an RSSI acceptance window.
    async fn set_rssi_filter(&mut self, filter: &RssiFilter) -> Result<()>;

    /// The active singulation parameters, if overridden.
    async fn singulation_control(&self) -> Result<Option<SingulationControl>>;

    /// Override the singulation parameters.
    async fn set_singulation_control(&mut self, control: &SingulationControl) -> Result<()>;

    /// Firmware version string of the transceiver.
    async fn firmware_version(&self) -> Result<String>;

    /// Flash the firmware image staged on the device.
    ///
    /// # Errors
    ///
    /// Returns an implementation error when no image is staged or flashing
    /// fails.
    async fn install_firmware(&mut self) -> Result<()>;

    /// Number of antenna ports the transceiver drives.
    async fn max_antennas(&self) -> Result<u16>;
}
