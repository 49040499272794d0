//! Mock hardware manager for testing and development.
//!
//! Simulates an RF transceiver by replaying scripted tag batches and
//! recording every call, so session behavior can be exercised without a
//! physical reader.

use crate::consumer::SessionConsumer;
use crate::hardware::HardwareManager;
use rfdrive_core::config::{AntennaConfiguration, Region, RssiFilter, SingulationControl};
use rfdrive_core::error::{Result, RfError};
use rfdrive_core::types::{Filter, TagData, TagOperation};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// One recorded call to [`HardwareManager::execute`].
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub antennas: Vec<u16>,
    pub filters: Vec<Filter>,
    pub operations: Vec<TagOperation>,
}

#[derive(Debug)]
struct MockState {
    connected: bool,
    region: String,
    batches: VecDeque<Vec<TagData>>,
    executions: Vec<ExecutionRecord>,
    fail_execute: bool,
    fail_configuration: bool,
    firmware_version: String,
    max_antennas: u16,
    rssi_filter: Option<RssiFilter>,
    singulation: Option<SingulationControl>,
}

/// Scripted in-memory transceiver.
///
/// Created together with a [`MockHardwareHandle`] that scripts tag batches
/// and inspects recorded calls.
///
/// # Examples
///
/// ```
/// use rfdrive_core::types::TagData;
/// use rfdrive_session::mock::MockHardwareManager;
///
/// let (_hardware, handle) = MockHardwareManager::new();
/// handle.push_batch(vec![TagData::with_epc(1, vec![0x30, 0x08])]);
/// assert_eq!(handle.execution_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockHardwareManager {
    state: Arc<Mutex<MockState>>,
}

/// Control handle for a [`MockHardwareManager`].
#[derive(Debug, Clone)]
pub struct MockHardwareHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockHardwareManager {
    pub fn new() -> (Self, MockHardwareHandle) {
        let state = Arc::new(Mutex::new(MockState {
            connected: false,
            region: rfdrive_core::config::UNSPECIFIED_REGION_ID.to_string(),
            batches: VecDeque::new(),
            executions: Vec::new(),
            fail_execute: false,
            fail_configuration: false,
            firmware_version: "1.0.0-mock".to_string(),
            max_antennas: 2,
            rssi_filter: None,
            singulation: None,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockHardwareHandle { state },
        )
    }
}

impl HardwareManager for MockHardwareManager {
    async fn open_connection(&mut self) -> Result<()> {
        lock(&self.state).connected = true;
        Ok(())
    }

    async fn close_connection(&mut self) -> Result<()> {
        lock(&self.state).connected = false;
        Ok(())
    }

    async fn execute(
        &mut self,
        antennas: &[u16],
        filters: &[Filter],
        operations: &[TagOperation],
        _consumer: Weak<dyn SessionConsumer>,
    ) -> Result<Vec<TagData>> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(RfError::implementation("transceiver is not connected"));
        }
        if state.fail_execute {
            return Err(RfError::implementation("scripted transceiver failure"));
        }
        state.executions.push(ExecutionRecord {
            antennas: antennas.to_vec(),
            filters: filters.to_vec(),
            operations: operations.to_vec(),
        });
        Ok(state.batches.pop_front().unwrap_or_default())
    }

    async fn region(&self) -> Result<String> {
        Ok(lock(&self.state).region.clone())
    }

    async fn set_region(
        &mut self,
        region: &Region,
        _antennas: &[AntennaConfiguration],
    ) -> Result<()> {
        lock(&self.state).region = region.id.clone();
        Ok(())
    }

    async fn set_antenna_configuration(&mut self, _antenna: &AntennaConfiguration) -> Result<()> {
        if lock(&self.state).fail_configuration {
            return Err(RfError::implementation("scripted configuration failure"));
        }
        Ok(())
    }

    async fn rssi_filter(&self) -> Result<Option<RssiFilter>> {
        Ok(lock(&self.state).rssi_filter)
    }

    async fn set_rssi_filter(&mut self, filter: &RssiFilter) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_configuration {
            return Err(RfError::implementation("scripted configuration failure"));
        }
        state.rssi_filter = Some(*filter);
        Ok(())
    }

    async fn singulation_control(&self) -> Result<Option<SingulationControl>> {
        Ok(lock(&self.state).singulation)
    }

    async fn set_singulation_control(&mut self, control: &SingulationControl) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_configuration {
            return Err(RfError::implementation("scripted configuration failure"));
        }
        state.singulation = Some(*control);
        Ok(())
    }

    async fn firmware_version(&self) -> Result<String> {
        Ok(lock(&self.state).firmware_version.clone())
    }

    async fn install_firmware(&mut self) -> Result<()> {
        lock(&self.state).firmware_version = "1.0.1-mock".to_string();
        Ok(())
    }

    async fn max_antennas(&self) -> Result<u16> {
        Ok(lock(&self.state).max_antennas)
    }
}

impl MockHardwareHandle {
    /// Script the tag batch the next execution returns.
    ///
    /// Batches are consumed in order; with no batch scripted, executions
    /// return an empty result.
    pub fn push_batch(&self, batch: Vec<TagData>) {
        lock(&self.state).batches.push_back(batch);
    }

    /// Make subsequent executions fail with an implementation error.
    pub fn fail_executions(&self, fail: bool) {
        lock(&self.state).fail_execute = fail;
    }

    /// Make subsequent antenna, RSSI-filter and singulation setters fail
    /// with an implementation error.
    pub fn fail_configuration(&self, fail: bool) {
        lock(&self.state).fail_configuration = fail;
    }

    /// Number of recorded executions.
    pub fn execution_count(&self) -> usize {
        lock(&self.state).executions.len()
    }

    /// Copies of all recorded executions.
    pub fn executions(&self) -> Vec<ExecutionRecord> {
        lock(&self.state).executions.clone()
    }

    /// Whether the transceiver connection is open.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// Region id last applied to the transceiver.
    pub fn region(&self) -> String {
        lock(&self.state).region.clone()
    }

    /// RSSI window last applied to the transceiver.
    pub fn rssi_filter(&self) -> Option<RssiFilter> {
        lock(&self.state).rssi_filter
    }

    /// Singulation parameters last applied to the transceiver.
    pub fn singulation_control(&self) -> Option<SingulationControl> {
        lock(&self.state).singulation
    }
}
