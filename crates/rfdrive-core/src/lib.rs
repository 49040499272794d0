//! Core types for the rfdrive reader driver.
//!
//! This crate defines the shared vocabulary of the driver: tag-level types
//! (memory banks, filters, operations, sightings), the configuration model,
//! hardware constants, and the error taxonomy. It carries no behavior beyond
//! validation; the bit-level filter algebra, tag smoothing, and session
//! arbitration live in the sibling crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{
    AntennaConfiguration, Capability, CapabilityType, ConfigurationItem, ConfigurationType,
    ConnectType, InventorySettings, KeepAliveConfiguration, Region, RegulatoryCapabilities,
    RfConfiguration, RssiFilter, SingulationControl, TagSmoothingSettings, UNSPECIFIED_REGION_ID,
};
pub use constants::{BITS_PER_WORD, MAX_FILTER_BITS, MAX_HARDWARE_FILTERS};
pub use error::{Result, RfError};
pub use types::{
    Filter, LockField, LockPrivilege, MemoryBank, OperationResult, ResultStatus, SelectionMask,
    TagData, TagOperation,
};
