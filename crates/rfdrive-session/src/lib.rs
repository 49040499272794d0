//! Session arbitration for a single RFID reader.
//!
//! This crate is the control core of the driver: [`SessionController`]
//! owns the hardware handle, binds exactly one consumer at a time with a
//! deadline-bounded handoff protocol, serializes execution and
//! configuration operations, runs the keep-alive heartbeat, and applies
//! tag smoothing to execution results.
//!
//! The RF transceiver itself sits behind the [`HardwareManager`] trait;
//! [`mock::MockHardwareManager`] provides a scripted stand-in for tests
//! and development.

pub mod config;
pub mod consumer;
pub mod hardware;
pub mod keepalive;
pub mod mock;
pub mod session;
pub mod sink;

pub use config::{ConfigChanges, ConfigStore, ConfigurationManager, InMemoryConfigStore, RegionCatalog};
pub use consumer::SessionConsumer;
pub use hardware::HardwareManager;
pub use keepalive::KeepAliveService;
pub use session::SessionController;
pub use sink::{NullSink, TagEvent, TagEventSink, TracingSink};
