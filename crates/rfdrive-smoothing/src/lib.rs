//! Tag smoothing for inventory results.
//!
//! Smoothing turns raw, flickery inventory rounds into a stable presence
//! view: a tag is reported only after it has been sighted often enough (or
//! long enough) to count as present, and it drops out only after a period
//! of silence. [`TagSmoothingEngine`] implements the tracker; the
//! insertion-ordered map it is built on lives in [`ordered_map`] and is
//! usable on its own.
//!
//! # Examples
//!
//! ```
//! use rfdrive_core::config::TagSmoothingSettings;
//! use rfdrive_core::types::TagData;
//! use rfdrive_smoothing::TagSmoothingEngine;
//!
//! let settings = TagSmoothingSettings {
//!     enabled: true,
//!     glimpsed_timeout_ms: Some(500),
//!     observed_time_threshold_ms: None,
//!     observed_count_threshold: Some(1),
//!     lost_timeout_ms: Some(2_000),
//! };
//! let mut engine = TagSmoothingEngine::new(&settings)?;
//!
//! let sighting = TagData::with_epc(1, vec![0x30, 0x08, 0x33, 0xB2]);
//! engine.process(&[sighting.clone()]);
//! assert!(engine.result_list().is_empty()); // one sighting is a glimpse
//!
//! engine.process(&[sighting]);
//! assert_eq!(engine.result_list().len(), 1); // second sighting confirms
//! # Ok::<(), rfdrive_core::RfError>(())
//! ```

pub mod engine;
pub mod ordered_map;

pub use engine::TagSmoothingEngine;
pub use ordered_map::OrderedMap;
