//! Bit-level filter algebra for EPC Gen2 selection.
//!
//! Logical filters address tag memory at bit granularity with a care mask;
//! physical filter slots accept at most 255 contiguous bits under an
//! all-ones mask. This crate bridges the two: [`split_by_mask`] decomposes
//! a logical filter into the minimal covering set of physical sub-filters,
//! and the surrounding functions provide the bit-field extraction, shifting,
//! comparison, and numeric conversions hardware managers build on.
//!
//! # Examples
//!
//! ```
//! use rfdrive_core::{Filter, MemoryBank};
//! use rfdrive_filter::split_by_mask;
//!
//! // Care bits [0, 4) and [12, 16): two physical sub-filters.
//! let filter = Filter::new(
//!     MemoryBank::Epc,
//!     32,
//!     16,
//!     vec![0xAB, 0xCD],
//!     vec![0xF0, 0x0F],
//!     true,
//! );
//! let subs = split_by_mask(&filter)?.unwrap();
//! assert_eq!(subs.len(), 2);
//! assert_eq!((subs[0].bit_offset, subs[0].bit_length), (32, 4));
//! assert_eq!((subs[1].bit_offset, subs[1].bit_length), (44, 4));
//! # Ok::<(), rfdrive_core::RfError>(())
//! ```

pub mod algebra;
pub mod bits;

pub use algebra::{
    OperationListInspection, apply_mask, bytes_to_hex, bytes_to_u16, bytes_to_u32, compare, equal,
    filter_from_selection_mask, hex_to_bytes, inspect_operations, shift, split_by_mask, strip,
    u16_to_bytes, u32_to_bytes,
};
pub use bits::BitSet;
