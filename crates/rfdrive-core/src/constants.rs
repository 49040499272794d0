//! Hardware-level constants for the reader driver.
//!
//! These values reflect physical limits of the reader frontend, not tunables:
//! the singulation engine exposes a fixed number of select-filter slots, and
//! each slot holds a bit pattern of bounded length. Changing them does not
//! change what the hardware accepts.

/// Maximum number of filters the hardware can apply during one tag
/// population query. Each physical slot holds at most one filter.
pub const MAX_HARDWARE_FILTERS: usize = 6;

/// Maximum bit length of a single physical filter. Logical filters longer
/// than this must be decomposed before being handed to the hardware; see
/// `split_by_mask` in the filter crate.
pub const MAX_FILTER_BITS: u16 = 255;

/// Number of bits in an EPC Gen2 memory word.
pub const BITS_PER_WORD: u16 = 16;
