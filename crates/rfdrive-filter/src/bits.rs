//! Growable bit container in network bit order.
//!
//! Bit 0 of a byte array is the most-significant bit of byte 0. This is the
//! order in which EPC Gen2 filter patterns travel on air, and it is the
//! inverse of the little-endian layout a typical bitset library uses, so the
//! conversions here are written out explicitly instead of delegating to one.

/// A growable set of bits addressed in network bit order.
///
/// Reads beyond the current length return `false`, mirroring the semantics
/// of a sparse bitset; this matters for the fill behavior of
/// [`BitSet::to_bytes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    bits: Vec<bool>,
}

impl BitSet {
    /// Create an empty bit set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bit set from a byte array, preserving network bit order:
    /// bit 0 of the result is the MSB of `bytes[0]`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for byte in bytes {
            for bit in 0..8 {
                bits.push(byte & (1 << (7 - bit)) != 0);
            }
        }
        Self { bits }
    }

    /// Number of addressable bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the set holds no bits at all.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Read the bit at `index`. Indices beyond the length read as `false`.
    pub fn get(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    /// Write the bit at `index`, growing the set with zeros as needed.
    pub fn set(&mut self, index: usize, value: bool) {
        if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
        }
        self.bits[index] = value;
    }

    /// Index of the first set bit at or after `from`, if any.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        (from..self.bits.len()).find(|&i| self.bits[i])
    }

    /// Index of the first clear bit at or after `from`.
    ///
    /// Always yields an index: positions beyond the length are clear.
    pub fn next_clear_bit(&self, from: usize) -> usize {
        (from..self.bits.len())
            .find(|&i| !self.bits[i])
            .unwrap_or_else(|| self.bits.len().max(from))
    }

    /// Copy of the bit range `[from, to)` as a new set anchored at bit 0.
    pub fn slice(&self, from: usize, to: usize) -> BitSet {
        let bits = (from..to).map(|i| self.get(i)).collect();
        Self { bits }
    }

    /// Serialize `bit_count` bits into ⌈bit_count/8⌉ bytes, MSB-first.
    ///
    /// With `fill` set, the trailing partial byte is completed from the set
    /// itself (reads beyond the length are zero), keeping the output
    /// left-justified. Without `fill`, only `bit_count` bits are shifted in
    /// and the last byte ends up right-justified.
    pub fn to_bytes(&self, bit_count: usize, fill: bool) -> Vec<u8> {
        let byte_count = bit_count.div_ceil(8);
        let mut out = Vec::with_capacity(byte_count);
        for byte_index in 0..byte_count {
            let mut byte = 0u8;
            for bit in 0..8 {
                let bit_no = byte_index * 8 + bit;
                if !fill && bit_no >= bit_count {
                    break;
                }
                byte <<= 1;
                byte |= self.get(bit_no) as u8;
            }
            out.push(byte);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_network_order() {
        // 0x80 = MSB set, so bit 0 must be set.
        let bits = BitSet::from_bytes(&[0x80, 0x01]);
        assert!(bits.get(0));
        assert!(!bits.get(1));
        assert!(bits.get(15));
        assert_eq!(bits.len(), 16);
    }

    #[test]
    fn test_round_trip() {
        let inputs: [&[u8]; 4] = [
            &[],
            &[0x00],
            &[0xDE, 0xAD, 0xBE, 0xEF],
            &[0x01, 0x80, 0xFF, 0x00, 0x55, 0xAA],
        ];
        for bytes in inputs {
            let bits = BitSet::from_bytes(bytes);
            assert_eq!(bits.to_bytes(bytes.len() * 8, true), bytes);
            assert_eq!(bits.to_bytes(bytes.len() * 8, false), bytes);
        }
    }

    #[test]
    fn test_get_beyond_length_is_clear() {
        let bits = BitSet::from_bytes(&[0xFF]);
        assert!(bits.get(7));
        assert!(!bits.get(8));
        assert!(!bits.get(1000));
    }

    #[test]
    fn test_next_set_and_clear_bit() {
        // 0b0011_1000
        let bits = BitSet::from_bytes(&[0x38]);
        assert_eq!(bits.next_set_bit(0), Some(2));
        assert_eq!(bits.next_set_bit(3), Some(3));
        assert_eq!(bits.next_set_bit(5), None);
        assert_eq!(bits.next_clear_bit(2), 5);
        // Beyond the length everything is clear.
        assert_eq!(bits.next_clear_bit(8), 8);
    }

    #[test]
    fn test_set_grows() {
        let mut bits = BitSet::new();
        bits.set(10, true);
        assert_eq!(bits.len(), 11);
        assert!(!bits.get(9));
        assert!(bits.get(10));
    }

    #[test]
    fn test_slice() {
        let bits = BitSet::from_bytes(&[0b1010_1100]);
        let sub = bits.slice(2, 6);
        assert_eq!(sub.len(), 4);
        // Bits 2..6 of 1010_1100 are 1011.
        assert_eq!(sub.to_bytes(4, true), vec![0b1011_0000]);
    }

    #[test]
    fn test_to_bytes_fill_left_justifies() {
        let bits = BitSet::from_bytes(&[0b1110_0000]);
        // Five bits, filled: remaining three bits read as zero.
        assert_eq!(bits.to_bytes(5, true), vec![0b1110_0000]);
        // Without fill the last byte is right-justified.
        assert_eq!(bits.to_bytes(5, false), vec![0b0001_1100]);
    }
}
