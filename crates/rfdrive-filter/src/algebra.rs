//! Bit-level EPC filter construction and byte/bit primitives.
//!
//! Everything in this module is pure: no I/O, no state, no side effects.
//! The central operation is [`split_by_mask`], which decomposes a logical
//! filter into the minimal set of physical sub-filters covering only the
//! masked-in bit ranges — transmitting a full-width filter would waste
//! hardware slots and air time. The remaining functions are the conversion
//! and comparison primitives hardware managers need to assemble and take
//! apart tag memory fields.
//!
//! All functions index bits in network bit order: bit 0 of a byte array is
//! the most-significant bit of byte 0.

use crate::bits::BitSet;
use rfdrive_core::constants::MAX_FILTER_BITS;
use rfdrive_core::error::{Result, RfError};
use rfdrive_core::types::{Filter, MemoryBank, SelectionMask, TagOperation};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Read bit `index` of a byte array in network bit order.
fn get_bit(bytes: &[u8], index: usize) -> bool {
    bytes[index / 8] & (1 << (7 - index % 8)) != 0
}

/// Set bit `index` of a byte array in network bit order.
fn set_bit(bytes: &mut [u8], index: usize) {
    bytes[index / 8] |= 1 << (7 - index % 8);
}

/// An all-ones care mask over `bit_count` bits, with the unused trailing
/// bits of the last byte zeroed.
fn all_ones(bit_count: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF; bit_count.div_ceil(8)];
    if bit_count % 8 != 0
        && let Some(last) = bytes.last_mut()
    {
        *last = 0xFFu8 << (8 - bit_count % 8);
    }
    bytes
}

/// Decompose a logical filter into physical sub-filters along its care mask.
///
/// The mask is scanned for maximal runs of set bits within
/// `[0, bit_length)`:
///
/// - a single run spanning the whole filter returns the filter unchanged
///   (singleton) when it fits a physical slot, or split purely by position
///   into ⌈length/255⌉ contiguous chunks when it does not;
/// - otherwise each run becomes one sub-filter carrying the corresponding
///   data slice under an all-ones mask, with runs longer than 255 bits
///   clipped at 255 and the scan continuing from the clip point;
/// - an all-zero mask yields `None`: the filter contributes nothing.
///
/// Concatenating the bit ranges of the returned sub-filters reconstructs
/// exactly the masked-in positions of the input, and no sub-filter exceeds
/// 255 bits.
///
/// # Errors
///
/// Returns a parameter error when `bit_offset + bit_length` leaves the
/// 16-bit bank address space, since a sub-filter offset could then not be
/// represented.
pub fn split_by_mask(filter: &Filter) -> Result<Option<Vec<Filter>>> {
    if filter.bit_offset as u32 + filter.bit_length as u32 > u16::MAX as u32 + 1 {
        return Err(RfError::parameter(
            "filter bit_offset plus bit_length must not exceed 65536",
        ));
    }
    let data = BitSet::from_bytes(&filter.data);
    let mask = BitSet::from_bytes(&filter.mask);
    let bit_length = filter.bit_length as usize;
    let max_bits = MAX_FILTER_BITS as usize;

    let mut sub_filters: Option<Vec<Filter>> = None;
    let mut r = 0usize;
    loop {
        let l = match mask.next_set_bit(r) {
            Some(l) if l < bit_length => l,
            _ => break,
        };
        r = mask.next_clear_bit(l).min(bit_length);

        if l == 0 && r == bit_length {
            // Single run covering the whole filter.
            if bit_length <= max_bits {
                return Ok(Some(vec![filter.clone()]));
            }
            let mut chunks = Vec::with_capacity(bit_length.div_ceil(max_bits));
            let mut offset = 0;
            while offset < bit_length {
                let length = (bit_length - offset).min(max_bits);
                chunks.push(Filter {
                    bank: filter.bank,
                    bit_offset: filter.bit_offset + offset as u16,
                    bit_length: length as u16,
                    data: data.slice(offset, offset + length).to_bytes(length, true),
                    mask: all_ones(length),
                    matching: filter.matching,
                });
                offset += length;
            }
            return Ok(Some(chunks));
        }

        // Clip over-long runs to the slot limit; the scan resumes at the
        // clip point so the remainder forms its own run.
        if r - l > max_bits {
            r = l + max_bits;
        }

        sub_filters.get_or_insert_with(Vec::new).push(Filter {
            bank: filter.bank,
            bit_offset: filter.bit_offset + l as u16,
            bit_length: (r - l) as u16,
            data: data.slice(l, r).to_bytes(r - l, true),
            mask: all_ones(r - l),
            matching: filter.matching,
        });
    }
    Ok(sub_filters)
}

/// Build the default filter a selection mask stands for.
///
/// The selection mask's `mask` bytes become the filter's comparison *data*,
/// compared under an all-ones mask. The naming inversion is intentional and
/// mirrors the persisted template format: what the template calls a mask is
/// the pattern tags must match.
pub fn filter_from_selection_mask(selection: &SelectionMask) -> Filter {
    Filter {
        bank: selection.bank,
        bit_offset: selection.bit_offset,
        bit_length: selection.bit_length,
        data: selection.mask.clone(),
        mask: vec![0xFF; selection.mask.len()],
        matching: true,
    }
}

/// Byte-wise AND of a payload with a mask.
///
/// Mask bytes beyond the end of the mask read as zero, so a short mask
/// blanks the tail of the payload.
pub fn apply_mask(data: &[u8], mask: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, byte)| byte & mask.get(i).copied().unwrap_or(0))
        .collect()
}

/// Convert a hexadecimal string to bytes.
///
/// Whitespace and underscores are ignored.
///
/// # Errors
///
/// Returns a parameter error for an odd number of hex digits or a
/// non-hexadecimal character.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
    let cleaned: String = hex
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect();
    if cleaned.len() % 2 != 0 {
        return Err(RfError::parameter(
            "hex string must have an even number of characters",
        ));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|_| RfError::parameter(format!("invalid hex digits: {}", &cleaned[i..i + 2])))
        })
        .collect()
}

/// Convert bytes to an uppercase hexadecimal string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Interpret up to two bytes as a big-endian 16-bit integer.
///
/// # Errors
///
/// Returns a parameter error for arrays longer than two bytes.
pub fn bytes_to_u16(bytes: &[u8]) -> Result<u16> {
    if bytes.len() > 2 {
        return Err(RfError::parameter(
            "byte array must not contain more than 2 bytes",
        ));
    }
    Ok(bytes.iter().fold(0u16, |acc, b| (acc << 8) | *b as u16))
}

/// Interpret up to four bytes as a big-endian 32-bit integer.
///
/// # Errors
///
/// Returns a parameter error for arrays longer than four bytes.
pub fn bytes_to_u32(bytes: &[u8]) -> Result<u32> {
    if bytes.len() > 4 {
        return Err(RfError::parameter(
            "byte array must not contain more than 4 bytes",
        ));
    }
    Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32))
}

/// Big-endian bytes of a 16-bit integer.
pub fn u16_to_bytes(value: u16) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Big-endian bytes of a 32-bit integer.
pub fn u32_to_bytes(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Compare exactly `n_bits` bits of two byte arrays starting at
/// `bit_offset`, MSB-first.
///
/// # Errors
///
/// Returns a parameter error when either array is too short to cover the
/// requested bit range.
pub fn compare(left: &[u8], right: &[u8], n_bits: usize, bit_offset: usize) -> Result<Ordering> {
    let needed = (bit_offset + n_bits).div_ceil(8);
    if left.len() < needed || right.len() < needed {
        return Err(RfError::parameter(format!(
            "comparison of {n_bits} bits at offset {bit_offset} needs {needed} bytes"
        )));
    }

    let end = bit_offset + n_bits;
    let mut pos = bit_offset;
    while pos < end {
        let byte_index = pos / 8;
        let start = pos % 8;
        let take = (8 - start).min(end - pos);
        // Care mask for bits [start, start + take) within the byte.
        let mask = ((0xFFu16 >> start) & (0xFFu16 << (8 - start - take))) as u8;
        let l = left[byte_index] & mask;
        let r = right[byte_index] & mask;
        if l != r {
            return Ok(if l > r { Ordering::Greater } else { Ordering::Less });
        }
        pos += take;
    }
    Ok(Ordering::Equal)
}

/// Whether `n_bits` bits of both arrays are equal, starting at bit 0.
pub fn equal(left: &[u8], right: &[u8], n_bits: usize) -> Result<bool> {
    Ok(compare(left, right, n_bits, 0)? == Ordering::Equal)
}

/// Logically shift a byte array by `n_bits`.
///
/// Positive counts shift left (dropping leading bits), negative counts
/// shift right (prepending zero bits). The result holds exactly the bytes
/// needed for the shifted length, with trailing unused bits zeroed.
///
/// # Errors
///
/// Returns a parameter error when a left shift exceeds the bit length of
/// the input.
pub fn shift(bytes: &[u8], n_bits: i32) -> Result<Vec<u8>> {
    let total_bits = bytes.len() * 8;
    if n_bits > 0 && n_bits as usize > total_bits {
        return Err(RfError::parameter(
            "shift count must not exceed the bit length of the input",
        ));
    }

    let out_bits = (total_bits as i64 - n_bits as i64) as usize;
    let mut out = vec![0u8; out_bits.div_ceil(8)];
    for i in 0..out_bits {
        let src = i as i64 + n_bits as i64;
        if src >= 0 && (src as usize) < total_bits && get_bit(bytes, src as usize) {
            set_bit(&mut out, i);
        }
    }
    Ok(out)
}

/// Extract the bit field `[bit_offset, bit_offset + bit_length)` into a
/// minimal, left-justified byte array.
///
/// The trailing unused bits of the last byte are zeroed.
///
/// # Errors
///
/// Returns a parameter error when the requested range extends past the end
/// of the input.
pub fn strip(bytes: &[u8], bit_offset: usize, bit_length: usize) -> Result<Vec<u8>> {
    if bit_offset + bit_length > bytes.len() * 8 {
        return Err(RfError::parameter(
            "offset plus length must not exceed the bit length of the input",
        ));
    }
    let mut out = vec![0u8; bit_length.div_ceil(8)];
    for i in 0..bit_length {
        if get_bit(bytes, bit_offset + i) {
            set_bit(&mut out, i);
        }
    }
    Ok(out)
}

/// Findings of [`inspect_operations`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationListInspection {
    /// The list holds no operations.
    pub empty: bool,
    /// At least one operation id occurs more than once.
    pub duplicate_ids: bool,
    /// The list reads from the TID bank.
    pub tid_read: bool,
    /// The TID read covering the largest address range, preferring
    /// read-complete-bank operations (word count zero).
    pub widest_tid_read: Option<TagOperation>,
}

/// Inspect an operation batch for properties the dispatcher cares about:
/// emptiness, duplicate operation ids, and TID-bank reads.
///
/// Duplicate ids are reported, never rejected — result correlation is the
/// caller's concern.
pub fn inspect_operations(operations: &[TagOperation]) -> OperationListInspection {
    if operations.is_empty() {
        return OperationListInspection {
            empty: true,
            ..Default::default()
        };
    }

    let mut inspection = OperationListInspection::default();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut widest: Option<(u16, u16)> = None;

    for operation in operations {
        if let TagOperation::Read {
            bank: MemoryBank::Tid,
            word_offset,
            word_count,
            ..
        } = operation
        {
            inspection.tid_read = true;
            let replace = match widest {
                None => true,
                // A read-complete-bank operation (count 0) dominates; a
                // wider bounded read supersedes a narrower one.
                Some((_, 0)) => false,
                Some((cur_offset, cur_count)) => {
                    *word_count == 0 || word_offset + word_count > cur_offset + cur_count
                }
            };
            if replace {
                widest = Some((*word_offset, *word_count));
                inspection.widest_tid_read = Some(operation.clone());
            }
        }

        if !seen_ids.insert(operation.operation_id()) {
            inspection.duplicate_ids = true;
        }
    }
    inspection
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfdrive_core::types::LockField;
    use rfdrive_core::types::LockPrivilege;

    fn filter(bit_offset: u16, bit_length: u16, data: Vec<u8>, mask: Vec<u8>) -> Filter {
        Filter::new(MemoryBank::Epc, bit_offset, bit_length, data, mask, true)
    }

    /// Reconstruct the masked-in bit positions of `original` from the split
    /// output and verify them against the original mask.
    fn assert_reconstructs(original: &Filter, subs: &[Filter]) {
        let mask = BitSet::from_bytes(&original.mask);
        let data = BitSet::from_bytes(&original.data);
        let mut covered = vec![false; original.bit_length as usize];

        for sub in subs {
            assert!(sub.bit_length <= MAX_FILTER_BITS);
            assert!(sub.bit_offset >= original.bit_offset);
            let base = (sub.bit_offset - original.bit_offset) as usize;
            let sub_data = BitSet::from_bytes(&sub.data);
            let sub_mask = BitSet::from_bytes(&sub.mask);
            for i in 0..sub.bit_length as usize {
                assert!(!covered[base + i], "bit {} covered twice", base + i);
                covered[base + i] = true;
                assert!(sub_mask.get(i), "sub-filter mask must be all ones");
                assert_eq!(sub_data.get(i), data.get(base + i));
            }
        }

        for (i, covered) in covered.iter().enumerate() {
            let care = mask.get(i);
            assert_eq!(*covered, care, "coverage mismatch at bit {i}");
        }
    }

    #[test]
    fn test_split_all_ones_short_returns_input() {
        let f = filter(8, 32, vec![0x88, 0x99, 0xAA, 0xBB], vec![0xFF; 4]);
        let subs = split_by_mask(&f).unwrap().unwrap();
        assert_eq!(subs, vec![f]);
    }

    #[test]
    fn test_split_all_zero_mask_is_none() {
        let f = filter(0, 32, vec![0xAB; 4], vec![0x00; 4]);
        assert!(split_by_mask(&f).unwrap().is_none());
    }

    #[test]
    fn test_split_mask_only_beyond_length_is_none() {
        // Set bits exist in the mask bytes, but all behind the bit length.
        let f = filter(0, 8, vec![0xAB, 0xCD], vec![0x00, 0xFF]);
        assert!(split_by_mask(&f).unwrap().is_none());
    }

    #[test]
    fn test_split_all_ones_long_chunks_by_position() {
        let bit_length = 600u16;
        let f = filter(
            16,
            bit_length,
            vec![0xA5; 75],
            all_ones(bit_length as usize),
        );
        let subs = split_by_mask(&f).unwrap().unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(
            subs.iter().map(|s| s.bit_length).collect::<Vec<_>>(),
            vec![255, 255, 90]
        );
        assert_eq!(
            subs.iter().map(|s| s.bit_offset).collect::<Vec<_>>(),
            vec![16, 271, 526]
        );
        assert_reconstructs(&f, &subs);
    }

    #[test]
    fn test_split_two_runs() {
        // Mask 0xF0 0x0F: care bits [0,4) and [12,16).
        let f = filter(16, 16, vec![0xAB, 0xCD], vec![0xF0, 0x0F]);
        let subs = split_by_mask(&f).unwrap().unwrap();
        assert_eq!(subs.len(), 2);

        assert_eq!(subs[0].bit_offset, 16);
        assert_eq!(subs[0].bit_length, 4);
        assert_eq!(subs[0].data, vec![0xA0]);
        assert_eq!(subs[0].mask, vec![0xF0]);

        assert_eq!(subs[1].bit_offset, 28);
        assert_eq!(subs[1].bit_length, 4);
        assert_eq!(subs[1].data, vec![0xD0]);
        assert_eq!(subs[1].mask, vec![0xF0]);

        assert_reconstructs(&f, &subs);
    }

    #[test]
    fn test_split_run_clipped_at_bit_length() {
        // Mask run extends past the filter's bit length; the excess is cut.
        let f = filter(0, 12, vec![0xAB, 0xCD], vec![0x0F, 0xFF]);
        let subs = split_by_mask(&f).unwrap().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].bit_offset, 4);
        assert_eq!(subs[0].bit_length, 8);
        assert_eq!(subs[0].data, vec![0xBC]);
        assert_reconstructs(&f, &subs);
    }

    #[test]
    fn test_split_over_long_run_continues_from_clip_point() {
        // One 280-bit run within a 300-bit filter: clipped into 255 + 25.
        let mut mask = all_ones(280);
        mask.resize(38, 0x00);
        let f = filter(0, 300, vec![0x5A; 38], mask);
        let subs = split_by_mask(&f).unwrap().unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!((subs[0].bit_offset, subs[0].bit_length), (0, 255));
        assert_eq!((subs[1].bit_offset, subs[1].bit_length), (255, 25));
        assert_reconstructs(&f, &subs);
    }

    #[test]
    fn test_split_rejects_range_past_bank_address_space() {
        // 65_000 + 1_000 ends past bit 65_536: no sub-filter offset could
        // represent the tail.
        let f = filter(65_000, 1_000, vec![0xFF; 125], all_ones(1_000));
        assert!(split_by_mask(&f).is_err());
    }

    #[test]
    fn test_filter_from_selection_mask() {
        let selection = SelectionMask {
            bank: MemoryBank::Epc,
            bit_offset: 8,
            bit_length: 32,
            mask: vec![0x88, 0x99, 0xAA, 0xBB],
        };
        let f = filter_from_selection_mask(&selection);
        assert!(f.matching);
        assert_eq!(f.bank, MemoryBank::Epc);
        assert_eq!(f.bit_offset, 8);
        assert_eq!(f.bit_length, 32);
        assert_eq!(f.data, vec![0x88, 0x99, 0xAA, 0xBB]);
        assert_eq!(f.mask, vec![0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_apply_mask() {
        assert_eq!(
            apply_mask(&[0xFF, 0xFF, 0xFF], &[0xF0, 0x0F]),
            vec![0xF0, 0x0F, 0x00]
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes = hex_to_bytes("88 99_AA bb").unwrap();
        assert_eq!(bytes, vec![0x88, 0x99, 0xAA, 0xBB]);
        assert_eq!(bytes_to_hex(&bytes), "8899AABB");
    }

    #[test]
    fn test_hex_rejects_bad_input() {
        assert!(hex_to_bytes("ABC").is_err());
        assert!(hex_to_bytes("GG").is_err());
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(bytes_to_u16(&[0x30, 0x08]).unwrap(), 0x3008);
        assert_eq!(bytes_to_u16(&[0x08]).unwrap(), 0x08);
        assert_eq!(bytes_to_u32(&[0x88, 0x99, 0xAA, 0xBB]).unwrap(), 0x8899_AABB);
        assert!(bytes_to_u16(&[0; 3]).is_err());
        assert!(bytes_to_u32(&[0; 5]).is_err());

        assert_eq!(u16_to_bytes(0x3008), vec![0x30, 0x08]);
        assert_eq!(u32_to_bytes(0x8899_AABB), vec![0x88, 0x99, 0xAA, 0xBB]);
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            compare(&[0xFF, 0x00], &[0xFF, 0xFF], 8, 0).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare(&[0xFF, 0x00], &[0xFF, 0xFF], 9, 0).unwrap(),
            Ordering::Less
        );
        // Offset into the second byte.
        assert_eq!(
            compare(&[0x00, 0x0F], &[0x00, 0xF0], 4, 8).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare(&[0x00, 0x0F], &[0x00, 0xF0], 4, 12).unwrap(),
            Ordering::Greater
        );
        // Straddling a byte boundary.
        assert_eq!(
            compare(&[0x01, 0x80], &[0x01, 0x80], 6, 6).unwrap(),
            Ordering::Equal
        );
        assert!(equal(&[0xAB, 0xCD], &[0xAB, 0xC0], 12).unwrap());
        assert!(!equal(&[0xAB, 0xCD], &[0xAB, 0xC0], 16).unwrap());
    }

    #[test]
    fn test_compare_bounds() {
        assert!(compare(&[0xFF], &[0xFF], 9, 0).is_err());
        assert!(compare(&[0xFF, 0xFF], &[0xFF], 4, 8).is_err());
    }

    #[test]
    fn test_shift_left() {
        assert_eq!(shift(&[0xAB, 0xCD], 4).unwrap(), vec![0xBC, 0xD0]);
        assert_eq!(shift(&[0xAB, 0xCD], 8).unwrap(), vec![0xCD]);
        assert_eq!(shift(&[0xAB], 0).unwrap(), vec![0xAB]);
    }

    #[test]
    fn test_shift_right() {
        assert_eq!(shift(&[0xAB], -4).unwrap(), vec![0x0A, 0xB0]);
        assert_eq!(shift(&[0xAB, 0xCD], -8).unwrap(), vec![0x00, 0xAB, 0xCD]);
    }

    #[test]
    fn test_shift_out_of_range() {
        assert!(shift(&[0xAB], 9).is_err());
    }

    #[test]
    fn test_strip() {
        assert_eq!(strip(&[0xAB, 0xCD], 4, 8).unwrap(), vec![0xBC]);
        // Trailing bits of the last byte are zeroed.
        assert_eq!(strip(&[0xAB, 0xCD], 4, 6).unwrap(), vec![0xBC]);
        assert_eq!(strip(&[0xAB, 0xCD], 0, 16).unwrap(), vec![0xAB, 0xCD]);
        assert_eq!(strip(&[0xFF], 0, 3).unwrap(), vec![0xE0]);
        assert!(strip(&[0xAB], 4, 8).is_err());
    }

    #[test]
    fn test_inspect_empty_list() {
        let inspection = inspect_operations(&[]);
        assert!(inspection.empty);
        assert!(!inspection.duplicate_ids);
        assert!(!inspection.tid_read);
    }

    #[test]
    fn test_inspect_duplicate_ids_and_tid_reads() {
        let operations = vec![
            TagOperation::Read {
                id: "op".into(),
                bank: MemoryBank::Tid,
                word_offset: 0,
                word_count: 2,
                password: None,
            },
            TagOperation::Read {
                id: "op".into(),
                bank: MemoryBank::Tid,
                word_offset: 2,
                word_count: 4,
                password: None,
            },
            TagOperation::Lock {
                id: "lock".into(),
                field: LockField::User,
                privilege: LockPrivilege::Lock,
                password: 0,
            },
        ];
        let inspection = inspect_operations(&operations);
        assert!(!inspection.empty);
        assert!(inspection.duplicate_ids);
        assert!(inspection.tid_read);
        // The read ending at the highest address wins.
        assert!(matches!(
            inspection.widest_tid_read,
            Some(TagOperation::Read { word_offset: 2, word_count: 4, .. })
        ));
    }

    #[test]
    fn test_inspect_complete_bank_read_dominates() {
        let operations = vec![
            TagOperation::Read {
                id: "a".into(),
                bank: MemoryBank::Tid,
                word_offset: 0,
                word_count: 0,
                password: None,
            },
            TagOperation::Read {
                id: "b".into(),
                bank: MemoryBank::Tid,
                word_offset: 0,
                word_count: 64,
                password: None,
            },
        ];
        let inspection = inspect_operations(&operations);
        assert!(matches!(
            inspection.widest_tid_read,
            Some(TagOperation::Read { word_count: 0, .. })
        ));
    }
}
