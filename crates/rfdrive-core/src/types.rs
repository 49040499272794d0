//! Tag-level domain types: memory banks, filters, operations, and sightings.
//!
//! These types form the vocabulary shared between the session controller,
//! the filter algebra, and hardware-manager implementations. They carry no
//! behavior beyond validation and accessors; all bit-level arithmetic lives
//! in the `rfdrive-filter` crate.

use crate::error::{Result, RfError};
use serde::{Deserialize, Serialize};

/// One of the four EPC Gen2 memory regions of a transponder.
///
/// The two-bit encoding matches the values transmitted on air and used by
/// hardware select commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryBank {
    /// Reserved bank holding kill and access passwords.
    Reserved,
    /// EPC bank holding CRC, PC and the EPC itself.
    Epc,
    /// TID bank holding the tag manufacturer identification.
    Tid,
    /// Freely usable user memory.
    User,
}

impl MemoryBank {
    /// Two-bit wire encoding of the bank.
    pub fn code(self) -> u8 {
        match self {
            Self::Reserved => 0b00,
            Self::Epc => 0b01,
            Self::Tid => 0b10,
            Self::User => 0b11,
        }
    }

    /// Decode a two-bit bank code.
    ///
    /// # Errors
    ///
    /// Returns a parameter error for values above 3.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0b00 => Ok(Self::Reserved),
            0b01 => Ok(Self::Epc),
            0b10 => Ok(Self::Tid),
            0b11 => Ok(Self::User),
            other => Err(RfError::parameter(format!(
                "memory bank code must be 0-3, got {other}"
            ))),
        }
    }
}

/// A physical bit-match rule applied during a tag population query.
///
/// `data` carries the comparison pattern and `mask` selects which of its
/// bits take part in the comparison; bit 0 of either array is the
/// most-significant bit of byte 0 (network bit order). A filter with
/// `matching == true` selects tags whose memory matches the pattern, one
/// with `matching == false` selects the complement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Memory bank the comparison reads from.
    pub bank: MemoryBank,
    /// Bit address of the first compared bit within the bank.
    pub bit_offset: u16,
    /// Number of bits taking part in the comparison.
    pub bit_length: u16,
    /// Comparison pattern, MSB-first.
    pub data: Vec<u8>,
    /// Care mask over `data`, MSB-first. A set bit means the corresponding
    /// data bit is compared.
    pub mask: Vec<u8>,
    /// Whether matching tags are selected (true) or suppressed (false).
    pub matching: bool,
}

impl Filter {
    /// Create a filter selecting tags that match the given pattern.
    pub fn new(
        bank: MemoryBank,
        bit_offset: u16,
        bit_length: u16,
        data: Vec<u8>,
        mask: Vec<u8>,
        matching: bool,
    ) -> Self {
        Self {
            bank,
            bit_offset,
            bit_length,
            data,
            mask,
            matching,
        }
    }
}

/// A persisted filter template.
///
/// Selection masks are stored in the reader configuration and turned into
/// default [`Filter`]s when a caller executes without supplying any. The
/// field named `mask` intentionally becomes the *data* of the derived
/// filter, compared under an all-ones mask; see
/// `filter_from_selection_mask` in the filter crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMask {
    /// Memory bank the derived filter reads from.
    pub bank: MemoryBank,
    /// Bit address of the first compared bit.
    pub bit_offset: u16,
    /// Number of compared bits.
    pub bit_length: u16,
    /// Comparison pattern of the derived filter.
    pub mask: Vec<u8>,
}

/// Which part of tag memory a lock operation protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockField {
    KillPassword,
    AccessPassword,
    Epc,
    Tid,
    User,
}

/// The protection level a lock operation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockPrivilege {
    Lock,
    Unlock,
    PermanentLock,
    PermanentUnlock,
}

/// A single operation to run against each singulated tag.
///
/// Operation ids should be unique within a batch; duplicates are detectable
/// via `inspect_operations` in the filter crate but are not rejected by the
/// core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagOperation {
    /// Read `word_count` words starting at `word_offset`. A count of zero
    /// reads the remainder of the bank.
    Read {
        id: String,
        bank: MemoryBank,
        word_offset: u16,
        word_count: u16,
        password: Option<u32>,
    },
    /// Write the payload words starting at `word_offset`.
    Write {
        id: String,
        bank: MemoryBank,
        word_offset: u16,
        data: Vec<u8>,
        password: Option<u32>,
    },
    /// Change the lock state of a memory field.
    Lock {
        id: String,
        field: LockField,
        privilege: LockPrivilege,
        password: u32,
    },
    /// Permanently disable the tag.
    Kill { id: String, kill_password: u32 },
}

impl TagOperation {
    /// The caller-assigned id of this operation, echoed in its result.
    pub fn operation_id(&self) -> &str {
        match self {
            Self::Read { id, .. }
            | Self::Write { id, .. }
            | Self::Lock { id, .. }
            | Self::Kill { id, .. } => id,
        }
    }
}

/// Per-tag outcome classification of a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultStatus {
    Success,
    MemoryOverrun,
    MemoryLocked,
    IncorrectPassword,
    NoResponse,
    NonSpecificError,
}

/// The result of one [`TagOperation`] against one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    Read {
        id: String,
        status: ResultStatus,
        data: Vec<u8>,
    },
    Write {
        id: String,
        status: ResultStatus,
        words_written: u16,
    },
    Lock {
        id: String,
        status: ResultStatus,
    },
    Kill {
        id: String,
        status: ResultStatus,
    },
}

impl OperationResult {
    /// The id of the operation this result belongs to.
    pub fn operation_id(&self) -> &str {
        match self {
            Self::Read { id, .. }
            | Self::Write { id, .. }
            | Self::Lock { id, .. }
            | Self::Kill { id, .. } => id,
        }
    }

    /// The outcome classification of this result.
    pub fn status(&self) -> ResultStatus {
        match self {
            Self::Read { status, .. }
            | Self::Write { status, .. }
            | Self::Lock { status, .. }
            | Self::Kill { status, .. } => *status,
        }
    }
}

/// One sighting of a tag, as reported by the hardware.
///
/// The EPC bytes are the identity of the sighting: tag smoothing keys on
/// them and never overwrites them. All other fields describe the individual
/// read and are refreshed in place when the same tag is seen again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagData {
    /// Driver-assigned numeric id of this sighting.
    pub tag_id: u64,
    /// EPC bytes identifying the tag.
    pub epc: Vec<u8>,
    /// Antenna the tag was seen on.
    pub antenna_id: u16,
    /// RF channel index of the sighting.
    pub channel: u16,
    /// CRC-16 from the EPC bank.
    pub crc: u16,
    /// Protocol control word.
    pub pc: u16,
    /// Extended protocol control word.
    pub xpc: u32,
    /// Received signal strength of the sighting.
    pub rssi: i16,
    /// Results of the operations executed against this tag.
    pub results: Vec<OperationResult>,
}

impl TagData {
    /// Create a sighting with only identity fields populated.
    ///
    /// Useful for tests and hardware mocks; production hardware managers
    /// fill in every field.
    pub fn with_epc(tag_id: u64, epc: Vec<u8>) -> Self {
        Self {
            tag_id,
            epc,
            antenna_id: 0,
            channel: 0,
            crc: 0,
            pc: 0,
            xpc: 0,
            rssi: 0,
            results: Vec::new(),
        }
    }

    /// Copy every non-identity field of `other` onto this sighting.
    ///
    /// The EPC is deliberately left untouched.
    pub fn update_from(&mut self, other: &TagData) {
        self.tag_id = other.tag_id;
        self.antenna_id = other.antenna_id;
        self.channel = other.channel;
        self.crc = other.crc;
        self.pc = other.pc;
        self.xpc = other.xpc;
        self.rssi = other.rssi;
        self.results = other.results.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_bank_codes() {
        assert_eq!(MemoryBank::Reserved.code(), 0b00);
        assert_eq!(MemoryBank::Epc.code(), 0b01);
        assert_eq!(MemoryBank::Tid.code(), 0b10);
        assert_eq!(MemoryBank::User.code(), 0b11);

        for bank in [
            MemoryBank::Reserved,
            MemoryBank::Epc,
            MemoryBank::Tid,
            MemoryBank::User,
        ] {
            assert_eq!(MemoryBank::from_code(bank.code()).unwrap(), bank);
        }
    }

    #[test]
    fn test_memory_bank_invalid_code() {
        assert!(MemoryBank::from_code(4).is_err());
        assert!(MemoryBank::from_code(255).is_err());
    }

    #[test]
    fn test_operation_id_accessor() {
        let op = TagOperation::Read {
            id: "rd-1".into(),
            bank: MemoryBank::Tid,
            word_offset: 0,
            word_count: 4,
            password: None,
        };
        assert_eq!(op.operation_id(), "rd-1");

        let op = TagOperation::Kill {
            id: "kill-1".into(),
            kill_password: 0xDEAD_BEEF,
        };
        assert_eq!(op.operation_id(), "kill-1");
    }

    #[test]
    fn test_tag_data_update_preserves_epc() {
        let mut retained = TagData::with_epc(1, vec![0xAA, 0xBB]);
        let mut sighting = TagData::with_epc(2, vec![0xCC, 0xDD]);
        sighting.antenna_id = 3;
        sighting.rssi = -60;
        sighting.results = vec![OperationResult::Lock {
            id: "l1".into(),
            status: ResultStatus::Success,
        }];

        retained.update_from(&sighting);

        assert_eq!(retained.epc, vec![0xAA, 0xBB]);
        assert_eq!(retained.tag_id, 2);
        assert_eq!(retained.antenna_id, 3);
        assert_eq!(retained.rssi, -60);
        assert_eq!(retained.results.len(), 1);
    }

    #[test]
    fn test_result_status_accessor() {
        let result = OperationResult::Write {
            id: "wr".into(),
            status: ResultStatus::MemoryLocked,
            words_written: 0,
        };
        assert_eq!(result.operation_id(), "wr");
        assert_eq!(result.status(), ResultStatus::MemoryLocked);
    }

    #[test]
    fn test_filter_serde_round_trip() {
        let filter = Filter::new(
            MemoryBank::Epc,
            32,
            16,
            vec![0x30, 0x08],
            vec![0xFF, 0xFF],
            true,
        );
        let json = serde_json::to_string(&filter).unwrap();
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }
}
