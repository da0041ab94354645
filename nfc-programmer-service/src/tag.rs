//! Tag memory layout and session types.
//!
//! The target part is an ST25DV04K-class NFC-V tag: 4-byte blocks, two
//! password-gated security areas (RF configuration and user area 1), and a
//! fixed factory block map shared with the host test fixture.

/// Length of one addressable tag memory block, in bytes.
pub const BLOCK_SIZE: usize = 4;

/// Length of an area password, in bytes.
pub const PWD_SIZE: usize = 8;

/// Length of the host-supplied program payload, including its checksum byte.
pub const PROGRAM_LEN: usize = 16;

/// Longest UID any supported technology reports (NFC-A triple-size).
pub const MAX_UID_LEN: usize = 10;

/// One 4-byte tag memory block.
pub type Block = [u8; BLOCK_SIZE];

/// One 8-byte area password.
pub type Password = [u8; PWD_SIZE];

/// Factory block map. Addresses are block numbers, not byte offsets.
pub mod blocks {
    /// Capability container (CC) file.
    pub const CC_FILE: u8 = 0;
    /// First block of the NDEF message, immediately after the CC file.
    pub const NDEF_START: u8 = 1;
    /// Start of the manufacturing information area.
    pub const MANUFACTURING_INFO: u8 = 37;
    /// Completion marker ("factory stamp") block.
    pub const STAMP: u8 = 55;
    /// Recipe header block, holds the product identifier.
    pub const RECIPE_HEADER: u8 = 56;
    /// First block of the recipe/program area.
    pub const RECIPE_START: u8 = 57;
    /// Test-mode entry flag block.
    pub const TEST_FLAG: u8 = 60;
    /// Test reply block, shared with the test flag.
    pub const TEST_REPLY: u8 = 60;
}

/// Number of blocks zeroed by de-initialization (blocks `0..MEMORY_FOOTPRINT`).
pub const MEMORY_FOOTPRINT: u8 = 60;

/// Marker written to [`blocks::STAMP`] when factory programming completes.
/// Its presence is the single source of truth for "already initialized".
pub const FACTORY_STAMP: Block = *b"@ICM";

/// Flag written to [`blocks::TEST_FLAG`] to start the unit's test mode.
pub const TEST_FLAG: Block = *b"TEST";

/// Expected contents of [`blocks::TEST_REPLY`] after a passing unit test.
pub const TEST_REPLY_PASS: Block = *b"PASS";

/// Factory-default password for both security areas.
pub const DEFAULT_PASSWORD: Password = [0; PWD_SIZE];

/// Password assigned to both areas during factory programming.
pub const PROGRAMMED_PASSWORD: Password = *b"pwd12345";

/// Technology of a discovered tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TagTech {
    /// ISO15693 vicinity tag, the only technology this device programs.
    NfcV,
    NfcA,
    NfcB,
    NfcF,
    /// Active peer-to-peer device.
    Ap2p,
    /// ST25TB-series tag, indicated together with NFC-B.
    St25tb,
}

/// Unique identifier of a discovered tag, stored length-tagged because the
/// supported technologies report 4 to 10 byte UIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TagUid {
    bytes: [u8; MAX_UID_LEN],
    len: u8,
}

impl TagUid {
    /// Copies `raw` into a new UID, truncating past [`MAX_UID_LEN`].
    pub fn new(raw: &[u8]) -> Self {
        let len = raw.len().min(MAX_UID_LEN);
        let mut bytes = [0; MAX_UID_LEN];
        bytes[..len].copy_from_slice(&raw[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    /// The UID bytes as reported by the tag.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// One activated tag, valid from activation until the device is deactivated
/// at the end of the poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TagSession {
    /// Anticollision UID of the activated device.
    pub uid: TagUid,
    /// Detected technology.
    pub tech: TagTech,
}

/// Splits `payload` into whole 4-byte blocks. Every payload written to tag
/// memory must be a multiple of [`BLOCK_SIZE`] bytes long.
pub fn as_blocks(payload: &[u8]) -> impl Iterator<Item = Block> + '_ {
    debug_assert!(payload.len() % BLOCK_SIZE == 0);
    payload.chunks_exact(BLOCK_SIZE).map(|chunk| {
        let mut block = [0; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        block
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uid_truncates_and_round_trips() {
        let uid = TagUid::new(&[0xE0, 0x02, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(uid.as_bytes().len(), 8);
        assert_eq!(uid.as_bytes()[0], 0xE0);

        let long = TagUid::new(&[0xAA; 16]);
        assert_eq!(long.as_bytes().len(), MAX_UID_LEN);
    }

    #[test]
    fn payloads_chunk_into_whole_blocks() {
        let payload = [1, 2, 3, 4, 5, 6, 7, 8];
        let blocks: heapless::Vec<Block, 4> = as_blocks(&payload).collect();
        assert_eq!(blocks.as_slice(), &[[1, 2, 3, 4], [5, 6, 7, 8]]);
    }

    #[test]
    fn fixed_payloads_are_block_sized() {
        assert_eq!(FACTORY_STAMP.len(), BLOCK_SIZE);
        assert_eq!(TEST_FLAG.len(), BLOCK_SIZE);
        assert_eq!(TEST_REPLY_PASS.len(), BLOCK_SIZE);
        assert_eq!(PROGRAM_LEN % BLOCK_SIZE, 0);
    }
}
