//! Product profiles: the per-model data set injected into the factory
//! sequencer. Selecting a model is a runtime decision of the integrating
//! firmware, not a build-time switch.

use crate::tag::Block;

/// Everything the factory sequencer writes that differs per product.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProductProfile {
    /// Model identifier reported to the host on `QUERY_CONFIG`.
    pub model: &'static str,
    /// Capability container file, one block.
    pub capability_container: Block,
    /// Product identifier written to the recipe header block.
    pub product_id: Block,
    /// Factory-default configuration, written after the product identifier.
    /// Must be a whole number of blocks.
    pub factory_config: &'static [u8],
    /// NDEF message written after the CC file. Must be a whole number of
    /// blocks; the last TLV is followed by filler for block alignment.
    pub ndef_message: &'static [u8],
}

/// NDEF message pointing at the product site plus the companion Android
/// application record, terminated and padded to a block boundary.
const NDEF_MESSAGE: [u8; 60] = [
    0x03, 0x38, // NDEF message TLV, 0x38 bytes of value
    // record 1: well-known URI "https://icmomni.com"
    0x91, 0x01, 0x0C, b'U', //
    0x04, // URI prefix "https://"
    b'i', b'c', b'm', b'o', b'm', b'n', b'i', b'.', b'c', b'o', b'm',
    // record 2: external type android.com:pkg
    0x5C, 0x0F, 0x15, 0x00, //
    b'a', b'n', b'd', b'r', b'o', b'i', b'd', b'.', b'c', b'o', b'm', b':', b'p', b'k', b'g',
    b'c', b'o', b'm', b'.', b'i', b'c', b'm', b'c', b'o', b'n', b't', b'r', b'o', b'l', b's',
    b'.', b'n', b'f', b'c', b'.', b'u', //
    0xFE, // TLV terminator
    0xFF, // filler, writes happen in whole blocks
];

/// Universal head pressure controller.
pub const ICM325A: ProductProfile = ProductProfile {
    model: "ICM325A PROG",
    // 4-byte CC file: full read/write access over the whole T5T area
    capability_container: [0xE1, 0x40, 0x40, 0x00],
    // data format, product id, device model number
    product_id: [0x02, 0x55, 0xAA, 0x0A],
    factory_config: &[
        0x88, 0xC9, 0x00, 0x00, //
        0x64, 0x32, 0x19, 0x00, //
        0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00, 0x00, 0x00,
    ],
    ndef_message: &NDEF_MESSAGE,
};

#[cfg(test)]
mod test {
    use super::*;
    use crate::tag::BLOCK_SIZE;

    #[test]
    fn shipped_profile_payloads_are_block_aligned() {
        assert_eq!(ICM325A.ndef_message.len() % BLOCK_SIZE, 0);
        assert_eq!(ICM325A.factory_config.len() % BLOCK_SIZE, 0);
    }

    #[test]
    fn ndef_length_field_covers_the_message() {
        // TLV length counts everything between the length byte and the
        // terminator, excluding both.
        let value_len = ICM325A.ndef_message[1] as usize;
        let terminator = 2 + value_len;
        assert_eq!(ICM325A.ndef_message[terminator], 0xFE);
    }
}
