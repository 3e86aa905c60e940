//! TX_PAYLOAD_{0,1} and RX_PAYLOAD_{0,1} registers
//!
//! Payload bytes are packed little-endian: byte `i` lives in word `i / 4` at
//! bits `8 * (i % 4)` and up.

use super::Field;

/// PAYLOAD_BYTE_0 ..= PAYLOAD_BYTE_7, indexed by payload byte
pub const PAYLOAD_BYTE: [Field; 8] = [
    Field::new(0, 8),
    Field::new(8, 8),
    Field::new(16, 8),
    Field::new(24, 8),
    Field::new(0, 8),
    Field::new(8, 8),
    Field::new(16, 8),
    Field::new(24, 8),
];

/// Index of the payload word holding payload byte `byte`
pub const fn word_of(byte: usize) -> usize {
    byte / 4
}
