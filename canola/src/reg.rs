//! Register map of the Canola AXI slave
//!
//! Every controller exposes the same window of 32-bit registers at its own
//! base address. This module only describes that window; all accesses go
//! through [`RegisterAccess`](canola_core::RegisterAccess) in
//! [`device`](crate::device).

pub mod config;
pub mod control;
pub mod msg_id;
pub mod payload;
pub mod status;

pub use config::Config;
pub use control::Control;
pub use msg_id::MsgId;
pub use status::{ErrorState, Status};

/// A register in the controller's window
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Register {
    /// Name as used in the hardware documentation
    pub name: &'static str,
    /// Byte offset from the controller's base address
    pub offset: usize,
    /// Value after reset
    pub reset: u32,
}

impl Register {
    const fn new(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            offset,
            reset: 0,
        }
    }

    /// Absolute address of this register for a controller at `base`
    pub const fn address(&self, base: usize) -> usize {
        base + self.offset
    }
}

/// A bitfield within a register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Field {
    /// Position of the least significant bit
    pub offset: u32,
    /// Number of bits
    pub width: u32,
    /// Value after reset
    pub reset: u32,
}

impl Field {
    pub(crate) const fn new(offset: u32, width: u32) -> Self {
        Self {
            offset,
            width,
            reset: 0,
        }
    }

    /// Bits of the register occupied by the field
    pub const fn mask(&self) -> u32 {
        (((1_u64 << self.width) - 1) << self.offset) as u32
    }

    /// Extracts the field from a register value
    pub const fn extract(&self, value: u32) -> u32 {
        (value & self.mask()) >> self.offset
    }

    /// Returns `value` with the field replaced by `field`. Bits of `field`
    /// that do not fit the field width are dropped.
    pub const fn insert(&self, value: u32, field: u32) -> u32 {
        (value & !self.mask()) | (field.wrapping_shl(self.offset) & self.mask())
    }
}

/// Controller status, see [`status`]
pub const STATUS: Register = Register::new("STATUS", 0x00);
/// Transmit and reset commands, see [`control`]
pub const CONTROL: Register = Register::new("CONTROL", 0x04);
/// Protocol options, see [`config`]
pub const CONFIG: Register = Register::new("CONFIG", 0x08);

/// Propagation segment length in time quanta
pub const BTL_PROP_SEG: Register = Register::new("BTL_PROP_SEG", 0x20);
/// Phase segment 1 length in time quanta
pub const BTL_PHASE_SEG1: Register = Register::new("BTL_PHASE_SEG1", 0x24);
/// Phase segment 2 length in time quanta
pub const BTL_PHASE_SEG2: Register = Register::new("BTL_PHASE_SEG2", 0x28);
/// Resynchronization jump width in time quanta
pub const BTL_SYNC_JUMP_WIDTH: Register = Register::new("BTL_SYNC_JUMP_WIDTH", 0x2c);
/// Clock prescaler of one time quantum
pub const BTL_TIME_QUANTA_CLOCK_SCALE: Register =
    Register::new("BTL_TIME_QUANTA_CLOCK_SCALE", 0x30);

/// Transmit error counter of fault confinement
pub const TRANSMIT_ERROR_COUNT: Register = Register::new("TRANSMIT_ERROR_COUNT", 0x34);
/// Receive error counter of fault confinement
pub const RECEIVE_ERROR_COUNT: Register = Register::new("RECEIVE_ERROR_COUNT", 0x38);
/// Transmissions started
pub const TX_MSG_SENT_COUNT: Register = Register::new("TX_MSG_SENT_COUNT", 0x3c);
/// Transmissions acknowledged by another node
pub const TX_ACK_RECV_COUNT: Register = Register::new("TX_ACK_RECV_COUNT", 0x40);
/// Transmissions that lost arbitration
pub const TX_ARB_LOST_COUNT: Register = Register::new("TX_ARB_LOST_COUNT", 0x44);
/// Transmissions aborted by an error
pub const TX_ERROR_COUNT: Register = Register::new("TX_ERROR_COUNT", 0x48);
/// Frames received
pub const RX_MSG_RECV_COUNT: Register = Register::new("RX_MSG_RECV_COUNT", 0x4c);
/// Frames received with a CRC error
pub const RX_CRC_ERROR_COUNT: Register = Register::new("RX_CRC_ERROR_COUNT", 0x50);
/// Frames received with a form error
pub const RX_FORM_ERROR_COUNT: Register = Register::new("RX_FORM_ERROR_COUNT", 0x54);
/// Frames received with a stuffing error
pub const RX_STUFF_ERROR_COUNT: Register = Register::new("RX_STUFF_ERROR_COUNT", 0x58);

/// Identifier and flags of the frame to send, see [`msg_id`]
pub const TX_MSG_ID: Register = Register::new("TX_MSG_ID", 0x5c);
/// Payload length of the frame to send
pub const TX_PAYLOAD_LENGTH: Register = Register::new("TX_PAYLOAD_LENGTH", 0x60);
/// Payload bytes 0 to 3 of the frame to send, see [`payload`]
pub const TX_PAYLOAD_0: Register = Register::new("TX_PAYLOAD_0", 0x64);
/// Payload bytes 4 to 7 of the frame to send
pub const TX_PAYLOAD_1: Register = Register::new("TX_PAYLOAD_1", 0x68);

/// Identifier and flags of the latched frame
pub const RX_MSG_ID: Register = Register::new("RX_MSG_ID", 0x6c);
/// Payload length of the latched frame
pub const RX_PAYLOAD_LENGTH: Register = Register::new("RX_PAYLOAD_LENGTH", 0x70);
/// Payload bytes 0 to 3 of the latched frame
pub const RX_PAYLOAD_0: Register = Register::new("RX_PAYLOAD_0", 0x74);
/// Payload bytes 4 to 7 of the latched frame
pub const RX_PAYLOAD_1: Register = Register::new("RX_PAYLOAD_1", 0x78);

/// Bit timing registers, in address order
pub const BIT_TIMING: [Register; 5] = [
    BTL_PROP_SEG,
    BTL_PHASE_SEG1,
    BTL_PHASE_SEG2,
    BTL_SYNC_JUMP_WIDTH,
    BTL_TIME_QUANTA_CLOCK_SCALE,
];

/// Statistics counters, in address order
pub const COUNTERS: [Register; 10] = [
    TRANSMIT_ERROR_COUNT,
    RECEIVE_ERROR_COUNT,
    TX_MSG_SENT_COUNT,
    TX_ACK_RECV_COUNT,
    TX_ARB_LOST_COUNT,
    TX_ERROR_COUNT,
    RX_MSG_RECV_COUNT,
    RX_CRC_ERROR_COUNT,
    RX_FORM_ERROR_COUNT,
    RX_STUFF_ERROR_COUNT,
];
