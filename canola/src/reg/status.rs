//! STATUS register

use super::Field;
use bitfield::bitfield;

/// RX_MSG_VALID
pub const RX_MSG_VALID: Field = Field::new(0, 1);
/// TX_BUSY
pub const TX_BUSY: Field = Field::new(1, 1);
/// TX_DONE
pub const TX_DONE: Field = Field::new(2, 1);
/// TX_FAILED
pub const TX_FAILED: Field = Field::new(3, 1);
/// ERROR_STATE
pub const ERROR_STATE: Field = Field::new(4, 2);

bitfield! {
    /// Controller status, as read from [`STATUS`](super::STATUS).
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Status(u32);
    impl Debug;

    /// A received frame is latched in the RX registers
    pub rx_msg_valid, _: 0;
    /// A transmission is in progress; a new one must not be started
    pub tx_busy, _: 1;
    /// The last transmission attempt has finished
    pub tx_done, _: 2;
    /// The last transmission attempt failed
    pub tx_failed, _: 3;
    /// Raw fault confinement state, see [`Status::error_state`]
    pub u8, error_state_bits, _: 5, 4;
}

impl Status {
    /// Fault confinement state of the controller
    pub fn error_state(&self) -> ErrorState {
        match self.error_state_bits() {
            0 => ErrorState::ErrorActive,
            1 => ErrorState::ErrorPassive,
            _ => ErrorState::BusOff,
        }
    }
}

impl From<u32> for Status {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Status> for u32 {
    fn from(status: Status) -> Self {
        status.0
    }
}

/// CAN fault confinement state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorState {
    /// Normal operation
    ErrorActive,
    /// Error counters passed 127; the controller only sends passive error flags
    ErrorPassive,
    /// Transmit error counter passed 255; the controller is off the bus
    BusOff,
}
