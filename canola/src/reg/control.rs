//! CONTROL register

use super::Field;
use bitfield::bitfield;

/// TX_START
pub const TX_START: Field = Field::new(0, 1);

bitfield! {
    /// Value written to [`CONTROL`](super::CONTROL).
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Control(u32);
    impl Debug;

    /// Start transmitting the frame held in the TX registers
    pub tx_start, set_tx_start: 0;
}

impl From<u32> for Control {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Control> for u32 {
    fn from(control: Control) -> Self {
        control.0
    }
}
