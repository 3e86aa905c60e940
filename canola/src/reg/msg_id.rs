//! TX_MSG_ID and RX_MSG_ID registers
//!
//! Both registers share one layout. The 29-bit extended identifier is split
//! in two: the upper 11 bits (`ARB_ID_A`, also the whole standard identifier)
//! and the lower 18 bits (`ARB_ID_B`).

use super::Field;
use bitfield::bitfield;

/// EXT_ID_EN
pub const EXT_ID_EN: Field = Field::new(0, 1);
/// RTR_EN
pub const RTR_EN: Field = Field::new(1, 1);
/// ARB_ID_B
pub const ARB_ID_B: Field = Field::new(2, 18);
/// ARB_ID_A
pub const ARB_ID_A: Field = Field::new(20, 11);

bitfield! {
    /// Identifier register contents
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct MsgId(u32);
    impl Debug;

    /// Extended (29-bit) identifier
    pub ext_id_en, set_ext_id_en: 0;
    /// Remote transmission request
    pub rtr_en, set_rtr_en: 1;
    /// Identifier extension, bits 17:0 of an extended identifier
    pub u32, arb_id_b, set_arb_id_b: 19, 2;
    /// Base identifier, bits 28:18 of an extended identifier
    pub u16, arb_id_a, set_arb_id_a: 30, 20;
}

impl From<u32> for MsgId {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<MsgId> for u32 {
    fn from(id: MsgId) -> Self {
        id.0
    }
}
