//! CONFIG register

use super::Field;
use bitfield::bitfield;

/// TX_RETRANSMIT_EN
pub const TX_RETRANSMIT_EN: Field = Field::new(0, 1);
/// BTL_TRIPLE_SAMPLING_EN
pub const BTL_TRIPLE_SAMPLING_EN: Field = Field::new(1, 1);

bitfield! {
    /// Value of [`CONFIG`](super::CONFIG).
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Config(u32);
    impl Debug;

    /// Retransmit automatically after a lost arbitration or an error
    pub tx_retransmit_en, set_tx_retransmit_en: 0;
    /// Sample each bit three times instead of once
    pub btl_triple_sampling_en, set_btl_triple_sampling_en: 1;
}

impl From<u32> for Config {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Config> for u32 {
    fn from(config: Config) -> Self {
        config.0
    }
}
