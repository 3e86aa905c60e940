//! Controller and bench configuration

use crate::bench::ActiveDevices;
use fugit::MicrosDurationU32;

/// Time quanta clock prescaler written by [`Canola::init`]
///
/// [`Canola::init`]: crate::device::Canola::init
pub const DEFAULT_TIME_QUANTA_CLOCK_SCALE: u32 = 9;

/// Per-controller configuration applied by [`Canola::configure`]
///
/// [`Canola::configure`]: crate::device::Canola::configure
#[derive(Default, Copy, Clone, Debug)]
pub struct DeviceConfig {
    /// Let the controller retransmit on its own after a lost arbitration or
    /// a transmit error
    pub retransmit: bool,
    /// Sample each bit three times
    pub triple_sampling: bool,
    /// Full bit timing. When `None`, the bit timing registers are left as
    /// they are.
    pub bit_timing: Option<BitTiming>,
}

/// Bit-timing parameters
///
/// Segment lengths are in time quanta; the time quantum is the controller
/// clock period multiplied by `time_quanta_clock_scale + 1`. The bit time is
/// `1 + prop_seg + phase_seg_1 + phase_seg_2` time quanta.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitTiming {
    /// Propagation segment
    pub prop_seg: u8,
    /// Phase segment before the sample point
    pub phase_seg_1: u8,
    /// Phase segment after the sample point
    pub phase_seg_2: u8,
    /// Synchronization jump width
    pub sjw: u8,
    /// Time quanta clock prescaler
    pub time_quanta_clock_scale: u8,
}

/// Misconfigurations of [`BitTiming`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitTimingError {
    /// A segment has zero length
    #[error("bit timing segments must be at least one time quantum long")]
    EmptySegment,
    /// SJW is zero or longer than either phase segment
    #[error("synchronization jump width {sjw} must be in 1..={max}")]
    SynchronizationJumpWidthOutOfRange {
        /// Requested SJW
        sjw: u8,
        /// Shorter of the two phase segments
        max: u8,
    },
}

impl BitTiming {
    /// Returns the number of time quanta that make up one bit time
    pub fn time_quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.prop_seg) + u32::from(self.phase_seg_1) + u32::from(self.phase_seg_2)
    }

    pub(crate) fn check(&self) -> Result<(), BitTimingError> {
        if self.prop_seg == 0 || self.phase_seg_1 == 0 || self.phase_seg_2 == 0 {
            return Err(BitTimingError::EmptySegment);
        }
        let max = self.phase_seg_1.min(self.phase_seg_2);
        if !(1..=max).contains(&self.sjw) {
            return Err(BitTimingError::SynchronizationJumpWidthOutOfRange { sjw: self.sjw, max });
        }
        Ok(())
    }
}

/// Timing and reporting parameters of the validation bench
#[derive(Copy, Clone, Debug)]
pub struct HarnessConfig {
    /// Controllers taking part in the stress and round-robin tests
    pub active: ActiveDevices,
    /// Applied to every controller at startup after the default
    /// initialization. When `None`, only the clock prescaler is set.
    pub device: Option<DeviceConfig>,
    /// Sleep between two reads of the busy flag
    pub poll_interval: MicrosDurationU32,
    /// Give up waiting for a busy controller after this long
    pub busy_timeout: MicrosDurationU32,
    /// Sleep between starting a transmission and checking notifications
    pub settle_time: MicrosDurationU32,
    /// Dump statistics counters every this many round-robin rounds
    pub report_interval: u32,
    /// Length of one manual mode cycle
    pub manual_period: MicrosDurationU32,
    /// Dump statistics counters every this many manual mode cycles
    pub manual_report_cycles: u32,
    /// Dump statistics counters every this many frames in stress mode
    pub stress_report_threshold: u32,
}

impl HarnessConfig {
    /// Create an instance for `active` controllers
    ///
    /// Timing comes pre-populated with the values used on the reference
    /// board: 2 ms polling and settle time, 100 ms manual cycles, counter
    /// dumps every 10000 frames.
    pub fn new(active: ActiveDevices) -> Self {
        Self {
            active,
            device: None,
            poll_interval: MicrosDurationU32::millis(2),
            busy_timeout: MicrosDurationU32::millis(100),
            settle_time: MicrosDurationU32::millis(2),
            report_interval: 10_000,
            manual_period: MicrosDurationU32::millis(100),
            manual_report_cycles: 100,
            stress_report_threshold: 10_000,
        }
    }
}
