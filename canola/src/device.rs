//! Per-controller driver
//!
//! [`Canola`] wraps one controller's register window. It never blocks on its
//! own and keeps no state besides the handle: transmission completion and
//! reception are learned through the [notification flags](crate::notify), not
//! through return values.

use crate::config::{BitTiming, BitTimingError, DeviceConfig, DEFAULT_TIME_QUANTA_CLOCK_SCALE};
use crate::message::{decode, encode, CanFrame, RegisterImage};
use crate::reg::{self, Config, Control, Register, Status};
use canola_core::RegisterAccess;
use core::convert::Infallible;
use embedded_hal::blocking::delay::DelayUs;
use fugit::MicrosDurationU32;
use vcell::VolatileCell;

/// Identifies one controller instance and where its registers live
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceHandle {
    index: u8,
    base: usize,
}

impl DeviceHandle {
    /// Handle for controller `index` with its register window at `base`
    pub const fn new(index: u8, base: usize) -> Self {
        Self { index, base }
    }

    /// Builds the handles for controllers `0..N` from their base addresses
    pub fn table<const N: usize>(bases: [usize; N]) -> [Self; N] {
        let mut index = 0;
        bases.map(|base| {
            let handle = Self::new(index, base);
            index += 1;
            handle
        })
    }

    /// Controller index
    pub fn index(&self) -> usize {
        self.index.into()
    }

    /// Base address of the register window
    pub fn base(&self) -> usize {
        self.base
    }
}

/// Memory-mapped register access for targets where the register windows are
/// directly addressable.
pub struct Mmio(());

impl Mmio {
    /// # Safety
    /// Every address later passed to this accessor must be a 32-bit aligned
    /// device register that is safe to access volatilely, and no other code
    /// may access the same registers.
    pub unsafe fn new() -> Self {
        Self(())
    }

    fn cell(address: usize) -> &'static VolatileCell<u32> {
        // Safety: validity of the address is guaranteed by the caller of `new`.
        unsafe { &*(address as *const VolatileCell<u32>) }
    }
}

// Safety: each call is a single volatile 32-bit access through `VolatileCell`.
unsafe impl RegisterAccess for Mmio {
    fn read(&self, address: usize) -> u32 {
        Self::cell(address).get()
    }

    fn write(&self, address: usize, value: u32) {
        Self::cell(address).set(value)
    }
}

/// The controller stayed busy for the whole wait window
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("controller {device} still busy after {waited_us} us")]
pub struct BusyTimeout {
    /// Controller index
    pub device: usize,
    /// Time spent waiting
    pub waited_us: u32,
}

/// The ten statistics counters of a controller
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatisticsCounters {
    /// Transmit error counter of fault confinement
    pub transmit_error_count: u32,
    /// Receive error counter of fault confinement
    pub receive_error_count: u32,
    /// Transmissions started
    pub tx_msg_sent_count: u32,
    /// Transmissions acknowledged by another node
    pub tx_ack_recv_count: u32,
    /// Transmissions that lost arbitration
    pub tx_arb_lost_count: u32,
    /// Transmissions aborted by an error
    pub tx_error_count: u32,
    /// Frames received
    pub rx_msg_recv_count: u32,
    /// Frames received with a CRC error
    pub rx_crc_error_count: u32,
    /// Frames received with a form error
    pub rx_form_error_count: u32,
    /// Frames received with a stuffing error
    pub rx_stuff_error_count: u32,
}

impl StatisticsCounters {
    /// Counter values in register order, paired with their names
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> {
        let values = [
            self.transmit_error_count,
            self.receive_error_count,
            self.tx_msg_sent_count,
            self.tx_ack_recv_count,
            self.tx_arb_lost_count,
            self.tx_error_count,
            self.rx_msg_recv_count,
            self.rx_crc_error_count,
            self.rx_form_error_count,
            self.rx_stuff_error_count,
        ];
        reg::COUNTERS.into_iter().map(|r| r.name).zip(values)
    }
}

/// Snapshot of the configuration side of a controller
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlRegisters {
    /// `CONTROL` register
    pub control: Control,
    /// `CONFIG` register
    pub config: Config,
    /// `STATUS` register
    pub status: Status,
    /// Propagation segment in time quanta
    pub btl_prop_seg: u32,
    /// Phase segment 1 in time quanta
    pub btl_phase_seg1: u32,
    /// Phase segment 2 in time quanta
    pub btl_phase_seg2: u32,
    /// Resynchronization jump width in time quanta
    pub btl_sync_jump_width: u32,
    /// Time quantum clock prescaler
    pub btl_time_quanta_clock_scale: u32,
}

/// Driver for a single Canola controller
pub struct Canola<R> {
    handle: DeviceHandle,
    regs: R,
}

impl<R: RegisterAccess> Canola<R> {
    /// Create a driver for the controller identified by `handle`.
    ///
    /// Nothing is written; call [`Self::init`] before sending or receiving.
    pub fn new(handle: DeviceHandle, regs: R) -> Self {
        Self { handle, regs }
    }

    /// Handle of the driven controller
    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// Controller index, shorthand for `self.handle().index()`
    pub fn index(&self) -> usize {
        self.handle.index()
    }

    fn read(&self, register: Register) -> u32 {
        self.regs.read(register.address(self.handle.base))
    }

    fn write(&self, register: Register, value: u32) {
        self.regs.write(register.address(self.handle.base), value)
    }

    /// Sets the time quanta clock prescaler to its default. Safe to repeat.
    pub fn init(&self) {
        self.write(
            reg::BTL_TIME_QUANTA_CLOCK_SCALE,
            DEFAULT_TIME_QUANTA_CLOCK_SCALE,
        );
    }

    /// Applies `config`. The bit timing, if given, is checked before anything
    /// is written.
    pub fn configure(&self, config: &DeviceConfig) -> Result<(), BitTimingError> {
        if let Some(timing) = &config.bit_timing {
            timing.check()?;
        }

        let mut value = Config::default();
        value.set_tx_retransmit_en(config.retransmit);
        value.set_btl_triple_sampling_en(config.triple_sampling);
        self.write(reg::CONFIG, value.into());

        if let Some(BitTiming {
            prop_seg,
            phase_seg_1,
            phase_seg_2,
            sjw,
            time_quanta_clock_scale,
        }) = config.bit_timing
        {
            self.write(reg::BTL_PROP_SEG, prop_seg.into());
            self.write(reg::BTL_PHASE_SEG1, phase_seg_1.into());
            self.write(reg::BTL_PHASE_SEG2, phase_seg_2.into());
            self.write(reg::BTL_SYNC_JUMP_WIDTH, sjw.into());
            self.write(
                reg::BTL_TIME_QUANTA_CLOCK_SCALE,
                time_quanta_clock_scale.into(),
            );
        }
        Ok(())
    }

    /// Current contents of the status register
    pub fn status(&self) -> Status {
        Status::from(self.read(reg::STATUS))
    }

    /// `true` while a transmission is in progress
    pub fn is_busy(&self) -> bool {
        self.status().tx_busy()
    }

    /// Starts transmitting `frame`.
    ///
    /// The controller must not be [busy](Self::is_busy); this is not checked.
    /// Completion is signalled later through the TX-done notification.
    pub fn send(&self, frame: &CanFrame) {
        let image = encode(frame);
        self.write(reg::TX_MSG_ID, image.msg_id);
        self.write(reg::TX_PAYLOAD_0, image.payload[0]);
        self.write(reg::TX_PAYLOAD_1, image.payload[1]);
        self.write(reg::TX_PAYLOAD_LENGTH, image.payload_length);

        let mut control = Control::default();
        control.set_tx_start(true);
        self.write(reg::CONTROL, control.into());
    }

    /// Starts transmitting `frame` unless the controller is busy, in which
    /// case [`nb::Error::WouldBlock`] is returned and nothing is written.
    pub fn try_send(&self, frame: &CanFrame) -> nb::Result<(), Infallible> {
        if self.is_busy() {
            return Err(nb::Error::WouldBlock);
        }
        self.send(frame);
        Ok(())
    }

    /// Polls the busy flag every `poll` until it clears or `timeout` has
    /// passed.
    pub fn wait_not_busy<D: DelayUs<u32>>(
        &self,
        delay: &mut D,
        poll: MicrosDurationU32,
        timeout: MicrosDurationU32,
    ) -> Result<(), BusyTimeout> {
        let step = poll.to_micros().max(1);
        let mut waited = 0_u32;
        while self.is_busy() {
            if waited >= timeout.to_micros() {
                return Err(BusyTimeout {
                    device: self.index(),
                    waited_us: waited,
                });
            }
            log::debug!("Canola {} busy, waiting..", self.index());
            delay.delay_us(step);
            waited = waited.saturating_add(step);
        }
        Ok(())
    }

    /// Decodes the most recently received frame.
    ///
    /// Reading does not acknowledge anything; whether the frame is new is
    /// only known from the RX-valid notification.
    pub fn receive(&self) -> CanFrame {
        let msg_id = self.read(reg::RX_MSG_ID);
        let payload_length = self.read(reg::RX_PAYLOAD_LENGTH);
        let payload = [self.read(reg::RX_PAYLOAD_0), self.read(reg::RX_PAYLOAD_1)];
        decode(&RegisterImage {
            msg_id,
            payload_length,
            payload,
        })
    }

    /// Reads all statistics counters
    pub fn counters(&self) -> StatisticsCounters {
        StatisticsCounters {
            transmit_error_count: self.read(reg::TRANSMIT_ERROR_COUNT),
            receive_error_count: self.read(reg::RECEIVE_ERROR_COUNT),
            tx_msg_sent_count: self.read(reg::TX_MSG_SENT_COUNT),
            tx_ack_recv_count: self.read(reg::TX_ACK_RECV_COUNT),
            tx_arb_lost_count: self.read(reg::TX_ARB_LOST_COUNT),
            tx_error_count: self.read(reg::TX_ERROR_COUNT),
            rx_msg_recv_count: self.read(reg::RX_MSG_RECV_COUNT),
            rx_crc_error_count: self.read(reg::RX_CRC_ERROR_COUNT),
            rx_form_error_count: self.read(reg::RX_FORM_ERROR_COUNT),
            rx_stuff_error_count: self.read(reg::RX_STUFF_ERROR_COUNT),
        }
    }

    /// Reads control, config, status and bit timing registers
    pub fn control_registers(&self) -> ControlRegisters {
        ControlRegisters {
            control: Control::from(self.read(reg::CONTROL)),
            config: Config::from(self.read(reg::CONFIG)),
            status: self.status(),
            btl_prop_seg: self.read(reg::BTL_PROP_SEG),
            btl_phase_seg1: self.read(reg::BTL_PHASE_SEG1),
            btl_phase_seg2: self.read(reg::BTL_PHASE_SEG2),
            btl_sync_jump_width: self.read(reg::BTL_SYNC_JUMP_WIDTH),
            btl_time_quanta_clock_scale: self.read(reg::BTL_TIME_QUANTA_CLOCK_SCALE),
        }
    }
}
