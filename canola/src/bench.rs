//! Multi-node validation bench
//!
//! The bench drives all controllers of one board, which share a single CAN
//! bus. The operator picks a mode with the slide switches:
//!
//! | switches | mode                                       |
//! |----------|--------------------------------------------|
//! | `0x01`   | [manual](manual): buttons send fixed frames |
//! | `0x02`   | [continuous stress](stress)                |
//! | `0x04`   | [round-robin sequential test](sequence)    |
//! | other    | idle                                       |
//!
//! A mode runs until the switches leave it; the switches are sampled once per
//! round. Progress and failures are reported through [`log`], results are
//! returned as an [`Outcome`].

pub mod manual;
mod report;
pub mod sequence;
pub mod stress;

pub use sequence::{RoundResult, Tally};

use crate::config::{BitTimingError, HarnessConfig};
use crate::device::Canola;
use crate::message::{CanFrame, MAX_BASE_ID, MAX_EXTENSION_ID, MAX_LENGTH};
use crate::notify::{InterruptMap, NotificationFlags, RouteError};
use canola_core::{InterruptController, OperatorInput, RegisterAccess};
use embedded_hal::blocking::delay::DelayUs;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// Operating mode selected by the operator switches
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Nothing runs
    Idle,
    /// Buttons send preset frames
    Manual,
    /// Every idle controller sends random frames back to back
    ContinuousStress,
    /// Controllers take turns sending random frames, the others check them
    RoundRobin,
}

impl Mode {
    /// Decodes the switch state. Only a single raised switch selects a mode.
    pub fn from_switches(switches: u32) -> Self {
        match switches {
            0x01 => Self::Manual,
            0x02 => Self::ContinuousStress,
            0x04 => Self::RoundRobin,
            _ => Self::Idle,
        }
    }
}

/// A set of controller indices, at most 32
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct ActiveDevices(u32);

impl FromIterator<usize> for ActiveDevices {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut set = 0_u32;
        for i in iter.into_iter() {
            set |= 1_u32.checked_shl(i as u32).unwrap_or(0);
        }
        ActiveDevices(set)
    }
}

impl core::fmt::Debug for ActiveDevices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl ActiveDevices {
    /// Controllers `0..n`
    pub fn all(n: usize) -> Self {
        (0..n).collect()
    }

    /// Returns the set with `device` added
    pub fn with(self, device: usize) -> Self {
        Self(self.0 | 1_u32.checked_shl(device as u32).unwrap_or(0))
    }

    /// Returns the set without `device`
    pub fn without(self, device: usize) -> Self {
        Self(self.0 & !1_u32.checked_shl(device as u32).unwrap_or(0))
    }

    /// Returns the controllers contained in both sets
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// `true` if `device` is in the set
    pub fn contains(&self, device: usize) -> bool {
        device < 32 && self.0 & (1 << device) != 0
    }

    /// Number of controllers in the set
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// `true` if the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Lowest index in the set
    pub fn first(&self) -> Option<usize> {
        self.iter().next()
    }

    /// The controller following `device` in round-robin order: the next
    /// higher index in the set, wrapping around to the lowest.
    pub fn next_after(&self, device: usize) -> Option<usize> {
        self.iter().find(|i| *i > device).or_else(|| self.first())
    }

    /// An iterator visiting all elements in ascending order.
    pub fn iter(&self) -> Iter {
        Iter {
            flags: *self,
            index: 0,
        }
    }
}

/// An iterator over the indices in an [`ActiveDevices`] set.
///
/// This `struct` is created by [`ActiveDevices::iter`].
pub struct Iter {
    flags: ActiveDevices,
    index: u8,
}

impl Iterator for Iter {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.index;
        self.index = self.index.saturating_add(1);
        if i > 31 {
            None
        } else if self.flags.0 & (1 << i) != 0 {
            Some(i as usize)
        } else {
            self.next()
        }
    }
}

/// Generates a frame with every field uniformly distributed over its range.
///
/// Standard frames get a zero identifier extension, and bytes at and after
/// the length are zero, as is the whole payload of a remote frame.
pub fn random_frame<G: Rng + ?Sized>(rng: &mut G) -> CanFrame {
    let base_id = rng.gen_range(0..=MAX_BASE_ID);
    let extension_id = rng.gen_range(0..=MAX_EXTENSION_ID);
    let extended = rng.gen::<bool>();
    let remote = rng.gen::<bool>();
    let length = rng.gen_range(0..=MAX_LENGTH);
    let mut payload = [0_u8; 8];
    if !remote {
        for byte in payload.iter_mut().take(length.into()) {
            *byte = rng.gen();
        }
    }
    CanFrame::normalized(base_id, extension_id, extended, remote, payload, length)
}

/// Flags drained by the manual and stress modes
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Activity {
    /// Observed tx-done notifications
    pub tx_done: u32,
    /// Observed rx-valid notifications
    pub rx_valid: u32,
    /// Observed operator input notifications
    pub gpio: u32,
}

/// Result of one [`Bench::run_selected`] call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No mode was selected
    Idle,
    /// Manual mode ran for `cycles` cycles
    Manual {
        /// Completed cycles
        cycles: u32,
        /// Frames sent on button presses
        sent: u32,
        /// Drained notifications
        activity: Activity,
    },
    /// Continuous stress mode ran
    ContinuousStress {
        /// Frames sent
        sent: u32,
        /// Drained notifications
        activity: Activity,
    },
    /// Round-robin test ran
    RoundRobin(Tally),
}

/// Failure to bring the bench up
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StartupError<E: core::fmt::Debug> {
    /// Interrupt lines could not be registered
    #[error("interrupt setup failed: {0}")]
    Interrupts(RouteError<E>),
    /// A controller rejected its configuration
    #[error("controller {device} rejected its configuration: {error}")]
    Configure {
        /// Controller index
        device: usize,
        /// Reason
        error: BitTimingError,
    },
}

/// The validation bench for `N` controllers sharing one bus
pub struct Bench<'f, R, D, I, const N: usize> {
    devices: [Canola<R>; N],
    flags: &'f NotificationFlags<N>,
    delay: D,
    input: I,
    config: HarnessConfig,
    seed: u64,
}

impl<'f, R, D, I, const N: usize> Bench<'f, R, D, I, N>
where
    R: RegisterAccess,
    D: DelayUs<u32>,
    I: OperatorInput,
{
    /// Registers the interrupt lines in `map` with `intc`, initializes and
    /// configures every controller and dumps their registers.
    ///
    /// Any failure aborts the startup.
    pub fn start<C>(
        devices: [Canola<R>; N],
        flags: &'f NotificationFlags<N>,
        delay: D,
        input: I,
        config: HarnessConfig,
        map: &InterruptMap<N>,
        intc: &mut C,
    ) -> Result<Self, StartupError<C::Error>>
    where
        C: InterruptController,
        C::Error: core::fmt::Debug,
    {
        log::info!("Initializing interrupts...");
        map.register(intc).map_err(StartupError::Interrupts)?;

        log::info!("Initializing Canola CAN controllers...");
        for device in devices.iter() {
            device.init();
            if let Some(device_config) = &config.device {
                device
                    .configure(device_config)
                    .map_err(|error| StartupError::Configure {
                        device: device.index(),
                        error,
                    })?;
            }
            report::control_registers(device);
            report::counters(device);
        }
        for i in 0..N {
            flags.clear_device(i);
        }
        flags.clear_gpio();

        Ok(Self {
            devices,
            flags,
            delay,
            input,
            config,
            seed: 0,
        })
    }

    /// Samples the switches and runs the selected mode until the operator
    /// leaves it.
    ///
    /// Every call advances the seed of the random frame generator; stress and
    /// round-robin runs start from a freshly seeded generator.
    pub fn run_selected(&mut self) -> Outcome {
        let mode = Mode::from_switches(self.input.switches());
        let outcome = match mode {
            Mode::Idle => Outcome::Idle,
            Mode::Manual => self.manual(),
            Mode::ContinuousStress => {
                let mut rng = Xoshiro256StarStar::seed_from_u64(self.seed);
                self.stress(&mut rng)
            }
            Mode::RoundRobin => {
                let mut rng = Xoshiro256StarStar::seed_from_u64(self.seed);
                Outcome::RoundRobin(self.round_robin(&mut rng))
            }
        };
        self.seed = self.seed.wrapping_add(1);
        outcome
    }

    /// Seed the next stress or round-robin run starts from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Replaces the seed of the next run
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Active configuration
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Driver of every controller
    pub fn devices(&self) -> &[Canola<R>; N] {
        &self.devices
    }

    /// Tears the bench down, returning drivers, delay and operator input
    pub fn release(self) -> ([Canola<R>; N], D, I) {
        (self.devices, self.delay, self.input)
    }

    fn still_in(&mut self, mode: Mode) -> bool {
        Mode::from_switches(self.input.switches()) == mode
    }

    fn sleep(&mut self, duration: fugit::MicrosDurationU32) {
        self.delay.delay_us(duration.to_micros());
    }

    /// Consumes and logs every pending notification
    fn drain(&self, activity: &mut Activity) {
        for i in 0..N {
            if self.flags.take_tx_done(i) {
                log::debug!("Tx done CAN #{i}");
                activity.tx_done = activity.tx_done.wrapping_add(1);
            }
            if self.flags.take_rx_valid(i) {
                log::debug!("Rx msg received CAN #{i}");
                activity.rx_valid = activity.rx_valid.wrapping_add(1);
            }
        }
    }

    fn dump_counters(&self, set: ActiveDevices) {
        for device in self.devices.iter().filter(|d| set.contains(d.index())) {
            report::counters(device);
        }
    }
}
