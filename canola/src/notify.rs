//! Interrupt to main loop notifications
//!
//! Interrupt handlers only set flags here; the main loop observes and clears
//! them. Every flag is an [`AtomicBool`] so a flag raised by an interrupt
//! between the main loop's read and clear is never lost: observing and
//! clearing is a single [`swap`](AtomicBool::swap).
//!
//! ```no_run
//! use canola::notify::{InterruptMap, NotificationFlags};
//!
//! static FLAGS: NotificationFlags<4> = NotificationFlags::new();
//!
//! fn on_interrupt(map: &InterruptMap<4>, line: u32) {
//!     FLAGS.signal_line(map, line);
//! }
//! ```

use canola_core::{InterruptController, Source, Trigger};
use core::sync::atomic::{AtomicBool, Ordering};

/// Priority the Canola interrupt lines are registered with
pub const PRIORITY: u8 = 8;

/// Pending notifications of `N` controllers plus the GPIO block
pub struct NotificationFlags<const N: usize> {
    rx_valid: [AtomicBool; N],
    tx_done: [AtomicBool; N],
    gpio: AtomicBool,
}

impl<const N: usize> Default for NotificationFlags<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> NotificationFlags<N> {
    /// All flags cleared
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const CLEAR: AtomicBool = AtomicBool::new(false);
        Self {
            rx_valid: [CLEAR; N],
            tx_done: [CLEAR; N],
            gpio: CLEAR,
        }
    }

    fn flag(&self, source: Source) -> Option<&AtomicBool> {
        match source {
            Source::RxValid(i) => self.rx_valid.get(usize::from(i)),
            Source::TxDone(i) => self.tx_done.get(usize::from(i)),
            Source::Gpio => Some(&self.gpio),
        }
    }

    /// Raises the flag of `source`. Raising an already raised flag has no
    /// further effect, and sources of controllers `>= N` are ignored.
    ///
    /// Safe to call from interrupt context.
    pub fn signal(&self, source: Source) {
        if let Some(flag) = self.flag(source) {
            flag.store(true, Ordering::Release);
        }
    }

    /// Raises the flag routed to `line` in `map`. Unknown lines are ignored.
    pub fn signal_line(&self, map: &InterruptMap<N>, line: u32) {
        if let Some(source) = map.source(line) {
            self.signal(source);
        }
    }

    fn take(&self, source: Source) -> bool {
        self.flag(source)
            .map_or(false, |flag| flag.swap(false, Ordering::AcqRel))
    }

    fn peek(&self, source: Source) -> bool {
        self.flag(source)
            .map_or(false, |flag| flag.load(Ordering::Acquire))
    }

    fn clear(&self, source: Source) {
        if let Some(flag) = self.flag(source) {
            flag.store(false, Ordering::Release);
        }
    }

    /// Returns whether controller `device` received a frame since the flag
    /// was last cleared, and clears it
    pub fn take_rx_valid(&self, device: usize) -> bool {
        self.take(Source::RxValid(device_id(device)))
    }

    /// Returns whether controller `device` finished a transmission since the
    /// flag was last cleared, and clears it
    pub fn take_tx_done(&self, device: usize) -> bool {
        self.take(Source::TxDone(device_id(device)))
    }

    /// Returns whether the operator inputs changed since the flag was last
    /// cleared, and clears it
    pub fn take_gpio(&self) -> bool {
        self.take(Source::Gpio)
    }

    /// Reads the rx-valid flag of `device` without clearing it
    pub fn is_rx_valid_pending(&self, device: usize) -> bool {
        self.peek(Source::RxValid(device_id(device)))
    }

    /// Reads the tx-done flag of `device` without clearing it
    pub fn is_tx_done_pending(&self, device: usize) -> bool {
        self.peek(Source::TxDone(device_id(device)))
    }

    /// Reads the GPIO flag without clearing it
    pub fn is_gpio_pending(&self) -> bool {
        self.peek(Source::Gpio)
    }

    /// Clears the rx-valid flag of `device`
    pub fn clear_rx_valid(&self, device: usize) {
        self.clear(Source::RxValid(device_id(device)))
    }

    /// Clears the tx-done flag of `device`
    pub fn clear_tx_done(&self, device: usize) {
        self.clear(Source::TxDone(device_id(device)))
    }

    /// Clears the GPIO flag
    pub fn clear_gpio(&self) {
        self.clear(Source::Gpio)
    }

    /// Clears both flags of `device`
    pub fn clear_device(&self, device: usize) {
        self.clear_rx_valid(device);
        self.clear_tx_done(device);
    }
}

// Indices that do not fit a `u8` are out of range for any sensible `N`, so
// saturating keeps them out of range.
fn device_id(device: usize) -> u8 {
    u8::try_from(device).unwrap_or(u8::MAX)
}

/// Platform interrupt line numbers of every notification source
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterruptMap<const N: usize> {
    /// Rx-valid line of each controller
    pub rx_valid: [u32; N],
    /// Tx-done line of each controller
    pub tx_done: [u32; N],
    /// Operator input line
    pub gpio: u32,
}

/// Failure to register an interrupt line
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouteError<E: core::fmt::Debug> {
    /// Routing `line` to `source` was rejected
    #[error("failed to route line {line} to {notification:?}: {error:?}")]
    Route {
        /// Platform line
        line: u32,
        /// Notification source
        notification: Source,
        /// Interrupt controller error
        error: E,
    },
    /// Enabling `line` was rejected
    #[error("failed to enable line {line}: {error:?}")]
    Enable {
        /// Platform line
        line: u32,
        /// Interrupt controller error
        error: E,
    },
}

impl<const N: usize> InterruptMap<N> {
    /// Every `(line, source)` pair, controllers first
    pub fn iter(&self) -> impl Iterator<Item = (u32, Source)> + '_ {
        let rx = self
            .rx_valid
            .iter()
            .enumerate()
            .map(|(i, line)| (*line, Source::RxValid(device_id(i))));
        let tx = self
            .tx_done
            .iter()
            .enumerate()
            .map(|(i, line)| (*line, Source::TxDone(device_id(i))));
        rx.chain(tx)
            .chain(core::iter::once((self.gpio, Source::Gpio)))
    }

    /// Maps a platform line back to its notification source
    pub fn source(&self, line: u32) -> Option<Source> {
        self.iter().find(|(l, _)| *l == line).map(|(_, s)| s)
    }

    /// Routes every line rising-edge triggered at [`PRIORITY`], then enables
    /// them. Stops at the first failure; lines routed before it stay routed.
    pub fn register<C>(&self, intc: &mut C) -> Result<(), RouteError<C::Error>>
    where
        C: InterruptController,
        C::Error: core::fmt::Debug,
    {
        for (line, source) in self.iter() {
            intc.route(line, source, Trigger::RisingEdge, PRIORITY)
                .map_err(|error| RouteError::Route {
                    line,
                    notification: source,
                    error,
                })?;
        }
        for (line, _) in self.iter() {
            intc.enable(line)
                .map_err(|error| RouteError::Enable { line, error })?;
        }
        Ok(())
    }
}
