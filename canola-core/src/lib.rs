#![no_std]
#![warn(missing_docs)]

//! `canola-core` provides the small set of abstractions that connect the
//! platform independent [`canola`] crate to a concrete board support package
//! (in documentation also referred to as _the platform_).
//!
//! The Canola controller is an FPGA soft core attached to the host processor
//! through a memory-mapped register window. Everything around that window is
//! platform specific: how a 32-bit register is reached, how the interrupt
//! controller routes the two per-controller interrupt lines, and how the
//! operator's switches and buttons are sampled. Traits from this crate are
//! implemented by the platform, never by the application.
//!
//! [`canola`]: <https://docs.rs/crate/canola/>

/// Raw 32-bit register access primitive.
///
/// Addresses are absolute byte addresses; the driver adds register offsets
/// to a device's base address before calling into this trait.
///
/// # Safety
/// - `read` and `write` must perform exactly one 32-bit access to the given
///   address and must not be reordered or elided by the implementation.
/// - Every address a driver is constructed for must belong to a Canola
///   register window that nothing else in the program accesses.
///
/// # Examples
/// ```no_run
/// use canola_core::RegisterAccess;
///
/// pub struct Xil;
///
/// unsafe impl RegisterAccess for Xil {
///     fn read(&self, address: usize) -> u32 {
///         unsafe { core::ptr::read_volatile(address as *const u32) }
///     }
///
///     fn write(&self, address: usize, value: u32) {
///         unsafe { core::ptr::write_volatile(address as *mut u32, value) }
///     }
/// }
/// ```
pub unsafe trait RegisterAccess {
    /// Read the 32-bit register at `address`
    fn read(&self, address: usize) -> u32;
    /// Write `value` to the 32-bit register at `address`
    fn write(&self, address: usize, value: u32);
}

// Safety: forwards every access unchanged.
unsafe impl<T: RegisterAccess + ?Sized> RegisterAccess for &T {
    fn read(&self, address: usize) -> u32 {
        (**self).read(address)
    }

    fn write(&self, address: usize, value: u32) {
        (**self).write(address, value)
    }
}

/// Asynchronous notification produced by the hardware.
///
/// Each Canola controller drives two interrupt lines; the switch/button GPIO
/// block drives one more that is shared by every controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// A frame has been fully received by the controller with this index
    RxValid(u8),
    /// A transmission attempt finished on the controller with this index,
    /// whether it succeeded or not
    TxDone(u8),
    /// Any activity on the switch/button inputs
    Gpio,
}

/// Interrupt trigger type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Triggered on the rising edge of the line. The Canola interrupt outputs
    /// are single-cycle pulses and must use this trigger.
    RisingEdge,
    /// Triggered while the line is asserted
    Level,
}

/// Interrupt controller registration facility.
///
/// The platform owns the actual interrupt vector. Once a line has been
/// routed, its handler is expected to forward the line number to the
/// notification bridge of the `canola` crate and return immediately.
pub trait InterruptController {
    /// Error reported by the platform's interrupt controller driver
    type Error;

    /// Connect `line` to `source` with the given trigger type and priority.
    /// Lower values mean higher priority.
    fn route(
        &mut self,
        line: u32,
        source: Source,
        trigger: Trigger,
        priority: u8,
    ) -> Result<(), Self::Error>;

    /// Unmask a previously routed `line`
    fn enable(&mut self, line: u32) -> Result<(), Self::Error>;
}

/// Discrete operator inputs, sampled as bit masks.
///
/// Only used to select the operating mode of the validation bench and, in
/// manual mode, which controller transmits next.
pub trait OperatorInput {
    /// Current state of the slide switches, one bit per switch
    fn switches(&mut self) -> u32;
    /// Current state of the push buttons, one bit per button
    fn buttons(&mut self) -> u32;
}
