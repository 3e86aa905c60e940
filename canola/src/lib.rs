#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//! # Canola
//!
//! ## Overview
//! This crate drives Canola CAN controllers and runs a validation bench over
//! several of them attached to one bus.
//!
//! A Canola controller is an FPGA soft core reached through a window of 32-bit
//! memory-mapped registers. It holds a single transmit frame and latches the
//! most recently received frame; two interrupt lines report a finished
//! transmission (tx-done) and a received frame (rx-valid).
//!
//! The crate provides the following:
//!
//! - the register map in [`reg`], bit-exact with the hardware
//! - translation between [`CanFrame`](message::CanFrame) and the register
//!   layout in [`message`]
//! - a per-controller driver, [`Canola`](device::Canola)
//! - lock-free notification flags set from interrupt handlers, in [`notify`]
//! - the validation [`bench`] with manual, continuous stress and round-robin
//!   modes
//!
//! Everything specific to a board (register access, interrupt controller,
//! operator switches and buttons) is abstracted by the traits of
//! [`canola_core`], re-exported as [`core`].
//!
//! ## Usage
//!
//! ```no_run
//! use canola::bench::{ActiveDevices, Bench};
//! use canola::config::HarnessConfig;
//! use canola::device::{Canola, DeviceHandle, Mmio};
//! use canola::notify::{InterruptMap, NotificationFlags};
//! # use canola::core::{InterruptController, OperatorInput, Source, Trigger};
//! # struct Gic;
//! # impl InterruptController for Gic {
//! #     type Error = ();
//! #     fn route(&mut self, _: u32, _: Source, _: Trigger, _: u8) -> Result<(), ()> { Ok(()) }
//! #     fn enable(&mut self, _: u32) -> Result<(), ()> { Ok(()) }
//! # }
//! # struct Board;
//! # impl OperatorInput for Board {
//! #     fn switches(&mut self) -> u32 { 0 }
//! #     fn buttons(&mut self) -> u32 { 0 }
//! # }
//! # struct Delay;
//! # impl embedded_hal::blocking::delay::DelayUs<u32> for Delay {
//! #     fn delay_us(&mut self, _: u32) {}
//! # }
//!
//! static FLAGS: NotificationFlags<4> = NotificationFlags::new();
//!
//! const LINES: InterruptMap<4> = InterruptMap {
//!     rx_valid: [61, 62, 63, 64],
//!     tx_done: [65, 66, 67, 68],
//!     gpio: 84,
//! };
//!
//! // Call from the interrupt handler of every routed line
//! fn on_interrupt(line: u32) {
//!     FLAGS.signal_line(&LINES, line);
//! }
//!
//! // Safety: the addresses are the register windows of the four controllers
//! // and nothing else accesses them.
//! let mmio = unsafe { Mmio::new() };
//! let bases = [0x43c0_0000, 0x43c1_0000, 0x43c2_0000, 0x43c3_0000];
//! let devices = DeviceHandle::table(bases).map(|handle| Canola::new(handle, &mmio));
//!
//! // Controller 2 is not wired to the bus on this board
//! let config = HarnessConfig::new(ActiveDevices::all(4).without(2));
//! let mut bench = Bench::start(devices, &FLAGS, Delay, Board, config, &LINES, &mut Gic)
//!     .expect("bench startup");
//! loop {
//!     let outcome = bench.run_selected();
//!     # let _ = outcome;
//! }
//! ```

pub use canola_core as core;
pub use embedded_can;

pub mod bench;
pub mod config;
pub mod device;
pub mod message;
pub mod notify;
pub mod reg;

#[cfg(test)]
pub(crate) mod sim;
