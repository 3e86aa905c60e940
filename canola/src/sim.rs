//! Simulated four-node bus for host tests
//!
//! Every controller is a block of plain register memory. Setting `TX_START`
//! copies the TX registers of the sender into the RX registers of every other
//! attached controller within the same call, and raises the matching
//! notifications as the interrupt handlers would.

use crate::notify::NotificationFlags;
use crate::reg::{self, status::TX_DONE, Control, Register};
use canola_core::{OperatorInput, RegisterAccess, Source};
use core::cell::RefCell;
use embedded_hal::blocking::delay::DelayUs;
use std::collections::VecDeque;

pub const NODES: usize = 4;
pub const BASES: [usize; NODES] = [0x43c0_0000, 0x43c1_0000, 0x43c2_0000, 0x43c3_0000];

const WINDOW: usize = 0x80;

#[derive(Default)]
struct Node {
    regs: [u32; WINDOW / 4],
    detached: bool,
    busy_reads: u32,
    lose_tx_done: bool,
}

#[derive(Default)]
struct State {
    nodes: [Node; NODES],
    writes: Vec<(usize, u32)>,
    reads: Vec<usize>,
    corrupt: Option<Corruption>,
    transmissions: Vec<usize>,
}

#[derive(Copy, Clone)]
struct Corruption {
    receiver: usize,
    byte: usize,
    xor: u8,
}

pub struct SimBus<'f> {
    flags: &'f NotificationFlags<NODES>,
    state: RefCell<State>,
}

impl<'f> SimBus<'f> {
    pub fn new(flags: &'f NotificationFlags<NODES>) -> Self {
        Self {
            flags,
            state: RefCell::default(),
        }
    }

    /// Disconnects `device` from the bus. Its registers stay accessible but
    /// it neither receives nor acknowledges.
    pub fn detach(&self, device: usize) {
        self.state.borrow_mut().nodes[device].detached = true;
    }

    /// The next `reads` reads of `STATUS` on `device` report `TX_BUSY`
    pub fn hold_busy(&self, device: usize, reads: u32) {
        self.state.borrow_mut().nodes[device].busy_reads = reads;
    }

    /// Transmissions of `device` complete without raising tx-done
    pub fn lose_tx_done(&self, device: usize) {
        self.state.borrow_mut().nodes[device].lose_tx_done = true;
    }

    /// Flips bits of one payload byte in every frame `receiver` latches
    pub fn corrupt(&self, receiver: usize, byte: usize, xor: u8) {
        self.state.borrow_mut().corrupt = Some(Corruption {
            receiver,
            byte,
            xor,
        });
    }

    /// Every register write so far, as `(address, value)`
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.borrow().writes.clone()
    }

    /// Number of reads of `address` so far
    pub fn reads_of(&self, address: usize) -> usize {
        self.state
            .borrow()
            .reads
            .iter()
            .filter(|a| **a == address)
            .count()
    }

    /// Sending controller of every transmission so far
    pub fn transmissions(&self) -> Vec<usize> {
        self.state.borrow().transmissions.clone()
    }

    fn locate(address: usize) -> (usize, usize) {
        BASES
            .iter()
            .enumerate()
            .find(|(_, base)| (**base..**base + WINDOW).contains(&address))
            .map(|(device, base)| (device, (address - base) / 4))
            .unwrap_or_else(|| panic!("access outside any register window: {address:#x}"))
    }

    fn transmit(&self, state: &mut State, sender: usize) {
        let word = |r: Register| r.offset / 4;
        let image = {
            let regs = &state.nodes[sender].regs;
            [
                regs[word(reg::TX_MSG_ID)],
                regs[word(reg::TX_PAYLOAD_LENGTH)],
                regs[word(reg::TX_PAYLOAD_0)],
                regs[word(reg::TX_PAYLOAD_1)],
            ]
        };
        state.transmissions.push(sender);
        state.nodes[sender].regs[word(reg::TX_MSG_SENT_COUNT)] += 1;

        let mut acked = false;
        for receiver in 0..NODES {
            if receiver == sender
                || state.nodes[receiver].detached
                || state.nodes[sender].detached
            {
                continue;
            }
            let mut latched = image;
            if let Some(c) = state.corrupt.filter(|c| c.receiver == receiver) {
                let shift = 8 * (c.byte % 4);
                latched[2 + c.byte / 4] ^= u32::from(c.xor) << shift;
            }
            let regs = &mut state.nodes[receiver].regs;
            regs[word(reg::RX_MSG_ID)] = latched[0];
            regs[word(reg::RX_PAYLOAD_LENGTH)] = latched[1];
            regs[word(reg::RX_PAYLOAD_0)] = latched[2];
            regs[word(reg::RX_PAYLOAD_1)] = latched[3];
            regs[word(reg::RX_MSG_RECV_COUNT)] += 1;
            acked = true;
            self.flags.signal(Source::RxValid(receiver as u8));
        }

        let node = &mut state.nodes[sender];
        if acked {
            node.regs[word(reg::TX_ACK_RECV_COUNT)] += 1;
        }
        node.regs[word(reg::STATUS)] |= TX_DONE.mask();
        if !node.lose_tx_done {
            self.flags.signal(Source::TxDone(sender as u8));
        }
    }
}

unsafe impl RegisterAccess for SimBus<'_> {
    fn read(&self, address: usize) -> u32 {
        let (device, word) = Self::locate(address);
        let mut state = self.state.borrow_mut();
        state.reads.push(address);
        let node = &mut state.nodes[device];
        let mut value = node.regs[word];
        if word == reg::STATUS.offset / 4 && node.busy_reads > 0 {
            node.busy_reads -= 1;
            value |= reg::status::TX_BUSY.mask();
        }
        value
    }

    fn write(&self, address: usize, value: u32) {
        let (device, word) = Self::locate(address);
        let mut state = self.state.borrow_mut();
        state.writes.push((address, value));
        state.nodes[device].regs[word] = value;
        if word == reg::CONTROL.offset / 4 && Control::from(value).tx_start() {
            // TX_START clears itself
            state.nodes[device].regs[word] = 0;
            self.transmit(&mut state, device);
        }
    }
}

/// Delay that only accounts for the time it was asked to wait
#[derive(Default)]
pub struct SimDelay {
    elapsed_us: u64,
}

impl SimDelay {
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }
}

impl DelayUs<u32> for SimDelay {
    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += u64::from(us);
    }
}

/// Operator input replaying fixed switch and button sequences. Once a
/// sequence runs out, the input reads as all zeros.
#[derive(Default)]
pub struct ScriptedInput {
    switches: VecDeque<u32>,
    buttons: VecDeque<u32>,
}

impl ScriptedInput {
    /// Keeps `switches` set for `reads` reads
    pub fn hold(switches: u32, reads: usize) -> Self {
        Self {
            switches: core::iter::repeat(switches).take(reads).collect(),
            buttons: VecDeque::new(),
        }
    }

    /// Then keeps `switches` set for another `reads` reads
    pub fn then(mut self, switches: u32, reads: usize) -> Self {
        self.switches.extend(core::iter::repeat(switches).take(reads));
        self
    }

    /// Button states returned by successive reads
    pub fn with_buttons(mut self, buttons: impl IntoIterator<Item = u32>) -> Self {
        self.buttons = buttons.into_iter().collect();
        self
    }
}

impl OperatorInput for ScriptedInput {
    fn switches(&mut self) -> u32 {
        self.switches.pop_front().unwrap_or(0)
    }

    fn buttons(&mut self) -> u32 {
        self.buttons.pop_front().unwrap_or(0)
    }
}
