//! Manual mode
//!
//! Each push button belongs to one controller: button bit `N - 1 - i` makes
//! controller `i` send its preset frame, whose identifier extension is then
//! advanced by one so that consecutive presses can be told apart on the bus.
//! Presets start over every time the mode is entered.
//!
//! All notifications are logged as they arrive. The loop runs once per
//! [`HarnessConfig::manual_period`].
//!
//! [`HarnessConfig::manual_period`]: crate::config::HarnessConfig::manual_period

use super::{Activity, Bench, Mode, Outcome};
use crate::message::CanFrame;
use canola_core::{OperatorInput, RegisterAccess};
use embedded_hal::blocking::delay::DelayUs;

/// Extended frames sent by controllers 0 to 3, as `(identifier extension,
/// payload)`. Base identifier is zero and length is eight.
pub const PRESETS: [(u32, [u8; 8]); 4] = [
    (0xABC, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]),
    (0xDEF, [0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]),
    (0xFFF, [0x11, 0xAA, 0x22, 0xBB, 0x33, 0xCC, 0x44, 0xDD]),
    (0x000, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x12, 0x34]),
];

/// Preset frame of controller `device`. Controllers beyond the fourth reuse
/// the presets in order.
pub fn preset(device: usize) -> CanFrame {
    let (extension_id, payload) = PRESETS[device % PRESETS.len()];
    CanFrame::normalized(0, extension_id, true, false, payload, 8)
}

/// Bit of the button that makes controller `device` send
pub fn button(device: usize, devices: usize) -> u32 {
    devices
        .checked_sub(device + 1)
        .and_then(|bit| 1_u32.checked_shl(bit as u32))
        .unwrap_or(0)
}

impl<'f, R, D, I, const N: usize> Bench<'f, R, D, I, N>
where
    R: RegisterAccess,
    D: DelayUs<u32>,
    I: OperatorInput,
{
    pub(super) fn manual(&mut self) -> Outcome {
        log::info!("Starting manual test");
        let mut presets: [CanFrame; N] = core::array::from_fn(preset);
        let mut activity = Activity::default();
        let mut cycles = 0_u32;
        let mut sent = 0_u32;
        let mut since_report = 0_u32;

        loop {
            let buttons = self.input.buttons();
            for (i, frame) in presets.iter_mut().enumerate() {
                if buttons & button(i, N) == 0 {
                    continue;
                }
                let ready = self.devices[i].wait_not_busy(
                    &mut self.delay,
                    self.config.poll_interval,
                    self.config.busy_timeout,
                );
                match ready {
                    Ok(()) => {
                        self.devices[i].send(frame);
                        *frame = frame.with_extension_id_step(1);
                        sent = sent.wrapping_add(1);
                    }
                    Err(timeout) => log::error!("{timeout}"),
                }
            }

            self.drain(&mut activity);
            if self.flags.take_gpio() {
                log::debug!("GPIO interrupt");
                activity.gpio = activity.gpio.wrapping_add(1);
            }

            self.sleep(self.config.manual_period);
            cycles = cycles.wrapping_add(1);
            since_report += 1;
            if since_report >= self.config.manual_report_cycles {
                self.dump_counters(super::ActiveDevices::all(N));
                since_report = 0;
            }

            if !self.still_in(Mode::Manual) {
                break;
            }
        }

        Outcome::Manual {
            cycles,
            sent,
            activity,
        }
    }
}
