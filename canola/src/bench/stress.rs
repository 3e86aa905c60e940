//! Continuous stress mode
//!
//! Every active controller that is not busy gets a new random frame, round
//! after round, so that all of them contend for the bus at once. Nothing is
//! checked; the statistics counters are dumped periodically for inspection.

use super::{random_frame, Activity, Bench, Mode, Outcome};
use canola_core::{OperatorInput, RegisterAccess};
use embedded_hal::blocking::delay::DelayUs;
use rand::Rng;

impl<'f, R, D, I, const N: usize> Bench<'f, R, D, I, N>
where
    R: RegisterAccess,
    D: DelayUs<u32>,
    I: OperatorInput,
{
    pub(super) fn stress<G: Rng + ?Sized>(&mut self, rng: &mut G) -> Outcome {
        log::info!("Starting send continuous test");
        let active = self.config.active;
        let mut activity = Activity::default();
        let mut sent = 0_u32;
        let mut since_report = 0_u32;

        loop {
            self.drain(&mut activity);

            for device in self.devices.iter().filter(|d| active.contains(d.index())) {
                if device.try_send(&random_frame(rng)).is_ok() {
                    sent = sent.wrapping_add(1);
                    since_report += 1;
                }
            }

            if since_report >= self.config.stress_report_threshold {
                self.dump_counters(active);
                since_report = 0;
            }

            if !self.still_in(Mode::ContinuousStress) {
                break;
            }
        }

        Outcome::ContinuousStress { sent, activity }
    }
}

#[cfg(test)]
mod test {
    use crate::bench::test::bench;
    use crate::bench::{ActiveDevices, Outcome};
    use crate::config::HarnessConfig;
    use crate::notify::NotificationFlags;
    use crate::sim::{ScriptedInput, SimBus, NODES};

    #[test]
    fn idle_controllers_send_every_round() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        let mut bench = bench(
            &bus,
            &flags,
            HarnessConfig::new(ActiveDevices::all(NODES)),
            ScriptedInput::hold(0x02, 3),
        );
        let Outcome::ContinuousStress { sent, activity } = bench.run_selected() else {
            panic!("stress mode did not run");
        };
        assert_eq!(sent, 12);
        assert_eq!(bus.transmissions(), [0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3]);
        // Notifications of the last round are still pending
        assert_eq!(activity.tx_done, 8);
        assert_eq!(activity.rx_valid, 8);
    }

    #[test]
    fn busy_and_inactive_controllers_are_skipped() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        let mut bench = bench(
            &bus,
            &flags,
            HarnessConfig::new(ActiveDevices::all(NODES).without(0)),
            ScriptedInput::hold(0x02, 2),
        );
        bus.hold_busy(2, 1);
        let Outcome::ContinuousStress { sent, .. } = bench.run_selected() else {
            panic!("stress mode did not run");
        };
        assert_eq!(sent, 5);
        assert_eq!(bus.transmissions(), [1, 3, 1, 2, 3]);
    }
}
