//! Round-robin sequential test
//!
//! Active controllers take turns as the transmitter, in ascending index order.
//! Each round one random frame is sent and every other active controller must
//! report reception of exactly that frame. A round either passes or fails;
//! failures are logged and counted, the test never stops on its own.
//!
//! Notifications left over from an earlier mode are discarded when the test
//! starts.
//!
//! One round:
//! 1. wait until the transmitter is no longer busy, giving up after
//!    [`HarnessConfig::busy_timeout`]
//! 2. clear the transmitter's tx-done and the receivers' rx-valid
//!    notifications, send the frame and sleep for
//!    [`HarnessConfig::settle_time`]
//! 3. test-and-clear the transmitter's tx-done notification
//! 4. test-and-clear the rx-valid notification of every other active
//!    controller, and compare what it received with what was sent
//! 5. clear all notifications, whatever the outcome
//!
//! Counters of the active controllers are dumped every
//! [`HarnessConfig::report_interval`] rounds and when the test ends.
//!
//! [`HarnessConfig::busy_timeout`]: crate::config::HarnessConfig::busy_timeout
//! [`HarnessConfig::settle_time`]: crate::config::HarnessConfig::settle_time
//! [`HarnessConfig::report_interval`]: crate::config::HarnessConfig::report_interval

use super::{random_frame, report, ActiveDevices, Bench, Mode};
use crate::message::{CanFrame, Mismatch};
use canola_core::{OperatorInput, RegisterAccess};
use embedded_hal::blocking::delay::DelayUs;
use rand::Rng;

/// What happened in a single round
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    /// Sending controller
    pub transmitter: usize,
    /// The transmitter stayed busy and nothing was sent
    pub busy_timeout: bool,
    /// The transmitter signalled completion
    pub tx_done: bool,
    /// Controllers that signalled reception
    pub received: ActiveDevices,
    /// Expected receivers that did not signal reception
    pub missing: ActiveDevices,
    /// Receivers whose frame differs from the sent one
    pub mismatched: ActiveDevices,
    /// Lowest mismatching receiver and its first differing field
    pub first_mismatch: Option<(usize, Mismatch)>,
}

impl RoundResult {
    fn new(transmitter: usize) -> Self {
        Self {
            transmitter,
            busy_timeout: false,
            tx_done: false,
            received: ActiveDevices::default(),
            missing: ActiveDevices::default(),
            mismatched: ActiveDevices::default(),
            first_mismatch: None,
        }
    }

    /// `true` if the frame was sent and every receiver got it unchanged
    pub fn passed(&self) -> bool {
        !self.busy_timeout
            && self.tx_done
            && self.missing.is_empty()
            && self.mismatched.is_empty()
    }
}

/// Counters accumulated over a round-robin run
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Completed rounds
    pub rounds: u32,
    /// Rounds where the transmitter signalled completion
    pub tx_done: u32,
    /// Rounds where the transmitter did not signal completion
    pub tx_not_done: u32,
    /// Rounds skipped because the transmitter stayed busy
    pub busy_timeouts: u32,
    /// Frames received
    pub rx_msg: u32,
    /// Frames received unchanged
    pub rx_msg_ok: u32,
    /// Frames received with a difference
    pub rx_msg_not_ok: u32,
    /// Expected frames never signalled
    pub rx_missing: u32,
    /// Passed rounds
    pub success: u32,
    /// Failed rounds
    pub fail: u32,
}

impl Tally {
    /// Accounts for one round
    pub fn record(&mut self, round: &RoundResult) {
        self.rounds = self.rounds.wrapping_add(1);
        if round.busy_timeout {
            self.busy_timeouts = self.busy_timeouts.wrapping_add(1);
        } else if round.tx_done {
            self.tx_done = self.tx_done.wrapping_add(1);
        } else {
            self.tx_not_done = self.tx_not_done.wrapping_add(1);
        }
        let received = round.received.len() as u32;
        let mismatched = round.mismatched.len() as u32;
        self.rx_msg = self.rx_msg.wrapping_add(received);
        self.rx_msg_not_ok = self.rx_msg_not_ok.wrapping_add(mismatched);
        self.rx_msg_ok = self.rx_msg_ok.wrapping_add(received - mismatched);
        self.rx_missing = self.rx_missing.wrapping_add(round.missing.len() as u32);
        if round.passed() {
            self.success = self.success.wrapping_add(1);
        } else {
            self.fail = self.fail.wrapping_add(1);
        }
    }
}

impl<'f, R, D, I, const N: usize> Bench<'f, R, D, I, N>
where
    R: RegisterAccess,
    D: DelayUs<u32>,
    I: OperatorInput,
{
    pub(super) fn round_robin<G: Rng + ?Sized>(&mut self, rng: &mut G) -> Tally {
        log::info!("Starting send in sequence test");
        let active = self.config.active.intersection(ActiveDevices::all(N));
        let mut tally = Tally::default();
        for i in 0..N {
            self.flags.clear_device(i);
        }
        let Some(mut transmitter) = active.first() else {
            log::warn!("No active controller, nothing to test");
            return tally;
        };

        let mut since_report = 0;
        loop {
            let frame = random_frame(rng);
            let result = self.round(transmitter, &frame);
            tally.record(&result);
            if !result.passed() {
                log::warn!("Round {} failed, CAN #{transmitter} sending", tally.rounds);
            }

            since_report += 1;
            if since_report >= self.config.report_interval {
                self.dump_counters(active);
                since_report = 0;
            }

            transmitter = active.next_after(transmitter).unwrap_or(transmitter);
            if !self.still_in(Mode::RoundRobin) {
                break;
            }
        }

        report::tally(&tally);
        self.dump_counters(active);
        tally
    }

    fn round(&mut self, transmitter: usize, frame: &CanFrame) -> RoundResult {
        let active = self.config.active.intersection(ActiveDevices::all(N));
        let mut result = RoundResult::new(transmitter);

        let ready = self.devices[transmitter].wait_not_busy(
            &mut self.delay,
            self.config.poll_interval,
            self.config.busy_timeout,
        );
        match ready {
            Ok(()) => {
                self.flags.clear_tx_done(transmitter);
                for receiver in active.iter().filter(|i| *i != transmitter) {
                    self.flags.clear_rx_valid(receiver);
                }
                self.devices[transmitter].send(frame);
                self.sleep(self.config.settle_time);
                self.check(&mut result, active, frame);
            }
            Err(timeout) => {
                log::error!("{timeout}");
                result.busy_timeout = true;
            }
        }

        for i in 0..N {
            self.flags.clear_device(i);
        }
        result
    }

    fn check(&self, result: &mut RoundResult, active: ActiveDevices, frame: &CanFrame) {
        let transmitter = result.transmitter;
        result.tx_done = self.flags.take_tx_done(transmitter);
        if !result.tx_done {
            log::warn!("CAN {transmitter} failed to send message");
        }

        for receiver in active.iter().filter(|i| *i != transmitter) {
            if !self.flags.take_rx_valid(receiver) {
                log::warn!("CAN {receiver} failed to receive message from CAN {transmitter}");
                result.missing = result.missing.with(receiver);
                continue;
            }
            result.received = result.received.with(receiver);

            let received = self.devices[receiver].receive();
            if let Err(mismatch) = frame.compare(&received) {
                log::error!("{mismatch}");
                report::mismatch(transmitter, frame, receiver, &received);
                result.mismatched = result.mismatched.with(receiver);
                if result.first_mismatch.is_none() {
                    result.first_mismatch = Some((receiver, mismatch));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bench::test::bench;
    use crate::bench::Outcome;
    use crate::config::HarnessConfig;
    use crate::notify::NotificationFlags;
    use crate::reg;
    use crate::sim::{ScriptedInput, SimBus, BASES, NODES};
    use canola_core::Source;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    const ROUND_ROBIN: u32 = 0x04;

    fn config(active: ActiveDevices) -> HarnessConfig {
        HarnessConfig::new(active)
    }

    fn tally(outcome: Outcome) -> Tally {
        match outcome {
            Outcome::RoundRobin(tally) => tally,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn transmitters_rotate_in_ascending_order() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        let active = ActiveDevices::all(NODES).without(2);
        let mut bench = bench(&bus, &flags, config(active), ScriptedInput::hold(ROUND_ROBIN, 6));
        let tally = tally(bench.run_selected());

        assert_eq!(bus.transmissions(), [0, 1, 3, 0, 1, 3]);
        assert_eq!(tally.rounds, 6);
        assert_eq!(tally.success, 6);
        assert_eq!(tally.tx_done, 6);
        assert_eq!(tally.rx_msg_ok, 12);
        assert_eq!(tally.fail, 0);
    }

    #[test]
    fn every_controller_sends_once_per_cycle() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        let mut bench = bench(
            &bus,
            &flags,
            config(ActiveDevices::all(NODES)),
            ScriptedInput::hold(ROUND_ROBIN, 4),
        );
        tally(bench.run_selected());
        assert_eq!(bus.transmissions(), [0, 1, 2, 3]);
    }

    #[test]
    fn corrupted_byte_fails_the_round() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        bus.corrupt(1, 3, 0x04);
        let mut bench = bench(
            &bus,
            &flags,
            config(ActiveDevices::all(NODES)),
            ScriptedInput::default(),
        );
        let frame = CanFrame::from_parts(
            0,
            0xABC,
            true,
            false,
            [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
            8,
        )
        .unwrap();

        let result = bench.round(0, &frame);
        assert!(!result.passed());
        assert!(result.tx_done);
        assert_eq!(
            result.first_mismatch,
            Some((
                1,
                Mismatch::Payload {
                    index: 3,
                    sent: 0x44,
                    received: 0x40
                }
            ))
        );
        assert_eq!(result.mismatched, [1].into_iter().collect::<ActiveDevices>());
        assert_eq!(
            result.received,
            [1, 2, 3].into_iter().collect::<ActiveDevices>()
        );

        let mut tally = Tally::default();
        tally.record(&result);
        assert_eq!(tally.rx_msg_ok, 2);
        assert_eq!(tally.rx_msg_not_ok, 1);
        assert_eq!(tally.fail, 1);
    }

    #[test]
    fn absent_controller_fails_every_round() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        bus.detach(2);
        let mut bench = bench(
            &bus,
            &flags,
            config(ActiveDevices::all(NODES)),
            ScriptedInput::hold(ROUND_ROBIN, 4),
        );
        let tally = tally(bench.run_selected());
        assert_eq!(tally.fail, 4);
        assert_eq!(tally.success, 0);
        // Three rounds miss controller 2, its own round reaches nobody
        assert_eq!(tally.rx_missing, 6);
    }

    #[test]
    fn excluding_absent_controller_passes() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        bus.detach(2);
        let mut bench = bench(
            &bus,
            &flags,
            config(ActiveDevices::all(NODES).without(2)),
            ScriptedInput::hold(ROUND_ROBIN, 3),
        );
        let tally = tally(bench.run_selected());
        assert_eq!(tally.success, 3);
        assert_eq!(tally.rx_missing, 0);
    }

    #[test]
    fn stuck_transmitter_times_out() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        bus.hold_busy(1, u32::MAX);
        let mut bench = bench(
            &bus,
            &flags,
            config([0, 1].into_iter().collect()),
            ScriptedInput::hold(ROUND_ROBIN, 3),
        );
        let tally = tally(bench.run_selected());
        assert_eq!(bus.transmissions(), [0, 0]);
        assert_eq!(tally.busy_timeouts, 1);
        assert_eq!(tally.success, 2);
        assert_eq!(tally.fail, 1);
        assert_eq!(tally.tx_not_done, 0);

        let (_, delay, _) = bench.release();
        // Two settle sleeps plus the full busy timeout
        assert_eq!(delay.elapsed_us(), 2 * 2_000 + 100_000);
    }

    #[test]
    fn lost_tx_done_is_a_transmit_failure() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        bus.lose_tx_done(3);
        let mut bench = bench(
            &bus,
            &flags,
            config(ActiveDevices::all(NODES)),
            ScriptedInput::hold(ROUND_ROBIN, 4),
        );
        let tally = tally(bench.run_selected());
        assert_eq!(tally.tx_not_done, 1);
        assert_eq!(tally.tx_done, 3);
        assert_eq!(tally.fail, 1);
        assert_eq!(tally.rx_msg_ok, 12);
        for i in 0..NODES {
            assert!(!flags.is_rx_valid_pending(i));
            assert!(!flags.is_tx_done_pending(i));
        }
    }

    #[test]
    fn same_seed_replays_the_same_frames() {
        let received = |seed| {
            let flags = NotificationFlags::new();
            let bus = SimBus::new(&flags);
            let mut bench = bench(
                &bus,
                &flags,
                config(ActiveDevices::all(NODES)),
                ScriptedInput::hold(ROUND_ROBIN, 1),
            );
            bench.set_seed(seed);
            tally(bench.run_selected());
            bench.devices()[1].receive()
        };
        assert_eq!(received(11), received(11));
        assert_ne!(received(11), received(12));
    }

    #[test]
    fn tally_wraps_in_long_runs() {
        let mut tally = Tally {
            rounds: u32::MAX,
            tx_done: u32::MAX,
            rx_msg: u32::MAX - 2,
            rx_msg_ok: u32::MAX,
            success: u32::MAX,
            ..Tally::default()
        };
        let round = RoundResult {
            tx_done: true,
            received: [1, 2, 3].into_iter().collect(),
            ..RoundResult::new(0)
        };
        tally.record(&round);
        assert_eq!(tally.rounds, 0);
        assert_eq!(tally.tx_done, 0);
        assert_eq!(tally.rx_msg, 0);
        assert_eq!(tally.rx_msg_ok, 2);
        assert_eq!(tally.success, 0);
    }

    #[test]
    fn notifications_left_by_stress_are_discarded() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        let mut bench = bench(
            &bus,
            &flags,
            config(ActiveDevices::all(NODES)),
            ScriptedInput::hold(0x02, 1).then(ROUND_ROBIN, 1),
        );
        assert!(matches!(
            bench.run_selected(),
            Outcome::ContinuousStress { .. }
        ));
        assert!(flags.is_tx_done_pending(0));
        assert!(flags.is_rx_valid_pending(3));

        bus.lose_tx_done(0);
        bus.detach(3);
        let tally = tally(bench.run_selected());
        assert_eq!(tally.rounds, 1);
        assert_eq!(tally.tx_not_done, 1);
        assert_eq!(tally.tx_done, 0);
        assert_eq!(tally.rx_missing, 1);
        assert_eq!(tally.rx_msg_ok, 2);
        assert_eq!(tally.fail, 1);
        assert_eq!(tally.success, 0);
    }

    #[test]
    fn stale_notifications_do_not_pass_a_round() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        let mut bench = bench(
            &bus,
            &flags,
            config(ActiveDevices::all(NODES)),
            ScriptedInput::default(),
        );
        flags.signal(Source::TxDone(1));
        flags.signal(Source::RxValid(2));
        bus.lose_tx_done(1);
        bus.detach(2);

        let frame = random_frame(&mut Xoshiro256StarStar::seed_from_u64(5));
        let result = bench.round(1, &frame);
        assert!(!result.tx_done);
        assert_eq!(result.missing, [2].into_iter().collect::<ActiveDevices>());
        assert_eq!(
            result.received,
            [0, 3].into_iter().collect::<ActiveDevices>()
        );
        assert!(!result.passed());
    }

    #[test]
    fn counters_are_dumped_every_report_interval() {
        let flags = NotificationFlags::new();
        let bus = SimBus::new(&flags);
        let mut config = config(ActiveDevices::all(NODES).without(2));
        config.report_interval = 2;
        let mut bench = bench(&bus, &flags, config, ScriptedInput::hold(ROUND_ROBIN, 5));
        let sent_count =
            |device: usize| bus.reads_of(BASES[device] + reg::TX_MSG_SENT_COUNT.offset);

        // Startup dumps every controller once
        assert_eq!(sent_count(0), 1);
        assert_eq!(sent_count(2), 1);
        tally(bench.run_selected());
        // After rounds 2 and 4, and once more at the end
        assert_eq!(sent_count(0), 4);
        assert_eq!(sent_count(3), 4);
        assert_eq!(sent_count(2), 1);
    }
}
