//! Diagnostic dumps

use super::Tally;
use crate::device::Canola;
use crate::message::CanFrame;
use canola_core::RegisterAccess;

/// Logs STATUS and every statistics counter of `device`
pub(super) fn counters<R: RegisterAccess>(device: &Canola<R>) {
    let status = device.status();
    log::info!("Device {}:", device.index());
    log::info!(
        "STATUS: {:#010x} ({:?})",
        u32::from(status),
        status.error_state()
    );
    for (name, value) in device.counters().iter() {
        log::info!("{name}: {value}");
    }
}

/// Logs the configuration side of `device`
pub(super) fn control_registers<R: RegisterAccess>(device: &Canola<R>) {
    let regs = device.control_registers();
    log::info!("Device {}:", device.index());
    log::info!("CONTROL: {:#010x}", u32::from(regs.control));
    log::info!("CONFIG: {:#010x}", u32::from(regs.config));
    log::info!("STATUS: {:#010x}", u32::from(regs.status));
    log::info!("BTL_PROP_SEG: {:#010x}", regs.btl_prop_seg);
    log::info!("BTL_PHASE_SEG1: {:#010x}", regs.btl_phase_seg1);
    log::info!("BTL_PHASE_SEG2: {:#010x}", regs.btl_phase_seg2);
    log::info!("BTL_SYNC_JUMP_WIDTH: {:#010x}", regs.btl_sync_jump_width);
    log::info!(
        "BTL_TIME_QUANTA_CLOCK_SCALE: {:#010x}",
        regs.btl_time_quanta_clock_scale
    );
}

pub(super) fn mismatch(sender: usize, sent: &CanFrame, receiver: usize, received: &CanFrame) {
    log::error!("Msg received by CAN #{receiver} did not match msg sent by CAN #{sender}");
    log::error!("Msg sent by CAN #{sender}: {sent}");
    log::error!("Msg received by CAN #{receiver}: {received}");
}

pub(super) fn tally(tally: &Tally) {
    log::info!("rounds: {}", tally.rounds);
    log::info!("tx_done_count: {}", tally.tx_done);
    log::info!("tx_not_done_count: {}", tally.tx_not_done);
    log::info!("busy_timeout_count: {}", tally.busy_timeouts);
    log::info!("rx_msg_count: {}", tally.rx_msg);
    log::info!("rx_msg_ok_count: {}", tally.rx_msg_ok);
    log::info!("rx_msg_not_ok_count: {}", tally.rx_msg_not_ok);
    log::info!("rx_missing_count: {}", tally.rx_missing);
    log::info!("success_count: {}", tally.success);
    log::info!("fail_count: {}", tally.fail);
}
