use charge_core::hal::{Context, NoAlarm};
use charge_core::{ChargeAnimation, ExitReason, FrameTable};
use defmt::{error, info};
use embassy_executor::task;
use embassy_time::Delay;

use crate::OM_WATCHDOG;
use crate::board::{
    Board, ButtonCancel, ChannelPowerKey, HostOutputs, LedPresenter, PmicPowerOff, RpSuspend,
    ScratchBootEnvironment, SystemClock,
};
use crate::config_manager::get_charge_config;
use crate::config_resources::{FuelGaugeResources, HostOutputResources, PowerHoldResources};
use crate::tasks::auto_wake::WAKE_FLAG;
use crate::tasks::fuel_gauge::Bq27xxx;

/// Runs the charge animation with the host held off, then powers the host
/// up once boot is allowed.
#[task]
pub async fn charge_task(
    gauge: FuelGaugeResources,
    outputs: HostOutputResources,
    hold: PowerHoldResources,
    boot: ScratchBootEnvironment,
) {
    info!("Starting charge task");

    let mut outputs = HostOutputs::new(outputs);
    let config = get_charge_config().await;
    let frames = FrameTable::default();

    let ctx = Context::<Board> {
        gauge: Bq27xxx::new(gauge),
        key: ChannelPowerKey,
        alarm: NoAlarm,
        presenter: LedPresenter::new(frames.level_count()),
        suspend: RpSuspend,
        power_off: PmicPowerOff::new(hold),
        cancel: ButtonCancel,
        boot,
        clock: SystemClock,
        delay: Delay,
        wake: &WAKE_FLAG,
    };

    match ChargeAnimation::probe(config, frames, ctx).await {
        Ok(mut animation) => {
            match animation.show().await {
                Ok(outcome) => {
                    info!("Charge animation done: {:?}", outcome);
                    if outcome.reason == ExitReason::Cancelled {
                        info!("Charge animation cancelled, booting anyway");
                    }
                }
                Err(e) => error!("Charge animation failed: {:?}", e),
            }

            let ctx = animation.into_context();
            ctx.boot.store(&mut *OM_WATCHDOG.get().await.lock().await);
        }
        // Without the charge devices there is nothing to wait for
        Err(e) => error!("Charge animation unavailable: {:?}", e),
    }

    info!("Powering up host");
    outputs.power_on();

    // The outputs stop driving the pins when dropped
    core::future::pending::<()>().await;
}
