use charge_core::WakeFlag;
use defmt::{debug, info};
use embassy_executor::task;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};

/// Pending auto-wake tick, consumed by the charge loop.
pub static WAKE_FLAG: WakeFlag = WakeFlag::new();

/// Anything that would end a wfi: key edges, the user button, auto-wake
/// ticks.
pub static WAKE_EVENT: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Arm (`Some(seconds)`) or disarm (`None`) the periodic wakeup.
pub static AUTO_WAKE_CONTROL: Signal<CriticalSectionRawMutex, Option<u32>> = Signal::new();

#[task]
pub async fn auto_wake_task() {
    info!("Auto wake task started");

    let mut interval_s = None;

    loop {
        let Some(seconds) = interval_s else {
            interval_s = AUTO_WAKE_CONTROL.wait().await;
            continue;
        };

        debug!("Auto wake armed every {} s", seconds);
        let mut ticker = Ticker::every(Duration::from_secs(seconds as u64));

        interval_s = loop {
            match select(ticker.next(), AUTO_WAKE_CONTROL.wait()).await {
                Either::First(()) => {
                    WAKE_FLAG.raise();
                    WAKE_EVENT.signal(());
                }
                Either::Second(update) => break update,
            }
        };
        debug!("Auto wake reconfigured: {:?}", interval_s);
    }
}
