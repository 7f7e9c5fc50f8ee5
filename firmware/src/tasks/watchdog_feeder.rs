use defmt::trace;
use embassy_time::{Duration, Timer};

use crate::OM_WATCHDOG;
use crate::config::WATCHDOG_FEED_INTERVAL_MS;

#[embassy_executor::task]
pub async fn watchdog_feeder_task() {
    // This task feeds the watchdog to prevent system reset

    loop {
        Timer::after(Duration::from_millis(WATCHDOG_FEED_INTERVAL_MS)).await;
        OM_WATCHDOG.get().await.lock().await.feed();
        trace!("Watchdog fed");
    }
}
