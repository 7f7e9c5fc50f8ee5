use charge_core::hal::KeyPress;
use defmt::{debug, info};
use embassy_executor::task;
use embassy_futures::select::{Either, select};
use embassy_rp::gpio::{Input, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel;
use embassy_time::{Duration, Instant, Timer};
use portable_atomic::{AtomicBool, Ordering};

use crate::config::{POWER_KEY_DEBOUNCE_MS, POWER_KEY_LONG_PRESS_MS};
use crate::config_resources::{PowerKeyResources, UserButtonResources};
use crate::tasks::auto_wake::WAKE_EVENT;

pub type PowerKeyChannelType = channel::Channel<CriticalSectionRawMutex, KeyPress, 4>;
pub static POWER_KEY_EVENT_CHANNEL: PowerKeyChannelType = channel::Channel::new();

/// Set once the user button has been pressed; never cleared.
pub static USER_CANCEL: AtomicBool = AtomicBool::new(false);

#[task]
pub async fn power_key_task(r: PowerKeyResources) {
    info!("Starting power key task");

    let mut key = Input::new(r.pin, Pull::Up);

    info!("Power key task initialized");

    loop {
        // Active low
        key.wait_for_falling_edge().await;
        let pressed_at = Instant::now();
        WAKE_EVENT.signal(());

        let long_press = Timer::after(Duration::from_millis(POWER_KEY_LONG_PRESS_MS));
        let released = select(key.wait_for_rising_edge(), long_press).await;
        match released {
            Either::First(()) => {
                let held_ms = pressed_at.elapsed().as_millis();
                if held_ms < POWER_KEY_DEBOUNCE_MS {
                    debug!("Power key bounce ignored ({} ms)", held_ms);
                    continue;
                }
                debug!("Power key short press ({} ms)", held_ms);
                report(KeyPress::ShortPress);
            }
            Either::Second(()) => {
                // Reported while still held so that boot can start right away
                debug!("Power key long press");
                report(KeyPress::LongPress);
                key.wait_for_high().await;
            }
        }
    }
}

fn report(press: KeyPress) {
    if POWER_KEY_EVENT_CHANNEL.try_send(press).is_err() {
        debug!("Power key queue full, dropping {:?}", press);
    }
    WAKE_EVENT.signal(());
}

#[task]
pub async fn user_button_task(r: UserButtonResources) {
    info!("Starting user button task");

    let mut button = Input::new(r.pin, Pull::Up);

    info!("User button task initialized");

    loop {
        button.wait_for_falling_edge().await;
        Timer::after(Duration::from_millis(POWER_KEY_DEBOUNCE_MS)).await;
        if button.is_low() {
            info!("User button pressed, cancelling charge animation");
            USER_CANCEL.store(true, Ordering::Release);
            WAKE_EVENT.signal(());
        }
        button.wait_for_high().await;
    }
}
