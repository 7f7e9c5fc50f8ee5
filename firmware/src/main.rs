#![no_std]
#![no_main]

extern crate alloc;

use config::{FLASH_SIZE, WATCHDOG_TIMEOUT_MS};
use embassy_rp::{flash::Async, watchdog::Watchdog};
use embassy_sync::{
    blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex},
    mutex::Mutex,
    once_lock::OnceLock,
};
use embedded_alloc::LlffHeap as Heap;

#[global_allocator]
static HEAP: Heap = Heap::empty();
const HEAP_SIZE: usize = 32768; // 32kB

use config_manager::init_config_manager;
use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_time::Duration;
use {defmt_rtt as _, panic_probe as _};

mod board;
mod config;
mod config_manager;
mod config_resources;
mod flash_layout;
mod led_patterns;
mod tasks;

use crate::board::ScratchBootEnvironment;
use crate::config_resources::{
    AssignedResources, FuelGaugeResources, HostOutputResources, PowerHoldResources,
    PowerKeyResources, RGBLEDResources, UserButtonResources,
};

pub type FlashType<'a> =
    embassy_rp::flash::Flash<'a, embassy_rp::peripherals::FLASH, Async, FLASH_SIZE>;
pub type MFlashType<'a> = Mutex<NoopRawMutex, FlashType<'a>>;
pub static OM_FLASH: OnceLock<MFlashType<'static>> = OnceLock::new();

pub static OM_WATCHDOG: OnceLock<Mutex<CriticalSectionRawMutex, Watchdog>> = OnceLock::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // Initialize the allocator BEFORE you use it
    {
        use core::mem::MaybeUninit;
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        unsafe { HEAP.init(&raw mut HEAP_MEM as usize, HEAP_SIZE) }
    }

    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    info!("Starting up...");

    let mut watchdog = Watchdog::new(p.WATCHDOG);
    // Read the boot handoff before anything can reset the scratch registers
    let boot = ScratchBootEnvironment::from_watchdog(&mut watchdog);
    watchdog.start(Duration::from_millis(WATCHDOG_TIMEOUT_MS));
    if OM_WATCHDOG.init(Mutex::new(watchdog)).is_err() {
        error!("Failed to initialize watchdog");
        return;
    }

    // Initialize the config manager
    let flash = embassy_rp::flash::Flash::<embassy_rp::peripherals::FLASH, Async, FLASH_SIZE>::new(
        p.FLASH, p.DMA_CH1,
    );
    let flash: MFlashType = Mutex::<NoopRawMutex, _>::new(flash);

    if OM_FLASH.init(flash).is_err() {
        error!("Failed to initialize flash");
        return;
    }

    info!("Initializing config manager...");

    // Defaults stay in effect if the stored configuration is unusable
    if let Err(e) = init_config_manager().await {
        error!("Config manager initialization failed: {:?}", e);
    }

    // Spawn the async tasks
    spawner
        .spawn(tasks::watchdog_feeder::watchdog_feeder_task())
        .unwrap();

    spawner
        .spawn(config_manager::config_manager_task())
        .unwrap();

    spawner
        .spawn(tasks::led_blinker::led_blinker_task(r.rgb_led))
        .unwrap();

    spawner
        .spawn(tasks::power_key::power_key_task(r.power_key))
        .unwrap();

    spawner
        .spawn(tasks::power_key::user_button_task(r.user_button))
        .unwrap();

    spawner
        .spawn(tasks::auto_wake::auto_wake_task())
        .unwrap();

    spawner
        .spawn(tasks::charge_task::charge_task(
            r.fuel_gauge,
            r.host_outputs,
            r.power_hold,
            boot,
        ))
        .unwrap();
}
