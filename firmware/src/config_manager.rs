use charge_core::ChargeConfig;
use defmt::{debug, info, warn};
use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::once_lock::OnceLock;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{SerializationError, Value, fetch_item, store_item};
use serde::{Deserialize, Serialize};

use crate::flash_layout::get_config_range;
use crate::{FlashType, OM_FLASH, config::*};

#[derive(Debug, defmt::Format)]
pub enum ConfigError {
    // Flash operation errors
    Flash(embassy_rp::flash::Error),
    // Other storage errors
    Storage,
}

impl From<embassy_rp::flash::Error> for ConfigError {
    fn from(error: embassy_rp::flash::Error) -> Self {
        ConfigError::Flash(error)
    }
}

impl From<sequential_storage::Error<embassy_rp::flash::Error>> for ConfigError {
    fn from(error: sequential_storage::Error<embassy_rp::flash::Error>) -> Self {
        match error {
            sequential_storage::Error::Storage { value, .. } => ConfigError::Flash(value),
            _ => ConfigError::Storage,
        }
    }
}

impl From<SerializationError> for ConfigError {
    fn from(_: SerializationError) -> Self {
        ConfigError::Storage
    }
}

/// Writes queued for the config manager task. Values are grouped by their
/// stored width; the key says which field they belong to.
#[derive(Debug, defmt::Format)]
pub enum ConfigManagerEvents {
    StoreBool(u16, bool),
    StoreU8(u16, u8),
    StoreU32(u16, u32),
}

pub type ConfigManagerChannelType = channel::Channel<
    CriticalSectionRawMutex,
    ConfigManagerEvents,
    MAX_CONFIG_WRITE_QUEUE_DEPTH,
>;
pub static CONFIG_MANAGER_EVENT_CHANNEL: ConfigManagerChannelType = channel::Channel::new();

// Configuration manager using sequential-storage
pub struct ConfigManager {
    data_buffer: [u8; 128],
}

impl ConfigManager {
    fn new() -> Self {
        Self {
            data_buffer: [0u8; 128],
        }
    }

    /// Store a serializable value
    pub async fn set<T>(&mut self, key: u16, value: &T) -> Result<(), ConfigError>
    where
        T: for<'de> Deserialize<'de> + Serialize + for<'b> Value<'b>,
    {
        debug!("Storing item with key: {:#x}", key);

        let mut flash = OM_FLASH.get().await.lock().await;

        store_item(
            &mut *flash,
            get_config_range(),
            &mut NoCache::new(),
            &mut self.data_buffer,
            &key,
            value,
        )
        .await
        .map_err(ConfigError::from)
    }

    // Retrieve a deserialized value or None if not found
    pub async fn get<T>(&mut self, key: u16) -> Result<Option<T>, ConfigError>
    where
        T: for<'de> Deserialize<'de> + Serialize + for<'b> Value<'b>,
    {
        debug!("Fetching item with key: {:#x}", key);

        let mut flash = OM_FLASH.get().await.lock().await;

        fetch_item(
            &mut *flash,
            get_config_range(),
            &mut NoCache::new(),
            &mut self.data_buffer,
            &key,
        )
        .await
        .map_err(ConfigError::from)
    }

    /// Fetch a field, falling back to `default` when it is missing or
    /// unreadable. Missing fields are queued for storage so that the map
    /// always lists every field after the first boot.
    async fn get_or_store_default<T>(
        &mut self,
        key: u16,
        default: T,
        store: fn(u16, T) -> ConfigManagerEvents,
    ) -> T
    where
        T: for<'de> Deserialize<'de> + Serialize + for<'b> Value<'b> + Copy,
    {
        match self.get::<T>(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                if CONFIG_MANAGER_EVENT_CHANNEL
                    .try_send(store(key, default))
                    .is_err()
                {
                    warn!("Config write queue full, not storing default for {:#x}", key);
                }
                default
            }
            Err(e) => {
                warn!("Failed to read config key {:#x}: {:?}", key, e);
                default
            }
        }
    }

    async fn load_charge_config(&mut self) -> ChargeConfig {
        ChargeConfig {
            uboot_charge: self
                .get_or_store_default(
                    UBOOT_CHARGE_CONFIG_KEY,
                    DEFAULT_UBOOT_CHARGE,
                    ConfigManagerEvents::StoreBool,
                )
                .await,
            android_charge: self
                .get_or_store_default(
                    ANDROID_CHARGE_CONFIG_KEY,
                    DEFAULT_ANDROID_CHARGE,
                    ConfigManagerEvents::StoreBool,
                )
                .await,
            exit_charge_level: self
                .get_or_store_default(
                    EXIT_CHARGE_LEVEL_CONFIG_KEY,
                    DEFAULT_EXIT_CHARGE_LEVEL,
                    ConfigManagerEvents::StoreU8,
                )
                .await,
            exit_charge_voltage_mv: self
                .get_or_store_default(
                    EXIT_CHARGE_VOLTAGE_CONFIG_KEY,
                    DEFAULT_EXIT_CHARGE_VOLTAGE_MV,
                    ConfigManagerEvents::StoreU32,
                )
                .await,
            low_power_voltage_mv: self
                .get_or_store_default(
                    LOW_POWER_VOLTAGE_CONFIG_KEY,
                    DEFAULT_LOW_POWER_VOLTAGE_MV,
                    ConfigManagerEvents::StoreU32,
                )
                .await,
            screen_on_voltage_mv: self
                .get_or_store_default(
                    SCREEN_ON_VOLTAGE_CONFIG_KEY,
                    DEFAULT_SCREEN_ON_VOLTAGE_MV,
                    ConfigManagerEvents::StoreU32,
                )
                .await,
            system_suspend: self
                .get_or_store_default(
                    SYSTEM_SUSPEND_CONFIG_KEY,
                    DEFAULT_SYSTEM_SUSPEND,
                    ConfigManagerEvents::StoreBool,
                )
                .await,
            auto_wakeup_interval_s: self
                .get_or_store_default(
                    AUTO_WAKEUP_INTERVAL_CONFIG_KEY,
                    DEFAULT_AUTO_WAKEUP_INTERVAL_S,
                    ConfigManagerEvents::StoreU32,
                )
                .await,
            auto_wakeup_screen_invert: self
                .get_or_store_default(
                    AUTO_WAKEUP_SCREEN_INVERT_CONFIG_KEY,
                    DEFAULT_AUTO_WAKEUP_SCREEN_INVERT,
                    ConfigManagerEvents::StoreBool,
                )
                .await,
            auto_off_screen_interval_s: self
                .get_or_store_default(
                    AUTO_OFF_SCREEN_INTERVAL_CONFIG_KEY,
                    DEFAULT_AUTO_OFF_SCREEN_INTERVAL,
                    ConfigManagerEvents::StoreU32,
                )
                .await,
            reject_on_unknown_boot_mode: self
                .get_or_store_default(
                    REJECT_UNKNOWN_BOOT_MODE_CONFIG_KEY,
                    DEFAULT_REJECT_UNKNOWN_BOOT_MODE,
                    ConfigManagerEvents::StoreBool,
                )
                .await,
        }
    }
}

pub static CONFIG_MANAGER: OnceLock<Mutex<CriticalSectionRawMutex, ConfigManager>> =
    OnceLock::new();

/// Runtime configuration values, read from the flash storage once at boot.
struct RuntimeConfig {
    pub charge: ChargeConfig,
    pub led_brightness: u8,
}

impl RuntimeConfig {
    const fn new(charge: ChargeConfig, led_brightness: u8) -> Self {
        RuntimeConfig {
            charge,
            led_brightness,
        }
    }
}

const DEFAULT_CHARGE_CONFIG: ChargeConfig = ChargeConfig {
    uboot_charge: DEFAULT_UBOOT_CHARGE,
    android_charge: DEFAULT_ANDROID_CHARGE,
    exit_charge_level: DEFAULT_EXIT_CHARGE_LEVEL,
    exit_charge_voltage_mv: DEFAULT_EXIT_CHARGE_VOLTAGE_MV,
    low_power_voltage_mv: DEFAULT_LOW_POWER_VOLTAGE_MV,
    screen_on_voltage_mv: DEFAULT_SCREEN_ON_VOLTAGE_MV,
    system_suspend: DEFAULT_SYSTEM_SUSPEND,
    auto_wakeup_interval_s: DEFAULT_AUTO_WAKEUP_INTERVAL_S,
    auto_wakeup_screen_invert: DEFAULT_AUTO_WAKEUP_SCREEN_INVERT,
    auto_off_screen_interval_s: DEFAULT_AUTO_OFF_SCREEN_INTERVAL,
    reject_on_unknown_boot_mode: DEFAULT_REJECT_UNKNOWN_BOOT_MODE,
};

static RUNTIME_CONFIG: Mutex<CriticalSectionRawMutex, RuntimeConfig> = Mutex::new(
    RuntimeConfig::new(DEFAULT_CHARGE_CONFIG, DEFAULT_LED_BRIGHTNESS),
);

pub async fn get_charge_config() -> ChargeConfig {
    let config = RUNTIME_CONFIG.lock().await;
    config.charge
}
pub async fn get_led_brightness() -> u8 {
    let config = RUNTIME_CONFIG.lock().await;
    config.led_brightness
}

pub async fn init_config_manager() -> Result<(), ConfigError> {
    let range = get_config_range();
    let erase_size = <FlashType<'static> as NorFlash>::ERASE_SIZE as u32;
    if range.start % erase_size != 0 || range.end % erase_size != 0 {
        return Err(ConfigError::Storage);
    }

    if CONFIG_MANAGER.init(Mutex::new(ConfigManager::new())).is_err() {
        return Err(ConfigError::Storage);
    }
    info!("Config manager initialized");

    let mut config_manager = CONFIG_MANAGER.get().await.lock().await;

    let charge = config_manager.load_charge_config().await;
    let led_brightness = config_manager
        .get_or_store_default(
            LED_BRIGHTNESS_CONFIG_KEY,
            DEFAULT_LED_BRIGHTNESS,
            ConfigManagerEvents::StoreU8,
        )
        .await;

    let mut runtime_config = RUNTIME_CONFIG.lock().await;
    *runtime_config = RuntimeConfig::new(charge, led_brightness);
    info!("Runtime configuration updated: {:?}", charge);
    Ok(())
}

#[task]
pub async fn config_manager_task() {
    info!("Config manager task started");

    let receiver = CONFIG_MANAGER_EVENT_CHANNEL.receiver();

    loop {
        let event = receiver.receive().await;
        debug!("Received config manager event: {:?}", event);

        let mut config_manager = CONFIG_MANAGER.get().await.lock().await;

        let result = match event {
            ConfigManagerEvents::StoreBool(key, value) => config_manager.set(key, &value).await,
            ConfigManagerEvents::StoreU8(key, value) => config_manager.set(key, &value).await,
            ConfigManagerEvents::StoreU32(key, value) => config_manager.set(key, &value).await,
        };
        if let Err(e) = result {
            warn!("Failed to store config item: {:?}", e);
        }
    }
}
