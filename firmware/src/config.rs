use charge_core::config::DEFAULT_AUTO_OFF_SCREEN_INTERVAL_S;

pub const FLASH_SIZE: usize = 4 * 1024 * 1024;

pub const FUEL_GAUGE_I2C_ADDR: u8 = 0x55; // BQ27xxx default address

// Power key gesture timings
pub const POWER_KEY_DEBOUNCE_MS: u64 = 50;
pub const POWER_KEY_LONG_PRESS_MS: u64 = 2000;

// Idle wakeup while waiting for an interrupt. Mirrors the system tick that
// would end a real wfi.
pub const IDLE_WAKE_MS: u64 = 1000;

// Time to let the supply collapse after releasing the power hold line before
// the caller retries.
pub const POWER_OFF_SETTLE_MS: u64 = 100;

pub const WATCHDOG_TIMEOUT_MS: u64 = 8000;
pub const WATCHDOG_FEED_INTERVAL_MS: u64 = 1000;

// Watchdog scratch registers shared with the host bootloader
pub const BOOT_MODE_SCRATCH: usize = 0;
pub const PREBOOT_SCRATCH: usize = 1;
pub const CHARGER_MODE_SCRATCH: usize = 2;
pub const CHARGER_MODE_MAGIC: u32 = 0x4348_5247; // "CHRG"

// Charge configuration. Defaults for a deployed board; the library defaults
// leave charging off.
pub const UBOOT_CHARGE_CONFIG_KEY: u16 = 0x2001;
pub const DEFAULT_UBOOT_CHARGE: bool = true;

pub const ANDROID_CHARGE_CONFIG_KEY: u16 = 0x2002;
pub const DEFAULT_ANDROID_CHARGE: bool = false;

pub const EXIT_CHARGE_LEVEL_CONFIG_KEY: u16 = 0x2003;
pub const DEFAULT_EXIT_CHARGE_LEVEL: u8 = 5; // %

pub const EXIT_CHARGE_VOLTAGE_CONFIG_KEY: u16 = 0x2004;
pub const DEFAULT_EXIT_CHARGE_VOLTAGE_MV: u32 = 3600; // mV

pub const LOW_POWER_VOLTAGE_CONFIG_KEY: u16 = 0x2005;
pub const DEFAULT_LOW_POWER_VOLTAGE_MV: u32 = 3300; // mV

pub const SCREEN_ON_VOLTAGE_CONFIG_KEY: u16 = 0x2006;
pub const DEFAULT_SCREEN_ON_VOLTAGE_MV: u32 = 3400; // mV

pub const SYSTEM_SUSPEND_CONFIG_KEY: u16 = 0x2007;
pub const DEFAULT_SYSTEM_SUSPEND: bool = false;

pub const AUTO_WAKEUP_INTERVAL_CONFIG_KEY: u16 = 0x2008;
pub const DEFAULT_AUTO_WAKEUP_INTERVAL_S: u32 = 0;

pub const AUTO_WAKEUP_SCREEN_INVERT_CONFIG_KEY: u16 = 0x2009;
pub const DEFAULT_AUTO_WAKEUP_SCREEN_INVERT: bool = false;

pub const AUTO_OFF_SCREEN_INTERVAL_CONFIG_KEY: u16 = 0x200a;
pub const DEFAULT_AUTO_OFF_SCREEN_INTERVAL: u32 = DEFAULT_AUTO_OFF_SCREEN_INTERVAL_S;

pub const REJECT_UNKNOWN_BOOT_MODE_CONFIG_KEY: u16 = 0x200b;
pub const DEFAULT_REJECT_UNKNOWN_BOOT_MODE: bool = false;

pub const LED_BRIGHTNESS_CONFIG_KEY: u16 = 0x1001;
pub const DEFAULT_LED_BRIGHTNESS: u8 = 0x30; // Default brightness value

pub const MAX_CONFIG_WRITE_QUEUE_DEPTH: usize = 16; // One slot per stored field
