/// Margin added to the low-power and screen-on floors before comparing
/// against a live voltage reading.
pub const VOLTAGE_HYSTERESIS_MV: u32 = 50;

/// Fuel gauges are usually I2C devices; don't poll them more often than this.
pub const FUEL_GAUGE_POLL_MS: u64 = 1000;

/// Pacing delay between two iterations of the charge loop.
pub const LOOP_PACING_MS: u32 = 5;

/// Time to let the log output drain before cutting power.
pub const SHUTDOWN_DRAIN_MS: u32 = 5;

/// Interval between two diagnostic status lines.
pub const DIAGNOSTIC_INTERVAL_MS: u64 = 20_000;

/// Minimum time between two suspend attempts, and between a screen-off
/// transition and the next suspend attempt.
pub const SUSPEND_COOLDOWN_MS: u64 = 5000;

/// Wait after resume so that a key release that happened while suspended has
/// settled before the key is polled again.
pub const SUSPEND_SETTLE_MS: u32 = 300;

// Extreme low power guard timings
pub const GUARD_AUTO_WAKE_S: u32 = 5;
pub const GUARD_SCREEN_TIMEOUT_MS: u64 = 5000;
pub const GUARD_LOOP_DELAY_MS: u32 = 500;

pub const DEFAULT_AUTO_OFF_SCREEN_INTERVAL_S: u32 = 15;

/// Charging behaviour, loaded once per boot and read-only afterwards.
///
/// Every field is optional in the backing store; missing values fall back to
/// [`ChargeConfig::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargeConfig {
    /// Show the charge animation before booting.
    pub uboot_charge: bool,
    /// Tag the outgoing boot configuration so the OS starts in charger mode.
    pub android_charge: bool,
    /// State of charge (%) required to leave the animation on a long press.
    pub exit_charge_level: u8,
    /// Voltage (mV) required to leave the animation on a long press.
    pub exit_charge_voltage_mv: u32,
    /// Below this floor (plus hysteresis) the low power guard takes over.
    pub low_power_voltage_mv: u32,
    /// At or below this floor (plus hysteresis) the screen starts off and
    /// stays off until the voltage recovers.
    pub screen_on_voltage_mv: u32,
    pub system_suspend: bool,
    /// Auto wakeup period in seconds, 0 disables.
    pub auto_wakeup_interval_s: u32,
    /// Turn auto wakeup ticks into short presses (screen toggles).
    pub auto_wakeup_screen_invert: bool,
    /// Screen auto-off timeout in seconds, 0 disables. Ignored when auto
    /// wakeup is enabled.
    pub auto_off_screen_interval_s: u32,
    /// Refuse to charge when the boot mode is neither `Charging` nor
    /// `Undefined`. Deployed boards leave this off.
    pub reject_on_unknown_boot_mode: bool,
}

impl Default for ChargeConfig {
    fn default() -> Self {
        Self {
            uboot_charge: false,
            android_charge: false,
            exit_charge_level: 0,
            exit_charge_voltage_mv: 0,
            low_power_voltage_mv: 0,
            screen_on_voltage_mv: 0,
            system_suspend: false,
            auto_wakeup_interval_s: 0,
            auto_wakeup_screen_invert: false,
            auto_off_screen_interval_s: DEFAULT_AUTO_OFF_SCREEN_INTERVAL_S,
            reject_on_unknown_boot_mode: false,
        }
    }
}

impl ChargeConfig {
    /// Correct inconsistent values in place.
    ///
    /// The screen-on floor can never exceed the exit voltage, and the exit
    /// level is a percentage.
    pub fn normalized(mut self) -> Self {
        if self.screen_on_voltage_mv > self.exit_charge_voltage_mv {
            debug!(
                "screen on voltage {} mV clamped to exit voltage {} mV",
                self.screen_on_voltage_mv,
                self.exit_charge_voltage_mv
            );
            self.screen_on_voltage_mv = self.exit_charge_voltage_mv;
        }
        if self.exit_charge_level > 100 {
            self.exit_charge_level = 100;
        }
        debug!(
            "mode: uboot={}, android={}; exit: soc={}%, voltage={}mV; lp_voltage={}mV, screen_on={}mV",
            self.uboot_charge,
            self.android_charge,
            self.exit_charge_level,
            self.exit_charge_voltage_mv,
            self.low_power_voltage_mv,
            self.screen_on_voltage_mv
        );
        self
    }

    // Stored voltages are not range checked, so the margin saturates
    pub(crate) fn low_power_floor_mv(&self) -> u32 {
        self.low_power_voltage_mv.saturating_add(VOLTAGE_HYSTERESIS_MV)
    }

    pub(crate) fn screen_on_floor_mv(&self) -> u32 {
        self.screen_on_voltage_mv.saturating_add(VOLTAGE_HYSTERESIS_MV)
    }

    /// The auto screen-off timer only runs when auto wakeup is disabled.
    pub(crate) fn auto_off_screen_ms(&self) -> Option<u64> {
        if self.auto_wakeup_interval_s == 0 && self.auto_off_screen_interval_s > 0 {
            Some(self.auto_off_screen_interval_s as u64 * 1000)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_on_voltage_is_clamped_to_exit_voltage() {
        let config = ChargeConfig {
            exit_charge_voltage_mv: 3600,
            screen_on_voltage_mv: 3700,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.screen_on_voltage_mv, 3600);
    }

    #[test]
    fn floors_add_hysteresis() {
        let config = ChargeConfig {
            low_power_voltage_mv: 3300,
            screen_on_voltage_mv: 3400,
            ..Default::default()
        };
        assert_eq!(config.low_power_floor_mv(), 3350);
        assert_eq!(config.screen_on_floor_mv(), 3450);
    }

    #[test]
    fn floors_saturate_on_huge_stored_voltages() {
        let config = ChargeConfig {
            low_power_voltage_mv: u32::MAX - 10,
            screen_on_voltage_mv: u32::MAX,
            exit_charge_voltage_mv: u32::MAX,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.low_power_floor_mv(), u32::MAX);
        assert_eq!(config.screen_on_floor_mv(), u32::MAX);
    }

    #[test]
    fn consistent_config_is_left_alone() {
        let config = ChargeConfig {
            exit_charge_voltage_mv: 3600,
            screen_on_voltage_mv: 3400,
            exit_charge_level: 5,
            ..Default::default()
        };
        assert_eq!(config.normalized(), config);
    }

    #[test]
    fn auto_off_screen_disabled_by_auto_wakeup() {
        let config = ChargeConfig {
            auto_wakeup_interval_s: 10,
            ..Default::default()
        };
        assert_eq!(config.auto_off_screen_ms(), None);
        assert_eq!(ChargeConfig::default().auto_off_screen_ms(), Some(15_000));
    }
}
