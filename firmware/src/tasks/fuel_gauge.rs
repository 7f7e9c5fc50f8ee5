//! BQ27xxx fuel gauge on the controller's primary I2C bus.
//!
//! The gauge answers standard commands with little-endian 16-bit words.
//! Charger presence comes from the charger IC's status line rather than the
//! gauge, which only infers it from the current direction.

use charge_core::error::GaugeError;
use charge_core::hal::FuelGauge;
use defmt::{error, info, trace};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::i2c::{self, AbortReason, I2c, InterruptHandler};
use embassy_rp::peripherals::I2C0;

use crate::config::FUEL_GAUGE_I2C_ADDR;
use crate::config_resources::FuelGaugeResources;

bind_interrupts!(struct Irqs {
    I2C0_IRQ => InterruptHandler<I2C0>;
});

/// Standard commands (registers)
mod commands {
    pub const VOLTAGE: u8 = 0x04;
    pub const FLAGS: u8 = 0x06;
    pub const AVERAGE_CURRENT: u8 = 0x10;
    pub const STATE_OF_CHARGE: u8 = 0x1C;
}

/// Bits of the FLAGS register
mod flags {
    pub const BAT_DET: u16 = 1 << 3;
    pub const CHG: u16 = 1 << 8;
    pub const FC: u16 = 1 << 9;
}

pub struct Bq27xxx {
    bus: I2c<'static, I2C0, i2c::Async>,
    address: u8,
    charger_present: Input<'static>,
}

impl Bq27xxx {
    pub fn new(r: FuelGaugeResources) -> Self {
        let config = i2c::Config::default();
        let bus = I2c::new_async(r.i2c, r.scl, r.sda, Irqs, config);
        info!("Fuel gauge bus initialized");

        Self {
            bus,
            address: FUEL_GAUGE_I2C_ADDR,
            // Active low, open drain on the charger side
            charger_present: Input::new(r.charger_present, Pull::Up),
        }
    }

    async fn read_word(&mut self, command: u8) -> Result<u16, GaugeError> {
        let mut response = [0u8; 2];
        self.bus
            .write_read_async(self.address, [command], &mut response)
            .await
            .map_err(|e| {
                error!("Fuel gauge read of {:#x} failed: {:?}", command, e);
                match e {
                    i2c::Error::Abort(AbortReason::NoAcknowledge) => GaugeError::NoDevice,
                    _ => GaugeError::Bus,
                }
            })?;
        Ok(u16::from_le_bytes(response))
    }

    async fn flags(&mut self) -> Result<u16, GaugeError> {
        let raw = self.read_word(commands::FLAGS).await?;
        trace!(
            "Gauge flags {:#x}: charging {} full {}",
            raw,
            raw & flags::CHG != 0,
            raw & flags::FC != 0
        );
        Ok(raw)
    }
}

impl FuelGauge for Bq27xxx {
    async fn voltage_mv(&mut self) -> Result<u32, GaugeError> {
        self.read_word(commands::VOLTAGE).await.map(u32::from)
    }

    async fn current_ma(&mut self) -> Result<i32, GaugeError> {
        // Signed, positive while charging
        self.read_word(commands::AVERAGE_CURRENT)
            .await
            .map(|raw| raw as i16 as i32)
    }

    async fn state_of_charge(&mut self) -> Result<i32, GaugeError> {
        self.read_word(commands::STATE_OF_CHARGE)
            .await
            .map(i32::from)
    }

    async fn charger_online(&mut self) -> Result<bool, GaugeError> {
        Ok(self.charger_present.is_low())
    }

    async fn battery_exists(&mut self) -> Result<bool, GaugeError> {
        Ok(self.flags().await? & flags::BAT_DET != 0)
    }
}
