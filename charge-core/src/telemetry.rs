//! Fuel gauge reads shared by the guard and the charge loop.

use crate::hal::FuelGauge;

/// The last complete set of readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    pub soc: u8,
    pub voltage_mv: u32,
    pub current_ma: i32,
    pub charger_online: bool,
}

pub(crate) enum Reading {
    Complete(Telemetry),
    ChargerOffline,
    // Logged already; retry on the next iteration
    Failed,
}

/// A failed read counts as offline.
pub(crate) async fn charger_online<G: FuelGauge>(gauge: &mut G) -> bool {
    match gauge.charger_online().await {
        Ok(online) => online,
        Err(e) => {
            warn!("Charger state read failed: {:?}", e);
            false
        }
    }
}

pub(crate) async fn battery_exists<G: FuelGauge>(gauge: &mut G) -> bool {
    match gauge.battery_exists().await {
        Ok(exists) => exists,
        Err(e) => {
            warn!("Battery presence read failed: {:?}", e);
            false
        }
    }
}

/// State of charge, or `None` when the read failed or is out of range.
pub(crate) async fn read_soc<G: FuelGauge>(gauge: &mut G) -> Option<u8> {
    match gauge.state_of_charge().await {
        Ok(soc) => match u8::try_from(soc) {
            Ok(soc) if soc <= 100 => Some(soc),
            _ => {
                warn!("Get soc failed: {}", soc);
                None
            }
        },
        Err(e) => {
            warn!("Get soc failed: {:?}", e);
            None
        }
    }
}

/// Charger state, state of charge, voltage and current in one pass. All of
/// them must succeed for the reading to count.
pub(crate) async fn read<G: FuelGauge>(gauge: &mut G) -> Reading {
    if !charger_online(gauge).await {
        return Reading::ChargerOffline;
    }

    let Some(soc) = read_soc(gauge).await else {
        return Reading::Failed;
    };

    let voltage_mv = match gauge.voltage_mv().await {
        Ok(voltage) => voltage,
        Err(e) => {
            warn!("Get voltage failed: {:?}", e);
            return Reading::Failed;
        }
    };

    let current_ma = match gauge.current_ma().await {
        Ok(current) => current,
        Err(e) => {
            warn!("Get current failed: {:?}", e);
            return Reading::Failed;
        }
    };

    trace!("soc={}%, vol={}mV, c={}mA", soc, voltage_mv, current_ma);

    Reading::Complete(Telemetry {
        soc,
        voltage_mv,
        current_ma,
        charger_online: true,
    })
}
