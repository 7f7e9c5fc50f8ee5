/// Fuel gauge / charger read failures. These are transient inside the charge
/// loops: the iteration is logged and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GaugeError {
    // Bus transaction failed
    Bus,
    // The gauge does not implement this measurement
    NotSupported,
    // No gauge answered
    NoDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyError {
    Bus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PresenterError {
    // Indicator or display not available on this board
    Unavailable,
    Bus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SuspendError {
    // A device refused to suspend
    Device,
}

/// A device the controller cannot run without is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeError {
    Pmic,
    FuelGauge,
    PowerKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameTableError {
    TooFewFrames,
    MissingSentinel,
    NotAscending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeError {
    // Setup failed, the loop never started
    Probe(ProbeError),
    // A reading needed before the loop could start failed
    Telemetry(GaugeError),
    FrameTable(FrameTableError),
}

impl From<ProbeError> for ChargeError {
    fn from(error: ProbeError) -> Self {
        ChargeError::Probe(error)
    }
}

impl From<GaugeError> for ChargeError {
    fn from(error: GaugeError) -> Self {
        ChargeError::Telemetry(error)
    }
}

impl From<FrameTableError> for ChargeError {
    fn from(error: FrameTableError) -> Self {
        ChargeError::FrameTable(error)
    }
}
