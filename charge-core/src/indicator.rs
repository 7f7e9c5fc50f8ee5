use crate::error::PresenterError;
use crate::hal::{Indicator, IndicatorState, Presenter};

/// Drives the charging / full indicators from the state of charge, skipping
/// the update when the reading hasn't changed since the last call.
#[derive(Debug, Default)]
pub struct IndicatorMemo {
    last_soc: Option<u8>,
}

impl IndicatorMemo {
    pub const fn new() -> Self {
        Self { last_soc: None }
    }

    pub async fn update<P: Presenter>(
        &mut self,
        presenter: &mut P,
        soc: u8,
    ) -> Result<(), PresenterError> {
        if self.last_soc == Some(soc) {
            return Ok(());
        }

        let (charging, full) = if soc < 100 {
            (IndicatorState::On, IndicatorState::Off)
        } else {
            (IndicatorState::Off, IndicatorState::On)
        };
        presenter.set_indicator(Indicator::Charging, charging).await?;
        presenter.set_indicator(Indicator::Full, full).await?;
        // Only a fully applied update is remembered
        self.last_soc = Some(soc);
        Ok(())
    }
}
