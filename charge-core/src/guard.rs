//! Forced charging below the hard voltage floor.
//!
//! Runs before any UI decision. While the battery is below
//! `low_power_voltage_mv` (plus hysteresis) the board either charges with the
//! screen mostly off or, without a charger, powers off. It never decides
//! whether the charge animation is shown.

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;

use crate::config::{
    ChargeConfig, GUARD_AUTO_WAKE_S, GUARD_LOOP_DELAY_MS, GUARD_SCREEN_TIMEOUT_MS,
    SHUTDOWN_DRAIN_MS,
};
use crate::error::ChargeError;
use crate::frames::{FrameIndex, FrameTable};
use crate::hal::{CancelSignal, Clock, Context, FuelGauge, Platform, PowerOff, Presenter, SuspendBackend};
use crate::indicator::IndicatorMemo;
use crate::suspend::SuspendScheduler;
use crate::telemetry;

const WARNING_LINES: [&str; 2] = [
    "Extreme Low Battery, please wait until changed to 5%",
    " LCD will be off soon.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GuardExit {
    /// Voltage is back above the floor.
    Proceed,
    /// The operator interrupted the guard.
    Cancelled,
}

struct LowPowerGuardState {
    screen_on: bool,
    display_started: Option<Instant>,
    auto_wake_armed: bool,
    indicators: IndicatorMemo,
}

impl LowPowerGuardState {
    fn new() -> Self {
        Self {
            // The display is already on when the guard starts
            screen_on: true,
            display_started: None,
            auto_wake_armed: false,
            indicators: IndicatorMemo::new(),
        }
    }
}

pub struct LowPowerGuard {
    config: ChargeConfig,
    frames: FrameTable,
}

impl LowPowerGuard {
    pub fn new(config: ChargeConfig, frames: FrameTable) -> Self {
        Self { config, frames }
    }

    /// Block until the voltage recovers or the operator cancels.
    ///
    /// Only the initial voltage read is fatal. Without a charger the guard
    /// asks for power off and keeps asking if that returns.
    pub async fn run<P: Platform>(
        &mut self,
        ctx: &mut Context<P>,
        suspend: &mut SuspendScheduler,
    ) -> Result<GuardExit, ChargeError> {
        let mut voltage_mv = ctx
            .gauge
            .voltage_mv()
            .await
            .inspect_err(|e| error!("Get voltage failed: {:?}", e))?;

        let floor_mv = self.config.low_power_floor_mv();
        let mut state = LowPowerGuardState::new();
        let mut exit = GuardExit::Proceed;

        while voltage_mv < floor_mv {
            if !telemetry::charger_online(&mut ctx.gauge).await {
                info!("Extreme low power: not charging, shutdown");
                ctx.delay.delay_ms(SHUTDOWN_DRAIN_MS).await;
                ctx.power_off.shutdown().await;
                error!("Shutdown failed, retrying");
                continue;
            }

            if !state.auto_wake_armed {
                ctx.suspend.arm_auto_wake(GUARD_AUTO_WAKE_S);
                state.auto_wake_armed = true;
            }

            let Some(soc) = telemetry::read_soc(&mut ctx.gauge).await else {
                continue;
            };

            if let Err(e) = state.indicators.update(&mut ctx.presenter, soc).await {
                warn!("Update indicators failed: {:?}", e);
            }

            self.update_display(ctx, &mut state).await;

            info!(
                "Extreme low power, force charging... threshold={}mV, now={}mV",
                self.config.low_power_voltage_mv,
                voltage_mv
            );

            suspend
                .maybe_suspend(&mut ctx.suspend, &ctx.clock, &mut ctx.delay)
                .await;

            voltage_mv = match ctx.gauge.voltage_mv().await {
                Ok(voltage) => voltage,
                Err(e) => {
                    warn!("Get voltage failed: {:?}", e);
                    continue;
                }
            };

            if ctx.cancel.cancel_requested() {
                info!("Extreme low power: cancelled");
                exit = GuardExit::Cancelled;
                break;
            }

            ctx.delay.delay_ms(GUARD_LOOP_DELAY_MS).await;
        }

        if !state.screen_on {
            ctx.presenter.set_screen_power(true).await;
        }
        if state.auto_wake_armed {
            ctx.suspend.disarm_auto_wake();
        }

        Ok(exit)
    }

    /// Show the warning once, then blank the screen for good after a timeout.
    async fn update_display<P: Platform>(
        &self,
        ctx: &mut Context<P>,
        state: &mut LowPowerGuardState,
    ) {
        let Some(started) = state.display_started else {
            state.display_started = Some(ctx.clock.now());
            if let Some(frame) = self.frames.frame(FrameIndex::LowPower) {
                ctx.presenter.render_frame(FrameIndex::LowPower, frame).await;
            }
            for (line, text) in (0u8..).zip(WARNING_LINES) {
                ctx.presenter.render_message(line, text).await;
            }
            return;
        };

        if state.screen_on && ctx.elapsed_ms(started) > GUARD_SCREEN_TIMEOUT_MS {
            ctx.presenter.set_screen_power(false).await;
            state.screen_on = false;
        }
    }
}
