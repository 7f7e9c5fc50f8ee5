//! The charge animation controller.
//!
//! [`ChargeAnimation::show`] is the entry point: it runs the
//! [`LowPowerGuard`], decides whether charging applies to this boot and then
//! loops until a long press allows booting or the operator cancels. Pulling
//! the charger powers the board off.

use embassy_time::{Duration, Instant};
use embedded_hal_async::delay::DelayNs;

use crate::config::{
    ChargeConfig, DIAGNOSTIC_INTERVAL_MS, FUEL_GAUGE_POLL_MS, LOOP_PACING_MS, SHUTDOWN_DRAIN_MS,
};
use crate::error::{ChargeError, ProbeError};
use crate::frames::{FrameIndex, FrameTable};
use crate::guard::{GuardExit, LowPowerGuard};
use crate::hal::{
    BootEnvironment, BootMode, CancelSignal, Clock, Context, FuelGauge, KeyPress, Platform,
    PowerKey, PowerOff, Presenter, RtcAlarm, SuspendBackend,
};
use crate::indicator::IndicatorMemo;
use crate::suspend::SuspendScheduler;
use crate::telemetry::{self, Reading, Telemetry};

/// Preboot directives containing this are compatible with charging.
const CHARGE_COMPATIBLE_PREBOOT: &str = "dvfs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExitReason {
    BootAllowed,
    Cancelled,
}

/// Why charging was not entered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SkipReason {
    BatteryAbsent,
    Preboot,
    BootMode,
    ChargerOffline,
    ChargeDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargeSummary {
    pub elapsed: Duration,
    pub soc: u8,
    pub voltage_mv: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargeOutcome {
    pub reason: ExitReason,
    /// `None` when the charge loop never ran.
    pub summary: Option<ChargeSummary>,
}

impl ChargeOutcome {
    fn skipped() -> Self {
        Self {
            reason: ExitReason::BootAllowed,
            summary: None,
        }
    }
}

/// Result of entry gating.
#[derive(Debug)]
pub enum Entry {
    Skip(SkipReason),
    Charge(SessionState),
}

/// Mutable state of one charge loop run.
#[derive(Debug)]
pub struct SessionState {
    pub screen_on: bool,
    /// Set when charging started at low voltage. Keeps the screen off
    /// whatever the keys say until the voltage recovers.
    pub ever_low_power_screen_off: bool,
    pub frame: FrameIndex,
    pub last_rendered: Option<FrameIndex>,
    pub frame_started: Instant,
    /// Start of the auto screen-off timeout, unset while the screen is off.
    pub screen_off_eligible_since: Option<Instant>,
    pub auto_wakeup_armed: bool,
    pub telemetry: Telemetry,
    last_refresh: Instant,
    refresh_pending: bool,
    last_diagnostic: Instant,
    charge_started: Instant,
    indicators: IndicatorMemo,
}

impl SessionState {
    fn new(now: Instant, voltage_mv: u32) -> Self {
        Self {
            screen_on: true,
            ever_low_power_screen_off: false,
            frame: FrameIndex::Reset,
            last_rendered: None,
            frame_started: now,
            screen_off_eligible_since: None,
            auto_wakeup_armed: false,
            telemetry: Telemetry {
                soc: 0,
                voltage_mv,
                current_ma: 0,
                charger_online: true,
            },
            last_refresh: now,
            refresh_pending: true,
            last_diagnostic: now,
            charge_started: now,
            indicators: IndicatorMemo::new(),
        }
    }
}

enum Flow {
    /// Start over without looking at the cancel signal.
    Retry,
    Continue,
    Exit(ExitReason),
}

pub struct ChargeAnimation<P: Platform> {
    config: ChargeConfig,
    frames: FrameTable,
    ctx: Context<P>,
    /// Shared by the guard and the charge loop so the cool-down carries
    /// over.
    suspend: SuspendScheduler,
}

impl<P: Platform> ChargeAnimation<P> {
    /// Check the mandatory devices and take ownership of the board.
    pub async fn probe(
        config: ChargeConfig,
        frames: FrameTable,
        mut ctx: Context<P>,
    ) -> Result<Self, ChargeError> {
        if !ctx.power_off.is_present() {
            error!("PMIC not found");
            return Err(ProbeError::Pmic.into());
        }
        if !ctx.key.is_present() {
            error!("Power key not found");
            return Err(ProbeError::PowerKey.into());
        }
        match ctx.gauge.state_of_charge().await {
            Ok(soc) if (0..=100).contains(&soc) => {}
            Ok(soc) => {
                error!("Fuel gauge reports soc {}", soc);
                return Err(ProbeError::FuelGauge.into());
            }
            Err(e) => {
                error!("Fuel gauge not found: {:?}", e);
                return Err(ProbeError::FuelGauge.into());
            }
        }

        let config = config.normalized();
        Ok(Self {
            config,
            frames,
            ctx,
            suspend: SuspendScheduler::new(config.system_suspend),
        })
    }

    pub fn config(&self) -> &ChargeConfig {
        &self.config
    }

    pub fn context(&self) -> &Context<P> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context<P> {
        &mut self.ctx
    }

    pub fn into_context(self) -> Context<P> {
        self.ctx
    }

    /// Guard, gating and charge loop.
    pub async fn show(&mut self) -> Result<ChargeOutcome, ChargeError> {
        if !telemetry::battery_exists(&mut self.ctx.gauge).await {
            info!("Exit charge: battery is not present");
            return Ok(ChargeOutcome::skipped());
        }

        let mut guard = LowPowerGuard::new(self.config, self.frames);
        if guard.run(&mut self.ctx, &mut self.suspend).await? == GuardExit::Cancelled {
            info!("Low power guard cancelled");
        }

        self.run().await
    }

    /// Entry gating followed by the charge loop.
    pub async fn run(&mut self) -> Result<ChargeOutcome, ChargeError> {
        let mut state = match self.enter().await? {
            Entry::Skip(_) => return Ok(ChargeOutcome::skipped()),
            Entry::Charge(state) => state,
        };

        let reason = loop {
            if let Some(reason) = self.tick(&mut state).await {
                break reason;
            }
        };

        Ok(self.finish(&mut state, reason))
    }

    /// Decide whether to charge and set up the session.
    pub async fn enter(&mut self) -> Result<Entry, ChargeError> {
        if self.config.android_charge {
            self.ctx.boot.tag_charger_mode();
            info!("Android charge mode");
        }

        if !telemetry::battery_exists(&mut self.ctx.gauge).await {
            return Ok(skip(SkipReason::BatteryAbsent));
        }

        if let Some(preboot) = self.ctx.boot.preboot() {
            if !preboot.contains(CHARGE_COMPATIBLE_PREBOOT) {
                info!("Preboot command '{}'", preboot);
                return Ok(skip(SkipReason::Preboot));
            }
        }

        let mode = self.ctx.boot.boot_mode();
        if !matches!(mode, BootMode::Charging | BootMode::Undefined) {
            if self.config.reject_on_unknown_boot_mode {
                info!("Boot mode {:?}", mode);
                return Ok(skip(SkipReason::BootMode));
            }
            debug!("Boot mode {:?} is not a charge mode, ignored", mode);
        }

        if !telemetry::charger_online(&mut self.ctx.gauge).await {
            return Ok(skip(SkipReason::ChargerOffline));
        }

        if !self.config.uboot_charge {
            return Ok(skip(SkipReason::ChargeDisabled));
        }

        let voltage_mv = self
            .ctx
            .gauge
            .voltage_mv()
            .await
            .inspect_err(|e| error!("Get voltage failed: {:?}", e))?;

        let mut state = SessionState::new(self.ctx.clock.now(), voltage_mv);

        if voltage_mv <= self.config.screen_on_floor_mv() {
            state.screen_on = false;
            state.ever_low_power_screen_off = true;
            self.ctx.presenter.render_blank().await;
            self.ctx.presenter.set_screen_power(false).await;
        }

        if self.config.auto_wakeup_interval_s > 0 {
            info!("Auto wakeup: {}s", self.config.auto_wakeup_interval_s);
            self.ctx
                .suspend
                .arm_auto_wake(self.config.auto_wakeup_interval_s);
            state.auto_wakeup_armed = true;
            // A wake left over from the guard is not a press
            self.ctx.wake.take();
        }

        info!("Enter charging mode");
        Ok(Entry::Charge(state))
    }

    /// One loop iteration including the pacing delay. Returns the exit reason
    /// once the loop is done.
    pub async fn tick(&mut self, state: &mut SessionState) -> Option<ExitReason> {
        let flow = self.iterate(state).await;
        self.ctx.delay.delay_ms(LOOP_PACING_MS).await;

        match flow {
            Flow::Exit(reason) => Some(reason),
            Flow::Retry => None,
            Flow::Continue => {
                if !self.ctx.cancel.cancel_requested() {
                    return None;
                }
                if state.telemetry.voltage_mv >= self.config.screen_on_voltage_mv {
                    self.ctx.presenter.render_logo().await;
                }
                info!("Exit charge: cancelled");
                Some(ExitReason::Cancelled)
            }
        }
    }

    /// Tear down the session and report the summary.
    pub fn finish(&mut self, state: &mut SessionState, reason: ExitReason) -> ChargeOutcome {
        if state.auto_wakeup_armed {
            self.ctx.suspend.disarm_auto_wake();
            state.auto_wakeup_armed = false;
        }

        let elapsed = Duration::from_millis(self.ctx.elapsed_ms(state.charge_started));
        let summary = ChargeSummary {
            elapsed,
            soc: state.telemetry.soc,
            voltage_mv: state.telemetry.voltage_mv,
        };
        info!(
            "Charging time total: {}ms, soc={}%, vol={}mV",
            elapsed.as_millis(),
            summary.soc,
            summary.voltage_mv
        );

        ChargeOutcome {
            reason,
            summary: Some(summary),
        }
    }

    async fn iterate(&mut self, state: &mut SessionState) -> Flow {
        if state.refresh_pending || self.ctx.elapsed_ms(state.last_refresh) >= FUEL_GAUGE_POLL_MS {
            state.last_refresh = self.ctx.clock.now();

            // The power key is interrupt driven; keep it out of the bus
            // transaction.
            self.ctx.suspend.disable_local_irq();
            let reading = telemetry::read(&mut self.ctx.gauge).await;
            self.ctx.suspend.enable_local_irq();

            match reading {
                Reading::Complete(telemetry) => {
                    state.telemetry = telemetry;
                    state.refresh_pending = false;
                }
                Reading::ChargerOffline => {
                    // Check the charger again right away; stale readings
                    // must not let a key press through.
                    state.refresh_pending = true;
                    self.shutdown(state).await;
                    return Flow::Retry;
                }
                Reading::Failed => return Flow::Retry,
            }
        }

        self.log_diagnostic(state);
        self.reconcile_screen(state).await;

        if let Err(e) = state
            .indicators
            .update(&mut self.ctx.presenter, state.telemetry.soc)
            .await
        {
            warn!("Update indicators failed: {:?}", e);
        }

        if state.frame == FrameIndex::Reset {
            state.frame = FrameIndex::Frame(self.frames.select(state.telemetry.soc));
            state.frame_started = self.ctx.clock.now();
        }

        if state.screen_on {
            if state.last_rendered != Some(state.frame) {
                if let Some(frame) = self.frames.frame(state.frame) {
                    debug!("Show {}", frame.name);
                    self.ctx.presenter.render_frame(state.frame, frame).await;
                    self.ctx.presenter.render_status(&state.telemetry).await;
                }
                state.last_rendered = Some(state.frame);
            }
            if state.screen_off_eligible_since.is_none() {
                state.screen_off_eligible_since = Some(self.ctx.clock.now());
            }
        } else {
            state.screen_off_eligible_since = None;
            self.suspend
                .maybe_suspend(&mut self.ctx.suspend, &self.ctx.clock, &mut self.ctx.delay)
                .await;
        }

        if self.ctx.elapsed_ms(state.frame_started) > self.frames.period_ms(state.frame) {
            state.frame_started = self.ctx.clock.now();
            state.frame = self.frames.next(state.frame);
        }

        match self.read_key(state) {
            KeyPress::None => Flow::Continue,
            KeyPress::ShortPress => {
                self.short_press(state).await;
                Flow::Continue
            }
            KeyPress::LongPress => self.long_press(state).await,
        }
    }

    async fn shutdown(&mut self, state: &mut SessionState) {
        info!("Not charging, shutdown");
        self.ctx.delay.delay_ms(SHUTDOWN_DRAIN_MS).await;
        self.ctx.presenter.set_screen_power(false).await;
        state.screen_on = false;
        state.last_rendered = None;
        self.ctx.power_off.shutdown().await;
        error!("Shutdown failed, retrying");
    }

    fn log_diagnostic(&mut self, state: &mut SessionState) {
        if self.ctx.elapsed_ms(state.last_diagnostic) <= DIAGNOSTIC_INTERVAL_MS {
            return;
        }
        let now = self.ctx.clock.now();
        state.last_diagnostic = now;
        let t = &state.telemetry;
        info!(
            "[{}s]: soc={}%, vol={}mV, c={}mA, online={}, screen_on={}",
            now.as_secs(),
            t.soc,
            t.voltage_mv,
            t.current_ma,
            t.charger_online,
            state.screen_on
        );
    }

    /// Keep the screen off while latched, and release the latch once the
    /// voltage is above the screen-on floor.
    async fn reconcile_screen(&mut self, state: &mut SessionState) {
        if !state.ever_low_power_screen_off {
            return;
        }
        state.screen_on = false;

        if state.telemetry.voltage_mv > self.config.screen_on_voltage_mv {
            info!("Voltage recovered, screen on");
            state.ever_low_power_screen_off = false;
            state.screen_on = true;
            state.frame = FrameIndex::Reset;
            state.last_rendered = None;
            self.ctx.presenter.set_screen_power(true).await;
        }
    }

    fn read_key(&mut self, state: &SessionState) -> KeyPress {
        if self.ctx.alarm.alarm_fired() {
            info!("RTC alarm fired");
            return KeyPress::LongPress;
        }

        let mut key = match self.ctx.key.poll() {
            Ok(key) => key,
            Err(e) => {
                warn!("Read power key failed: {:?}", e);
                KeyPress::None
            }
        };
        match key {
            KeyPress::ShortPress => info!("Power key pressed"),
            KeyPress::LongPress => info!("Power key long pressed"),
            KeyPress::None => {}
        }

        if self.config.auto_wakeup_interval_s > 0 {
            if self.config.auto_wakeup_screen_invert && self.ctx.wake.take() {
                key = KeyPress::ShortPress;
            }
        } else if let Some(timeout_ms) = self.config.auto_off_screen_ms() {
            let expired = state
                .screen_off_eligible_since
                .is_some_and(|since| self.ctx.elapsed_ms(since) > timeout_ms);
            if expired {
                info!("Auto screen off");
                key = KeyPress::ShortPress;
            }
        }

        key
    }

    async fn short_press(&mut self, state: &mut SessionState) {
        state.frame = FrameIndex::Reset;
        state.last_rendered = None;

        if state.screen_on {
            self.ctx.presenter.render_blank().await;
            self.ctx.presenter.set_screen_power(false).await;
            state.screen_on = false;
            // Hold off suspend so a press that turns into a long press is
            // still seen
            self.suspend.start_cooldown(self.ctx.clock.now());
        } else if state.ever_low_power_screen_off {
            info!("Low voltage, screen stays off");
            return;
        } else {
            self.ctx.presenter.set_screen_power(true).await;
            state.screen_on = true;
        }

        info!("Screen {}", if state.screen_on { "on" } else { "off" });
    }

    async fn long_press(&mut self, state: &mut SessionState) -> Flow {
        if !state.screen_on && !state.ever_low_power_screen_off {
            self.ctx.presenter.set_screen_power(true).await;
            state.screen_on = true;
        }

        let Telemetry {
            soc, voltage_mv, ..
        } = state.telemetry;

        if soc < self.config.exit_charge_level || voltage_mv < self.config.exit_charge_voltage_mv {
            info!(
                "soc={}% (exit {}%), voltage={}mV (exit {}mV): low power, unable to boot",
                soc,
                self.config.exit_charge_level,
                voltage_mv,
                self.config.exit_charge_voltage_mv
            );
            state.frame = FrameIndex::LowPower;
            state.frame_started = self.ctx.clock.now();
            return Flow::Retry;
        }

        info!("Exit charge animation");
        if !state.screen_on {
            self.ctx.presenter.set_screen_power(true).await;
            state.screen_on = true;
        }
        self.ctx.presenter.render_logo().await;
        Flow::Exit(ExitReason::BootAllowed)
    }
}

fn skip(reason: SkipReason) -> Entry {
    info!("Exit charge: {:?}", reason);
    Entry::Skip(reason)
}
