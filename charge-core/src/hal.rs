//! Capability contracts between the charge controller and the board.
//!
//! Everything hardware-facing goes through these traits. Boards that lack a
//! capability plug in one of the null objects at the bottom of this module
//! instead of compiling the feature out.
#![allow(async_fn_in_trait)]

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;

use crate::error::{GaugeError, KeyError, PresenterError, SuspendError};
use crate::frames::{AnimationFrame, FrameIndex};
use crate::telemetry::Telemetry;
use crate::wake::WakeFlag;

/// Battery telemetry. Each reading may fail independently.
pub trait FuelGauge {
    async fn voltage_mv(&mut self) -> Result<u32, GaugeError>;
    /// Positive while charging, negative while discharging.
    async fn current_ma(&mut self) -> Result<i32, GaugeError>;
    /// Raw state of charge. Values outside 0..=100 are passed through so the
    /// caller can treat them as transient.
    async fn state_of_charge(&mut self) -> Result<i32, GaugeError>;
    async fn charger_online(&mut self) -> Result<bool, GaugeError>;
    async fn battery_exists(&mut self) -> Result<bool, GaugeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyPress {
    None,
    ShortPress,
    LongPress,
}

pub trait PowerKey {
    /// A board without a power key cannot leave the charge animation.
    fn is_present(&self) -> bool {
        true
    }

    /// Return the gesture completed since the last poll, if any.
    fn poll(&mut self) -> Result<KeyPress, KeyError>;
}

pub trait RtcAlarm {
    fn alarm_fired(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Indicator {
    Charging,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorState {
    On,
    Off,
    Blink,
}

/// Display and indicator output.
pub trait Presenter {
    async fn render_frame(&mut self, index: FrameIndex, frame: &AnimationFrame);
    async fn render_blank(&mut self);
    async fn render_logo(&mut self);
    /// Print a line of text over the current image.
    async fn render_message(&mut self, line: u8, text: &str);
    /// Draw the latest readings over the frame that was just rendered.
    async fn render_status(&mut self, _telemetry: &Telemetry) {}
    async fn set_screen_power(&mut self, on: bool);
    async fn set_indicator(
        &mut self,
        indicator: Indicator,
        state: IndicatorState,
    ) -> Result<(), PresenterError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SuspendOutcome {
    Suspended,
    Denied,
}

/// CPU suspend and the auto-wake timer.
///
/// The interrupt and device steps are called by
/// [`SuspendScheduler`](crate::suspend::SuspendScheduler) in a fixed order;
/// resume steps are assumed to always succeed.
pub trait SuspendBackend {
    /// Whether the platform can enter a system suspend state at all.
    fn supports_system_suspend(&self) -> bool;

    fn disable_local_irq(&mut self);
    fn enable_local_irq(&mut self);
    fn suspend_irqs(&mut self);
    fn resume_irqs(&mut self);

    /// Switch regulators to their suspend (memory retention) state.
    async fn prepare_regulators(&mut self) {}
    async fn suspend_devices(&mut self) -> Result<(), SuspendError>;
    async fn resume_devices(&mut self);

    /// Enter the lowest available power state and return on wakeup.
    async fn try_suspend(&mut self) -> SuspendOutcome;
    /// Idle until the next interrupt.
    async fn wait_for_interrupt(&mut self);

    /// Start a periodic wakeup. Each period raises the session's
    /// [`WakeFlag`].
    fn arm_auto_wake(&mut self, interval_s: u32);
    fn disarm_auto_wake(&mut self);
}

pub trait PowerOff {
    fn is_present(&self) -> bool {
        true
    }

    /// Cut power. Not expected to return; if it does the caller retries.
    async fn shutdown(&mut self);
}

/// Operator interruption, polled once per loop iteration.
pub trait CancelSignal {
    fn cancel_requested(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootMode {
    Undefined,
    Normal,
    Charging,
    Recovery,
    Loader,
    Other(u32),
}

/// What the previous stage left for this boot, and where this boot's
/// decisions go.
pub trait BootEnvironment {
    /// Pending preboot directive, if any.
    fn preboot(&self) -> Option<&str>;
    fn boot_mode(&self) -> BootMode;
    /// Ask the OS to start in charger mode.
    fn tag_charger_mode(&mut self);
}

/// Monotonic millisecond time base.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The set of collaborators a board provides.
pub trait Platform {
    type Gauge: FuelGauge;
    type Key: PowerKey;
    type Alarm: RtcAlarm;
    type Presenter: Presenter;
    type Suspend: SuspendBackend;
    type PowerOff: PowerOff;
    type Cancel: CancelSignal;
    type Boot: BootEnvironment;
    type Clock: Clock;
    type Delay: DelayNs;
}

/// Board resources used by the guard and the charge loop. Fields are public
/// so both can borrow them independently.
pub struct Context<P: Platform> {
    pub gauge: P::Gauge,
    pub key: P::Key,
    pub alarm: P::Alarm,
    pub presenter: P::Presenter,
    pub suspend: P::Suspend,
    pub power_off: P::PowerOff,
    pub cancel: P::Cancel,
    pub boot: P::Boot,
    pub clock: P::Clock,
    pub delay: P::Delay,
    /// Written by the auto-wake timer, consumed by the charge loop.
    pub wake: &'static WakeFlag,
}

impl<P: Platform> Context<P> {
    pub(crate) fn elapsed_ms(&self, since: Instant) -> u64 {
        self.clock
            .now()
            .checked_duration_since(since)
            .map_or(0, |elapsed| elapsed.as_millis())
    }
}

// Null objects

pub struct NullPresenter;

impl Presenter for NullPresenter {
    async fn render_frame(&mut self, _index: FrameIndex, _frame: &AnimationFrame) {}
    async fn render_blank(&mut self) {}
    async fn render_logo(&mut self) {}
    async fn render_message(&mut self, _line: u8, _text: &str) {}
    async fn set_screen_power(&mut self, _on: bool) {}
    async fn set_indicator(
        &mut self,
        _indicator: Indicator,
        _state: IndicatorState,
    ) -> Result<(), PresenterError> {
        Ok(())
    }
}

/// Platform without suspend support or auto-wake timer. Waiting for an
/// interrupt returns immediately; the scheduler's settle delay paces the
/// loop instead.
pub struct NoSuspend;

impl SuspendBackend for NoSuspend {
    fn supports_system_suspend(&self) -> bool {
        false
    }
    fn disable_local_irq(&mut self) {}
    fn enable_local_irq(&mut self) {}
    fn suspend_irqs(&mut self) {}
    fn resume_irqs(&mut self) {}
    async fn suspend_devices(&mut self) -> Result<(), SuspendError> {
        Ok(())
    }
    async fn resume_devices(&mut self) {}
    async fn try_suspend(&mut self) -> SuspendOutcome {
        SuspendOutcome::Denied
    }
    async fn wait_for_interrupt(&mut self) {}
    fn arm_auto_wake(&mut self, _interval_s: u32) {}
    fn disarm_auto_wake(&mut self) {}
}

pub struct NoAlarm;

impl RtcAlarm for NoAlarm {
    fn alarm_fired(&mut self) -> bool {
        false
    }
}

pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn cancel_requested(&mut self) -> bool {
        false
    }
}
