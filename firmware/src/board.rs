//! Binds the charge controller to the RP2040 board.

use alloc::string::String;
use charge_core::error::{KeyError, PresenterError, SuspendError};
use charge_core::hal::{
    BootEnvironment, BootMode, CancelSignal, Clock, Indicator, IndicatorState, KeyPress,
    NoAlarm, Platform, PowerKey, PowerOff, Presenter, SuspendBackend, SuspendOutcome,
};
use charge_core::{AnimationFrame, FrameIndex, Telemetry};
use defmt::{debug, info, trace, warn};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::watchdog::Watchdog;
use embassy_time::{Delay, Duration, Instant, Timer, with_timeout};
use portable_atomic::Ordering;
use static_cell::StaticCell;

use crate::config::*;
use crate::config_resources::{HostOutputResources, PowerHoldResources};
use crate::led_patterns::{
    blank_pattern, frame_pattern, indicator_pattern, logo_pattern, message_flash,
};
use crate::tasks::auto_wake::{AUTO_WAKE_CONTROL, WAKE_EVENT};
use crate::tasks::fuel_gauge::Bq27xxx;
use crate::tasks::led_blinker::{LED_BLINKER_EVENT_CHANNEL, LEDBlinkerEvents};
use crate::tasks::power_key::{POWER_KEY_EVENT_CHANNEL, USER_CANCEL};

pub struct Board;

impl Platform for Board {
    type Gauge = Bq27xxx;
    type Key = ChannelPowerKey;
    type Alarm = NoAlarm;
    type Presenter = LedPresenter;
    type Suspend = RpSuspend;
    type PowerOff = PmicPowerOff;
    type Cancel = ButtonCancel;
    type Boot = ScratchBootEnvironment;
    type Clock = SystemClock;
    type Delay = Delay;
}

/// GPIO outputs that gate power to the host.
pub struct HostOutputs {
    pub ven: Output<'static>,
    pub pcie_sleep: Output<'static>,
    pub dis_usb3: Output<'static>,
    pub dis_usb2: Output<'static>,
    pub dis_usb1: Output<'static>,
    pub dis_usb0: Output<'static>,
}

impl HostOutputs {
    /// Host starts powered off.
    pub fn new(resources: HostOutputResources) -> Self {
        HostOutputs {
            ven: Output::new(resources.ven, Level::Low),
            pcie_sleep: Output::new(resources.pcie_sleep, Level::High),
            dis_usb0: Output::new(resources.dis_usb0, Level::High),
            dis_usb1: Output::new(resources.dis_usb1, Level::High),
            dis_usb2: Output::new(resources.dis_usb2, Level::High),
            dis_usb3: Output::new(resources.dis_usb3, Level::High),
        }
    }

    pub fn power_on(&mut self) {
        self.ven.set_high();
        self.pcie_sleep.set_low();
        self.dis_usb0.set_low();
        self.dis_usb1.set_low();
        self.dis_usb2.set_low();
        self.dis_usb3.set_low();
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Gestures classified by the power key task.
pub struct ChannelPowerKey;

impl PowerKey for ChannelPowerKey {
    fn poll(&mut self) -> Result<KeyPress, KeyError> {
        Ok(POWER_KEY_EVENT_CHANNEL
            .try_receive()
            .unwrap_or(KeyPress::None))
    }
}

pub struct ButtonCancel;

impl CancelSignal for ButtonCancel {
    fn cancel_requested(&mut self) -> bool {
        USER_CANCEL.load(Ordering::Acquire)
    }
}

static POWER_HOLD: StaticCell<Output<'static>> = StaticCell::new();

/// Cuts the controller's own supply by releasing the power hold line.
pub struct PmicPowerOff {
    hold: &'static mut Output<'static>,
}

impl PmicPowerOff {
    /// Latches the supply on. The line keeps being driven after the
    /// controller is done with it.
    pub fn new(r: PowerHoldResources) -> Self {
        Self {
            hold: POWER_HOLD.init(Output::new(r.pin, Level::High)),
        }
    }
}

impl PowerOff for PmicPowerOff {
    async fn shutdown(&mut self) {
        info!("Releasing power hold");
        self.hold.set_low();
        Timer::after(Duration::from_millis(POWER_OFF_SETTLE_MS)).await;
        // Still running: supplied from elsewhere
        warn!("Still powered after releasing the power hold line");
        self.hold.set_high();
    }
}

/// Renders the animation on the RGB LED strip.
pub struct LedPresenter {
    levels: usize,
}

impl LedPresenter {
    pub fn new(levels: usize) -> Self {
        Self { levels }
    }

    async fn send(&self, event: LEDBlinkerEvents) {
        LED_BLINKER_EVENT_CHANNEL.send(event).await;
    }
}

impl Presenter for LedPresenter {
    async fn render_frame(&mut self, index: FrameIndex, frame: &AnimationFrame) {
        trace!("Render {} as {:?}", frame.name, index);
        self.send(LEDBlinkerEvents::SetPattern(frame_pattern(
            index,
            frame,
            self.levels,
        )))
        .await;
    }

    async fn render_blank(&mut self) {
        self.send(LEDBlinkerEvents::SetPattern(blank_pattern())).await;
    }

    async fn render_logo(&mut self) {
        self.send(LEDBlinkerEvents::SetPattern(logo_pattern())).await;
    }

    async fn render_message(&mut self, line: u8, text: &str) {
        // No text display on this board
        info!("Message {}: {}", line, text);
        self.send(LEDBlinkerEvents::AddModifier(message_flash())).await;
    }

    async fn render_status(&mut self, telemetry: &Telemetry) {
        // The bar already shows the level; the rest only goes to the log
        info!(
            "{}% {}mV {}mA",
            telemetry.soc,
            telemetry.voltage_mv,
            telemetry.current_ma
        );
    }

    async fn set_screen_power(&mut self, on: bool) {
        self.send(LEDBlinkerEvents::SetPower(on)).await;
    }

    async fn set_indicator(
        &mut self,
        indicator: Indicator,
        state: IndicatorState,
    ) -> Result<(), PresenterError> {
        LED_BLINKER_EVENT_CHANNEL
            .try_send(LEDBlinkerEvents::SetIndicator(
                indicator,
                indicator_pattern(indicator, state),
            ))
            .map_err(|_| PresenterError::Unavailable)
    }
}

/// The RP2040 has no suspend state that keeps the executor alive, so every
/// suspend is a wait for the next wake event.
pub struct RpSuspend;

impl SuspendBackend for RpSuspend {
    fn supports_system_suspend(&self) -> bool {
        false
    }

    // Interrupts stay enabled: gauge transfers complete from the I2C
    // interrupt handler.
    fn disable_local_irq(&mut self) {}
    fn enable_local_irq(&mut self) {}

    fn suspend_irqs(&mut self) {
        trace!("Suspend irqs");
    }
    fn resume_irqs(&mut self) {
        trace!("Resume irqs");
    }

    async fn suspend_devices(&mut self) -> Result<(), SuspendError> {
        Ok(())
    }
    async fn resume_devices(&mut self) {}

    async fn try_suspend(&mut self) -> SuspendOutcome {
        SuspendOutcome::Denied
    }

    async fn wait_for_interrupt(&mut self) {
        if with_timeout(Duration::from_millis(IDLE_WAKE_MS), WAKE_EVENT.wait())
            .await
            .is_ok()
        {
            debug!("Woken by event");
        }
    }

    fn arm_auto_wake(&mut self, interval_s: u32) {
        AUTO_WAKE_CONTROL.signal((interval_s > 0).then_some(interval_s));
    }

    fn disarm_auto_wake(&mut self) {
        AUTO_WAKE_CONTROL.signal(None);
    }
}

/// Boot handoff through the watchdog scratch registers, which survive a
/// warm reset.
pub struct ScratchBootEnvironment {
    preboot: Option<String>,
    mode: BootMode,
    charger_mode: bool,
}

impl ScratchBootEnvironment {
    pub fn from_watchdog(watchdog: &mut Watchdog) -> Self {
        let mode = decode_boot_mode(watchdog.get_scratch(BOOT_MODE_SCRATCH));
        let preboot = decode_preboot(watchdog.get_scratch(PREBOOT_SCRATCH));
        info!("Boot mode {:?}, preboot {:?}", mode, preboot.as_deref());

        // One-shot: the directive applies to this boot only
        watchdog.set_scratch(PREBOOT_SCRATCH, 0);
        watchdog.set_scratch(CHARGER_MODE_SCRATCH, 0);

        Self {
            preboot,
            mode,
            charger_mode: false,
        }
    }

    /// Pass the charger mode tag on to the host.
    pub fn store(&self, watchdog: &mut Watchdog) {
        if self.charger_mode {
            watchdog.set_scratch(CHARGER_MODE_SCRATCH, CHARGER_MODE_MAGIC);
        }
    }
}

impl BootEnvironment for ScratchBootEnvironment {
    fn preboot(&self) -> Option<&str> {
        self.preboot.as_deref()
    }

    fn boot_mode(&self) -> BootMode {
        self.mode
    }

    fn tag_charger_mode(&mut self) {
        self.charger_mode = true;
    }
}

fn decode_boot_mode(raw: u32) -> BootMode {
    match raw {
        0 => BootMode::Undefined,
        1 => BootMode::Normal,
        2 => BootMode::Charging,
        3 => BootMode::Recovery,
        4 => BootMode::Loader,
        other => BootMode::Other(other),
    }
}

/// Up to four ASCII characters, zero padded.
fn decode_preboot(raw: u32) -> Option<String> {
    let bytes = raw.to_le_bytes();
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    if len == 0 {
        return None;
    }
    match core::str::from_utf8(&bytes[..len]) {
        Ok(text) => Some(String::from(text)),
        Err(_) => {
            warn!("Ignoring malformed preboot directive {:#x}", raw);
            None
        }
    }
}
