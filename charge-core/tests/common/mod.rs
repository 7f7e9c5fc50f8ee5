//! Simulated board for driving the controller on the host.
//!
//! Time only moves when the code under test delays, so every scenario is
//! deterministic.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use charge_core::error::{GaugeError, KeyError, PresenterError, SuspendError};
use charge_core::hal::{
    BootEnvironment, BootMode, CancelSignal, Clock, Context, FuelGauge, Indicator,
    IndicatorState, KeyPress, Platform, PowerKey, PowerOff, Presenter, RtcAlarm, SuspendBackend,
    SuspendOutcome,
};
use charge_core::{
    AnimationFrame, ChargeAnimation, ChargeConfig, FrameIndex, FrameTable, Telemetry, WakeFlag,
};
use embassy_futures::block_on;
use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;

#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn millis(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.0.get())
    }
}

impl DelayNs for SimClock {
    async fn delay_ns(&mut self, ns: u32) {
        self.advance((ns as u64).div_ceil(1_000_000));
    }

    async fn delay_us(&mut self, us: u32) {
        self.advance((us as u64).div_ceil(1000));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance(ms as u64);
    }
}

pub struct GaugeState {
    pub voltage_mv: u32,
    /// Consumed one per voltage read before falling back to `voltage_mv`.
    pub voltage_script: VecDeque<u32>,
    pub voltage_error: Option<GaugeError>,
    /// Voltage read numbers, counted from 1, that fail with a bus error.
    pub failing_voltage_reads: Vec<usize>,
    pub soc: i32,
    /// Consumed one per state of charge read before falling back to `soc`.
    pub soc_script: VecDeque<i32>,
    pub soc_reads: usize,
    pub current_ma: i32,
    pub current_error: Option<GaugeError>,
    pub charger_online: bool,
    pub battery: bool,
    pub voltage_reads: usize,
}

impl Default for GaugeState {
    fn default() -> Self {
        Self {
            voltage_mv: 3800,
            voltage_script: VecDeque::new(),
            voltage_error: None,
            failing_voltage_reads: Vec::new(),
            soc: 50,
            soc_script: VecDeque::new(),
            soc_reads: 0,
            current_ma: 500,
            current_error: None,
            charger_online: true,
            battery: true,
            voltage_reads: 0,
        }
    }
}

pub struct SimGauge(Rc<RefCell<GaugeState>>);

impl FuelGauge for SimGauge {
    async fn voltage_mv(&mut self) -> Result<u32, GaugeError> {
        let mut gauge = self.0.borrow_mut();
        gauge.voltage_reads += 1;
        if let Some(e) = gauge.voltage_error {
            return Err(e);
        }
        if gauge.failing_voltage_reads.contains(&gauge.voltage_reads) {
            return Err(GaugeError::Bus);
        }
        if let Some(voltage) = gauge.voltage_script.pop_front() {
            gauge.voltage_mv = voltage;
        }
        Ok(gauge.voltage_mv)
    }

    async fn current_ma(&mut self) -> Result<i32, GaugeError> {
        let gauge = self.0.borrow();
        gauge.current_error.map_or(Ok(gauge.current_ma), Err)
    }

    async fn state_of_charge(&mut self) -> Result<i32, GaugeError> {
        let mut gauge = self.0.borrow_mut();
        gauge.soc_reads += 1;
        Ok(gauge.soc_script.pop_front().unwrap_or(gauge.soc))
    }

    async fn charger_online(&mut self) -> Result<bool, GaugeError> {
        Ok(self.0.borrow().charger_online)
    }

    async fn battery_exists(&mut self) -> Result<bool, GaugeError> {
        Ok(self.0.borrow().battery)
    }
}

pub struct SimKey {
    present: bool,
    queue: Rc<RefCell<VecDeque<KeyPress>>>,
}

impl PowerKey for SimKey {
    fn is_present(&self) -> bool {
        self.present
    }

    fn poll(&mut self) -> Result<KeyPress, KeyError> {
        Ok(self.queue.borrow_mut().pop_front().unwrap_or(KeyPress::None))
    }
}

pub struct SimAlarm(Rc<Cell<bool>>);

impl RtcAlarm for SimAlarm {
    fn alarm_fired(&mut self) -> bool {
        self.0.replace(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Frame(FrameIndex),
    Blank,
    Logo,
    Message(u8, String),
    Screen(bool),
    Indicator(Indicator, IndicatorState),
    Status(Telemetry),
}

pub struct SimPresenter(Rc<RefCell<Vec<Shown>>>);

impl Presenter for SimPresenter {
    async fn render_frame(&mut self, index: FrameIndex, _frame: &AnimationFrame) {
        self.0.borrow_mut().push(Shown::Frame(index));
    }

    async fn render_blank(&mut self) {
        self.0.borrow_mut().push(Shown::Blank);
    }

    async fn render_logo(&mut self) {
        self.0.borrow_mut().push(Shown::Logo);
    }

    async fn render_message(&mut self, line: u8, text: &str) {
        self.0.borrow_mut().push(Shown::Message(line, text.to_string()));
    }

    async fn render_status(&mut self, telemetry: &Telemetry) {
        self.0.borrow_mut().push(Shown::Status(*telemetry));
    }

    async fn set_screen_power(&mut self, on: bool) {
        self.0.borrow_mut().push(Shown::Screen(on));
    }

    async fn set_indicator(
        &mut self,
        indicator: Indicator,
        state: IndicatorState,
    ) -> Result<(), PresenterError> {
        self.0.borrow_mut().push(Shown::Indicator(indicator, state));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SuspendLog {
    pub supported: bool,
    pub irq_disabled: bool,
    pub irq_disables: usize,
    pub system_suspends: usize,
    pub wfis: usize,
    pub armed: Vec<u32>,
    pub disarms: usize,
}

pub struct SimSuspend(Rc<RefCell<SuspendLog>>);

impl SuspendBackend for SimSuspend {
    fn supports_system_suspend(&self) -> bool {
        self.0.borrow().supported
    }

    fn disable_local_irq(&mut self) {
        let mut log = self.0.borrow_mut();
        log.irq_disabled = true;
        log.irq_disables += 1;
    }

    fn enable_local_irq(&mut self) {
        self.0.borrow_mut().irq_disabled = false;
    }

    fn suspend_irqs(&mut self) {}

    fn resume_irqs(&mut self) {}

    async fn suspend_devices(&mut self) -> Result<(), SuspendError> {
        Ok(())
    }

    async fn resume_devices(&mut self) {}

    async fn try_suspend(&mut self) -> SuspendOutcome {
        self.0.borrow_mut().system_suspends += 1;
        SuspendOutcome::Suspended
    }

    async fn wait_for_interrupt(&mut self) {
        self.0.borrow_mut().wfis += 1;
    }

    fn arm_auto_wake(&mut self, interval_s: u32) {
        self.0.borrow_mut().armed.push(interval_s);
    }

    fn disarm_auto_wake(&mut self) {
        self.0.borrow_mut().disarms += 1;
    }
}

impl SuspendLog {
    pub fn attempts(&self) -> usize {
        self.system_suspends + self.wfis
    }
}

/// Panic payload used when the simulated PMIC actually cuts power.
#[derive(Debug)]
pub struct PoweredOff;

pub struct SimPowerOff {
    present: bool,
    calls: Rc<Cell<u32>>,
    /// Calls that fail before power is really cut.
    failures: Option<u32>,
}

impl PowerOff for SimPowerOff {
    fn is_present(&self) -> bool {
        self.present
    }

    async fn shutdown(&mut self) {
        let calls = self.calls.get() + 1;
        self.calls.set(calls);
        if self.failures.is_some_and(|failures| calls > failures) {
            panic::panic_any(PoweredOff);
        }
    }
}

/// Requests cancel once it has been polled `after` times.
pub struct SimCancel {
    polls: Rc<Cell<u32>>,
    after: Option<u32>,
}

impl CancelSignal for SimCancel {
    fn cancel_requested(&mut self) -> bool {
        let polls = self.polls.get() + 1;
        self.polls.set(polls);
        self.after.is_some_and(|after| polls > after)
    }
}

pub struct SimBoot {
    preboot: Option<String>,
    mode: BootMode,
    tagged: Rc<Cell<bool>>,
}

impl BootEnvironment for SimBoot {
    fn preboot(&self) -> Option<&str> {
        self.preboot.as_deref()
    }

    fn boot_mode(&self) -> BootMode {
        self.mode
    }

    fn tag_charger_mode(&mut self) {
        self.tagged.set(true);
    }
}

pub struct Sim;

impl Platform for Sim {
    type Gauge = SimGauge;
    type Key = SimKey;
    type Alarm = SimAlarm;
    type Presenter = SimPresenter;
    type Suspend = SimSuspend;
    type PowerOff = SimPowerOff;
    type Cancel = SimCancel;
    type Boot = SimBoot;
    type Clock = SimClock;
    type Delay = SimClock;
}

/// Handles to everything the simulated board records. Configure the fields
/// before calling [`Board::context`].
pub struct Board {
    pub clock: SimClock,
    pub gauge: Rc<RefCell<GaugeState>>,
    pub keys: Rc<RefCell<VecDeque<KeyPress>>>,
    pub shown: Rc<RefCell<Vec<Shown>>>,
    pub suspend: Rc<RefCell<SuspendLog>>,
    pub shutdowns: Rc<Cell<u32>>,
    pub cancel_polls: Rc<Cell<u32>>,
    pub alarm: Rc<Cell<bool>>,
    pub tagged: Rc<Cell<bool>>,
    pub wake: &'static WakeFlag,

    pub key_present: bool,
    pub pmic_present: bool,
    /// Shutdown calls that return before power is cut; `None` never cuts.
    pub shutdown_failures: Option<u32>,
    pub cancel_after: Option<u32>,
    pub preboot: Option<String>,
    pub boot_mode: BootMode,
}

impl Board {
    pub fn new() -> Self {
        Self {
            clock: SimClock::default(),
            gauge: Rc::default(),
            keys: Rc::default(),
            shown: Rc::default(),
            suspend: Rc::default(),
            shutdowns: Rc::default(),
            cancel_polls: Rc::default(),
            alarm: Rc::default(),
            tagged: Rc::default(),
            wake: Box::leak(Box::new(WakeFlag::new())),
            key_present: true,
            pmic_present: true,
            shutdown_failures: None,
            cancel_after: None,
            preboot: None,
            boot_mode: BootMode::Charging,
        }
    }

    pub fn context(&self) -> Context<Sim> {
        Context {
            gauge: SimGauge(self.gauge.clone()),
            key: SimKey {
                present: self.key_present,
                queue: self.keys.clone(),
            },
            alarm: SimAlarm(self.alarm.clone()),
            presenter: SimPresenter(self.shown.clone()),
            suspend: SimSuspend(self.suspend.clone()),
            power_off: SimPowerOff {
                present: self.pmic_present,
                calls: self.shutdowns.clone(),
                failures: self.shutdown_failures,
            },
            cancel: SimCancel {
                polls: self.cancel_polls.clone(),
                after: self.cancel_after,
            },
            boot: SimBoot {
                preboot: self.preboot.clone(),
                mode: self.boot_mode,
                tagged: self.tagged.clone(),
            },
            clock: self.clock.clone(),
            delay: self.clock.clone(),
            wake: self.wake,
        }
    }

    pub fn press(&self, key: KeyPress) {
        self.keys.borrow_mut().push_back(key);
    }

    pub fn set_voltage(&self, voltage_mv: u32) {
        self.gauge.borrow_mut().voltage_mv = voltage_mv;
    }

    pub fn set_soc(&self, soc: i32) {
        self.gauge.borrow_mut().soc = soc;
    }

    pub fn frames_shown(&self) -> Vec<FrameIndex> {
        self.shown
            .borrow()
            .iter()
            .filter_map(|shown| match shown {
                Shown::Frame(index) => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn screen_events(&self) -> Vec<bool> {
        self.shown
            .borrow()
            .iter()
            .filter_map(|shown| match shown {
                Shown::Screen(on) => Some(*on),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<Telemetry> {
        self.shown
            .borrow()
            .iter()
            .filter_map(|shown| match shown {
                Shown::Status(telemetry) => Some(*telemetry),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Shown) -> usize {
        self.shown.borrow().iter().filter(|shown| *shown == wanted).count()
    }

    pub fn clear_shown(&self) {
        self.shown.borrow_mut().clear();
    }
}

/// Exit level 5 %, exit voltage 3600 mV, low power floor 3300 mV, screen on
/// floor 3400 mV, no auto screen off.
pub fn charging_config() -> ChargeConfig {
    ChargeConfig {
        uboot_charge: true,
        exit_charge_level: 5,
        exit_charge_voltage_mv: 3600,
        low_power_voltage_mv: 3300,
        screen_on_voltage_mv: 3400,
        auto_off_screen_interval_s: 0,
        ..Default::default()
    }
}

pub fn animation(board: &Board, config: ChargeConfig) -> ChargeAnimation<Sim> {
    block_on(ChargeAnimation::probe(
        config,
        FrameTable::default(),
        board.context(),
    ))
    .unwrap()
}

/// Run `f` and assert it ended with the simulated board powering off.
pub fn expect_power_off(f: impl FnOnce()) {
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    let payload = result.expect_err("board should have powered off");
    assert!(payload.is::<PoweredOff>(), "unexpected panic");
}
