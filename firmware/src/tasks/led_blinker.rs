use core::fmt;
use core::future::Future;
use core::pin::Pin;

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use charge_core::hal::Indicator;
use defmt::{debug, info};
use embassy_executor::task;
use embassy_rp::bind_interrupts;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel;
use embassy_time::{Duration, Instant, Ticker};

use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{Instance, InterruptHandler, Pio};
use embassy_rp::pio_programs::ws2812::{PioWs2812, PioWs2812Program};
use smart_leds::{RGB8, brightness, gamma};

use crate::config_resources::RGBLEDResources;

pub const NUM_LEDS: usize = 5;
/// The last LED is reserved for the charge indicators.
pub const BAR_LEDS: usize = NUM_LEDS - 1;

pub enum LEDBlinkerEvents {
    SetPattern(LEDPattern),
    AddModifier(LEDPattern),
    /// Replace (or clear) the overlay for one indicator.
    SetIndicator(Indicator, Option<LEDPattern>),
    /// Blank the main pattern while off. Indicators stay visible.
    SetPower(bool),
}

pub type LEDBlinkerChannelType = channel::Channel<CriticalSectionRawMutex, LEDBlinkerEvents, 8>;
pub static LED_BLINKER_EVENT_CHANNEL: LEDBlinkerChannelType = channel::Channel::new();

/// Input a value 0 to 255 to get a color value
/// The colours are a transition r - g - b - back to r.
fn wheel(mut wheel_pos: u8) -> RGB8 {
    wheel_pos = 255 - wheel_pos;
    if wheel_pos < 85 {
        return (255 - wheel_pos * 3, 0, wheel_pos * 3).into();
    }
    if wheel_pos < 170 {
        wheel_pos -= 85;
        return (0, wheel_pos * 3, 255 - wheel_pos * 3).into();
    }
    wheel_pos -= 170;
    (wheel_pos * 3, 255 - wheel_pos * 3, 0).into()
}

fn scale(color: RGB8, frac: f32) -> RGB8 {
    RGB8 {
        r: (color.r as f32 * frac) as u8,
        g: (color.g as f32 * frac) as u8,
        b: (color.b as f32 * frac) as u8,
    }
}

// Object-safe trait using boxed futures
pub trait LEDPatternFragment: Send {
    fn duration_ms(&self) -> u32;
    fn run<'a>(
        &'a self,
        t: u32,
        leds: &'a mut [RGB8; NUM_LEDS],
    ) -> Pin<Box<dyn Future<Output = ()> + 'a + Send>>;
    fn type_name(&self) -> &'static str;
}

#[derive(Clone, Debug)]
pub struct OneColor {
    pub duration_ms: u32,
    pub color: RGB8,
}

impl OneColor {
    pub fn new(duration_ms: u32, color: RGB8) -> Self {
        Self { duration_ms, color }
    }
}

impl LEDPatternFragment for OneColor {
    fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    fn run<'a>(
        &'a self,
        _t: u32,
        leds: &'a mut [RGB8; NUM_LEDS],
    ) -> Pin<Box<dyn Future<Output = ()> + 'a + Send>> {
        Box::pin(async move {
            for led in leds.iter_mut() {
                *led = self.color;
            }
        })
    }

    fn type_name(&self) -> &'static str {
        "OneColor"
    }
}

#[derive(Clone, Debug)]
pub struct Off {
    pub duration_ms: u32,
}

impl Off {
    pub fn new(duration: u32) -> Self {
        Self {
            duration_ms: duration,
        }
    }
}

impl LEDPatternFragment for Off {
    fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    fn run<'a>(
        &'a self,
        _t: u32,
        leds: &'a mut [RGB8; NUM_LEDS],
    ) -> Pin<Box<dyn Future<Output = ()> + 'a + Send>> {
        Box::pin(async move {
            for led in leds.iter_mut() {
                *led = RGB8::default();
            }
        })
    }

    fn type_name(&self) -> &'static str {
        "Off"
    }
}

/// Leaves the LEDs as they are. Gives an overlay its "off" half.
#[derive(Clone, Debug)]
pub struct Keep {
    pub duration_ms: u32,
}

impl Keep {
    pub fn new(duration_ms: u32) -> Self {
        Self { duration_ms }
    }
}

impl LEDPatternFragment for Keep {
    fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    fn run<'a>(
        &'a self,
        _t: u32,
        _leds: &'a mut [RGB8; NUM_LEDS],
    ) -> Pin<Box<dyn Future<Output = ()> + 'a + Send>> {
        Box::pin(async move {})
    }

    fn type_name(&self) -> &'static str {
        "Keep"
    }
}

#[derive(Clone, Debug)]
pub struct RoyalRainbow {
    pub duration_ms: u32,
    pub direction: bool,
}

impl RoyalRainbow {
    pub fn new(duration: u32, direction: bool) -> Self {
        Self {
            duration_ms: duration,
            direction,
        }
    }
}

impl LEDPatternFragment for RoyalRainbow {
    fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    fn run<'a>(
        &'a self,
        t: u32,
        leds: &'a mut [RGB8; NUM_LEDS],
    ) -> Pin<Box<dyn Future<Output = ()> + 'a + Send>> {
        Box::pin(async move {
            let ti: i32 = t as i32;
            let td = if self.direction { -ti } else { ti };
            let j = td / 2;
            for (i, led) in leds.iter_mut().enumerate() {
                *led = wheel((((i * 256) as i32 / NUM_LEDS as i32 + j) & 255) as u8);
            }
        })
    }

    fn type_name(&self) -> &'static str {
        "RoyalRainbow"
    }
}

#[derive(Clone, Debug)]
pub struct Colors {
    pub duration_ms: u32,
    pub colors: [RGB8; NUM_LEDS],
}

impl Colors {
    pub fn new(duration_ms: u32, colors: [RGB8; NUM_LEDS]) -> Self {
        Self {
            duration_ms,
            colors,
        }
    }
}

impl LEDPatternFragment for Colors {
    fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    fn run<'a>(
        &'a self,
        _t: u32,
        leds: &'a mut [RGB8; NUM_LEDS],
    ) -> Pin<Box<dyn Future<Output = ()> + 'a + Send>> {
        Box::pin(async move {
            leds.copy_from_slice(&self.colors);
        })
    }

    fn type_name(&self) -> &'static str {
        "Colors"
    }
}

/// Battery level bar over the first [`BAR_LEDS`] LEDs. The topmost lit LED
/// fades in over the fragment's duration.
pub struct BatteryBar {
    pub duration_ms: u32,
    pub lit: usize,
    pub color: RGB8,
}

impl BatteryBar {
    pub fn new(duration_ms: u32, lit: usize, color: RGB8) -> Self {
        Self {
            duration_ms,
            lit: lit.min(BAR_LEDS),
            color,
        }
    }
}

impl LEDPatternFragment for BatteryBar {
    fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    fn run<'a>(
        &'a self,
        t: u32,
        leds: &'a mut [RGB8; NUM_LEDS],
    ) -> Pin<Box<dyn Future<Output = ()> + 'a + Send>> {
        Box::pin(async move {
            let frac = (t as f32 / self.duration_ms.max(1) as f32).clamp(0.0, 1.0);
            for (i, led) in leds.iter_mut().enumerate().take(BAR_LEDS) {
                *led = if i + 1 < self.lit {
                    self.color
                } else if i + 1 == self.lit {
                    scale(self.color, frac)
                } else {
                    RGB8::default()
                };
            }
        })
    }

    fn type_name(&self) -> &'static str {
        "BatteryBar"
    }
}

/// Paints only the indicator LED.
pub struct IndicatorLed {
    pub duration_ms: u32,
    pub color: RGB8,
}

impl IndicatorLed {
    pub fn new(duration_ms: u32, color: RGB8) -> Self {
        Self { duration_ms, color }
    }
}

impl LEDPatternFragment for IndicatorLed {
    fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    fn run<'a>(
        &'a self,
        _t: u32,
        leds: &'a mut [RGB8; NUM_LEDS],
    ) -> Pin<Box<dyn Future<Output = ()> + 'a + Send>> {
        Box::pin(async move {
            leds[NUM_LEDS - 1] = self.color;
        })
    }

    fn type_name(&self) -> &'static str {
        "IndicatorLed"
    }
}

pub type FragmentVec = Vec<Box<dyn LEDPatternFragment>>;

pub struct LEDPattern {
    fragments: FragmentVec,
    current_fragment_idx: usize,
    current_fragment_start_ms: u64,
}

impl LEDPattern {
    pub fn new(fragments: FragmentVec) -> Self {
        Self {
            fragments,
            current_fragment_idx: 0,
            current_fragment_start_ms: 0,
        }
    }

    async fn update(&mut self, data: &mut [RGB8; NUM_LEDS], oneshot: bool) -> bool {
        if self.current_fragment_start_ms == 0 {
            self.current_fragment_start_ms = Instant::now().as_millis();
        }

        if self.fragments.is_empty() {
            return !oneshot;
        }
        let mut current_fragment_duration_ms: u32 =
            self.fragments[self.current_fragment_idx].duration_ms();

        let now_ms = Instant::now().as_millis();

        while now_ms - self.current_fragment_start_ms > current_fragment_duration_ms as u64 {
            self.current_fragment_idx += 1;
            if self.current_fragment_idx >= self.fragments.len() {
                if oneshot {
                    return false;
                }
                self.current_fragment_idx = 0;
            }
            self.current_fragment_start_ms += current_fragment_duration_ms as u64;
            current_fragment_duration_ms = self.fragments[self.current_fragment_idx].duration_ms();
        }

        let time_diff = (now_ms - self.current_fragment_start_ms) as u32;
        self.fragments[self.current_fragment_idx]
            .run(time_diff, data)
            .await;

        true
    }
}

impl fmt::Debug for LEDPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fragment_types: Vec<&str> = self.fragments.iter().map(|f| f.type_name()).collect();
        f.debug_struct("LEDPattern")
            .field("current_fragment_idx", &self.current_fragment_idx)
            .field("fragments_count", &self.fragments.len())
            .field("fragment_types", &fragment_types)
            .finish()
    }
}

type ModifierVec = Vec<LEDPattern>;

fn indicator_slot(indicator: Indicator) -> usize {
    match indicator {
        Indicator::Charging => 0,
        Indicator::Full => 1,
    }
}

struct LEDBlinker<'d, P: Instance, const S: usize> {
    ws2812: PioWs2812<'d, P, S, NUM_LEDS>,
    data: [RGB8; NUM_LEDS],
    pattern: LEDPattern,
    modifiers: ModifierVec,
    indicators: [Option<LEDPattern>; 2],
    powered: bool,
    brightness: u8,
}

impl<'d, P: Instance, const S: usize> LEDBlinker<'d, P, S> {
    fn new(ws2812: PioWs2812<'d, P, S, NUM_LEDS>, pattern: LEDPattern, brightness: u8) -> Self {
        Self {
            ws2812,
            data: [RGB8::default(); NUM_LEDS],
            pattern,
            modifiers: Vec::new(),
            indicators: [None, None],
            powered: true,
            brightness,
        }
    }

    fn handle(&mut self, event: LEDBlinkerEvents) {
        match event {
            LEDBlinkerEvents::SetPattern(pattern) => self.pattern = pattern,
            LEDBlinkerEvents::AddModifier(modifier) => self.modifiers.push(modifier),
            LEDBlinkerEvents::SetIndicator(indicator, pattern) => {
                self.indicators[indicator_slot(indicator)] = pattern;
            }
            LEDBlinkerEvents::SetPower(on) => {
                debug!("LED power: {}", on);
                self.powered = on;
                if !on {
                    self.modifiers.clear();
                }
            }
        }
    }

    async fn update(&mut self) {
        self.data = [RGB8::default(); NUM_LEDS];

        if self.powered {
            self.pattern.update(&mut self.data, false).await;

            let mut i = 0;
            while i < self.modifiers.len() {
                if !self.modifiers[i].update(&mut self.data, true).await {
                    self.modifiers.remove(i);
                } else {
                    i += 1;
                }
            }
        }

        for indicator in self.indicators.iter_mut().flatten() {
            indicator.update(&mut self.data, false).await;
        }

        // Apply brightness
        let gamma_corrected = gamma(self.data.iter().cloned());
        let mut output_data: [RGB8; NUM_LEDS] = [RGB8::default(); NUM_LEDS];
        for (out, color) in output_data
            .iter_mut()
            .zip(brightness(gamma_corrected, self.brightness))
        {
            *out = color;
        }

        self.ws2812.write(&output_data).await;
    }
}

#[task]
pub async fn led_blinker_task(r: RGBLEDResources) {
    info!("Initializing LED blinker task");
    let Pio {
        mut common, sm0, ..
    } = Pio::new(r.pio, Irqs);

    bind_interrupts!(struct Irqs {
        PIO0_IRQ_0 => InterruptHandler<PIO0>;
    });

    let program = PioWs2812Program::new(&mut common);
    let ws2812 = PioWs2812::new(&mut common, sm0, r.dma_ch, r.pin, &program);

    let fragments: FragmentVec = vec![Box::new(Off { duration_ms: 1000 })];
    let pattern = LEDPattern::new(fragments);

    // Config manager is initialized before the tasks are spawned
    let brightness = crate::config_manager::get_led_brightness().await;
    debug!("LED brightness from config: {}", brightness);

    let mut led_blinker = LEDBlinker::new(ws2812, pattern, brightness);

    let mut ticker = Ticker::every(Duration::from_millis(10));

    let receiver = LED_BLINKER_EVENT_CHANNEL.receiver();

    info!("LED blinker task initialized");

    loop {
        while let Ok(event) = receiver.try_receive() {
            led_blinker.handle(event);
        }

        ticker.next().await;
        led_blinker.update().await;
    }
}
