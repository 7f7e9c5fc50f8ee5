use alloc::boxed::Box;
use alloc::vec;
use charge_core::hal::{Indicator, IndicatorState};
use charge_core::{AnimationFrame, FrameIndex};
use smart_leds::colors::*;

use crate::tasks::led_blinker::*;

// Provide LED patterns for the charge animation

/// Number of bar LEDs lit for a level frame.
pub fn bar_length(level: usize, levels: usize) -> usize {
    ((level + 1) * BAR_LEDS).div_ceil(levels.max(1)).clamp(1, BAR_LEDS)
}

pub fn frame_pattern(index: FrameIndex, frame: &AnimationFrame, levels: usize) -> LEDPattern {
    match index {
        FrameIndex::Frame(level) => {
            let lit = bar_length(level, levels);
            let color = match lit {
                1 => RED,
                BAR_LEDS => GREEN,
                _ => YELLOW,
            };
            LEDPattern::new(vec![Box::new(BatteryBar::new(
                frame.period_ms,
                lit,
                color,
            ))])
        }
        // Cannot boot: blink the first LED red
        FrameIndex::LowPower | FrameIndex::Reset => {
            let half = frame.period_ms / 2;
            LEDPattern::new(vec![
                Box::new(Colors::new(half, [RED, BLACK, BLACK, BLACK, BLACK])),
                Box::new(Off::new(half)),
            ])
        }
    }
}

pub fn blank_pattern() -> LEDPattern {
    LEDPattern::new(vec![Box::new(Off::new(1000))])
}

pub fn logo_pattern() -> LEDPattern {
    LEDPattern::new(vec![Box::new(RoyalRainbow::new(1280, true))])
}

/// One amber flash per message line.
pub fn message_flash() -> LEDPattern {
    LEDPattern::new(vec![Box::new(OneColor::new(300, ORANGE))])
}

pub fn indicator_pattern(indicator: Indicator, state: IndicatorState) -> Option<LEDPattern> {
    let color = match indicator {
        Indicator::Charging => ORANGE,
        Indicator::Full => GREEN,
    };
    match state {
        IndicatorState::Off => None,
        IndicatorState::On => Some(LEDPattern::new(vec![Box::new(IndicatorLed::new(
            1000, color,
        ))])),
        IndicatorState::Blink => Some(LEDPattern::new(vec![
            Box::new(IndicatorLed::new(500, color)),
            Box::new(Keep::new(500)),
        ])),
    }
}

