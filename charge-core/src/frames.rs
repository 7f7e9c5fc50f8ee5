//! Battery animation frames and state-of-charge based frame selection.

use crate::error::FrameTableError;

/// One still image of the battery animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnimationFrame {
    /// Image handle, resolved by the presenter.
    pub name: &'static str,
    /// Lowest state of charge (%) this frame is shown for. The sentinel frame
    /// uses -1.
    pub threshold_soc: i16,
    pub period_ms: u32,
}

impl AnimationFrame {
    pub const fn new(name: &'static str, threshold_soc: i16, period_ms: u32) -> Self {
        Self {
            name,
            threshold_soc,
            period_ms,
        }
    }
}

pub const SENTINEL_SOC: i16 = -1;

/// The stock frame set: six levels plus the failure image.
pub const DEFAULT_FRAMES: [AnimationFrame; 7] = [
    AnimationFrame::new("battery_0.bmp", 5, 600),
    AnimationFrame::new("battery_1.bmp", 20, 600),
    AnimationFrame::new("battery_2.bmp", 40, 600),
    AnimationFrame::new("battery_3.bmp", 60, 600),
    AnimationFrame::new("battery_4.bmp", 80, 600),
    AnimationFrame::new("battery_5.bmp", 100, 600),
    AnimationFrame::new("battery_fail.bmp", SENTINEL_SOC, 1000),
];

/// Which frame the controller is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameIndex {
    /// Recompute from the current state of charge on the next tick.
    Reset,
    /// A regular level frame.
    Frame(usize),
    /// The "low power, cannot boot" image (the table's sentinel).
    LowPower,
}

/// Validated frame table: at least two level frames with strictly increasing
/// thresholds, followed by the sentinel.
#[derive(Debug, Clone, Copy)]
pub struct FrameTable {
    frames: &'static [AnimationFrame],
}

impl FrameTable {
    pub fn new(frames: &'static [AnimationFrame]) -> Result<Self, FrameTableError> {
        let Some((sentinel, levels)) = frames.split_last() else {
            return Err(FrameTableError::TooFewFrames);
        };
        if sentinel.threshold_soc != SENTINEL_SOC {
            return Err(FrameTableError::MissingSentinel);
        }
        if levels.len() < 2 {
            return Err(FrameTableError::TooFewFrames);
        }
        if levels
            .windows(2)
            .any(|pair| pair[0].threshold_soc >= pair[1].threshold_soc)
        {
            return Err(FrameTableError::NotAscending);
        }
        Ok(Self { frames })
    }

    /// Number of level frames, sentinel excluded.
    pub fn level_count(&self) -> usize {
        self.frames.len() - 1
    }

    fn last_level(&self) -> usize {
        self.level_count() - 1
    }

    /// Pick the level frame for a state of charge.
    ///
    /// Returns the first `i` with `threshold[i] <= soc < threshold[i + 1]`;
    /// `soc >= 100` always maps to the last level frame. A reading below the
    /// first threshold falls back to frame 0.
    pub fn select(&self, soc: u8) -> usize {
        if soc >= 100 {
            return self.last_level();
        }
        let soc = soc as i16;
        let levels = &self.frames[..self.level_count()];
        levels
            .windows(2)
            .position(|pair| pair[0].threshold_soc <= soc && soc < pair[1].threshold_soc)
            .unwrap_or(0)
    }

    /// The frame an index points at. `Reset` has no frame.
    pub fn frame(&self, index: FrameIndex) -> Option<&AnimationFrame> {
        match index {
            FrameIndex::Reset => None,
            FrameIndex::Frame(i) => self.frames[..self.level_count()].get(i),
            FrameIndex::LowPower => self.frames.last(),
        }
    }

    pub fn period_ms(&self, index: FrameIndex) -> u64 {
        self.frame(index).map_or(0, |frame| frame.period_ms as u64)
    }

    /// The frame that follows `index` once its period has elapsed.
    ///
    /// Past the last level frame, and after the low power frame, the
    /// animation restarts from the current state of charge.
    pub fn next(&self, index: FrameIndex) -> FrameIndex {
        match index {
            FrameIndex::Frame(i) if i < self.last_level() => FrameIndex::Frame(i + 1),
            _ => FrameIndex::Reset,
        }
    }
}

impl Default for FrameTable {
    fn default() -> Self {
        Self {
            frames: &DEFAULT_FRAMES,
        }
    }
}
