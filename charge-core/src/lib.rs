#![no_std]
//! Pre-boot charge animation controller.
//!
//! Decides whether to show a charging screen instead of booting, animates the
//! battery level from fuel gauge readings, handles power key gestures, blanks
//! the screen and suspends the CPU while charging, and forces charging or
//! shutdown when the battery is critically low.
//!
//! The crate is hardware independent; boards implement the traits in [`hal`].

#[cfg(test)]
extern crate std;

// This must go first so the macros are visible to the other modules.
mod fmt;

pub mod animation;
pub mod config;
pub mod error;
pub mod frames;
pub mod guard;
pub mod hal;
pub mod indicator;
pub mod suspend;
pub mod telemetry;
pub mod wake;

pub use animation::{
    ChargeAnimation, ChargeOutcome, ChargeSummary, Entry, ExitReason, SessionState, SkipReason,
};
pub use config::ChargeConfig;
pub use error::ChargeError;
pub use frames::{AnimationFrame, FrameIndex, FrameTable};
pub use guard::{GuardExit, LowPowerGuard};
pub use telemetry::Telemetry;
pub use wake::WakeFlag;
