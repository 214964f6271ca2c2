//! 7-segment gear display driver
//!
//! Eight GPIO outputs drive the digit segments directly, one output per
//! bit of the encoding tables. Updates run the assert pass before the
//! de-assert pass so leftover segments from the previous digit never
//! show as ghosts.

use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, Output, PinDriver};
use log::debug;
use shiftdash_gearbox_lib::DigitPatterns;

use crate::config;

pub struct GearDisplay<'d> {
    segments: Vec<PinDriver<'d, AnyIOPin, Output>>,
}

impl GearDisplay<'static> {
    pub fn new() -> Result<Self> {
        let mut segments = Vec::with_capacity(config::GEAR_SEGMENT_GPIOS.len());
        for gpio in config::GEAR_SEGMENT_GPIOS {
            // SAFETY: pin numbers come from the fixed board map and are
            // not shared with any other driver.
            let mut pin = PinDriver::output(unsafe { AnyIOPin::new(gpio) })?;
            pin.set_low()?;
            segments.push(pin);
        }
        Ok(Self { segments })
    }
}

impl GearDisplay<'_> {
    /// Apply one digit to the display.
    pub fn show(&mut self, patterns: DigitPatterns) -> Result<()> {
        debug!(
            "Gear display: set {:#04x}, clear {:#04x}",
            patterns.set, patterns.clear
        );
        for (bit, pin) in self.segments.iter_mut().enumerate() {
            if patterns.set & (1u8 << bit) != 0 {
                pin.set_high()?;
            }
        }
        for (bit, pin) in self.segments.iter_mut().enumerate() {
            if patterns.clear & (1u8 << bit) != 0 {
                pin.set_low()?;
            }
        }
        Ok(())
    }
}
