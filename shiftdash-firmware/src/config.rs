//! Compile-time configuration for the dashboard PCB.
//!
//! Nothing here is adjustable at runtime: the GPIO map mirrors the board
//! layout and the tunables are fixed when the firmware is built.

use shiftdash_indicator_lib::{TachCalibration, ZoneConfig};

/// Tachometer signal from the ECU (rising edge per pulse).
pub const TACH_GPIO: i32 = 4;

/// Upshift paddle input (active low).
pub const PADDLE_UP_GPIO: i32 = 25;

/// Downshift paddle input (active low).
pub const PADDLE_DOWN_GPIO: i32 = 26;

/// Hall-effect sensor confirming an upshift completed (active low).
pub const CONFIRM_UP_GPIO: i32 = 32;

/// Hall-effect sensor confirming a downshift completed (active low).
pub const CONFIRM_DOWN_GPIO: i32 = 33;

/// Upshift relay drive output.
pub const RELAY_UP_GPIO: i32 = 16;

/// Downshift relay drive output.
pub const RELAY_DOWN_GPIO: i32 = 17;

/// Indicator strip SPI clock.
pub const STRIP_SCLK_GPIO: i32 = 14;

/// Indicator strip SPI data.
pub const STRIP_SDO_GPIO: i32 = 13;

/// 7-segment gear display outputs, one per segment bit of the digit
/// encoding tables (bit 0 first).
pub const GEAR_SEGMENT_GPIOS: [i32; 8] = [2, 5, 15, 18, 19, 21, 22, 23];

/// Rate of the free-running timer used to timestamp tach edges
/// (one tick per microsecond).
pub const CAPTURE_TICK_HZ: u32 = 1_000_000;

/// Firmware tunables, fixed at build time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strip brightness (0-255), applied after gamma correction.
    pub brightness: u8,
    /// Half-period of the shift-window flash: the strip toggles between
    /// all-red and dark at this rate.
    pub flash_period_ms: u64,
    pub zones: ZoneConfig,
    pub tach: TachCalibration,
}

const fn default_brightness() -> u8 {
    25
}

const fn default_flash_period_ms() -> u64 {
    70
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            flash_period_ms: default_flash_period_ms(),
            zones: ZoneConfig::default(),
            tach: TachCalibration {
                timer_hz: CAPTURE_TICK_HZ,
                pulses_per_rev: 8,
            },
        }
    }
}
