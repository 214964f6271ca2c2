//! Indicator strip rendering logic for ShiftDash
//!
//! This library converts captured tachometer pulse intervals into engine
//! RPM and maps the RPM onto a zoned RGB indicator strip (graduated fill
//! below the shift window, full-strip flash inside it). It is
//! hardware-agnostic and can be tested without embedded hardware.

pub use rgb::RGB8;
use serde::{Deserialize, Serialize};

/// Tachometer calibration (serialized to storage / diagnostic dumps).
///
/// `timer_hz` is the rate of the capture timer that timestamps pulse
/// edges; `pulses_per_rev` is the tach-pulses-per-revolution setting of
/// the ECU.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TachCalibration {
    /// Capture timer rate in ticks per second.
    pub timer_hz: u32,
    /// Tach pulses per crankshaft revolution (ECU engine setup value).
    pub pulses_per_rev: u32,
}

impl Default for TachCalibration {
    fn default() -> Self {
        Self {
            // One tick per microsecond, the rate of the free-running
            // capture timer in the firmware.
            timer_hz: 1_000_000,
            pulses_per_rev: 8,
        }
    }
}

impl TachCalibration {
    /// Convert a captured inter-pulse interval to engine RPM.
    ///
    /// An interval of zero is the "no valid pulse observed" sentinel and
    /// maps to 0 RPM (engine stopped or signal lost) rather than an
    /// error. The math runs in `u64`: intervals range from a handful of
    /// ticks near redline to millions at idle, and the numerator
    /// `timer_hz * 60` alone overflows `u32`.
    #[must_use]
    pub fn rpm_from_interval(&self, interval_ticks: u32) -> u32 {
        let pulse_ticks = u64::from(interval_ticks) * u64::from(self.pulses_per_rev);
        if pulse_ticks == 0 {
            return 0;
        }
        let rpm = u64::from(self.timer_hz) * 60 / pulse_ticks;
        u32::try_from(rpm).unwrap_or(u32::MAX)
    }
}

/// Zone layout and thresholds for the indicator strip (serialized to
/// storage / diagnostic dumps).
///
/// Segments are colored once at bake time: the first `green_leds` are
/// green, the next `yellow_leds` yellow, the remaining `red_leds` red.
/// The graduated display saturates at `max_rpm - redline_margin`; the
/// margin above that is the flashing shift window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub green_leds: usize,
    pub yellow_leds: usize,
    pub red_leds: usize,
    /// Engine maximum (redline) in RPM.
    pub max_rpm: u32,
    /// Width of the shift window below `max_rpm`, in RPM.
    #[serde(default = "default_redline_margin")]
    pub redline_margin: u32,
    #[serde(default = "default_green")]
    pub green: RGB8,
    #[serde(default = "default_yellow")]
    pub yellow: RGB8,
    #[serde(default = "default_red")]
    pub red: RGB8,
}

const fn default_redline_margin() -> u32 {
    1500
}

const fn default_green() -> RGB8 {
    RGB8::new(0, 255, 0)
}

const fn default_yellow() -> RGB8 {
    RGB8::new(255, 255, 0)
}

const fn default_red() -> RGB8 {
    RGB8::new(255, 0, 0)
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            green_leds: 18,
            yellow_leds: 6,
            red_leds: 6,
            max_rpm: 12_000,
            redline_margin: default_redline_margin(),
            green: default_green(),
            yellow: default_yellow(),
            red: default_red(),
        }
    }
}

impl ZoneConfig {
    /// Total number of strip segments across all zones.
    #[must_use]
    pub fn total_leds(&self) -> usize {
        self.green_leds + self.yellow_leds + self.red_leds
    }

    /// RPM at which the graduated display is fully lit. Above this the
    /// strip is in the flashing shift window.
    #[must_use]
    pub fn graduation_ceiling(&self) -> u32 {
        self.max_rpm.saturating_sub(self.redline_margin)
    }
}

/// Zone configuration baked for per-frame rendering.
///
/// Created once at startup by [`bake_zones`]; holds the per-segment zone
/// color so the render path is a slice copy, not a zone lookup.
#[derive(Debug, Clone)]
pub struct BakedStrip {
    colors: Vec<RGB8>,
    ceiling_rpm: u32,
    alert: RGB8,
}

impl BakedStrip {
    #[must_use]
    pub fn total_leds(&self) -> usize {
        self.colors.len()
    }
}

/// Bake a zone configuration into a per-segment color table.
///
/// Call once when configuration is loaded; pass the result to
/// [`render_indicator`] on every frame. Segment colors never change
/// after this point.
#[must_use]
pub fn bake_zones(config: &ZoneConfig) -> BakedStrip {
    let mut colors = Vec::with_capacity(config.total_leds());
    colors.extend(std::iter::repeat(config.green).take(config.green_leds));
    colors.extend(std::iter::repeat(config.yellow).take(config.yellow_leds));
    colors.extend(std::iter::repeat(config.red).take(config.red_leds));
    BakedStrip {
        colors,
        ceiling_rpm: config.graduation_ceiling(),
        alert: config.red,
    }
}

/// Number of leading segments to light for an RPM value.
///
/// Counts above `total_leds()` signal the shift window rather than a
/// drawable fill; [`render_indicator`] switches regimes on that.
#[must_use]
pub fn compute_lit_count(rpm: u32, baked: &BakedStrip) -> usize {
    if baked.ceiling_rpm == 0 {
        // Degenerate config (margin >= max): every running RPM is in the
        // shift window.
        return if rpm == 0 { 0 } else { baked.total_leds() + 1 };
    }
    let scaled = u64::from(rpm) * baked.total_leds() as u64 / u64::from(baked.ceiling_rpm);
    usize::try_from(scaled).unwrap_or(usize::MAX)
}

/// One full rendering of the indicator strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorFrame {
    /// Color for every segment, in strip order.
    pub leds: Vec<RGB8>,
    /// Whether the frame was produced in the flashing shift window.
    pub redline: bool,
}

/// Compute the strip frame for an RPM value and flash phase.
///
/// Below the graduation ceiling the first [`compute_lit_count`] segments
/// take their baked zone colors and the rest stay dark. Above it the
/// whole strip is the alert color while `flash_on` holds and dark
/// otherwise, producing the shift-now flash at whatever rate the caller
/// toggles `flash_on` (the flash timer, not the RPM, sets that rate).
///
/// Pure: identical inputs produce identical frames.
#[must_use]
pub fn render_indicator(rpm: u32, flash_on: bool, baked: &BakedStrip) -> IndicatorFrame {
    let total = baked.total_leds();
    let lit = compute_lit_count(rpm, baked);

    if lit > total {
        let leds = if flash_on {
            vec![baked.alert; total]
        } else {
            vec![RGB8::default(); total]
        };
        return IndicatorFrame { leds, redline: true };
    }

    let mut leds = vec![RGB8::default(); total];
    leds[..lit].copy_from_slice(&baked.colors[..lit]);
    IndicatorFrame {
        leds,
        redline: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: RGB8 = RGB8::new(0, 255, 0);
    const YELLOW: RGB8 = RGB8::new(255, 255, 0);
    const RED: RGB8 = RGB8::new(255, 0, 0);
    const OFF: RGB8 = RGB8::new(0, 0, 0);

    /// Calibration matching a 48 MHz capture clock behind a /64 divider.
    fn legacy_calibration() -> TachCalibration {
        TachCalibration {
            timer_hz: 750_000,
            pulses_per_rev: 8,
        }
    }

    #[test]
    fn zero_interval_is_stopped_engine() {
        assert_eq!(legacy_calibration().rpm_from_interval(0), 0);
        assert_eq!(TachCalibration::default().rpm_from_interval(0), 0);
    }

    #[test]
    fn known_calibration_points() {
        let calib = legacy_calibration();
        // 750_000 * 60 / (1875 * 8) = 3000
        assert_eq!(calib.rpm_from_interval(1875), 3000);
        assert_eq!(calib.rpm_from_interval(3750), 1500);
        // Microsecond timer: 1250 µs between pulses at 8 per rev = 6000 RPM
        assert_eq!(TachCalibration::default().rpm_from_interval(1250), 6000);
    }

    #[test]
    fn rpm_decreases_as_interval_grows() {
        let calib = TachCalibration::default();
        let mut previous = u32::MAX;
        for interval in [1, 2, 10, 100, 1_000, 50_000, 2_000_000, u32::MAX] {
            let rpm = calib.rpm_from_interval(interval);
            assert!(
                rpm <= previous,
                "rpm {rpm} at interval {interval} exceeds {previous}"
            );
            previous = rpm;
        }
    }

    #[test]
    fn zero_pulses_per_rev_does_not_divide_by_zero() {
        let calib = TachCalibration {
            timer_hz: 1_000_000,
            pulses_per_rev: 0,
        };
        assert_eq!(calib.rpm_from_interval(1000), 0);
    }

    #[test]
    fn default_zones_layout() {
        let config = ZoneConfig::default();
        assert_eq!(config.total_leds(), 30);
        assert_eq!(config.graduation_ceiling(), 10_500);

        let baked = bake_zones(&config);
        assert_eq!(baked.total_leds(), 30);
    }

    #[test]
    fn baked_colors_follow_zone_boundaries() {
        let baked = bake_zones(&ZoneConfig::default());
        let frame = render_indicator(10_500, false, &baked);
        // 18 green, 6 yellow, 6 red
        assert_eq!(frame.leds[0], GREEN);
        assert_eq!(frame.leds[17], GREEN);
        assert_eq!(frame.leds[18], YELLOW);
        assert_eq!(frame.leds[23], YELLOW);
        assert_eq!(frame.leds[24], RED);
        assert_eq!(frame.leds[29], RED);
    }

    #[test]
    fn lit_count_monotonic_in_rpm() {
        let baked = bake_zones(&ZoneConfig::default());
        let mut previous = 0;
        for rpm in (0..=13_000).step_by(50) {
            let lit = compute_lit_count(rpm, &baked);
            assert!(lit >= previous, "lit count regressed at {rpm} RPM");
            previous = lit;
        }
    }

    /// Zero sample end to end: stopped engine renders a dark strip.
    #[test]
    fn stopped_engine_clears_strip() {
        let baked = bake_zones(&ZoneConfig::default());
        let rpm = TachCalibration::default().rpm_from_interval(0);
        assert_eq!(rpm, 0);
        assert_eq!(compute_lit_count(rpm, &baked), 0);

        let frame = render_indicator(rpm, true, &baked);
        assert!(!frame.redline);
        assert!(frame.leds.iter().all(|&led| led == OFF));
    }

    /// Halfway up the graduated range lights half the strip.
    #[test]
    fn half_ceiling_lights_half_the_strip() {
        let config = ZoneConfig::default();
        let baked = bake_zones(&config);
        let frame = render_indicator(config.graduation_ceiling() / 2, false, &baked);

        assert!(!frame.redline);
        assert_eq!(compute_lit_count(config.graduation_ceiling() / 2, &baked), 15);
        for (i, &led) in frame.leds.iter().enumerate() {
            if i < 15 {
                assert_ne!(led, OFF, "segment {i} should be lit");
            } else {
                assert_eq!(led, OFF, "segment {i} should be dark");
            }
        }
    }

    #[test]
    fn graduated_regime_holds_through_the_ceiling() {
        let config = ZoneConfig::default();
        let baked = bake_zones(&config);
        let ceiling = config.graduation_ceiling();

        // Just below the ceiling: not yet fully lit.
        assert_eq!(compute_lit_count(ceiling - 1, &baked), 29);
        assert!(!render_indicator(ceiling - 1, true, &baked).redline);

        // At the ceiling: fully lit, still graduated.
        assert_eq!(compute_lit_count(ceiling, &baked), 30);
        let frame = render_indicator(ceiling, true, &baked);
        assert!(!frame.redline);
        assert!(frame.leds.iter().all(|&led| led != OFF));
    }

    #[test]
    fn shift_window_starts_above_the_ceiling() {
        let config = ZoneConfig::default();
        let baked = bake_zones(&config);

        // First RPM whose scaled count exceeds the strip: ceil(31 * 10500 / 30).
        let first_redline = (31 * config.graduation_ceiling()).div_ceil(30);
        assert_eq!(compute_lit_count(first_redline - 1, &baked), 30);
        assert!(compute_lit_count(first_redline, &baked) > 30);
        assert!(render_indicator(first_redline, true, &baked).redline);
    }

    /// Shift window: flash phase selects between all-red and all-dark.
    #[test]
    fn shift_window_flashes_full_strip() {
        let baked = bake_zones(&ZoneConfig::default());

        let on = render_indicator(12_000, true, &baked);
        assert!(on.redline);
        assert_eq!(on.leds.len(), 30);
        assert!(on.leds.iter().all(|&led| led == RED));

        let off = render_indicator(12_000, false, &baked);
        assert!(off.redline);
        assert!(off.leds.iter().all(|&led| led == OFF));
    }

    #[test]
    fn rendering_is_idempotent() {
        let baked = bake_zones(&ZoneConfig::default());
        for rpm in [0, 4_000, 10_500, 12_500] {
            for flash_on in [false, true] {
                let first = render_indicator(rpm, flash_on, &baked);
                let second = render_indicator(rpm, flash_on, &baked);
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn degenerate_ceiling_is_all_shift_window() {
        let config = ZoneConfig {
            max_rpm: 1000,
            redline_margin: 1500,
            ..ZoneConfig::default()
        };
        assert_eq!(config.graduation_ceiling(), 0);

        let baked = bake_zones(&config);
        assert_eq!(compute_lit_count(0, &baked), 0);
        assert!(render_indicator(1, true, &baked).redline);
    }
}
