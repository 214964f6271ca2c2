//! Background consumer loop
//!
//! The only application thread. Each iteration drains the event flags:
//! a pending capture sample becomes one estimator → mapper → strip pass,
//! and a pending shift confirmation becomes one state-machine step plus
//! a gear display update. Both conditions are re-checked every
//! iteration, so neither path can starve the other.

use std::time::Duration;

use anyhow::Result;
use enumset::EnumSet;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::task::watchdog::{TWDTConfig, TWDTDriver, TWDT};
use log::{debug, info, warn};
use shiftdash_gearbox_lib::{digit_patterns, GearState, ShiftDirection, ShiftOutcome};
use shiftdash_indicator_lib::{render_indicator, BakedStrip, TachCalibration};

use crate::events::DashboardSignals;
use crate::gear_display::GearDisplay;
use crate::strip::LedController;

/// Watchdog timeout for the consumer loop.
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the dashboard loop. Never returns while the system is healthy.
pub fn run(
    twdt: impl Peripheral<P = TWDT> + 'static,
    signals: &'static DashboardSignals,
    mut leds: LedController<'static>,
    mut display: GearDisplay<'static>,
    calibration: TachCalibration,
    baked: &BakedStrip,
) -> Result<()> {
    let watchdog_config = TWDTConfig {
        duration: WATCHDOG_TIMEOUT,
        panic_on_trigger: true,
        subscribed_idle_tasks: EnumSet::empty(),
    };
    let mut twdt = TWDTDriver::new(twdt, &watchdog_config)?;
    let mut watchdog = twdt.watch_current_task()?;

    let mut gear = GearState::new();
    display.show(digit_patterns(gear.gear()))?;

    let mut last_rpm: Option<u32> = None;
    info!("Dashboard loop started in gear {}", gear.gear());

    loop {
        watchdog.feed()?;

        if let Some(interval) = signals.take_speed_sample() {
            let rpm = calibration.rpm_from_interval(interval);
            if last_rpm != Some(rpm) {
                debug!("RPM: {rpm}");
                last_rpm = Some(rpm);
            }
            let frame = render_indicator(rpm, signals.flash_phase(), baked);
            if let Err(e) = leds.render(&frame) {
                warn!("Indicator render failed: {e}");
            }
        }

        for direction in [ShiftDirection::Up, ShiftDirection::Down] {
            if signals.take_confirm(direction) {
                match gear.confirm_shift(direction) {
                    ShiftOutcome::Shifted(new_gear) => {
                        info!("Shift {direction:?} confirmed, now in gear {new_gear}");
                        if let Err(e) = display.show(digit_patterns(new_gear)) {
                            warn!("Gear display update failed: {e}");
                        }
                    }
                    ShiftOutcome::AtLimit(current) => {
                        debug!("Shift {direction:?} confirm ignored at gear {current}");
                    }
                }
            }
        }

        FreeRtos::delay_ms(1);
    }
}
