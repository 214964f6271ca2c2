use anyhow::Result;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::prelude::*;
use log::{info, warn};

mod config;
mod dashboard;
mod events;
mod gear_display;
mod strip;

use config::Config;
use gear_display::GearDisplay;
use strip::LedController;

fn main() -> Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Starting shiftdash firmware...");

    let peripherals = Peripherals::take()?;
    let config = Config::default();
    info!(
        "Indicator: {} segments, graduation ceiling {} RPM, {} tach pulses/rev",
        config.zones.total_leds(),
        config.zones.graduation_ceiling(),
        config.tach.pulses_per_rev,
    );

    let baked = shiftdash_indicator_lib::bake_zones(&config.zones);

    // SAFETY: strip pins come from the fixed board map and are not
    // shared with any other driver.
    let sclk = unsafe { AnyIOPin::new(config::STRIP_SCLK_GPIO) };
    let sdo = unsafe { AnyIOPin::new(config::STRIP_SDO_GPIO) };
    let mut leds = LedController::new(
        peripherals.spi2,
        sclk,
        sdo,
        config.zones.total_leds(),
        config.brightness,
    )?;

    // Boot animation: blink purple 3 times
    if let Err(e) = leds.boot_animation() {
        warn!("Boot animation failed: {e}");
    }

    let display = GearDisplay::new()?;

    let _event_sources = events::install(peripherals.timer00, &config)?;

    info!("All systems running!");

    dashboard::run(
        peripherals.twdt,
        events::signals(),
        leds,
        display,
        config.tach,
        &baked,
    )
}
