//! SK9822 indicator strip driver and controller
//!
//! The strip speaks an APA102-style bit-serial protocol over SPI: a
//! 32-bit zero start frame, one `[global, blue, green, red]` frame per
//! segment in strip order, then a zero end frame long enough to clock
//! the data through the whole daisy chain. A full-strip write is atomic
//! from the caller's perspective.

use std::thread::sleep;
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::spi::config::Config as SpiConfig;
use esp_idf_hal::spi::{Dma, SpiAnyPins, SpiDeviceDriver, SpiDriver, SpiDriverConfig};
use esp_idf_hal::sys::EspError;
use esp_idf_hal::units::FromValueType;
use log::debug;
use shiftdash_indicator_lib::IndicatorFrame;
use smart_leds::{brightness, gamma, SmartLedsWrite, RGB8};

/// Per-segment frame header: three marker bits plus the 5-bit global
/// current field at maximum. Dimming is applied in the 8-bit color
/// domain before frames are built, not in the global field.
const LED_FRAME_HEADER: u8 = 0xFF;

/// Raw SK9822 bus driver.
pub struct Sk9822<'d> {
    spi: SpiDeviceDriver<'d, SpiDriver<'d>>,
}

impl Sk9822<'static> {
    pub fn new<S: SpiAnyPins>(
        spi: impl Peripheral<P = S> + 'static,
        sclk: impl Peripheral<P = impl OutputPin> + 'static,
        sdo: impl Peripheral<P = impl OutputPin> + 'static,
    ) -> Result<Self, EspError> {
        let spi = SpiDeviceDriver::new_single(
            spi,
            sclk,
            sdo,
            None::<AnyIOPin>,
            None::<AnyIOPin>,
            &SpiDriverConfig::new().dma(Dma::Auto(512)),
            // SK9822 parts clock well above this; 4 MHz keeps long
            // harness runs in a car reliable.
            &SpiConfig::new().baudrate(4.MHz().into()),
        )?;
        Ok(Self { spi })
    }
}

impl SmartLedsWrite for Sk9822<'_> {
    type Error = EspError;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        // Start frame
        let mut buf = vec![0u8; 4];
        let mut count = 0;
        for item in iterator {
            let color: RGB8 = item.into();
            buf.extend_from_slice(&[LED_FRAME_HEADER, color.b, color.g, color.r]);
            count += 1;
        }
        // End frame: 32 zero bits plus one extra byte per 16 segments so
        // every segment in the chain latches.
        buf.resize(buf.len() + 4 + count / 16, 0);
        self.spi.write(&buf)
    }
}

/// Indicator strip controller: owns the bus driver, the configured
/// segment count and the brightness setting.
pub struct LedController<'d> {
    driver: Sk9822<'d>,
    total_leds: usize,
    brightness: u8,
}

impl LedController<'static> {
    pub fn new<S: SpiAnyPins>(
        spi: impl Peripheral<P = S> + 'static,
        sclk: impl Peripheral<P = impl OutputPin> + 'static,
        sdo: impl Peripheral<P = impl OutputPin> + 'static,
        total_leds: usize,
        brightness: u8,
    ) -> Result<Self> {
        debug!("Creating LED controller for {total_leds} segments at brightness {brightness}");
        Ok(Self {
            driver: Sk9822::new(spi, sclk, sdo)?,
            total_leds,
            brightness,
        })
    }
}

impl LedController<'_> {
    /// Turn every segment off.
    pub fn clear(&mut self) -> Result<()> {
        self.driver
            .write(std::iter::repeat(RGB8::default()).take(self.total_leds))?;
        Ok(())
    }

    /// Push one indicator frame to the strip.
    ///
    /// A full clear frame always goes out first, so every render is a
    /// complete refresh and a stale segment cannot survive a frame.
    pub fn render(&mut self, frame: &IndicatorFrame) -> Result<()> {
        self.clear()?;
        // Apply gamma correction first, then brightness reduction
        // as recommended by smart-leds docs
        self.driver
            .write(brightness(gamma(frame.leds.iter().copied()), self.brightness))?;
        Ok(())
    }

    /// Blink the whole strip purple 3 times (250ms each) as a boot indicator
    pub fn boot_animation(&mut self) -> Result<()> {
        let purple = RGB8::new(128, 0, 128);
        let blink_duration = Duration::from_millis(250);

        for _ in 0..3 {
            self.driver
                .write(std::iter::repeat(purple).take(self.total_leds))?;
            sleep(blink_duration);

            self.clear()?;
            sleep(blink_duration);
        }

        Ok(())
    }
}
