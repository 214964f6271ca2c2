//! Interrupt-driven event sources
//!
//! Three producers feed the background loop: the tach capture edge, the
//! flash-phase timer alarm, and the paddle/sensor input edges. Producers
//! only touch the atomics in [`DashboardSignals`] — except the paddle
//! and sensor handlers, which also drive the shift relays directly so a
//! pull reaches the gearbox within an interrupt's latency. Everything
//! else happens in the consumer loop.

use core::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, Input, InterruptType, Output, PinDriver, Pull};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::timer::config::Config as TimerConfig;
use esp_idf_hal::timer::{Timer, TimerDriver};
use esp_idf_sys::{
    esp, esp_timer_get_time, gpio_install_isr_service, gpio_isr_handler_add, gpio_set_level,
};
use log::info;
use shiftdash_gearbox_lib::ShiftDirection;

use crate::config;
use crate::config::Config;

static SIGNALS: DashboardSignals = DashboardSignals::new();

/// The shared signal block, one per system.
pub fn signals() -> &'static DashboardSignals {
    &SIGNALS
}

/// State shared between interrupt producers and the consumer loop.
///
/// Each flag is raised in exactly one producer and lowered in exactly
/// one place (the consumer's load-and-clear), so an update can never be
/// lost or torn. A fresh capture overwrites the pending one rather than
/// queueing: the consumer only ever cares about the newest interval.
pub struct DashboardSignals {
    last_edge_ticks: AtomicU32,
    edge_seen: AtomicBool,
    capture_ticks: AtomicU32,
    speed_ready: AtomicBool,
    flash_on: AtomicBool,
    confirm_up: AtomicBool,
    confirm_down: AtomicBool,
}

impl DashboardSignals {
    const fn new() -> Self {
        Self {
            last_edge_ticks: AtomicU32::new(0),
            edge_seen: AtomicBool::new(false),
            capture_ticks: AtomicU32::new(0),
            speed_ready: AtomicBool::new(false),
            flash_on: AtomicBool::new(false),
            confirm_up: AtomicBool::new(false),
            confirm_down: AtomicBool::new(false),
        }
    }

    fn publish_capture(&self, ticks: u32) {
        self.capture_ticks.store(ticks, Ordering::Relaxed);
        self.speed_ready.store(true, Ordering::Release);
    }

    /// Claim the pending capture sample, if any.
    ///
    /// A capture landing between the flag claim and the sample load only
    /// makes the returned interval fresher; it can never be stale.
    pub fn take_speed_sample(&self) -> Option<u32> {
        if self.speed_ready.swap(false, Ordering::Acquire) {
            Some(self.capture_ticks.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    fn toggle_flash(&self) {
        self.flash_on.fetch_xor(true, Ordering::Relaxed);
    }

    /// Current phase of the shift-window flash.
    pub fn flash_phase(&self) -> bool {
        self.flash_on.load(Ordering::Relaxed)
    }

    fn confirm_flag(&self, direction: ShiftDirection) -> &AtomicBool {
        match direction {
            ShiftDirection::Up => &self.confirm_up,
            ShiftDirection::Down => &self.confirm_down,
        }
    }

    fn raise_confirm(&self, direction: ShiftDirection) {
        self.confirm_flag(direction).store(true, Ordering::Release);
    }

    /// Claim a pending shift confirmation for one direction.
    pub fn take_confirm(&self, direction: ShiftDirection) -> bool {
        self.confirm_flag(direction).swap(false, Ordering::Acquire)
    }
}

/// Tach edge: timestamp it and publish the distance to the previous
/// edge. The first edge after reset only seeds the timestamp, leaving
/// the zero "no pulse observed" sentinel in place for the estimator.
unsafe extern "C" fn on_tach_edge(_arg: *mut c_void) {
    // Truncated to 32 bits; interval arithmetic wraps correctly as long
    // as consecutive pulses are less than ~71 minutes apart.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let now = esp_timer_get_time() as u32;
    let last = SIGNALS.last_edge_ticks.swap(now, Ordering::Relaxed);
    if SIGNALS.edge_seen.swap(true, Ordering::Relaxed) {
        SIGNALS.publish_capture(now.wrapping_sub(last));
    }
}

unsafe extern "C" fn on_paddle_up(_arg: *mut c_void) {
    gpio_set_level(config::RELAY_UP_GPIO, 1);
    gpio_set_level(config::RELAY_DOWN_GPIO, 0);
}

unsafe extern "C" fn on_paddle_down(_arg: *mut c_void) {
    gpio_set_level(config::RELAY_DOWN_GPIO, 1);
    gpio_set_level(config::RELAY_UP_GPIO, 0);
}

unsafe extern "C" fn on_confirm_up(_arg: *mut c_void) {
    gpio_set_level(config::RELAY_UP_GPIO, 0);
    gpio_set_level(config::RELAY_DOWN_GPIO, 0);
    SIGNALS.raise_confirm(ShiftDirection::Up);
}

unsafe extern "C" fn on_confirm_down(_arg: *mut c_void) {
    gpio_set_level(config::RELAY_UP_GPIO, 0);
    gpio_set_level(config::RELAY_DOWN_GPIO, 0);
    SIGNALS.raise_confirm(ShiftDirection::Down);
}

/// Installed event sources. Holding this keeps the pin and timer
/// drivers (and with them the interrupt wiring) alive.
pub struct EventSources {
    _tach: PinDriver<'static, AnyIOPin, Input>,
    _paddle_up: PinDriver<'static, AnyIOPin, Input>,
    _paddle_down: PinDriver<'static, AnyIOPin, Input>,
    _confirm_up: PinDriver<'static, AnyIOPin, Input>,
    _confirm_down: PinDriver<'static, AnyIOPin, Input>,
    _relay_up: PinDriver<'static, AnyIOPin, Output>,
    _relay_down: PinDriver<'static, AnyIOPin, Output>,
    _flash_timer: TimerDriver<'static>,
}

/// Configure an input pin and hook its edge interrupt to a raw handler.
fn edge_input(
    gpio: i32,
    pull: Pull,
    edge: InterruptType,
    handler: unsafe extern "C" fn(*mut c_void),
) -> Result<PinDriver<'static, AnyIOPin, Input>> {
    // SAFETY: pin numbers come from the fixed board map and are not
    // shared with any other driver.
    let mut pin = PinDriver::input(unsafe { AnyIOPin::new(gpio) })?;
    pin.set_pull(pull)?;
    pin.set_interrupt_type(edge)?;
    esp!(unsafe { gpio_isr_handler_add(gpio, Some(handler), ptr::null_mut()) })?;
    Ok(pin)
}

fn relay_output(gpio: i32) -> Result<PinDriver<'static, AnyIOPin, Output>> {
    // SAFETY: as above; the same pins are later written from ISR context
    // through the ISR-safe raw GPIO call.
    let mut pin = PinDriver::output(unsafe { AnyIOPin::new(gpio) })?;
    pin.set_low()?;
    Ok(pin)
}

/// Bring up all event sources: relay outputs (de-energized), the tach
/// capture edge, the paddle and confirm sensor edges, and the
/// flash-phase timer.
pub fn install<T: Timer>(
    flash_timer: impl Peripheral<P = T> + 'static,
    cfg: &Config,
) -> Result<EventSources> {
    esp!(unsafe { gpio_install_isr_service(0) })?;

    // Relays first: no input edge may fire before its actuation target
    // is a driven output.
    let relay_up = relay_output(config::RELAY_UP_GPIO)?;
    let relay_down = relay_output(config::RELAY_DOWN_GPIO)?;

    let tach = edge_input(
        config::TACH_GPIO,
        Pull::Floating,
        InterruptType::PosEdge,
        on_tach_edge,
    )?;
    let paddle_up = edge_input(
        config::PADDLE_UP_GPIO,
        Pull::Up,
        InterruptType::NegEdge,
        on_paddle_up,
    )?;
    let paddle_down = edge_input(
        config::PADDLE_DOWN_GPIO,
        Pull::Up,
        InterruptType::NegEdge,
        on_paddle_down,
    )?;
    let confirm_up = edge_input(
        config::CONFIRM_UP_GPIO,
        Pull::Up,
        InterruptType::NegEdge,
        on_confirm_up,
    )?;
    let confirm_down = edge_input(
        config::CONFIRM_DOWN_GPIO,
        Pull::Up,
        InterruptType::NegEdge,
        on_confirm_down,
    )?;

    // Auto-reload re-arms the alarm from the previous compare value in
    // hardware, so the flash phase cannot drift against wall-clock.
    let mut timer = TimerDriver::new(flash_timer, &TimerConfig::new().auto_reload(true))?;
    timer.set_alarm(timer.tick_hz() / 1000 * cfg.flash_period_ms)?;
    // SAFETY: the callback only toggles an atomic.
    unsafe {
        timer.subscribe(|| SIGNALS.toggle_flash())?;
    }
    timer.enable_interrupt()?;
    timer.enable_alarm(true)?;
    timer.enable(true)?;

    info!(
        "Event sources installed (tach GPIO {}, flash period {} ms)",
        config::TACH_GPIO,
        cfg.flash_period_ms
    );

    Ok(EventSources {
        _tach: tach,
        _paddle_up: paddle_up,
        _paddle_down: paddle_down,
        _confirm_up: confirm_up,
        _confirm_down: confirm_down,
        _relay_up: relay_up,
        _relay_down: relay_down,
        _flash_timer: timer,
    })
}
