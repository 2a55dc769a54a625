//! # Status Indicator Module
//!
//! Drives a PWM LED from the GPS fix quality. Purely an output: nothing here
//! feeds back into the store or the uplink.
//!
//! - No fix data: off
//! - Receiver talking but no valid fix: slow dim blink
//! - Valid fix: brightness grows with satellites in use

use tracing::trace;

use crate::gps::Fix;

/// Full-scale PWM duty
pub const PWM_MAX: u16 = 1023;

/// Duty of the "searching" blink
pub const DUTY_SEARCHING: u16 = 64;

/// Minimum duty with a valid fix
pub const DUTY_FIX_FLOOR: u16 = 256;

/// Satellite count at which brightness saturates
pub const SATELLITES_FULL_SCALE: u8 = 12;

/// Ticks per half period of the searching blink
pub const BLINK_HALF_PERIOD_TICKS: u32 = 4;

/// LED collaborator
pub trait StatusLed {
    /// Set PWM duty (0 = off, `PWM_MAX` = full brightness)
    fn set_duty(&mut self, duty: u16);
}

/// Duty for a valid fix with `satellites` in use
pub fn fix_duty(satellites: u8) -> u16 {
    let sats = satellites.min(SATELLITES_FULL_SCALE) as u32;
    let span = (PWM_MAX - DUTY_FIX_FLOOR) as u32;
    DUTY_FIX_FLOOR + (span * sats / SATELLITES_FULL_SCALE as u32) as u16
}

/// Maps fix quality to LED duty, writing only on change
pub struct StatusIndicator<L> {
    led: L,
    duty: Option<u16>,
    ticks: u32,
}

impl<L: StatusLed> StatusIndicator<L> {
    pub fn new(led: L) -> Self {
        Self { led, duty: None, ticks: 0 }
    }

    /// Advance one tick with the latest known fix
    ///
    /// # Returns
    ///
    /// * `u16` - Duty now shown on the LED
    pub fn update(&mut self, fix: Option<&Fix>) -> u16 {
        let duty = match fix {
            None => 0,
            Some(f) if f.valid => fix_duty(f.satellites),
            Some(_) => {
                let lit = (self.ticks / BLINK_HALF_PERIOD_TICKS) % 2 == 0;
                if lit { DUTY_SEARCHING } else { 0 }
            }
        };
        self.ticks = self.ticks.wrapping_add(1);

        if self.duty != Some(duty) {
            trace!("Status LED duty {} -> {}", self.duty.unwrap_or(0), duty);
            self.led.set_duty(duty);
            self.duty = Some(duty);
        }
        duty
    }

    pub fn duty(&self) -> u16 {
        self.duty.unwrap_or(0)
    }

    pub fn led(&self) -> &L {
        &self.led
    }
}

/// LED stand-in for hosts without PWM hardware: logs duty changes
#[derive(Debug, Default)]
pub struct LogLed;

impl StatusLed for LogLed {
    fn set_duty(&mut self, duty: u16) {
        tracing::debug!("Status LED duty {}/{}", duty, PWM_MAX);
    }
}
