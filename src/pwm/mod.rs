// Copyright (c) 2023-2024 the ingenic-pwm developers
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Interface for the Ingenic PWM controller.
//!
//! The controller exposes up to eight channels through a single character
//! device, `/dev/pwm`. Each attribute (period, duty cycle, polarity, enable
//! state) is pushed to the driver with a separate ioctl call; there is no
//! atomic apply. [`Pwm`] mirrors that contract: one handle per channel,
//! one method per attribute.
//!
//! ## Troubleshooting
//!
//! ### No such file or directory
//!
//! If [`Pwm::new`] fails with a [`DeviceAccess`] error wrapping
//! `io::ErrorKind::NotFound`, the PWM driver isn't loaded. Make sure the
//! kernel was built with the Ingenic PWM driver enabled, or load the
//! module before running the tool.
//!
//! ### Permission denied
//!
//! `/dev/pwm` is usually owned by root. Either run the tool as root, or
//! add a udev rule that relaxes the device node's permissions.
//!
//! [`DeviceAccess`]: enum.Error.html

use std::error;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use libc::c_int;

mod ioctl;

const PATH_PWM: &str = "/dev/pwm";

/// Number of PWM channels exposed by the controller.
pub const CHANNELS: u8 = 8;

// Delay between successive duty cycle writes while ramping. The driver
// applies each write immediately; the delay paces the hardware.
const RAMP_DELAY: Duration = Duration::from_millis(50);

/// Errors that can occur when accessing the PWM controller.
#[derive(Debug)]
pub enum Error {
    /// IO error.
    Io(io::Error),
    /// Unable to open the PWM device node.
    DeviceAccess(io::Error),
    /// Invalid channel index.
    InvalidChannel(u8),
    /// A period must be configured before the duty cycle can be ramped.
    MissingPeriod,
    /// Ramping requires both a minimum and a maximum duty cycle.
    MissingDutyBounds,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "IO error: {}", err),
            Error::DeviceAccess(ref err) => write!(
                f,
                "unable to open {} (make sure the PWM driver is enabled): {}",
                PATH_PWM, err
            ),
            Error::InvalidChannel(channel) => write!(
                f,
                "invalid PWM channel: {} (valid channels are 0-{})",
                channel,
                CHANNELS - 1
            ),
            Error::MissingPeriod => {
                write!(f, "a valid period must be specified for ramping")
            }
            Error::MissingDutyBounds => {
                write!(
                    f,
                    "both a minimum and a maximum duty cycle must be specified for ramping"
                )
            }
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `pwm::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// Output polarities.
///
/// The discriminants match the driver's encoding.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Polarity {
    Inversed = 0,
    Normal = 1,
}

impl Polarity {
    fn from_raw(value: c_int) -> Polarity {
        if value == 0 {
            Polarity::Inversed
        } else {
            Polarity::Normal
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Polarity::Inversed => write!(f, "Inversed"),
            Polarity::Normal => write!(f, "Normal"),
        }
    }
}

/// Snapshot of a channel's configuration, as reported by the driver.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Status {
    pub channel: u8,
    pub enabled: bool,
    pub polarity: Polarity,
    pub duty_ns: i32,
    pub period_ns: i32,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PWM Channel {} Status:", self.channel)?;
        writeln!(
            f,
            "Enabled: {}",
            if self.enabled { "Enabled" } else { "Disabled" }
        )?;
        writeln!(f, "Polarity: {}", self.polarity)?;
        writeln!(f, "Duty: {} ns", self.duty_ns)?;
        write!(f, "Period: {} ns", self.period_ns)
    }
}

// Duty cycle sequence for a ramp. Ascending from min to max when the step is
// positive, descending from max to min when it's negative. Both bounds are
// inclusive. Arithmetic is done in i64 so a step close to i32::MAX can't
// wrap around.
#[derive(Debug)]
struct RampSteps {
    current: i64,
    end: i64,
    step: i64,
}

impl RampSteps {
    fn new(step: i32, min_duty: i32, max_duty: i32) -> RampSteps {
        if step >= 0 {
            RampSteps {
                current: i64::from(min_duty),
                end: i64::from(max_duty),
                step: i64::from(step),
            }
        } else {
            RampSteps {
                current: i64::from(max_duty),
                end: i64::from(min_duty),
                step: i64::from(step),
            }
        }
    }
}

impl Iterator for RampSteps {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.step == 0
            || (self.step > 0 && self.current > self.end)
            || (self.step < 0 && self.current < self.end)
        {
            return None;
        }

        let duty = self.current;
        self.current += self.step;
        Some(duty as i32)
    }
}

/// Provides access to a single channel of the Ingenic PWM controller.
///
/// The device node is opened when the handle is constructed and closed when
/// it's dropped. Every ioctl failure is propagated; the caller decides which
/// failures are fatal.
#[derive(Debug)]
pub struct Pwm {
    device: File,
    attr: ioctl::ChannelAttr,
    // A configured period of 0 ns is valid, so presence is tracked
    // separately from the attribute record.
    period_set: bool,
}

impl Pwm {
    /// Constructs a new `Pwm` for the selected channel.
    ///
    /// The channel index is validated before the device node is touched.
    pub fn new(channel: u8) -> Result<Pwm> {
        if channel >= CHANNELS {
            return Err(Error::InvalidChannel(channel));
        }

        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(PATH_PWM)
            .map_err(Error::DeviceAccess)?;

        Ok(Pwm {
            device,
            attr: ioctl::ChannelAttr::new(c_int::from(channel)),
            period_set: false,
        })
    }

    /// Returns the selected channel.
    pub fn channel(&self) -> u8 {
        self.attr.index as u8
    }

    /// Sets the period in nanoseconds.
    pub fn set_period(&mut self, period_ns: i32) -> Result<()> {
        self.attr.period = period_ns;
        ioctl::config(self.device.as_raw_fd(), &self.attr)?;
        self.period_set = true;

        Ok(())
    }

    /// Sets the duty cycle in nanoseconds.
    pub fn set_duty(&mut self, duty_ns: i32) -> Result<()> {
        self.attr.duty = duty_ns;
        ioctl::config_duty(self.device.as_raw_fd(), &self.attr)?;

        Ok(())
    }

    /// Sets the polarity.
    pub fn set_polarity(&mut self, polarity: Polarity) -> Result<()> {
        self.attr.polarity = polarity as c_int;
        ioctl::config(self.device.as_raw_fd(), &self.attr)?;

        Ok(())
    }

    /// Enables the channel.
    pub fn enable(&mut self) -> Result<()> {
        ioctl::enable(self.device.as_raw_fd(), self.attr.index)?;

        Ok(())
    }

    /// Disables the channel.
    pub fn disable(&mut self) -> Result<()> {
        ioctl::disable(self.device.as_raw_fd(), self.attr.index)?;

        Ok(())
    }

    /// Queries the channel's current configuration.
    pub fn status(&self) -> Result<Status> {
        // The driver only reads the index and populates the other fields.
        let mut attr = ioctl::ChannelAttr::new(self.attr.index);
        ioctl::query_status(self.device.as_raw_fd(), &mut attr)?;

        Ok(Status {
            channel: attr.index as u8,
            enabled: attr.enabled != 0,
            polarity: Polarity::from_raw(attr.polarity),
            duty_ns: attr.duty,
            period_ns: attr.period,
        })
    }

    /// Ramps the duty cycle between `min_duty` and `max_duty` in steps of
    /// `|step|` nanoseconds, writing a new duty cycle every 50 ms.
    ///
    /// A positive `step` ramps up from `min_duty` to `max_duty`; a negative
    /// `step` ramps down from `max_duty` to `min_duty`. A period must have
    /// been set on this handle first. The loop checks `running` before every
    /// step, so a signal handler can stop a long ramp between writes.
    pub fn ramp(
        &mut self,
        step: i32,
        min_duty: i32,
        max_duty: i32,
        running: &AtomicBool,
    ) -> Result<()> {
        if !self.period_set {
            return Err(Error::MissingPeriod);
        }

        for duty in RampSteps::new(step, min_duty, max_duty) {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            self.attr.duty = duty;
            ioctl::config_duty(self.device.as_raw_fd(), &self.attr)?;
            thread::sleep(RAMP_DELAY);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_ascends_from_min_to_max_inclusive() {
        let steps: Vec<i32> = RampSteps::new(500, 1000, 5000).collect();
        assert_eq!(
            steps,
            [1000, 1500, 2000, 2500, 3000, 3500, 4000, 4500, 5000]
        );
    }

    #[test]
    fn ramp_descends_from_max_to_min_inclusive() {
        let steps: Vec<i32> = RampSteps::new(-500, 1000, 5000).collect();
        assert_eq!(
            steps,
            [5000, 4500, 4000, 3500, 3000, 2500, 2000, 1500, 1000]
        );
    }

    #[test]
    fn ramp_overshoots_stop_at_the_bound() {
        let steps: Vec<i32> = RampSteps::new(3000, 1000, 5000).collect();
        assert_eq!(steps, [1000, 4000]);
    }

    #[test]
    fn ramp_with_zero_step_issues_nothing() {
        assert_eq!(RampSteps::new(0, 1000, 5000).count(), 0);
    }

    #[test]
    fn ramp_with_inverted_bounds_issues_nothing() {
        assert_eq!(RampSteps::new(500, 5000, 1000).count(), 0);
        assert_eq!(RampSteps::new(-500, 5000, 1000).count(), 0);
    }

    #[test]
    fn ramp_with_large_step_does_not_wrap() {
        let steps: Vec<i32> = RampSteps::new(i32::MAX, 0, i32::MAX).collect();
        assert_eq!(steps, [0, i32::MAX]);
    }

    #[test]
    fn out_of_range_channel_is_rejected_before_device_access() {
        // Must fail with InvalidChannel even on hosts without /dev/pwm.
        match Pwm::new(CHANNELS) {
            Err(Error::InvalidChannel(channel)) => assert_eq!(channel, CHANNELS),
            other => panic!("expected InvalidChannel, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn polarity_follows_driver_encoding() {
        assert_eq!(Polarity::Inversed as c_int, 0);
        assert_eq!(Polarity::Normal as c_int, 1);
        assert_eq!(Polarity::from_raw(0), Polarity::Inversed);
        assert_eq!(Polarity::from_raw(1), Polarity::Normal);
        // The driver reports any non-zero value as normal polarity.
        assert_eq!(Polarity::from_raw(2), Polarity::Normal);
    }

    #[test]
    fn status_report_format() {
        let status = Status {
            channel: 3,
            enabled: true,
            polarity: Polarity::Inversed,
            duty_ns: 2500,
            period_ns: 10000,
        };

        assert_eq!(
            status.to_string(),
            "PWM Channel 3 Status:\n\
             Enabled: Enabled\n\
             Polarity: Inversed\n\
             Duty: 2500 ns\n\
             Period: 10000 ns"
        );
    }
}
