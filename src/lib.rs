//! `ingenic-pwm` controls the hardware PWM channels found on Ingenic SoCs
//! (T10/T20/T31 and similar) through the kernel PWM driver's ioctl interface
//! on `/dev/pwm`.
//!
//! The [`pwm`] module provides the library interface: a [`pwm::Pwm`] handle
//! that owns the device node and pushes period, duty cycle, polarity and
//! enable state to the driver one attribute at a time, matching the driver's
//! contract. The `ingenic-pwm` binary is a thin command-line front-end over
//! this module.
//!
//! `ingenic-pwm` requires a Linux kernel with the Ingenic PWM driver enabled.
//! Both `gnu` and `musl` libc targets are supported.

#[macro_use]
mod macros;

pub mod pwm;
