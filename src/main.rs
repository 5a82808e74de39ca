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

use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use log::debug;
use simple_signal::{self, Signal};

use ingenic_pwm::pwm::{self, Polarity, Pwm, CHANNELS};

/// Control utility for the Ingenic SoC PWM controller
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// PWM channel number
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(..CHANNELS as i64))]
    channel: u8,

    /// Query channel state
    #[arg(short, long)]
    query: bool,

    /// Enable channel
    #[arg(short, long)]
    enable: bool,

    /// Disable channel
    #[arg(short, long)]
    disable: bool,

    /// Set polarity (0: Inversed, 1: Normal)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(..=1))]
    polarity: Option<u8>,

    /// Set duty cycle in ns
    #[arg(short = 'D', long, value_name = "DUTY_NS", value_parser = clap::value_parser!(i32).range(0..))]
    duty: Option<i32>,

    /// Set period in ns
    #[arg(short = 'P', long, value_name = "PERIOD_NS", value_parser = clap::value_parser!(i32).range(0..))]
    period: Option<i32>,

    /// Ramp the duty cycle (positive step: ramp up, negative step: ramp down)
    #[arg(short, long, value_name = "STEP_NS", allow_negative_numbers = true)]
    ramp: Option<i32>,

    /// Max duty for ramping, in ns
    #[arg(short = 'x', long, value_name = "MAX_DUTY_NS", value_parser = clap::value_parser!(i32).range(0..))]
    max_duty: Option<i32>,

    /// Min duty for ramping, in ns
    #[arg(short = 'n', long, value_name = "MIN_DUTY_NS", value_parser = clap::value_parser!(i32).range(0..))]
    min_duty: Option<i32>,
}

#[derive(Debug, PartialEq, Eq)]
struct RampArgs {
    step: i32,
    min_duty: i32,
    max_duty: i32,
}

// Ramp parameters are validated up front so a bad invocation fails before
// the device is opened or any other flag is applied.
fn validate_ramp(args: &Args) -> Result<Option<RampArgs>, pwm::Error> {
    let Some(step) = args.ramp else {
        return Ok(None);
    };

    if args.period.is_none() {
        return Err(pwm::Error::MissingPeriod);
    }

    let (Some(min_duty), Some(max_duty)) = (args.min_duty, args.max_duty) else {
        return Err(pwm::Error::MissingDutyBounds);
    };

    Ok(Some(RampArgs {
        step,
        min_duty,
        max_duty,
    }))
}

// Applies the set flags in a fixed order, one ioctl-backed call per flag:
// period, duty, polarity, enable, disable, query, ramp. A failed query is
// reported but doesn't abort the invocation; every other failure does.
fn apply(args: &Args, ramp: Option<RampArgs>) -> pwm::Result<()> {
    let mut pwm = Pwm::new(args.channel)?;

    if let Some(period) = args.period {
        debug!("setting period to {} ns", period);
        pwm.set_period(period)?;
    }

    if let Some(duty) = args.duty {
        debug!("setting duty cycle to {} ns", duty);
        pwm.set_duty(duty)?;
    }

    if let Some(polarity) = args.polarity {
        let polarity = if polarity == 0 {
            Polarity::Inversed
        } else {
            Polarity::Normal
        };
        debug!("setting polarity to {}", polarity);
        pwm.set_polarity(polarity)?;
    }

    if args.enable {
        debug!("enabling channel {}", pwm.channel());
        pwm.enable()?;
    }

    if args.disable {
        debug!("disabling channel {}", pwm.channel());
        pwm.disable()?;
    }

    if args.query {
        match pwm.status() {
            Ok(status) => println!("{}", status),
            Err(err) => eprintln!("Error querying PWM status: {}", err),
        }
    }

    if let Some(ramp) = ramp {
        let running = Arc::new(AtomicBool::new(true));

        // Let SIGINT (Ctrl-C) and SIGTERM stop the ramp between duty cycle
        // writes instead of killing the process mid-ramp.
        simple_signal::set_handler(&[Signal::Int, Signal::Term], {
            let running = running.clone();
            move |_| {
                running.store(false, Ordering::SeqCst);
            }
        });

        debug!(
            "ramping duty cycle between {} ns and {} ns in steps of {} ns",
            ramp.min_duty, ramp.max_duty, ramp.step
        );
        pwm.ramp(ramp.step, ramp.min_duty, ramp.max_duty, &running)?;
    }

    Ok(())
}

fn main() {
    env_logger::init();

    // Running without any arguments prints usage and exits cleanly, like
    // the original vendor tool.
    if env::args().len() == 1 {
        let _ = Args::command().print_help();
        return;
    }

    let args = Args::parse();

    let ramp = match validate_ramp(&args) {
        Ok(ramp) => ramp,
        Err(err) => {
            println!("Error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = apply(&args, ramp) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(argv)
    }

    #[test]
    fn channel_is_required() {
        assert!(parse(&["ingenic-pwm", "--query"]).is_err());
    }

    #[test]
    fn help_flag_exits_cleanly() {
        // clap maps DisplayHelp to exit code 0.
        let err = parse(&["ingenic-pwm", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        assert!(parse(&["ingenic-pwm", "-c", "8"]).is_err());
        assert!(parse(&["ingenic-pwm", "--channel", "255"]).is_err());
        assert!(parse(&["ingenic-pwm", "-c", "7"]).is_ok());
    }

    #[test]
    fn out_of_range_polarity_is_rejected() {
        assert!(parse(&["ingenic-pwm", "-c", "0", "-p", "2"]).is_err());
        assert!(parse(&["ingenic-pwm", "-c", "0", "-p", "1"]).is_ok());
    }

    #[test]
    fn negative_duty_and_period_are_rejected() {
        assert!(parse(&["ingenic-pwm", "-c", "0", "--duty=-100"]).is_err());
        assert!(parse(&["ingenic-pwm", "-c", "0", "--period=-100"]).is_err());
    }

    #[test]
    fn negative_ramp_step_parses() {
        let args = parse(&["ingenic-pwm", "-c", "0", "-r", "-500"]).unwrap();
        assert_eq!(args.ramp, Some(-500));
    }

    #[test]
    fn ramp_without_period_is_rejected() {
        let args = parse(&[
            "ingenic-pwm",
            "-c",
            "0",
            "-r",
            "500",
            "-n",
            "1000",
            "-x",
            "5000",
        ])
        .unwrap();
        assert!(matches!(
            validate_ramp(&args),
            Err(pwm::Error::MissingPeriod)
        ));
    }

    #[test]
    fn ramp_without_duty_bounds_is_rejected() {
        let args = parse(&["ingenic-pwm", "-c", "0", "-r", "500", "-P", "20000"]).unwrap();
        assert!(matches!(
            validate_ramp(&args),
            Err(pwm::Error::MissingDutyBounds)
        ));
    }

    #[test]
    fn ramp_with_zero_period_is_accepted() {
        // A period of 0 ns is a valid configuration; only an omitted
        // --period rejects a ramp.
        let args = parse(&[
            "ingenic-pwm",
            "-c",
            "0",
            "-P",
            "0",
            "-r",
            "500",
            "-n",
            "0",
            "-x",
            "1000",
        ])
        .unwrap();

        assert_eq!(
            validate_ramp(&args).unwrap(),
            Some(RampArgs {
                step: 500,
                min_duty: 0,
                max_duty: 1000,
            })
        );
    }

    #[test]
    fn ramp_with_period_and_bounds_is_accepted() {
        let args = parse(&[
            "ingenic-pwm",
            "-c",
            "0",
            "-r",
            "500",
            "-P",
            "20000",
            "-n",
            "1000",
            "-x",
            "5000",
        ])
        .unwrap();

        assert_eq!(
            validate_ramp(&args).unwrap(),
            Some(RampArgs {
                step: 500,
                min_duty: 1000,
                max_duty: 5000,
            })
        );
    }

    #[test]
    fn no_ramp_flag_means_no_ramp() {
        let args = parse(&["ingenic-pwm", "-c", "0", "-e"]).unwrap();
        assert_eq!(validate_ramp(&args).unwrap(), None);
    }

    #[test]
    fn enable_and_disable_may_be_combined() {
        let args = parse(&["ingenic-pwm", "-c", "0", "-e", "-d"]).unwrap();
        assert!(args.enable);
        assert!(args.disable);
    }
}
