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

use libc::{self, c_int};
use std::io;
use std::result;

pub type Result<T> = result::Result<T, io::Error>;

#[cfg(target_env = "gnu")]
type IoctlLong = libc::c_ulong;
#[cfg(target_env = "musl")]
type IoctlLong = c_int;

// Request numbers used by the Ingenic PWM driver. These are legacy values
// that aren't encoded with the usual _IOC direction/type/size fields; the
// driver matches them verbatim, so they must be preserved as-is.
const PWM_CONFIG: IoctlLong = 0x001;
const PWM_CONFIG_DUTY: IoctlLong = 0x002;
const PWM_ENABLE: IoctlLong = 0x010;
const PWM_DISABLE: IoctlLong = 0x100;
const PWM_QUERY_STATUS: IoctlLong = 0x200;

/// Channel attribute record shared with the kernel driver.
///
/// Field order and width are part of the driver ABI. Don't reorder.
#[derive(Debug, Copy, Clone)]
#[repr(C)]
pub struct ChannelAttr {
    pub index: c_int,
    pub duty: c_int,
    pub period: c_int,
    pub polarity: c_int,
    pub enabled: c_int,
}

impl ChannelAttr {
    pub fn new(index: c_int) -> ChannelAttr {
        ChannelAttr {
            index,
            duty: 0,
            period: 0,
            polarity: 0,
            enabled: 0,
        }
    }
}

pub fn config(fd: c_int, attr: &ChannelAttr) -> Result<i32> {
    parse_retval!(unsafe { libc::ioctl(fd, PWM_CONFIG, attr) })
}

pub fn config_duty(fd: c_int, attr: &ChannelAttr) -> Result<i32> {
    parse_retval!(unsafe { libc::ioctl(fd, PWM_CONFIG_DUTY, attr) })
}

// Enable and disable take the raw channel index as the ioctl argument
// instead of a pointer to the attribute record.
pub fn enable(fd: c_int, index: c_int) -> Result<i32> {
    parse_retval!(unsafe { libc::ioctl(fd, PWM_ENABLE, index) })
}

pub fn disable(fd: c_int, index: c_int) -> Result<i32> {
    parse_retval!(unsafe { libc::ioctl(fd, PWM_DISABLE, index) })
}

pub fn query_status(fd: c_int, attr: &mut ChannelAttr) -> Result<i32> {
    parse_retval!(unsafe { libc::ioctl(fd, PWM_QUERY_STATUS, attr) })
}
