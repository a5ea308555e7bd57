//! Per-instance control surface
//!
//! One [`FeSerial`] exists per bound register block. The register window and
//! the write counter sit behind a single lock: a `write` holds it for the
//! whole buffer, so concurrent writers never interleave on the wire and the
//! counter never loses an update.

use std::collections::TryReserveError;

use dddk_runtime::{CharDevice, DriverError, RegisterWindow, Result, UserSink, UserSource};
use log::debug;
use spin::Mutex;

use crate::config::TxWait;
use crate::uart;

/// ioctl: zero the write counter
pub const SERIAL_RESET_COUNTER: u32 = 0;
/// ioctl: copy the write counter out as a `u32`
pub const SERIAL_GET_COUNTER: u32 = 1;

/// Node name for the register block at physical `base`
pub fn device_name(prefix: &str, base: u64) -> core::result::Result<String, TryReserveError> {
    let digits = (u64::BITS - base.leading_zeros()).div_ceil(4).max(1);

    let mut name = String::new();
    name.try_reserve_exact(prefix.len() + 1 + digits as usize)?;
    name.push_str(prefix);
    name.push('-');
    for nibble in (0..digits).rev() {
        let digit = ((base >> (nibble * 4)) & 0xf) as u32;
        name.extend(char::from_digit(digit, 16));
    }
    Ok(name)
}

struct Inner<W> {
    /// `None` once the instance has been torn down
    regs: Option<W>,
    write_count: u32,
}

/// A bound serial port
pub struct FeSerial<W: RegisterWindow> {
    name: String,
    tx_wait: TxWait,
    inner: Mutex<Inner<W>>,
}

impl<W: RegisterWindow> FeSerial<W> {
    /// Wrap an already configured register window
    pub(crate) fn new(name: String, regs: W, tx_wait: TxWait) -> Self {
        Self {
            name,
            tx_wait,
            inner: Mutex::new(Inner {
                regs: Some(regs),
                write_count: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the register window away; later calls fail with `Removed`
    pub(crate) fn detach(&self) -> Option<W> {
        self.inner.lock().regs.take()
    }
}

fn transmit<W: RegisterWindow>(
    regs: &mut W,
    src: &dyn UserSource,
    tx_wait: TxWait,
    sent: &mut usize,
) -> Result<()> {
    while *sent < src.len() {
        let byte = src.fetch(*sent)?;
        uart::send_byte(regs, byte, tx_wait)?;
        *sent += 1;
    }
    Ok(())
}

impl<W: RegisterWindow> CharDevice for FeSerial<W> {
    /// Bytes already on the wire when a fault or timeout stops the transfer
    /// are still counted.
    fn write(&self, src: &dyn UserSource) -> Result<usize> {
        let mut inner = self.inner.lock();
        let Inner { regs, write_count } = &mut *inner;
        let regs = regs.as_mut().ok_or(DriverError::Removed)?;

        let mut sent = 0;
        let outcome = transmit(regs, src, self.tx_wait, &mut sent);
        *write_count = write_count.wrapping_add(sent as u32);

        if let Err(e) = &outcome {
            debug!("{}: write stopped after {} of {} bytes: {}", self.name, sent, src.len(), e);
        }
        outcome.map(|()| sent)
    }

    fn read(&self, _buf: &mut [u8]) -> Result<usize> {
        Err(DriverError::NotSupported)
    }

    fn ioctl(&self, request: u32, arg: &mut dyn UserSink) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.regs.is_none() {
            return Err(DriverError::Removed);
        }

        match request {
            SERIAL_RESET_COUNTER => {
                inner.write_count = 0;
                Ok(())
            }
            SERIAL_GET_COUNTER => {
                arg.put_u32(inner.write_count)?;
                Ok(())
            }
            _ => Err(DriverError::NoSuchDevice { request }),
        }
    }
}
