//! Copies across the user/kernel boundary
//!
//! Drivers never dereference caller memory directly. Bytes come in through a
//! [`UserSource`] and results go out through a [`UserSink`]; either side may
//! fault, and a fault is reported rather than skipped.

use thiserror::Error;

/// Inaccessible caller memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("user access fault at offset {offset}")]
pub struct UserFault {
    pub offset: usize,
}

/// Caller buffer the driver reads from
pub trait UserSource {
    /// Length the caller claims the buffer has
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy in the byte at `index`
    fn fetch(&self, index: usize) -> Result<u8, UserFault>;
}

/// Caller buffer that is already accessible, e.g. an in-kernel writer
#[derive(Debug, Clone, Copy)]
pub struct UserSlice<'a> {
    bytes: &'a [u8],
}

impl<'a> UserSlice<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl UserSource for UserSlice<'_> {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn fetch(&self, index: usize) -> Result<u8, UserFault> {
        self.bytes.get(index).copied().ok_or(UserFault { offset: index })
    }
}

/// Caller location the driver writes a result to
pub trait UserSink {
    /// Copy out a 32-bit value
    fn put_u32(&mut self, value: u32) -> Result<(), UserFault>;
}

impl UserSink for u32 {
    fn put_u32(&mut self, value: u32) -> Result<(), UserFault> {
        *self = value;
        Ok(())
    }
}

/// A possibly-null out pointer
impl UserSink for Option<&mut u32> {
    fn put_u32(&mut self, value: u32) -> Result<(), UserFault> {
        match self {
            Some(slot) => {
                **slot = value;
                Ok(())
            }
            None => Err(UserFault { offset: 0 }),
        }
    }
}

/// Argument for requests that consume none
#[derive(Debug, Default, Clone, Copy)]
pub struct NoArg;

impl UserSink for NoArg {
    fn put_u32(&mut self, _value: u32) -> Result<(), UserFault> {
        Err(UserFault { offset: 0 })
    }
}
