//! Small helpers shared by every payload encoder.
//!
//! Writers turn a refused write into [`ProtocolError::Overflow`] so that
//! payload code can use `?`. Readers never fail on their own; the command
//! decoder checks the buffer's overrun flag once the record is consumed.

use physbridge_core::{CommandsBuffer, WireValue};

use crate::error::{ProtocolError, ProtocolResult};

/// Writes a value without a presence flag.
#[inline]
pub(crate) fn put<T: WireValue>(buffer: &mut CommandsBuffer, value: T) -> ProtocolResult<()> {
    if buffer.write(value) {
        Ok(())
    } else {
        Err(ProtocolError::Overflow)
    }
}

/// Writes an optional value behind a presence flag.
#[inline]
pub(crate) fn put_opt<T: WireValue>(buffer: &mut CommandsBuffer, value: Option<T>) -> ProtocolResult<()> {
    if buffer.write_opt(value) {
        Ok(())
    } else {
        Err(ProtocolError::Overflow)
    }
}

/// Writes an enumeration as its `u8` value.
#[inline]
pub(crate) fn put_enum<T: Into<u8>>(buffer: &mut CommandsBuffer, value: T) -> ProtocolResult<()> {
    put(buffer, value.into())
}

/// Writes a collection length as `u32`.
#[inline]
pub(crate) fn put_len(buffer: &mut CommandsBuffer, len: usize) -> ProtocolResult<()> {
    let len = u32::try_from(len).map_err(|_| ProtocolError::Overflow)?;
    put(buffer, len)
}

/// Reads an enumeration, rejecting values outside its range.
#[inline]
pub(crate) fn take_enum<T>(buffer: &mut CommandsBuffer) -> ProtocolResult<T>
where
    T: TryFrom<u8, Error = ProtocolError>,
{
    T::try_from(buffer.read::<u8>())
}

/// Reads a `u32` collection length, capped by the bytes left in the buffer.
///
/// A corrupted length must not drive a huge allocation before the overrun
/// is noticed.
#[inline]
pub(crate) fn take_len(buffer: &mut CommandsBuffer, min_item_size: usize) -> ProtocolResult<usize> {
    let offset = buffer.cursor();
    let len = buffer.read::<u32>() as usize;
    if len.saturating_mul(min_item_size.max(1)) > buffer.remaining() {
        return Err(ProtocolError::Truncated { offset });
    }
    Ok(len)
}
