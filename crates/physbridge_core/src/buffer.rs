//! # Commands Buffer
//!
//! Cursor based binary channel shared by the caller and the backend.
//!
//! ## Layout
//!
//! ```text
//! [u16 command count][u8 operator][u16 command][payload]...
//! ```
//!
//! - All values are little-endian and fixed width
//! - Optional payload fields carry a 1-byte presence flag (0 absent, 1 present)
//! - Large data (meshes, height samples) travels in [`AuxBuffers`] and is
//!   referenced by index from the byte stream
//!
//! Reads never panic. A read past the end returns the zero value of the
//! type, flags the buffer as overrun and logs a warning once.

use crate::auxiliary::AuxBuffers;
use crate::math::{Quat, Vec3};

/// Size of the leading command counter.
pub const HEADER_SIZE: usize = 2;

/// Default capacity of a fresh commands buffer, in bytes.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// A fixed width value that can travel through a [`CommandsBuffer`].
pub trait WireValue: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Value returned when a read goes out of bounds.
    const ZERO: Self;

    /// Encodes into `out`, which is exactly `SIZE` bytes long.
    fn encode(self, out: &mut [u8]);

    /// Decodes from `bytes`, which is exactly `SIZE` bytes long.
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! impl_wire_number {
    ($($ty:ty),*) => {
        $(
            impl WireValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                const ZERO: Self = 0 as $ty;

                #[inline]
                fn encode(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_wire_number!(u8, u16, u32, i32, f32);

impl WireValue for bool {
    const SIZE: usize = 1;
    const ZERO: Self = false;

    #[inline]
    fn encode(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl WireValue for Vec3 {
    const SIZE: usize = 12;
    const ZERO: Self = Vec3::ZERO;

    fn encode(self, out: &mut [u8]) {
        self.x.encode(&mut out[0..4]);
        self.y.encode(&mut out[4..8]);
        self.z.encode(&mut out[8..12]);
    }

    fn decode(bytes: &[u8]) -> Self {
        Vec3::new(
            f32::decode(&bytes[0..4]),
            f32::decode(&bytes[4..8]),
            f32::decode(&bytes[8..12]),
        )
    }
}

impl WireValue for Quat {
    const SIZE: usize = 16;
    const ZERO: Self = Quat::new(0.0, 0.0, 0.0, 0.0);

    fn encode(self, out: &mut [u8]) {
        self.x.encode(&mut out[0..4]);
        self.y.encode(&mut out[4..8]);
        self.z.encode(&mut out[8..12]);
        self.w.encode(&mut out[12..16]);
    }

    fn decode(bytes: &[u8]) -> Self {
        Quat::new(
            f32::decode(&bytes[0..4]),
            f32::decode(&bytes[4..8]),
            f32::decode(&bytes[8..12]),
            f32::decode(&bytes[12..16]),
        )
    }
}

/// Position and counter captured before a record is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    cursor: usize,
    commands_count: u16,
}

/// Growable or fixed binary channel with a single read/write cursor.
///
/// The same type is used on both sides: the caller writes commands and
/// hands the bytes over, the backend attaches them and reads the records
/// back in write order.
#[derive(Debug)]
pub struct CommandsBuffer {
    /// Backing storage. Its length is the capacity.
    bytes: Vec<u8>,
    /// Current read/write position.
    cursor: usize,
    /// Commands written since the last reset.
    commands_count: u16,
    /// Whether the backing storage may be reallocated.
    allow_growth: bool,
    /// Set once a command has been written.
    dirty: bool,
    /// Set when a read went out of bounds.
    overrun: bool,
    /// The out of bounds warning is logged once per buffer.
    warned: bool,
    /// Large side buffers referenced by index.
    aux: AuxBuffers,
}

impl CommandsBuffer {
    /// Creates a growable buffer with the given initial capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_growth(capacity, true)
    }

    /// Creates a buffer that refuses to grow past `capacity`.
    #[must_use]
    pub fn fixed(capacity: usize) -> Self {
        Self::with_growth(capacity, false)
    }

    /// Creates a buffer with explicit growth policy.
    #[must_use]
    pub fn with_growth(capacity: usize, allow_growth: bool) -> Self {
        Self {
            bytes: vec![0u8; capacity.max(HEADER_SIZE)],
            cursor: HEADER_SIZE,
            commands_count: 0,
            allow_growth,
            dirty: false,
            overrun: false,
            warned: false,
            aux: AuxBuffers::default(),
        }
    }

    /// Wraps bytes received from the other side, ready for reading.
    ///
    /// Input shorter than the header is zero padded and reads as empty.
    #[must_use]
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        pad_header(&mut bytes);
        let mut buffer = Self {
            bytes,
            cursor: HEADER_SIZE,
            commands_count: 0,
            allow_growth: true,
            dirty: false,
            overrun: false,
            warned: false,
            aux: AuxBuffers::default(),
        };
        buffer.commands_count = buffer.header_count();
        buffer
    }

    /// Replaces the backing storage with bytes received from the other side
    /// and rewinds for reading. Returns the previous storage.
    pub fn attach(&mut self, mut bytes: Vec<u8>) -> Vec<u8> {
        pad_header(&mut bytes);
        let previous = std::mem::replace(&mut self.bytes, bytes);
        self.cursor = HEADER_SIZE;
        self.dirty = false;
        self.overrun = false;
        self.warned = false;
        self.commands_count = self.header_count();
        previous
    }

    /// Total capacity of the backing storage.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Current cursor position.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes between the cursor and the end of the storage.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    /// Number of commands recorded in the header.
    #[inline]
    #[must_use]
    pub fn commands_count(&self) -> u16 {
        self.header_count()
    }

    /// True once a command has been written since the last reset.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True when the buffer allows reallocation.
    #[inline]
    #[must_use]
    pub const fn allows_growth(&self) -> bool {
        self.allow_growth
    }

    /// True when a read went past the end since the last reset.
    #[inline]
    #[must_use]
    pub const fn has_overrun(&self) -> bool {
        self.overrun
    }

    /// Returns the written portion, header included.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.cursor]
    }

    /// Takes the backing storage for transfer, leaving an empty buffer of
    /// the same policy behind.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        let bytes = std::mem::take(&mut self.bytes);
        self.bytes = vec![0u8; HEADER_SIZE];
        self.reset();
        bytes
    }

    /// Consumes the buffer and returns its storage.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Side buffers attached to this commands buffer.
    #[inline]
    #[must_use]
    pub const fn aux(&self) -> &AuxBuffers {
        &self.aux
    }

    /// Mutable access to the side buffers.
    #[inline]
    pub fn aux_mut(&mut self) -> &mut AuxBuffers {
        &mut self.aux
    }

    /// Appends a large side buffer and returns the index to write on the wire.
    pub fn add_buffer(&mut self, buffer: Vec<u8>) -> u32 {
        self.aux.push(buffer)
    }

    /// Takes every side buffer, leaving the list empty.
    pub fn take_aux(&mut self) -> AuxBuffers {
        std::mem::take(&mut self.aux)
    }

    /// Replaces the side buffer list.
    pub fn set_aux(&mut self, aux: AuxBuffers) {
        self.aux = aux;
    }

    /// Rewinds the cursor and clears the counter without reallocating.
    pub fn reset(&mut self) {
        self.cursor = HEADER_SIZE;
        self.commands_count = 0;
        self.dirty = false;
        self.overrun = false;
        self.warned = false;
        self.write_header(0);
    }

    /// Captures the cursor and counter so a partial record can be undone.
    #[inline]
    #[must_use]
    pub const fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            cursor: self.cursor,
            commands_count: self.commands_count,
        }
    }

    /// Drops everything written after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        if checkpoint.cursor > self.cursor {
            return;
        }
        self.cursor = checkpoint.cursor;
        self.commands_count = checkpoint.commands_count;
        self.write_header(self.commands_count);
        self.dirty = self.commands_count > 0;
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Writes a value without a presence flag.
    ///
    /// Returns false if the buffer is fixed and full.
    #[inline]
    pub fn write<T: WireValue>(&mut self, value: T) -> bool {
        if !self.can_write(T::SIZE) {
            return false;
        }
        value.encode(&mut self.bytes[self.cursor..self.cursor + T::SIZE]);
        self.cursor += T::SIZE;
        true
    }

    /// Writes an optional value behind a presence flag.
    ///
    /// `None` writes a single zero byte, `Some` writes `1` then the value.
    #[inline]
    pub fn write_opt<T: WireValue>(&mut self, value: Option<T>) -> bool {
        match value {
            Some(value) => self.write(1u8) && self.write(value),
            None => self.write(0u8),
        }
    }

    /// Writes a bare presence flag.
    #[inline]
    pub fn write_flag(&mut self, present: bool) -> bool {
        self.write(u8::from(present))
    }

    /// Writes an operator byte.
    #[inline]
    pub fn write_operator(&mut self, operator: u8) -> bool {
        self.write(operator)
    }

    /// Writes a command code and bumps the leading counter.
    pub fn write_command(&mut self, command: u16) -> bool {
        if !self.write(command) {
            return false;
        }
        self.commands_count = self.commands_count.wrapping_add(1);
        self.write_header(self.commands_count);
        self.dirty = true;
        true
    }

    /// Writes a zero placeholder and returns its offset for later patching.
    pub fn reserve_offset<T: WireValue>(&mut self) -> Option<usize> {
        let offset = self.cursor;
        self.write(T::ZERO).then_some(offset)
    }

    /// Overwrites a previously reserved placeholder.
    pub fn write_reserved<T: WireValue>(&mut self, value: T, offset: usize) -> bool {
        let end = offset + T::SIZE;
        if end > self.cursor {
            tracing::warn!("Commands buffer: reserved write at {} past cursor {}", offset, self.cursor);
            return false;
        }
        value.encode(&mut self.bytes[offset..end]);
        true
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Reads a value without a presence flag.
    ///
    /// Returns the zero value if the read would go out of bounds.
    #[inline]
    pub fn read<T: WireValue>(&mut self) -> T {
        if self.cursor + T::SIZE > self.bytes.len() {
            self.mark_overrun(T::SIZE);
            return T::ZERO;
        }
        let value = T::decode(&self.bytes[self.cursor..self.cursor + T::SIZE]);
        self.cursor += T::SIZE;
        value
    }

    /// Reads a presence flag and, if set, the value behind it.
    #[inline]
    pub fn read_opt<T: WireValue>(&mut self) -> Option<T> {
        if self.read_flag() {
            Some(self.read())
        } else {
            None
        }
    }

    /// Reads a bare presence flag.
    #[inline]
    pub fn read_flag(&mut self) -> bool {
        self.read::<u8>() != 0
    }

    /// Reads an operator byte.
    #[inline]
    pub fn read_operator(&mut self) -> u8 {
        self.read()
    }

    /// Reads a command code.
    #[inline]
    pub fn read_command(&mut self) -> u16 {
        self.read()
    }

    /// Advances the cursor without decoding.
    pub fn skip(&mut self, bytes: usize) {
        if self.cursor + bytes > self.bytes.len() {
            self.mark_overrun(bytes);
            self.cursor = self.bytes.len();
            return;
        }
        self.cursor += bytes;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn header_count(&self) -> u16 {
        if self.bytes.len() < HEADER_SIZE {
            return 0;
        }
        u16::decode(&self.bytes[..HEADER_SIZE])
    }

    fn write_header(&mut self, count: u16) {
        if self.bytes.len() >= HEADER_SIZE {
            count.encode(&mut self.bytes[..HEADER_SIZE]);
        }
    }

    fn can_write(&mut self, size: usize) -> bool {
        if self.cursor + size <= self.bytes.len() {
            return true;
        }
        if !self.allow_growth {
            if !self.warned {
                self.warned = true;
                tracing::warn!(
                    "Commands buffer: reached capacity of {} bytes and is not allowed to grow",
                    self.bytes.len()
                );
            }
            return false;
        }
        self.grow(size);
        true
    }

    fn grow(&mut self, size: usize) {
        let old = self.bytes.len();
        let required = self.cursor + size - old;
        let new_len = old + (old / 2).max(required);
        self.bytes.resize(new_len, 0);
        tracing::debug!("Commands buffer grew from {} to {} bytes", old, new_len);
    }

    fn mark_overrun(&mut self, size: usize) {
        self.overrun = true;
        if !self.warned {
            self.warned = true;
            tracing::warn!(
                "Commands buffer: aborting read of {} bytes at {} outside buffer of {} bytes",
                size,
                self.cursor,
                self.bytes.len()
            );
        }
    }
}

/// The cursor never starts past the end of the storage.
fn pad_header(bytes: &mut Vec<u8>) {
    if bytes.len() < HEADER_SIZE {
        bytes.resize(HEADER_SIZE, 0);
    }
}

impl Default for CommandsBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_values() {
        let mut buffer = CommandsBuffer::new(64);
        assert!(buffer.write_operator(3));
        assert!(buffer.write_command(700));
        assert!(buffer.write(42u32));
        assert!(buffer.write(-1.5f32));
        assert!(buffer.write(true));
        assert!(buffer.write(Vec3::new(1.0, 2.0, 3.0)));
        assert!(buffer.write(Quat::IDENTITY));

        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        assert_eq!(reader.commands_count(), 1);
        assert_eq!(reader.read_operator(), 3);
        assert_eq!(reader.read_command(), 700);
        assert_eq!(reader.read::<u32>(), 42);
        assert_eq!(reader.read::<f32>(), -1.5);
        assert!(reader.read::<bool>());
        assert_eq!(reader.read::<Vec3>(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(reader.read::<Quat>(), Quat::IDENTITY);
        assert!(!reader.has_overrun());
    }

    #[test]
    fn test_presence_flags() {
        let mut buffer = CommandsBuffer::new(16);
        buffer.write_opt(Some(7u16));
        buffer.write_opt::<u32>(None);
        assert_eq!(buffer.cursor(), HEADER_SIZE + 1 + 2 + 1);

        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        assert_eq!(reader.read_opt::<u16>(), Some(7));
        assert_eq!(reader.read_opt::<u32>(), None);
    }

    #[test]
    fn test_growth_keeps_bytes() {
        let mut buffer = CommandsBuffer::new(4);
        for i in 0..100u32 {
            assert!(buffer.write(i));
        }
        assert!(buffer.capacity() >= HEADER_SIZE + 400);

        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        for i in 0..100u32 {
            assert_eq!(reader.read::<u32>(), i);
        }
    }

    #[test]
    fn test_growth_policy() {
        let mut buffer = CommandsBuffer::new(100);
        buffer.skip(98);
        assert!(buffer.write(1u32));
        // old + max(old / 2, required)
        assert_eq!(buffer.capacity(), 150);
    }

    #[test]
    fn test_fixed_buffer_refuses() {
        let mut buffer = CommandsBuffer::fixed(6);
        assert!(buffer.write(1u32));
        assert!(!buffer.write(1u8));
        assert_eq!(buffer.capacity(), 6);
        assert_eq!(buffer.cursor(), 6);
    }

    #[test]
    fn test_read_out_of_bounds_returns_zero() {
        let mut reader = CommandsBuffer::from_bytes(vec![0, 0, 9]);
        assert_eq!(reader.read::<u8>(), 9);
        assert_eq!(reader.read::<u32>(), 0);
        assert_eq!(reader.read::<Vec3>(), Vec3::ZERO);
        assert!(reader.has_overrun());
        assert!(reader.cursor() <= reader.capacity());
    }

    #[test]
    fn test_reserve_then_patch() {
        let mut buffer = CommandsBuffer::new(32);
        let offset = buffer.reserve_offset::<u32>().unwrap();
        buffer.write(1u8);
        buffer.write(2u8);
        assert!(buffer.write_reserved(2u32, offset));

        let mut reader = CommandsBuffer::from_bytes(buffer.into_bytes());
        assert_eq!(reader.read::<u32>(), 2);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut buffer = CommandsBuffer::new(8);
        for _ in 0..10 {
            buffer.write_operator(1);
            buffer.write_command(5);
        }
        let capacity = buffer.capacity();
        assert!(buffer.is_dirty());
        assert_eq!(buffer.commands_count(), 10);

        buffer.reset();
        assert_eq!(buffer.capacity(), capacity);
        assert_eq!(buffer.cursor(), HEADER_SIZE);
        assert_eq!(buffer.commands_count(), 0);
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn test_rollback_drops_partial_record() {
        let mut buffer = CommandsBuffer::fixed(12);
        buffer.write_operator(1);
        buffer.write_command(110);
        buffer.write(4u32);
        let checkpoint = buffer.checkpoint();

        buffer.write_operator(1);
        assert!(buffer.write_command(101));
        assert!(!buffer.write(5u32));
        buffer.rollback(checkpoint);

        assert_eq!(buffer.commands_count(), 1);
        assert_eq!(buffer.cursor(), 9);
    }

    #[test]
    fn test_short_input_reads_as_empty() {
        for bytes in [Vec::new(), vec![7u8]] {
            let mut reader = CommandsBuffer::from_bytes(bytes.clone());
            assert_eq!(reader.commands_count(), 0);
            assert!(reader.cursor() <= reader.capacity());
            assert_eq!(reader.as_slice().len(), HEADER_SIZE);
            assert_eq!(reader.read::<u8>(), 0);
            assert!(reader.has_overrun());

            let mut attached = CommandsBuffer::new(32);
            attached.attach(bytes);
            assert_eq!(attached.commands_count(), 0);
            assert_eq!(attached.remaining(), 0);
            assert_eq!(attached.as_slice().len(), HEADER_SIZE);
        }
    }

    #[test]
    fn test_warning_rearms_after_reset_and_attach() {
        let mut buffer = CommandsBuffer::fixed(4);
        assert!(!buffer.write(Vec3::ONE));
        assert!(buffer.warned);
        buffer.reset();
        assert!(!buffer.warned);

        assert_eq!(buffer.read::<Vec3>(), Vec3::ZERO);
        assert!(buffer.warned);
        buffer.attach(vec![0u8; 8]);
        assert!(!buffer.warned);
        assert!(!buffer.has_overrun());
    }

    #[test]
    fn test_skip_past_end_clamps() {
        let mut reader = CommandsBuffer::from_bytes(vec![0u8; 8]);
        reader.skip(100);
        assert_eq!(reader.cursor(), 8);
        assert!(reader.has_overrun());
    }
}
