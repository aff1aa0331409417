//! # Auxiliary Buffers
//!
//! Large buffers (vertex positions, indices, height samples, debug
//! vertices) that travel next to a commands buffer instead of being
//! copied inline. The byte stream refers to them by index.

use crate::error::{BufferError, BufferResult};

/// Ordered list of side buffers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuxBuffers {
    buffers: Vec<Vec<u8>>,
}

impl AuxBuffers {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffers: Vec::new() }
    }

    /// Wraps buffers received from the other side.
    #[must_use]
    pub fn from_vec(buffers: Vec<Vec<u8>>) -> Self {
        Self { buffers }
    }

    /// Appends a buffer and returns its wire index.
    pub fn push(&mut self, buffer: Vec<u8>) -> u32 {
        let index = u32::try_from(self.buffers.len()).unwrap_or(u32::MAX);
        self.buffers.push(buffer);
        index
    }

    /// Number of buffers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// True if there are no buffers.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Drops every buffer.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Consumes the list.
    #[must_use]
    pub fn into_vec(self) -> Vec<Vec<u8>> {
        self.buffers
    }

    /// Raw bytes of a buffer.
    pub fn get(&self, index: u32) -> BufferResult<&[u8]> {
        self.buffers
            .get(index as usize)
            .map(Vec::as_slice)
            .ok_or(BufferError::MissingAuxBuffer(index))
    }

    /// Reads `count` native-endian `f32` values starting at `byte_offset`.
    ///
    /// A `count` of zero reads to the end of the buffer.
    pub fn f32_values(&self, index: u32, byte_offset: usize, count: usize) -> BufferResult<Vec<f32>> {
        let bytes = self.slice(index, byte_offset, count, 4)?;
        Ok(bytemuck::pod_collect_to_vec::<u8, f32>(bytes))
    }

    /// Reads `count` index values starting at `byte_offset`.
    ///
    /// Indices are 16-bit unless `wide` is set.
    pub fn index_values(
        &self,
        index: u32,
        byte_offset: usize,
        count: usize,
        wide: bool,
    ) -> BufferResult<Vec<u32>> {
        if wide {
            let bytes = self.slice(index, byte_offset, count, 4)?;
            Ok(bytemuck::pod_collect_to_vec::<u8, u32>(bytes))
        } else {
            let bytes = self.slice(index, byte_offset, count, 2)?;
            Ok(bytemuck::pod_collect_to_vec::<u8, u16>(bytes)
                .into_iter()
                .map(u32::from)
                .collect())
        }
    }

    /// Iterates over the buffers in index order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.buffers.iter().map(Vec::as_slice)
    }

    fn slice(&self, index: u32, byte_offset: usize, count: usize, width: usize) -> BufferResult<&[u8]> {
        let bytes = self.get(index)?;
        if byte_offset > bytes.len() {
            return Err(BufferError::MalformedAuxBuffer {
                index,
                reason: format!("offset {byte_offset} past length {}", bytes.len()),
            });
        }
        let tail = &bytes[byte_offset..];
        let wanted = if count == 0 { tail.len() / width * width } else { count * width };
        if wanted > tail.len() {
            return Err(BufferError::MalformedAuxBuffer {
                index,
                reason: format!("need {wanted} bytes, have {}", tail.len()),
            });
        }
        Ok(&tail[..wanted])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read_floats() {
        let mut aux = AuxBuffers::new();
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
        let index = aux.push(bytemuck::cast_slice(&data).to_vec());
        assert_eq!(index, 0);

        assert_eq!(aux.f32_values(0, 0, 0).unwrap(), data);
        assert_eq!(aux.f32_values(0, 4, 2).unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_narrow_indices() {
        let mut aux = AuxBuffers::new();
        let indices: Vec<u16> = vec![0, 1, 2, 2, 1, 3];
        aux.push(bytemuck::cast_slice(&indices).to_vec());
        assert_eq!(aux.index_values(0, 0, 6, false).unwrap(), vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_missing_and_short_buffers() {
        let mut aux = AuxBuffers::new();
        assert_eq!(aux.get(3), Err(BufferError::MissingAuxBuffer(3)));

        aux.push(vec![0u8; 6]);
        assert!(matches!(
            aux.f32_values(0, 0, 2),
            Err(BufferError::MalformedAuxBuffer { index: 0, .. })
        ));
    }
}
