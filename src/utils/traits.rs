use std::ops::Range;

use crate::utils::error::{ApngError, ApngResult};

pub(crate) trait SafeAccess<T> {
    fn get_safe(&self, index: usize) -> ApngResult<&T>;
    fn get_range_safe(&self, range: Range<usize>) -> ApngResult<&[T]>;
}

impl<T> SafeAccess<T> for [T] {
    /// Retrieves the element at `index`.
    ///
    /// # Errors
    ///
    /// [`ApngError::MalformedStream`] if the index is out of bounds.
    fn get_safe(&self, index: usize) -> ApngResult<&T> {
        self.get(index).ok_or_else(|| {
            ApngError::MalformedStream(format!("Index {} out of bounds (len {})", index, self.len()))
        })
    }

    /// Retrieves the elements in `range`.
    ///
    /// # Errors
    ///
    /// [`ApngError::MalformedStream`] if the range is inverted or ends past the slice.
    fn get_range_safe(&self, range: Range<usize>) -> ApngResult<&[T]> {
        self.get(range.clone()).ok_or_else(|| {
            ApngError::MalformedStream(format!(
                "Range {}..{} out of bounds (len {})",
                range.start,
                range.end,
                self.len()
            ))
        })
    }
}

/// Big-endian field access into a chunk payload.
pub(crate) trait BigEndianFields {
    fn u8_at(&self, offset: usize) -> ApngResult<u8>;
    fn u16_at(&self, offset: usize) -> ApngResult<u16>;
    fn u32_at(&self, offset: usize) -> ApngResult<u32>;
}

impl BigEndianFields for [u8] {
    fn u8_at(&self, offset: usize) -> ApngResult<u8> {
        self.get_safe(offset).copied()
    }

    fn u16_at(&self, offset: usize) -> ApngResult<u16> {
        let bytes = self.get_range_safe(offset..offset + 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32_at(&self, offset: usize) -> ApngResult<u32> {
        let bytes = self.get_range_safe(offset..offset + 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
