//! Base-128 varint I/O over a caller-owned byte region
//!
//! The writer tracks a cursor into a half-open `[0, len)` span. Every
//! failing operation leaves the cursor where it was, so batches can be
//! rolled back in O(1) by restoring a checkpoint.

use bytes::{Buf, BufMut};

use crate::{Result, StrataError};

/// Longest base-128 encoding of a u64 (ten 7-bit groups)
pub const MAX_VARINT_LEN: usize = 10;

/// Reserved fixed-width slot, written post-hoc via [`VarintWriter::patch_u16`]
#[derive(Debug, Clone, Copy)]
pub struct U16Slot {
    offset: usize,
}

/// Varint encoder over a borrowed byte region
#[derive(Debug)]
pub struct VarintWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> VarintWriter<'a> {
    /// Create a writer positioned at the start of `buf`
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Encode `value` as base-128 groups, least significant first, with the
    /// continuation bit set on every byte but the last
    pub fn put(&mut self, mut value: u64) -> Result<()> {
        let mut end = self.pos;
        loop {
            if end == self.buf.len() {
                return Err(StrataError::OutOfSpace);
            }
            if value >= 0x80 {
                self.buf[end] = (value as u8 & 0x7f) | 0x80;
                value >>= 7;
                end += 1;
            } else {
                self.buf[end] = value as u8;
                end += 1;
                break;
            }
        }
        self.pos = end;
        Ok(())
    }

    /// Encode a batch of varints; on failure the cursor is restored and
    /// nothing is considered written
    pub fn tput(&mut self, values: &[u64]) -> Result<()> {
        let cp = self.checkpoint();
        for &value in values {
            if let Err(e) = self.put(value) {
                self.rollback(cp);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Snapshot the cursor for a later [`VarintWriter::rollback`]
    pub fn checkpoint(&self) -> usize {
        self.pos
    }

    /// Restore the cursor to an earlier checkpoint
    pub fn rollback(&mut self, checkpoint: usize) {
        debug_assert!(checkpoint <= self.pos);
        self.pos = checkpoint;
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        if self.space_left() < 1 {
            return Err(StrataError::OutOfSpace);
        }
        self.buf[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        if self.space_left() < 2 {
            return Err(StrataError::OutOfSpace);
        }
        let mut dst = &mut self.buf[self.pos..];
        dst.put_u16_le(value);
        self.pos += 2;
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        if self.space_left() < 4 {
            return Err(StrataError::OutOfSpace);
        }
        let mut dst = &mut self.buf[self.pos..];
        dst.put_u32_le(value);
        self.pos += 4;
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        if self.space_left() < 8 {
            return Err(StrataError::OutOfSpace);
        }
        let mut dst = &mut self.buf[self.pos..];
        dst.put_u64_le(value);
        self.pos += 8;
        Ok(())
    }

    pub fn put_f64(&mut self, value: f64) -> Result<()> {
        if self.space_left() < 8 {
            return Err(StrataError::OutOfSpace);
        }
        let mut dst = &mut self.buf[self.pos..];
        dst.put_f64_le(value);
        self.pos += 8;
        Ok(())
    }

    /// Reserve a zero-filled 16-bit slot at the cursor for later patching
    pub fn allocate_u16(&mut self) -> Result<U16Slot> {
        let offset = self.pos;
        self.put_u16(0)?;
        Ok(U16Slot { offset })
    }

    /// Overwrite a previously allocated slot without moving the cursor
    pub fn patch_u16(&mut self, slot: U16Slot, value: u16) {
        let mut dst = &mut self.buf[slot.offset..slot.offset + 2];
        dst.put_u16_le(value);
    }

    /// Bytes written so far
    pub fn size(&self) -> usize {
        self.pos
    }

    pub fn space_left(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Varint decoder over a borrowed byte region
#[derive(Debug)]
pub struct VarintReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> VarintReader<'a> {
    /// Create a reader positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Decode one varint; `Truncated` if the buffer ends before the
    /// terminator byte or the continuation chain overruns 64 bits
    pub fn next(&mut self) -> Result<u64> {
        let mut acc = 0u64;
        let mut shift = 0u32;
        let mut pos = self.pos;
        loop {
            if pos == self.buf.len() || shift > 63 {
                return Err(StrataError::Truncated);
            }
            let byte = self.buf[pos];
            pos += 1;
            acc |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        self.pos = pos;
        Ok(acc)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.space_left() < 1 {
            return Err(StrataError::Truncated);
        }
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        if self.space_left() < 2 {
            return Err(StrataError::Truncated);
        }
        let mut src = &self.buf[self.pos..];
        let value = src.get_u16_le();
        self.pos += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        if self.space_left() < 4 {
            return Err(StrataError::Truncated);
        }
        let mut src = &self.buf[self.pos..];
        let value = src.get_u32_le();
        self.pos += 4;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        if self.space_left() < 8 {
            return Err(StrataError::Truncated);
        }
        let mut src = &self.buf[self.pos..];
        let value = src.get_u64_le();
        self.pos += 8;
        Ok(value)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        if self.space_left() < 8 {
            return Err(StrataError::Truncated);
        }
        let mut src = &self.buf[self.pos..];
        let value = src.get_f64_le();
        self.pos += 8;
        Ok(value)
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn space_left(&self) -> usize {
        self.buf.len() - self.pos
    }
}
