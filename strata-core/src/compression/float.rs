//! Predictor-based lossless codec for 64-bit floats
//!
//! Every value is XORed with an FCM prediction of its bit pattern. The
//! residual keeps only its significant low bytes; a 4-bit flag records how
//! many leading zero bytes were dropped. Two values share one flag byte
//! (high nibble first), so a 16-value chunk carries exactly 8 flag bytes.

use std::mem;

use super::predictor::FcmPredictor;
use super::varint::{VarintReader, VarintWriter};
use super::CHUNK_SIZE;
use crate::config::PREDICTOR_TABLE_SIZE;
use crate::Result;

/// Leading zero bytes of a residual, clamped so the count fits the three
/// low flag bits; a zero residual still emits one byte
fn leading_zero_bytes(diff: u64) -> u8 {
    ((diff.leading_zeros() / 8) as u8).min(7)
}

/// Low `8 - lz` bytes of the residual, little-endian
fn put_residual(out: &mut VarintWriter<'_>, diff: u64, flag: u8) -> Result<()> {
    let nbytes = 8 - (flag & 7) as usize;
    for i in 0..nbytes {
        out.put_u8((diff >> (8 * i)) as u8)?;
    }
    Ok(())
}

/// FCM encoder for double streams
#[derive(Debug)]
pub struct FcmEncoder {
    predictor: FcmPredictor,
    /// Scratch copy of the predictor for batch rollback
    snapshot: FcmPredictor,
    prev_diff: u64,
    prev_flag: u8,
    nelements: usize,
}

impl FcmEncoder {
    /// Create an encoder with a fresh (zeroed) predictor
    pub fn new() -> Self {
        Self {
            predictor: FcmPredictor::new(PREDICTOR_TABLE_SIZE),
            snapshot: FcmPredictor::new(PREDICTOR_TABLE_SIZE),
            prev_diff: 0,
            prev_flag: 0,
            nelements: 0,
        }
    }

    /// Encode one value. Even-indexed values are staged in memory; the
    /// odd partner writes the shared flag byte and both residuals.
    pub fn put(&mut self, out: &mut VarintWriter<'_>, value: f64) -> Result<()> {
        let bits = value.to_bits();
        let diff = bits ^ self.predictor.predict_next();
        self.predictor.update(bits);
        let flag = leading_zero_bytes(diff);
        if self.nelements % 2 == 0 {
            self.prev_diff = diff;
            self.prev_flag = flag;
        } else {
            let cp = out.checkpoint();
            if let Err(e) = self.put_pair(out, diff, flag) {
                out.rollback(cp);
                return Err(e);
            }
        }
        self.nelements += 1;
        Ok(())
    }

    fn put_pair(&mut self, out: &mut VarintWriter<'_>, diff: u64, flag: u8) -> Result<()> {
        out.put_u8((self.prev_flag << 4) | flag)?;
        put_residual(out, self.prev_diff, self.prev_flag)?;
        put_residual(out, diff, flag)
    }

    /// Encode a full chunk; on failure the cursor and the whole codec
    /// state, predictor included, are restored
    pub fn tput(&mut self, out: &mut VarintWriter<'_>, values: &[f64; CHUNK_SIZE]) -> Result<()> {
        let cp = out.checkpoint();
        self.snapshot.clone_from(&self.predictor);
        let prev_diff = self.prev_diff;
        let prev_flag = self.prev_flag;
        let nelements = self.nelements;
        for &value in values {
            if let Err(e) = self.put(out, value) {
                out.rollback(cp);
                mem::swap(&mut self.predictor, &mut self.snapshot);
                self.prev_diff = prev_diff;
                self.prev_flag = prev_flag;
                self.nelements = nelements;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Flush a trailing unpaired value: its flag takes the high nibble of
    /// a final flag byte whose low nibble stays zero and owns no residual
    pub fn commit(&mut self, out: &mut VarintWriter<'_>) -> Result<()> {
        if self.nelements % 2 == 0 {
            return Ok(());
        }
        let cp = out.checkpoint();
        if let Err(e) = self.flush_single(out) {
            out.rollback(cp);
            return Err(e);
        }
        Ok(())
    }

    fn flush_single(&self, out: &mut VarintWriter<'_>) -> Result<()> {
        out.put_u8(self.prev_flag << 4)?;
        put_residual(out, self.prev_diff, self.prev_flag)
    }
}

impl Default for FcmEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Inverse of [`FcmEncoder`]. The caller knows the element count; the
/// decoder never reads past the last real residual, so an unpaired final
/// flag byte's zero nibble is simply never consumed.
#[derive(Debug)]
pub struct FcmDecoder {
    predictor: FcmPredictor,
    flags: u8,
    iter: usize,
}

impl FcmDecoder {
    pub fn new() -> Self {
        Self {
            predictor: FcmPredictor::new(PREDICTOR_TABLE_SIZE),
            flags: 0,
            iter: 0,
        }
    }

    /// Decode the next value
    pub fn next(&mut self, input: &mut VarintReader<'_>) -> Result<f64> {
        let flag = if self.iter % 2 == 0 {
            self.flags = input.read_u8()?;
            self.flags >> 4
        } else {
            self.flags & 0x0f
        };
        self.iter += 1;

        let nbytes = 8 - (flag & 7) as usize;
        let mut diff = 0u64;
        for i in 0..nbytes {
            diff |= u64::from(input.read_u8()?) << (8 * i);
        }
        let bits = self.predictor.predict_next() ^ diff;
        self.predictor.update(bits);
        Ok(f64::from_bits(bits))
    }
}

impl Default for FcmDecoder {
    fn default() -> Self {
        Self::new()
    }
}
