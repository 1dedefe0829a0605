//! Composable integer stream filters
//!
//! Each filter holds only its own state and borrows the varint stream per
//! call, so independent stacks can interleave their output over one block
//! buffer. Batched writes are transactional: on failure the stream cursor
//! is restored and the filter state is left unchanged.
//!
//! The block layer wires two stacks out of these pieces:
//! timestamps go through delta-of-delta, run-length and varint coding
//! ([`TimestampWriter`]), and signed streams have a delta / zig-zag /
//! run-length counterpart ([`SignedRleWriter`]).

use super::varint::{VarintReader, VarintWriter};
use super::CHUNK_SIZE;
use crate::Result;

/// Integer types that flow through delta filters
pub trait StreamInt: Copy + PartialEq {
    const ZERO: Self;

    fn wrapping_sub(self, rhs: Self) -> Self;
    fn wrapping_add(self, rhs: Self) -> Self;
}

impl StreamInt for u64 {
    const ZERO: Self = 0;

    fn wrapping_sub(self, rhs: Self) -> Self {
        u64::wrapping_sub(self, rhs)
    }

    fn wrapping_add(self, rhs: Self) -> Self {
        u64::wrapping_add(self, rhs)
    }
}

impl StreamInt for i64 {
    const ZERO: Self = 0;

    fn wrapping_sub(self, rhs: Self) -> Self {
        i64::wrapping_sub(self, rhs)
    }

    fn wrapping_add(self, rhs: Self) -> Self {
        i64::wrapping_add(self, rhs)
    }
}

/// A stateful filter writing integers through a borrowed varint stream
pub trait IntWriter {
    type Value: Copy;

    /// Write one value
    fn put(&mut self, out: &mut VarintWriter<'_>, value: Self::Value) -> Result<()>;

    /// Write a batch atomically: on failure the cursor and the filter
    /// state are restored
    fn tput(&mut self, out: &mut VarintWriter<'_>, values: &[Self::Value]) -> Result<()>;

    /// Flush buffered state, e.g. a pending run
    fn commit(&mut self, out: &mut VarintWriter<'_>) -> Result<()>;
}

/// Inverse of [`IntWriter`]
pub trait IntReader {
    type Value: Copy;

    fn next(&mut self, input: &mut VarintReader<'_>) -> Result<Self::Value>;
}

// ---------------------------------------------------------------- run-length

/// Run-length filter: emits `(repetitions, value)` varint pairs
#[derive(Debug, Default)]
pub struct RleWriter {
    prev: u64,
    reps: u64,
}

impl RleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_run(out: &mut VarintWriter<'_>, reps: u64, value: u64) -> Result<()> {
        out.put(reps)?;
        out.put(value)
    }
}

impl IntWriter for RleWriter {
    type Value = u64;

    fn put(&mut self, out: &mut VarintWriter<'_>, value: u64) -> Result<()> {
        if value != self.prev {
            if self.reps > 0 {
                let cp = out.checkpoint();
                if let Err(e) = Self::flush_run(out, self.reps, self.prev) {
                    out.rollback(cp);
                    return Err(e);
                }
            }
            self.prev = value;
            self.reps = 0;
        }
        self.reps += 1;
        Ok(())
    }

    fn tput(&mut self, out: &mut VarintWriter<'_>, values: &[u64]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let cp = out.checkpoint();
        let (mut prev, mut reps) = (self.prev, self.reps);
        for &value in values {
            if value != prev {
                if reps > 0 {
                    if let Err(e) = Self::flush_run(out, reps, prev) {
                        out.rollback(cp);
                        return Err(e);
                    }
                }
                prev = value;
                reps = 0;
            }
            reps += 1;
        }
        // the trailing run always flushes, so every batch is self-contained
        // and the reader realigns at batch boundaries
        if let Err(e) = Self::flush_run(out, reps, prev) {
            out.rollback(cp);
            return Err(e);
        }
        self.prev = 0;
        self.reps = 0;
        Ok(())
    }

    fn commit(&mut self, out: &mut VarintWriter<'_>) -> Result<()> {
        Self::flush_run(out, self.reps, self.prev)
    }
}

/// Inverse of [`RleWriter`]
#[derive(Debug, Default)]
pub struct RleReader {
    prev: u64,
    reps: u64,
}

impl RleReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IntReader for RleReader {
    type Value = u64;

    fn next(&mut self, input: &mut VarintReader<'_>) -> Result<u64> {
        if self.reps == 0 {
            self.reps = input.next()?;
            self.prev = input.next()?;
            if self.reps == 0 {
                // a zero-length run never comes from a writer
                return Err(crate::StrataError::Truncated);
            }
        }
        self.reps -= 1;
        Ok(self.prev)
    }
}

// ------------------------------------------------------------------- zig-zag

/// Map a signed value into unsigned varint space, sign in the low bit
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`]
pub fn zigzag_decode(encoded: u64) -> i64 {
    ((encoded >> 1) as i64) ^ -((encoded & 1) as i64)
}

/// Zig-zag filter over an unsigned inner stream
#[derive(Debug, Default)]
pub struct ZigZagWriter<W> {
    inner: W,
}

impl<W: IntWriter<Value = u64>> ZigZagWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: IntWriter<Value = u64>> IntWriter for ZigZagWriter<W> {
    type Value = i64;

    fn put(&mut self, out: &mut VarintWriter<'_>, value: i64) -> Result<()> {
        self.inner.put(out, zigzag_encode(value))
    }

    fn tput(&mut self, out: &mut VarintWriter<'_>, values: &[i64]) -> Result<()> {
        assert!(values.len() <= CHUNK_SIZE, "batch exceeds chunk width");
        let mut encoded = [0u64; CHUNK_SIZE];
        for (slot, &value) in encoded.iter_mut().zip(values) {
            *slot = zigzag_encode(value);
        }
        self.inner.tput(out, &encoded[..values.len()])
    }

    fn commit(&mut self, out: &mut VarintWriter<'_>) -> Result<()> {
        self.inner.commit(out)
    }
}

/// Inverse of [`ZigZagWriter`]
#[derive(Debug, Default)]
pub struct ZigZagReader<R> {
    inner: R,
}

impl<R: IntReader<Value = u64>> ZigZagReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: IntReader<Value = u64>> IntReader for ZigZagReader<R> {
    type Value = i64;

    fn next(&mut self, input: &mut VarintReader<'_>) -> Result<i64> {
        Ok(zigzag_decode(self.inner.next(input)?))
    }
}

// --------------------------------------------------------------------- delta

/// First-difference filter; arithmetic wraps so unordered inputs stay
/// reversible
pub struct DeltaWriter<W: IntWriter> {
    inner: W,
    prev: W::Value,
}

impl<W: IntWriter> DeltaWriter<W>
where
    W::Value: StreamInt,
{
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            prev: <W::Value as StreamInt>::ZERO,
        }
    }
}

impl<W: IntWriter + Default> Default for DeltaWriter<W>
where
    W::Value: StreamInt,
{
    fn default() -> Self {
        Self::new(W::default())
    }
}

impl<W: IntWriter> IntWriter for DeltaWriter<W>
where
    W::Value: StreamInt,
{
    type Value = W::Value;

    fn put(&mut self, out: &mut VarintWriter<'_>, value: Self::Value) -> Result<()> {
        self.inner.put(out, value.wrapping_sub(self.prev))?;
        self.prev = value;
        Ok(())
    }

    fn tput(&mut self, out: &mut VarintWriter<'_>, values: &[Self::Value]) -> Result<()> {
        assert!(values.len() <= CHUNK_SIZE, "batch exceeds chunk width");
        let zero = <W::Value as StreamInt>::ZERO;
        let mut deltas = [zero; CHUNK_SIZE];
        let mut prev = self.prev;
        for (slot, &value) in deltas.iter_mut().zip(values) {
            *slot = value.wrapping_sub(prev);
            prev = value;
        }
        self.inner.tput(out, &deltas[..values.len()])?;
        self.prev = prev;
        Ok(())
    }

    fn commit(&mut self, out: &mut VarintWriter<'_>) -> Result<()> {
        self.inner.commit(out)
    }
}

/// Inverse of [`DeltaWriter`]
pub struct DeltaReader<R: IntReader> {
    inner: R,
    prev: R::Value,
}

impl<R: IntReader> DeltaReader<R>
where
    R::Value: StreamInt,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            prev: <R::Value as StreamInt>::ZERO,
        }
    }
}

impl<R: IntReader + Default> Default for DeltaReader<R>
where
    R::Value: StreamInt,
{
    fn default() -> Self {
        Self::new(R::default())
    }
}

impl<R: IntReader> IntReader for DeltaReader<R>
where
    R::Value: StreamInt,
{
    type Value = R::Value;

    fn next(&mut self, input: &mut VarintReader<'_>) -> Result<Self::Value> {
        let delta = self.inner.next(input)?;
        self.prev = self.prev.wrapping_add(delta);
        Ok(self.prev)
    }
}

// ------------------------------------------------------------ delta-of-delta

/// Double-differencing filter over full 16-element strides with per-stride
/// minimum rebasing. The writer is batch-only: each stride emits the
/// minimum first difference and then 16 rebased residuals through the
/// inner stream as one transactional batch.
#[derive(Debug)]
pub struct DeltaDeltaWriter<W: IntWriter<Value = u64>> {
    inner: W,
    prev: u64,
}

impl<W: IntWriter<Value = u64>> DeltaDeltaWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, prev: 0 }
    }

    /// Encode one full stride; on failure the cursor and all filter state
    /// are restored
    pub fn tput(
        &mut self,
        out: &mut VarintWriter<'_>,
        values: &[u64; CHUNK_SIZE],
    ) -> Result<()> {
        let mut batch = [0u64; CHUNK_SIZE + 1];
        let mut prev = self.prev;
        let mut min = u64::MAX;
        for (slot, &value) in batch[1..].iter_mut().zip(values.iter()) {
            let delta = value.wrapping_sub(prev);
            *slot = delta;
            min = min.min(delta);
            prev = value;
        }
        batch[0] = min;
        for slot in &mut batch[1..] {
            *slot -= min;
        }
        self.inner.tput(out, &batch)?;
        self.prev = prev;
        Ok(())
    }
}

impl<W: IntWriter<Value = u64> + Default> Default for DeltaDeltaWriter<W> {
    fn default() -> Self {
        Self::new(W::default())
    }
}

/// Inverse of [`DeltaDeltaWriter`]; reads the stride minimum once every
/// 16 elements
#[derive(Debug)]
pub struct DeltaDeltaReader<R: IntReader<Value = u64>> {
    inner: R,
    prev: u64,
    min: u64,
    counter: usize,
}

impl<R: IntReader<Value = u64>> DeltaDeltaReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            prev: 0,
            min: 0,
            counter: 0,
        }
    }
}

impl<R: IntReader<Value = u64> + Default> Default for DeltaDeltaReader<R> {
    fn default() -> Self {
        Self::new(R::default())
    }
}

impl<R: IntReader<Value = u64>> IntReader for DeltaDeltaReader<R> {
    type Value = u64;

    fn next(&mut self, input: &mut VarintReader<'_>) -> Result<u64> {
        if self.counter % CHUNK_SIZE == 0 {
            self.min = self.inner.next(input)?;
        }
        self.counter += 1;
        let residual = self.inner.next(input)?;
        let value = self.prev.wrapping_add(self.min).wrapping_add(residual);
        self.prev = value;
        Ok(value)
    }
}

// -------------------------------------------------------------------- stacks

/// u64 -> delta-of-delta(16) -> RLE -> varint: the timestamp path of the
/// block writer
pub type TimestampWriter = DeltaDeltaWriter<RleWriter>;
/// Varint -> RLE -> delta-of-delta -> u64
pub type TimestampReader = DeltaDeltaReader<RleReader>;

/// i64 -> delta -> zig-zag -> RLE -> varint: signed counterpart of the
/// timestamp stack; not wired into the block layer
pub type SignedRleWriter = DeltaWriter<ZigZagWriter<RleWriter>>;
/// Varint -> RLE -> zig-zag -> delta -> i64
pub type SignedRleReader = DeltaReader<ZigZagReader<RleReader>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StrataError;

    #[test]
    fn test_zigzag_maps_sign_to_low_bit() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(2), 4);
        for value in [0, 1, -1, 42, -42, i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }
    }

    #[test]
    fn test_rle_collapses_equal_run_into_two_varints() {
        let mut buf = [0u8; 32];
        let mut writer = VarintWriter::new(&mut buf);
        let mut rle = RleWriter::new();
        for _ in 0..500 {
            rle.put(&mut writer, 7).unwrap();
        }
        rle.commit(&mut writer).unwrap();
        // reps=500 takes two bytes, value=7 one byte
        assert_eq!(writer.size(), 3);
        let size = writer.size();

        let mut input = VarintReader::new(&buf[..size]);
        let mut reader = RleReader::new();
        for _ in 0..500 {
            assert_eq!(reader.next(&mut input).unwrap(), 7);
        }
    }

    #[test]
    fn test_rle_run_boundaries() {
        let values = [3u64, 3, 3, 9, 9, 1, 1, 1, 1];
        let mut buf = [0u8; 64];
        let mut writer = VarintWriter::new(&mut buf);
        let mut rle = RleWriter::new();
        rle.tput(&mut writer, &values).unwrap();
        let size = writer.size();

        let mut input = VarintReader::new(&buf[..size]);
        let mut reader = RleReader::new();
        for &value in &values {
            assert_eq!(reader.next(&mut input).unwrap(), value);
        }
        // the batch flushed its trailing run; nothing left to read
        assert_eq!(input.space_left(), 0);
    }

    #[test]
    fn test_delta_of_delta_emits_min_then_rebased_residuals() {
        let timestamps: [u64; CHUNK_SIZE] = [
            100, 1100, 2100, 3150, 4150, 5150, 6150, 7150, 8150, 9150, 10150, 11150, 12150,
            13150, 14150, 15150,
        ];
        let mut buf = [0u8; 256];
        let mut writer = VarintWriter::new(&mut buf);
        let mut dd = TimestampWriter::default();
        dd.tput(&mut writer, &timestamps).unwrap();
        let size = writer.size();

        // peel the RLE layer off and look at the 17 logical integers
        let mut input = VarintReader::new(&buf[..size]);
        let mut rle = RleReader::new();
        let min = rle.next(&mut input).unwrap();
        let mut residuals = [0u64; CHUNK_SIZE];
        for slot in residuals.iter_mut() {
            *slot = rle.next(&mut input).unwrap();
        }

        let mut prev = 0u64;
        let mut smallest = u64::MAX;
        for (i, &ts) in timestamps.iter().enumerate() {
            let delta = ts - prev;
            assert_eq!(min + residuals[i], delta, "rebased residual {}", i);
            smallest = smallest.min(residuals[i]);
            prev = ts;
        }
        assert_eq!(smallest, 0, "some residual must sit on the minimum");
    }

    #[test]
    fn test_timestamp_stack_roundtrip_multiple_chunks() {
        let mut timestamps = Vec::new();
        for i in 0..(3 * CHUNK_SIZE as u64) {
            timestamps.push(1_000_000 + i * 500);
        }
        let mut buf = [0u8; 512];
        let mut writer = VarintWriter::new(&mut buf);
        let mut dd = TimestampWriter::default();
        for chunk in timestamps.chunks_exact(CHUNK_SIZE) {
            let mut stride = [0u64; CHUNK_SIZE];
            stride.copy_from_slice(chunk);
            dd.tput(&mut writer, &stride).unwrap();
        }
        let size = writer.size();

        let mut input = VarintReader::new(&buf[..size]);
        let mut reader = TimestampReader::default();
        for &ts in &timestamps {
            assert_eq!(reader.next(&mut input).unwrap(), ts);
        }
    }

    #[test]
    fn test_timestamp_stack_tolerates_unordered_input() {
        // a backwards jump makes one delta wrap; the stack must still
        // restore the exact sequence
        let mut timestamps = [0u64; CHUNK_SIZE];
        for (i, slot) in timestamps.iter_mut().enumerate() {
            *slot = 5_000 + i as u64 * 10;
        }
        timestamps[7] = 40; // out of order

        let mut buf = [0u8; 512];
        let mut writer = VarintWriter::new(&mut buf);
        let mut dd = TimestampWriter::default();
        dd.tput(&mut writer, &timestamps).unwrap();
        let size = writer.size();

        let mut input = VarintReader::new(&buf[..size]);
        let mut reader = TimestampReader::default();
        for &ts in &timestamps {
            assert_eq!(reader.next(&mut input).unwrap(), ts);
        }
    }

    #[test]
    fn test_signed_stack_roundtrip() {
        let values = [0i64, -5, -5, -5, 100, 100, -3_000_000, i64::MAX, i64::MIN, 8];
        let mut buf = [0u8; 512];
        let mut writer = VarintWriter::new(&mut buf);
        let mut stack = SignedRleWriter::default();
        for &value in &values {
            stack.put(&mut writer, value).unwrap();
        }
        stack.commit(&mut writer).unwrap();
        let size = writer.size();

        let mut input = VarintReader::new(&buf[..size]);
        let mut reader = SignedRleReader::default();
        for &value in &values {
            assert_eq!(reader.next(&mut input).unwrap(), value);
        }
    }

    #[test]
    fn test_signed_stack_batched_roundtrip() {
        let values: Vec<i64> = (0..CHUNK_SIZE as i64).map(|i| i * 17 - 100).collect();
        let mut buf = [0u8; 512];
        let mut writer = VarintWriter::new(&mut buf);
        let mut stack = SignedRleWriter::default();
        stack.tput(&mut writer, &values).unwrap();
        stack.commit(&mut writer).unwrap();
        let size = writer.size();

        let mut input = VarintReader::new(&buf[..size]);
        let mut reader = SignedRleReader::default();
        for &value in &values {
            assert_eq!(reader.next(&mut input).unwrap(), value);
        }
    }

    #[test]
    fn test_delta_of_delta_overflow_restores_cursor_and_state() {
        let mut timestamps = [0u64; CHUNK_SIZE];
        for (i, slot) in timestamps.iter_mut().enumerate() {
            // distinct huge deltas defeat the run-length layer
            let i = i as u64;
            *slot = u64::MAX / 2 + i * i * 0x0101_0101_0101;
        }
        let mut buf = [0u8; 8];
        let mut writer = VarintWriter::new(&mut buf);
        let mut dd = TimestampWriter::default();
        assert_eq!(
            dd.tput(&mut writer, &timestamps),
            Err(StrataError::OutOfSpace)
        );
        assert_eq!(writer.size(), 0);

        // the failed batch left no trace: a later write into a big buffer
        // starts from the original state and round-trips
        let mut big = [0u8; 512];
        let mut writer = VarintWriter::new(&mut big);
        dd.tput(&mut writer, &timestamps).unwrap();
        let size = writer.size();
        let mut input = VarintReader::new(&big[..size]);
        let mut reader = TimestampReader::default();
        for &ts in &timestamps {
            assert_eq!(reader.next(&mut input).unwrap(), ts);
        }
    }
}
