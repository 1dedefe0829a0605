//! Block writer: header, chunked compression, raw tail

use tracing::{debug, trace};

use super::{BLOCK_VERSION, HEADER_SIZE};
use crate::compression::float::FcmEncoder;
use crate::compression::transform::TimestampWriter;
use crate::compression::varint::{U16Slot, VarintWriter, MAX_VARINT_LEN};
use crate::compression::CHUNK_SIZE;
use crate::{Result, SeriesId, StrataError, Timestamp};

const CHUNK_MASK: usize = CHUNK_SIZE - 1;

/// Free-space floor for accepting more samples: one chunk of worst-case
/// varints. A chunk that passes this check can still fail to flush; that
/// path rolls back and seals the block.
const CHUNK_MARGIN: usize = CHUNK_SIZE * MAX_VARINT_LEN;

/// Encodes one series into a caller-owned block buffer.
///
/// Samples accumulate in memory; every 16th sample flushes a compressed
/// chunk into the buffer. Once a chunk is refused the writer is sealed:
/// every further [`BlockWriter::put`] reports `OutOfSpace` and the caller
/// is expected to commit and move on to a fresh block.
pub struct BlockWriter<'a> {
    stream: VarintWriter<'a>,
    ts_stream: TimestampWriter,
    val_stream: FcmEncoder,
    ts_buf: [Timestamp; CHUNK_SIZE],
    val_buf: [f64; CHUNK_SIZE],
    write_index: usize,
    nchunks: u16,
    nchunks_slot: U16Slot,
    ntail_slot: U16Slot,
    series_id: SeriesId,
    full: bool,
}

impl<'a> BlockWriter<'a> {
    /// Lay out the header and position both sub-streams after it.
    /// Fails when `buf` cannot hold the header.
    pub fn new(series_id: SeriesId, buf: &'a mut [u8]) -> Result<Self> {
        let mut stream = VarintWriter::new(buf);
        stream.put_u16(BLOCK_VERSION)?;
        let nchunks_slot = stream.allocate_u16()?;
        let ntail_slot = stream.allocate_u16()?;
        stream.put_u64(series_id)?;
        debug_assert_eq!(stream.size(), HEADER_SIZE);
        Ok(Self {
            stream,
            ts_stream: TimestampWriter::default(),
            val_stream: FcmEncoder::new(),
            ts_buf: [0; CHUNK_SIZE],
            val_buf: [0.0; CHUNK_SIZE],
            write_index: 0,
            nchunks: 0,
            nchunks_slot,
            ntail_slot,
            series_id,
            full: false,
        })
    }

    /// Append one sample. `OutOfSpace` means the block is sealed: commit
    /// it and retry the sample in a fresh block. Timestamps need not be
    /// monotonic; compression is simply best when they are.
    pub fn put(&mut self, ts: Timestamp, value: f64) -> Result<()> {
        if self.full {
            return Err(StrataError::OutOfSpace);
        }
        let index = self.write_index & CHUNK_MASK;
        self.ts_buf[index] = ts;
        self.val_buf[index] = value;
        if index == CHUNK_MASK {
            // the room check and the flush both happen only here, at the
            // chunk boundary; a refusal rejects the triggering sample and
            // the 15 before it stay buffered for the tail flush at commit
            if !self.room_for_chunk() {
                self.full = true;
                trace!(series_id = self.series_id, "block sealed, no room for another chunk");
                return Err(StrataError::OutOfSpace);
            }
            let cp = self.stream.checkpoint();
            if self.flush_chunk().is_err() {
                self.stream.rollback(cp);
                self.full = true;
                trace!(series_id = self.series_id, "chunk flush overflowed, block sealed");
                return Err(StrataError::OutOfSpace);
            }
            self.nchunks += 1;
        }
        self.write_index += 1;
        Ok(())
    }

    /// Timestamps first, then values; both transactional on the shared
    /// cursor.
    fn flush_chunk(&mut self) -> Result<()> {
        self.ts_stream.tput(&mut self.stream, &self.ts_buf)?;
        self.val_stream.tput(&mut self.stream, &self.val_buf)
    }

    /// Fast conservative check that another compressed chunk could fit
    fn room_for_chunk(&self) -> bool {
        self.stream.space_left() >= CHUNK_MARGIN
    }

    /// Patch the header counters, append the buffered tail uncompressed
    /// (timestamps first, then values), and return the byte length of the
    /// valid block prefix.
    pub fn commit(mut self) -> Result<usize> {
        let ntail = (self.write_index & CHUNK_MASK) as u16;
        for &ts in &self.ts_buf[..ntail as usize] {
            self.stream.put_u64(ts)?;
        }
        for &value in &self.val_buf[..ntail as usize] {
            self.stream.put_f64(value)?;
        }
        self.stream.patch_u16(self.nchunks_slot, self.nchunks);
        self.stream.patch_u16(self.ntail_slot, ntail);
        debug!(
            series_id = self.series_id,
            nchunks = self.nchunks,
            ntail,
            bytes = self.stream.size(),
            "committed block"
        );
        Ok(self.stream.size())
    }

    /// Samples buffered in memory but not yet part of a committed chunk
    pub fn read_tail(&self) -> (Vec<Timestamp>, Vec<f64>) {
        let ntail = self.write_index & CHUNK_MASK;
        (self.ts_buf[..ntail].to_vec(), self.val_buf[..ntail].to_vec())
    }
}
