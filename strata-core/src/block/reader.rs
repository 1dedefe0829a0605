//! Block reader: the inverse of the writer, one sample at a time

use tracing::trace;

use super::BLOCK_VERSION;
use crate::compression::float::FcmDecoder;
use crate::compression::transform::{IntReader, TimestampReader};
use crate::compression::varint::VarintReader;
use crate::compression::CHUNK_SIZE;
use crate::{Result, Sample, SeriesId, StrataError, Timestamp};

/// Decodes a committed block using nothing but its own bytes.
///
/// Timestamps are decoded a chunk ahead into a small buffer; values are
/// decoded lazily since the predictor is deterministic. After the
/// compressed chunks the raw tail is served, then `Ok(None)`.
#[derive(Debug)]
pub struct BlockReader<'a> {
    stream: VarintReader<'a>,
    ts_stream: TimestampReader,
    val_stream: FcmDecoder,
    ts_buf: [Timestamp; CHUNK_SIZE],
    read_index: usize,
    version: u16,
    nchunks: u16,
    ntail: u16,
    series_id: SeriesId,
}

impl<'a> BlockReader<'a> {
    /// Parse the header; `Truncated` on a short buffer, `Unsupported` on
    /// a foreign version
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let mut stream = VarintReader::new(buf);
        let version = stream.read_u16()?;
        let nchunks = stream.read_u16()?;
        let ntail = stream.read_u16()?;
        let series_id = stream.read_u64()?;
        if version != BLOCK_VERSION {
            return Err(StrataError::Unsupported(version));
        }
        trace!(series_id, nchunks, ntail, "opened block");
        Ok(Self {
            stream,
            ts_stream: TimestampReader::default(),
            val_stream: FcmDecoder::new(),
            ts_buf: [0; CHUNK_SIZE],
            read_index: 0,
            version,
            nchunks,
            ntail,
            series_id,
        })
    }

    /// Next sample, or `Ok(None)` at clean end of stream
    pub fn next(&mut self) -> Result<Option<(Timestamp, f64)>> {
        let compressed = self.nchunks as usize * CHUNK_SIZE;
        let total = compressed + self.ntail as usize;
        if self.read_index < compressed {
            if self.read_index % CHUNK_SIZE == 0 {
                for slot in self.ts_buf.iter_mut() {
                    *slot = self.ts_stream.next(&mut self.stream)?;
                }
            }
            let ts = self.ts_buf[self.read_index % CHUNK_SIZE];
            let value = self.val_stream.next(&mut self.stream)?;
            self.read_index += 1;
            Ok(Some((ts, value)))
        } else if self.read_index < total {
            if self.read_index == compressed {
                // tail timestamps precede tail values
                for slot in self.ts_buf[..self.ntail as usize].iter_mut() {
                    *slot = self.stream.read_u64()?;
                }
            }
            let ts = self.ts_buf[self.read_index - compressed];
            let value = self.stream.read_f64()?;
            self.read_index += 1;
            Ok(Some((ts, value)))
        } else {
            Ok(None)
        }
    }

    /// Decode every remaining sample
    pub fn read_all(&mut self) -> Result<Vec<Sample>> {
        let mut samples = Vec::with_capacity(self.nelements());
        while let Some((timestamp, value)) = self.next()? {
            samples.push(Sample { timestamp, value });
        }
        Ok(samples)
    }

    /// Total samples recorded in the header
    pub fn nelements(&self) -> usize {
        self.nchunks as usize * CHUNK_SIZE + self.ntail as usize
    }

    /// Series the block belongs to
    pub fn get_id(&self) -> SeriesId {
        self.series_id
    }

    /// Format version found in the header
    pub fn version(&self) -> u16 {
        self.version
    }
}
