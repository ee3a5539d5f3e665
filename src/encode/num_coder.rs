//! Uniform integer coder for a half-open range `[min, max)`.
//!
//! The offset `value - min` is walked from its highest possible bit down.
//! While the prefix coded so far equals the prefix of the largest offset
//! (`top = max - min - 1`), a bit is split in proportion to how many offsets
//! remain reachable on either side. Once the offset drops below `top`'s prefix
//! every completion is reachable and each remaining bit is even.

use crate::arithmetic_coder::{BitDecoder, BitEncoder};
use crate::encode::{Coder, ValueCoder};
use crate::utils::bit_stream::{BitSink, BitSource, MAX_BATCH_BITS};
use crate::utils::error::{CoderError, Result};

/// Largest double below one; stands in for probabilities that round up to 1.0
/// while the one-branch is still reachable.
const BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

/// Codes integers uniformly distributed over `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NumberCoder {
    min: i64,
    max: i64,
    top: u64,
    top_mask: u64,
}

impl NumberCoder {
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if max <= min {
            return Err(CoderError::Range(format!(
                "max {} must exceed min {}",
                max, min
            )));
        }
        let top = (max as i128 - min as i128 - 1) as u64;
        let top_mask = if top == 0 {
            0
        } else {
            1 << (u64::BITS - 1 - top.leading_zeros())
        };
        Ok(Self {
            min,
            max,
            top,
            top_mask,
        })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Number of offset bits the bit-sequence form reads and writes.
    pub fn width(&self) -> u32 {
        u64::BITS - self.top.leading_zeros()
    }

    /// Probability that the bit under `mask` is zero while the prefix still
    /// matches `top`.
    fn tight_probability(&self, mask: u64) -> f64 {
        if self.top & mask == 0 {
            return 1.0;
        }
        let zeros = mask as f64;
        let ones = ((self.top & (mask - 1)) + 1) as f64;
        let p = zeros / (zeros + ones);
        p.min(BELOW_ONE)
    }

    fn encode_offset(&self, offset: u64, encoder: &mut dyn BitEncoder) -> Result<()> {
        if offset > self.top {
            return Err(CoderError::Range(format!(
                "offset {} outside [0, {}]",
                offset, self.top
            )));
        }
        let mut low_order = false;
        let mut mask = self.top_mask;
        while mask != 0 {
            let bit = offset & mask != 0;
            if low_order {
                encoder.encode_bit(0.5, bit)?;
            } else {
                encoder.encode_bit(self.tight_probability(mask), bit)?;
                low_order = !bit && self.top & mask != 0;
            }
            mask >>= 1;
        }
        Ok(())
    }

    fn decode_offset(&self, decoder: &mut dyn BitDecoder) -> Result<u64> {
        let mut offset = 0u64;
        let mut low_order = false;
        let mut mask = self.top_mask;
        while mask != 0 {
            let bit = if low_order {
                decoder.decode_bit(0.5)?
            } else {
                let bit = decoder.decode_bit(self.tight_probability(mask))?;
                low_order = !bit && self.top & mask != 0;
                bit
            };
            if bit {
                offset |= mask;
            }
            mask >>= 1;
        }
        Ok(offset)
    }
}

impl ValueCoder for NumberCoder {
    type Value = i64;

    fn encode_value(&self, value: &i64, encoder: &mut dyn BitEncoder) -> Result<()> {
        if *value < self.min || *value >= self.max {
            return Err(CoderError::Range(format!(
                "{} outside [{}, {})",
                value, self.min, self.max
            )));
        }
        self.encode_offset((*value as i128 - self.min as i128) as u64, encoder)
    }

    fn decode_value(&self, decoder: &mut dyn BitDecoder) -> Result<i64> {
        let offset = self.decode_offset(decoder)?;
        Ok((self.min as i128 + offset as i128) as i64)
    }
}

/// The bit-sequence form carries the offset `value - min`, LSB first, over
/// [`NumberCoder::width`] bits.
impl Coder for NumberCoder {
    fn encode(&self, source: &mut dyn BitSource, encoder: &mut dyn BitEncoder) -> Result<()> {
        let width = self.width();
        let mut offset = 0u64;
        let mut shift = 0;
        while shift < width {
            let chunk = (width - shift).min(MAX_BATCH_BITS);
            offset |= (source.read_batch(chunk)? as u64) << shift;
            shift += chunk;
        }
        self.encode_offset(offset, encoder)
    }

    fn decode(&self, decoder: &mut dyn BitDecoder, sink: &mut dyn BitSink) -> Result<()> {
        let offset = self.decode_offset(decoder)?;
        let width = self.width();
        let mut shift = 0;
        while shift < width {
            let chunk = (width - shift).min(MAX_BATCH_BITS);
            sink.write_batch((offset >> shift) as u32, chunk)?;
            shift += chunk;
        }
        Ok(())
    }
}
