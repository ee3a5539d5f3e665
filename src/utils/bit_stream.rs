// src/utils/bit_stream.rs

//! Sequential bit sources and sinks.
//!
//! The range coder consumes and produces plain bit sequences. They are kept in
//! memory as `bitvec` vectors; the `BitSource` and `BitSink` traits are the
//! narrow contract the encoder, the decoder and the coder family rely on, so any
//! other sequential bit container can be plugged in behind them.
//!
//! Batch operations are LSB-first: the first bit read or written lands in bit 0
//! of the packed integer.

use crate::utils::error::{CoderError, Result};
use bitvec::prelude as bv;

/// Owned bit sequence used throughout the crate.
pub type Bits = bv::BitVec<u8, bv::Msb0>;
/// Borrowed view of a [`Bits`] sequence.
pub type BitsSlice = bv::BitSlice<u8, bv::Msb0>;

/// Largest number of bits a single batch operation may move.
pub const MAX_BATCH_BITS: u32 = 32;

/// A sequential source of bits.
pub trait BitSource {
    /// Reads the next bit.
    fn read(&mut self) -> Result<bool>;

    /// Reads `bit_count` bits (at most 32), packing the first one into bit 0.
    fn read_batch(&mut self, bit_count: u32) -> Result<u32> {
        check_batch(bit_count)?;
        let mut value = 0u32;
        for i in 0..bit_count {
            if self.read()? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    /// True once no further bit can be read.
    fn is_closed(&self) -> bool;

    /// Number of bits left, or `None` when the source cannot tell.
    fn count(&self) -> Option<usize>;

    fn close(&mut self);
}

/// A sequential sink of bits.
pub trait BitSink {
    fn write(&mut self, bit: bool) -> Result<()>;

    /// Writes the low `bit_count` bits (at most 32) of `value`, bit 0 first.
    fn write_batch(&mut self, value: u32, bit_count: u32) -> Result<()> {
        check_batch(bit_count)?;
        for i in 0..bit_count {
            self.write((value >> i) & 1 != 0)?;
        }
        Ok(())
    }

    fn close(&mut self);
}

/// Renders bits as a string of `0` and `1` characters.
pub fn render(bits: &BitsSlice) -> String {
    bits.iter()
        .by_vals()
        .map(|bit| if bit { '1' } else { '0' })
        .collect()
}

fn check_batch(bit_count: u32) -> Result<()> {
    if bit_count > MAX_BATCH_BITS {
        return Err(CoderError::Range(format!(
            "batch of {} bits exceeds the {} bit limit",
            bit_count, MAX_BATCH_BITS
        )));
    }
    Ok(())
}

/// Reads bits front to back from a borrowed slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bits: &'a BitsSlice,
    pos: usize,
    closed: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(bits: &'a BitsSlice) -> Self {
        Self {
            bits,
            pos: 0,
            closed: false,
        }
    }

    /// Number of bits consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unread tail of the underlying slice.
    pub fn remaining(&self) -> &'a BitsSlice {
        &self.bits[self.pos..]
    }
}

impl BitSource for BitReader<'_> {
    fn read(&mut self) -> Result<bool> {
        if self.closed {
            return Err(CoderError::StreamClosed);
        }
        let bit = *self.bits.get(self.pos).ok_or(CoderError::EndOfStream)?;
        self.pos += 1;
        Ok(bit)
    }

    fn is_closed(&self) -> bool {
        self.closed || self.pos >= self.bits.len()
    }

    fn count(&self) -> Option<usize> {
        Some(if self.closed {
            0
        } else {
            self.bits.len() - self.pos
        })
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Appends bits to an owned [`Bits`] buffer.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bits: Bits,
    closed: bool,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn as_bits(&self) -> &BitsSlice {
        &self.bits
    }

    /// Returns the written bits.
    pub fn into_bits(self) -> Bits {
        self.bits
    }
}

impl BitSink for BitWriter {
    fn write(&mut self, bit: bool) -> Result<()> {
        if self.closed {
            return Err(CoderError::StreamClosed);
        }
        self.bits.push(bit);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitvec::prelude::*;

    #[test]
    fn test_reader_reports_remaining_and_end_of_stream() {
        let data = bits![u8, Msb0; 1, 0, 1];
        let mut reader = BitReader::new(data);
        assert_eq!(reader.count(), Some(3));
        assert!(reader.read().unwrap());
        assert!(!reader.read().unwrap());
        assert!(!reader.is_closed());
        assert!(reader.read().unwrap());
        assert!(reader.is_closed());
        assert_eq!(reader.count(), Some(0));
        assert_eq!(reader.read(), Err(CoderError::EndOfStream));
    }

    #[test]
    fn test_batches_are_lsb_first() {
        let mut writer = BitWriter::new();
        writer.write_batch(0b1101, 4).unwrap();
        assert_eq!(writer.as_bits(), bits![u8, Msb0; 1, 0, 1, 1]);

        let bits = writer.into_bits();
        let mut reader = BitReader::new(&bits);
        assert_eq!(reader.read_batch(3).unwrap(), 0b101);
        assert_eq!(reader.remaining(), bits![u8, Msb0; 1]);
    }

    #[test]
    fn test_render() {
        assert_eq!(render(bits![u8, Msb0; 0, 1, 1]), "011");
        assert_eq!(render(BitsSlice::empty()), "");
    }

    #[test]
    fn test_batch_limit() {
        let mut writer = BitWriter::new();
        assert!(matches!(
            writer.write_batch(0, 33),
            Err(CoderError::Range(_))
        ));
    }

    #[test]
    fn test_closed_writer_rejects_bits() {
        let mut writer = BitWriter::new();
        writer.write(true).unwrap();
        writer.close();
        assert_eq!(writer.write(false), Err(CoderError::StreamClosed));
        assert_eq!(writer.len(), 1);
    }
}
