//! Coder for bit strings with a known number of zeros.
//!
//! Coding the `n` bits one by one with the probability `zeros left / bits left`
//! spends `log2(C(n, z))` bits in total, the size of the combinatorial number
//! system index of the arrangement.

use crate::arithmetic_coder::{BitDecoder, BitEncoder};
use crate::encode::{Coder, ValueCoder};
use crate::utils::bit_stream::{BitSink, BitSource, Bits};
use crate::utils::error::{CoderError, Result};

/// Codes exactly `n` bits of which exactly `z` are zeros.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountCoder {
    n: usize,
    z: usize,
}

/// Per-call position inside the `n` bits.
struct Cursor {
    remaining_n: usize,
    remaining_z: usize,
}

impl Cursor {
    fn probability(&self) -> f64 {
        self.remaining_z as f64 / self.remaining_n as f64
    }

    fn advance(&mut self, bit: bool) {
        self.remaining_n -= 1;
        if !bit {
            self.remaining_z -= 1;
        }
    }
}

impl CountCoder {
    pub fn new(n: usize, z: usize) -> Result<Self> {
        if z > n {
            return Err(CoderError::Range(format!(
                "zero count {} exceeds bit count {}",
                z, n
            )));
        }
        Ok(Self { n, z })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn zeros(&self) -> usize {
        self.z
    }

    fn cursor(&self) -> Cursor {
        Cursor {
            remaining_n: self.n,
            remaining_z: self.z,
        }
    }

    fn encode_bits(
        &self,
        mut next_bit: impl FnMut() -> Result<bool>,
        encoder: &mut dyn BitEncoder,
    ) -> Result<()> {
        let mut cursor = self.cursor();
        for _ in 0..self.n {
            let bit = next_bit()?;
            // an arrangement with the wrong zero count hits a certain probability
            // with the impossible bit and is rejected by the encoder
            encoder.encode_bit(cursor.probability(), bit)?;
            cursor.advance(bit);
        }
        Ok(())
    }

    fn decode_bits(
        &self,
        decoder: &mut dyn BitDecoder,
        mut emit: impl FnMut(bool) -> Result<()>,
    ) -> Result<()> {
        let mut cursor = self.cursor();
        for _ in 0..self.n {
            let bit = decoder.decode_bit(cursor.probability())?;
            cursor.advance(bit);
            emit(bit)?;
        }
        Ok(())
    }
}

impl Coder for CountCoder {
    fn encode(&self, source: &mut dyn BitSource, encoder: &mut dyn BitEncoder) -> Result<()> {
        self.encode_bits(|| source.read(), encoder)
    }

    fn decode(&self, decoder: &mut dyn BitDecoder, sink: &mut dyn BitSink) -> Result<()> {
        self.decode_bits(decoder, |bit| sink.write(bit))
    }
}

impl ValueCoder for CountCoder {
    type Value = Bits;

    fn encode_value(&self, value: &Bits, encoder: &mut dyn BitEncoder) -> Result<()> {
        if value.len() != self.n {
            return Err(CoderError::Range(format!(
                "expected {} bits, got {}",
                self.n,
                value.len()
            )));
        }
        let mut bits = value.iter().by_vals();
        self.encode_bits(|| bits.next().ok_or(CoderError::EndOfStream), encoder)
    }

    fn decode_value(&self, decoder: &mut dyn BitDecoder) -> Result<Bits> {
        let mut value = Bits::with_capacity(self.n);
        self.decode_bits(decoder, |bit| {
            value.push(bit);
            Ok(())
        })?;
        Ok(value)
    }
}
