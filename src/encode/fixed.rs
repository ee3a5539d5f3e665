use crate::arithmetic_coder::{BitDecoder, BitEncoder, Bounded};
use crate::encode::Coder;
use crate::utils::bit_stream::{BitSink, BitSource};
use crate::utils::error::{CoderError, Result};

/// Codes every bit with one constant probability of a zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedProbabilityCoder {
    p: f64,
    max_bits: Option<usize>,
}

impl FixedProbabilityCoder {
    pub fn new(p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(CoderError::InvalidProbability(p));
        }
        Ok(Self { p, max_bits: None })
    }

    /// Limits one application of the coder to `max_bits` bits.
    ///
    /// Decoding then always yields exactly `max_bits` bits. Without a limit the
    /// decoder runs until its input is exhausted, which is only exact for
    /// terminated streams at `p == 0.5`.
    pub fn with_max_bits(mut self, max_bits: usize) -> Self {
        self.max_bits = Some(max_bits);
        self
    }

    pub fn probability(&self) -> f64 {
        self.p
    }

    pub fn max_bits(&self) -> Option<usize> {
        self.max_bits
    }

    fn encode_until_closed(
        &self,
        source: &mut dyn BitSource,
        encoder: &mut dyn BitEncoder,
    ) -> Result<()> {
        while !encoder.is_closed() && !source.is_closed() {
            encoder.encode_bit(self.p, source.read()?)?;
        }
        Ok(())
    }

    fn decode_until_closed(
        &self,
        decoder: &mut dyn BitDecoder,
        sink: &mut dyn BitSink,
    ) -> Result<()> {
        while !decoder.is_closed() {
            sink.write(decoder.decode_bit(self.p)?)?;
        }
        Ok(())
    }

    fn decode_until_exhausted(
        &self,
        decoder: &mut dyn BitDecoder,
        sink: &mut dyn BitSink,
    ) -> Result<()> {
        while !decoder.is_closed() && !decoder.input_exhausted() {
            sink.write(decoder.decode_bit(self.p)?)?;
        }
        Ok(())
    }
}

impl Coder for FixedProbabilityCoder {
    fn encode(&self, source: &mut dyn BitSource, encoder: &mut dyn BitEncoder) -> Result<()> {
        match self.max_bits {
            Some(max_bits) => {
                self.encode_until_closed(source, &mut Bounded::new(encoder, max_bits))
            }
            None => self.encode_until_closed(source, encoder),
        }
    }

    fn decode(&self, decoder: &mut dyn BitDecoder, sink: &mut dyn BitSink) -> Result<()> {
        match self.max_bits {
            Some(max_bits) => self.decode_until_closed(&mut Bounded::new(decoder, max_bits), sink),
            None => self.decode_until_exhausted(decoder, sink),
        }
    }
}
