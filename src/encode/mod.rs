//! Probability models driven through the range coder.
//!
//! Each model implements [`Coder`], turning a bit sequence into coded bits and
//! back. Models with a fixed value shape additionally implement
//! [`ValueCoder`]. The orchestration functions at the bottom of this module
//! own the encoder/decoder lifetime for callers that just want bits in and
//! bits out.

pub mod bit_extended;
pub mod count;
pub mod fixed;
pub mod num_coder;
pub mod trie;

pub use bit_extended::{BitExtendedCoder, Unbounded};
pub use count::CountCoder;
pub use fixed::FixedProbabilityCoder;
pub use num_coder::NumberCoder;
pub use trie::WeightedTrie;

use crate::arithmetic_coder::{BitDecoder, BitEncoder, Decoder, Encoder};
use crate::utils::bit_stream::{BitReader, BitSink, BitSource, BitWriter, Bits, BitsSlice};
use crate::utils::error::Result;
use log::debug;

/// A model that codes bit sequences.
pub trait Coder {
    /// Codes one unit of input read from `source`.
    fn encode(&self, source: &mut dyn BitSource, encoder: &mut dyn BitEncoder) -> Result<()>;

    /// Recovers one unit of input and writes it to `sink`.
    fn decode(&self, decoder: &mut dyn BitDecoder, sink: &mut dyn BitSink) -> Result<()>;
}

/// A model whose unit of input has a fixed value shape.
pub trait ValueCoder {
    type Value;

    fn encode_value(&self, value: &Self::Value, encoder: &mut dyn BitEncoder) -> Result<()>;

    fn decode_value(&self, decoder: &mut dyn BitDecoder) -> Result<Self::Value>;
}

/// Options for the encoding entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Terminate the stream so it decodes without padding.
    pub terminate_stream: bool,
    /// How many times the coder is applied to the input.
    pub count: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            terminate_stream: true,
            count: 1,
        }
    }
}

impl EncodeOptions {
    pub fn with_terminate_stream(mut self, terminate_stream: bool) -> Self {
        self.terminate_stream = terminate_stream;
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }
}

/// Options for the decoding entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Supply zeros once the input runs out; required for unterminated streams.
    pub pad_stream: bool,
    /// How many times the coder is applied to the input.
    pub count: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            pad_stream: false,
            count: 1,
        }
    }
}

impl DecodeOptions {
    pub fn with_pad_stream(mut self, pad_stream: bool) -> Self {
        self.pad_stream = pad_stream;
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }
}

/// Applies `coder` `options.count` times to `input` and returns the coded bits.
pub fn encode<C: Coder + ?Sized>(
    coder: &C,
    input: &BitsSlice,
    options: EncodeOptions,
) -> Result<Bits> {
    let mut source = BitReader::new(input);
    let mut encoder = Encoder::new(BitWriter::new());
    for _ in 0..options.count {
        coder.encode(&mut source, &mut encoder)?;
    }
    let output = encoder.finish(options.terminate_stream)?.into_bits();
    debug!(
        "encoded {} of {} input bits into {} bits",
        source.position(),
        input.len(),
        output.len()
    );
    Ok(output)
}

/// Decodes `options.count` units from `input` and returns their concatenation.
pub fn decode<C: Coder + ?Sized>(
    coder: &C,
    input: &BitsSlice,
    options: DecodeOptions,
) -> Result<Bits> {
    let mut decoder = Decoder::new(BitReader::new(input), options.pad_stream);
    let mut sink = BitWriter::new();
    for _ in 0..options.count {
        coder.decode(&mut decoder, &mut sink)?;
    }
    debug!(
        "decoded {} bits from {} input bits",
        sink.len(),
        decoder.position()
    );
    decoder.close();
    Ok(sink.into_bits())
}

/// Encodes a single value; `options.count` repeats it.
pub fn encode_value<C: ValueCoder + ?Sized>(
    coder: &C,
    value: &C::Value,
    options: EncodeOptions,
) -> Result<Bits> {
    let mut encoder = Encoder::new(BitWriter::new());
    for _ in 0..options.count {
        coder.encode_value(value, &mut encoder)?;
    }
    Ok(encoder.finish(options.terminate_stream)?.into_bits())
}

/// Encodes every value of `values` into one stream.
pub fn encode_values<C: ValueCoder + ?Sized>(
    coder: &C,
    values: &[C::Value],
    terminate_stream: bool,
) -> Result<Bits> {
    let mut encoder = Encoder::new(BitWriter::new());
    for value in values {
        coder.encode_value(value, &mut encoder)?;
    }
    let output = encoder.finish(terminate_stream)?.into_bits();
    debug!("encoded {} values into {} bits", values.len(), output.len());
    Ok(output)
}

/// Decodes the first value of `input`.
pub fn decode_value<C: ValueCoder + ?Sized>(
    coder: &C,
    input: &BitsSlice,
    pad_stream: bool,
) -> Result<C::Value> {
    let mut decoder = Decoder::new(BitReader::new(input), pad_stream);
    let value = coder.decode_value(&mut decoder)?;
    decoder.close();
    Ok(value)
}

/// Decodes `options.count` values from `input`.
pub fn decode_values<C: ValueCoder + ?Sized>(
    coder: &C,
    input: &BitsSlice,
    options: DecodeOptions,
) -> Result<Vec<C::Value>> {
    let mut decoder = Decoder::new(BitReader::new(input), options.pad_stream);
    let values = (0..options.count)
        .map(|_| coder.decode_value(&mut decoder))
        .collect::<Result<Vec<_>>>()?;
    decoder.close();
    Ok(values)
}
