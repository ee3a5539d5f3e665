//! Coder for unbounded non-negative integers.
//!
//! A value is split into `payload_bits` low bits, each coded evenly, and an
//! extension holding everything above them. One even bit tells whether an
//! extension exists. The extension is then sent LSB first, every literal bit
//! preceded by a continuation bit coded with the configured probability; its
//! top bit is always one and is therefore left implicit.
//!
//! With no payload bits the value itself is the extension, so zero cannot be
//! represented and the initial even continuation bit is skipped.

use crate::arithmetic_coder::{BitDecoder, BitEncoder};
use crate::encode::{Coder, ValueCoder};
use crate::utils::bit_stream::{BitSink, BitSource, Bits};
use crate::utils::error::{CoderError, Result};
use num_bigint::BigUint;

/// Bit-level access to the integers the coder can carry.
trait ExtendedValue: Sized {
    fn zero() -> Self;

    /// Number of significant bits; zero for the value zero.
    fn bit_len(&self) -> u64;

    fn bit(&self, index: u64) -> bool;

    fn set_bit(&mut self, index: u64) -> Result<()>;
}

impl ExtendedValue for u64 {
    fn zero() -> Self {
        0
    }

    fn bit_len(&self) -> u64 {
        (u64::BITS - self.leading_zeros()) as u64
    }

    fn bit(&self, index: u64) -> bool {
        index < u64::BITS as u64 && (self >> index) & 1 != 0
    }

    fn set_bit(&mut self, index: u64) -> Result<()> {
        if index >= u64::BITS as u64 {
            return Err(CoderError::Range(format!(
                "decoded value needs bit {} and does not fit in 64 bits",
                index
            )));
        }
        *self |= 1 << index;
        Ok(())
    }
}

impl ExtendedValue for BigUint {
    fn zero() -> Self {
        BigUint::default()
    }

    fn bit_len(&self) -> u64 {
        self.bits()
    }

    fn bit(&self, index: u64) -> bool {
        BigUint::bit(self, index)
    }

    fn set_bit(&mut self, index: u64) -> Result<()> {
        BigUint::set_bit(self, index, true);
        Ok(())
    }
}

/// Codes integers of unbounded size with a fixed even payload and a biased
/// unary-style extension.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BitExtendedCoder {
    payload_bits: u32,
    continuation_probability: f64,
    // probability of a zero continuation bit, i.e. of stopping
    stop_probability: f64,
}

impl BitExtendedCoder {
    /// `continuation_probability` is the chance that the extension grows by
    /// one more bit; small values favour short extensions.
    pub fn new(payload_bits: u32, continuation_probability: f64) -> Result<Self> {
        let stop_probability = 1.0 - continuation_probability;
        if !(continuation_probability > 0.0 && stop_probability > 0.0 && stop_probability < 1.0)
        {
            return Err(CoderError::InvalidProbability(continuation_probability));
        }
        Ok(Self {
            payload_bits,
            continuation_probability,
            stop_probability,
        })
    }

    pub fn payload_bits(&self) -> u32 {
        self.payload_bits
    }

    pub fn continuation_probability(&self) -> f64 {
        self.continuation_probability
    }

    fn check_representable(&self, is_zero: bool) -> Result<()> {
        if is_zero && self.payload_bits == 0 {
            return Err(CoderError::Range(
                "zero needs at least one payload bit".to_string(),
            ));
        }
        Ok(())
    }

    fn encode_number<V: ExtendedValue>(
        &self,
        value: &V,
        encoder: &mut dyn BitEncoder,
    ) -> Result<()> {
        let len = value.bit_len();
        self.check_representable(len == 0)?;
        let payload = self.payload_bits as u64;
        for i in 0..payload {
            encoder.encode_bit(0.5, value.bit(i))?;
        }
        let extended = len > payload;
        if payload > 0 {
            encoder.encode_bit(0.5, extended)?;
        }
        if extended {
            // every extension bit but the implicit top one
            for i in payload..len - 1 {
                encoder.encode_bit(self.stop_probability, true)?;
                encoder.encode_bit(0.5, value.bit(i))?;
            }
            encoder.encode_bit(self.stop_probability, false)?;
        }
        Ok(())
    }

    fn decode_number<V: ExtendedValue>(&self, decoder: &mut dyn BitDecoder) -> Result<V> {
        let mut value = V::zero();
        let payload = self.payload_bits as u64;
        for i in 0..payload {
            if decoder.decode_bit(0.5)? {
                value.set_bit(i)?;
            }
        }
        let extended = payload == 0 || decoder.decode_bit(0.5)?;
        if extended {
            let mut index = payload;
            while decoder.decode_bit(self.stop_probability)? {
                if decoder.decode_bit(0.5)? {
                    value.set_bit(index)?;
                }
                index += 1;
            }
            value.set_bit(index)?;
        }
        Ok(value)
    }
}

impl ValueCoder for BitExtendedCoder {
    type Value = u64;

    fn encode_value(&self, value: &u64, encoder: &mut dyn BitEncoder) -> Result<()> {
        self.encode_number(value, encoder)
    }

    fn decode_value(&self, decoder: &mut dyn BitDecoder) -> Result<u64> {
        self.decode_number(decoder)
    }
}

/// The bit-sequence form treats the whole remaining source as one value,
/// LSB first. Its last bit must be a one whenever it extends past the payload.
impl Coder for BitExtendedCoder {
    fn encode(&self, source: &mut dyn BitSource, encoder: &mut dyn BitEncoder) -> Result<()> {
        let mut bits = Bits::new();
        while !source.is_closed() {
            bits.push(source.read()?);
        }
        let payload = self.payload_bits as usize;
        if bits.len() < payload {
            return Err(CoderError::EndOfStream);
        }
        if bits.len() > payload && bits.last().map(|bit| *bit) != Some(true) {
            return Err(CoderError::Range(
                "extension must end with a one bit".to_string(),
            ));
        }
        let value = BigUint::from_bytes_le(&pack_lsb_first(&bits));
        self.encode_number(&value, encoder)
    }

    fn decode(&self, decoder: &mut dyn BitDecoder, sink: &mut dyn BitSink) -> Result<()> {
        let value: BigUint = self.decode_number(decoder)?;
        let len = value.bits().max(self.payload_bits as u64);
        for i in 0..len {
            sink.write(value.bit(i))?;
        }
        Ok(())
    }
}

fn pack_lsb_first(bits: &Bits) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .by_vals()
                .enumerate()
                .fold(0u8, |byte, (i, bit)| byte | (bit as u8) << i)
        })
        .collect()
}

/// Adaptor coding values as arbitrary-precision integers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unbounded<C>(pub C);

impl<C> Unbounded<C> {
    pub fn inner(&self) -> &C {
        &self.0
    }
}

impl ValueCoder for Unbounded<BitExtendedCoder> {
    type Value = BigUint;

    fn encode_value(&self, value: &BigUint, encoder: &mut dyn BitEncoder) -> Result<()> {
        self.0.encode_number(value, encoder)
    }

    fn decode_value(&self, decoder: &mut dyn BitDecoder) -> Result<BigUint> {
        self.0.decode_number(decoder)
    }
}

impl<C: Coder> Coder for Unbounded<C> {
    fn encode(&self, source: &mut dyn BitSource, encoder: &mut dyn BitEncoder) -> Result<()> {
        self.0.encode(source, encoder)
    }

    fn decode(&self, decoder: &mut dyn BitDecoder, sink: &mut dyn BitSink) -> Result<()> {
        self.0.decode(decoder, sink)
    }
}
