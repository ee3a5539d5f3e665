//! Binary range coder over a floating-point interval.
//!
//! The working interval `[low, high)` is kept inside `[1.0, 2.0)` so that both
//! ends share one binary64 exponent: every zoom (`(x - c) * 2`) is then exact
//! and the encoder and decoder derive bit-identical split points from the same
//! probabilities.
//!
//! The probability handed to [`BitEncoder::encode_bit`] and
//! [`BitDecoder::decode_bit`] is the probability of a `0` bit. The `0` branch
//! owns `[low, mid)`, the `1` branch owns `[mid, high)`.

use crate::utils::bit_stream::{BitSink, BitSource};
use crate::utils::error::{CoderError, Result};
use log::debug;

const HALF: f64 = 1.5;
const QUARTER: f64 = 0.25;

/// Splits `[low, high)` at the point owning a fraction `p` of it.
///
/// The split always lies strictly inside the interval unless `p` is exactly
/// `0.0` or `1.0`, in which case the empty side may only be requested by a
/// bit that can never occur.
pub fn midpoint(low: f64, high: f64, p: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&p) {
        return Err(CoderError::InvalidProbability(p));
    }
    let mid = low + p * (high - low);
    if mid.is_nan() || mid < low || mid > high {
        return Err(CoderError::InvalidProbability(p));
    }
    if mid == high && p != 1.0 {
        return Ok(next_down(high));
    }
    if mid == low && p != 0.0 {
        return Ok(next_up(low));
    }
    Ok(mid)
}

// Both helpers only ever see positive normal values from the [1, 2] band.
fn next_up(x: f64) -> f64 {
    f64::from_bits(x.to_bits() + 1)
}

fn next_down(x: f64) -> f64 {
    f64::from_bits(x.to_bits() - 1)
}

/// Shared lifecycle query of encoders, decoders and their bounded views.
pub trait StreamStatus {
    /// True once every further `encode_bit` / `decode_bit` call would fail
    /// with [`CoderError::StreamClosed`].
    fn is_closed(&self) -> bool;
}

/// Anything that can narrow an interval by one coded bit.
pub trait BitEncoder: StreamStatus {
    /// Codes `bit`, where `p` is the probability of `bit` being `false`.
    fn encode_bit(&mut self, p: f64, bit: bool) -> Result<()>;
}

/// Anything that can recover one coded bit.
pub trait BitDecoder: StreamStatus {
    /// Decodes a bit coded with `p`, the probability of it being `false`.
    fn decode_bit(&mut self, p: f64) -> Result<bool>;

    /// True once every input bit has been pulled. Later bits may still decode
    /// from the interval alone, so this is not the same as being closed.
    fn input_exhausted(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Zoom {
    Low,
    High,
    Middle,
}

impl Zoom {
    /// Picks the renormalization step for an interval that became too narrow.
    fn select(low: f64, high: f64) -> Self {
        if high <= HALF {
            Zoom::Low
        } else if low >= HALF {
            Zoom::High
        } else {
            Zoom::Middle
        }
    }

    fn origin(self) -> f64 {
        match self {
            Zoom::Low => 0.5,
            Zoom::High => 1.0,
            Zoom::Middle => 0.75,
        }
    }

    fn apply(self, x: f64) -> f64 {
        (x - self.origin()) * 2.0
    }
}

/// Interval-narrowing encoder writing into an owned [`BitSink`].
#[derive(Debug)]
pub struct Encoder<S: BitSink> {
    sink: S,
    low: f64,
    high: f64,
    pending_bits: u64,   // straddle zooms whose bit awaits the next carry
    trailing_zeros: u64, // zeros decided but not yet written
    closed: bool,
}

impl<S: BitSink> Encoder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            low: 1.0,
            high: 2.0,
            pending_bits: 0,
            trailing_zeros: 0,
            closed: false,
        }
    }

    /// Current interval, mostly useful for diagnostics.
    pub fn interval(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    fn zoom(&mut self, zoom: Zoom) -> Result<()> {
        match zoom {
            Zoom::Low => self.write_bit(false)?,
            Zoom::High => self.write_bit(true)?,
            Zoom::Middle => self.pending_bits += 1,
        }
        #[cfg(feature = "debug-logging")]
        log::trace!(
            "encoder zoom {:?}: [{}, {}) pending={}",
            zoom,
            self.low,
            self.high,
            self.pending_bits
        );
        self.low = zoom.apply(self.low);
        self.high = zoom.apply(self.high);
        Ok(())
    }

    fn renormalize(&mut self) -> Result<()> {
        while self.high - self.low <= QUARTER {
            self.zoom(Zoom::select(self.low, self.high))?;
        }
        Ok(())
    }

    /// Records one decided output bit, resolving deferred bits behind it.
    fn write_bit(&mut self, bit: bool) -> Result<()> {
        if bit {
            self.flush_zeros()?;
            self.sink.write(true)?;
            // the deferred bits settle as zeros and can wait like any other zero
            self.trailing_zeros = self.pending_bits;
            self.pending_bits = 0;
        } else if self.pending_bits > 0 {
            self.flush_zeros()?;
            self.sink.write(false)?;
            for _ in 0..self.pending_bits {
                self.sink.write(true)?;
            }
            self.pending_bits = 0;
        } else {
            self.trailing_zeros += 1;
        }
        Ok(())
    }

    fn flush_zeros(&mut self) -> Result<()> {
        for _ in 0..self.trailing_zeros {
            self.sink.write(false)?;
        }
        self.trailing_zeros = 0;
        Ok(())
    }

    fn narrow(&mut self, p: f64, bit: bool) -> Result<()> {
        self.renormalize()?;
        let mid = midpoint(self.low, self.high, p)?;
        if bit {
            if mid >= self.high {
                return Err(CoderError::InvalidProbability(p));
            }
            self.low = mid;
        } else {
            if mid <= self.low {
                return Err(CoderError::InvalidProbability(p));
            }
            self.high = mid;
        }
        Ok(())
    }

    /// Finishes the stream. Calling it again is a no-op.
    ///
    /// A terminated stream can be decoded without padding and without reading
    /// past its end. An unterminated stream is the shortest prefix that decodes
    /// correctly once padded with zeros, so the decoder must be told to pad.
    pub fn close(&mut self, terminate_stream: bool) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if terminate_stream {
            while !(self.low == 1.0 && self.high == 2.0) {
                let zoom = match Zoom::select(self.low, self.high) {
                    // keep whichever half holds the larger aligned block
                    Zoom::Middle if HALF - self.low > self.high - HALF => {
                        self.high = HALF;
                        Zoom::Low
                    }
                    Zoom::Middle => {
                        self.low = HALF;
                        Zoom::High
                    }
                    zoom => zoom,
                };
                self.zoom(zoom)?;
            }
            if self.pending_bits > 0 {
                self.write_bit(true)?;
            }
        } else {
            while !(self.low == 1.0 && self.pending_bits == 0) {
                let zoom = match Zoom::select(self.low, self.high) {
                    Zoom::Middle => {
                        self.low = HALF;
                        Zoom::High
                    }
                    zoom => zoom,
                };
                self.zoom(zoom)?;
            }
        }
        self.flush_zeros()?;
        self.sink.close();
        debug!("encoder closed (terminated: {})", terminate_stream);
        Ok(())
    }

    /// Closes the stream and hands back the sink.
    pub fn finish(mut self, terminate_stream: bool) -> Result<S> {
        self.close(terminate_stream)?;
        Ok(self.sink)
    }
}

impl<S: BitSink> StreamStatus for Encoder<S> {
    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<S: BitSink> BitEncoder for Encoder<S> {
    fn encode_bit(&mut self, p: f64, bit: bool) -> Result<()> {
        if self.closed {
            return Err(CoderError::StreamClosed);
        }
        let result = self.narrow(p, bit);
        if result.is_err() {
            self.closed = true;
        }
        result
    }
}

/// Interval-narrowing decoder reading from an owned [`BitSource`].
#[derive(Debug)]
pub struct Decoder<S: BitSource> {
    source: S,
    low: f64,
    high: f64,
    // the code point is known to lie in [value, value + value_range)
    value: f64,
    value_range: f64,
    consumed: usize,
    closed: bool,
    pad_stream: bool,
}

impl<S: BitSource> Decoder<S> {
    /// Creates a decoder. With `pad_stream` set, an exhausted source keeps
    /// supplying zeros, which is what unterminated streams expect.
    pub fn new(source: S, pad_stream: bool) -> Self {
        Self {
            source,
            low: 1.0,
            high: 2.0,
            value: 1.0,
            value_range: 1.0,
            consumed: 0,
            closed: false,
            pad_stream,
        }
    }

    /// Number of bits pulled from the source so far.
    pub fn position(&self) -> usize {
        self.consumed
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.source.close();
            debug!("decoder closed after {} input bits", self.consumed);
        }
    }

    /// Closes the decoder and hands back the source.
    pub fn finish(mut self) -> S {
        self.close();
        self.source
    }

    fn zoom(&mut self, zoom: Zoom) {
        #[cfg(feature = "debug-logging")]
        log::trace!(
            "decoder zoom {:?}: [{}, {}) value={}",
            zoom,
            self.low,
            self.high,
            self.value
        );
        self.low = zoom.apply(self.low);
        self.high = zoom.apply(self.high);
        self.value = zoom.apply(self.value);
        self.value_range *= 2.0;
    }

    fn pull_bit(&mut self) -> Result<()> {
        let bit = if !self.source.is_closed() {
            self.consumed += 1;
            self.source.read()?
        } else if self.pad_stream {
            false
        } else {
            return Err(CoderError::EndOfStream);
        };
        self.value_range /= 2.0;
        if bit {
            self.value += self.value_range;
        }
        Ok(())
    }

    fn split(&mut self, p: f64) -> Result<bool> {
        while self.high - self.low <= QUARTER {
            self.zoom(Zoom::select(self.low, self.high));
        }
        let mid = midpoint(self.low, self.high, p)?;
        // a certain outcome costs nothing and must not consume input
        if mid >= self.high {
            return Ok(false);
        }
        if mid <= self.low {
            return Ok(true);
        }
        loop {
            if self.value >= mid {
                self.low = mid;
                return Ok(true);
            }
            if self.value + self.value_range <= mid {
                self.high = mid;
                return Ok(false);
            }
            self.pull_bit()?;
        }
    }
}

impl<S: BitSource> StreamStatus for Decoder<S> {
    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<S: BitSource> BitDecoder for Decoder<S> {
    fn decode_bit(&mut self, p: f64) -> Result<bool> {
        if self.closed {
            return Err(CoderError::StreamClosed);
        }
        let result = self.split(p);
        if result.is_err() {
            self.close();
        }
        result
    }

    fn input_exhausted(&self) -> bool {
        self.source.is_closed()
    }
}

/// Caps an encoder or decoder to a fixed number of coded bits.
///
/// The view reports itself closed once the budget is spent, which lets
/// loop-driven coders stop cleanly at the budget edge.
#[derive(Debug)]
pub struct Bounded<'a, E: ?Sized> {
    inner: &'a mut E,
    remaining: usize,
}

impl<'a, E: ?Sized> Bounded<'a, E> {
    pub fn new(inner: &'a mut E, max_bits: usize) -> Self {
        Self {
            inner,
            remaining: max_bits,
        }
    }

    /// Bits still allowed through this view.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn take(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(CoderError::StreamClosed);
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl<E: StreamStatus + ?Sized> StreamStatus for Bounded<'_, E> {
    fn is_closed(&self) -> bool {
        self.remaining == 0 || self.inner.is_closed()
    }
}

impl<E: BitEncoder + ?Sized> BitEncoder for Bounded<'_, E> {
    fn encode_bit(&mut self, p: f64, bit: bool) -> Result<()> {
        self.take()?;
        self.inner.encode_bit(p, bit)
    }
}

impl<E: BitDecoder + ?Sized> BitDecoder for Bounded<'_, E> {
    fn decode_bit(&mut self, p: f64) -> Result<bool> {
        self.take()?;
        self.inner.decode_bit(p)
    }

    fn input_exhausted(&self) -> bool {
        self.inner.input_exhausted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bit_stream::{BitReader, BitWriter, Bits};

    fn encode_all(p: f64, bits: &[bool], terminate: bool) -> Bits {
        let mut encoder = Encoder::new(BitWriter::new());
        for &bit in bits {
            encoder.encode_bit(p, bit).unwrap();
        }
        encoder.finish(terminate).unwrap().into_bits()
    }

    fn decode_all(p: f64, code: &Bits, len: usize, pad: bool) -> Vec<bool> {
        let mut decoder = Decoder::new(BitReader::new(code), pad);
        (0..len).map(|_| decoder.decode_bit(p).unwrap()).collect()
    }

    #[test]
    fn test_midpoint_stays_inside_interval() {
        assert_eq!(midpoint(1.0, 2.0, 0.5).unwrap(), 1.5);
        let mid = midpoint(1.0, 2.0, 1e-300).unwrap();
        assert!(mid > 1.0 && mid < 2.0);
        // the largest double below one still leaves the one-branch a single ulp
        let mid = midpoint(1.0, 2.0, 1.0 - f64::EPSILON / 2.0).unwrap();
        assert_eq!(mid, f64::from_bits(2.0f64.to_bits() - 1));
    }

    #[test]
    fn test_midpoint_certain_outcomes() {
        assert_eq!(midpoint(1.25, 1.75, 1.0).unwrap(), 1.75);
        assert_eq!(midpoint(1.25, 1.75, 0.0).unwrap(), 1.25);
    }

    #[test]
    fn test_midpoint_rejects_bad_probabilities() {
        assert!(matches!(
            midpoint(1.0, 2.0, f64::NAN),
            Err(CoderError::InvalidProbability(_))
        ));
        assert_eq!(
            midpoint(1.0, 2.0, 1.5),
            Err(CoderError::InvalidProbability(1.5))
        );
        assert_eq!(
            midpoint(1.0, 2.0, -0.1),
            Err(CoderError::InvalidProbability(-0.1))
        );
    }

    #[test]
    fn test_single_bit_terminated() {
        let code = encode_all(0.5, &[true], true);
        assert_eq!(code.len(), 1);
        assert!(code[0]);
    }

    #[test]
    fn test_even_bits_are_copied() {
        let bits = [true, false, false, true, true, false, true];
        let code = encode_all(0.5, &bits, true);
        let copied: Vec<bool> = code.iter().by_vals().collect();
        assert_eq!(copied, bits);
        assert_eq!(decode_all(0.5, &code, bits.len(), false), bits);
    }

    #[test]
    fn test_skewed_round_trip_both_modes() {
        let bits: Vec<bool> = (0..300).map(|i| i % 7 == 3 || i % 11 == 0).collect();
        assert!(encode_all(0.75, &bits, true).len() < bits.len());
        for p in [0.9, 0.75, 0.6, 0.999, 0.001] {
            let code = encode_all(p, &bits, true);
            assert_eq!(decode_all(p, &code, bits.len(), false), bits);

            let code = encode_all(p, &bits, false);
            assert_eq!(decode_all(p, &code, bits.len(), true), bits);
        }
    }

    #[test]
    fn test_terminated_stream_is_fully_consumed() {
        let bits: Vec<bool> = (0..64).map(|i| i % 3 == 0).collect();
        let code = encode_all(0.3, &bits, true);
        let mut decoder = Decoder::new(BitReader::new(&code), false);
        for &bit in &bits {
            assert_eq!(decoder.decode_bit(0.3).unwrap(), bit);
        }
        assert!(decoder.position() <= code.len());
    }

    #[test]
    fn test_exhausted_decoder_stays_open() {
        let bits = [false; 8];
        let code = encode_all(0.9, &bits, true);
        let mut decoder = Decoder::new(BitReader::new(&code), false);
        let mut exhausted_early = false;
        for &bit in &bits {
            exhausted_early |= decoder.input_exhausted();
            assert!(!decoder.is_closed());
            assert_eq!(decoder.decode_bit(0.9).unwrap(), bit);
        }
        assert!(exhausted_early);
        assert_eq!(decoder.position(), code.len());

        let mut view = Bounded::new(&mut decoder, 1);
        assert!(view.input_exhausted());
        assert!(!view.is_closed());
    }

    #[test]
    fn test_certain_bits_cost_nothing() {
        let code = encode_all(1.0, &[false; 40], true);
        assert!(code.is_empty());
        let code = encode_all(0.0, &[true; 40], false);
        assert!(code.is_empty());
        assert_eq!(decode_all(0.0, &code, 40, false), vec![true; 40]);
    }

    #[test]
    fn test_impossible_bit_fails_and_closes() {
        let mut encoder = Encoder::new(BitWriter::new());
        assert_eq!(
            encoder.encode_bit(1.0, true),
            Err(CoderError::InvalidProbability(1.0))
        );
        assert!(encoder.is_closed());
        assert_eq!(encoder.encode_bit(0.5, true), Err(CoderError::StreamClosed));
    }

    #[test]
    fn test_encoder_rejects_bits_after_close() {
        let mut encoder = Encoder::new(BitWriter::new());
        encoder.encode_bit(0.5, false).unwrap();
        encoder.close(true).unwrap();
        encoder.close(true).unwrap();
        assert_eq!(encoder.encode_bit(0.5, false), Err(CoderError::StreamClosed));
    }

    #[test]
    fn test_decoder_end_of_stream_without_padding() {
        let code = encode_all(0.2, &[true, true, false], false);
        let mut decoder = Decoder::new(BitReader::new(&code), false);
        let mut result = Ok(false);
        for _ in 0..200 {
            result = decoder.decode_bit(0.5);
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result, Err(CoderError::EndOfStream));
        assert_eq!(decoder.decode_bit(0.5), Err(CoderError::StreamClosed));
    }

    #[test]
    fn test_bounded_encoder_budget() {
        let mut encoder = Encoder::new(BitWriter::new());
        {
            let mut view = Bounded::new(&mut encoder, 2);
            view.encode_bit(0.5, true).unwrap();
            assert!(!view.is_closed());
            view.encode_bit(0.5, false).unwrap();
            assert!(view.is_closed());
            assert_eq!(view.encode_bit(0.5, true), Err(CoderError::StreamClosed));
        }
        assert!(!encoder.is_closed());
        let code = encoder.finish(true).unwrap().into_bits();
        assert_eq!(code.iter().by_vals().collect::<Vec<_>>(), [true, false]);
    }

    #[test]
    fn test_bounded_decoder_budget() {
        let code = encode_all(0.5, &[false, true, true], true);
        let mut decoder = Decoder::new(BitReader::new(&code), false);
        let mut view = Bounded::new(&mut decoder, 2);
        let mut out = Vec::new();
        while !view.is_closed() {
            out.push(view.decode_bit(0.5).unwrap());
        }
        assert_eq!(out, [false, true]);
        assert_eq!(view.remaining(), 0);
    }
}
