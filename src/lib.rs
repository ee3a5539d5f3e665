//! # Bit Range Coder Library
//!
//! A binary range (arithmetic) coder working on a floating-point interval, and
//! a family of static probability models driven through it.
//!
//! This library is organized into several modules:
//! - `utils`: error handling and the in-memory bit streams
//! - `arithmetic_coder`: the interval-narrowing encoder and decoder, and the
//!   bounded views that cap them to a bit budget
//! - `encode`: the probability models (weighted trie, fixed probability,
//!   "k of n" count, uniform number range, bit-extended) and the functions
//!   that run them end to end
//!
//! ```
//! use bit_range_coder::{EncodeOptions, NumberCoder, decode_value, encode_value};
//!
//! let coder = NumberCoder::new(0, 1000)?;
//! let code = encode_value(&coder, &421, EncodeOptions::default())?;
//! assert!(code.len() <= 11);
//! assert_eq!(decode_value(&coder, &code, false)?, 421);
//! # Ok::<(), bit_range_coder::CoderError>(())
//! ```

// Re-export commonly used types at the crate root
pub use utils::error::{CoderError, Result};

pub mod utils {
    pub mod bit_stream;
    pub mod error;
}

pub mod arithmetic_coder;
pub mod encode;

// Public API exports
pub use arithmetic_coder::{
    BitDecoder, BitEncoder, Bounded, Decoder, Encoder, StreamStatus, midpoint,
};
pub use encode::{
    BitExtendedCoder, Coder, CountCoder, DecodeOptions, EncodeOptions, FixedProbabilityCoder,
    NumberCoder, Unbounded, ValueCoder, WeightedTrie, decode, decode_value, decode_values, encode,
    encode_value, encode_values,
};
pub use utils::bit_stream::{BitReader, BitSink, BitSource, BitWriter, Bits, BitsSlice};
