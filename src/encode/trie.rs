// src/encode/trie.rs

//! Static weighted-trie model for prefix-free symbol sets.
//!
//! The trie is built once from `(symbol, weight)` pairs. Every internal node
//! stores the share of weight that continues through its `0` child, which is
//! exactly the probability the range coder needs to code the next symbol bit.
//! The probabilities never change after construction: the model is static,
//! not adaptive.

use crate::arithmetic_coder::{BitDecoder, BitEncoder};
use crate::encode::{Coder, ValueCoder};
use crate::utils::bit_stream::{BitSink, BitSource, Bits, BitsSlice, render};
use crate::utils::error::{CoderError, Result};
use log::debug;

const ROOT: usize = 0;

#[derive(Clone, Debug, Default)]
struct Node {
    p: f64,
    children: [Option<usize>; 2],
    weights: [f64; 2],
    terminal: bool,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.children == [None, None]
    }
}

/// Range-coding model over a fixed set of weighted bit-string symbols.
#[derive(Clone, Debug)]
pub struct WeightedTrie {
    nodes: Vec<Node>,
    symbols: usize,
}

impl WeightedTrie {
    /// Builds the model. Symbols with zero weight are validated but never
    /// become reachable.
    pub fn new<'a, I>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a BitsSlice, f64)>,
    {
        let mut trie = Self {
            nodes: vec![Node::default()],
            symbols: 0,
        };
        for (symbol, weight) in symbols {
            if symbol.is_empty() {
                return Err(CoderError::ModelConstruction("empty symbol".to_string()));
            }
            if weight.is_nan() || weight < 0.0 {
                return Err(CoderError::ModelConstruction(format!(
                    "weight {} of symbol {} is not a non-negative number",
                    weight,
                    render(symbol)
                )));
            }
            if weight > 0.0 {
                trie.insert(symbol, weight)?;
            }
        }
        if trie.symbols == 0 {
            return Err(CoderError::ModelConstruction(
                "no symbol has a positive weight".to_string(),
            ));
        }
        for node in &mut trie.nodes {
            let [zero, one] = node.weights;
            if !node.is_leaf() {
                node.p = zero / (zero + one);
            }
        }
        debug!(
            "built weighted trie: {} symbols, {} nodes",
            trie.symbols,
            trie.nodes.len()
        );
        Ok(trie)
    }

    /// Number of reachable symbols.
    pub fn len(&self) -> usize {
        self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols == 0
    }

    fn insert(&mut self, symbol: &BitsSlice, weight: f64) -> Result<()> {
        let mut index = ROOT;
        for bit in symbol.iter().by_vals() {
            if self.nodes[index].terminal {
                return Err(prefix_conflict(symbol));
            }
            let branch = bit as usize;
            self.nodes[index].weights[branch] += weight;
            index = match self.nodes[index].children[branch] {
                Some(child) => child,
                None => {
                    self.nodes.push(Node::default());
                    let child = self.nodes.len() - 1;
                    self.nodes[index].children[branch] = Some(child);
                    child
                }
            };
        }
        let node = &mut self.nodes[index];
        if node.terminal {
            return Err(CoderError::ModelConstruction(format!(
                "duplicate symbol {}",
                render(symbol)
            )));
        }
        if !node.is_leaf() {
            return Err(prefix_conflict(symbol));
        }
        node.terminal = true;
        self.symbols += 1;
        Ok(())
    }

    fn encode_bits(
        &self,
        mut next_bit: impl FnMut() -> Result<bool>,
        encoder: &mut dyn BitEncoder,
    ) -> Result<()> {
        let mut node = &self.nodes[ROOT];
        while !node.is_leaf() {
            let bit = next_bit()?;
            encoder.encode_bit(node.p, bit)?;
            // the encoder rejects a branch of probability zero, so the child exists
            let child = node.children[bit as usize].ok_or(CoderError::InvalidProbability(node.p))?;
            node = &self.nodes[child];
        }
        Ok(())
    }

    fn decode_bits(
        &self,
        decoder: &mut dyn BitDecoder,
        mut emit: impl FnMut(bool) -> Result<()>,
    ) -> Result<()> {
        let mut node = &self.nodes[ROOT];
        while !node.is_leaf() {
            let bit = decoder.decode_bit(node.p)?;
            emit(bit)?;
            let child = node.children[bit as usize].ok_or(CoderError::InvalidProbability(node.p))?;
            node = &self.nodes[child];
        }
        Ok(())
    }
}

fn prefix_conflict(symbol: &BitsSlice) -> CoderError {
    CoderError::ModelConstruction(format!(
        "symbol {} shares a prefix with another symbol",
        render(symbol)
    ))
}

impl Coder for WeightedTrie {
    fn encode(&self, source: &mut dyn BitSource, encoder: &mut dyn BitEncoder) -> Result<()> {
        self.encode_bits(|| source.read(), encoder)
    }

    fn decode(&self, decoder: &mut dyn BitDecoder, sink: &mut dyn BitSink) -> Result<()> {
        self.decode_bits(decoder, |bit| sink.write(bit))
    }
}

impl ValueCoder for WeightedTrie {
    type Value = Bits;

    fn encode_value(&self, value: &Bits, encoder: &mut dyn BitEncoder) -> Result<()> {
        let mut bits = value.iter().by_vals();
        self.encode_bits(|| bits.next().ok_or(CoderError::EndOfStream), encoder)?;
        if bits.next().is_some() {
            return Err(CoderError::Range(format!("{} is not a symbol", render(value))));
        }
        Ok(())
    }

    fn decode_value(&self, decoder: &mut dyn BitDecoder) -> Result<Bits> {
        let mut value = Bits::new();
        self.decode_bits(decoder, |bit| {
            value.push(bit);
            Ok(())
        })?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{DecodeOptions, decode_values, encode_values};
    use bitvec::prelude::*;

    fn build(symbols: &[(&BitsSlice, f64)]) -> Result<WeightedTrie> {
        WeightedTrie::new(symbols.iter().copied())
    }

    #[test]
    fn test_probabilities_follow_weights() {
        let trie = build(&[
            (bits![u8, Msb0; 0], 3.0),
            (bits![u8, Msb0; 1, 0], 0.5),
            (bits![u8, Msb0; 1, 1], 0.5),
        ])
        .unwrap();
        assert_eq!(trie.len(), 3);
        assert_eq!(trie.nodes[ROOT].p, 0.75);
        let one = trie.nodes[ROOT].children[1].unwrap();
        assert_eq!(trie.nodes[one].p, 0.5);
    }

    #[test]
    fn test_rejects_invalid_symbol_sets() {
        let empty = BitVec::<u8, Msb0>::new();
        let cases: [&[(&BitsSlice, f64)]; 5] = [
            &[(empty.as_bitslice(), 1.0)],
            &[(bits![u8, Msb0; 1], -1.0)],
            &[(bits![u8, Msb0; 1, 0], 1.0), (bits![u8, Msb0; 1], 1.0)],
            &[(bits![u8, Msb0; 1], 1.0), (bits![u8, Msb0; 1, 0], 1.0)],
            &[(bits![u8, Msb0; 0, 1], 1.0), (bits![u8, Msb0; 0, 1], 2.0)],
        ];
        for symbols in cases {
            assert!(matches!(
                build(symbols),
                Err(CoderError::ModelConstruction(_))
            ));
        }
        assert!(matches!(
            build(&[(bits![u8, Msb0; 0], 0.0)]),
            Err(CoderError::ModelConstruction(_))
        ));
    }

    #[test]
    fn test_zero_weight_symbols_are_skipped() {
        // a zero-weight prefix of a live symbol is not a conflict
        let trie = build(&[
            (bits![u8, Msb0; 0], 0.0),
            (bits![u8, Msb0; 0, 0], 1.0),
            (bits![u8, Msb0; 1], 1.0),
        ])
        .unwrap();
        assert_eq!(trie.len(), 2);
        let zero = trie.nodes[ROOT].children[0].unwrap();
        assert_eq!(trie.nodes[zero].p, 1.0);

        let symbols = vec![bitvec![u8, Msb0; 0, 0], bitvec![u8, Msb0; 1]];
        let code = encode_values(&trie, &symbols, true).unwrap();
        let decoded =
            decode_values(&trie, &code, DecodeOptions::default().with_count(2)).unwrap();
        assert_eq!(decoded, symbols);

        let mut encoder = crate::Encoder::new(crate::BitWriter::new());
        assert!(trie.encode_value(&bitvec![u8, Msb0; 0, 1], &mut encoder).is_err());
    }

    #[test]
    fn test_value_must_end_on_a_symbol() {
        let trie = build(&[(bits![u8, Msb0; 0], 1.0), (bits![u8, Msb0; 1], 1.0)]).unwrap();
        let mut encoder = crate::Encoder::new(crate::BitWriter::new());
        assert!(matches!(
            trie.encode_value(&bitvec![u8, Msb0; 1, 1], &mut encoder),
            Err(CoderError::Range(_))
        ));
    }
}
