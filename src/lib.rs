//! # Huffpack
//!
//! Lossless compression of arbitrary byte streams using a static Huffman tree.
//! The tree is built from a first pass over the input, stored as a compact
//! preorder header, and then used to encode a second pass over the input.
//!
//! The main entry points are in the `huff` module, e.g. `huff::compress` and
//! `huff::expand` for streams, or `huff::compress_slice` and `huff::expand_slice`
//! for buffers.

pub mod tools;
pub mod huff;

type DYNERR = Box<dyn std::error::Error>;

/// Errors raised while transforming data
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("malformed input: {0}")]
    MalformedInput(String)
}
