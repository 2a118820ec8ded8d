//! Building blocks shared by the compression and expansion paths.

pub mod bit_io;
pub mod huff_tree;
