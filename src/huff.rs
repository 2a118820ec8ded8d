//! Huffman Compression
//!
//! Compression takes two passes over the input.  The first pass counts symbols
//! and builds the tree, the second pass encodes.  The output is
//!
//! * 32 bit magic number `HUFF_TREE`
//! * the tree in preorder, see `tools::huff_tree::write_header`
//! * the codes for each input byte, followed by the code for the pseudo-EOF
//!
//! There is no length field, the decoder stops at the pseudo-EOF, and any bits
//! after it (padding) are ignored.

use std::io::{Cursor,Read,Write,Seek,SeekFrom};
use crate::tools::bit_io::*;
use crate::tools::huff_tree::*;
use crate::{DYNERR,Error};

/// bits in the magic number
pub const BITS_PER_INT: usize = 32;
pub const HUFF_NUMBER: u32 = 0xface8200;
/// magic number that says a tree header follows
pub const HUFF_TREE: u32 = HUFF_NUMBER | 1;

/// verbosity that logs a summary of each transform
pub const DEBUG_LOW: u8 = 1;
/// verbosity that also logs the code table
pub const DEBUG_HIGH: u8 = 4;

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// 0 is quiet, see `DEBUG_LOW` and `DEBUG_HIGH`
    pub verbosity: u8,
    /// starting position in the input file, the second pass rewinds to here
    pub in_offset: u64,
    /// starting position in the output file
    pub out_offset: u64
}

pub const STD_OPTIONS: Options = Options {
    verbosity: 0,
    in_offset: 0,
    out_offset: 0
};

/// Write the code of every word in `src`, then the code of the pseudo-EOF.
fn write_compressed<S,K>(codes: &CodeTable,src: &mut S,sink: &mut K) -> Result<(),DYNERR>
where S: BitSource, K: BitSink {
    while let Some(sym) = src.read_bits(BITS_PER_WORD)? {
        match codes.get(sym as u16) {
            Some(code) => sink.write_code(code)?,
            None => {
                log::error!("symbol {} was not counted",sym);
                return Err(Box::new(Error::MalformedInput(format!("symbol {} appeared after counting",sym))));
            }
        }
    }
    match codes.get(PSEUDO_EOF) {
        Some(code) => sink.write_code(code)?,
        None => return Err(Box::new(Error::MalformedInput("tree has no pseudo-EOF".to_string())))
    }
    Ok(())
}

/// Walk the tree one bit at a time, emitting a word at each leaf, until the pseudo-EOF leaf.
fn read_compressed<S,K>(root: &Node,src: &mut S,sink: &mut K) -> Result<(),DYNERR>
where S: BitSource, K: BitSink {
    // a lone leaf has no children to walk into
    if let Node::Leaf { value, .. } = root {
        if *value == PSEUDO_EOF {
            return Ok(());
        }
        log::error!("tree is a single leaf with value {}",value);
        return Err(Box::new(Error::MalformedInput("bad input, no PSEUDO_EOF".to_string())));
    }
    let mut current = root;
    loop {
        let bit = match src.read_bits(1)? {
            Some(bit) => bit,
            None => {
                log::error!("data ended before PSEUDO_EOF");
                return Err(Box::new(Error::MalformedInput("bad input, no PSEUDO_EOF".to_string())));
            }
        };
        current = match current.child(bit) {
            Some(node) => node,
            None => {
                log::error!("decoder cursor stopped on a leaf");
                return Err(Box::new(Error::MalformedInput("decoder walked past a leaf".to_string())));
            }
        };
        if let Node::Leaf { value, .. } = current {
            if *value == PSEUDO_EOF {
                return Ok(());
            }
            sink.write_bits(BITS_PER_WORD,*value as u64)?;
            current = root;
        }
    }
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut src = BitReader::create(expanded_in,opt.in_offset)?;
    compressed_out.seek(SeekFrom::Start(opt.out_offset))?;
    let mut sink = BitWriter::create(compressed_out);

    log::debug!("counting symbols");
    let freq = FrequencyTable::count(&mut src)?;
    let root = build_tree(&freq);
    let codes = CodeTable::create(&root);
    if opt.verbosity >= DEBUG_HIGH {
        for (sym,code) in codes.iter() {
            log::debug!("{:3} x{}: {:?}",sym,freq.get(sym),code);
        }
    }

    sink.write_bits(BITS_PER_INT,HUFF_TREE as u64)?;
    write_header(&root,&mut sink)?;
    let header_bits = sink.bits_written();

    log::debug!("encoding symbols");
    src.reset()?;
    write_compressed(&codes,&mut src,&mut sink)?;
    let out_size = sink.close()?;
    if opt.verbosity >= DEBUG_LOW {
        log::info!("{} distinct symbols, tree has {} nodes",freq.distinct(),root.size());
        log::info!("read {} bits, wrote {} bits ({} in header)",src.bits_read(),sink.bits_written(),header_bits);
    }
    Ok((freq.total(),out_size))
}

/// Main decompression function.
/// `compressed_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error, where in_size only counts bytes that were actually consumed.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut src = BitReader::create(compressed_in,opt.in_offset)?;
    expanded_out.seek(SeekFrom::Start(opt.out_offset))?;
    let mut sink = BitWriter::create(expanded_out);

    match src.read_bits(BITS_PER_INT)? {
        Some(magic) if magic == HUFF_TREE as u64 => {},
        Some(magic) => {
            log::error!("expected {:#010x}, got {:#010x}",HUFF_TREE,magic);
            return Err(Box::new(Error::MalformedInput(format!("illegal header starts with {:#010x}",magic))));
        },
        None => return Err(Box::new(Error::MalformedInput("missing header".to_string())))
    }
    log::debug!("reading tree");
    let root = read_header(&mut src)?;
    let header_bits = src.bits_read();

    log::debug!("decoding symbols");
    read_compressed(&root,&mut src,&mut sink)?;
    let out_size = sink.close()?;
    if opt.verbosity >= DEBUG_LOW {
        log::info!("tree has {} nodes",root.size());
        log::info!("read {} bits ({} in header), wrote {} bits",src.bits_read(),header_bits,sink.bits_written());
    }
    Ok((src.bits_read().div_ceil(8),out_size))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[cfg(test)]
fn assert_malformed(result: Result<Vec<u8>,DYNERR>) {
    match result {
        Err(e) => assert!(matches!(e.downcast_ref::<Error>(),Some(Error::MalformedInput(_))),"wrong error: {}",e),
        Ok(v) => panic!("expected malformed input, got {} bytes",v.len())
    }
}

#[test]
fn compression_works() {
    let compressed = compress_slice(&[97,97,97,98],&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("FACE8201262C0261E2").unwrap());
}

#[test]
fn compression_works_empty() {
    let compressed = compress_slice(&[],&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("FACE8201C000").unwrap());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let test_data: [u8;4] = [97,97,97,98];
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn invertibility_empty() {
    let compressed = compress_slice(&[],&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert!(expanded.is_empty());
}

#[test]
fn invertibility_one_symbol() {
    let test_data = vec![0u8;1000];
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    // 4 byte magic, 21 bit header, 1000 one-bit codes plus the terminator
    assert_eq!(compressed.len(),4 + (21 + 1001 + 7)/8);
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn invertibility_all_bytes() {
    let mut test_data: Vec<u8> = Vec::new();
    for i in 0..4096usize {
        test_data.push(((i * i + 7 * i) % 251) as u8);
        test_data.push((i % 256) as u8);
    }
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn invertibility_with_offsets() {
    let test_data = "TD0123456789I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let opt = Options {
        verbosity: DEBUG_HIGH,
        in_offset: 12,
        out_offset: 3
    };
    let compressed = compress_slice(test_data,&opt).expect("compression failed");
    assert_eq!(compressed[0..3],[0,0,0]);
    assert_eq!(compressed[3..7],HUFF_TREE.to_be_bytes());
    let opt = Options {
        verbosity: DEBUG_LOW,
        in_offset: 3,
        out_offset: 0
    };
    let expanded = expand_slice(&compressed,&opt).expect("expansion failed");
    assert_eq!(test_data[12..].to_vec(),expanded);
}

#[test]
fn sizes_are_reported() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let mut src = Cursor::new(test_data);
    let mut dst = Cursor::new(Vec::new());
    let (in_size,out_size) = compress(&mut src,&mut dst,&STD_OPTIONS).expect("compression failed");
    assert_eq!(in_size,test_data.len() as u64);
    assert_eq!(out_size,dst.get_ref().len() as u64);
    let compressed = dst.into_inner();
    let mut src = Cursor::new(&compressed);
    let mut dst = Cursor::new(Vec::new());
    let (in_size,out_size) = expand(&mut src,&mut dst,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(in_size,compressed.len() as u64);
    assert_eq!(out_size,test_data.len() as u64);
}

#[test]
fn bad_magic() {
    let mut compressed = compress_slice(&[97,97,97,98],&STD_OPTIONS).expect("compression failed");
    compressed[3] = 0x00;
    let err = expand_slice(&compressed,&STD_OPTIONS).expect_err("expansion should fail");
    assert_eq!(err.to_string(),"malformed input: illegal header starts with 0xface8200");
    assert_malformed(expand_slice(&[0xFA,0xCE],&STD_OPTIONS));
    assert_malformed(expand_slice(&[],&STD_OPTIONS));
}

#[test]
fn truncated_tree() {
    assert_malformed(expand_slice(&hex::decode("FACE8201262C").unwrap(),&STD_OPTIONS));
    assert_malformed(expand_slice(&hex::decode("FACE8201").unwrap(),&STD_OPTIONS));
}

#[test]
fn truncated_body() {
    // header ends exactly on a byte boundary, so dropping the last byte loses the whole body
    assert_malformed(expand_slice(&hex::decode("FACE8201262C0261").unwrap(),&STD_OPTIONS));
    // body 10000000 decodes to "abbb" and then runs out
    assert_malformed(expand_slice(&hex::decode("FACE8201262C026180").unwrap(),&STD_OPTIONS));
}

#[test]
fn lone_leaf_without_eof() {
    // header is a single leaf with value 97
    assert_malformed(expand_slice(&hex::decode("FACE82019840").unwrap(),&STD_OPTIONS));
}

/// Yields `first` until rewound, then `second`, like a file replaced between passes.
#[cfg(test)]
struct ChangingSource {
    first: Cursor<Vec<u8>>,
    second: Cursor<Vec<u8>>,
    rewound: bool
}

#[cfg(test)]
impl Read for ChangingSource {
    fn read(&mut self,buf: &mut [u8]) -> std::io::Result<usize> {
        match self.rewound {
            true => self.second.read(buf),
            false => self.first.read(buf)
        }
    }
}

#[cfg(test)]
impl Seek for ChangingSource {
    fn seek(&mut self,pos: SeekFrom) -> std::io::Result<u64> {
        if self.first.position() > 0 {
            self.rewound = true;
        }
        match self.rewound {
            true => self.second.seek(pos),
            false => self.first.seek(pos)
        }
    }
}

#[test]
fn input_changed_between_passes() {
    let mut src = ChangingSource {
        first: Cursor::new(b"aaaa".to_vec()),
        second: Cursor::new(b"zzzz".to_vec()),
        rewound: false
    };
    let mut dst = Cursor::new(Vec::new());
    let result = compress(&mut src,&mut dst,&STD_OPTIONS).map(|_| dst.into_inner());
    assert_malformed(result);
}
