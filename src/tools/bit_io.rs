//! Bit level streams
//!
//! The Huffman coder only sees `BitSource` and `BitSink`.  The concrete
//! `BitReader` and `BitWriter` wrap buffered std streams, bits are always
//! packed MSB first, and the last partial byte is padded with zeros.

use bit_vec::BitVec;
use std::io::{Read,Write,Seek,SeekFrom,BufReader,BufWriter,ErrorKind};

/// A readable stream of bits that can be rewound
pub trait BitSource {
    /// Read `num_bits` (at most 64) and return them as the low bits of the result.
    /// Returns `None` if the stream ends before all the bits are available.
    fn read_bits(&mut self,num_bits: usize) -> Result<Option<u64>,std::io::Error>;
    /// Rewind to the start of the stream
    fn reset(&mut self) -> Result<(),std::io::Error>;
}

/// A writable stream of bits
pub trait BitSink {
    /// Write the low `num_bits` (at most 64) of `val`, most significant first.
    fn write_bits(&mut self,num_bits: usize,val: u64) -> Result<(),std::io::Error>;
    /// Write a code of any length, in chunks of at most 64 bits.
    fn write_code(&mut self,code: &BitVec) -> Result<(),std::io::Error> {
        let mut chunk: u64 = 0;
        let mut num_bits = 0;
        for bit in code.iter() {
            chunk = (chunk << 1) | bit as u64;
            num_bits += 1;
            if num_bits == 64 {
                self.write_bits(num_bits,chunk)?;
                chunk = 0;
                num_bits = 0;
            }
        }
        if num_bits > 0 {
            self.write_bits(num_bits,chunk)?;
        }
        Ok(())
    }
    /// Pad and flush, returns the number of bytes written over the life of the sink
    fn close(&mut self) -> Result<u64,std::io::Error>;
}

/// Reads bits from any `Read + Seek`, starting at a fixed offset
pub struct BitReader<R: Read + Seek> {
    reader: BufReader<R>,
    start: u64,
    bits: BitVec,
    ptr: usize,
    count: u64
}

/// Writes bits to any `Write`
pub struct BitWriter<W: Write> {
    writer: BufWriter<W>,
    bits: BitVec,
    count: u64,
    bytes: u64
}

impl <R: Read + Seek> BitReader<R> {
    /// Wrap `inner` and position it at `start`, which is also where `reset` goes back to.
    pub fn create(inner: R,start: u64) -> Result<Self,std::io::Error> {
        let mut reader = BufReader::new(inner);
        reader.seek(SeekFrom::Start(start))?;
        Ok(Self {
            reader,
            start,
            bits: BitVec::new(),
            ptr: 0,
            count: 0
        })
    }
    /// total bits delivered since creation, not counting resets
    pub fn bits_read(&self) -> u64 {
        self.count
    }
    /// Get the next bit, loading another byte from the stream as needed.
    fn get_bit(&mut self) -> Result<Option<bool>,std::io::Error> {
        if self.ptr >= self.bits.len() {
            let mut by: [u8;1] = [0];
            match self.reader.read_exact(&mut by) {
                Ok(()) => {
                    self.bits = BitVec::from_bytes(&by);
                    self.ptr = 0;
                },
                Err(e) if e.kind()==ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e)
            }
        }
        let bit = self.bits.get(self.ptr);
        self.ptr += 1;
        self.count += 1;
        Ok(bit)
    }
}

impl <R: Read + Seek> BitSource for BitReader<R> {
    fn read_bits(&mut self,num_bits: usize) -> Result<Option<u64>,std::io::Error> {
        if num_bits > 64 {
            return Err(std::io::Error::new(ErrorKind::InvalidInput,"cannot read more than 64 bits at once"));
        }
        let mut ans: u64 = 0;
        for _i in 0..num_bits {
            match self.get_bit()? {
                Some(bit) => ans = (ans << 1) | bit as u64,
                None => return Ok(None)
            }
        }
        Ok(Some(ans))
    }
    fn reset(&mut self) -> Result<(),std::io::Error> {
        self.reader.seek(SeekFrom::Start(self.start))?;
        self.bits = BitVec::new();
        self.ptr = 0;
        Ok(())
    }
}

impl <W: Write> BitWriter<W> {
    /// Wrap `inner`, writing begins at its current position.
    pub fn create(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
            bits: BitVec::new(),
            count: 0,
            bytes: 0
        }
    }
    /// total bits accepted since creation, not counting padding
    pub fn bits_written(&self) -> u64 {
        self.count
    }
    fn put_bit(&mut self,bit: bool) -> Result<(),std::io::Error> {
        self.bits.push(bit);
        self.count += 1;
        if self.bits.len() == 8 {
            self.writer.write_all(&self.bits.to_bytes())?;
            self.bytes += 1;
            self.bits = BitVec::new();
        }
        Ok(())
    }
}

impl <W: Write> BitSink for BitWriter<W> {
    fn write_bits(&mut self,num_bits: usize,val: u64) -> Result<(),std::io::Error> {
        if num_bits > 64 {
            return Err(std::io::Error::new(ErrorKind::InvalidInput,"cannot write more than 64 bits at once"));
        }
        for i in (0..num_bits).rev() {
            self.put_bit((val >> i) & 1 == 1)?;
        }
        Ok(())
    }
    fn close(&mut self) -> Result<u64,std::io::Error> {
        if self.bits.len() > 0 {
            // to_bytes pads with zeros
            self.writer.write_all(&self.bits.to_bytes())?;
            self.bytes += 1;
            self.bits = BitVec::new();
        }
        self.writer.flush()?;
        Ok(self.bytes)
    }
}

// *************** TESTS *****************

#[cfg(test)]
use std::io::Cursor;

#[test]
fn msb_first_with_padding() {
    let mut ans: Vec<u8> = Vec::new();
    let mut writer = BitWriter::create(&mut ans);
    writer.write_bits(3,0b101).expect("write failed");
    writer.write_bits(2,0b11).expect("write failed");
    writer.write_bits(9,0x100).expect("write failed");
    assert_eq!(writer.bits_written(),14);
    assert_eq!(writer.close().expect("close failed"),2);
    drop(writer);
    assert_eq!(ans,vec![0b1011_1100,0b0000_0000]);
}

#[test]
fn long_codes_are_chunked() {
    let mut code = BitVec::from_elem(70,false);
    code.set(0,true);
    code.set(69,true);
    let mut ans: Vec<u8> = Vec::new();
    let mut writer = BitWriter::create(&mut ans);
    writer.write_code(&code).expect("write failed");
    writer.close().expect("close failed");
    drop(writer);
    let mut reader = BitReader::create(Cursor::new(ans),0).expect("create failed");
    assert_eq!(reader.read_bits(1).unwrap(),Some(1));
    assert_eq!(reader.read_bits(64).unwrap(),Some(0));
    assert_eq!(reader.read_bits(5).unwrap(),Some(1));
}

#[test]
fn end_of_stream() {
    let mut reader = BitReader::create(Cursor::new(vec![0xA5u8]),0).expect("create failed");
    assert_eq!(reader.read_bits(4).unwrap(),Some(0xA));
    assert_eq!(reader.read_bits(5).unwrap(),None);
    assert_eq!(reader.read_bits(1).unwrap(),None);
}

#[test]
fn reset_returns_to_offset() {
    let mut reader = BitReader::create(Cursor::new(vec![0x00u8,0xFA,0xCE]),1).expect("create failed");
    assert_eq!(reader.read_bits(16).unwrap(),Some(0xFACE));
    assert_eq!(reader.read_bits(8).unwrap(),None);
    reader.reset().expect("reset failed");
    assert_eq!(reader.read_bits(8).unwrap(),Some(0xFA));
    assert_eq!(reader.bits_read(),24);
}
