//! Static Huffman tree
//!
//! This holds everything that depends only on the tree: gathering symbol
//! frequencies, building the tree, deriving the code table, and writing or
//! reading the tree as a preorder header.
//!
//! Symbols are 0..=256, where 256 is the pseudo-EOF that terminates every
//! encoded body.  Equal weights are resolved first-in-first-out: leaves are queued
//! in ascending symbol order, merged nodes are queued after them in the order they
//! are created, and the first node removed always becomes the left child.

use bit_vec::BitVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use super::bit_io::{BitSource,BitSink};
use crate::{DYNERR,Error};

/// bits in a raw symbol
pub const BITS_PER_WORD: usize = 8;
/// number of raw symbols
pub const ALPH_SIZE: usize = 1 << BITS_PER_WORD;
/// end of stream marker, never occurs in the input
pub const PSEUDO_EOF: u16 = ALPH_SIZE as u16;
/// bits used to store a leaf value in the header
pub const SYMBOL_BITS: usize = BITS_PER_WORD + 1;
/// no tree with 257 leaves is deeper than this
const MAX_DEPTH: usize = ALPH_SIZE;

/// Occurrence count of every symbol, the pseudo-EOF is always counted exactly once.
#[derive(Clone,Debug,PartialEq)]
pub struct FrequencyTable {
    counts: Vec<u64>
}

impl FrequencyTable {
    /// Take counts for the raw symbols, any entry for the pseudo-EOF is replaced by 1.
    pub fn from_counts(raw: &[u64]) -> Self {
        let mut counts = vec![0;ALPH_SIZE+1];
        for (sym,count) in raw.iter().take(ALPH_SIZE).enumerate() {
            counts[sym] = *count;
        }
        counts[PSEUDO_EOF as usize] = 1;
        Self {
            counts
        }
    }
    /// Read words until the source ends.  The source is left exhausted, caller must reset it.
    pub fn count<S: BitSource>(src: &mut S) -> Result<Self,std::io::Error> {
        let mut counts = vec![0;ALPH_SIZE+1];
        while let Some(sym) = src.read_bits(BITS_PER_WORD)? {
            counts[sym as usize] += 1;
        }
        Ok(Self::from_counts(&counts))
    }
    pub fn get(&self,sym: u16) -> u64 {
        self.counts[sym as usize]
    }
    /// number of raw symbols counted, i.e., the input length
    pub fn total(&self) -> u64 {
        self.counts[0..ALPH_SIZE].iter().sum()
    }
    /// number of distinct symbols, including the pseudo-EOF
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|c| **c > 0).count()
    }
}

/// Node of the Huffman tree, children are owned by their parent.
#[derive(Clone,Debug,PartialEq)]
pub enum Node {
    Leaf {
        value: u16,
        weight: u64
    },
    Internal {
        weight: u64,
        left: Box<Node>,
        right: Box<Node>
    }
}

impl Node {
    pub fn weight(&self) -> u64 {
        match self {
            Node::Leaf { weight, .. } => *weight,
            Node::Internal { weight, .. } => *weight
        }
    }
    /// left child for bit 0, right child for bit 1, `None` for a leaf
    pub fn child(&self,bit: u64) -> Option<&Node> {
        match self {
            Node::Leaf { .. } => None,
            Node::Internal { left, right, .. } => match bit {
                0 => Some(left.as_ref()),
                _ => Some(right.as_ref())
            }
        }
    }
    /// number of nodes in the tree rooted here
    pub fn size(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Internal { left, right, .. } => 1 + left.size() + right.size()
        }
    }
}

/// Queue entry, ordered so that `BinaryHeap` pops the lightest, then the oldest.
struct Pending {
    weight: u64,
    order: usize,
    node: Node
}

impl PartialEq for Pending {
    fn eq(&self,other: &Self) -> bool {
        self.weight == other.weight && self.order == other.order
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self,other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self,other: &Self) -> Ordering {
        (other.weight,other.order).cmp(&(self.weight,self.order))
    }
}

/// Greedy merge of the two lightest nodes until one remains.
/// If only the pseudo-EOF is present the root is a leaf.
pub fn build_tree(freq: &FrequencyTable) -> Node {
    let mut queue = BinaryHeap::new();
    let mut order = 0;
    for sym in 0..=PSEUDO_EOF {
        let weight = freq.get(sym);
        if weight > 0 {
            queue.push(Pending { weight, order, node: Node::Leaf { value: sym, weight } });
            order += 1;
        }
    }
    loop {
        // the pseudo-EOF leaf means the queue is never empty here
        let lightest = match queue.pop() {
            Some(p) => p.node,
            None => return Node::Leaf { value: PSEUDO_EOF, weight: 1 }
        };
        let next = match queue.pop() {
            Some(p) => p.node,
            None => return lightest
        };
        let weight = lightest.weight() + next.weight();
        queue.push(Pending {
            weight,
            order,
            node: Node::Internal { weight, left: Box::new(lightest), right: Box::new(next) }
        });
        order += 1;
    }
}

/// Map from symbol to its root-to-leaf path, 0 for left and 1 for right.
pub struct CodeTable {
    codes: Vec<Option<BitVec>>
}

impl CodeTable {
    /// Walk the tree collecting paths.  A lone leaf at the root gets the code `0`,
    /// since an empty code could not be written.
    pub fn create(root: &Node) -> Self {
        let mut ans = Self {
            codes: vec![None;ALPH_SIZE+1]
        };
        match root {
            Node::Leaf { value, .. } => {
                ans.codes[*value as usize] = Some(BitVec::from_elem(1,false));
            },
            Node::Internal { .. } => {
                let mut path = BitVec::new();
                ans.walk(root,&mut path);
            }
        }
        ans
    }
    fn walk(&mut self,node: &Node,path: &mut BitVec) {
        match node {
            Node::Leaf { value, .. } => {
                self.codes[*value as usize] = Some(path.clone());
            },
            Node::Internal { left, right, .. } => {
                path.push(false);
                self.walk(left,path);
                path.pop();
                path.push(true);
                self.walk(right,path);
                path.pop();
            }
        }
    }
    pub fn get(&self,sym: u16) -> Option<&BitVec> {
        self.codes.get(sym as usize).and_then(|c| c.as_ref())
    }
    /// (symbol,code) pairs in symbol order
    pub fn iter(&self) -> impl Iterator<Item = (u16,&BitVec)> {
        self.codes.iter().enumerate().filter_map(|(sym,c)| c.as_ref().map(|code| (sym as u16,code)))
    }
}

/// Preorder header: 0 then both subtrees for an internal node, 1 then a 9-bit value for a leaf.
pub fn write_header<S: BitSink>(node: &Node,sink: &mut S) -> Result<(),std::io::Error> {
    match node {
        Node::Leaf { value, .. } => {
            sink.write_bits(1,1)?;
            sink.write_bits(SYMBOL_BITS,*value as u64)
        },
        Node::Internal { left, right, .. } => {
            sink.write_bits(1,0)?;
            write_header(left,sink)?;
            write_header(right,sink)
        }
    }
}

/// Inverse of `write_header`, weights in the result are all 0.
pub fn read_header<S: BitSource>(src: &mut S) -> Result<Node,DYNERR> {
    read_subtree(src,0)
}

fn read_subtree<S: BitSource>(src: &mut S,depth: usize) -> Result<Node,DYNERR> {
    if depth > MAX_DEPTH {
        log::error!("tree header exceeds depth {}",MAX_DEPTH);
        return Err(Box::new(Error::MalformedInput("tree header is too deep".to_string())));
    }
    match src.read_bits(1)? {
        Some(0) => {
            let left = read_subtree(src,depth+1)?;
            let right = read_subtree(src,depth+1)?;
            Ok(Node::Internal { weight: 0, left: Box::new(left), right: Box::new(right) })
        },
        Some(_) => match src.read_bits(SYMBOL_BITS)? {
            Some(value) if value <= PSEUDO_EOF as u64 => Ok(Node::Leaf { value: value as u16, weight: 0 }),
            Some(value) => {
                log::error!("tree header has leaf value {}",value);
                Err(Box::new(Error::MalformedInput(format!("leaf value {} is out of range",value))))
            },
            None => Err(Box::new(Error::MalformedInput("tree header is truncated".to_string())))
        },
        None => Err(Box::new(Error::MalformedInput("tree header is truncated".to_string())))
    }
}

// *************** TESTS *****************

#[cfg(test)]
use crate::tools::bit_io::{BitReader,BitWriter};

#[cfg(test)]
fn freq_of(dat: &[u8]) -> FrequencyTable {
    let mut counts = vec![0;ALPH_SIZE];
    for by in dat {
        counts[*by as usize] += 1;
    }
    FrequencyTable::from_counts(&counts)
}

#[cfg(test)]
fn leaf_weights(node: &Node,ans: &mut Vec<(u16,u64)>) {
    match node {
        Node::Leaf { value, weight } => ans.push((*value,*weight)),
        Node::Internal { left, right, .. } => {
            leaf_weights(left,ans);
            leaf_weights(right,ans);
        }
    }
}

/// Same branching and same leaf values, weights are ignored.
#[cfg(test)]
fn same_shape(n1: &Node,n2: &Node) -> bool {
    match (n1,n2) {
        (Node::Leaf { value: v1, .. },Node::Leaf { value: v2, .. }) => v1 == v2,
        (Node::Internal { left: l1, right: r1, .. },Node::Internal { left: l2, right: r2, .. }) => {
            same_shape(l1,l2) && same_shape(r1,r2)
        },
        _ => false
    }
}

#[test]
fn counting_forces_pseudo_eof() {
    let mut raw = vec![0;ALPH_SIZE+1];
    raw[97] = 3;
    raw[PSEUDO_EOF as usize] = 7;
    let freq = FrequencyTable::from_counts(&raw);
    assert_eq!(freq.get(97),3);
    assert_eq!(freq.get(PSEUDO_EOF),1);
    assert_eq!(freq.total(),3);
    assert_eq!(freq.distinct(),2);

    let mut src = BitReader::create(std::io::Cursor::new(b"aaab".to_vec()),0).expect("create failed");
    let freq = FrequencyTable::count(&mut src).expect("count failed");
    assert_eq!(freq,freq_of(b"aaab"));
    assert_eq!(freq.get(98),1);
}

#[test]
fn small_tree() {
    // 98 and EOF tie at weight 1, 98 was queued first so it goes left
    let root = build_tree(&freq_of(b"aaab"));
    let expected = Node::Internal {
        weight: 5,
        left: Box::new(Node::Internal {
            weight: 2,
            left: Box::new(Node::Leaf { value: 98, weight: 1 }),
            right: Box::new(Node::Leaf { value: PSEUDO_EOF, weight: 1 })
        }),
        right: Box::new(Node::Leaf { value: 97, weight: 3 })
    };
    assert_eq!(root,expected);
    let codes = CodeTable::create(&root);
    assert_eq!(codes.get(97).unwrap().len(),1);
    assert_eq!(codes.get(98).unwrap().len(),2);
    assert_eq!(codes.get(PSEUDO_EOF).unwrap().len(),2);
    assert!(codes.get(99).is_none());
    assert_eq!(codes.iter().count(),3);
}

#[test]
fn single_leaf_tree() {
    let root = build_tree(&freq_of(&[]));
    assert_eq!(root,Node::Leaf { value: PSEUDO_EOF, weight: 1 });
    let codes = CodeTable::create(&root);
    assert_eq!(codes.get(PSEUDO_EOF),Some(&BitVec::from_elem(1,false)));
}

#[test]
fn weight_conservation() {
    let dat = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let root = build_tree(&freq_of(dat));
    let mut leaves = Vec::new();
    leaf_weights(&root,&mut leaves);
    let sum: u64 = leaves.iter().filter(|(v,_)| *v != PSEUDO_EOF).map(|(_,w)| *w).sum();
    assert_eq!(sum,dat.len() as u64);
    assert_eq!(root.weight(),dat.len() as u64 + 1);
}

#[test]
fn prefix_freedom() {
    let dat: Vec<u8> = (0..=255u8).flat_map(|b| std::iter::repeat(b).take(1 + (b as usize % 17))).collect();
    let codes = CodeTable::create(&build_tree(&freq_of(&dat)));
    let all: Vec<(u16,&BitVec)> = codes.iter().collect();
    assert_eq!(all.len(),257);
    for (s1,c1) in &all {
        for (s2,c2) in &all {
            if s1 == s2 {
                continue;
            }
            let is_prefix = c1.len() <= c2.len() && c1.iter().zip(c2.iter()).all(|(a,b)| a==b);
            assert!(!is_prefix,"code for {} is a prefix of code for {}",s1,s2);
        }
    }
}

#[test]
fn header_round_trip() {
    for dat in [&b""[..],&b"aaab"[..],&b"I am Sam. Sam I am. I do not like this Sam I am.\n"[..]] {
        let root = build_tree(&freq_of(dat));
        let mut buf: Vec<u8> = Vec::new();
        let mut sink = BitWriter::create(&mut buf);
        write_header(&root,&mut sink).expect("write failed");
        sink.close().expect("close failed");
        drop(sink);
        let mut src = BitReader::create(std::io::Cursor::new(buf),0).expect("create failed");
        let restored = read_header(&mut src).expect("read failed");
        assert!(same_shape(&root,&restored));
        assert_eq!(restored.size(),root.size());
        assert_eq!(restored.weight(),0);
    }
}

#[test]
fn header_golden() {
    let root = build_tree(&freq_of(b"aaab"));
    let mut buf: Vec<u8> = Vec::new();
    let mut sink = BitWriter::create(&mut buf);
    write_header(&root,&mut sink).expect("write failed");
    assert_eq!(sink.bits_written(),32);
    sink.close().expect("close failed");
    drop(sink);
    assert_eq!(buf,hex::decode("262C0261").unwrap());
}

#[test]
fn truncated_header() {
    let mut src = BitReader::create(std::io::Cursor::new(hex::decode("262C").unwrap()),0).expect("create failed");
    let err = read_header(&mut src).expect_err("header should be rejected");
    assert!(matches!(err.downcast_ref::<Error>(),Some(Error::MalformedInput(_))));
}

#[test]
fn deep_header() {
    let mut src = BitReader::create(std::io::Cursor::new(vec![0u8;64]),0).expect("create failed");
    let err = read_header(&mut src).expect_err("header should be rejected");
    assert_eq!(err.to_string(),"malformed input: tree header is too deep");
}

#[test]
fn leaf_out_of_range() {
    // 1 followed by 9 ones is leaf 511
    let mut src = BitReader::create(std::io::Cursor::new(vec![0xFFu8,0xC0]),0).expect("create failed");
    let err = read_header(&mut src).expect_err("header should be rejected");
    assert!(matches!(err.downcast_ref::<Error>(),Some(Error::MalformedInput(_))));
}

#[test]
fn children_of_nodes() {
    let root = build_tree(&freq_of(b"aaab"));
    let right = root.child(1).expect("root should be internal");
    assert_eq!(right,&Node::Leaf { value: 97, weight: 3 });
    assert!(right.child(0).is_none());
    assert!(right.child(1).is_none());
    assert_eq!(root.child(0).and_then(|n| n.child(1)),Some(&Node::Leaf { value: PSEUDO_EOF, weight: 1 }));
}
