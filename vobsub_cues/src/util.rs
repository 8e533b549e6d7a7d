//! Miscellaneous utilities: bounds-checked cursors and log formatting.

use nom::bits::complete::take;
use nom::IResult;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{AddAssign, Shl, Shr};

use crate::errors::{Error, Result};

/// Wrapper to force a `&[u8]` to display as nicely-formatted hexadecimal
/// bytes, showing only the first 16 bytes and the total length.
pub struct HexPreview<'a>(pub &'a [u8]);

impl<'a> fmt::Debug for HexPreview<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let HexPreview(bytes) = *self;
        for byte in bytes.iter().take(16) {
            write!(f, "{:02x} ", byte)?;
        }
        write!(f, "({} bytes)", bytes.len())
    }
}

/// Input for `nom` bit-level parsers: a byte slice plus a bit offset.
pub type BitInput<'a> = (&'a [u8], usize);

/// Parse an unsigned big-endian field `count` bits wide.
pub fn bit_field<O>(input: BitInput, count: usize) -> IResult<BitInput, O>
where
    O: From<u8> + AddAssign + Shl<usize, Output = O> + Shr<usize, Output = O>,
{
    take(count)(input)
}

/// The unit a `Cursor` reads at a time.
pub trait Granularity {
    /// How many units fit in one byte.
    const PER_BYTE: usize;

    /// Fetch unit number `pos` from `data`.  `pos` is always in bounds.
    fn unit(data: &[u8], pos: usize) -> u8;
}

/// Read whole bytes.
#[derive(Debug, Clone)]
pub enum Bytes {}

impl Granularity for Bytes {
    const PER_BYTE: usize = 1;

    fn unit(data: &[u8], pos: usize) -> u8 {
        data[pos]
    }
}

/// Read 4-bit nibbles, high nibble first.
#[derive(Debug, Clone)]
pub enum Nibbles {}

impl Granularity for Nibbles {
    const PER_BYTE: usize = 2;

    fn unit(data: &[u8], pos: usize) -> u8 {
        let byte = data[pos / 2];
        if pos % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0f
        }
    }
}

/// A read position within a borrowed buffer.  Every read is bounds-checked
/// and reports `Error::TruncatedStream` instead of panicking.
#[derive(Debug, Clone)]
pub struct Cursor<'a, G> {
    data: &'a [u8],
    /// Position in units of `G`.
    pos: usize,
    _granularity: PhantomData<G>,
}

/// A cursor over bytes.
pub type ByteCursor<'a> = Cursor<'a, Bytes>;

/// A cursor over nibbles.
pub type NibbleCursor<'a> = Cursor<'a, Nibbles>;

impl<'a, G: Granularity> Cursor<'a, G> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Cursor {
            data,
            pos: 0,
            _granularity: PhantomData,
        }
    }

    /// Our current position, in units.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The total length of our buffer, in units.
    pub fn len(&self) -> usize {
        self.data.len() * G::PER_BYTE
    }

    /// The number of units left to read.
    pub fn remaining(&self) -> usize {
        self.len() - self.pos
    }

    /// Have we consumed everything?
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read a single unit.
    pub fn read(&mut self, what: &'static str) -> Result<u8> {
        if self.is_empty() {
            return Err(Error::truncated(what));
        }
        let value = G::unit(self.data, self.pos);
        self.pos += 1;
        Ok(value)
    }

    /// Skip `count` units.
    pub fn skip(&mut self, count: usize, what: &'static str) -> Result<()> {
        if count > self.remaining() {
            return Err(Error::truncated(what));
        }
        self.pos += count;
        Ok(())
    }

    /// Move to the absolute position `pos`.
    pub fn seek(&mut self, pos: usize, what: &'static str) -> Result<()> {
        if pos > self.len() {
            return Err(Error::truncated(what));
        }
        self.pos = pos;
        Ok(())
    }
}

impl<'a> ByteCursor<'a> {
    /// Read a big-endian `u16`.
    pub fn read_be_u16(&mut self, what: &'static str) -> Result<u16> {
        let bytes = self.take(2, what)?;
        Ok(u16::from(bytes[0]) << 8 | u16::from(bytes[1]))
    }

    /// Borrow the next `count` bytes.
    pub fn take(&mut self, count: usize, what: &'static str) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(Error::truncated(what));
        }
        let taken = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(taken)
    }

    /// Everything we haven't read yet.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Run a `nom` parser on the remaining input, and advance past whatever
    /// it consumes.  Our parsers can only fail by running out of input, so
    /// every failure is reported as truncation.
    pub fn parse<O, F>(&mut self, what: &'static str, mut parser: F) -> Result<O>
    where
        F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
    {
        let input = self.rest();
        match parser(input) {
            Ok((rest, value)) => {
                self.pos += input.len() - rest.len();
                Ok(value)
            }
            Err(_) => Err(Error::truncated(what)),
        }
    }
}

impl<'a> NibbleCursor<'a> {
    /// Skip to the start of the next byte, if we're in the middle of one.
    pub fn align(&mut self) {
        if self.pos % 2 == 1 {
            self.pos = (self.pos + 1).min(self.len());
        }
    }
}

#[test]
fn byte_cursor_reads_are_bounds_checked() {
    let mut cursor = ByteCursor::new(&[0x12, 0x34, 0x56]);
    assert_eq!(cursor.read_be_u16("test").unwrap(), 0x1234);
    assert_eq!(cursor.remaining(), 1);
    assert!(cursor.take(2, "test").is_err());
    assert_eq!(cursor.read("test").unwrap(), 0x56);
    assert!(cursor.is_empty());
    match cursor.read("end") {
        Err(Error::TruncatedStream { what }) => assert_eq!(what, "end"),
        other => panic!("expected truncation, got {:?}", other),
    }
}

#[test]
fn nibble_cursor_reads_high_nibble_first() {
    let mut cursor = NibbleCursor::new(&[0xab, 0xcd]);
    assert_eq!(cursor.len(), 4);
    assert_eq!(cursor.read("n").unwrap(), 0xa);
    cursor.align();
    assert_eq!(cursor.position(), 2);
    assert_eq!(cursor.read("n").unwrap(), 0xc);
    assert_eq!(cursor.read("n").unwrap(), 0xd);
    cursor.align();
    assert!(cursor.is_empty());
    assert!(cursor.read("n").is_err());
}

#[test]
fn bit_fields_straddle_bytes() {
    let input = &[0b1010_1100, 0b0011_0000][..];
    let (rest, high): (_, u8) = bit_field((input, 0), 3).unwrap();
    assert_eq!(high, 0b101);
    let (rest, mid): (_, u16) = bit_field(rest, 9).unwrap();
    assert_eq!(mid, 0b0_1100_0011);
    assert_eq!(rest, (&[0b0011_0000][..], 4));
    assert!(bit_field::<u16>(rest, 5).is_err());
}

#[test]
fn hex_preview_truncates_long_slices() {
    let bytes = [0u8; 20];
    let formatted = format!("{:?}", HexPreview(&bytes));
    assert!(formatted.starts_with("00 00 "));
    assert!(formatted.ends_with("(20 bytes)"));
}
