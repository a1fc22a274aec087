//! Data segment image built during compilation.
use crate::{
    constants::{DATA_BASE, WORD_SIZE},
    error::CompileErrorKind,
    memory::Segment,
};

/// Append-only byte region holding globals and string literals.
///
/// Addresses handed out are absolute virtual addresses, so they can be
/// embedded in code as-is. Bytes are frozen once written.
#[derive(Debug)]
pub struct DataSegment {
    bytes: Vec<u8>,
    capacity: usize,
}

impl DataSegment {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::new(),
            capacity,
        }
    }

    /// Virtual address of the next byte to be written.
    #[inline]
    pub fn next_address(&self) -> i64 {
        DATA_BASE + self.bytes.len() as i64
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn push_byte(&mut self, byte: u8) -> Result<(), CompileErrorKind> {
        if self.bytes.len() >= self.capacity {
            return Err(CompileErrorKind::SegmentOverflow(Segment::Data));
        }
        self.bytes.push(byte);
        Ok(())
    }

    /// Reserve one zeroed word for a global variable, returning its address.
    pub fn alloc_word(&mut self) -> Result<i64, CompileErrorKind> {
        self.align()?;
        let addr = self.next_address();
        for _ in 0..WORD_SIZE {
            self.push_byte(0)?;
        }
        Ok(addr)
    }

    /// Close a string literal with its NUL terminator and
    /// realign the segment to a word boundary.
    pub fn terminate_string(&mut self) -> Result<(), CompileErrorKind> {
        self.push_byte(0)?;
        self.align()
    }

    fn align(&mut self) -> Result<(), CompileErrorKind> {
        while self.bytes.len() % WORD_SIZE != 0 {
            self.push_byte(0)?;
        }
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Box<[u8]> {
        self.bytes.into_boxed_slice()
    }
}
