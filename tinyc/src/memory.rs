//! Bounds checked memory segments.
//!
//! Programs address memory through absolute virtual addresses. Each segment
//! owns a fixed byte buffer mapped at its base address, and every access is
//! resolved to exactly one segment before touching the buffer.
use std::fmt;

use crate::{constants::*, error::FaultKind};

/// Identity of a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Code,
    Data,
    Heap,
    Stack,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Code => write!(f, "code"),
            Self::Data => write!(f, "data"),
            Self::Heap => write!(f, "heap"),
            Self::Stack => write!(f, "stack"),
        }
    }
}

/// Fixed size byte buffer mapped at a virtual base address.
pub(crate) struct Region {
    pub(crate) base: i64,
    pub(crate) bytes: Box<[u8]>,
}

impl Region {
    fn new(base: i64, size: usize) -> Self {
        Self {
            base,
            bytes: vec![0; size].into_boxed_slice(),
        }
    }

    /// Virtual address one past the last byte.
    #[inline]
    pub(crate) fn end(&self) -> i64 {
        self.base + self.bytes.len() as i64
    }

    /// Translate a virtual address range to a buffer range.
    #[inline]
    fn offset(&self, addr: i64, len: usize) -> Option<usize> {
        if addr >= self.base && addr.checked_add(len as i64)? <= self.end() {
            Some((addr - self.base) as usize)
        } else {
            None
        }
    }
}

/// Data, heap and stack memory of the machine.
pub struct Memory {
    pub(crate) data: Region,
    pub(crate) heap: Region,
    pub(crate) stack: Region,
    /// Offset of the next free byte in the heap.
    heap_top: usize,
}

pub type MemResult<T> = Result<T, FaultKind>;

impl Memory {
    pub fn new(data_size: usize, heap_size: usize, stack_size: usize) -> Self {
        Self {
            data: Region::new(DATA_BASE, data_size),
            heap: Region::new(HEAP_BASE, heap_size),
            stack: Region::new(STACK_BASE, stack_size),
            heap_top: 0,
        }
    }

    /// Erase all segments and release every heap allocation.
    pub fn clear(&mut self) {
        self.data.bytes.fill(0);
        self.heap.bytes.fill(0);
        self.stack.bytes.fill(0);
        self.heap_top = 0;
    }

    /// Copy a program's data image to the start of the data segment.
    pub fn load_data(&mut self, image: &[u8]) -> MemResult<()> {
        match self.data.bytes.get_mut(..image.len()) {
            Some(dest) => {
                dest.copy_from_slice(image);
                Ok(())
            }
            None => Err(FaultKind::SegmentOverflow(Segment::Data)),
        }
    }

    /// Lowest and one-past-highest virtual address of the stack.
    pub fn stack_bounds(&self) -> (i64, i64) {
        (self.stack.base, self.stack.end())
    }

    /// Find the segment containing the whole address range.
    fn region(&self, addr: i64, len: usize) -> MemResult<(&Region, usize)> {
        [&self.data, &self.heap, &self.stack]
            .into_iter()
            .find_map(|region| region.offset(addr, len).map(|offset| (region, offset)))
            .ok_or(FaultKind::OutOfBounds(addr))
    }

    fn region_mut(&mut self, addr: i64, len: usize) -> MemResult<(&mut Region, usize)> {
        [&mut self.data, &mut self.heap, &mut self.stack]
            .into_iter()
            .find_map(|region| region.offset(addr, len).map(|offset| (region, offset)))
            .ok_or(FaultKind::OutOfBounds(addr))
    }

    /// Borrow `len` bytes starting at the given address.
    pub fn slice(&self, addr: i64, len: usize) -> MemResult<&[u8]> {
        let (region, offset) = self.region(addr, len)?;
        Ok(&region.bytes[offset..offset + len])
    }

    pub fn slice_mut(&mut self, addr: i64, len: usize) -> MemResult<&mut [u8]> {
        let (region, offset) = self.region_mut(addr, len)?;
        Ok(&mut region.bytes[offset..offset + len])
    }

    /// Borrow a NUL terminated string, excluding the terminator.
    ///
    /// A string running off the end of its segment is out of bounds.
    pub fn c_str(&self, addr: i64) -> MemResult<&[u8]> {
        let (region, offset) = self.region(addr, 1)?;
        let tail = &region.bytes[offset..];
        match tail.iter().position(|b| *b == 0) {
            Some(len) => Ok(&tail[..len]),
            None => Err(FaultKind::OutOfBounds(region.end())),
        }
    }

    #[inline]
    pub fn load_int(&self, addr: i64) -> MemResult<i64> {
        let bytes = self.slice(addr, WORD_SIZE)?;
        let mut word = [0; WORD_SIZE];
        word.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(word))
    }

    /// Chars are signed and sign extended into a word.
    #[inline]
    pub fn load_char(&self, addr: i64) -> MemResult<i64> {
        let bytes = self.slice(addr, CHAR_SIZE)?;
        Ok(bytes[0] as i8 as i64)
    }

    #[inline]
    pub fn store_int(&mut self, addr: i64, value: i64) -> MemResult<()> {
        self.slice_mut(addr, WORD_SIZE)?
            .copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Only the low byte of the value is stored.
    #[inline]
    pub fn store_char(&mut self, addr: i64, value: i64) -> MemResult<()> {
        self.slice_mut(addr, CHAR_SIZE)?[0] = value as u8;
        Ok(())
    }

    /// Bump allocate from the heap, returning `None` when it is exhausted.
    ///
    /// Allocations are word aligned, and zero sized requests still
    /// receive a unique address.
    pub fn alloc(&mut self, size: i64) -> Option<i64> {
        let size = usize::try_from(size).ok()?.max(1);
        let aligned = size.checked_add(WORD_SIZE - 1)? & !(WORD_SIZE - 1);
        let end = self.heap_top.checked_add(aligned)?;
        if end > self.heap.bytes.len() {
            return None;
        }
        let addr = self.heap.base + self.heap_top as i64;
        self.heap_top = end;
        Some(addr)
    }

    /// Number of heap bytes handed out so far.
    pub fn heap_used(&self) -> usize {
        self.heap_top
    }
}
