//! Instruction encoder.
use std::collections::BTreeSet;

use crate::{bytecode::Opcode, error::CompileErrorKind, memory::Segment};

pub type EncodeResult<T> = Result<T, CompileErrorKind>;

/// Appends instructions to a fixed capacity code segment.
///
/// Operands that refer to code not emitted yet are written as
/// placeholders with [`Encoder::reserve`], and filled in later
/// with [`Encoder::patch`]. The encoder refuses to hand over
/// its code while any placeholder is still open.
#[derive(Debug)]
pub struct Encoder {
    code: Vec<i64>,
    capacity: usize,
    /// Address of the most recent instruction, and its opcode.
    last: Option<(usize, Opcode)>,
    /// Operand slots that still hold placeholders.
    pending: BTreeSet<usize>,
}

impl Encoder {
    /// Creates an encoder that can hold `capacity` words.
    pub fn new(capacity: usize) -> Self {
        Self {
            code: Vec::new(),
            capacity,
            last: None,
            pending: BTreeSet::new(),
        }
    }

    /// Address at which the next instruction will be written.
    #[inline]
    pub fn here(&self) -> usize {
        self.code.len()
    }

    fn push(&mut self, word: i64) -> EncodeResult<()> {
        if self.code.len() >= self.capacity {
            return Err(CompileErrorKind::SegmentOverflow(Segment::Code));
        }
        self.code.push(word);
        Ok(())
    }

    /// Append an instruction without an operand, returning its address.
    pub fn emit(&mut self, op: Opcode) -> EncodeResult<usize> {
        debug_assert!(!op.has_operand(), "{op} requires an operand");
        let addr = self.here();
        self.push(op.word())?;
        self.last = Some((addr, op));
        Ok(addr)
    }

    /// Append an instruction with its operand, returning its address.
    pub fn emit_with(&mut self, op: Opcode, operand: i64) -> EncodeResult<usize> {
        debug_assert!(op.has_operand(), "{op} takes no operand");
        let addr = self.here();
        self.push(op.word())?;
        self.push(operand)?;
        self.last = Some((addr, op));
        Ok(addr)
    }

    /// Append an instruction whose operand isn't known yet.
    ///
    /// Returns the address of the operand slot, to be given to [`Encoder::patch`].
    pub fn reserve(&mut self, op: Opcode) -> EncodeResult<usize> {
        let addr = self.emit_with(op, 0)?;
        let slot = addr + 1;
        self.pending.insert(slot);
        Ok(slot)
    }

    /// Write the true value into a reserved operand slot.
    pub fn patch(&mut self, slot: usize, value: i64) {
        debug_assert!(self.pending.contains(&slot), "slot {slot} was not reserved");
        self.pending.remove(&slot);
        self.code[slot] = value;
    }

    /// Point a reserved jump operand at the next instruction.
    ///
    /// The last instruction is then no longer the only way to get here,
    /// so a trailing load can't be taken back anymore.
    pub fn patch_here(&mut self, slot: usize) {
        let here = self.here() as i64;
        self.patch(slot, here);
        self.last = None;
    }

    /// Remove the trailing load instruction, returning it.
    ///
    /// The expression parser leaves an lvalue's address in the accumulator
    /// followed by an `LI` or `LC`. Taking the load back off recovers the
    /// address for assignment, address-of and increments. Returns `None`
    /// and leaves the code untouched when the last instruction isn't a load.
    pub fn take_load(&mut self) -> Option<Opcode> {
        match self.last {
            Some((addr, op @ (Opcode::Li | Opcode::Lc))) if addr + 1 == self.code.len() => {
                self.code.pop();
                self.last = None;
                Some(op)
            }
            _ => None,
        }
    }

    /// Hand over the finished code segment.
    pub fn finish(self) -> EncodeResult<Box<[i64]>> {
        match self.pending.iter().next() {
            Some(slot) => Err(CompileErrorKind::UnpatchedOperand(*slot)),
            None => Ok(self.code.into_boxed_slice()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_emit_returns_addresses() {
        let mut enc = Encoder::new(16);
        assert_eq!(enc.emit_with(Opcode::Imm, 7), Ok(0));
        assert_eq!(enc.emit(Opcode::Push), Ok(2));
        assert_eq!(enc.here(), 3);
        assert_eq!(&*enc.finish().unwrap(), &[Opcode::Imm.word(), 7, Opcode::Push.word()]);
    }

    #[test]
    fn test_reserve_and_patch() {
        let mut enc = Encoder::new(16);
        let slot = enc.reserve(Opcode::Jz).unwrap();
        enc.emit(Opcode::Lev).unwrap();

        // Unpatched forward jump must not escape.
        let mut open = Encoder::new(16);
        let open_slot = open.reserve(Opcode::Jmp).unwrap();
        assert_eq!(open.finish(), Err(CompileErrorKind::UnpatchedOperand(open_slot)));

        enc.patch_here(slot);
        let code = enc.finish().unwrap();
        assert_eq!(&*code, &[Opcode::Jz.word(), 3, Opcode::Lev.word()]);
    }

    #[test]
    fn test_take_load() {
        let mut enc = Encoder::new(16);
        enc.emit_with(Opcode::Lea, -1).unwrap();
        enc.emit(Opcode::Li).unwrap();
        assert_eq!(enc.take_load(), Some(Opcode::Li));
        assert_eq!(enc.here(), 2);
        // Only one load can be taken back.
        assert_eq!(enc.take_load(), None);

        // An operand that happens to equal the LI encoding is not a load.
        enc.emit_with(Opcode::Imm, Opcode::Li.word()).unwrap();
        assert_eq!(enc.take_load(), None);
    }

    #[test]
    fn test_jump_target_blocks_take_load() {
        let mut enc = Encoder::new(16);
        let skip = enc.reserve(Opcode::Jz).unwrap();
        enc.emit_with(Opcode::Lea, -1).unwrap();
        enc.emit(Opcode::Li).unwrap();
        enc.patch_here(skip);
        assert_eq!(enc.take_load(), None);
        assert_eq!(enc.here(), 5);
    }

    #[test]
    fn test_capacity() {
        let mut enc = Encoder::new(3);
        enc.emit_with(Opcode::Imm, 1).unwrap();
        assert_eq!(
            enc.emit_with(Opcode::Imm, 2),
            Err(CompileErrorKind::SegmentOverflow(Segment::Code))
        );
    }
}
