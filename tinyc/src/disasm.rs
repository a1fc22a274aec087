//! Disassembler and source listing.
use std::{
    fmt::{self, Write as FmtWrite},
    iter,
    ops::Range,
};

use itertools::Itertools;

use crate::{bytecode::Opcode, program::Program};

pub struct Disassembler<'a> {
    code: &'a [i64],
}

impl<'a> Disassembler<'a> {
    pub fn new(code: &'a [i64]) -> Self {
        Self { code }
    }

    /// Write a single instruction to the given writer.
    ///
    /// Returns the address of the following instruction.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W, addr: usize) -> Result<usize, fmt::Error> {
        let Some(&word) = self.code.get(addr) else {
            return Ok(addr + 1);
        };

        match Opcode::try_from(word) {
            Ok(op) if op.has_operand() => {
                match self.code.get(addr + 1) {
                    Some(operand) => writeln!(w, "{addr:>6}    {:<4} {operand}", op.mnemonic())?,
                    None => writeln!(w, "{addr:>6}    {:<4} ?", op.mnemonic())?,
                }
                Ok(addr + 2)
            }
            Ok(op) => {
                writeln!(w, "{addr:>6}    {}", op.mnemonic())?;
                Ok(addr + 1)
            }
            Err(_) => {
                writeln!(w, "{addr:>6}    .word {word}")?;
                Ok(addr + 1)
            }
        }
    }

    pub fn write_range<W: FmtWrite>(&self, w: &mut W, range: Range<usize>) -> fmt::Result {
        let mut addr = range.start;
        while addr < range.end.min(self.code.len()) {
            addr = self.disassemble(w, addr)?;
        }
        Ok(())
    }

    pub fn write_all<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        self.write_range(w, 0..self.code.len())
    }
}

/// Write each source line followed by the instructions compiled from it.
pub fn write_listing<W: FmtWrite>(w: &mut W, source: &[u8], program: &Program) -> fmt::Result {
    let dis = Disassembler::new(&program.code);
    let text = String::from_utf8_lossy(source);
    let mut lines = (1u32..).zip(text.lines()).peekable();

    // Each mark's code runs up to the next mark, the last one up to the trampoline.
    let ends = program
        .lines
        .iter()
        .skip(1)
        .map(|mark| mark.addr)
        .chain(iter::once(program.entry));

    for (mark, end) in program.lines.iter().zip(ends) {
        for (number, line) in lines.peeking_take_while(|(number, _)| *number <= mark.line) {
            writeln!(w, "{number:>4}: {line}")?;
        }
        dis.write_range(w, mark.addr..end)?;
    }

    for (number, line) in lines {
        writeln!(w, "{number:>4}: {line}")?;
    }

    writeln!(w, "entry:")?;
    dis.write_range(w, program.entry..program.code.len())
}

/// Render the whole listing as a string.
pub fn listing(source: &[u8], program: &Program) -> String {
    let mut out = String::new();
    // Writing to a string can't fail.
    let _ = write_listing(&mut out, source, program);
    out
}
