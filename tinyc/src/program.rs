//! Compiled program image.

/// Output of the compiler, ready to be loaded into the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Instruction stream, addressed by word index.
    pub code: Box<[i64]>,
    /// Initial contents of the data segment.
    pub data: Box<[u8]>,
    /// Address of the trampoline that calls `main` and exits with its result.
    pub entry: usize,
    /// Address of `main`.
    pub main: usize,
    /// Code address at which each source line's instructions start.
    pub lines: Vec<LineMark>,
}

/// Start of a source line's instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMark {
    pub line: u32,
    pub addr: usize,
}
