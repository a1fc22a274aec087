//! Result and errors.
use std::{
    fmt::{self, Display, Formatter},
    io,
};

use smol_str::SmolStr;

use crate::{constants::MAX_FIELD_WIDTH, memory::Segment};

pub type TinyResult<T> = std::result::Result<T, TinyError>;

pub type CompileResult<T> = std::result::Result<T, CompileError>;

#[derive(Debug)]
pub enum TinyError {
    /// Source program was rejected before execution.
    Compile(CompileError),
    /// VM error during interpreter loop.
    Runtime(RuntimeFault),
    /// Invalid configuration parameters.
    Config(String),
    Io(io::Error),
}

impl TinyError {
    /// Name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Compile(err) => err.kind.stage(),
            Self::Runtime(_) => "runtime",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

impl Display for TinyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile(err) => write!(f, "{err}"),
            Self::Runtime(err) => write!(f, "{err}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for TinyError {}

impl From<CompileError> for TinyError {
    fn from(err: CompileError) -> Self {
        TinyError::Compile(err)
    }
}

impl From<RuntimeFault> for TinyError {
    fn from(err: RuntimeFault) -> Self {
        TinyError::Runtime(err)
    }
}

impl From<io::Error> for TinyError {
    fn from(err: io::Error) -> Self {
        TinyError::Io(err)
    }
}

/// Error raised by the front end, tagged with the source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub line: u32,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, line: u32) -> Self {
        Self { kind, line }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Character that doesn't start any token.
    Lexical(String),
    /// Unexpected token.
    Syntax(String),
    UndefinedSymbol(SmolStr),
    DuplicateDefinition(SmolStr),
    /// A fixed capacity segment is full.
    SegmentOverflow(Segment),
    /// A reserved operand was never patched with its target.
    UnpatchedOperand(usize),
}

impl CompileErrorKind {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Lexical(_) => "lexical",
            Self::Syntax(_) => "syntax",
            Self::UndefinedSymbol(_) | Self::DuplicateDefinition(_) => "semantic",
            Self::SegmentOverflow(_) => "segment",
            Self::UnpatchedOperand(_) => "codegen",
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} error: {}", self.line, self.kind.stage(), self.kind)
    }
}

impl Display for CompileErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical(msg) => write!(f, "{msg}"),
            Self::Syntax(msg) => write!(f, "{msg}"),
            Self::UndefinedSymbol(name) => write!(f, "undefined symbol '{name}'"),
            Self::DuplicateDefinition(name) => write!(f, "duplicate definition of '{name}'"),
            Self::SegmentOverflow(segment) => write!(f, "{segment} segment overflow"),
            Self::UnpatchedOperand(addr) => {
                write!(f, "operand at code address {addr} was never patched")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Fatal error raised while executing bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFault {
    pub kind: FaultKind,
    /// Number of instructions executed when the fault occurred.
    pub cycle: u64,
    /// Address of the faulting instruction.
    pub pc: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    InvalidOpcode(i64),
    /// Load or store outside of every mapped segment.
    OutOfBounds(i64),
    DivisionByZero,
    SegmentOverflow(Segment),
    /// The configured cycle budget was exhausted.
    CycleLimit(u64),
    /// Program counter points outside the code segment.
    BadJump(i64),
    /// A `printf` width or precision beyond the supported maximum.
    FieldWidth(usize),
}

impl Display for RuntimeFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {} (pc {}): runtime fault: {}",
            self.cycle, self.pc, self.kind
        )
    }
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOpcode(op) => write!(f, "invalid opcode {op}"),
            Self::OutOfBounds(addr) => write!(f, "memory access out of bounds at 0x{addr:X}"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::SegmentOverflow(segment) => write!(f, "{segment} segment overflow"),
            Self::CycleLimit(limit) => write!(f, "cycle limit of {limit} exceeded"),
            Self::BadJump(addr) => write!(f, "jump to invalid code address {addr}"),
            Self::FieldWidth(width) => {
                write!(f, "printf field width {width} exceeds the limit of {MAX_FIELD_WIDTH}")
            }
        }
    }
}

impl std::error::Error for RuntimeFault {}
