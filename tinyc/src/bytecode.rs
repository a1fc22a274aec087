//! Instruction set.
use std::fmt;

/// Virtual machine operation.
///
/// Instructions are encoded as one word holding the opcode, optionally
/// followed by one operand word. Only the opcodes up to and including
/// [`Opcode::Adj`] take an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Opcode {
    // ------------------------------------------------------------------------
    // With operand
    Lea = 0, // ax = bp + n words
    Imm,     // ax = n
    Jmp,     // pc = a
    Call,    // push pc; pc = a
    Jz,      // if ax == 0 { pc = a }
    Jnz,     // if ax != 0 { pc = a }
    Ent,     // push bp; bp = sp; sp -= n words
    Adj,     // sp += n words

    // ------------------------------------------------------------------------
    // Without operand
    Lev,     // sp = bp; pop bp; pop pc
    Li,      // ax = *(int *)ax
    Lc,      // ax = *(char *)ax
    Si,      // *(int *)pop = ax
    Sc,      // *(char *)pop = ax
    Push,    // push ax

    // Binary operators, left operand popped from the stack.
    Or,
    Xor,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // ------------------------------------------------------------------------
    // Syscalls
    Open,
    Read,
    Clos,
    Prtf,
    Malc,
    Free,
    Mset,
    Mcmp,
    Exit,
}

impl Opcode {
    /// Every opcode, indexed by its encoding.
    #[rustfmt::skip]
    pub const ALL: [Opcode; 39] = [
        Self::Lea, Self::Imm, Self::Jmp, Self::Call, Self::Jz, Self::Jnz, Self::Ent, Self::Adj,
        Self::Lev, Self::Li, Self::Lc, Self::Si, Self::Sc, Self::Push,
        Self::Or, Self::Xor, Self::And, Self::Eq, Self::Ne, Self::Lt, Self::Gt, Self::Le,
        Self::Ge, Self::Shl, Self::Shr, Self::Add, Self::Sub, Self::Mul, Self::Div, Self::Mod,
        Self::Open, Self::Read, Self::Clos, Self::Prtf, Self::Malc, Self::Free, Self::Mset,
        Self::Mcmp, Self::Exit,
    ];

    /// Encoded word value.
    #[inline(always)]
    pub fn word(self) -> i64 {
        self as u8 as i64
    }

    /// Whether the opcode is followed by an operand word.
    #[inline(always)]
    pub fn has_operand(self) -> bool {
        self as u8 <= Self::Adj as u8
    }

    /// Whether the opcode is a builtin call into the host.
    #[inline]
    pub fn is_syscall(self) -> bool {
        self as u8 >= Self::Open as u8
    }

    #[rustfmt::skip]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Lea  => "LEA",
            Self::Imm  => "IMM",
            Self::Jmp  => "JMP",
            Self::Call => "CALL",
            Self::Jz   => "JZ",
            Self::Jnz  => "JNZ",
            Self::Ent  => "ENT",
            Self::Adj  => "ADJ",
            Self::Lev  => "LEV",
            Self::Li   => "LI",
            Self::Lc   => "LC",
            Self::Si   => "SI",
            Self::Sc   => "SC",
            Self::Push => "PUSH",
            Self::Or   => "OR",
            Self::Xor  => "XOR",
            Self::And  => "AND",
            Self::Eq   => "EQ",
            Self::Ne   => "NE",
            Self::Lt   => "LT",
            Self::Gt   => "GT",
            Self::Le   => "LE",
            Self::Ge   => "GE",
            Self::Shl  => "SHL",
            Self::Shr  => "SHR",
            Self::Add  => "ADD",
            Self::Sub  => "SUB",
            Self::Mul  => "MUL",
            Self::Div  => "DIV",
            Self::Mod  => "MOD",
            Self::Open => "OPEN",
            Self::Read => "READ",
            Self::Clos => "CLOS",
            Self::Prtf => "PRTF",
            Self::Malc => "MALC",
            Self::Free => "FREE",
            Self::Mset => "MSET",
            Self::Mcmp => "MCMP",
            Self::Exit => "EXIT",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl From<Opcode> for i64 {
    fn from(op: Opcode) -> Self {
        op.word()
    }
}

impl TryFrom<i64> for Opcode {
    type Error = InvalidOpcode;

    fn try_from(word: i64) -> Result<Self, Self::Error> {
        usize::try_from(word)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(InvalidOpcode(word))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOpcode(pub i64);

impl std::error::Error for InvalidOpcode {}

impl fmt::Display for InvalidOpcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "word {} does not encode an opcode", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_opcode_table_matches_encoding() {
        for (index, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.word(), index as i64, "{op} is out of place");
            assert_eq!(Opcode::try_from(index as i64), Ok(*op));
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::try_from(-1), Err(InvalidOpcode(-1)));
        assert_eq!(Opcode::try_from(39), Err(InvalidOpcode(39)));
    }

    #[test]
    fn test_operand_split() {
        assert!(Opcode::Adj.has_operand());
        assert!(Opcode::Imm.has_operand());
        assert!(!Opcode::Lev.has_operand());
        assert!(!Opcode::Exit.has_operand());
        assert!(Opcode::Prtf.is_syscall());
        assert!(!Opcode::Mod.is_syscall());
    }
}
