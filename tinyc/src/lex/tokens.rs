//! Tokens
use std::fmt;

use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub span: Span,
    /// Line the token starts on.
    pub line: u32,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[rustfmt::skip]
pub enum TokenKind {
    // ------------------------------------------------------------------------
    // Literals
    /// Integer literal in decimal, hex or octal notation.
    Number(i64),
    /// Character literal, holding its ordinal value.
    Char(i64),
    /// String literal, holding the data segment address
    /// its contents were copied to.
    Str(i64),
    Ident(SmolStr),
    /// Reserved identifiers
    Keyword(Keyword),

    // ------------------------------------------------------------------------
    // Operators, in order of increasing precedence
    Assign,       // =
    Cond,         // ?
    LogOr,        // ||
    LogAnd,       // &&
    Or,           // |
    Xor,          // ^
    And,          // &
    Eq,           // ==
    Ne,           // !=
    Lt,           // <
    Gt,           // >
    Le,           // <=
    Ge,           // >=
    Shl,          // <<
    Shr,          // >>
    Add,          // +
    Sub,          // -
    Mul,          // *
    Div,          // /
    Mod,          // %
    Inc,          // ++
    Dec,          // --
    LeftBracket,  // [

    // ------------------------------------------------------------------------
    // Punctuation
    Not,          // !
    Tilde,        // ~
    Semicolon,    // ;
    Colon,        // :
    Comma,        // ,
    LeftParen,    // (
    RightParen,   // )
    LeftBrace,    // {
    RightBrace,   // }
    RightBracket, // ]

    // ------------------------------------------------------------------------
    // Special
    /// End-of-file
    EOF,
}

impl TokenKind {
    /// Binding power of the token when it appears after an operand.
    ///
    /// Tokens that can't continue an expression have no precedence.
    #[rustfmt::skip]
    pub fn precedence(&self) -> Option<Precedence> {
        use Precedence as P;
        match self {
            Self::Assign                     => Some(P::Assign),
            Self::Cond                       => Some(P::Cond),
            Self::LogOr                      => Some(P::LogOr),
            Self::LogAnd                     => Some(P::LogAnd),
            Self::Or                         => Some(P::BitOr),
            Self::Xor                        => Some(P::BitXor),
            Self::And                        => Some(P::BitAnd),
            Self::Eq | Self::Ne              => Some(P::Equality),
            Self::Lt | Self::Gt
                | Self::Le | Self::Ge        => Some(P::Relational),
            Self::Shl | Self::Shr            => Some(P::Shift),
            Self::Add | Self::Sub            => Some(P::Additive),
            Self::Mul | Self::Div | Self::Mod => Some(P::Multiplicative),
            Self::Inc | Self::Dec
                | Self::LeftBracket          => Some(P::Postfix),
            _                                => None,
        }
    }
}

impl fmt::Display for TokenKind {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Number(n)    => write!(f, "number {n}"),
            Self::Char(c)      => write!(f, "character {c}"),
            Self::Str(_)       => write!(f, "string literal"),
            Self::Ident(name)  => write!(f, "identifier '{name}'"),
            Self::Keyword(kw)  => write!(f, "'{kw}'"),
            Self::Assign       => write!(f, "'='"),
            Self::Cond         => write!(f, "'?'"),
            Self::LogOr        => write!(f, "'||'"),
            Self::LogAnd       => write!(f, "'&&'"),
            Self::Or           => write!(f, "'|'"),
            Self::Xor          => write!(f, "'^'"),
            Self::And          => write!(f, "'&'"),
            Self::Eq           => write!(f, "'=='"),
            Self::Ne           => write!(f, "'!='"),
            Self::Lt           => write!(f, "'<'"),
            Self::Gt           => write!(f, "'>'"),
            Self::Le           => write!(f, "'<='"),
            Self::Ge           => write!(f, "'>='"),
            Self::Shl          => write!(f, "'<<'"),
            Self::Shr          => write!(f, "'>>'"),
            Self::Add          => write!(f, "'+'"),
            Self::Sub          => write!(f, "'-'"),
            Self::Mul          => write!(f, "'*'"),
            Self::Div          => write!(f, "'/'"),
            Self::Mod          => write!(f, "'%'"),
            Self::Inc          => write!(f, "'++'"),
            Self::Dec          => write!(f, "'--'"),
            Self::LeftBracket  => write!(f, "'['"),
            Self::Not          => write!(f, "'!'"),
            Self::Tilde        => write!(f, "'~'"),
            Self::Semicolon    => write!(f, "';'"),
            Self::Colon        => write!(f, "':'"),
            Self::Comma        => write!(f, "','"),
            Self::LeftParen    => write!(f, "'('"),
            Self::RightParen   => write!(f, "')'"),
            Self::LeftBrace    => write!(f, "'{{'"),
            Self::RightBrace   => write!(f, "'}}'"),
            Self::RightBracket => write!(f, "']'"),
            Self::EOF          => write!(f, "end-of-file"),
        }
    }
}

/// Operator binding power, weakest first.
///
/// Operators on the same level associate to the left, except
/// assignment and the conditional which associate to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Assign,
    Cond,
    LogOr,
    LogAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
    /// Unary operators, and the postfix `++`, `--` and `[]`.
    Postfix,
}

impl Precedence {
    /// The next stronger level, used to parse the right hand
    /// side of a left associative operator.
    #[rustfmt::skip]
    pub fn next(self) -> Self {
        use Precedence as P;
        match self {
            P::Assign         => P::Cond,
            P::Cond           => P::LogOr,
            P::LogOr          => P::LogAnd,
            P::LogAnd         => P::BitOr,
            P::BitOr          => P::BitXor,
            P::BitXor         => P::BitAnd,
            P::BitAnd         => P::Equality,
            P::Equality       => P::Relational,
            P::Relational     => P::Shift,
            P::Shift          => P::Additive,
            P::Additive       => P::Multiplicative,
            P::Multiplicative => P::Postfix,
            P::Postfix        => P::Postfix,
        }
    }
}

/// Reserved keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Keyword {
    Char,
    Else,
    Enum,
    If,
    Int,
    Return,
    Sizeof,
    While,
    /// Treated as `char` wherever a base type is expected.
    Void,
}

impl Keyword {
    #[rustfmt::skip]
    pub fn parse(text: impl AsRef<[u8]>) -> Option<Self> {
        match text.as_ref() {
            b"char"   => Some(Self::Char),
            b"else"   => Some(Self::Else),
            b"enum"   => Some(Self::Enum),
            b"if"     => Some(Self::If),
            b"int"    => Some(Self::Int),
            b"return" => Some(Self::Return),
            b"sizeof" => Some(Self::Sizeof),
            b"while"  => Some(Self::While),
            b"void"   => Some(Self::Void),
            _         => None,
        }
    }

    /// Whether the keyword starts a type name.
    #[inline]
    pub fn is_type(self) -> bool {
        matches!(self, Self::Char | Self::Int | Self::Void)
    }
}

impl fmt::Display for Keyword {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Char   => write!(f, "char"),
            Self::Else   => write!(f, "else"),
            Self::Enum   => write!(f, "enum"),
            Self::If     => write!(f, "if"),
            Self::Int    => write!(f, "int"),
            Self::Return => write!(f, "return"),
            Self::Sizeof => write!(f, "sizeof"),
            Self::While  => write!(f, "while"),
            Self::Void   => write!(f, "void"),
        }
    }
}

/// Chunk of source code, encoded as starting byte and size.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Span {
    pub index: u32,
    pub size: u32,
}

impl Span {
    pub fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    #[inline]
    pub fn fragment<'a>(&self, text: &'a [u8]) -> &'a [u8] {
        &text[(self.index as usize)..(self.index as usize + self.size as usize)]
    }

    /// Ending index of the span, exclusive.
    #[inline]
    pub fn end(&self) -> u32 {
        self.index + self.size
    }
}
