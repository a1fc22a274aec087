//! Lexical analysis of C source.
mod cursor;
mod lexer;
mod tokens;

pub use self::{
    lexer::{tokenize, Lexer},
    tokens::{Keyword, Precedence, Span, Token, TokenKind},
};
