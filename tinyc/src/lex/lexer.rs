//! Lexical analysis
use smol_str::SmolStr;

use super::{
    cursor::{Cursor, EOF_CHAR},
    tokens::{Keyword, Span, Token, TokenKind},
};
use crate::{
    data::DataSegment,
    error::{CompileError, CompileErrorKind, CompileResult},
};

pub struct Lexer<'a> {
    /// Character scanner
    cursor: Cursor<'a>,
    /// Keep reference to the source so the parser can
    /// slice fragments from it.
    original: &'a [u8],
    /// Start absolute byte position of the current token
    /// in the source.
    start_pos: u32,
    /// Line the current token starts on.
    start_line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(source_code),
            original: source_code,
            start_pos: 0,
            start_line: 1,
        }
    }

    /// Original source code that was passed in during construction.
    pub fn source_code(&self) -> &'a [u8] {
        self.original
    }

    /// Line number of the cursor.
    pub fn line(&self) -> u32 {
        self.cursor.line()
    }

    /// Scan the source characters and construct the next token.
    ///
    /// String literals are copied into the data segment as they are
    /// scanned, without a terminator. Adjacent literals thus end up
    /// contiguous, and the parser closes them off once the run ends.
    ///
    /// ## Implementation
    ///
    /// Each iteration starts with the cursor pointing to the start of
    /// the remaining source, and leaves it pointing just past the
    /// token it built.
    pub fn next_token(&mut self, data: &mut DataSegment) -> CompileResult<Token> {
        use TokenKind as TK;

        self.skip_trivia()?;
        self.start_token();

        let c = self.cursor.next();
        let kind = match c {
            EOF_CHAR if self.cursor.at_end() && self.cursor.offset() == self.start_pos => TK::EOF,
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.consume_ident(),
            b'0'..=b'9' => self.consume_number(c),
            b'\'' => self.consume_char()?,
            b'"' => self.consume_string(data)?,
            b'=' => self.either(b'=', TK::Eq, TK::Assign),
            b'+' => self.either(b'+', TK::Inc, TK::Add),
            b'-' => self.either(b'-', TK::Dec, TK::Sub),
            b'!' => self.either(b'=', TK::Ne, TK::Not),
            b'<' => match self.cursor.current() {
                b'=' => self.skip(TK::Le),
                b'<' => self.skip(TK::Shl),
                _ => TK::Lt,
            },
            b'>' => match self.cursor.current() {
                b'=' => self.skip(TK::Ge),
                b'>' => self.skip(TK::Shr),
                _ => TK::Gt,
            },
            b'|' => self.either(b'|', TK::LogOr, TK::Or),
            b'&' => self.either(b'&', TK::LogAnd, TK::And),
            b'^' => TK::Xor,
            b'%' => TK::Mod,
            b'*' => TK::Mul,
            b'/' => TK::Div,
            b'?' => TK::Cond,
            b'[' => TK::LeftBracket,
            b']' => TK::RightBracket,
            b'~' => TK::Tilde,
            b';' => TK::Semicolon,
            b':' => TK::Colon,
            b',' => TK::Comma,
            b'(' => TK::LeftParen,
            b')' => TK::RightParen,
            b'{' => TK::LeftBrace,
            b'}' => TK::RightBrace,
            _ => {
                return Err(self.error(format!(
                    "unrecognized character '{}'",
                    c.escape_ascii()
                )))
            }
        };

        Ok(self.make_token(kind))
    }

    /// Primes the lexer to consume the next token.
    fn start_token(&mut self) {
        self.start_pos = self.cursor.offset();
        self.start_line = self.cursor.line();
    }

    /// Create a span using the starting position of the current token,
    /// and the current offset of the cursor.
    fn make_span(&self) -> Span {
        let start = self.start_pos;
        let end = self.cursor.offset();
        debug_assert!(end >= start);
        Span::new(start, end - start)
    }

    fn fragment(&self) -> &'a [u8] {
        self.make_span().fragment(self.original)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            span: self.make_span(),
            line: self.start_line,
            kind,
        }
    }

    #[inline(never)]
    #[cold]
    fn error(&self, message: impl ToString) -> CompileError {
        CompileError::new(
            CompileErrorKind::Lexical(message.to_string()),
            self.start_line,
        )
    }

    /// Two character operator when the current character matches, otherwise the single one.
    #[inline]
    fn either(&mut self, second: u8, double: TokenKind, single: TokenKind) -> TokenKind {
        if self.cursor.current() == second {
            self.cursor.next();
            double
        } else {
            single
        }
    }

    #[inline]
    fn skip(&mut self, kind: TokenKind) -> TokenKind {
        self.cursor.next();
        kind
    }
}

/// Specialised tokens.
impl<'a> Lexer<'a> {
    /// Erase whitespace, comments and preprocessor lines.
    fn skip_trivia(&mut self) -> CompileResult<()> {
        loop {
            match (self.cursor.current(), self.cursor.peek()) {
                (b' ' | b'\t' | b'\r' | b'\n' | b'\x0B' | b'\x0C', _) => {
                    self.cursor.next();
                }
                // Preprocessor directives aren't supported, and are skipped like comments.
                (b'#', _) | (b'/', b'/') => {
                    while !self.cursor.at_end() && self.cursor.current() != b'\n' {
                        self.cursor.next();
                    }
                }
                (b'/', b'*') => {
                    self.start_token();
                    self.cursor.next();
                    self.cursor.next();
                    loop {
                        if self.cursor.at_end() {
                            return Err(self.error("unterminated block comment"));
                        }
                        if self.cursor.next() == b'*' && self.cursor.current() == b'/' {
                            self.cursor.next();
                            break;
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Make an identifier or keyword token.
    fn consume_ident(&mut self) -> TokenKind {
        while is_letter_or_digit(self.cursor.current()) {
            self.cursor.next();
        }

        let fragment = self.fragment();
        match Keyword::parse(fragment) {
            Some(keyword) => TokenKind::Keyword(keyword),
            // Identifiers are scanned from ASCII letters only.
            None => TokenKind::Ident(SmolStr::new(String::from_utf8_lossy(fragment))),
        }
    }

    /// Make a number literal token.
    ///
    /// A leading `0x` selects hexadecimal, a leading `0` octal.
    /// Values wrap on overflow.
    fn consume_number(&mut self, first: u8) -> TokenKind {
        let mut value: i64;

        if first != b'0' {
            value = (first - b'0') as i64;
            while is_digit(self.cursor.current()) {
                let digit = self.cursor.next() - b'0';
                value = value.wrapping_mul(10).wrapping_add(digit as i64);
            }
        } else if matches!(self.cursor.current(), b'x' | b'X') {
            self.cursor.next();
            value = 0;
            while let Some(digit) = hex_value(self.cursor.current()) {
                self.cursor.next();
                value = value.wrapping_mul(16).wrapping_add(digit);
            }
        } else {
            value = 0;
            while matches!(self.cursor.current(), b'0'..=b'7') {
                let digit = self.cursor.next() - b'0';
                value = value.wrapping_mul(8).wrapping_add(digit as i64);
            }
        }

        TokenKind::Number(value)
    }

    /// Make a character literal token, with the opening quote already consumed.
    fn consume_char(&mut self) -> CompileResult<TokenKind> {
        if matches!(self.cursor.current(), b'\'' | b'\n') || self.cursor.at_end() {
            return Err(self.error("empty or unterminated character literal"));
        }
        let value = self.consume_escaped();
        if self.cursor.current() != b'\'' {
            return Err(self.error("unterminated character literal"));
        }
        self.cursor.next();
        Ok(TokenKind::Char(value as i64))
    }

    /// Make a string literal token, with the opening quote already consumed.
    fn consume_string(&mut self, data: &mut DataSegment) -> CompileResult<TokenKind> {
        let addr = data.next_address();

        loop {
            match self.cursor.current() {
                b'"' => {
                    self.cursor.next();
                    return Ok(TokenKind::Str(addr));
                }
                b'\n' => return Err(self.error("unterminated string literal")),
                _ if self.cursor.at_end() => {
                    return Err(self.error("unterminated string literal"));
                }
                _ => {
                    let byte = self.consume_escaped();
                    data.push_byte(byte)
                        .map_err(|kind| CompileError::new(kind, self.start_line))?;
                }
            }
        }
    }

    /// Consume one, possibly escaped, character of a literal.
    fn consume_escaped(&mut self) -> u8 {
        match self.cursor.next() {
            b'\\' => match self.cursor.next() {
                b'n' => b'\n',
                b't' => b'\t',
                b'r' => b'\r',
                b'0' => b'\0',
                other => other,
            },
            c => c,
        }
    }
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_letter(c: u8) -> bool {
    matches!(c, b'a'..=b'z' | b'A'..=b'Z' | b'_')
}

fn is_letter_or_digit(c: u8) -> bool {
    is_letter(c) || is_digit(c)
}

fn hex_value(c: u8) -> Option<i64> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as i64),
        b'a'..=b'f' => Some((c - b'a' + 10) as i64),
        b'A'..=b'F' => Some((c - b'A' + 10) as i64),
        _ => None,
    }
}

/// Lex the whole source, for diagnostics.
///
/// String literal contents are written to the given data segment.
pub fn tokenize(source: &[u8], data: &mut DataSegment) -> CompileResult<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = vec![];
    loop {
        let token = lexer.next_token(data)?;
        let done = token.kind == TokenKind::EOF;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::DATA_BASE;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut data = DataSegment::new(1024);
        tokenize(source.as_bytes(), &mut data)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_operators() {
        use TokenKind as TK;
        assert_eq!(
            kinds("= == + ++ - -- ! != < <= << > >= >> | || & && ^ % * / ? [ ] ~ ; : , ( ) { }"),
            vec![
                TK::Assign, TK::Eq, TK::Add, TK::Inc, TK::Sub, TK::Dec, TK::Not, TK::Ne,
                TK::Lt, TK::Le, TK::Shl, TK::Gt, TK::Ge, TK::Shr, TK::Or, TK::LogOr,
                TK::And, TK::LogAnd, TK::Xor, TK::Mod, TK::Mul, TK::Div, TK::Cond,
                TK::LeftBracket, TK::RightBracket, TK::Tilde, TK::Semicolon, TK::Colon,
                TK::Comma, TK::LeftParen, TK::RightParen, TK::LeftBrace, TK::RightBrace,
                TK::EOF,
            ]
        );
    }

    #[test]
    fn test_number_notations() {
        assert_eq!(
            kinds("42 0x2A 0X2a 052 0"),
            vec![
                TokenKind::Number(42),
                TokenKind::Number(42),
                TokenKind::Number(42),
                TokenKind::Number(42),
                TokenKind::Number(0),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(
            kinds(r"'a' '\n' '\0' '\''"),
            vec![
                TokenKind::Char(97),
                TokenKind::Char(10),
                TokenKind::Char(0),
                TokenKind::Char(39),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("int main While _x1"),
            vec![
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Ident("main".into()),
                TokenKind::Ident("While".into()),
                TokenKind::Ident("_x1".into()),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_trivia_and_lines() {
        let source = "#include <stdio.h>\n// comment\n/* block\n comment */ x\n  y";
        let mut data = DataSegment::new(16);
        let tokens = tokenize(source.as_bytes(), &mut data).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("x".into()));
        assert_eq!(tokens[0].line, 4);
        assert_eq!(tokens[0].span.fragment(source.as_bytes()), b"x");
        assert_eq!(tokens[1].line, 5);
        assert_eq!(tokens[2].kind, TokenKind::EOF);
    }

    #[test]
    fn test_string_copied_to_data() {
        let mut data = DataSegment::new(64);
        let tokens = tokenize(br#""hi\n" "yo""#, &mut data).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str(DATA_BASE));
        assert_eq!(tokens[1].kind, TokenKind::Str(DATA_BASE + 3));
        assert_eq!(data.as_bytes(), b"hi\nyo");
    }

    #[test]
    fn test_unrecognized_character() {
        let mut data = DataSegment::new(16);
        let err = tokenize(b"int a;\nint @b;", &mut data).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, CompileErrorKind::Lexical(_)));
    }

    #[test]
    fn test_unterminated_literals() {
        let mut data = DataSegment::new(16);
        assert!(tokenize(b"\"abc", &mut data).is_err());
        assert!(tokenize(b"'a", &mut data).is_err());
        assert!(tokenize(b"/* open", &mut data).is_err());
    }
}
