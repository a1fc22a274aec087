//! Byte scanner over source text.

/// Sentinel returned when the cursor has moved past the last byte.
///
/// Source may also contain NUL bytes, so check [`Cursor::at_end`]
/// before treating it as end-of-file.
pub const EOF_CHAR: u8 = b'\0';

pub struct Cursor<'a> {
    source: &'a [u8],
    /// Byte offset of the current character.
    offset: u32,
    /// Line number of the current character, starting at 1.
    line: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
        }
    }

    /// Character under the cursor.
    #[inline]
    pub fn current(&self) -> u8 {
        self.source
            .get(self.offset as usize)
            .copied()
            .unwrap_or(EOF_CHAR)
    }

    /// Character following the current one.
    #[inline]
    pub fn peek(&self) -> u8 {
        self.source
            .get(self.offset as usize + 1)
            .copied()
            .unwrap_or(EOF_CHAR)
    }

    /// Step over the current character, returning it.
    ///
    /// Line counting happens here, so newlines are never missed
    /// regardless of which token consumed them.
    #[inline]
    pub fn next(&mut self) -> u8 {
        let c = self.current();
        if !self.at_end() {
            if c == b'\n' {
                self.line += 1;
            }
            self.offset += 1;
        }
        c
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.offset as usize >= self.source.len()
    }
}
