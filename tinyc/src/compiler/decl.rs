//! Global declarations, enums and function definitions.
use smol_str::SmolStr;

use super::{at_line, Compiler};
use crate::{
    bytecode::Opcode,
    error::CompileResult,
    lex::{Keyword, TokenKind},
    symbol::Type,
};

impl<'a> Compiler<'a> {
    /// Base type keyword at the current token, consuming it.
    ///
    /// `void` is treated as `char`.
    pub(super) fn base_type(&mut self) -> CompileResult<Option<Type>> {
        let ty = match self.token.kind {
            TokenKind::Keyword(Keyword::Int) => Type::INT,
            TokenKind::Keyword(Keyword::Char | Keyword::Void) => Type::CHAR,
            _ => return Ok(None),
        };
        self.next()?;
        Ok(Some(ty))
    }

    /// Wrap the base type in one pointer level for every leading `*`.
    pub(super) fn pointer_levels(&mut self, mut ty: Type) -> CompileResult<Type> {
        while self.token.kind == TokenKind::Mul {
            self.next()?;
            ty = ty.pointer_to();
        }
        Ok(ty)
    }

    pub(super) fn global_declaration(&mut self) -> CompileResult<()> {
        let base = if self.token.kind == TokenKind::Keyword(Keyword::Enum) {
            self.enum_declaration()?;
            Type::INT
        } else {
            match self.base_type()? {
                Some(ty) => ty,
                None => return Err(self.unexpected("declaration")),
            }
        };

        while self.token.kind != TokenKind::Semicolon {
            let ty = self.pointer_levels(base)?;
            let line = self.token.line;
            let name = self.expect_ident()?;

            if self.token.kind == TokenKind::LeftParen {
                // Definitions end at their closing brace, prototypes eat their own semicolon.
                return self.function(name, ty, line);
            }

            let addr = at_line(self.data.alloc_word(), line)?;
            let declared = self.symbols.declare_global(&name, ty, addr);
            at_line(declared, line)?;

            if self.token.kind == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }

        self.expect(TokenKind::Semicolon)
    }

    /// `enum [tag] { NAME [= value], ... }`
    ///
    /// Declares each name as an integer constant. Values count up
    /// from zero, or from the last explicit initializer.
    fn enum_declaration(&mut self) -> CompileResult<()> {
        self.next()?;
        if let TokenKind::Ident(_) = self.token.kind {
            // Tags name nothing, enums are plain ints.
            self.next()?;
        }
        if self.token.kind != TokenKind::LeftBrace {
            return Ok(());
        }
        self.next()?;

        let mut value: i64 = 0;
        while self.token.kind != TokenKind::RightBrace {
            let line = self.token.line;
            let name = self.expect_ident()?;

            if self.token.kind == TokenKind::Assign {
                self.next()?;
                let negative = self.token.kind == TokenKind::Sub;
                if negative {
                    self.next()?;
                }
                value = match self.token.kind {
                    TokenKind::Number(n) | TokenKind::Char(n) => n,
                    _ => return Err(self.unexpected("enum initializer")),
                };
                if negative {
                    value = value.wrapping_neg();
                }
                self.next()?;
            }

            let declared = self.symbols.declare_constant(&name, value);
            at_line(declared, line)?;
            value = value.wrapping_add(1);

            match self.token.kind {
                TokenKind::Comma => self.next()?,
                TokenKind::RightBrace => {}
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }

        self.next()
    }

    /// Function definition or prototype, starting at the parameter list.
    fn function(&mut self, name: SmolStr, ret: Type, line: u32) -> CompileResult<()> {
        self.expect(TokenKind::LeftParen)?;
        self.symbols.enter_function_scope();

        let params = self.parameters()?;
        self.expect(TokenKind::RightParen)?;

        if self.token.kind == TokenKind::Semicolon {
            self.symbols.exit_function_scope();
            let declared = self.symbols.declare_forward(&name, ret);
            at_line(declared, line)?;
            return self.next();
        }

        // Arguments are pushed left to right, above the return address
        // and the saved frame pointer.
        let count = params.len() as i64;
        for (index, param) in params.iter().enumerate() {
            if let Some(symbol) = self.symbols.local_mut(param) {
                symbol.value = count + 1 - index as i64;
            }
        }

        let addr = self.code.here();
        let declared = self.symbols.declare_function(&name, ret, addr as i64);
        at_line(declared, line)?;
        if let Some(sites) = self.forward_calls.remove(&name) {
            for (slot, _) in sites {
                self.code.patch(slot, addr as i64);
            }
        }
        log::trace!("function '{name}' at {addr}");

        if self.token.kind != TokenKind::LeftBrace {
            return Err(self.unexpected("'{' or ';'"));
        }
        self.local_count = 0;
        let frame = self.reserve(Opcode::Ent)?;
        self.next()?;

        while self.token.kind != TokenKind::RightBrace {
            if self.token.kind == TokenKind::EOF {
                return Err(self.unexpected("'}'"));
            }
            self.statement()?;
        }

        // Falling off the end returns whatever is in the accumulator.
        self.emit(Opcode::Lev)?;
        self.code.patch(frame, self.local_count);

        self.symbols.exit_function_scope();
        self.next()
    }

    /// Declare the parameters in the function scope, returning their names in order.
    ///
    /// Offsets are assigned once the count is known.
    fn parameters(&mut self) -> CompileResult<Vec<SmolStr>> {
        let mut params = vec![];

        while self.token.kind != TokenKind::RightParen {
            let is_void = self.token.kind == TokenKind::Keyword(Keyword::Void);
            let base = match self.base_type()? {
                Some(ty) => ty,
                None => return Err(self.unexpected("parameter type")),
            };
            if is_void && params.is_empty() && self.token.kind == TokenKind::RightParen {
                // f(void)
                break;
            }

            let ty = self.pointer_levels(base)?;
            let line = self.token.line;
            let name = self.expect_ident()?;
            let declared = self.symbols.declare_local(&name, ty, 0);
            at_line(declared, line)?;
            params.push(name);

            match self.token.kind {
                TokenKind::Comma => self.next()?,
                TokenKind::RightParen => {}
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }

        Ok(params)
    }
}
