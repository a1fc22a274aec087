//! Statements
use super::{at_line, Compiler};
use crate::{
    bytecode::Opcode,
    error::CompileResult,
    lex::{Keyword, Precedence, TokenKind},
};

impl<'a> Compiler<'a> {
    pub(super) fn statement(&mut self) -> CompileResult<()> {
        self.enter()?;

        match self.token.kind {
            TokenKind::Keyword(Keyword::If) => self.if_statement()?,
            TokenKind::Keyword(Keyword::While) => self.while_statement()?,
            TokenKind::Keyword(Keyword::Return) => self.return_statement()?,
            TokenKind::Keyword(Keyword::Int | Keyword::Char | Keyword::Void) => {
                self.local_declaration()?
            }
            TokenKind::LeftBrace => self.block()?,
            TokenKind::Semicolon => self.next()?,
            _ => {
                self.expr(Precedence::Assign)?;
                self.expect(TokenKind::Semicolon)?;
            }
        }

        self.leave();
        Ok(())
    }

    /// Parenthesised condition of `if` and `while`.
    fn condition(&mut self) -> CompileResult<()> {
        self.expect(TokenKind::LeftParen)?;
        self.expr(Precedence::Assign)?;
        self.expect(TokenKind::RightParen)
    }

    fn if_statement(&mut self) -> CompileResult<()> {
        self.next()?;
        self.condition()?;

        let skip_then = self.reserve(Opcode::Jz)?;
        self.statement()?;

        if self.token.kind == TokenKind::Keyword(Keyword::Else) {
            self.next()?;
            let skip_else = self.reserve(Opcode::Jmp)?;
            self.code.patch_here(skip_then);
            self.statement()?;
            self.code.patch_here(skip_else);
        } else {
            self.code.patch_here(skip_then);
        }

        Ok(())
    }

    fn while_statement(&mut self) -> CompileResult<()> {
        self.next()?;

        let top = self.code.here() as i64;
        self.condition()?;
        let exit = self.reserve(Opcode::Jz)?;
        self.statement()?;
        self.emit_with(Opcode::Jmp, top)?;
        self.code.patch_here(exit);

        Ok(())
    }

    fn return_statement(&mut self) -> CompileResult<()> {
        self.next()?;
        if self.token.kind != TokenKind::Semicolon {
            self.expr(Precedence::Assign)?;
        }
        self.emit(Opcode::Lev)?;
        self.expect(TokenKind::Semicolon)
    }

    fn block(&mut self) -> CompileResult<()> {
        self.next()?;
        while self.token.kind != TokenKind::RightBrace {
            if self.token.kind == TokenKind::EOF {
                return Err(self.unexpected("'}'"));
            }
            self.statement()?;
        }
        self.next()
    }

    /// `type declarator [= expr], ... ;`
    ///
    /// Locals live for the whole function, wherever they are declared.
    /// Each takes the next word below the frame pointer.
    fn local_declaration(&mut self) -> CompileResult<()> {
        let base = match self.base_type()? {
            Some(ty) => ty,
            None => return Err(self.unexpected("type")),
        };

        loop {
            let ty = self.pointer_levels(base)?;
            let line = self.token.line;
            let name = self.expect_ident()?;

            self.local_count += 1;
            let offset = -self.local_count;
            let declared = self.symbols.declare_local(&name, ty, offset);
            at_line(declared, line)?;

            if self.token.kind == TokenKind::Assign {
                self.next()?;
                self.emit_with(Opcode::Lea, offset)?;
                self.emit(Opcode::Push)?;
                self.expr(Precedence::Assign)?;
                self.emit(if ty.is_char() { Opcode::Sc } else { Opcode::Si })?;
            }

            if self.token.kind == TokenKind::Comma {
                self.next()?;
            } else {
                break;
            }
        }

        self.expect(TokenKind::Semicolon)
    }
}
