//! Expressions, by precedence climbing.
//!
//! Every expression leaves its value in the accumulator, and its type in
//! `Compiler::ty`. Lvalues are compiled as their address followed by a
//! load, which assignment and friends take back off to get the address.
use smol_str::SmolStr;

use super::{at_line, Compiler};
use crate::{
    bytecode::Opcode,
    error::CompileResult,
    lex::{Keyword, Precedence, TokenKind},
    symbol::{SymbolClass, Type},
};

/// Store instruction matching a load.
fn store_for(load: Opcode) -> Opcode {
    match load {
        Opcode::Lc => Opcode::Sc,
        _ => Opcode::Si,
    }
}

impl<'a> Compiler<'a> {
    /// Compile an expression, consuming binary operators
    /// that bind at least as tightly as `level`.
    pub(super) fn expr(&mut self, level: Precedence) -> CompileResult<()> {
        self.enter()?;
        self.unary()?;

        while let Some(prec) = self.token.kind.precedence() {
            if prec < level {
                break;
            }
            self.binary(prec)?;
        }

        self.leave();
        Ok(())
    }

    /// Operand with its prefix operators.
    fn unary(&mut self) -> CompileResult<()> {
        let line = self.token.line;

        match self.token.kind.clone() {
            TokenKind::Number(value) | TokenKind::Char(value) => {
                self.next()?;
                self.emit_with(Opcode::Imm, value)?;
                self.ty = Type::INT;
            }
            TokenKind::Str(addr) => {
                // Adjacent literals were appended to the same string.
                while let TokenKind::Str(_) = self.token.kind {
                    self.next()?;
                }
                at_line(self.data.terminate_string(), line)?;
                self.emit_with(Opcode::Imm, addr)?;
                self.ty = Type::CHAR.pointer_to();
            }
            TokenKind::Keyword(Keyword::Sizeof) => {
                self.next()?;
                self.expect(TokenKind::LeftParen)?;
                let base = match self.base_type()? {
                    Some(ty) => ty,
                    None => return Err(self.unexpected("type")),
                };
                let ty = self.pointer_levels(base)?;
                self.expect(TokenKind::RightParen)?;
                self.emit_with(Opcode::Imm, ty.size() as i64)?;
                self.ty = Type::INT;
            }
            TokenKind::Ident(name) => {
                self.next()?;
                if self.token.kind == TokenKind::LeftParen {
                    self.call(name, line)?;
                } else {
                    self.variable(name, line)?;
                }
            }
            TokenKind::LeftParen => {
                self.next()?;
                if let TokenKind::Keyword(keyword) = self.token.kind {
                    if keyword.is_type() {
                        return self.cast();
                    }
                }
                self.expr(Precedence::Assign)?;
                self.expect(TokenKind::RightParen)?;
            }
            TokenKind::Mul => {
                self.next()?;
                self.expr(Precedence::Postfix)?;
                self.ty = match self.ty.deref() {
                    Some(ty) => ty,
                    None => return Err(self.syntax(format!("cannot dereference {}", self.ty))),
                };
                self.emit_load(self.ty)?;
            }
            TokenKind::And => {
                self.next()?;
                self.expr(Precedence::Postfix)?;
                if self.code.take_load().is_none() {
                    return Err(self.syntax("cannot take the address of an rvalue"));
                }
                self.ty = self.ty.pointer_to();
            }
            TokenKind::Not => {
                self.next()?;
                self.expr(Precedence::Postfix)?;
                self.emit(Opcode::Push)?;
                self.emit_with(Opcode::Imm, 0)?;
                self.emit(Opcode::Eq)?;
                self.ty = Type::INT;
            }
            TokenKind::Tilde => {
                self.next()?;
                self.expr(Precedence::Postfix)?;
                self.emit(Opcode::Push)?;
                self.emit_with(Opcode::Imm, -1)?;
                self.emit(Opcode::Xor)?;
                self.ty = Type::INT;
            }
            TokenKind::Add => {
                self.next()?;
                self.expr(Precedence::Postfix)?;
                self.ty = Type::INT;
            }
            TokenKind::Sub => {
                self.next()?;
                match self.token.kind {
                    TokenKind::Number(value) | TokenKind::Char(value) => {
                        self.next()?;
                        self.emit_with(Opcode::Imm, value.wrapping_neg())?;
                    }
                    _ => {
                        self.emit_with(Opcode::Imm, -1)?;
                        self.emit(Opcode::Push)?;
                        self.expr(Precedence::Postfix)?;
                        self.emit(Opcode::Mul)?;
                    }
                }
                self.ty = Type::INT;
            }
            TokenKind::Inc | TokenKind::Dec => {
                let op = if self.token.kind == TokenKind::Inc {
                    Opcode::Add
                } else {
                    Opcode::Sub
                };
                self.next()?;
                self.expr(Precedence::Postfix)?;
                let load = match self.code.take_load() {
                    Some(load) => load,
                    None => return Err(self.syntax("operand of prefix increment is not an lvalue")),
                };
                self.emit(Opcode::Push)?;
                self.emit(load)?;
                self.emit(Opcode::Push)?;
                self.emit_with(Opcode::Imm, self.ty.stride() as i64)?;
                self.emit(op)?;
                self.emit(store_for(load))?;
            }
            _ => return Err(self.unexpected("expression")),
        }

        Ok(())
    }

    /// `(type) operand`, with the opening parenthesis consumed.
    fn cast(&mut self) -> CompileResult<()> {
        let base = match self.base_type()? {
            Some(ty) => ty,
            None => return Err(self.unexpected("type")),
        };
        let ty = self.pointer_levels(base)?;
        self.expect(TokenKind::RightParen)?;
        self.expr(Precedence::Postfix)?;
        self.ty = ty;
        Ok(())
    }

    /// Value of a named constant or variable.
    fn variable(&mut self, name: SmolStr, line: u32) -> CompileResult<()> {
        let symbol = at_line(self.symbols.resolve(&name), line)?.clone();

        match symbol.class {
            SymbolClass::Num => {
                self.emit_with(Opcode::Imm, symbol.value)?;
                self.ty = Type::INT;
            }
            SymbolClass::Local => {
                self.emit_with(Opcode::Lea, symbol.value)?;
                self.ty = symbol.ty;
                self.emit_load(symbol.ty)?;
            }
            SymbolClass::Global => {
                self.emit_with(Opcode::Imm, symbol.value)?;
                self.ty = symbol.ty;
                self.emit_load(symbol.ty)?;
            }
            SymbolClass::Function | SymbolClass::Forward | SymbolClass::Syscall(_) => {
                return Err(self.syntax(format!("function '{name}' used as a value")));
            }
        }

        Ok(())
    }

    /// Call with the callee's name consumed, at the opening parenthesis.
    ///
    /// Calling a name that hasn't been declared yet declares it as a
    /// function returning `int`, to be defined later in the source.
    fn call(&mut self, name: SmolStr, line: u32) -> CompileResult<()> {
        self.next()?;

        let mut argc: i64 = 0;
        while self.token.kind != TokenKind::RightParen {
            self.expr(Precedence::Assign)?;
            self.emit(Opcode::Push)?;
            argc += 1;

            match self.token.kind {
                TokenKind::Comma => self.next()?,
                TokenKind::RightParen => {}
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
        self.next()?;

        if self.symbols.lookup(&name).is_none() {
            at_line(self.symbols.declare_forward(&name, Type::INT), line)?;
        }
        let symbol = at_line(self.symbols.resolve(&name), line)?.clone();

        match symbol.class {
            SymbolClass::Syscall(op) => {
                self.emit(op)?;
            }
            SymbolClass::Function => {
                self.emit_with(Opcode::Call, symbol.value)?;
            }
            SymbolClass::Forward => {
                let slot = self.reserve(Opcode::Call)?;
                self.forward_calls.entry(name).or_default().push((slot, line));
            }
            _ => return Err(self.syntax(format!("'{name}' is not a function"))),
        }

        // Pop the arguments. Variadic builtins also read the count from here.
        self.emit_with(Opcode::Adj, argc)?;
        self.ty = symbol.ty;

        Ok(())
    }

    /// Binary, ternary or postfix operator at the current token,
    /// with its left operand in the accumulator.
    fn binary(&mut self, prec: Precedence) -> CompileResult<()> {
        let left = self.ty;

        match self.token.kind {
            TokenKind::Assign => {
                self.next()?;
                let load = match self.code.take_load() {
                    Some(load) => load,
                    None => return Err(self.syntax("left side of assignment is not an lvalue")),
                };
                self.emit(Opcode::Push)?;
                self.expr(Precedence::Assign)?;
                self.emit(store_for(load))?;
                self.ty = left;
            }
            TokenKind::Cond => {
                self.next()?;
                let skip_then = self.reserve(Opcode::Jz)?;
                self.expr(Precedence::Assign)?;
                self.expect(TokenKind::Colon)?;
                let skip_else = self.reserve(Opcode::Jmp)?;
                self.code.patch_here(skip_then);
                self.expr(Precedence::Cond)?;
                self.code.patch_here(skip_else);
            }
            TokenKind::LogOr | TokenKind::LogAnd => {
                let (branch, right) = if self.token.kind == TokenKind::LogOr {
                    (Opcode::Jnz, Precedence::LogAnd)
                } else {
                    (Opcode::Jz, Precedence::BitOr)
                };
                self.next()?;
                let short = self.reserve(branch)?;
                self.expr(right)?;
                self.code.patch_here(short);
                // Both paths end up here, normalise to 0 or 1.
                self.emit(Opcode::Push)?;
                self.emit_with(Opcode::Imm, 0)?;
                self.emit(Opcode::Ne)?;
                self.ty = Type::INT;
            }
            TokenKind::Add => {
                self.next()?;
                self.emit(Opcode::Push)?;
                self.expr(Precedence::Multiplicative)?;
                self.scale(left)?;
                self.emit(Opcode::Add)?;
                self.ty = left;
            }
            TokenKind::Sub => {
                self.next()?;
                self.emit(Opcode::Push)?;
                self.expr(Precedence::Multiplicative)?;
                if left.is_pointer() && left == self.ty {
                    // Distance between two pointers, in elements.
                    self.emit(Opcode::Sub)?;
                    if left.stride() > 1 {
                        self.emit(Opcode::Push)?;
                        self.emit_with(Opcode::Imm, left.stride() as i64)?;
                        self.emit(Opcode::Div)?;
                    }
                    self.ty = Type::INT;
                } else {
                    self.scale(left)?;
                    self.emit(Opcode::Sub)?;
                    self.ty = left;
                }
            }
            TokenKind::Inc | TokenKind::Dec => {
                let (apply, undo) = if self.token.kind == TokenKind::Inc {
                    (Opcode::Add, Opcode::Sub)
                } else {
                    (Opcode::Sub, Opcode::Add)
                };
                self.next()?;
                let load = match self.code.take_load() {
                    Some(load) => load,
                    None => return Err(self.syntax("operand of postfix increment is not an lvalue")),
                };
                let stride = left.stride() as i64;
                // Store the updated value, then leave the old one in the accumulator.
                self.emit(Opcode::Push)?;
                self.emit(load)?;
                self.emit(Opcode::Push)?;
                self.emit_with(Opcode::Imm, stride)?;
                self.emit(apply)?;
                self.emit(store_for(load))?;
                self.emit(Opcode::Push)?;
                self.emit_with(Opcode::Imm, stride)?;
                self.emit(undo)?;
                self.ty = left;
            }
            TokenKind::LeftBracket => {
                self.next()?;
                self.emit(Opcode::Push)?;
                self.expr(Precedence::Assign)?;
                self.expect(TokenKind::RightBracket)?;
                let element = match left.deref() {
                    Some(ty) => ty,
                    None => return Err(self.syntax(format!("cannot index {left}"))),
                };
                self.scale(left)?;
                self.emit(Opcode::Add)?;
                self.ty = element;
                self.emit_load(element)?;
            }
            _ => {
                let op = match self.token.kind {
                    TokenKind::Or => Opcode::Or,
                    TokenKind::Xor => Opcode::Xor,
                    TokenKind::And => Opcode::And,
                    TokenKind::Eq => Opcode::Eq,
                    TokenKind::Ne => Opcode::Ne,
                    TokenKind::Lt => Opcode::Lt,
                    TokenKind::Gt => Opcode::Gt,
                    TokenKind::Le => Opcode::Le,
                    TokenKind::Ge => Opcode::Ge,
                    TokenKind::Shl => Opcode::Shl,
                    TokenKind::Shr => Opcode::Shr,
                    TokenKind::Mul => Opcode::Mul,
                    TokenKind::Div => Opcode::Div,
                    TokenKind::Mod => Opcode::Mod,
                    _ => return Err(self.unexpected("operator")),
                };
                self.next()?;
                self.emit(Opcode::Push)?;
                self.expr(prec.next())?;
                self.emit(op)?;
                self.ty = Type::INT;
            }
        }

        Ok(())
    }

    /// Multiply the offset in the accumulator by the element size of `ptr`.
    fn scale(&mut self, ptr: Type) -> CompileResult<()> {
        let stride = ptr.stride();
        if stride > 1 {
            self.emit(Opcode::Push)?;
            self.emit_with(Opcode::Imm, stride as i64)?;
            self.emit(Opcode::Mul)?;
        }
        Ok(())
    }
}
