//! Single pass compiler.
//!
//! Parsing and code generation are fused: the recursive descent parser emits
//! instructions as it recognises each construct, so no syntax tree is ever
//! built. Forward jumps and calls to functions defined further down are
//! reserved in the encoder and patched once their targets are known.
mod decl;
mod expr;
mod stmts;

use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::{
    bytecode::Opcode,
    conf::TinyConf,
    constants::{MAIN_ARG_COUNT, WORD_SIZE},
    data::DataSegment,
    encoder::Encoder,
    error::{CompileError, CompileErrorKind, CompileResult},
    lex::{Lexer, Span, Token, TokenKind},
    program::{LineMark, Program},
    symbol::{SymbolClass, SymbolTable, Type},
};

/// Compile a complete translation unit.
pub fn compile(source: impl AsRef<[u8]>, conf: &TinyConf) -> CompileResult<Program> {
    Compiler::new(source.as_ref(), conf).compile()
}

/// Attach a source line to an error from the symbol table or a segment.
fn at_line<T>(result: Result<T, CompileErrorKind>, line: u32) -> CompileResult<T> {
    result.map_err(|kind| CompileError::new(kind, line))
}

/// Compiler context, holding all state of the single pass.
pub struct Compiler<'a> {
    lexer: Lexer<'a>,
    /// Current token, not yet consumed.
    token: Token,
    data: DataSegment,
    symbols: SymbolTable,
    code: Encoder,
    /// Call sites waiting for a function definition, with the line of each call.
    forward_calls: BTreeMap<SmolStr, Vec<(usize, u32)>>,
    /// Type of the most recently compiled expression.
    ty: Type,
    /// Current nesting of expressions and statements.
    depth: usize,
    max_depth: usize,
    /// Number of local variables in the function being compiled.
    local_count: i64,
    lines: Vec<LineMark>,
}

impl<'a> Compiler<'a> {
    pub fn new(source: &'a [u8], conf: &TinyConf) -> Self {
        Self {
            lexer: Lexer::new(source),
            token: Token {
                span: Span::new(0, 0),
                line: 1,
                kind: TokenKind::EOF,
            },
            data: DataSegment::new(conf.pool_size),
            symbols: SymbolTable::new(),
            code: Encoder::new(conf.pool_size / WORD_SIZE),
            forward_calls: BTreeMap::new(),
            ty: Type::INT,
            depth: 0,
            max_depth: conf.max_depth,
            local_count: 0,
            lines: vec![],
        }
    }

    pub fn compile(mut self) -> CompileResult<Program> {
        self.next()?;
        while self.token.kind != TokenKind::EOF {
            self.global_declaration()?;
        }

        if let Some((name, sites)) = self.forward_calls.iter().next() {
            let line = sites.first().map(|(_, line)| *line).unwrap_or(self.token.line);
            return Err(CompileError::new(
                CompileErrorKind::UndefinedSymbol(name.clone()),
                line,
            ));
        }

        let main = match self.symbols.lookup("main") {
            Some(symbol) if symbol.class == SymbolClass::Function => symbol.value,
            _ => return Err(self.error(CompileErrorKind::UndefinedSymbol("main".into()))),
        };

        // Call main with argc and argv, then exit with its return value.
        let entry = self.code.here();
        self.emit_with(Opcode::Call, main)?;
        self.emit_with(Opcode::Adj, MAIN_ARG_COUNT)?;
        self.emit(Opcode::Push)?;
        self.emit(Opcode::Exit)?;

        let line = self.token.line;
        let code = self
            .code
            .finish()
            .map_err(|kind| CompileError::new(kind, line))?;

        log::debug!(
            "compiled {} code words, {} data bytes",
            code.len(),
            self.data.len()
        );

        Ok(Program {
            code,
            data: self.data.into_bytes(),
            entry,
            main: main as usize,
            lines: self.lines,
        })
    }
}

/// Token handling
impl<'a> Compiler<'a> {
    /// Advance to the next token.
    fn next(&mut self) -> CompileResult<()> {
        self.token = self.lexer.next_token(&mut self.data)?;

        // Code emitted from here on belongs to the new line.
        let is_new_line = self
            .lines
            .last()
            .map(|mark| mark.line < self.token.line)
            .unwrap_or(true);
        if is_new_line && self.token.kind != TokenKind::EOF {
            self.lines.push(LineMark {
                line: self.token.line,
                addr: self.code.here(),
            });
        }

        Ok(())
    }

    /// Consume the current token, which must be of the given kind.
    fn expect(&mut self, kind: TokenKind) -> CompileResult<()> {
        if self.token.kind == kind {
            self.next()
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    /// Consume an identifier, returning its name.
    fn expect_ident(&mut self) -> CompileResult<SmolStr> {
        match &self.token.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.next()?;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    #[inline(never)]
    #[cold]
    fn error(&self, kind: CompileErrorKind) -> CompileError {
        CompileError::new(kind, self.token.line)
    }

    #[inline(never)]
    #[cold]
    fn syntax(&self, message: impl ToString) -> CompileError {
        self.error(CompileErrorKind::Syntax(message.to_string()))
    }

    #[inline(never)]
    #[cold]
    fn unexpected(&self, expected: &str) -> CompileError {
        self.syntax(format!("expected {expected}, found {}", self.token.kind))
    }

    /// Track recursion into a nested expression or statement.
    fn enter(&mut self) -> CompileResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            Err(self.syntax(format!("nesting too deep, limit is {}", self.max_depth)))
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// Emission
impl<'a> Compiler<'a> {
    fn emit(&mut self, op: Opcode) -> CompileResult<usize> {
        let line = self.token.line;
        self.code
            .emit(op)
            .map_err(|kind| CompileError::new(kind, line))
    }

    fn emit_with(&mut self, op: Opcode, operand: i64) -> CompileResult<usize> {
        let line = self.token.line;
        self.code
            .emit_with(op, operand)
            .map_err(|kind| CompileError::new(kind, line))
    }

    fn reserve(&mut self, op: Opcode) -> CompileResult<usize> {
        let line = self.token.line;
        self.code
            .reserve(op)
            .map_err(|kind| CompileError::new(kind, line))
    }

    /// Load the value at the address in the accumulator.
    fn emit_load(&mut self, ty: Type) -> CompileResult<usize> {
        self.emit(if ty.is_char() { Opcode::Lc } else { Opcode::Li })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{bytecode::Opcode as Op, constants::DATA_BASE};

    fn compile_ok(source: &str) -> Program {
        match compile(source, &TinyConf::default()) {
            Ok(program) => program,
            Err(err) => panic!("{err}"),
        }
    }

    fn compile_err(source: &str) -> CompileError {
        compile(source, &TinyConf::default()).unwrap_err()
    }

    /// Instruction words of the function starting at `main`, up to the entry trampoline.
    fn main_body(program: &Program) -> &[i64] {
        &program.code[program.main..program.entry]
    }

    #[test]
    fn test_return_literal() {
        let program = compile_ok("int main() { return 42; }");
        assert_eq!(
            main_body(&program),
            &[
                Op::Ent.word(), 0,
                Op::Imm.word(), 42,
                Op::Lev.word(),
                Op::Lev.word(),
            ]
        );
        assert_eq!(
            &program.code[program.entry..],
            &[Op::Call.word(), 0, Op::Adj.word(), 2, Op::Push.word(), Op::Exit.word()]
        );
    }

    #[test]
    fn test_precedence_emission_order() {
        let program = compile_ok("int main() { return 2 + 3 * 4; }");
        assert_eq!(
            main_body(&program),
            &[
                Op::Ent.word(), 0,
                Op::Imm.word(), 2,
                Op::Push.word(),
                Op::Imm.word(), 3,
                Op::Push.word(),
                Op::Imm.word(), 4,
                Op::Mul.word(),
                Op::Add.word(),
                Op::Lev.word(),
                Op::Lev.word(),
            ]
        );
    }

    #[test]
    fn test_locals_patch_ent() {
        let program = compile_ok("int main() { int a; a = 1; { int b = 2; } return a; }");
        assert_eq!(main_body(&program)[..2], [Op::Ent.word(), 2]);
    }

    #[test]
    fn test_param_offsets() {
        // Two parameters: first at bp+3, second at bp+2.
        let program = compile_ok("int f(int a, int b) { return a - b; } int main() { return f(5, 3); }");
        let code = &program.code;
        assert_eq!(&code[0..2], &[Op::Ent.word(), 0]);
        assert_eq!(&code[2..5], &[Op::Lea.word(), 3, Op::Li.word()]);
        assert_eq!(&code[6..9], &[Op::Lea.word(), 2, Op::Li.word()]);
    }

    #[test]
    fn test_forward_call_patched() {
        let program = compile_ok("int main() { return later(); } int later() { return 7; }");
        let later = 8; // ENT 0; CALL ?; ADJ 0; LEV; LEV
        assert_eq!(
            main_body(&program)[..6],
            [Op::Ent.word(), 0, Op::Call.word(), later, Op::Adj.word(), 0]
        );
        assert_eq!(program.code[later as usize], Op::Ent.word());
    }

    #[test]
    fn test_string_literals_in_data() {
        let program = compile_ok(r#"int main() { printf("ab" "c"); printf("d"); return 0; }"#);
        assert_eq!(&program.data[..], b"abc\0\0\0\0\0d\0\0\0\0\0\0\0");
        assert_eq!(&main_body(&program)[2..4], &[Op::Imm.word(), DATA_BASE]);
    }

    #[test]
    fn test_globals_allocated() {
        let program = compile_ok("int a, *b; char c; int main() { return 0; }");
        assert_eq!(program.data.len(), 3 * WORD_SIZE);
    }

    #[test]
    fn test_enum_constants() {
        let program = compile_ok("enum { A, B = 5, C }; int main() { return C; }");
        assert_eq!(&main_body(&program)[2..4], &[Op::Imm.word(), 6]);
    }

    #[test]
    fn test_line_marks() {
        let program = compile_ok("int main()\n{\n  return 1;\n}\n");
        let lines: Vec<u32> = program.lines.iter().map(|mark| mark.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_undefined_symbol() {
        let err = compile_err("int main() {\n  return missing;\n}");
        assert_eq!(err.kind, CompileErrorKind::UndefinedSymbol("missing".into()));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_undefined_function() {
        let err = compile_err("int main() {\n\n  return nowhere(1);\n}");
        assert_eq!(err.kind, CompileErrorKind::UndefinedSymbol("nowhere".into()));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_missing_main() {
        let err = compile_err("int helper() { return 1; }");
        assert_eq!(err.kind, CompileErrorKind::UndefinedSymbol("main".into()));
    }

    #[test]
    fn test_duplicate_definitions() {
        let err = compile_err("int a; int a; int main() { return 0; }");
        assert_eq!(err.kind, CompileErrorKind::DuplicateDefinition("a".into()));

        let err = compile_err("int main(int x) { int x; return 0; }");
        assert_eq!(err.kind, CompileErrorKind::DuplicateDefinition("x".into()));

        let err = compile_err("int f() { return 0; } int f() { return 1; } int main() { return 0; }");
        assert_eq!(err.kind, CompileErrorKind::DuplicateDefinition("f".into()));
    }

    #[test]
    fn test_syntax_errors() {
        let err = compile_err("int main() { return 1 }");
        assert_eq!(
            err.kind,
            CompileErrorKind::Syntax("expected ';', found '}'".to_string())
        );

        let err = compile_err("int main() { 3 = 4; return 0; }");
        assert!(matches!(err.kind, CompileErrorKind::Syntax(_)));

        let err = compile_err("int main() { int x; return *x; }");
        assert!(matches!(err.kind, CompileErrorKind::Syntax(_)));
    }

    #[test]
    fn test_conditional_is_not_an_lvalue() {
        let source = "int main() {\n  int a; int b; int c;\n  (a ? b : c) = 5;\n  return b;\n}";
        let err = compile_err(source);
        assert_eq!(err.line, 3);
        assert_eq!(
            err.kind,
            CompileErrorKind::Syntax("left side of assignment is not an lvalue".to_string())
        );

        // Same for the other operators that write through their operand.
        let err = compile_err("int main() { int a; int b; return &(a ? b : a); }");
        assert_eq!(err.kind.stage(), "syntax");
        let err = compile_err("int main() { int a; int b; ++(a ? b : a); return 0; }");
        assert_eq!(err.kind.stage(), "syntax");
    }

    #[test]
    fn test_nesting_limit() {
        let conf = TinyConf {
            max_depth: 16,
            ..TinyConf::default()
        };
        let source = format!("int main() {{ return {}1{}; }}", "(".repeat(32), ")".repeat(32));
        let err = compile(source, &conf).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::Syntax(ref msg) if msg.contains("nesting")));
    }

    #[test]
    fn test_code_overflow() {
        let conf = TinyConf {
            pool_size: 64,
            ..TinyConf::default()
        };
        let err = compile("int main() { return 1+1+1+1+1+1+1+1+1+1; }", &conf).unwrap_err();
        assert_eq!(
            err.kind,
            CompileErrorKind::SegmentOverflow(crate::memory::Segment::Code)
        );
    }

    #[test]
    fn test_compile_is_deterministic() {
        let source = "int g; int sq(int x) { return x * x; } int main() { g = sq(3); return g; }";
        assert_eq!(compile_ok(source), compile_ok(source));
    }
}
