//! Symbol table and value types.
use std::{collections::BTreeMap, fmt};

use smol_str::SmolStr;

use crate::{
    bytecode::Opcode,
    constants::{CHAR_SIZE, WORD_SIZE},
    error::CompileErrorKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Char,
    Int,
}

/// Type of a value, as a base type behind zero or more levels of indirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Type {
    pub base: BaseType,
    /// Number of pointer levels.
    pub depth: u8,
}

impl Type {
    pub const INT: Type = Type::new(BaseType::Int);
    pub const CHAR: Type = Type::new(BaseType::Char);

    pub const fn new(base: BaseType) -> Self {
        Self { base, depth: 0 }
    }

    #[inline]
    pub fn pointer_to(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }

    /// Type of the value a pointer points to.
    ///
    /// Returns `None` when the type isn't a pointer.
    #[inline]
    pub fn deref(self) -> Option<Self> {
        self.depth.checked_sub(1).map(|depth| Self { depth, ..self })
    }

    #[inline]
    pub fn is_pointer(self) -> bool {
        self.depth > 0
    }

    #[inline]
    pub fn is_char(self) -> bool {
        self == Self::CHAR
    }

    /// Size in bytes of a value of this type.
    pub fn size(self) -> usize {
        if self.is_char() {
            CHAR_SIZE
        } else {
            WORD_SIZE
        }
    }

    /// Factor by which integer offsets are scaled in pointer arithmetic.
    ///
    /// Non-pointers scale by 1.
    pub fn stride(self) -> usize {
        self.deref().map(Type::size).unwrap_or(1)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.base {
            BaseType::Char => write!(f, "char")?,
            BaseType::Int => write!(f, "int")?,
        }
        if self.is_pointer() {
            write!(f, " ")?;
            for _ in 0..self.depth {
                write!(f, "*")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    /// Constant with a value fixed at compile time.
    Num,
    /// Variable in the data segment, at an absolute address.
    Global,
    /// Parameter or local variable, at an offset in words from the frame pointer.
    Local,
    /// Function defined at a code address.
    Function,
    /// Function referenced or declared, but not yet defined.
    Forward,
    /// Builtin implemented by the VM host.
    Syscall(Opcode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: SmolStr,
    pub class: SymbolClass,
    pub ty: Type,
    /// Constant value, address or frame offset depending on class.
    pub value: i64,
}

/// Builtins visible in every program, with their return types.
#[rustfmt::skip]
const SYSCALLS: [(&str, Opcode, Type); 9] = [
    ("open",   Opcode::Open, Type::INT),
    ("read",   Opcode::Read, Type::INT),
    ("close",  Opcode::Clos, Type::INT),
    ("printf", Opcode::Prtf, Type::INT),
    ("malloc", Opcode::Malc, Type { base: BaseType::Char, depth: 1 }),
    ("free",   Opcode::Free, Type::INT),
    ("memset", Opcode::Mset, Type { base: BaseType::Char, depth: 1 }),
    ("memcmp", Opcode::Mcmp, Type::INT),
    ("exit",   Opcode::Exit, Type::INT),
];

/// Maps identifier names to their compile-time metadata.
///
/// Function bodies get their own scope layered over the globals.
/// Locals shadow globals of the same name until the scope is exited,
/// which discards them all at once.
pub struct SymbolTable {
    globals: BTreeMap<SmolStr, Symbol>,
    locals: Option<BTreeMap<SmolStr, Symbol>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let globals = SYSCALLS
            .iter()
            .map(|(name, opcode, ty)| {
                let symbol = Symbol {
                    name: SmolStr::new(name),
                    class: SymbolClass::Syscall(*opcode),
                    ty: *ty,
                    value: opcode.word(),
                };
                (symbol.name.clone(), symbol)
            })
            .collect();

        Self {
            globals,
            locals: None,
        }
    }

    pub fn declare_global(&mut self, name: &str, ty: Type, addr: i64) -> Result<(), CompileErrorKind> {
        self.insert_global(name, SymbolClass::Global, ty, addr)
    }

    pub fn declare_constant(&mut self, name: &str, value: i64) -> Result<(), CompileErrorKind> {
        self.insert_global(name, SymbolClass::Num, Type::INT, value)
    }

    /// Define a function at the given code address.
    ///
    /// Defining a function that was only forward declared completes it.
    pub fn declare_function(&mut self, name: &str, ty: Type, addr: i64) -> Result<(), CompileErrorKind> {
        match self.globals.get_mut(name) {
            Some(symbol) if symbol.class == SymbolClass::Forward => {
                symbol.class = SymbolClass::Function;
                symbol.ty = ty;
                symbol.value = addr;
                Ok(())
            }
            _ => self.insert_global(name, SymbolClass::Function, ty, addr),
        }
    }

    /// Declare a function that will be defined later in the source.
    ///
    /// Repeating the declaration, or declaring an already defined
    /// function, is allowed.
    pub fn declare_forward(&mut self, name: &str, ty: Type) -> Result<(), CompileErrorKind> {
        match self.globals.get(name) {
            Some(symbol) if matches!(symbol.class, SymbolClass::Forward | SymbolClass::Function) => Ok(()),
            _ => self.insert_global(name, SymbolClass::Forward, ty, 0),
        }
    }

    /// Declare a parameter or local variable in the active function scope.
    pub fn declare_local(&mut self, name: &str, ty: Type, offset: i64) -> Result<(), CompileErrorKind> {
        let locals = self
            .locals
            .as_mut()
            .ok_or_else(|| CompileErrorKind::Syntax(format!("local '{name}' outside of a function")))?;

        if locals.contains_key(name) {
            return Err(CompileErrorKind::DuplicateDefinition(SmolStr::new(name)));
        }

        let symbol = Symbol {
            name: SmolStr::new(name),
            class: SymbolClass::Local,
            ty,
            value: offset,
        };
        locals.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    fn insert_global(
        &mut self,
        name: &str,
        class: SymbolClass,
        ty: Type,
        value: i64,
    ) -> Result<(), CompileErrorKind> {
        if self.globals.contains_key(name) {
            return Err(CompileErrorKind::DuplicateDefinition(SmolStr::new(name)));
        }

        let symbol = Symbol {
            name: SmolStr::new(name),
            class,
            ty,
            value,
        };
        self.globals.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Look up a symbol, searching the function scope first.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.locals
            .as_ref()
            .and_then(|locals| locals.get(name))
            .or_else(|| self.globals.get(name))
    }

    pub fn resolve(&self, name: &str) -> Result<&Symbol, CompileErrorKind> {
        self.lookup(name)
            .ok_or_else(|| CompileErrorKind::UndefinedSymbol(SmolStr::new(name)))
    }

    /// Mutable access to a symbol in the function scope.
    pub(crate) fn local_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.locals.as_mut().and_then(|locals| locals.get_mut(name))
    }

    pub fn enter_function_scope(&mut self) {
        debug_assert!(self.locals.is_none(), "function scopes don't nest");
        self.locals = Some(BTreeMap::new());
    }

    pub fn exit_function_scope(&mut self) {
        self.locals = None;
    }
}
