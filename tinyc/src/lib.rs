//! Compiler and virtual machine for a small subset of C.
//!
//! Source is compiled in a single pass straight to word-sized bytecode,
//! which runs on a stack machine with an accumulator register.
pub mod bytecode;
mod compiler;
mod conf;
pub mod constants;
mod cpu;
pub mod data;
pub mod disasm;
mod encoder;
mod error;
pub mod host;
pub mod lex;
pub mod memory;
mod program;
pub mod symbol;
mod syscall;
mod vm;

pub use self::{
    compiler::{compile, Compiler},
    syscall::format as format_printf,
};

pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        compiler::compile,
        conf::TinyConf,
        cpu::TinyCpu,
        disasm::Disassembler,
        error::{
            CompileError, CompileErrorKind, CompileResult, FaultKind, RuntimeFault, TinyError,
            TinyResult,
        },
        host::{CaptureHost, Host, StdHost},
        program::{LineMark, Program},
        vm::{Flow, Vm},
    };
}

use self::prelude::*;

/// Compile and run a program against the given host.
///
/// Returns the exit status together with the host, so captured
/// output can be inspected.
pub fn run_with<H, A>(source: impl AsRef<[u8]>, conf: TinyConf, host: H, args: &[A]) -> TinyResult<(i64, H)>
where
    H: Host,
    A: AsRef<[u8]>,
{
    let program = compile(source, &conf)?;
    let mut vm = Vm::with_host(conf, host)?;
    vm.load(&program, args)?;
    let status = vm.execute()?;
    Ok((status, vm.into_host()))
}
