//! Virtual machine.
use crate::{
    bytecode::{InvalidOpcode, Opcode},
    conf::TinyConf,
    constants::WORD_SIZE,
    cpu::TinyCpu,
    error::{FaultKind, RuntimeFault, TinyError, TinyResult},
    host::{Host, StdHost},
    memory::{MemResult, Memory, Segment},
    program::Program,
};

const WORD: i64 = WORD_SIZE as i64;

pub struct Vm<H: Host = StdHost> {
    pub(crate) cpu: TinyCpu,
    pub(crate) code: Box<[i64]>,
    pub(crate) memory: Memory,
    pub(crate) host: H,
    /// Exit status once the program has halted.
    status: Option<i64>,
    conf: TinyConf,
}

/// Outcome of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Entered a function with `CALL`.
    Call,
    /// Left a function with `LEV`.
    Return,
    /// Program halted with the given status.
    ///
    /// This is returned by `EXIT`, or when the program
    /// counter runs off the end of the code segment.
    Exit(i64),
}

impl Vm<StdHost> {
    pub fn new(conf: TinyConf) -> TinyResult<Self> {
        Self::with_host(conf, StdHost::new())
    }
}

impl<H: Host> Vm<H> {
    pub fn with_host(conf: TinyConf, host: H) -> TinyResult<Self> {
        conf.validate()?;

        Ok(Self {
            cpu: TinyCpu::new(),
            code: Box::new([]),
            memory: Memory::new(conf.pool_size, conf.heap_size(), conf.pool_size),
            host,
            status: None,
            conf,
        })
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &TinyConf {
        &self.conf
    }

    pub fn cpu(&self) -> &TinyCpu {
        &self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Prepare a program for execution.
    ///
    /// Memory is wiped, the data image copied in, and the arguments
    /// passed to `main` as `argc` and `argv`. The strings and the
    /// pointer array live on the heap.
    pub fn load<A: AsRef<[u8]>>(&mut self, program: &Program, args: &[A]) -> TinyResult<()> {
        if program.code.len() > self.conf.pool_size / WORD_SIZE {
            return Err(self.load_fault(FaultKind::SegmentOverflow(Segment::Code), program));
        }

        // Start with clean memory to avoid leaking previous program.
        self.memory.clear();
        self.memory
            .load_data(&program.data)
            .map_err(|kind| self.load_fault(kind, program))?;
        self.code = program.code.clone();
        self.status = None;

        let (_, stack_top) = self.memory.stack_bounds();
        self.cpu.reset(stack_top);

        self.push_args(args)
            .map_err(|kind| self.load_fault(kind, program))?;

        self.cpu.pc = program.entry;

        log::debug!(
            "loaded {} code words, {} data bytes, {} arguments",
            program.code.len(),
            program.data.len(),
            args.len()
        );

        Ok(())
    }

    /// Push `argc` and `argv` for the entry trampoline.
    fn push_args<A: AsRef<[u8]>>(&mut self, args: &[A]) -> MemResult<()> {
        let argv = self.write_args(args)?;
        self.push(args.len() as i64)?;
        self.push(argv)
    }

    /// Copy the argument strings to the heap, returning the address of the pointer array.
    fn write_args<A: AsRef<[u8]>>(&mut self, args: &[A]) -> MemResult<i64> {
        let overflow = FaultKind::SegmentOverflow(Segment::Heap);
        let mut pointers = Vec::with_capacity(args.len());

        for arg in args {
            let arg = arg.as_ref();
            let addr = self
                .memory
                .alloc(arg.len() as i64 + 1)
                .ok_or_else(|| overflow.clone())?;
            self.memory.slice_mut(addr, arg.len())?.copy_from_slice(arg);
            self.memory.store_char(addr + arg.len() as i64, 0)?;
            pointers.push(addr);
        }

        let array = self
            .memory
            .alloc(((args.len() + 1) * WORD_SIZE) as i64)
            .ok_or(overflow)?;
        for (index, ptr) in pointers.into_iter().enumerate() {
            self.memory.store_int(array + index as i64 * WORD, ptr)?;
        }

        Ok(array)
    }

    fn load_fault(&self, kind: FaultKind, program: &Program) -> TinyError {
        TinyError::Runtime(RuntimeFault {
            kind,
            cycle: 0,
            pc: program.entry,
        })
    }
}

/// Interpreter
impl<H: Host> Vm<H> {
    /// Run the loaded program to completion, returning its exit status.
    pub fn execute(&mut self) -> TinyResult<i64> {
        loop {
            if let Flow::Exit(status) = self.step()? {
                log::debug!(
                    "exit status {status} after {} cycles, {} heap bytes used",
                    self.cpu.cycle,
                    self.memory.heap_used()
                );
                return Ok(status);
            }
        }
    }

    /// Execute at most `step_count` instructions.
    ///
    /// Stops early when the program exits. Returns the flow of the last
    /// executed instruction.
    pub fn run_steps(&mut self, step_count: usize) -> TinyResult<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
            if let Flow::Exit(_) = flow {
                break;
            }
        }

        Ok(flow)
    }

    /// Execute a single instruction.
    ///
    /// Once the program has exited, stepping keeps reporting its status.
    pub fn step(&mut self) -> TinyResult<Flow> {
        if let Some(status) = self.status {
            return Ok(Flow::Exit(status));
        }

        let pc = self.cpu.pc;
        let flow = self.exec().map_err(|kind| RuntimeFault {
            kind,
            cycle: self.cpu.cycle,
            pc,
        })?;

        if let Flow::Exit(status) = flow {
            self.status = Some(status);
            // Output that can't be flushed is lost, the status still stands.
            if let Err(err) = self.host.flush() {
                log::warn!("failed to flush program output: {err}");
            }
        }

        Ok(flow)
    }

    /// Fetch, decode and execute the instruction at `pc`.
    fn exec(&mut self) -> Result<Flow, FaultKind> {
        let pc = self.cpu.pc;

        if pc == self.code.len() {
            return Ok(Flow::Exit(self.cpu.ax));
        }

        if let Some(limit) = self.conf.max_cycles {
            if self.cpu.cycle >= limit {
                return Err(FaultKind::CycleLimit(limit));
            }
        }

        // Counted before decoding, so a bad fetch is charged to this instruction.
        self.cpu.cycle += 1;

        let word = *self.code.get(pc).ok_or(FaultKind::BadJump(pc as i64))?;
        let op = Opcode::try_from(word).map_err(|InvalidOpcode(word)| FaultKind::InvalidOpcode(word))?;
        let n = if op.has_operand() {
            *self.code.get(pc + 1).ok_or(FaultKind::BadJump(pc as i64 + 1))?
        } else {
            0
        };

        self.cpu.pc = pc + 1 + op.has_operand() as usize;

        if self.conf.trace {
            if op.has_operand() {
                log::trace!("{}> {:<4} {}", self.cpu.cycle, op.mnemonic(), n);
            } else {
                log::trace!("{}> {}", self.cpu.cycle, op.mnemonic());
            }
        }

        let mut flow = Flow::Ok;

        match op {
            Opcode::Lea => self.cpu.ax = self.cpu.bp.wrapping_add(n.wrapping_mul(WORD)),
            Opcode::Imm => self.cpu.ax = n,
            Opcode::Jmp => self.jump(n)?,
            Opcode::Call => {
                self.push(self.cpu.pc as i64)?;
                self.jump(n)?;
                flow = Flow::Call;
            }
            Opcode::Jz => {
                if self.cpu.ax == 0 {
                    self.jump(n)?;
                }
            }
            Opcode::Jnz => {
                if self.cpu.ax != 0 {
                    self.jump(n)?;
                }
            }
            Opcode::Ent => {
                self.push(self.cpu.bp)?;
                self.cpu.bp = self.cpu.sp;
                let (stack_base, _) = self.memory.stack_bounds();
                let sp = self.cpu.sp.wrapping_sub(n.wrapping_mul(WORD));
                if sp < stack_base || sp > self.cpu.bp {
                    return Err(FaultKind::SegmentOverflow(Segment::Stack));
                }
                self.cpu.sp = sp;
            }
            Opcode::Adj => self.cpu.sp = self.cpu.sp.wrapping_add(n.wrapping_mul(WORD)),
            Opcode::Lev => {
                self.cpu.sp = self.cpu.bp;
                self.cpu.bp = self.pop()?;
                let ret = self.pop()?;
                self.jump(ret)?;
                flow = Flow::Return;
            }
            Opcode::Li => self.cpu.ax = self.memory.load_int(self.cpu.ax)?,
            Opcode::Lc => self.cpu.ax = self.memory.load_char(self.cpu.ax)?,
            Opcode::Si => {
                let addr = self.pop()?;
                self.memory.store_int(addr, self.cpu.ax)?;
            }
            Opcode::Sc => {
                let addr = self.pop()?;
                self.memory.store_char(addr, self.cpu.ax)?;
                // Leave the value as it was truncated.
                self.cpu.ax = self.cpu.ax as i8 as i64;
            }
            Opcode::Push => self.push(self.cpu.ax)?,
            Opcode::Or
            | Opcode::Xor
            | Opcode::And
            | Opcode::Eq
            | Opcode::Ne
            | Opcode::Lt
            | Opcode::Gt
            | Opcode::Le
            | Opcode::Ge
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod => {
                let a = self.pop()?;
                self.cpu.ax = binary(op, a, self.cpu.ax)?;
            }
            Opcode::Open
            | Opcode::Read
            | Opcode::Clos
            | Opcode::Prtf
            | Opcode::Malc
            | Opcode::Free
            | Opcode::Mset
            | Opcode::Mcmp
            | Opcode::Exit => flow = self.syscall(op)?,
        }

        Ok(flow)
    }

    /// Move the program counter, which may point just past the last instruction.
    #[inline]
    fn jump(&mut self, target: i64) -> Result<(), FaultKind> {
        match usize::try_from(target) {
            Ok(addr) if addr <= self.code.len() => {
                self.cpu.pc = addr;
                Ok(())
            }
            _ => Err(FaultKind::BadJump(target)),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, value: i64) -> MemResult<()> {
        let (stack_base, _) = self.memory.stack_bounds();
        let sp = self.cpu.sp.wrapping_sub(WORD);
        if sp < stack_base {
            return Err(FaultKind::SegmentOverflow(Segment::Stack));
        }
        self.memory.store_int(sp, value)?;
        self.cpu.sp = sp;
        Ok(())
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> MemResult<i64> {
        let value = self.memory.load_int(self.cpu.sp)?;
        self.cpu.sp = self.cpu.sp.wrapping_add(WORD);
        Ok(value)
    }

    /// Word `index` slots above the stack pointer.
    #[inline]
    pub(crate) fn stack_arg(&self, index: i64) -> MemResult<i64> {
        self.memory
            .load_int(self.cpu.sp.wrapping_add(index.wrapping_mul(WORD)))
    }
}

/// Combine a left operand popped from the stack with the accumulator.
#[rustfmt::skip]
fn binary(op: Opcode, a: i64, b: i64) -> Result<i64, FaultKind> {
    let value = match op {
        Opcode::Or  => a | b,
        Opcode::Xor => a ^ b,
        Opcode::And => a & b,
        Opcode::Eq  => (a == b) as i64,
        Opcode::Ne  => (a != b) as i64,
        Opcode::Lt  => (a < b) as i64,
        Opcode::Gt  => (a > b) as i64,
        Opcode::Le  => (a <= b) as i64,
        Opcode::Ge  => (a >= b) as i64,
        Opcode::Shl => a.wrapping_shl(b as u32),
        Opcode::Shr => a.wrapping_shr(b as u32),
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::Div => {
            if b == 0 { return Err(FaultKind::DivisionByZero); }
            a.wrapping_div(b)
        }
        Opcode::Mod => {
            if b == 0 { return Err(FaultKind::DivisionByZero); }
            a.wrapping_rem(b)
        }
        _ => return Err(FaultKind::InvalidOpcode(op.word())),
    };
    Ok(value)
}
