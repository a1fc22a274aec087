//! Register state.

/// Registers of the virtual machine.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TinyCpu {
    /// Program counter, indexing the next word in the code segment.
    pub pc: usize,
    /// Frame pointer of the active function.
    pub bp: i64,
    /// Stack pointer, addressing the top word on the stack.
    pub sp: i64,
    /// Accumulator, holding the result of the last instruction.
    pub ax: i64,
    /// Number of instructions executed since the program was loaded.
    pub cycle: u64,
}

impl TinyCpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Point every register at an empty stack with its top at `stack_top`.
    pub(crate) fn reset(&mut self, stack_top: i64) {
        *self = Self {
            bp: stack_top,
            sp: stack_top,
            ..Default::default()
        };
    }
}
