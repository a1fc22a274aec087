//! Constant values of the virtual machine.

/// Size in bytes of a machine word.
///
/// Integers, pointers and stack slots are all one word wide.
pub const WORD_SIZE: usize = 8;

/// Size in bytes of a `char`.
pub const CHAR_SIZE: usize = 1;

/// Distance between the base addresses of the memory segments.
///
/// No segment may grow beyond this, otherwise addresses would become ambiguous.
pub const SEGMENT_SPAN: i64 = 0x1000_0000; // 256 MiB

/// Virtual base address of the data segment, holding globals and string literals.
///
/// The lowest span is left unmapped so that `NULL` and small integers
/// mistaken for pointers are caught as faults.
pub const DATA_BASE: i64 = SEGMENT_SPAN;

/// Virtual base address of the heap, served by `malloc`.
pub const HEAP_BASE: i64 = SEGMENT_SPAN * 2;

/// Virtual base address of the stack segment.
///
/// The stack grows downwards, starting at the top of the segment.
pub const STACK_BASE: i64 = SEGMENT_SPAN * 3;

/// Default capacity in bytes of each memory pool.
pub const DEFAULT_POOL_SIZE: usize = 256 * 1024;

/// Smallest pool that can still hold the entry trampoline and a few frames.
pub const MIN_POOL_SIZE: usize = 256;

/// Default bound on the nesting of expressions and statements.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Largest field width or precision accepted by `printf`.
pub const MAX_FIELD_WIDTH: usize = 4096;

/// Number of words the entry trampoline passes to `main`.
///
/// These are `argc` and `argv`.
pub const MAIN_ARG_COUNT: i64 = 2;
