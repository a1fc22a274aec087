//! Compiler and VM configuration.
use crate::{
    constants::{DEFAULT_MAX_DEPTH, DEFAULT_POOL_SIZE, MIN_POOL_SIZE, SEGMENT_SPAN},
    error::{TinyError, TinyResult},
};

/// Configuration parameters shared by the compiler and the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TinyConf {
    /// Capacity in bytes of the code, data and stack segments.
    pub pool_size: usize,
    /// Capacity in bytes of the heap. Defaults to the pool size.
    pub heap_size: Option<usize>,
    /// Bound on the nesting of expressions and statements.
    pub max_depth: usize,
    /// Stop programs with a fault once they run this many instructions.
    pub max_cycles: Option<u64>,
    /// Log every executed instruction.
    pub trace: bool,
}

impl Default for TinyConf {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            heap_size: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_cycles: None,
            trace: false,
        }
    }
}

impl TinyConf {
    #[inline]
    pub fn heap_size(&self) -> usize {
        self.heap_size.unwrap_or(self.pool_size)
    }

    /// Check that the segments fit the machine's address space.
    pub fn validate(&self) -> TinyResult<()> {
        let span = SEGMENT_SPAN as usize;

        if self.pool_size < MIN_POOL_SIZE {
            return Err(TinyError::Config(format!(
                "pool size must be at least {MIN_POOL_SIZE} bytes, got {}",
                self.pool_size
            )));
        }
        if self.pool_size > span {
            return Err(TinyError::Config(format!(
                "pool size must be at most {span} bytes, got {}",
                self.pool_size
            )));
        }
        if self.heap_size() > span {
            return Err(TinyError::Config(format!(
                "heap size must be at most {span} bytes, got {}",
                self.heap_size()
            )));
        }
        if self.max_depth == 0 {
            return Err(TinyError::Config("max depth must be positive".to_string()));
        }

        Ok(())
    }
}
