//! Numeric backend selection.
//!
//! Rather than rebind a module-global alias between a CPU and a GPU array
//! implementation, `Backend` is a tagged variant threaded explicitly through
//! `Scanner::new`. Every kernel in this crate is written against plain
//! `ndarray` views so a future GPU-backed variant only has to change where
//! the `Chunk` data actually lives, not the kernels themselves.

/// Which numeric backend a `Scanner` should assume its chunks are materialized on.
///
/// Only `Cpu` is implemented here; the variant exists so callers configure the
/// backend once at construction time instead of branching on it throughout
/// the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Cpu,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Cpu => write!(f, "cpu"),
        }
    }
}
