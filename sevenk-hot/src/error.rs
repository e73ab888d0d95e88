// sevenk-hot: Error types for the hot substrate

/// Arena allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    OutOfArena { requested: usize, available: usize },
}

/// Interner failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InternError {
    #[error("interner full: load-factor ceiling reached at {capacity} slots")]
    InternerFull { capacity: usize },
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Cycle budget overrun. The operation completed; its result was computed
/// before the overrun was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cycle budget exceeded: {elapsed} cycles > budget {budget}")]
pub struct BudgetExceeded {
    pub elapsed: u64,
    pub budget: u64,
}

/// Result alias for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Result alias for interner operations.
pub type InternResult<T> = Result<T, InternError>;
