// sevenk-kernel: Error types for the graph kernel

use sevenk_hot::{ArenaError, BudgetExceeded, InternError};

/// Triple store failure. All variants leave the store consistent; `add`
/// rolls back partial effects before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("triple store full: dense array capacity {capacity} reached")]
    StoreFull { capacity: usize },
    #[error("node table full: capacity {capacity} reached")]
    NodeTableFull { capacity: usize },
    #[error(transparent)]
    OutOfArena(#[from] ArenaError),
    #[error(transparent)]
    CycleBudget(#[from] BudgetExceeded),
}

/// OWL engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OwlError {
    #[error("invalid argument: entity id {id} exceeds max entities {max}")]
    InvalidArgument { id: u32, max: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Intern(#[from] InternError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Owl(#[from] OwlError),
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error(transparent)]
    CycleBudget(#[from] BudgetExceeded),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for OWL operations.
pub type OwlResult<T> = Result<T, OwlError>;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
