// sevenk-hot: Hot substrate for the SevenK knowledge kernel
// Arena, interner, bit-matrix, and cycle metering with zero hot-path allocation

#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
// Note: unsafe code is isolated to the arena and counter-read paths and
// documented with safety justifications

//! # SevenK Hot Substrate
//!
//! The allocation, identification, and timing layer underneath the SevenK
//! graph kernel. Nothing in this crate knows what a triple is; it provides
//! the primitives the kernel's budgeted operations are built from.
//!
//! ## Components
//!
//! - **Arena**: bump allocator owning all long-lived graph state; handles
//!   are `Span` offsets, never raw pointers. Reset frees everything at
//!   once.
//! - **Interner**: byte-string to dense `NodeId` dedup table, golden-ratio
//!   hashed, open addressed, canonical bytes arena-resident.
//! - **BitMatrix**: N×M bit storage with word-parallel row union, the
//!   substrate for class hierarchies and transitive closures.
//! - **Cycles**: RDTSC/CNTVCT counter reads, calibration, and lock-free
//!   per-operation budget accounting.
//!
//! ## Discipline
//!
//! - No allocation after construction except through the arena
//! - No locks; meter aggregates are relaxed atomics
//! - Platform-specific counter reads stay behind [`cycles::read_cycles`]

pub mod arena;
pub mod bitmatrix;
pub mod cycles;
pub mod error;
pub mod intern;

pub use arena::{Arena, Span};
pub use bitmatrix::BitMatrix;
pub use cycles::{
    calibrate, read_cycles, read_cycles_precise, BudgetPolicy, Calibration, CycleMeter,
    CycleTimer, MeterSnapshot, OpMeter, OpSnapshot,
};
pub use error::{ArenaError, BudgetExceeded, InternError};
pub use intern::{Interner, NodeId, GOLDEN_RATIO};

/// Prelude for common imports
pub mod prelude {
    pub use crate::arena::{Arena, Span};
    pub use crate::bitmatrix::BitMatrix;
    pub use crate::cycles::{read_cycles, BudgetPolicy, CycleMeter, CycleTimer};
    pub use crate::error::{ArenaError, BudgetExceeded, InternError};
    pub use crate::intern::{Interner, NodeId};
}
