// sevenk-kernel: Cycle-budgeted in-memory knowledge graph kernel
// Triple store + OWL reasoning + SHACL validation behind one façade

#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

//! # SevenK Kernel
//!
//! An in-memory knowledge graph engine whose core operations carry a hard
//! per-call cycle budget: `ask` targets seven cycles under warm-cache
//! conditions, `add` and `validate` small constants. Storage is
//! arena-backed with O(1) pattern lookup; reasoning is compiled into
//! bit-matrices off the hot path.
//!
//! ## Key Components
//!
//! - **TripleStore**: dense triple array, per-subject adjacency, and a
//!   golden-ratio subject hash index
//! - **OwlEngine**: axiom list plus materialized class hierarchy,
//!   property-characteristic flags, and per-predicate transitive closures
//! - **Shape / validate**: compiled SHACL-style constraints evaluated
//!   against adjacency counts and the OWL bit-indices
//! - **Engine**: the single entry surface composing all of the above with
//!   per-operation cycle accounting
//!
//! ## Discipline
//!
//! - Zero heap allocation on ask/validate; arena-only allocation on add
//! - Single writer, many readers, no internal locks
//! - Budget overruns are returned values, never aborts
//! - Materialization is the one batch path: unbudgeted, reported
//!
//! ## Example
//!
//! ```rust
//! use sevenk_kernel::prelude::*;
//!
//! let mut engine = Engine::new(1 << 20, 1024, 256)?;
//! let alice = engine.intern(b"alice")?;
//! let knows = engine.intern(b"knows")?;
//! let bob = engine.intern(b"bob")?;
//!
//! engine.add(alice, knows, bob)?;
//! assert!(engine.ask(alice, knows, bob));
//! assert!(!engine.ask(bob, knows, alice));
//! # Ok::<(), sevenk_kernel::EngineError>(())
//! ```

pub mod engine;
pub mod error;
pub mod owl;
pub mod shacl;
pub mod store;

// Re-exports for convenience
pub use engine::{Engine, EngineBuilder, EngineConfig};
pub use error::{EngineError, OwlError, StoreError};
pub use owl::{Axiom, AxiomKind, MaterializationReport, OwlEngine, PropertyCharacteristic};
pub use shacl::{
    Constraint, NodeKind, NodeKindSet, Shape, ShapeBuilder, ValidationResult, Violation,
};
pub use store::{Edge, QueryStatus, Stats, Triple, TriplePattern, TripleStore};

// The hot substrate types that appear on this crate's surface.
pub use sevenk_hot::{Arena, BudgetPolicy, BudgetExceeded, CycleMeter, MeterSnapshot, NodeId};

/// Prelude for common imports
pub mod prelude {
    pub use crate::engine::{Engine, EngineBuilder, EngineConfig};
    pub use crate::error::{EngineError, OwlError, StoreError};
    pub use crate::owl::{AxiomKind, MaterializationReport, PropertyCharacteristic};
    pub use crate::shacl::{NodeKind, NodeKindSet, Shape, ValidationResult};
    pub use crate::store::{QueryStatus, Triple, TriplePattern};
    pub use sevenk_hot::{BudgetPolicy, NodeId};
}
