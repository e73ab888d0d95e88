// sevenk-kernel: SHACL-style shape validation
// Compiled shapes evaluated against adjacency counts and OWL bit-indices

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use sevenk_hot::arena::Arena;
use sevenk_hot::intern::NodeId;

use crate::owl::OwlEngine;
use crate::store::TripleStore;

bitflags! {
    /// Permitted value kinds for a [`Constraint::NodeKind`] check.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeKindSet: u8 {
        const IRI = 1;
        const LITERAL = 1 << 1;
        const BLANK_NODE = 1 << 2;
    }
}

/// The kind of an individual node, registered on the engine by whatever
/// parsed it. Unregistered nodes read as IRI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Iri,
    Literal,
    BlankNode,
}

impl NodeKind {
    #[inline(always)]
    pub const fn as_set(self) -> NodeKindSet {
        match self {
            NodeKind::Iri => NodeKindSet::IRI,
            NodeKind::Literal => NodeKindSet::LITERAL,
            NodeKind::BlankNode => NodeKindSet::BLANK_NODE,
        }
    }
}

/// One property constraint of a compiled shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// The node must have at least `min` distinct values for `p`.
    MinCount { p: NodeId, min: u32 },
    /// The node must have at most `max` distinct values for `p`.
    MaxCount { p: NodeId, max: u32 },
    /// Every value of `p` must be an instance of `class` via the
    /// materialized hierarchy.
    ClassOfValue { p: NodeId, class: NodeId },
    /// Every value of `p` must have a kind in `kinds`.
    NodeKind { p: NodeId, kinds: NodeKindSet },
    /// At least one value of `p` must equal `value`.
    HasValue { p: NodeId, value: NodeId },
}

/// Reference to the first failing constraint of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    /// Position in the shape's constraint list.
    pub index: usize,
    pub constraint: Constraint,
}

/// Validation outcome. `NotApplicable` (unknown node, or target class not
/// matching) counts as conforming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Conformant,
    NonConformant { first_violation: Violation },
    NotApplicable,
}

impl ValidationResult {
    #[inline(always)]
    pub fn conforms(&self) -> bool {
        !matches!(self, ValidationResult::NonConformant { .. })
    }

    pub fn first_violation(&self) -> Option<Violation> {
        match self {
            ValidationResult::NonConformant { first_violation } => Some(*first_violation),
            _ => None,
        }
    }
}

/// A compiled shape: optional target class plus an ordered constraint
/// list. Compile once with [`ShapeBuilder`], evaluate per node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    target_class: Option<NodeId>,
    constraints: SmallVec<[Constraint; 8]>,
}

impl Shape {
    pub fn builder() -> ShapeBuilder {
        ShapeBuilder::new()
    }

    /// Shape surfacing functional-property violations: at most one value
    /// of `p`, any target.
    pub fn functional(p: NodeId) -> Shape {
        Shape::builder().max_count(p, 1).build()
    }

    #[inline(always)]
    pub fn target_class(&self) -> Option<NodeId> {
        self.target_class
    }

    #[inline(always)]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

/// Builder for [`Shape`].
#[derive(Debug, Default)]
pub struct ShapeBuilder {
    target_class: Option<NodeId>,
    constraints: SmallVec<[Constraint; 8]>,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_class(mut self, class: NodeId) -> Self {
        self.target_class = Some(class);
        self
    }

    pub fn min_count(mut self, p: NodeId, min: u32) -> Self {
        self.constraints.push(Constraint::MinCount { p, min });
        self
    }

    pub fn max_count(mut self, p: NodeId, max: u32) -> Self {
        self.constraints.push(Constraint::MaxCount { p, max });
        self
    }

    pub fn class_of_value(mut self, p: NodeId, class: NodeId) -> Self {
        self.constraints.push(Constraint::ClassOfValue { p, class });
        self
    }

    pub fn node_kind(mut self, p: NodeId, kinds: NodeKindSet) -> Self {
        self.constraints.push(Constraint::NodeKind { p, kinds });
        self
    }

    pub fn has_value(mut self, p: NodeId, value: NodeId) -> Self {
        self.constraints.push(Constraint::HasValue { p, value });
        self
    }

    pub fn build(self) -> Shape {
        Shape {
            target_class: self.target_class,
            constraints: self.constraints,
        }
    }
}

/// Borrowed view of everything evaluation consults. Built by the engine
/// per call; nothing here allocates.
pub struct ValidationContext<'a> {
    pub arena: &'a Arena,
    pub store: &'a TripleStore,
    pub owl: &'a OwlEngine,
    pub class_predicate: Option<NodeId>,
    pub node_kinds: &'a FxHashMap<u32, NodeKind>,
    /// Number of ids the interner has produced; ids at or above this were
    /// never interned.
    pub known_nodes: u32,
}

impl ValidationContext<'_> {
    #[inline(always)]
    fn kind_of(&self, id: NodeId) -> NodeKind {
        self.node_kinds.get(&id.raw()).copied().unwrap_or_default()
    }

    /// Direct-or-subclass membership test, usable before and after
    /// materialization.
    #[inline(always)]
    fn class_matches(&self, class: NodeId, target: NodeId) -> bool {
        class == target || self.owl.is_subclass_of(class, target)
    }

    /// Whether `node` is a declared instance of `target` (via the class
    /// predicate and the hierarchy).
    fn is_instance_of(&self, node: NodeId, target: NodeId) -> bool {
        let Some(ct) = self.class_predicate else {
            return false;
        };
        self.store
            .subject_adjacency(self.arena, node)
            .iter()
            .any(|e| e.p == ct && self.class_matches(e.o, target))
    }
}

/// Count distinct objects for predicate `p` at `node`. First-occurrence
/// scan over the adjacency slice: quadratic in out-degree, allocation
/// free.
fn distinct_values(ctx: &ValidationContext<'_>, node: NodeId, p: NodeId) -> u32 {
    let edges = ctx.store.subject_adjacency(ctx.arena, node);
    let mut count = 0u32;
    for (i, e) in edges.iter().enumerate() {
        if e.p != p {
            continue;
        }
        let first = !edges[..i].iter().any(|f| f.p == p && f.o == e.o);
        if first {
            count += 1;
        }
    }
    count
}

fn check(ctx: &ValidationContext<'_>, node: NodeId, constraint: &Constraint) -> bool {
    let edges = ctx.store.subject_adjacency(ctx.arena, node);
    match *constraint {
        Constraint::MinCount { p, min } => distinct_values(ctx, node, p) >= min,
        Constraint::MaxCount { p, max } => distinct_values(ctx, node, p) <= max,
        Constraint::ClassOfValue { p, class } => edges
            .iter()
            .filter(|e| e.p == p)
            .all(|e| ctx.is_instance_of(e.o, class)),
        Constraint::NodeKind { p, kinds } => edges
            .iter()
            .filter(|e| e.p == p)
            .all(|e| kinds.contains(ctx.kind_of(e.o).as_set())),
        Constraint::HasValue { p, value } => edges.iter().any(|e| e.p == p && e.o == value),
    }
}

/// Evaluate a compiled shape against one node. Never fails: unknown nodes
/// and non-matching targets are `NotApplicable`; everything else is a
/// conformance answer with the first violation localized.
pub fn evaluate(shape: &Shape, node: NodeId, ctx: &ValidationContext<'_>) -> ValidationResult {
    if node.raw() >= ctx.known_nodes {
        return ValidationResult::NotApplicable;
    }
    if let Some(target) = shape.target_class {
        if !ctx.is_instance_of(node, target) {
            return ValidationResult::NotApplicable;
        }
    }
    for (index, constraint) in shape.constraints.iter().enumerate() {
        if !check(ctx, node, constraint) {
            return ValidationResult::NonConformant {
                first_violation: Violation {
                    index,
                    constraint: *constraint,
                },
            };
        }
    }
    ValidationResult::Conformant
}
