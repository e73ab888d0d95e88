// sevenk-kernel: OWL engine
// Axiom list + bit-matrix materialization (class hierarchy, property
// flags, per-predicate transitive closures)

use serde::{Deserialize, Serialize};
use sevenk_hot::arena::Arena;
use sevenk_hot::bitmatrix::BitMatrix;
use sevenk_hot::cycles::CycleTimer;
use sevenk_hot::intern::NodeId;

use crate::error::{OwlError, OwlResult};
use crate::store::{Triple, TripleStore};

/// The supported axiom kinds.
///
/// Class-relation kinds (SubClassOf, EquivalentClass, DisjointWith,
/// SameAs, DifferentFrom) use the subject and object fields. Property
/// characteristics (Transitive, Symmetric, Functional,
/// InverseFunctional) use the subject field only. Domain/Range take a
/// property subject and a class object; InverseOf takes two properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxiomKind {
    SubClassOf,
    EquivalentClass,
    DisjointWith,
    Transitive,
    Symmetric,
    Functional,
    InverseFunctional,
    Domain,
    Range,
    InverseOf,
    SameAs,
    DifferentFrom,
}

/// One declarative statement, compiled into the bit-matrices at
/// materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axiom {
    pub subject: NodeId,
    pub predicate: NodeId,
    pub object: NodeId,
    pub kind: AxiomKind,
}

/// Property characteristic flag bits in the property-flag matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PropertyCharacteristic {
    Transitive = 0,
    Symmetric = 1,
    Functional = 2,
    InverseFunctional = 3,
}

impl PropertyCharacteristic {
    #[inline(always)]
    const fn bit(self) -> usize {
        self as usize
    }
}

/// Outcome of a materialization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializationReport {
    /// Bits newly set in the matrices plus triples newly inferred.
    pub inference_count: u64,
    /// Cycle cost of the whole batch. Materialization is not budgeted.
    pub cycles: u64,
}

const FLAG_BITS: usize = 64;

/// Axiom store and reasoner. Class relations live in a bit-matrix with 2N
/// columns, `[0, N)` positive (subclass/equivalent/same-as) and `[N, 2N)`
/// disjoint/different, so the disjoint encoding is exact for any entity
/// bound. Each transitive predicate gets its own closure matrix.
pub struct OwlEngine {
    axioms: Vec<Axiom>,
    hierarchy: BitMatrix,
    prop_flags: BitMatrix,
    closures: Vec<Option<BitMatrix>>,
    max_entities: u32,
    materialized: bool,
    inference_count: u64,
}

impl OwlEngine {
    /// `max_entities` bounds the id space of classes and properties; it is
    /// rounded up to a multiple of 64, minimum 64.
    pub fn new(max_entities: usize) -> Self {
        let n = max_entities.max(64).div_ceil(64) * 64;
        Self {
            axioms: Vec::new(),
            hierarchy: BitMatrix::new(n, 2 * n),
            prop_flags: BitMatrix::new(n, FLAG_BITS),
            closures: (0..n).map(|_| None).collect(),
            max_entities: n as u32,
            materialized: false,
            inference_count: 0,
        }
    }

    #[inline(always)]
    pub fn max_entities(&self) -> usize {
        self.max_entities as usize
    }

    #[inline(always)]
    pub fn axiom_count(&self) -> usize {
        self.axioms.len()
    }

    #[inline(always)]
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Inference count of the most recent materialization.
    #[inline(always)]
    pub fn inference_count(&self) -> u64 {
        self.inference_count
    }

    fn check_entity(&self, id: NodeId) -> OwlResult<usize> {
        if id.raw() >= self.max_entities {
            return Err(OwlError::InvalidArgument {
                id: id.raw(),
                max: self.max_entities,
            });
        }
        Ok(id.index())
    }

    /// Record an axiom and apply its immediate matrix effects. The same
    /// seeds are re-applied idempotently at materialization.
    pub fn assert_axiom(
        &mut self,
        s: NodeId,
        p: NodeId,
        o: NodeId,
        kind: AxiomKind,
    ) -> OwlResult<()> {
        let n = self.max_entities as usize;
        match kind {
            AxiomKind::SubClassOf => {
                let (a, b) = (self.check_entity(s)?, self.check_entity(o)?);
                self.hierarchy.set(a, b);
            }
            AxiomKind::EquivalentClass | AxiomKind::SameAs => {
                let (a, b) = (self.check_entity(s)?, self.check_entity(o)?);
                self.hierarchy.set(a, b);
                self.hierarchy.set(b, a);
            }
            AxiomKind::DisjointWith | AxiomKind::DifferentFrom => {
                let (a, b) = (self.check_entity(s)?, self.check_entity(o)?);
                self.hierarchy.set(a, n + b);
                self.hierarchy.set(b, n + a);
            }
            AxiomKind::Transitive => {
                let a = self.check_entity(s)?;
                self.prop_flags.set(a, PropertyCharacteristic::Transitive.bit());
            }
            AxiomKind::Symmetric => {
                let a = self.check_entity(s)?;
                self.prop_flags.set(a, PropertyCharacteristic::Symmetric.bit());
            }
            AxiomKind::Functional => {
                let a = self.check_entity(s)?;
                self.prop_flags.set(a, PropertyCharacteristic::Functional.bit());
            }
            AxiomKind::InverseFunctional => {
                let a = self.check_entity(s)?;
                self.prop_flags
                    .set(a, PropertyCharacteristic::InverseFunctional.bit());
            }
            AxiomKind::Domain | AxiomKind::Range | AxiomKind::InverseOf => {
                self.check_entity(s)?;
                self.check_entity(o)?;
            }
        }
        self.axioms.push(Axiom {
            subject: s,
            predicate: p,
            object: o,
            kind,
        });
        Ok(())
    }

    #[inline(always)]
    pub fn is_subclass_of(&self, c: NodeId, d: NodeId) -> bool {
        self.hierarchy.test(c.index(), d.index())
    }

    #[inline(always)]
    pub fn is_equivalent(&self, a: NodeId, b: NodeId) -> bool {
        self.hierarchy.test(a.index(), b.index()) && self.hierarchy.test(b.index(), a.index())
    }

    #[inline(always)]
    pub fn is_disjoint_with(&self, a: NodeId, b: NodeId) -> bool {
        self.hierarchy
            .test(a.index(), self.max_entities as usize + b.index())
    }

    /// DifferentFrom shares the disjoint columns.
    #[inline(always)]
    pub fn is_different_from(&self, a: NodeId, b: NodeId) -> bool {
        self.is_disjoint_with(a, b)
    }

    #[inline(always)]
    pub fn has_property_characteristic(&self, p: NodeId, ch: PropertyCharacteristic) -> bool {
        self.prop_flags.test(p.index(), ch.bit())
    }

    /// Transitive reachability from s to o along predicate p.
    ///
    /// Requires the Transitive flag on p. After materialization this is a
    /// single closure-matrix bit test. Before materialization (or for ids
    /// outside the matrix bound) it falls back to a direct-edge check plus
    /// a depth-one chain scan.
    pub fn transitive_ask(
        &self,
        arena: &Arena,
        store: &TripleStore,
        s: NodeId,
        p: NodeId,
        o: NodeId,
    ) -> bool {
        if !self.has_property_characteristic(p, PropertyCharacteristic::Transitive) {
            return false;
        }
        let n = self.max_entities as usize;
        if self.materialized && s.index() < n && o.index() < n {
            if let Some(closure) = &self.closures[p.index()] {
                return closure.test(s.index(), o.index());
            }
            return false;
        }
        self.depth_one_ask(arena, store, s, p, o)
    }

    fn depth_one_ask(
        &self,
        arena: &Arena,
        store: &TripleStore,
        s: NodeId,
        p: NodeId,
        o: NodeId,
    ) -> bool {
        if store.ask(arena, s, p, o) {
            return true;
        }
        store
            .subject_adjacency(arena, s)
            .iter()
            .any(|e| e.p == p && store.ask(arena, e.o, p, o))
    }

    /// Drop all materialized state (closures stay empty until the next
    /// materialization; hierarchy and flags are reseeded from the axiom
    /// list on assert or materialize).
    pub fn clear_materialization(&mut self) {
        self.hierarchy.clear_all();
        self.prop_flags.clear_all();
        for c in &mut self.closures {
            *c = None;
        }
        self.materialized = false;
        self.inference_count = 0;
        // Reseed immediate effects so assert-time queries keep working.
        let axioms = std::mem::take(&mut self.axioms);
        for ax in &axioms {
            // Ids were validated on first assert.
            let _ = self.assert_axiom(ax.subject, ax.predicate, ax.object, ax.kind);
        }
        // assert_axiom re-pushed every axiom; the list is unchanged.
        debug_assert_eq!(self.axioms.len(), axioms.len());
    }

    /// Compile the axiom list and the store's edges into materialized
    /// form: reseed the matrices, infer triples for symmetric/inverse-of/
    /// domain/range axioms, close the class hierarchy, and build one
    /// closure matrix per transitive predicate.
    ///
    /// Batch operation: cycle cost is reported, not budgeted. Inferred
    /// triples go through the normal `add` path and can exhaust the store
    /// or arena; such failures propagate.
    pub fn materialize(
        &mut self,
        arena: &mut Arena,
        store: &mut TripleStore,
        class_predicate: Option<NodeId>,
    ) -> OwlResult<MaterializationReport> {
        let timer = CycleTimer::start();
        let mut inferred: u64 = 0;
        let n = self.max_entities as usize;

        inferred += self.seed_from_axioms();
        inferred += self.infer_triples(arena, store, class_predicate)?;

        // One past the largest entity mentioned in any axiom, capped.
        let max_entity = self.axiom_entity_bound();

        // Reflexive seed, then row-union Floyd–Warshall over the positive
        // columns. Disjointness in [N, 2N) rides along the union, so a
        // subclass inherits its superclasses' disjointness.
        for i in 0..max_entity {
            inferred += u64::from(self.hierarchy.set(i, i));
        }
        for k in 0..max_entity {
            for i in 0..max_entity {
                if i != k && self.hierarchy.test(i, k) {
                    inferred += self.hierarchy.union_row_into(i, k);
                }
            }
        }

        // Per-predicate transitive closures, seeded from direct edges.
        for c in &mut self.closures {
            *c = None;
        }
        for prop in 0..n {
            if !self.prop_flags.test(prop, PropertyCharacteristic::Transitive.bit()) {
                continue;
            }
            let mut closure = BitMatrix::new(n, n);
            let mut bound = 0usize;
            for t in store.triples(arena) {
                if t.p.index() == prop && t.s.index() < n && t.o.index() < n {
                    inferred += u64::from(closure.set(t.s.index(), t.o.index()));
                    bound = bound.max(t.s.index() + 1).max(t.o.index() + 1);
                }
            }
            for k in 0..bound {
                for i in 0..bound {
                    if i != k && closure.test(i, k) {
                        inferred += closure.union_row_into(i, k);
                    }
                }
            }
            self.closures[prop] = Some(closure);
        }

        self.materialized = true;
        self.inference_count = inferred;
        let cycles = timer.elapsed();
        Ok(MaterializationReport {
            inference_count: inferred,
            cycles,
        })
    }

    /// Re-apply every axiom's matrix seed. Idempotent; returns the count
    /// of bits that were actually new.
    fn seed_from_axioms(&mut self) -> u64 {
        let n = self.max_entities as usize;
        let mut newly = 0u64;
        for ax in &self.axioms {
            let (a, b) = (ax.subject.index(), ax.object.index());
            match ax.kind {
                AxiomKind::SubClassOf => newly += u64::from(self.hierarchy.set(a, b)),
                AxiomKind::EquivalentClass | AxiomKind::SameAs => {
                    newly += u64::from(self.hierarchy.set(a, b));
                    newly += u64::from(self.hierarchy.set(b, a));
                }
                AxiomKind::DisjointWith | AxiomKind::DifferentFrom => {
                    newly += u64::from(self.hierarchy.set(a, n + b));
                    newly += u64::from(self.hierarchy.set(b, n + a));
                }
                AxiomKind::Transitive => {
                    newly +=
                        u64::from(self.prop_flags.set(a, PropertyCharacteristic::Transitive.bit()));
                }
                AxiomKind::Symmetric => {
                    newly +=
                        u64::from(self.prop_flags.set(a, PropertyCharacteristic::Symmetric.bit()));
                }
                AxiomKind::Functional => {
                    newly +=
                        u64::from(self.prop_flags.set(a, PropertyCharacteristic::Functional.bit()));
                }
                AxiomKind::InverseFunctional => {
                    newly += u64::from(
                        self.prop_flags
                            .set(a, PropertyCharacteristic::InverseFunctional.bit()),
                    );
                }
                AxiomKind::Domain | AxiomKind::Range | AxiomKind::InverseOf => {}
            }
        }
        newly
    }

    /// Apply the triple-producing axioms against a snapshot of the dense
    /// array: symmetric reverse edges, inverse-of mirrors, and
    /// domain/range class memberships.
    fn infer_triples(
        &self,
        arena: &mut Arena,
        store: &mut TripleStore,
        class_predicate: Option<NodeId>,
    ) -> OwlResult<u64> {
        let snapshot: Vec<Triple> = store.triples(arena).to_vec();
        let mut inferred = 0u64;

        for t in &snapshot {
            if t.p.index() < self.max_entities as usize
                && self.has_property_characteristic(t.p, PropertyCharacteristic::Symmetric)
                && !store.ask(arena, t.o, t.p, t.s)
            {
                store.add(arena, t.o, t.p, t.s)?;
                inferred += 1;
            }
        }

        for ax in &self.axioms {
            match ax.kind {
                AxiomKind::InverseOf => {
                    let (p, q) = (ax.subject, ax.object);
                    for t in &snapshot {
                        if t.p == p && !store.ask(arena, t.o, q, t.s) {
                            store.add(arena, t.o, q, t.s)?;
                            inferred += 1;
                        }
                        if t.p == q && !store.ask(arena, t.o, p, t.s) {
                            store.add(arena, t.o, p, t.s)?;
                            inferred += 1;
                        }
                    }
                }
                AxiomKind::Domain => {
                    if let Some(ct) = class_predicate {
                        for t in &snapshot {
                            if t.p == ax.subject && !store.ask(arena, t.s, ct, ax.object) {
                                store.add(arena, t.s, ct, ax.object)?;
                                inferred += 1;
                            }
                        }
                    }
                }
                AxiomKind::Range => {
                    if let Some(ct) = class_predicate {
                        for t in &snapshot {
                            if t.p == ax.subject && !store.ask(arena, t.o, ct, ax.object) {
                                store.add(arena, t.o, ct, ax.object)?;
                                inferred += 1;
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(inferred)
    }

    /// One past the largest entity id mentioned in any axiom, capped at
    /// the matrix bound.
    fn axiom_entity_bound(&self) -> usize {
        let mut max = 0usize;
        for ax in &self.axioms {
            let ids: &[NodeId] = match ax.kind {
                AxiomKind::Transitive
                | AxiomKind::Symmetric
                | AxiomKind::Functional
                | AxiomKind::InverseFunctional => &[ax.subject],
                _ => &[ax.subject, ax.object],
            };
            for id in ids {
                max = max.max(id.index() + 1);
            }
        }
        max.min(self.max_entities as usize)
    }
}
