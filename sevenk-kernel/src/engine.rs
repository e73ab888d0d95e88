// sevenk-kernel: Core façade
// Single entry surface composing arena, interner, store, OWL, and meter

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use sevenk_hot::arena::Arena;
use sevenk_hot::cycles::{BudgetPolicy, CycleMeter, CycleTimer, MeterSnapshot};
use sevenk_hot::intern::{Interner, NodeId};

use crate::error::{EngineResult, OwlResult, StoreError, StoreResult};
use crate::owl::{AxiomKind, MaterializationReport, OwlEngine, PropertyCharacteristic};
use crate::shacl::{self, NodeKind, Shape, ValidationContext, ValidationResult};
use crate::store::{Edge, QueryStatus, Stats, Triple, TriplePattern, TripleStore};

/// Construction-time parameters. Capacities round up to the next power of
/// two ≥ 16; `max_entities` rounds up to a multiple of 64.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub triple_capacity: usize,
    pub node_capacity: usize,
    pub max_entities: usize,
    pub arena_bytes: usize,
    pub ask_budget: u64,
    pub add_budget: u64,
    pub validate_budget: u64,
    pub budget_policy: BudgetPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            triple_capacity: 4096,
            node_capacity: 1024,
            max_entities: 256,
            arena_bytes: 4 << 20,
            ask_budget: 7,
            add_budget: 64,
            validate_budget: 96,
            budget_policy: BudgetPolicy::Report,
        }
    }
}

/// Builder for [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn triple_capacity(mut self, n: usize) -> Self {
        self.config.triple_capacity = n;
        self
    }

    pub fn node_capacity(mut self, n: usize) -> Self {
        self.config.node_capacity = n;
        self
    }

    pub fn max_entities(mut self, n: usize) -> Self {
        self.config.max_entities = n;
        self
    }

    pub fn arena_bytes(mut self, n: usize) -> Self {
        self.config.arena_bytes = n;
        self
    }

    pub fn ask_budget(mut self, cycles: u64) -> Self {
        self.config.ask_budget = cycles;
        self
    }

    pub fn add_budget(mut self, cycles: u64) -> Self {
        self.config.add_budget = cycles;
        self
    }

    pub fn validate_budget(mut self, cycles: u64) -> Self {
        self.config.validate_budget = cycles;
        self
    }

    pub fn budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.config.budget_policy = policy;
        self
    }

    pub fn build(self) -> EngineResult<Engine> {
        Engine::with_config(self.config)
    }
}

/// The knowledge-graph engine: triple store, OWL reasoner, and SHACL
/// validation behind one surface.
///
/// Writes (`add`, `assert_axiom`, `materialize`, registrations) take
/// `&mut self`; reads (`ask`, `query`, `validate`, the class/property
/// queries) take `&self` and are pure functions of the current state. The
/// borrow checker enforces the single-writer/many-reader contract; no
/// locks are taken anywhere.
pub struct Engine {
    arena: Arena,
    interner: Interner,
    store: TripleStore,
    owl: OwlEngine,
    meter: CycleMeter,
    class_predicate: Option<NodeId>,
    node_kinds: FxHashMap<u32, NodeKind>,
    config: EngineConfig,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Shorthand construction with default budgets and entity bound.
    pub fn new(
        arena_bytes: usize,
        triple_capacity: usize,
        node_capacity: usize,
    ) -> EngineResult<Engine> {
        Engine::builder()
            .arena_bytes(arena_bytes)
            .triple_capacity(triple_capacity)
            .node_capacity(node_capacity)
            .build()
    }

    pub fn with_config(mut config: EngineConfig) -> EngineResult<Engine> {
        config.triple_capacity = config.triple_capacity.max(16).next_power_of_two();
        config.node_capacity = config.node_capacity.max(16).next_power_of_two();
        config.max_entities = config.max_entities.max(64).div_ceil(64) * 64;

        let mut arena = Arena::new(config.arena_bytes);
        let interner = Interner::new(&mut arena, config.node_capacity)?;
        let store = TripleStore::new(&mut arena, config.triple_capacity, config.node_capacity)?;
        let owl = OwlEngine::new(config.max_entities);
        let meter = CycleMeter::new(
            config.budget_policy,
            config.ask_budget,
            config.add_budget,
            config.validate_budget,
        );
        tracing::debug!(
            triple_capacity = config.triple_capacity,
            node_capacity = config.node_capacity,
            max_entities = config.max_entities,
            arena_bytes = config.arena_bytes,
            policy = ?config.budget_policy,
            "engine constructed"
        );
        Ok(Engine {
            arena,
            interner,
            store,
            owl,
            meter,
            class_predicate: None,
            node_kinds: FxHashMap::default(),
            config,
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Intern a byte-string. The one call on this surface that accepts
    /// strings; every other operation takes [`NodeId`]s.
    pub fn intern(&mut self, bytes: &[u8]) -> EngineResult<NodeId> {
        Ok(self.interner.intern(&mut self.arena, bytes)?)
    }

    /// Canonical bytes of an interned id.
    pub fn resolve(&self, id: NodeId) -> Option<&[u8]> {
        self.interner.resolve(&self.arena, id)
    }

    /// Register the predicate that declares class membership (e.g. the
    /// interned id of `rdf:type`). Target-class gating, class-of-value
    /// constraints, and domain/range materialization are inert without it.
    pub fn set_class_predicate(&mut self, p: NodeId) {
        self.class_predicate = Some(p);
    }

    #[inline(always)]
    pub fn class_predicate(&self) -> Option<NodeId> {
        self.class_predicate
    }

    /// Register the kind of a node for `NodeKind` constraints.
    /// Unregistered nodes read as IRI.
    pub fn set_node_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.node_kinds.insert(id.raw(), kind);
    }

    /// Append a triple. Amortized O(1); allocation only via the arena on
    /// adjacency growth or first-seen nodes. Under
    /// [`BudgetPolicy::Enforce`] an overrun fails the call even though the
    /// triple was stored.
    pub fn add(&mut self, s: NodeId, p: NodeId, o: NodeId) -> StoreResult<()> {
        let timer = CycleTimer::start();
        let result = self.store.add(&mut self.arena, s, p, o);
        let elapsed = timer.elapsed();
        match result {
            Ok(()) => {
                self.meter
                    .add
                    .check(elapsed, self.meter.policy())
                    .map_err(StoreError::CycleBudget)?;
                Ok(())
            }
            Err(e) => {
                self.meter.add.record(elapsed);
                Err(e)
            }
        }
    }

    /// Existence check. Always answers; elapsed cycles are recorded in the
    /// meter (overruns tallied, never failed; use [`Engine::ask_checked`]
    /// for the enforcing flavor).
    #[inline]
    pub fn ask(&self, s: NodeId, p: NodeId, o: NodeId) -> bool {
        let timer = CycleTimer::start();
        let hit = self.store.ask(&self.arena, s, p, o);
        self.meter.ask.record(timer.elapsed());
        hit
    }

    /// Existence check that applies the construction-time budget policy.
    pub fn ask_checked(&self, s: NodeId, p: NodeId, o: NodeId) -> StoreResult<bool> {
        let timer = CycleTimer::start();
        let hit = self.store.ask(&self.arena, s, p, o);
        self.meter
            .ask
            .check(timer.elapsed(), self.meter.policy())
            .map_err(StoreError::CycleBudget)?;
        Ok(hit)
    }

    /// Pattern query into a caller-provided sink. [`NodeId::ANY`] is the
    /// wildcard.
    pub fn query(&self, pattern: TriplePattern, sink: &mut [Triple]) -> QueryStatus {
        self.store.query(&self.arena, pattern, sink)
    }

    /// Zero-copy view of a subject's outgoing edges.
    pub fn subject_adjacency(&self, s: NodeId) -> &[Edge] {
        self.store.subject_adjacency(&self.arena, s)
    }

    pub fn assert_axiom(
        &mut self,
        s: NodeId,
        p: NodeId,
        o: NodeId,
        kind: AxiomKind,
    ) -> OwlResult<()> {
        self.owl.assert_axiom(s, p, o, kind)
    }

    /// Batch-materialize the axioms into bit-matrices (and inferred
    /// triples). Not budgeted; the report carries the cycle cost.
    pub fn materialize(&mut self) -> OwlResult<MaterializationReport> {
        let report =
            self.owl
                .materialize(&mut self.arena, &mut self.store, self.class_predicate)?;
        tracing::info!(
            inference_count = report.inference_count,
            cycles = report.cycles,
            "materialization complete"
        );
        Ok(report)
    }

    #[inline(always)]
    pub fn is_subclass_of(&self, c: NodeId, d: NodeId) -> bool {
        self.owl.is_subclass_of(c, d)
    }

    #[inline(always)]
    pub fn is_equivalent(&self, a: NodeId, b: NodeId) -> bool {
        self.owl.is_equivalent(a, b)
    }

    #[inline(always)]
    pub fn is_disjoint_with(&self, a: NodeId, b: NodeId) -> bool {
        self.owl.is_disjoint_with(a, b)
    }

    #[inline(always)]
    pub fn is_different_from(&self, a: NodeId, b: NodeId) -> bool {
        self.owl.is_different_from(a, b)
    }

    #[inline(always)]
    pub fn has_property_characteristic(&self, p: NodeId, ch: PropertyCharacteristic) -> bool {
        self.owl.has_property_characteristic(p, ch)
    }

    /// Transitive reachability along a declared-transitive predicate.
    pub fn transitive_ask(&self, s: NodeId, p: NodeId, o: NodeId) -> bool {
        self.owl.transitive_ask(&self.arena, &self.store, s, p, o)
    }

    /// Evaluate a compiled shape against a node. Elapsed cycles recorded;
    /// never fails (see [`Engine::validate_checked`]).
    pub fn validate(&self, shape: &Shape, node: NodeId) -> ValidationResult {
        let timer = CycleTimer::start();
        let result = shacl::evaluate(shape, node, &self.validation_context());
        self.meter.validate.record(timer.elapsed());
        result
    }

    /// Validation that applies the construction-time budget policy.
    pub fn validate_checked(
        &self,
        shape: &Shape,
        node: NodeId,
    ) -> EngineResult<ValidationResult> {
        let timer = CycleTimer::start();
        let result = shacl::evaluate(shape, node, &self.validation_context());
        self.meter.validate.check(timer.elapsed(), self.meter.policy())?;
        Ok(result)
    }

    fn validation_context(&self) -> ValidationContext<'_> {
        ValidationContext {
            arena: &self.arena,
            store: &self.store,
            owl: &self.owl,
            class_predicate: self.class_predicate,
            node_kinds: &self.node_kinds,
            known_nodes: self.interner.len() as u32,
        }
    }

    pub fn stats(&self) -> Stats {
        self.store.stats(&self.arena)
    }

    #[inline(always)]
    pub fn meter(&self) -> &CycleMeter {
        &self.meter
    }

    pub fn meter_snapshot(&self) -> MeterSnapshot {
        self.meter.snapshot()
    }

    /// Inference count of the most recent materialization.
    #[inline(always)]
    pub fn inference_count(&self) -> u64 {
        self.owl.inference_count()
    }

    /// Reset the whole engine: the arena watermark returns to zero and
    /// every triple, interned string, and axiom is dropped. The meter's
    /// aggregates survive (they describe the process, not the graph).
    pub fn reset(&mut self) -> EngineResult<()> {
        self.arena.reset();
        self.interner = Interner::new(&mut self.arena, self.config.node_capacity)?;
        self.store = TripleStore::new(
            &mut self.arena,
            self.config.triple_capacity,
            self.config.node_capacity,
        )?;
        self.owl = OwlEngine::new(self.config.max_entities);
        self.class_predicate = None;
        self.node_kinds.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(1 << 20, 1024, 256).unwrap()
    }

    #[test]
    fn intern_then_add_then_ask() {
        let mut e = engine();
        let alice = e.intern(b"alice").unwrap();
        let knows = e.intern(b"knows").unwrap();
        let bob = e.intern(b"bob").unwrap();
        e.add(alice, knows, bob).unwrap();
        assert!(e.ask(alice, knows, bob));
        assert!(!e.ask(bob, knows, alice));
        assert_eq!(e.resolve(alice), Some(&b"alice"[..]));
    }

    #[test]
    fn capacities_round_up() {
        let e = Engine::builder()
            .arena_bytes(1 << 20)
            .triple_capacity(100)
            .node_capacity(5)
            .max_entities(70)
            .build()
            .unwrap();
        assert_eq!(e.config().triple_capacity, 128);
        assert_eq!(e.config().node_capacity, 16);
        assert_eq!(e.config().max_entities, 128);
    }

    #[test]
    fn meter_counts_operations() {
        let mut e = engine();
        let a = e.intern(b"a").unwrap();
        let b = e.intern(b"b").unwrap();
        e.add(a, b, a).unwrap();
        for _ in 0..10 {
            e.ask(a, b, a);
        }
        let snap = e.meter_snapshot();
        assert_eq!(snap.ask.operations, 10);
        assert_eq!(snap.add.operations, 1);
    }

    #[test]
    fn enforce_policy_surfaces_budget_errors() {
        // Zero budgets make any measurable operation overrun. Coarse
        // counters (e.g. CNTVCT) can tie between reads, so observe over a
        // batch instead of a single call.
        let mut e = Engine::builder()
            .arena_bytes(1 << 20)
            .ask_budget(0)
            .add_budget(0)
            .budget_policy(BudgetPolicy::Enforce)
            .build()
            .unwrap();
        let mut overrun_subject = None;
        for i in 0..512u32 {
            let id = NodeId::new(i);
            match e.add(id, id, id) {
                Err(StoreError::CycleBudget(_)) => {
                    overrun_subject.get_or_insert(id);
                }
                Ok(()) => {}
                Err(other) => panic!("unexpected store error: {other}"),
            }
        }
        let subject = overrun_subject.expect("no add overran a zero budget");
        // The triple was stored before the overrun was detected.
        assert!(e.ask(subject, subject, subject));

        let saw_ask_overrun = (0..512).any(|_| {
            matches!(
                e.ask_checked(subject, subject, subject),
                Err(StoreError::CycleBudget(_))
            )
        });
        assert!(saw_ask_overrun);
    }

    #[test]
    fn report_policy_never_fails() {
        let mut e = Engine::builder()
            .arena_bytes(1 << 20)
            .ask_budget(0)
            .budget_policy(BudgetPolicy::Report)
            .build()
            .unwrap();
        let a = e.intern(b"a").unwrap();
        e.add(a, a, a).unwrap();
        for _ in 0..512 {
            assert!(e.ask_checked(a, a, a).unwrap());
        }
        assert!(e.meter_snapshot().ask.overruns >= 1);
    }

    #[test]
    fn reset_clears_graph_state() {
        let mut e = engine();
        let a = e.intern(b"a").unwrap();
        let p = e.intern(b"p").unwrap();
        e.add(a, p, a).unwrap();
        e.assert_axiom(a, NodeId::default(), p, AxiomKind::SubClassOf)
            .unwrap();
        e.reset().unwrap();
        assert_eq!(e.stats().triple_count, 0);
        assert!(!e.ask(a, p, a));
        assert_eq!(e.resolve(a), None);
        // Ids restart from zero.
        assert_eq!(e.intern(b"fresh").unwrap().raw(), 0);
    }

    #[test]
    fn config_serializes() {
        let e = engine();
        let json = serde_json::to_string(e.config()).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, e.config());
    }
}
