// sevenk-kernel: Triple store
// Dense triple array + per-subject adjacency + golden-ratio subject index

use serde::{Deserialize, Serialize};
use sevenk_hot::arena::{Arena, Span};
use sevenk_hot::intern::{NodeId, GOLDEN_RATIO};

use crate::error::{StoreError, StoreResult};

/// One (subject, predicate, object) statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Triple {
    pub s: NodeId,
    pub p: NodeId,
    pub o: NodeId,
}

impl Triple {
    #[inline(always)]
    pub const fn new(s: NodeId, p: NodeId, o: NodeId) -> Self {
        Self { s, p, o }
    }
}

/// One outgoing edge of a subject's adjacency list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Edge {
    pub p: NodeId,
    pub o: NodeId,
}

/// Match pattern for [`TripleStore::query`]. [`NodeId::ANY`] in a position
/// matches everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriplePattern {
    pub s: NodeId,
    pub p: NodeId,
    pub o: NodeId,
}

impl TriplePattern {
    #[inline(always)]
    pub const fn new(s: NodeId, p: NodeId, o: NodeId) -> Self {
        Self { s, p, o }
    }

    #[inline(always)]
    fn matches_edge(&self, e: Edge) -> bool {
        (self.p.is_wildcard() || self.p == e.p) && (self.o.is_wildcard() || self.o == e.o)
    }

    #[inline(always)]
    fn matches(&self, t: Triple) -> bool {
        (self.s.is_wildcard() || self.s == t.s)
            && (self.p.is_wildcard() || self.p == t.p)
            && (self.o.is_wildcard() || self.o == t.o)
    }
}

/// Outcome of a query. `Truncated` still fills the sink's valid prefix and
/// reports the untruncated match count so callers can retry with a larger
/// sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Complete { count: usize },
    Truncated { matched: usize, filled: usize },
}

impl QueryStatus {
    /// Total matches, whether or not they fit the sink.
    pub fn matched(&self) -> usize {
        match *self {
            QueryStatus::Complete { count } => count,
            QueryStatus::Truncated { matched, .. } => matched,
        }
    }
}

/// Store shape and load statistics. Pure function of the current state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub triple_count: u64,
    pub node_count: u64,
    pub edge_total: u64,
    pub max_out_degree: u32,
    pub avg_out_degree: f64,
    pub hash_load_factor: f64,
    pub memory_bytes: u64,
}

const CHAIN_END: u32 = u32::MAX;
const INITIAL_ADJ_CAP: u32 = 4;

/// Node table entry: interned id, hash-chain link, and the subject's
/// adjacency array descriptor.
#[derive(Debug, Clone, Copy, Default)]
struct NodeSlot {
    id: NodeId,
    next: u32,
    adj: Span<Edge>,
    adj_len: u32,
    adj_cap: u32,
}

/// Arena-backed triple store: append-only dense triple array, per-subject
/// adjacency arrays with doubling growth, and a hash-chained subject
/// index.
///
/// Duplicates are permitted (multiset add); `ask` answers existence.
/// Capacities are fixed at construction; exhaustion is an error, not a
/// grow.
pub struct TripleStore {
    triples: Span<Triple>,
    triple_len: u32,
    triple_cap: u32,
    buckets: Span<u32>,
    nodes: Span<NodeSlot>,
    node_len: u32,
    node_cap: u32,
    hash_shift: u32,
    hash_mask: u64,
    edge_total: u64,
    max_out_degree: u32,
}

impl TripleStore {
    /// Allocate a store inside `arena`. Both capacities round up to the
    /// next power of two ≥ 16; the subject hash table is sized to the node
    /// capacity.
    pub fn new(arena: &mut Arena, triple_capacity: usize, node_capacity: usize) -> StoreResult<Self> {
        let triple_cap = triple_capacity.max(16).next_power_of_two();
        let node_cap = node_capacity.max(16).next_power_of_two();
        let hash_cap = node_cap;

        let triples = arena.alloc_slice::<Triple>(triple_cap)?;
        let buckets = arena.alloc_slice::<u32>(hash_cap)?;
        arena.slice_mut(buckets).fill(CHAIN_END);
        let nodes = arena.alloc_slice::<NodeSlot>(node_cap)?;

        Ok(Self {
            triples,
            triple_len: 0,
            triple_cap: triple_cap as u32,
            buckets,
            nodes,
            node_len: 0,
            node_cap: node_cap as u32,
            hash_shift: 64 - hash_cap.trailing_zeros(),
            hash_mask: (hash_cap - 1) as u64,
            edge_total: 0,
            max_out_degree: 0,
        })
    }

    #[inline(always)]
    fn bucket_of(&self, id: NodeId) -> usize {
        ((u64::from(id.raw()).wrapping_mul(GOLDEN_RATIO) >> self.hash_shift) & self.hash_mask)
            as usize
    }

    /// Hash-lookup a subject's node-table index. Panics if the chain is
    /// longer than the node capacity; that is index corruption, not a
    /// user error.
    #[inline]
    fn find_node(&self, arena: &Arena, id: NodeId) -> Option<u32> {
        let nodes = arena.slice(self.nodes);
        let mut idx = arena.slice(self.buckets)[self.bucket_of(id)];
        let mut steps = 0u32;
        while idx != CHAIN_END {
            let slot = nodes[idx as usize];
            if slot.id == id {
                return Some(idx);
            }
            idx = slot.next;
            steps += 1;
            if steps > self.node_cap {
                panic!("subject index chain exceeds node capacity: index corrupted");
            }
        }
        None
    }

    /// Insert `id` into the node table if absent. Idempotent.
    fn ensure_node(&mut self, arena: &mut Arena, id: NodeId) -> StoreResult<u32> {
        if let Some(idx) = self.find_node(arena, id) {
            return Ok(idx);
        }
        if self.node_len == self.node_cap {
            return Err(StoreError::NodeTableFull {
                capacity: self.node_cap as usize,
            });
        }
        let bucket = self.bucket_of(id);
        let idx = self.node_len;
        let head = arena.slice(self.buckets)[bucket];
        arena.slice_mut(self.nodes)[idx as usize] = NodeSlot {
            id,
            next: head,
            adj: Span::EMPTY,
            adj_len: 0,
            adj_cap: 0,
        };
        arena.slice_mut(self.buckets)[bucket] = idx;
        self.node_len += 1;
        Ok(idx)
    }

    /// Append `(s, p, o)`. Ensures s and o exist as nodes, appends to the
    /// dense array, then appends `(p, o)` to s's adjacency (doubling the
    /// array via the arena when full).
    ///
    /// On adjacency-grow failure the dense append is rolled back; the node
    /// inserts are additive and stay in place.
    pub fn add(&mut self, arena: &mut Arena, s: NodeId, p: NodeId, o: NodeId) -> StoreResult<()> {
        if self.triple_len == self.triple_cap {
            return Err(StoreError::StoreFull {
                capacity: self.triple_cap as usize,
            });
        }
        let s_idx = self.ensure_node(arena, s)?;
        self.ensure_node(arena, o)?;

        arena.slice_mut(self.triples)[self.triple_len as usize] = Triple::new(s, p, o);
        self.triple_len += 1;

        let mut slot = arena.slice(self.nodes)[s_idx as usize];
        if slot.adj_len == slot.adj_cap {
            let new_cap = if slot.adj_cap == 0 {
                INITIAL_ADJ_CAP
            } else {
                slot.adj_cap * 2
            };
            let new_span = match arena.alloc_slice::<Edge>(new_cap as usize) {
                Ok(span) => span,
                Err(e) => {
                    // Restore the pre-call triple count; the old adjacency
                    // and node entries remain valid.
                    self.triple_len -= 1;
                    return Err(e.into());
                }
            };
            if slot.adj_len > 0 {
                arena.copy_span(slot.adj, new_span, slot.adj_len as usize);
            }
            tracing::trace!(
                subject = s.raw(),
                old_cap = slot.adj_cap,
                new_cap,
                "adjacency grown; old buffer abandoned in arena"
            );
            slot.adj = new_span;
            slot.adj_cap = new_cap;
        }
        arena.slice_mut(slot.adj)[slot.adj_len as usize] = Edge { p, o };
        slot.adj_len += 1;
        arena.slice_mut(self.nodes)[s_idx as usize] = slot;

        self.edge_total += 1;
        if slot.adj_len > self.max_out_degree {
            self.max_out_degree = slot.adj_len;
        }
        Ok(())
    }

    /// Existence check for `(s, p, o)`: hash-lookup s, scan its adjacency.
    /// No allocation; bounded by s's out-degree.
    #[inline]
    pub fn ask(&self, arena: &Arena, s: NodeId, p: NodeId, o: NodeId) -> bool {
        match self.find_node(arena, s) {
            None => false,
            Some(idx) => {
                let slot = arena.slice(self.nodes)[idx as usize];
                let edges = &arena.slice(slot.adj)[..slot.adj_len as usize];
                edges.iter().any(|e| e.p == p && e.o == o)
            }
        }
    }

    /// Pattern query into a caller-provided sink. Bound-subject queries
    /// emit in adjacency insertion order; wildcard-subject queries scan
    /// the dense array in insertion order.
    pub fn query(
        &self,
        arena: &Arena,
        pattern: TriplePattern,
        sink: &mut [Triple],
    ) -> QueryStatus {
        let mut matched = 0usize;
        let mut filled = 0usize;

        if !pattern.s.is_wildcard() {
            if let Some(idx) = self.find_node(arena, pattern.s) {
                let slot = arena.slice(self.nodes)[idx as usize];
                let edges = &arena.slice(slot.adj)[..slot.adj_len as usize];
                for e in edges {
                    if pattern.matches_edge(*e) {
                        if filled < sink.len() {
                            sink[filled] = Triple::new(pattern.s, e.p, e.o);
                            filled += 1;
                        }
                        matched += 1;
                    }
                }
            }
        } else {
            let triples = &arena.slice(self.triples)[..self.triple_len as usize];
            for t in triples {
                if pattern.matches(*t) {
                    if filled < sink.len() {
                        sink[filled] = *t;
                        filled += 1;
                    }
                    matched += 1;
                }
            }
        }

        if matched > filled {
            QueryStatus::Truncated { matched, filled }
        } else {
            QueryStatus::Complete { count: matched }
        }
    }

    /// Zero-copy view of a subject's outgoing edges, empty if the subject
    /// is unknown.
    #[inline]
    pub fn subject_adjacency<'a>(&self, arena: &'a Arena, s: NodeId) -> &'a [Edge] {
        match self.find_node(arena, s) {
            None => &[],
            Some(idx) => {
                let slot = arena.slice(self.nodes)[idx as usize];
                &arena.slice(slot.adj)[..slot.adj_len as usize]
            }
        }
    }

    /// The dense triple array in insertion order (duplicates preserved).
    #[inline]
    pub fn triples<'a>(&self, arena: &'a Arena) -> &'a [Triple] {
        &arena.slice(self.triples)[..self.triple_len as usize]
    }

    #[inline(always)]
    pub fn triple_count(&self) -> usize {
        self.triple_len as usize
    }

    #[inline(always)]
    pub fn node_count(&self) -> usize {
        self.node_len as usize
    }

    pub fn stats(&self, arena: &Arena) -> Stats {
        let node_count = u64::from(self.node_len);
        Stats {
            triple_count: u64::from(self.triple_len),
            node_count,
            edge_total: self.edge_total,
            max_out_degree: self.max_out_degree,
            avg_out_degree: if node_count == 0 {
                0.0
            } else {
                self.edge_total as f64 / node_count as f64
            },
            hash_load_factor: f64::from(self.node_len) / (self.hash_mask + 1) as f64,
            memory_bytes: arena.used() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(raw: u32) -> NodeId {
        NodeId::new(raw)
    }

    fn setup() -> (Arena, TripleStore) {
        let mut arena = Arena::new(1 << 20);
        let store = TripleStore::new(&mut arena, 1024, 256).unwrap();
        (arena, store)
    }

    #[test]
    fn add_then_ask() {
        let (mut arena, mut store) = setup();
        store.add(&mut arena, n(1), n(2), n(3)).unwrap();
        assert!(store.ask(&arena, n(1), n(2), n(3)));
        assert!(!store.ask(&arena, n(1), n(2), n(4)));
        assert!(!store.ask(&arena, n(3), n(2), n(1)));
    }

    #[test]
    fn multi_object_subject_preserves_order() {
        let (mut arena, mut store) = setup();
        for o in [3, 4, 5] {
            store.add(&mut arena, n(1), n(2), n(o)).unwrap();
        }
        assert!(store.ask(&arena, n(1), n(2), n(3)));
        assert!(store.ask(&arena, n(1), n(2), n(4)));
        assert!(store.ask(&arena, n(1), n(2), n(5)));
        let adj = store.subject_adjacency(&arena, n(1));
        let pairs: Vec<(u32, u32)> = adj.iter().map(|e| (e.p.raw(), e.o.raw())).collect();
        assert_eq!(pairs, vec![(2, 3), (2, 4), (2, 5)]);
    }

    #[test]
    fn duplicates_are_permitted() {
        let (mut arena, mut store) = setup();
        store.add(&mut arena, n(1), n(2), n(3)).unwrap();
        store.add(&mut arena, n(1), n(2), n(3)).unwrap();
        assert_eq!(store.triple_count(), 2);
        assert!(store.ask(&arena, n(1), n(2), n(3)));
    }

    #[test]
    fn ask_is_pure() {
        let (mut arena, mut store) = setup();
        store.add(&mut arena, n(7), n(8), n(9)).unwrap();
        let before = store.triple_count();
        for _ in 0..100 {
            assert!(store.ask(&arena, n(7), n(8), n(9)));
        }
        assert_eq!(store.triple_count(), before);
    }

    #[test]
    fn query_bound_subject_with_truncation() {
        let (mut arena, mut store) = setup();
        for o in 100..200u32 {
            store.add(&mut arena, n(1), n(2), n(o)).unwrap();
        }
        let mut sink = [Triple::default(); 10];
        let status = store.query(
            &arena,
            TriplePattern::new(n(1), n(2), NodeId::ANY),
            &mut sink,
        );
        assert_eq!(
            status,
            QueryStatus::Truncated {
                matched: 100,
                filled: 10
            }
        );
        // The valid prefix is the first ten in insertion order.
        assert_eq!(sink[0].o, n(100));
        assert_eq!(sink[9].o, n(109));
    }

    #[test]
    fn query_wildcard_subject_scans_dense_order() {
        let (mut arena, mut store) = setup();
        store.add(&mut arena, n(1), n(2), n(3)).unwrap();
        store.add(&mut arena, n(4), n(2), n(5)).unwrap();
        store.add(&mut arena, n(1), n(6), n(7)).unwrap();
        let mut sink = [Triple::default(); 8];
        let status = store.query(
            &arena,
            TriplePattern::new(NodeId::ANY, n(2), NodeId::ANY),
            &mut sink,
        );
        assert_eq!(status, QueryStatus::Complete { count: 2 });
        assert_eq!(sink[0], Triple::new(n(1), n(2), n(3)));
        assert_eq!(sink[1], Triple::new(n(4), n(2), n(5)));
    }

    #[test]
    fn unknown_subject_is_empty() {
        let (arena, store) = setup();
        assert!(!store.ask(&arena, n(42), n(1), n(1)));
        assert!(store.subject_adjacency(&arena, n(42)).is_empty());
    }

    #[test]
    fn store_full_is_reported() {
        let mut arena = Arena::new(1 << 20);
        let mut store = TripleStore::new(&mut arena, 16, 256).unwrap();
        for i in 0..16u32 {
            store.add(&mut arena, n(i), n(100), n(200)).unwrap();
        }
        let err = store.add(&mut arena, n(99), n(100), n(200)).unwrap_err();
        assert_eq!(err, StoreError::StoreFull { capacity: 16 });
        assert_eq!(store.triple_count(), 16);
    }

    #[test]
    fn node_table_full_is_reported() {
        let mut arena = Arena::new(1 << 20);
        let mut store = TripleStore::new(&mut arena, 1024, 16).unwrap();
        // Each add touches subject + object: 8 adds fill 16 node slots.
        for i in 0..8u32 {
            store.add(&mut arena, n(i * 2), n(500), n(i * 2 + 1)).unwrap();
        }
        let err = store.add(&mut arena, n(900), n(500), n(901)).unwrap_err();
        assert_eq!(err, StoreError::NodeTableFull { capacity: 16 });
    }

    #[test]
    fn rollback_on_adjacency_grow_failure() {
        let mut arena = Arena::new(4096);
        let mut store = TripleStore::new(&mut arena, 16, 16).unwrap();
        // First add allocates a 4-entry adjacency block for subject 1.
        for o in 10..14u32 {
            store.add(&mut arena, n(1), n(2), n(o)).unwrap();
        }
        // Exhaust the arena so the doubling grow cannot succeed.
        let leftover = arena.remaining();
        if leftover > 8 {
            arena.alloc(leftover - 8, 1).unwrap();
        }
        let before = store.triple_count();
        let err = store.add(&mut arena, n(1), n(2), n(14)).unwrap_err();
        assert!(matches!(err, StoreError::OutOfArena(_)));
        assert_eq!(store.triple_count(), before);
        assert!(!store.ask(&arena, n(1), n(2), n(14)));
        // Prior edges are untouched.
        assert!(store.ask(&arena, n(1), n(2), n(13)));
    }

    #[test]
    fn adjacency_matches_dense_multiset() {
        let (mut arena, mut store) = setup();
        let data = [(1, 2, 3), (1, 2, 3), (4, 5, 6), (1, 7, 8), (4, 5, 9)];
        for (s, p, o) in data {
            store.add(&mut arena, n(s), n(p), n(o)).unwrap();
        }
        let mut from_dense: Vec<(u32, u32, u32)> = store
            .triples(&arena)
            .iter()
            .map(|t| (t.s.raw(), t.p.raw(), t.o.raw()))
            .collect();
        let mut from_adj: Vec<(u32, u32, u32)> = Vec::new();
        for s in [1u32, 4] {
            for e in store.subject_adjacency(&arena, n(s)) {
                from_adj.push((s, e.p.raw(), e.o.raw()));
            }
        }
        from_dense.sort_unstable();
        from_adj.sort_unstable();
        assert_eq!(from_dense, from_adj);
    }

    #[test]
    fn stats_reflect_shape() {
        let (mut arena, mut store) = setup();
        store.add(&mut arena, n(1), n(2), n(3)).unwrap();
        store.add(&mut arena, n(1), n(2), n(4)).unwrap();
        store.add(&mut arena, n(5), n(2), n(6)).unwrap();
        let stats = store.stats(&arena);
        assert_eq!(stats.triple_count, 3);
        // Subjects 1, 5 plus objects 3, 4, 6.
        assert_eq!(stats.node_count, 5);
        assert_eq!(stats.edge_total, 3);
        assert_eq!(stats.max_out_degree, 2);
        assert!(stats.hash_load_factor > 0.0);
        assert!(stats.memory_bytes > 0);
    }
}
