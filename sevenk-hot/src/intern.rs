// sevenk-hot: String interner
// Open-addressed dedup table mapping byte-strings to dense 32-bit ids

use serde::{Deserialize, Serialize};

use crate::arena::{Arena, Span};
use crate::error::{InternError, InternResult};

/// Golden-ratio multiplicative hashing constant, shared by the interner
/// and the subject index.
pub const GOLDEN_RATIO: u64 = 0x9E37_79B9_7F4A_7C15;

/// Dense 32-bit identifier for any interned entity (subject, predicate,
/// object, class, property). Stable for the lifetime of the arena that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The all-ones wildcard sentinel, meaning "any" in a query position.
    /// Never produced by the interner.
    pub const ANY: NodeId = NodeId(u32::MAX);

    #[inline(always)]
    pub const fn new(raw: u32) -> Self {
        NodeId(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub const fn is_wildcard(self) -> bool {
        self.0 == u32::MAX
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        NodeId(raw)
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const EMPTY: u32 = u32::MAX;

#[derive(Clone, Copy)]
struct InternSlot {
    key: Span<u8>,
    id: u32,
}

impl Default for InternSlot {
    fn default() -> Self {
        Self {
            key: Span::EMPTY,
            id: EMPTY,
        }
    }
}

/// Byte-string interner. Canonical bytes live in the arena; the table is a
/// power-of-two open-addressed array probed linearly. Ids are assigned
/// densely in insertion order.
///
/// The table is sized at construction and never grown: reaching the 7/8
/// load-factor ceiling yields [`InternError::InternerFull`].
pub struct Interner {
    table: Span<InternSlot>,
    names: Span<Span<u8>>,
    mask: u64,
    shift: u32,
    len: u32,
    ceiling: u32,
}

impl Interner {
    /// Create an interner with room for roughly `capacity` distinct
    /// strings (rounded up to the next power of two ≥ 16; the usable
    /// ceiling is 7/8 of that).
    pub fn new(arena: &mut Arena, capacity: usize) -> InternResult<Self> {
        let cap = capacity.max(16).next_power_of_two();
        let ceiling = (cap - cap / 8) as u32;
        let table = arena.alloc_slice::<InternSlot>(cap)?;
        let names = arena.alloc_slice::<Span<u8>>(ceiling as usize)?;
        Ok(Self {
            table,
            names,
            mask: (cap - 1) as u64,
            shift: 64 - cap.trailing_zeros(),
            len: 0,
            ceiling,
        })
    }

    #[inline(always)]
    fn hash(bytes: &[u8]) -> u64 {
        let mut h = bytes.len() as u64;
        for &b in bytes {
            h = (h ^ u64::from(b)).wrapping_mul(GOLDEN_RATIO);
        }
        h
    }

    /// Intern `bytes`, returning the existing id for byte-equal inputs or
    /// assigning the next dense id after copying the canonical bytes into
    /// the arena.
    pub fn intern(&mut self, arena: &mut Arena, bytes: &[u8]) -> InternResult<NodeId> {
        let capacity = (self.mask + 1) as usize;
        let mut idx = (Self::hash(bytes) >> self.shift) & self.mask;
        for _ in 0..capacity {
            let slot = arena.slice(self.table)[idx as usize];
            if slot.id == EMPTY {
                if self.len >= self.ceiling {
                    return Err(InternError::InternerFull { capacity });
                }
                let key = arena.alloc_bytes(bytes)?;
                let id = self.len;
                arena.slice_mut(self.table)[idx as usize] = InternSlot { key, id };
                arena.slice_mut(self.names)[id as usize] = key;
                self.len += 1;
                return Ok(NodeId(id));
            }
            if arena.slice(slot.key) == bytes {
                return Ok(NodeId(slot.id));
            }
            idx = (idx + 1) & self.mask;
        }
        Err(InternError::InternerFull { capacity })
    }

    /// Reverse lookup: the canonical bytes of an interned id.
    pub fn resolve<'a>(&self, arena: &'a Arena, id: NodeId) -> Option<&'a [u8]> {
        if id.raw() >= self.len {
            return None;
        }
        let key = arena.slice(self.names)[id.index()];
        Some(arena.slice(key))
    }

    /// Whether `id` was produced by this interner.
    #[inline(always)]
    pub fn contains(&self, id: NodeId) -> bool {
        id.raw() < self.len
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        (self.mask + 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arena, Interner) {
        let mut arena = Arena::new(64 * 1024);
        let interner = Interner::new(&mut arena, 64).unwrap();
        (arena, interner)
    }

    #[test]
    fn dense_ids_in_insertion_order() {
        let (mut arena, mut interner) = setup();
        let a = interner.intern(&mut arena, b"alice").unwrap();
        let b = interner.intern(&mut arena, b"knows").unwrap();
        let c = interner.intern(&mut arena, b"bob").unwrap();
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
        assert_eq!(c.raw(), 2);
    }

    #[test]
    fn repeated_intern_is_stable() {
        let (mut arena, mut interner) = setup();
        let first = interner.intern(&mut arena, b"alice").unwrap();
        let second = interner.intern(&mut arena, b"alice").unwrap();
        assert_eq!(first, second);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_distinct_ids() {
        let (mut arena, mut interner) = setup();
        let a = interner.intern(&mut arena, b"alice").unwrap();
        let b = interner.intern(&mut arena, b"alicf").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_round_trips() {
        let (mut arena, mut interner) = setup();
        let id = interner.intern(&mut arena, b"urn:sevenk:thing").unwrap();
        assert_eq!(interner.resolve(&arena, id), Some(&b"urn:sevenk:thing"[..]));
        assert_eq!(interner.resolve(&arena, NodeId::new(99)), None);
    }

    #[test]
    fn empty_string_is_internable() {
        let (mut arena, mut interner) = setup();
        let id = interner.intern(&mut arena, b"").unwrap();
        assert_eq!(interner.resolve(&arena, id), Some(&b""[..]));
        assert_eq!(interner.intern(&mut arena, b"").unwrap(), id);
    }

    #[test]
    fn ceiling_reports_full() {
        let mut arena = Arena::new(64 * 1024);
        let mut interner = Interner::new(&mut arena, 16).unwrap();
        let ceiling = 16 - 16 / 8;
        for i in 0..ceiling {
            let name = format!("n{i}");
            interner.intern(&mut arena, name.as_bytes()).unwrap();
        }
        let err = interner.intern(&mut arena, b"overflow").unwrap_err();
        assert!(matches!(err, InternError::InternerFull { capacity: 16 }));
        // Existing entries still resolve after the failed insert.
        assert!(interner.intern(&mut arena, b"n0").is_ok());
    }

    #[test]
    fn wildcard_is_never_assigned() {
        let (mut arena, mut interner) = setup();
        for i in 0..20u32 {
            let id = interner.intern(&mut arena, i.to_string().as_bytes()).unwrap();
            assert!(!id.is_wildcard());
        }
    }
}
