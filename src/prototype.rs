//! Prototype: fixed-size table of identifier-keyed slots.

use crate::error::{Result, TableError};
use crate::hash::Djb2;
use crate::node_store::{Link, NodeStore, Upsert};
use crate::payload::{Kind, Payload, SlotMut, SlotRef};
use core::hash::{BuildHasher, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};
use slotmap::DefaultKey;
use tracing::{debug, trace};

/// Bucket count used by `Prototype::default()`.
pub const DEFAULT_BUCKET_COUNT: usize = 16;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(0);

fn next_table_id() -> u64 {
    NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Stable reference to a slot. Survives overwrites of the slot; resolves
/// to `None` once the table has been torn down, and against any table
/// other than the one that issued it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle {
    table: u64,
    key: DefaultKey,
}

impl Handle {
    /// Arena key of this handle's node, if `table` issued it.
    #[inline]
    fn key_in<S>(&self, table: &Prototype<S>) -> Option<DefaultKey> {
        (self.table == table.id).then_some(self.key)
    }

    pub fn identifier<'a, S>(&self, table: &'a Prototype<S>) -> Option<&'a str> {
        let key = self.key_in(table)?;
        table.store.node(key).map(|n| n.identifier())
    }

    pub fn kind<S>(&self, table: &Prototype<S>) -> Option<Kind> {
        let key = self.key_in(table)?;
        table.store.node(key).map(|n| n.payload().kind())
    }

    pub fn get<'a, S>(&self, table: &'a Prototype<S>) -> Option<SlotRef<'a>> {
        let key = self.key_in(table)?;
        table.store.node(key).map(|n| n.payload().view())
    }

    pub fn get_mut<'a, S>(&self, table: &'a mut Prototype<S>) -> Option<SlotMut<'a>> {
        let key = self.key_in(table)?;
        table.store.node_mut(key).map(|n| n.payload_mut().view_mut())
    }
}

/// A table of named slots: `bucket_count` binary search trees selected by
/// hashing the identifier.
///
/// The bucket count is fixed at construction; there is no rehashing.
pub struct Prototype<S = Djb2> {
    // Process-unique; stamped into every handle this table issues.
    id: u64,
    hasher: S,
    buckets: Box<[Link]>,
    store: NodeStore,
    torn_down: bool,
}

impl Prototype {
    pub fn new(bucket_count: usize) -> Result<Self> {
        Self::with_hasher(bucket_count, Djb2::default())
    }
}

impl Default for Prototype {
    fn default() -> Self {
        Self {
            id: next_table_id(),
            hasher: Djb2::default(),
            buckets: vec![None; DEFAULT_BUCKET_COUNT].into_boxed_slice(),
            store: NodeStore::new(),
            torn_down: false,
        }
    }
}

impl<S> Prototype<S> {
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Release every slot. Only the first call does anything; later calls
    /// return immediately. Also run on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        let mut released = 0;
        for root in self.buckets.iter_mut() {
            released += self.store.teardown(root);
        }
        self.buckets = Box::default();
        debug!(released, "prototype torn down");
    }

    /// Identifiers in bucket `index`, in ascending order. Empty for an
    /// out-of-range index.
    pub fn bucket_identifiers(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        let root = self.buckets.get(index).copied().flatten();
        self.store.in_order(root).map(|(_, n)| n.identifier())
    }

    /// Every slot as `(identifier, kind)`, bucket by bucket, each bucket in
    /// ascending order.
    pub fn identifiers(&self) -> impl Iterator<Item = (&str, Kind)> + '_ {
        self.buckets.iter().flat_map(move |&root| {
            self.store
                .in_order(root)
                .map(|(_, n)| (n.identifier(), n.payload().kind()))
        })
    }
}

impl<S> Prototype<S>
where
    S: BuildHasher,
{
    pub fn with_hasher(bucket_count: usize, hasher: S) -> Result<Self> {
        if bucket_count == 0 {
            return Err(TableError::ZeroBuckets);
        }
        Ok(Self {
            id: next_table_id(),
            hasher,
            buckets: vec![None; bucket_count].into_boxed_slice(),
            store: NodeStore::new(),
            torn_down: false,
        })
    }

    /// Bucket an identifier maps to. Only the identifier's bytes are fed to
    /// the hasher, so the default hasher gives `djb2(identifier) %
    /// bucket_count`.
    pub fn bucket_index(&self, identifier: &str) -> usize {
        // A torn-down table keeps no buckets.
        if self.buckets.is_empty() {
            return 0;
        }
        let mut h = self.hasher.build_hasher();
        h.write(identifier.as_bytes());
        (h.finish() % self.buckets.len() as u64) as usize
    }

    fn root(&self, identifier: &str) -> Link {
        self.buckets
            .get(self.bucket_index(identifier))
            .copied()
            .flatten()
    }

    /// Create the slot `identifier` holding `payload`, or replace the
    /// payload of the existing slot. A replaced payload is released with
    /// its own destructor before this returns, whatever the new kind is.
    pub fn insert(&mut self, identifier: &str, payload: Payload) -> Result<Handle> {
        if identifier.is_empty() {
            return Err(TableError::EmptyIdentifier);
        }
        if self.torn_down {
            return Err(TableError::TornDown);
        }
        let bucket = self.bucket_index(identifier);
        let kind = payload.kind();
        let outcome = self
            .store
            .insert_or_update(&mut self.buckets[bucket], identifier, payload);
        match outcome {
            Upsert::Created(_) => trace!(identifier, bucket, ?kind, "slot created"),
            Upsert::Updated { prior, .. } => {
                debug!(identifier, bucket, ?prior, ?kind, "slot overwritten")
            }
        }
        Ok(self.handle(outcome.key()))
    }

    pub fn find(&self, identifier: &str) -> Option<Handle> {
        self.store
            .lookup(self.root(identifier), identifier)
            .map(|key| self.handle(key))
    }

    fn handle(&self, key: DefaultKey) -> Handle {
        Handle {
            table: self.id,
            key,
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.find(identifier).is_some()
    }

    pub fn kind_of(&self, identifier: &str) -> Option<Kind> {
        self.find(identifier).and_then(|h| h.kind(self))
    }

    /// Look up a slot. Callables and boxed values come back directly;
    /// inline kinds come back as their slot.
    pub fn lookup(&self, identifier: &str) -> Option<SlotRef<'_>> {
        self.find(identifier).and_then(|h| h.get(self))
    }

    pub fn lookup_mut(&mut self, identifier: &str) -> Option<SlotMut<'_>> {
        let handle = self.find(identifier)?;
        handle.get_mut(self)
    }
}

impl<S> Drop for Prototype<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::djb2;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        } // force all identifiers into bucket 0
    }

    #[test]
    fn zero_buckets_rejected() {
        assert!(matches!(Prototype::new(0), Err(TableError::ZeroBuckets)));
    }

    #[test]
    fn default_uses_default_bucket_count() {
        let p = Prototype::default();
        assert_eq!(p.bucket_count(), DEFAULT_BUCKET_COUNT);
        assert!(p.is_empty());
    }

    /// Invariant: bucket selection is djb2 over the identifier bytes.
    #[test]
    fn bucket_index_is_djb2_mod_len() {
        let p = Prototype::new(7).unwrap();
        for id in ["x", "y", "width", "height", "toString"] {
            assert_eq!(p.bucket_index(id), (djb2(id.as_bytes()) % 7) as usize);
        }
    }

    #[test]
    fn empty_identifier_rejected() {
        let mut p = Prototype::new(4).unwrap();
        assert_eq!(
            p.insert("", Payload::unmanaged(1u8)),
            Err(TableError::EmptyIdentifier)
        );
        assert!(p.is_empty());
    }

    /// Invariant: all identifiers colliding into one bucket still resolve to
    /// their own slot, and the bucket lists them in order.
    #[test]
    fn collisions_share_one_tree() {
        let mut p = Prototype::with_hasher(8, ConstBuildHasher).unwrap();
        for (i, id) in ["delta", "alpha", "charlie", "bravo"].iter().enumerate() {
            p.insert(id, Payload::unmanaged(i as u32)).unwrap();
        }
        assert_eq!(
            p.bucket_identifiers(0).collect::<Vec<_>>(),
            vec!["alpha", "bravo", "charlie", "delta"]
        );
        assert_eq!(p.bucket_identifiers(1).count(), 0);
        assert_eq!(p.lookup("charlie").and_then(|s| s.read::<u32>()), Some(2));
        assert_eq!(p.lookup("alpha").and_then(|s| s.read::<u32>()), Some(1));
        assert!(p.lookup("echo").is_none());
    }

    /// Invariant: a handle survives overwrites of its slot and sees the new
    /// payload.
    #[test]
    fn handle_is_stable_across_overwrite() {
        let mut p = Prototype::new(2).unwrap();
        let h1 = p.insert("n", Payload::unmanaged(1i32)).unwrap();
        let h2 = p.insert("n", Payload::owned(2i32)).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.kind(&p), Some(Kind::OwnedValue));
        assert_eq!(h1.get(&p).and_then(|s| s.downcast::<i32>()), Some(&2));
        assert_eq!(h1.identifier(&p), Some("n"));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn writes_through_handle_are_visible_to_lookup() {
        let mut p = Prototype::new(4).unwrap();
        let h = p.insert("count", Payload::unmanaged(0u64)).unwrap();
        assert!(h.get_mut(&mut p).unwrap().write(41u64));
        assert_eq!(p.lookup("count").and_then(|s| s.read::<u64>()), Some(41));

        let h = p.insert("name", Payload::owned(String::new())).unwrap();
        h.get_mut(&mut p)
            .and_then(|s| s.downcast_mut::<String>())
            .unwrap()
            .push_str("box");
        assert_eq!(
            p.lookup("name").and_then(|s| s.downcast::<String>()).map(String::as_str),
            Some("box")
        );
    }

    /// Invariant: teardown runs once, handles go stale, inserts are refused
    /// and lookups miss.
    #[test]
    fn teardown_is_idempotent() {
        let calls = Rc::new(Cell::new(0));
        let mut p = Prototype::new(3).unwrap();
        let mut handles = Vec::new();
        for id in ["a", "b", "c", "d"] {
            let c = calls.clone();
            handles.push(
                p.insert(id, Payload::handle(1u8, move |_| c.set(c.get() + 1)))
                    .unwrap(),
            );
        }
        p.teardown();
        assert_eq!(calls.get(), 4);
        assert!(p.is_torn_down());
        assert!(p.is_empty());
        p.teardown();
        assert_eq!(calls.get(), 4);

        assert!(handles.iter().all(|h| h.get(&p).is_none()));
        assert!(p.lookup("a").is_none());
        assert_eq!(p.insert("a", Payload::unmanaged(0u8)), Err(TableError::TornDown));
        drop(p);
        assert_eq!(calls.get(), 4);
    }

    /// Invariant: a handle resolves only against the table that issued it,
    /// even when the other table has a node in the same arena position.
    #[test]
    fn handle_from_another_table_resolves_to_none() {
        let mut a = Prototype::new(4).unwrap();
        let mut b = Prototype::new(4).unwrap();
        let ha = a.insert("secret", Payload::unmanaged(1u32)).unwrap();
        let hb = b.insert("other", Payload::unmanaged(2u32)).unwrap();
        assert_ne!(ha, hb);

        assert_eq!(ha.identifier(&b), None);
        assert_eq!(ha.kind(&b), None);
        assert!(ha.get(&b).is_none());
        assert!(ha.get_mut(&mut b).is_none());
        assert_eq!(b.lookup("other").and_then(|s| s.read::<u32>()), Some(2));

        assert_eq!(ha.identifier(&a), Some("secret"));
        assert_eq!(hb.identifier(&b), Some("other"));
        assert_eq!(b.find("other"), Some(hb));
    }

    #[test]
    fn drop_tears_down() {
        let calls = Rc::new(Cell::new(0));
        {
            let mut p = Prototype::new(1).unwrap();
            let c = calls.clone();
            p.insert("v", Payload::owned_with(5i32, move |_| c.set(c.get() + 1)))
                .unwrap();
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn identifiers_cover_every_slot() {
        let mut p = Prototype::new(5).unwrap();
        p.insert("f", Payload::callable(|| 1)).unwrap();
        p.insert("v", Payload::owned(1u8)).unwrap();
        p.insert("h", Payload::owned_handle(Default::default(), None))
            .unwrap();
        p.insert("u", Payload::unmanaged(1u8)).unwrap();
        let mut all: Vec<_> = p.identifiers().collect();
        all.sort();
        assert_eq!(
            all,
            vec![
                ("f", Kind::Callable),
                ("h", Kind::OwnedHandle),
                ("u", Kind::UnmanagedValue),
                ("v", Kind::OwnedValue),
            ]
        );
    }
}
