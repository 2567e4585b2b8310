//! Process-wide interning of dispatch-table singletons.
//!
//! One table exists per (interface, concrete type) pair for the lifetime of
//! the process: built on first reference, immutable afterwards, readable
//! from any thread without synchronization. The registry is keyed by the
//! `TypeId` pair and guarded for the one-time construction only; the
//! dispatch path never touches it (handles carry their table directly).

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::vtable::VtableFor;

/// Type-erased address of a leaked table.
///
/// Only ever created from `V: Vtable` values (which are `Send + Sync`) and
/// never mutated after publication.
#[derive(Clone, Copy)]
struct TableAddr(*const ());

unsafe impl Send for TableAddr {}
unsafe impl Sync for TableAddr {}

type Key = (TypeId, TypeId);

fn map() -> &'static RwLock<HashMap<Key, TableAddr>> {
    static MAP: OnceLock<RwLock<HashMap<Key, TableAddr>>> = OnceLock::new();
    MAP.get_or_init(|| RwLock::new(HashMap::new()))
}

// Entries are write-once; a poisoned lock still guards a structurally valid
// map, so poisoning is absorbed rather than propagated.
fn read_entry(key: Key) -> Option<TableAddr> {
    map()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .copied()
}

/// The canonical table realizing interface `V` for concrete type `T`.
///
/// Built at most once per pair; every subsequent call observes the same
/// `&'static` instance, so pointer identity of indirect tables is stable
/// across handles and threads.
pub fn vtable_of<V: VtableFor<T>, T: 'static>() -> &'static V {
    let key = (TypeId::of::<V>(), TypeId::of::<T>());

    if let Some(TableAddr(addr)) = read_entry(key) {
        // SAFETY: only this function inserts under this key, always a leaked
        // `V` that lives for the rest of the process.
        return unsafe { &*(addr as *const V) };
    }

    // Build before taking the write lock: composite and box table builders
    // re-enter here for their members, and the lock is not reentrant.
    let fresh = Box::into_raw(Box::new(V::build()));

    let mut m = map().write().unwrap_or_else(PoisonError::into_inner);
    match m.entry(key) {
        Entry::Occupied(entry) => {
            let TableAddr(existing) = *entry.get();
            drop(m);
            // Lost the construction race; ours was never published.
            // SAFETY: `fresh` came from `Box::into_raw` above and no other
            // reference to it exists.
            unsafe { drop(Box::from_raw(fresh)) };
            // SAFETY: as for the fast path above.
            unsafe { &*(existing as *const V) }
        }
        Entry::Vacant(entry) => {
            entry.insert(TableAddr(fresh as *const ()));
            // SAFETY: published and never removed; `fresh` is now immutable
            // for the process lifetime.
            unsafe { &*fresh }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vtable::{Indirect, Vtable};

    // Hand-rolled single-slot interface, bypassing the macro.
    #[repr(C)]
    #[derive(Clone, Copy)]
    struct AnswerVt {
        answer: fn() -> i32,
    }

    impl Vtable for AnswerVt {
        type Storage = Indirect<Self>;
    }

    struct Alpha;
    struct Beta;

    impl VtableFor<Alpha> for AnswerVt {
        fn build() -> Self {
            AnswerVt { answer: || 1 }
        }
    }

    impl VtableFor<Beta> for AnswerVt {
        fn build() -> Self {
            AnswerVt { answer: || 2 }
        }
    }

    #[test]
    fn test_singleton_per_pair() {
        let a = vtable_of::<AnswerVt, Alpha>();
        let b = vtable_of::<AnswerVt, Alpha>();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_distinct_pairs_get_distinct_tables() {
        let a = vtable_of::<AnswerVt, Alpha>();
        let b = vtable_of::<AnswerVt, Beta>();
        assert!(!std::ptr::eq(a, b));
        assert_eq!((a.answer)(), 1);
        assert_eq!((b.answer)(), 2);
    }

    #[test]
    fn test_concurrent_first_reference_is_race_free() {
        struct Gamma;
        impl VtableFor<Gamma> for AnswerVt {
            fn build() -> Self {
                AnswerVt { answer: || 3 }
            }
        }

        let tables: Vec<&'static AnswerVt> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| vtable_of::<AnswerVt, Gamma>()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for t in &tables {
            assert!(std::ptr::eq(*t, tables[0]));
            assert_eq!((t.answer)(), 3);
        }
    }
}
