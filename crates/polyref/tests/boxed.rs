//! Tests for the owning containers: layout metadata, dispatch, destruction,
//! shared ownership.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use polyref::proc::interface;
use polyref::{DynArc, DynBox, DynPtr};

#[interface]
pub trait Ident {
    fn id(&self) -> u64;
    fn bump(&mut self);
}

struct Token {
    value: u64,
}

impl Ident for Token {
    fn id(&self) -> u64 {
        self.value
    }

    fn bump(&mut self) {
        self.value += 1;
    }
}

#[test]
fn test_box_dispatch() {
    let b = DynBox::<IdentVt>::new(Token { value: 42 });
    assert_eq!(b.id(), 42);
}

#[test]
fn test_box_mutation() {
    let mut b = DynBox::<IdentVt>::new(Token { value: 1 });
    b.bump();
    b.bump();
    assert_eq!(b.id(), 3);
}

#[test]
fn test_box_data_round_trip() {
    let b = DynBox::<IdentVt>::new(Token { value: 7 });
    // The data address points at the moved-in value, past the header.
    // SAFETY: the box was constructed from a Token and still owns it.
    let token = unsafe { &*(b.data() as *const Token) };
    assert_eq!(token.value, 7);
}

#[test]
fn test_box_handles_share_the_value_address() {
    let mut b = DynBox::<IdentVt>::new(Token { value: 9 });
    let addr = b.data();
    assert_eq!(b.as_ref().data(), addr);
    assert_eq!(b.as_dyn_ptr().data(), addr);
    assert_eq!(b.as_mut().data(), addr);
    assert_eq!(b.as_dyn_ptr_mut().data(), addr);

    let p: DynPtr<IdentVt> = (&b).into();
    assert_eq!(p.data(), addr);
}

#[test]
fn test_borrowed_handles_dispatch() {
    let mut b = DynBox::<IdentVt>::new(Token { value: 5 });
    assert_eq!(b.as_ref().id(), 5);
    let mut m = b.as_mut();
    m.bump();
    assert_eq!(b.id(), 6);
}

#[test]
fn test_box_is_move_only() {
    let b = DynBox::<IdentVt>::new(Token { value: 12 });
    let moved = b;
    let held: Vec<DynBox<IdentVt>> = vec![moved];
    assert_eq!(held[0].id(), 12);
}

static SENTRY_DROPS: AtomicUsize = AtomicUsize::new(0);

struct Sentry {
    alive: bool,
}

impl Drop for Sentry {
    fn drop(&mut self) {
        assert!(self.alive);
        self.alive = false;
        SENTRY_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

#[interface]
pub trait Probe {
    fn is_alive(&self) -> bool;
}

impl Probe for Sentry {
    fn is_alive(&self) -> bool {
        self.alive
    }
}

#[test]
fn test_destructor_runs_exactly_once() {
    let before = SENTRY_DROPS.load(Ordering::SeqCst);
    {
        let b = DynBox::<ProbeVt>::new(Sentry { alive: true });
        assert!(b.is_alive());
        assert_eq!(SENTRY_DROPS.load(Ordering::SeqCst), before);
    }
    assert_eq!(SENTRY_DROPS.load(Ordering::SeqCst), before + 1);
}

static ESCAPE_DROPS: AtomicUsize = AtomicUsize::new(0);

struct Escapee;

impl Drop for Escapee {
    fn drop(&mut self) {
        ESCAPE_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

impl Probe for Escapee {
    fn is_alive(&self) -> bool {
        true
    }
}

#[test]
fn test_into_raw_from_raw_round_trip() {
    let before = ESCAPE_DROPS.load(Ordering::SeqCst);
    let b = DynBox::<ProbeVt>::new(Escapee);
    let raw = b.into_raw();
    // Ownership released: nothing dropped yet.
    assert_eq!(ESCAPE_DROPS.load(Ordering::SeqCst), before);

    // SAFETY: `raw` came from `into_raw` on a `DynBox<ProbeVt>` and
    // ownership has not been resumed before.
    let b = unsafe { DynBox::<ProbeVt>::from_raw(raw) };
    assert!(b.is_alive());
    drop(b);
    assert_eq!(ESCAPE_DROPS.load(Ordering::SeqCst), before + 1);
}

#[test]
fn test_box_is_send() {
    let b = DynBox::<IdentVt>::new(Token { value: 21 });
    let id = std::thread::spawn(move || b.id()).join().unwrap();
    assert_eq!(id, 21);
}

#[test]
fn test_boxes_of_one_pair_share_the_table() {
    let a = DynBox::<IdentVt>::new(Token { value: 1 });
    let b = DynBox::<IdentVt>::new(Token { value: 2 });
    assert!(std::ptr::eq(a.ops(), b.ops()));
}

#[test]
fn test_box_accepts_send_only_payloads() {
    // Cell is Send but not Sync; moving the box transfers exclusive access,
    // which is all a box ever grants.
    struct Gauge {
        level: Cell<u64>,
    }

    impl Ident for Gauge {
        fn id(&self) -> u64 {
            self.level.get()
        }

        fn bump(&mut self) {
            self.level.set(self.level.get() + 1);
        }
    }

    let mut b = DynBox::<IdentVt>::new(Gauge {
        level: Cell::new(5),
    });
    b.bump();
    let id = std::thread::spawn(move || b.id()).join().unwrap();
    assert_eq!(id, 6);
}

#[test]
fn test_shared_box_dispatch_and_clone() {
    let a = DynArc::<IdentVt>::new(Token { value: 42 });
    let b = a.clone();
    assert_eq!(a.id(), 42);
    assert_eq!(b.id(), 42);
    assert_eq!(a.data(), b.data());
    assert!(a.ptr_eq(&b));
    assert_eq!(a.strong_count(), 2);
}

#[test]
fn test_shared_boxes_do_not_alias_across_allocations() {
    let a = DynArc::<IdentVt>::new(Token { value: 1 });
    let b = DynArc::<IdentVt>::new(Token { value: 1 });
    assert!(!a.ptr_eq(&b));
    assert_ne!(a.data(), b.data());
}

#[test]
fn test_shared_box_handles() {
    let a = DynArc::<IdentVt>::new(Token { value: 8 });
    assert_eq!(a.as_ref().id(), 8);

    let p: DynPtr<IdentVt> = (&a).into();
    assert_eq!(p.data(), a.data());

    // Unique and shared containers of one pair dispatch through the same
    // operation-table singleton.
    let unique = DynBox::<IdentVt>::new(Token { value: 0 });
    assert!(std::ptr::eq(a.ops(), unique.ops()));
}

static SHARED_DROPS: AtomicUsize = AtomicUsize::new(0);

struct SharedSentry;

impl Drop for SharedSentry {
    fn drop(&mut self) {
        SHARED_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

impl Probe for SharedSentry {
    fn is_alive(&self) -> bool {
        true
    }
}

#[test]
fn test_shared_destructor_runs_exactly_once() {
    let before = SHARED_DROPS.load(Ordering::SeqCst);
    {
        let a = DynArc::<ProbeVt>::new(SharedSentry);
        let b = a.clone();
        let c = b.clone();
        drop(a);
        drop(b);
        // Still one owner left.
        assert_eq!(SHARED_DROPS.load(Ordering::SeqCst), before);
        assert!(c.is_alive());
    }
    assert_eq!(SHARED_DROPS.load(Ordering::SeqCst), before + 1);
}

#[test]
fn test_shared_box_across_threads() {
    let a = DynArc::<IdentVt>::new(Token { value: 33 });
    let b = a.clone();
    let id = std::thread::spawn(move || b.id()).join().unwrap();
    assert_eq!(id, 33);
    assert_eq!(a.id(), 33);
    assert_eq!(a.strong_count(), 1);
}
