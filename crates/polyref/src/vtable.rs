//! Dispatch-table shapes, the implementation mapping and table storage.
//!
//! An interface is represented at runtime by its table type alone: a
//! `#[repr(C)]`, `Copy` aggregate of `unsafe fn` slots generated by
//! `#[interface]`. The table type implements [`Vtable`]; the fact that a
//! concrete type satisfies the interface is the [`VtableFor`] impl tying the
//! table type to it. Both are compile-time facts; pairing a type with an
//! interface it does not implement is a missing bound, not a runtime error.

/// A dispatch-table shape for one interface.
///
/// `Storage` is the handle layout the builder selected for this interface,
/// fixed once at declaration time (see [`Inline`] and [`Indirect`]).
pub trait Vtable: Copy + Send + Sync + 'static {
    type Storage: VtStorage<Self>;
}

/// The implementation mapping: `Self` realizes its interface for the
/// concrete type `T`.
///
/// `#[interface]` emits a blanket impl of this for every type implementing
/// the interface trait, with the table type as the impl's self type so the
/// blanket is coherent in downstream crates. Composites and box tables get
/// theirs from blanket impls in this crate.
///
/// Pairing a type with an interface it does not implement is a missing
/// bound, rejected before the program runs:
///
/// ```compile_fail
/// use polyref::DynRef;
/// use polyref::proc::interface;
///
/// #[interface]
/// pub trait Shape {
///     fn area(&self) -> f64;
/// }
///
/// struct Blob;
///
/// let b = Blob;
/// let _ = DynRef::<ShapeVt>::new(&b); // Blob does not implement Shape
/// ```
pub trait VtableFor<T: 'static>: Vtable {
    /// Assemble one fresh table for `T`, invoking the delegate synthesizer
    /// once per slot. [`vtable_of`](crate::vtable_of) interns the canonical
    /// process-wide copy; callers never need `build` directly.
    fn build() -> Self;
}

/// How a handle stores its interface's table.
pub trait VtStorage<V>: Copy {
    fn pack(table: &'static V) -> Self;
    fn table(&self) -> &V;
}

/// Embedded table copy.
///
/// Selected when the whole table fits in one machine pointer (a single
/// slot), so one-operation interfaces pay no extra indirection.
#[derive(Clone, Copy)]
pub struct Inline<V: Copy + 'static>(V);

impl<V: Copy + 'static> VtStorage<V> for Inline<V> {
    #[inline]
    fn pack(table: &'static V) -> Self {
        Inline(*table)
    }

    #[inline]
    fn table(&self) -> &V {
        &self.0
    }
}

/// Reference to the process-wide table singleton.
///
/// Selected for larger interfaces, and always for composites and extending
/// interfaces, whose tables must stay addressable for member projection and
/// upcasting.
pub struct Indirect<V: 'static>(&'static V);

impl<V: 'static> Clone for Indirect<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: 'static> Copy for Indirect<V> {}

impl<V: 'static> VtStorage<V> for Indirect<V> {
    #[inline]
    fn pack(table: &'static V) -> Self {
        Indirect(table)
    }

    #[inline]
    fn table(&self) -> &V {
        self.0
    }
}

impl<V: 'static> Indirect<V> {
    /// The singleton table, with its full lifetime.
    #[inline]
    pub fn as_static(self) -> &'static V {
        self.0
    }
}

/// Declared interface extension: `Self`'s table begins with `B`'s.
///
/// Emitted by `#[interface(extends(Base))]`. Handles over the sub interface
/// upcast to the base by reading the embedded prefix; the reverse direction
/// does not exist, and upcasting between unrelated interfaces is a missing
/// bound:
///
/// ```compile_fail
/// use polyref::{DynRef, Vtable};
///
/// fn sideways<'a, A: Vtable, B: Vtable>(r: DynRef<'a, A>) -> DynRef<'a, B> {
///     r.upcast::<B>() // A does not declare B as a base
/// }
/// ```
///
/// # Safety
/// `as_base` must return a table whose slots realize `B` for the same
/// concrete type `Self` was built for. The macro guarantees this by placing
/// the base table as the leading `#[repr(C)]` field.
pub unsafe trait Extends<B: Vtable>: Vtable {
    fn as_base(&'static self) -> &'static B;
}
