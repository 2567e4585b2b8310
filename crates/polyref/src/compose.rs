//! Composite interfaces and static member projection.
//!
//! A composite is an ordered aggregate of interfaces whose table is the
//! ordered juxtaposition of references to the members' own singletons.
//! Larger composites nest to the right; the [`compose!`](macro@crate::compose)
//! macro writes the nesting. Member extraction is a chain of field reads
//! resolved entirely at compile time through [`Project`] routes, so pulling
//! a leaf out of a nested composite costs the same as a direct field access
//! and performs no identity check.

use std::marker::PhantomData;

use crate::registry::vtable_of;
use crate::vtable::{Indirect, Vtable, VtableFor};

/// Ordered aggregate of two interfaces.
#[repr(C)]
pub struct Compose<A: Vtable, B: Vtable> {
    pub first: &'static A,
    pub second: &'static B,
}

impl<A: Vtable, B: Vtable> Clone for Compose<A, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A: Vtable, B: Vtable> Copy for Compose<A, B> {}

impl<A: Vtable, B: Vtable> Vtable for Compose<A, B> {
    // Composite tables stay addressable so member projection can hand out
    // references into them.
    type Storage = Indirect<Self>;
}

// A type satisfies a composite exactly when it independently satisfies
// every member; each member reference is that member's own singleton, so a
// projected view is bit-identical to a directly built handle's table.
impl<A, B, T> VtableFor<T> for Compose<A, B>
where
    A: VtableFor<T>,
    B: VtableFor<T>,
    T: 'static,
{
    fn build() -> Self {
        Compose {
            first: vtable_of::<A, T>(),
            second: vtable_of::<B, T>(),
        }
    }
}

/// Route terminal: the projection target is this table itself.
pub struct Here(());

/// Route step: descend into the first member.
pub struct Left<R>(PhantomData<R>);

/// Route step: descend into the second member.
pub struct Right<R>(PhantomData<R>);

/// Static member extraction from (possibly nested) composite tables.
///
/// `R` is the declaration-order route to the member. It is inferred
/// whenever the member interface occurs exactly once in the composite;
/// handles never name it explicitly.
pub trait Project<U: Vtable, R>: Vtable {
    fn member(&'static self) -> &'static U;
}

impl<V: Vtable> Project<V, Here> for V {
    #[inline]
    fn member(&'static self) -> &'static V {
        self
    }
}

impl<A, B, U, R> Project<U, Left<R>> for Compose<A, B>
where
    A: Vtable + Project<U, R>,
    B: Vtable,
    U: Vtable,
{
    #[inline]
    fn member(&'static self) -> &'static U {
        self.first.member()
    }
}

impl<A, B, U, R> Project<U, Right<R>> for Compose<A, B>
where
    A: Vtable,
    B: Vtable + Project<U, R>,
    U: Vtable,
{
    #[inline]
    fn member(&'static self) -> &'static U {
        self.second.member()
    }
}
