//! Non-intrusive runtime polymorphism for Rust
//!
//! A concrete type satisfies an externally declared capability interface
//! without inheriting from anything: implement the interface's plain trait
//! and the engine derives a per-(interface, type) dispatch table, then pairs
//! object addresses with it in lightweight handles. Dispatch is one indirect
//! call through the table; no allocation happens outside [`DynBox`].
//!
//! This crate provides two ways of declaring an interface:
//!
//! ## Proc-macro (`proc` module)
//! ```ignore
//! use polyref::proc::interface;
//!
//! #[interface]
//! pub trait Shape {
//!     fn area(&self) -> f64;
//!     fn scale(&mut self, factor: f64);
//!     #[no_self]
//!     fn kind(name: &str) -> bool;
//! }
//! ```
//!
//! ## Declarative macro (`decl` module)
//! ```ignore
//! use polyref::define_interface;
//!
//! define_interface! {
//!     pub trait Shape {
//!         fn area(&self) -> f64;
//!         fn scale(&mut self, factor: f64);
//!         static fn kind(name: &str) -> bool;
//!     }
//! }
//! ```
//!
//! Either form generates the `ShapeVt` table type plus `ShapeExt` /
//! `ShapeExtMut` call traits. Any `T: Shape` can then be viewed through:
//!
//! - [`DynRef`] / [`DynRefMut`] - borrowing, never-null reference handles
//! - [`DynPtr`] / [`DynPtrMut`] - nullable raw pointer handles
//! - [`DynBox`] - an owning, single-allocation container
//! - [`DynArc`] - its shared, reference-counted counterpart
//! - [`Compose`] / [`compose!`] - composite interfaces with O(1) member
//!   projection
//!
//! ## Caller obligations
//!
//! Tables are immutable process-wide singletons and freely shared across
//! threads. Handles are plain values; the engine never checks liveness or
//! nullness on the dispatch path. The `unsafe` upgrade points
//! ([`DynPtr::as_dyn_ref`], [`DynPtrMut::as_dyn_mut`]) document the
//! preconditions and carry `debug_assert!` guards only.

pub mod boxed;
pub mod compose;
pub mod decl;
pub mod handle;
pub mod registry;
pub mod this;
pub mod vtable;

/// Proc-macro approach - re-exports from the polyref-macro crate
pub mod proc {
    pub use polyref_macro::interface;
}

pub use boxed::{ArcVt, BoxVt, DynArc, DynBox};
pub use compose::{Compose, Here, Left, Project, Right};
pub use handle::{AsDyn, AsDynMut, DynPtr, DynPtrMut, DynRef, DynRefMut};
pub use registry::vtable_of;
pub use this::{ConstThis, MutThis};
pub use vtable::{Extends, Indirect, Inline, VtStorage, Vtable, VtableFor};
