//! Declarative front-ends over the proc-macros.
//!
//! These macros offer a more concise syntax and delegate to `#[interface]`
//! for the actual code generation, so there is a single implementation.
//!
//! # Features
//! - `define_interface!` - declare capability interfaces (delegates to
//!   `#[interface]`); `static fn` marks receiver-less operations and
//!   `trait Sub: Base` becomes `extends(Base)`
//! - `compose!` - type macro writing the right-nested [`Compose`] chain for
//!   composites of any arity
//!
//! # Example
//! ```ignore
//! define_interface! {
//!     pub trait Shape {
//!         fn area(&self) -> f64;
//!         fn scale(&mut self, factor: f64);
//!         static fn kind() -> &'static str;
//!     }
//! }
//!
//! type ShapeAndDraw = compose!(ShapeVt, DrawVt);
//! ```
//!
//! [`Compose`]: crate::Compose

/// Declare one or more capability interfaces.
///
/// Each declaration expands to `#[interface(...)] $vis trait ...`, with
/// `static fn` operations collected into the `no_self(...)` attribute
/// argument and an optional single supertrait into `extends(...)`.
#[macro_export]
macro_rules! define_interface {
    // Entry point - parse multiple interface declarations
    (
        $(
            $(#[$meta:meta])*
            $vis:vis trait $name:ident $(: $base:ident)? {
                $($body:tt)*
            }
        )*
    ) => {
        $(
            $crate::define_interface!(@collect
                [$(#[$meta])*] [$vis] $name [$($base)?]
                { $($body)* } [] []
            );
        )*
    };

    // Collect: receiver-less operation (`static fn`), name goes into the
    // no_self accumulator
    (@collect [$($meta:tt)*] [$vis:vis] $name:ident [$($base:ident)?] {
        $(#[$mm:meta])*
        static fn $method:ident ($($pname:ident : $pty:ty),* $(,)?) $(-> $ret:ty)?;
        $($rest:tt)*
    } [$($collected:tt)*] [$($ns:ident)*]) => {
        $crate::define_interface!(@collect [$($meta)*] [$vis] $name [$($base)?] { $($rest)* } [
            $($collected)*
            { $(#[$mm])* fn $method($($pname: $pty),*) $(-> $ret)?; }
        ] [$($ns)* $method]);
    };

    // Collect: operation with &self
    (@collect [$($meta:tt)*] [$vis:vis] $name:ident [$($base:ident)?] {
        $(#[$mm:meta])*
        fn $method:ident (&self $(, $pname:ident : $pty:ty)* $(,)?) $(-> $ret:ty)?;
        $($rest:tt)*
    } [$($collected:tt)*] [$($ns:ident)*]) => {
        $crate::define_interface!(@collect [$($meta)*] [$vis] $name [$($base)?] { $($rest)* } [
            $($collected)*
            { $(#[$mm])* fn $method(&self $(, $pname: $pty)*) $(-> $ret)?; }
        ] [$($ns)*]);
    };

    // Collect: operation with &mut self
    (@collect [$($meta:tt)*] [$vis:vis] $name:ident [$($base:ident)?] {
        $(#[$mm:meta])*
        fn $method:ident (&mut self $(, $pname:ident : $pty:ty)* $(,)?) $(-> $ret:ty)?;
        $($rest:tt)*
    } [$($collected:tt)*] [$($ns:ident)*]) => {
        $crate::define_interface!(@collect [$($meta)*] [$vis] $name [$($base)?] { $($rest)* } [
            $($collected)*
            { $(#[$mm])* fn $method(&mut self $(, $pname: $pty)*) $(-> $ret)?; }
        ] [$($ns)*]);
    };

    // Terminal: emit the trait with the interface attribute (with base)
    (@collect [$($meta:tt)*] [$vis:vis] $name:ident [$base:ident] {}
     [$({ $($method:tt)* })*] [$($ns:ident)*]) => {
        $($meta)*
        #[$crate::proc::interface(extends($base), no_self($($ns),*))]
        $vis trait $name: $base {
            $($($method)*)*
        }
    };

    // Terminal: emit the trait with the interface attribute (no base)
    (@collect [$($meta:tt)*] [$vis:vis] $name:ident [] {}
     [$({ $($method:tt)* })*] [$($ns:ident)*]) => {
        $($meta)*
        #[$crate::proc::interface(no_self($($ns),*))]
        $vis trait $name {
            $($($method)*)*
        }
    };
}

/// The composite interface type over two or more member interfaces, in
/// declaration order.
///
/// `compose!(A, B, C)` is `Compose<A, Compose<B, C>>`; projection routes
/// see through the nesting, so any leaf member is extractable directly.
#[macro_export]
macro_rules! compose {
    ($a:ty, $b:ty $(,)?) => {
        $crate::Compose<$a, $b>
    };
    ($a:ty, $($rest:ty),+ $(,)?) => {
        $crate::Compose<$a, $crate::compose!($($rest),+)>
    };
}
