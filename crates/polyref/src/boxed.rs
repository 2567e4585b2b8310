//! Owning, type-erased containers.
//!
//! A [`DynBox`] holds one value behind an interface in a single heap
//! allocation: a one-pointer header referencing the per-(interface, type)
//! [`BoxVt`], then the value at the table's recorded offset. The offset,
//! allocation layout and destructor delegate are static properties of the
//! (interface, concrete type) pair, computed once when the box table is
//! built and shared by every box of that pair.
//!
//! [`DynArc`] is the shared counterpart: the same single-allocation shape
//! with an atomic reference count ahead of the header. Clones share the
//! value read-only.
//!
//! Destruction is `Drop` for both: the destructor delegate runs exactly
//! once (for the shared container, when the last clone goes away) and the
//! allocation is released with it, so double-destruct and
//! use-after-destruct are unrepresentable in safe code. `into_raw`/
//! `from_raw` keep the raw path open for callers who take that obligation
//! on themselves.

use std::alloc::{self, Layout, handle_alloc_error};
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::atomic::{self, AtomicUsize, Ordering};

use crate::handle::{AsDyn, AsDynMut, DynPtr, DynPtrMut, DynRef, DynRefMut};
use crate::registry::vtable_of;
use crate::this::{ConstThis, MutThis};
use crate::vtable::{Indirect, VtStorage, Vtable, VtableFor};

/// Table view for boxed values: the interface's ordinary operation table
/// plus the box metadata. Always indirect.
#[repr(C)]
pub struct BoxVt<V: Vtable> {
    /// The interface's operation table; the non-meta portion every handle
    /// derived from the box carries.
    pub ops: &'static V,
    /// Byte offset from the allocation base to the value.
    pub offset: usize,
    /// Layout of the whole allocation.
    pub layout: Layout,
    /// Destructor delegate for the erased value.
    pub drop_value: unsafe fn(*mut ()),
}

impl<V: Vtable> Clone for BoxVt<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: Vtable> Copy for BoxVt<V> {}

impl<V: Vtable> Vtable for BoxVt<V> {
    type Storage = Indirect<Self>;
}

impl<V, T> VtableFor<T> for BoxVt<V>
where
    V: VtableFor<T>,
    T: 'static,
{
    fn build() -> Self {
        unsafe fn drop_value<T>(value: *mut ()) {
            // SAFETY: boxes call this exactly once, on the value address.
            unsafe { ptr::drop_in_place(value as *mut T) }
        }

        let header = Layout::new::<&'static BoxVt<V>>();
        let (layout, offset) = header
            .extend(Layout::new::<T>())
            .expect("box layout overflows isize");

        BoxVt {
            ops: vtable_of::<V, T>(),
            offset,
            layout: layout.pad_to_align(),
            drop_value: drop_value::<T>,
        }
    }
}

/// Owning handle: one value of an erased concrete type behind interface `V`,
/// in one allocation. Move-only; there is exactly one logical owner:
///
/// ```compile_fail
/// use polyref::{DynBox, Vtable};
///
/// fn duplicate<V: Vtable>(b: &DynBox<V>) -> DynBox<V> {
///     b.clone() // boxes do not clone; use DynArc for shared ownership
/// }
/// ```
pub struct DynBox<V: Vtable> {
    base: NonNull<u8>,
    _marker: PhantomData<V>,
}

impl<V: Vtable> DynBox<V> {
    /// Move `value` into a box viewed through interface `V`.
    ///
    /// `Send` is required of the value so the box can move across threads;
    /// the erased type is unrecoverable afterwards, so the bound cannot be
    /// checked later.
    pub fn new<T>(value: T) -> Self
    where
        V: VtableFor<T>,
        T: Send + 'static,
    {
        let vt = vtable_of::<BoxVt<V>, T>();
        unsafe {
            let base = alloc::alloc(vt.layout);
            if base.is_null() {
                handle_alloc_error(vt.layout);
            }
            (base as *mut &'static BoxVt<V>).write(vt);
            (base.add(vt.offset) as *mut T).write(value);
            DynBox {
                base: NonNull::new_unchecked(base),
                _marker: PhantomData,
            }
        }
    }

    #[inline]
    fn vt(&self) -> &'static BoxVt<V> {
        // SAFETY: the header is written at construction and never changes.
        unsafe { *(self.base.as_ptr() as *const &'static BoxVt<V>) }
    }

    /// Address of the boxed value: allocation base plus the table's offset.
    #[inline]
    pub fn data(&self) -> *const () {
        unsafe { self.base.as_ptr().add(self.vt().offset) as *const () }
    }

    /// Mutable address of the boxed value.
    #[inline]
    pub fn data_mut(&mut self) -> *mut () {
        unsafe { self.base.as_ptr().add(self.vt().offset) as *mut () }
    }

    /// The interface's operation table singleton.
    #[inline]
    pub fn ops(&self) -> &'static V {
        self.vt().ops
    }

    /// Read-only reference handle borrowing the boxed value.
    #[inline]
    pub fn as_ref(&self) -> DynRef<'_, V> {
        DynRef::from_raw_parts(self.data(), V::Storage::pack(self.ops()))
    }

    /// Mutable reference handle borrowing the boxed value exclusively.
    #[inline]
    pub fn as_mut(&mut self) -> DynRefMut<'_, V> {
        let vt = V::Storage::pack(self.ops());
        DynRefMut::from_raw_parts(self.data_mut(), vt)
    }

    /// Raw pointer handle to the boxed value. The box keeps ownership.
    #[inline]
    pub fn as_dyn_ptr(&self) -> DynPtr<V> {
        self.as_ref().as_ptr()
    }

    /// Raw mutable pointer handle to the boxed value.
    #[inline]
    pub fn as_dyn_ptr_mut(&mut self) -> DynPtrMut<V> {
        self.as_mut().as_ptr()
    }

    /// Release ownership without destroying the value.
    ///
    /// The allocation, its header and the value stay intact; pass the
    /// address back to [`DynBox::from_raw`] to resume ownership.
    pub fn into_raw(self) -> NonNull<u8> {
        let base = self.base;
        std::mem::forget(self);
        base
    }

    /// Resume ownership of an allocation released by [`DynBox::into_raw`].
    ///
    /// # Safety
    /// - `base` must come from `into_raw` on a `DynBox<V>` of the same `V`
    /// - Ownership must not have been resumed already
    pub unsafe fn from_raw(base: NonNull<u8>) -> Self {
        DynBox {
            base,
            _marker: PhantomData,
        }
    }
}

impl<V: Vtable> Drop for DynBox<V> {
    fn drop(&mut self) {
        let vt = self.vt();
        unsafe {
            (vt.drop_value)(self.base.as_ptr().add(vt.offset) as *mut ());
            alloc::dealloc(self.base.as_ptr(), vt.layout);
        }
    }
}

// SAFETY: construction requires the erased value to be Send, the table is
// shared immutable state, and the box is the sole owner. Not Sync: shared
// box references would expose the value across threads without requiring
// the (unrecoverable) erased type to be Sync.
unsafe impl<V: Vtable> Send for DynBox<V> {}

// SAFETY: the box owns its referent; address and table come from the same
// construction and the value lives until drop.
unsafe impl<V: Vtable> AsDyn<V> for DynBox<V> {
    #[inline]
    fn this(&self) -> ConstThis {
        ConstThis::from_raw(self.data())
    }

    #[inline]
    fn table(&self) -> &V {
        self.ops()
    }
}

// SAFETY: `&mut self` on the sole owner is exclusive access to the value.
unsafe impl<V: Vtable> AsDynMut<V> for DynBox<V> {
    #[inline]
    fn this_mut(&mut self) -> MutThis {
        MutThis::from_raw(self.data_mut())
    }
}

impl<'a, V: Vtable> From<&'a DynBox<V>> for DynPtr<V> {
    fn from(b: &'a DynBox<V>) -> Self {
        b.as_dyn_ptr()
    }
}

impl<'a, V: Vtable> From<&'a mut DynBox<V>> for DynPtrMut<V> {
    fn from(b: &'a mut DynBox<V>) -> Self {
        b.as_dyn_ptr_mut()
    }
}

/// Header of a shared allocation: the reference count, then the table.
#[repr(C)]
struct ArcHeader<V: Vtable> {
    strong: AtomicUsize,
    vt: &'static ArcVt<V>,
}

/// Table view for shared boxed values: the same metadata as [`BoxVt`],
/// with the offset computed for the counted header.
#[repr(C)]
pub struct ArcVt<V: Vtable> {
    /// The interface's operation table.
    pub ops: &'static V,
    /// Byte offset from the allocation base to the value.
    pub offset: usize,
    /// Layout of the whole allocation.
    pub layout: Layout,
    /// Destructor delegate for the erased value.
    pub drop_value: unsafe fn(*mut ()),
}

impl<V: Vtable> Clone for ArcVt<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: Vtable> Copy for ArcVt<V> {}

impl<V: Vtable> Vtable for ArcVt<V> {
    type Storage = Indirect<Self>;
}

impl<V, T> VtableFor<T> for ArcVt<V>
where
    V: VtableFor<T>,
    T: 'static,
{
    fn build() -> Self {
        unsafe fn drop_value<T>(value: *mut ()) {
            // SAFETY: the last owner calls this exactly once, on the value
            // address.
            unsafe { ptr::drop_in_place(value as *mut T) }
        }

        let header = Layout::new::<ArcHeader<V>>();
        let (layout, offset) = header
            .extend(Layout::new::<T>())
            .expect("box layout overflows isize");

        ArcVt {
            ops: vtable_of::<V, T>(),
            offset,
            layout: layout.pad_to_align(),
            drop_value: drop_value::<T>,
        }
    }
}

// Past this the count has certainly been leaked or forged; abort like the
// standard library's Arc rather than risk a double free on overflow.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Shared owning handle: one value of an erased concrete type behind
/// interface `V`, co-located with its reference count in one allocation.
///
/// Clones share the value read-only. The destructor delegate runs exactly
/// once, when the last clone drops.
pub struct DynArc<V: Vtable> {
    base: NonNull<u8>,
    _marker: PhantomData<V>,
}

impl<V: Vtable> DynArc<V> {
    /// Move `value` into a shared box viewed through interface `V`.
    ///
    /// `Send + Sync` is required of the value: clones may read it from any
    /// thread and the last of them may drop it on any thread.
    pub fn new<T>(value: T) -> Self
    where
        V: VtableFor<T>,
        T: Send + Sync + 'static,
    {
        let vt = vtable_of::<ArcVt<V>, T>();
        unsafe {
            let base = alloc::alloc(vt.layout);
            if base.is_null() {
                handle_alloc_error(vt.layout);
            }
            (base as *mut ArcHeader<V>).write(ArcHeader {
                strong: AtomicUsize::new(1),
                vt,
            });
            (base.add(vt.offset) as *mut T).write(value);
            DynArc {
                base: NonNull::new_unchecked(base),
                _marker: PhantomData,
            }
        }
    }

    #[inline]
    fn header(&self) -> &ArcHeader<V> {
        // SAFETY: written at construction; the count is the only mutable
        // part and it is atomic.
        unsafe { &*(self.base.as_ptr() as *const ArcHeader<V>) }
    }

    #[inline]
    fn vt(&self) -> &'static ArcVt<V> {
        self.header().vt
    }

    /// Address of the shared value: allocation base plus the table's offset.
    #[inline]
    pub fn data(&self) -> *const () {
        unsafe { self.base.as_ptr().add(self.vt().offset) as *const () }
    }

    /// The interface's operation table singleton.
    #[inline]
    pub fn ops(&self) -> &'static V {
        self.vt().ops
    }

    /// Number of live owners sharing the value.
    pub fn strong_count(&self) -> usize {
        self.header().strong.load(Ordering::Acquire)
    }

    /// Whether two handles share one allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.base == other.base
    }

    /// Read-only reference handle borrowing the shared value.
    #[inline]
    pub fn as_ref(&self) -> DynRef<'_, V> {
        DynRef::from_raw_parts(self.data(), V::Storage::pack(self.ops()))
    }

    /// Raw pointer handle to the shared value. The owners keep ownership.
    #[inline]
    pub fn as_dyn_ptr(&self) -> DynPtr<V> {
        self.as_ref().as_ptr()
    }
}

impl<V: Vtable> Clone for DynArc<V> {
    fn clone(&self) -> Self {
        if self.header().strong.fetch_add(1, Ordering::Relaxed) > MAX_REFCOUNT {
            std::process::abort();
        }
        DynArc {
            base: self.base,
            _marker: PhantomData,
        }
    }
}

impl<V: Vtable> Drop for DynArc<V> {
    fn drop(&mut self) {
        if self.header().strong.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        // Synchronize with every previous release before destroying.
        atomic::fence(Ordering::Acquire);
        let vt = self.vt();
        unsafe {
            (vt.drop_value)(self.base.as_ptr().add(vt.offset) as *mut ());
            alloc::dealloc(self.base.as_ptr(), vt.layout);
        }
    }
}

// SAFETY: construction requires the erased value to be Send + Sync; owners
// only share read access and the count is atomic.
unsafe impl<V: Vtable> Send for DynArc<V> {}
unsafe impl<V: Vtable> Sync for DynArc<V> {}

// SAFETY: the owners collectively keep the referent alive; address and
// table come from the same construction.
unsafe impl<V: Vtable> AsDyn<V> for DynArc<V> {
    #[inline]
    fn this(&self) -> ConstThis {
        ConstThis::from_raw(self.data())
    }

    #[inline]
    fn table(&self) -> &V {
        self.ops()
    }
}

impl<'a, V: Vtable> From<&'a DynArc<V>> for DynPtr<V> {
    fn from(a: &'a DynArc<V>) -> Self {
        a.as_dyn_ptr()
    }
}
