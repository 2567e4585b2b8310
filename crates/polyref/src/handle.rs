//! Pointer and reference handles.
//!
//! A handle pairs an opaque data address with its interface table, stored
//! per the interface's chosen layout. Reference handles borrow a live
//! object and are never null; pointer handles are nullable plain values
//! with no lifetime, and upgrading one to a reference handle is the
//! caller's unchecked obligation. Conversions that would widen access
//! (const to mut) or the operation set do not exist; the permitted
//! directions are mut to const, sub to declared base, and composite to
//! member.

use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr;

use crate::compose::Project;
use crate::registry::vtable_of;
use crate::this::{ConstThis, MutThis};
use crate::vtable::{Extends, Indirect, VtStorage, Vtable, VtableFor};

/// Access to a handle's data address and table, the surface the generated
/// `{Name}Ext` call traits dispatch through.
///
/// # Safety
/// Implementors must guarantee that `this()` addresses an object that is
/// live for the duration of any call made through `table()`, and that the
/// table was built for that object's concrete type.
pub unsafe trait AsDyn<V: Vtable> {
    fn this(&self) -> ConstThis;
    fn table(&self) -> &V;
}

/// Mutable access to a handle's data address.
///
/// # Safety
/// As [`AsDyn`], and `this_mut()` must grant access that is exclusive for
/// the duration of the call.
pub unsafe trait AsDynMut<V: Vtable>: AsDyn<V> {
    fn this_mut(&mut self) -> MutThis;
}

// ---------------------------------------------------------------------------
// Reference handles
// ---------------------------------------------------------------------------

/// Never-null read-only handle borrowing its referent for `'a`.
///
/// Read-only is permanent: no conversion back to a mutable handle exists.
///
/// ```compile_fail
/// use polyref::{DynRef, DynRefMut, Vtable};
///
/// fn widen<'a, V: Vtable>(r: DynRef<'a, V>) -> DynRefMut<'a, V> {
///     DynRefMut::from(r)
/// }
/// ```
pub struct DynRef<'a, V: Vtable> {
    data: *const (),
    vt: V::Storage,
    _borrow: PhantomData<&'a ()>,
}

impl<'a, V: Vtable> DynRef<'a, V> {
    /// Handle viewing `obj` through interface `V`.
    pub fn new<T: 'static>(obj: &'a T) -> Self
    where
        V: VtableFor<T>,
    {
        Self {
            data: obj as *const T as *const (),
            vt: V::Storage::pack(vtable_of::<V, T>()),
            _borrow: PhantomData,
        }
    }

    pub(crate) fn from_raw_parts(data: *const (), vt: V::Storage) -> Self {
        Self {
            data,
            vt,
            _borrow: PhantomData,
        }
    }

    /// Address of the viewed object.
    #[inline]
    pub fn data(&self) -> *const () {
        self.data
    }

    /// Forget the borrow, keeping the pairing as a raw pointer handle.
    #[inline]
    pub fn as_ptr(&self) -> DynPtr<V> {
        DynPtr {
            data: self.data,
            vt: Some(self.vt),
        }
    }

    /// Upcast to a declared base interface. Preserves the data address.
    #[inline]
    pub fn upcast<B: Vtable>(&self) -> DynRef<'a, B>
    where
        V: Extends<B> + Vtable<Storage = Indirect<V>>,
    {
        DynRef::from_raw_parts(self.data, B::Storage::pack(self.vt.as_static().as_base()))
    }

    /// Project a member view out of a composite handle. Preserves the data
    /// address; the member table is the same singleton a directly built
    /// handle would carry.
    #[inline]
    pub fn project<U: Vtable, R>(&self) -> DynRef<'a, U>
    where
        V: Project<U, R> + Vtable<Storage = Indirect<V>>,
    {
        DynRef::from_raw_parts(self.data, U::Storage::pack(self.vt.as_static().member()))
    }
}

impl<V: Vtable> Clone for DynRef<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: Vtable> Copy for DynRef<'_, V> {}

// SAFETY: safe constructors pair the address with the table built for the
// referent's concrete type, and the borrow keeps the referent alive.
unsafe impl<V: Vtable> AsDyn<V> for DynRef<'_, V> {
    #[inline]
    fn this(&self) -> ConstThis {
        ConstThis::from_raw(self.data)
    }

    #[inline]
    fn table(&self) -> &V {
        self.vt.table()
    }
}

/// Never-null mutable handle borrowing its referent exclusively for `'a`.
pub struct DynRefMut<'a, V: Vtable> {
    data: *mut (),
    vt: V::Storage,
    _borrow: PhantomData<&'a mut ()>,
}

impl<'a, V: Vtable> DynRefMut<'a, V> {
    /// Handle viewing `obj` mutably through interface `V`.
    pub fn new<T: 'static>(obj: &'a mut T) -> Self
    where
        V: VtableFor<T>,
    {
        Self {
            data: obj as *mut T as *mut (),
            vt: V::Storage::pack(vtable_of::<V, T>()),
            _borrow: PhantomData,
        }
    }

    pub(crate) fn from_raw_parts(data: *mut (), vt: V::Storage) -> Self {
        Self {
            data,
            vt,
            _borrow: PhantomData,
        }
    }

    /// Address of the viewed object.
    #[inline]
    pub fn data(&self) -> *const () {
        self.data as *const ()
    }

    /// Reborrow, shortening the exclusive borrow to `'b`.
    #[inline]
    pub fn reborrow<'b>(&'b mut self) -> DynRefMut<'b, V> {
        DynRefMut::from_raw_parts(self.data, self.vt)
    }

    /// Read-only view for `'b`. The reverse conversion does not exist.
    #[inline]
    pub fn as_ref<'b>(&'b self) -> DynRef<'b, V> {
        DynRef::from_raw_parts(self.data as *const (), self.vt)
    }

    /// Read-only view for the full borrow.
    #[inline]
    pub fn into_ref(self) -> DynRef<'a, V> {
        DynRef::from_raw_parts(self.data as *const (), self.vt)
    }

    /// Forget the borrow, keeping the pairing as a raw pointer handle.
    #[inline]
    pub fn as_ptr(&mut self) -> DynPtrMut<V> {
        DynPtrMut {
            data: self.data,
            vt: Some(self.vt),
        }
    }

    /// Upcast to a declared base interface. Preserves the data address.
    #[inline]
    pub fn upcast<B: Vtable>(self) -> DynRefMut<'a, B>
    where
        V: Extends<B> + Vtable<Storage = Indirect<V>>,
    {
        DynRefMut::from_raw_parts(self.data, B::Storage::pack(self.vt.as_static().as_base()))
    }

    /// Project a member view out of a composite handle.
    #[inline]
    pub fn project<U: Vtable, R>(self) -> DynRefMut<'a, U>
    where
        V: Project<U, R> + Vtable<Storage = Indirect<V>>,
    {
        DynRefMut::from_raw_parts(self.data, U::Storage::pack(self.vt.as_static().member()))
    }
}

impl<'a, V: Vtable> From<DynRefMut<'a, V>> for DynRef<'a, V> {
    fn from(r: DynRefMut<'a, V>) -> Self {
        r.into_ref()
    }
}

// SAFETY: safe constructors pair the address with the table built for the
// referent's concrete type; the exclusive borrow keeps it alive and unshared.
unsafe impl<V: Vtable> AsDyn<V> for DynRefMut<'_, V> {
    #[inline]
    fn this(&self) -> ConstThis {
        ConstThis::from_raw(self.data as *const ())
    }

    #[inline]
    fn table(&self) -> &V {
        self.vt.table()
    }
}

// SAFETY: the handle holds the only borrow of the referent, so handing out
// its address through `&mut self` is exclusive for the call.
unsafe impl<V: Vtable> AsDynMut<V> for DynRefMut<'_, V> {
    #[inline]
    fn this_mut(&mut self) -> MutThis {
        MutThis::from_raw(self.data)
    }
}

// ---------------------------------------------------------------------------
// Pointer handles
// ---------------------------------------------------------------------------

/// Nullable read-only pointer handle.
///
/// A plain value with no lifetime: creating and copying one is always safe,
/// and dereferencing a null or dangling handle is the caller's unchecked
/// precondition violation, not a reported failure.
pub struct DynPtr<V: Vtable> {
    data: *const (),
    vt: Option<V::Storage>,
}

impl<V: Vtable> DynPtr<V> {
    /// The null handle: no data, no table.
    #[inline]
    pub fn null() -> Self {
        Self {
            data: ptr::null(),
            vt: None,
        }
    }

    /// Handle viewing `*obj` through interface `V`; null if `obj` is null.
    pub fn new<T: 'static>(obj: *const T) -> Self
    where
        V: VtableFor<T>,
    {
        if obj.is_null() {
            return Self::null();
        }
        Self {
            data: obj as *const (),
            vt: Some(V::Storage::pack(vtable_of::<V, T>())),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Address of the viewed object (null for the null handle).
    #[inline]
    pub fn data(&self) -> *const () {
        self.data
    }

    /// Upgrade to a reference handle.
    ///
    /// # Safety
    /// - The handle must be non-null
    /// - The referent must be a live object of the concrete type the table
    ///   was built for, and stay live for the whole of `'a`
    /// - No exclusive reference to it may exist during `'a`
    #[inline]
    pub unsafe fn as_dyn_ref<'a>(&self) -> DynRef<'a, V> {
        debug_assert!(!self.is_null(), "dereferenced a null DynPtr");
        // SAFETY: non-null handles always carry a table.
        DynRef::from_raw_parts(self.data, unsafe { self.vt.unwrap_unchecked() })
    }

    /// Upcast to a declared base interface. Null stays null.
    #[inline]
    pub fn upcast<B: Vtable>(&self) -> DynPtr<B>
    where
        V: Extends<B> + Vtable<Storage = Indirect<V>>,
    {
        match self.vt {
            Some(vt) => DynPtr {
                data: self.data,
                vt: Some(B::Storage::pack(vt.as_static().as_base())),
            },
            None => DynPtr::null(),
        }
    }

    /// Project a member view out of a composite handle. Null stays null.
    #[inline]
    pub fn project<U: Vtable, R>(&self) -> DynPtr<U>
    where
        V: Project<U, R> + Vtable<Storage = Indirect<V>>,
    {
        match self.vt {
            Some(vt) => DynPtr {
                data: self.data,
                vt: Some(U::Storage::pack(vt.as_static().member())),
            },
            None => DynPtr::null(),
        }
    }
}

impl<V: Vtable> Default for DynPtr<V> {
    fn default() -> Self {
        Self::null()
    }
}

impl<V: Vtable> Clone for DynPtr<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: Vtable> Copy for DynPtr<V> {}

// Comparisons and formatting look at the data address only, never at table
// contents.
impl<V: Vtable> std::fmt::Debug for DynPtr<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DynPtr").field(&self.data).finish()
    }
}

impl<V: Vtable> PartialEq for DynPtr<V> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.data, other.data)
    }
}

impl<V: Vtable> Eq for DynPtr<V> {}

impl<V: Vtable> PartialOrd for DynPtr<V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<V: Vtable> Ord for DynPtr<V> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.data as usize).cmp(&(other.data as usize))
    }
}

impl<V: Vtable> Hash for DynPtr<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.hash(state);
    }
}

impl<'a, V: Vtable> From<DynRef<'a, V>> for DynPtr<V> {
    fn from(r: DynRef<'a, V>) -> Self {
        r.as_ptr()
    }
}

/// Nullable mutable pointer handle.
///
/// Same contract as [`DynPtr`]; in addition, the caller is responsible for
/// not deriving overlapping exclusive access from copies of the handle.
pub struct DynPtrMut<V: Vtable> {
    data: *mut (),
    vt: Option<V::Storage>,
}

impl<V: Vtable> DynPtrMut<V> {
    /// The null handle: no data, no table.
    #[inline]
    pub fn null() -> Self {
        Self {
            data: ptr::null_mut(),
            vt: None,
        }
    }

    /// Handle viewing `*obj` mutably through interface `V`; null if `obj`
    /// is null.
    pub fn new<T: 'static>(obj: *mut T) -> Self
    where
        V: VtableFor<T>,
    {
        if obj.is_null() {
            return Self::null();
        }
        Self {
            data: obj as *mut (),
            vt: Some(V::Storage::pack(vtable_of::<V, T>())),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Address of the viewed object (null for the null handle).
    #[inline]
    pub fn data(&self) -> *const () {
        self.data as *const ()
    }

    /// Give up exclusivity. The reverse conversion does not exist.
    #[inline]
    pub fn as_const(&self) -> DynPtr<V> {
        DynPtr {
            data: self.data as *const (),
            vt: self.vt,
        }
    }

    /// Upgrade to a mutable reference handle.
    ///
    /// # Safety
    /// - The handle must be non-null
    /// - The referent must be a live object of the concrete type the table
    ///   was built for, and stay live for the whole of `'a`
    /// - No other reference to it may exist during `'a`
    #[inline]
    pub unsafe fn as_dyn_mut<'a>(&self) -> DynRefMut<'a, V> {
        debug_assert!(!self.is_null(), "dereferenced a null DynPtrMut");
        // SAFETY: non-null handles always carry a table.
        DynRefMut::from_raw_parts(self.data, unsafe { self.vt.unwrap_unchecked() })
    }

    /// Upcast to a declared base interface. Null stays null.
    #[inline]
    pub fn upcast<B: Vtable>(&self) -> DynPtrMut<B>
    where
        V: Extends<B> + Vtable<Storage = Indirect<V>>,
    {
        match self.vt {
            Some(vt) => DynPtrMut {
                data: self.data,
                vt: Some(B::Storage::pack(vt.as_static().as_base())),
            },
            None => DynPtrMut::null(),
        }
    }

    /// Project a member view out of a composite handle. Null stays null.
    #[inline]
    pub fn project<U: Vtable, R>(&self) -> DynPtrMut<U>
    where
        V: Project<U, R> + Vtable<Storage = Indirect<V>>,
    {
        match self.vt {
            Some(vt) => DynPtrMut {
                data: self.data,
                vt: Some(U::Storage::pack(vt.as_static().member())),
            },
            None => DynPtrMut::null(),
        }
    }
}

impl<V: Vtable> Default for DynPtrMut<V> {
    fn default() -> Self {
        Self::null()
    }
}

impl<V: Vtable> Clone for DynPtrMut<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: Vtable> Copy for DynPtrMut<V> {}

impl<V: Vtable> std::fmt::Debug for DynPtrMut<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DynPtrMut").field(&self.data).finish()
    }
}

impl<V: Vtable> PartialEq for DynPtrMut<V> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.data, other.data)
    }
}

impl<V: Vtable> Eq for DynPtrMut<V> {}

impl<V: Vtable> PartialOrd for DynPtrMut<V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<V: Vtable> Ord for DynPtrMut<V> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.data as usize).cmp(&(other.data as usize))
    }
}

impl<V: Vtable> Hash for DynPtrMut<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.data as *const ()).hash(state);
    }
}

impl<V: Vtable> From<DynPtrMut<V>> for DynPtr<V> {
    fn from(p: DynPtrMut<V>) -> Self {
        p.as_const()
    }
}

impl<'a, V: Vtable> From<DynRefMut<'a, V>> for DynPtrMut<V> {
    fn from(mut r: DynRefMut<'a, V>) -> Self {
        r.as_ptr()
    }
}
