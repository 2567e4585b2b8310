//! Opaque self-handles.
//!
//! Every dispatch-table slot takes one of these as its first parameter. A
//! delegate reinterprets the handle as a reference to the concrete type the
//! table was built for; receiver-less operations take a [`ConstThis`] and
//! ignore it. The mutability grade is fixed by the slot's declaration, never
//! by how the handle is used.

/// Read-only self-handle: an opaque address granting shared access.
#[derive(Clone, Copy)]
pub struct ConstThis {
    addr: *const (),
}

impl ConstThis {
    /// Handle addressing `obj`.
    #[inline]
    pub fn new<T>(obj: &T) -> Self {
        Self {
            addr: obj as *const T as *const (),
        }
    }

    #[inline]
    pub(crate) fn from_raw(addr: *const ()) -> Self {
        Self { addr }
    }

    /// The wrapped address.
    #[inline]
    pub fn addr(self) -> *const () {
        self.addr
    }

    /// Reinterpret as a reference to `T`.
    ///
    /// # Safety
    /// - The handle must address a live `T` for the whole of `'a`
    /// - No exclusive reference to the same object may exist concurrently
    #[inline]
    pub unsafe fn get<'a, T>(self) -> &'a T {
        unsafe { &*(self.addr as *const T) }
    }
}

/// Mutable self-handle: an opaque address granting exclusive access.
#[derive(Clone, Copy)]
pub struct MutThis {
    addr: *mut (),
}

impl MutThis {
    /// Handle addressing `obj`.
    #[inline]
    pub fn new<T>(obj: &mut T) -> Self {
        Self {
            addr: obj as *mut T as *mut (),
        }
    }

    #[inline]
    pub(crate) fn from_raw(addr: *mut ()) -> Self {
        Self { addr }
    }

    /// The wrapped address.
    #[inline]
    pub fn addr(self) -> *mut () {
        self.addr
    }

    /// Give up exclusivity.
    #[inline]
    pub fn as_const(self) -> ConstThis {
        ConstThis::from_raw(self.addr as *const ())
    }

    /// Reinterpret as an exclusive reference to `T`.
    ///
    /// # Safety
    /// - The handle must address a live `T` for the whole of `'a`
    /// - No other reference to the same object may exist concurrently
    #[inline]
    pub unsafe fn get<'a, T>(self) -> &'a mut T {
        unsafe { &mut *(self.addr as *mut T) }
    }
}
