//! Storage-layout transparency: inline and indirect tables behave
//! identically through every handle, and handles stay two pointers wide
//! either way.

use polyref::proc::interface;
use polyref::{AsDyn, DynPtr, DynRef, Indirect, Inline, Vtable};

/// One operation: the table fits in a pointer and embeds into handles.
#[interface]
pub trait Brief {
    fn get(&self) -> i32;
}

/// Three operations: handles carry a pointer to the table singleton.
#[interface]
pub trait Verbose {
    fn get(&self) -> i32;
    fn doubled(&self) -> i32;
    fn described(&self) -> String;
}

struct Cell(i32);

impl Brief for Cell {
    fn get(&self) -> i32 {
        self.0
    }
}

impl Verbose for Cell {
    fn get(&self) -> i32 {
        self.0
    }

    fn doubled(&self) -> i32 {
        self.0 * 2
    }

    fn described(&self) -> String {
        format!("cell {}", self.0)
    }
}

fn assert_inline<V: Vtable<Storage = Inline<V>>>() {}
fn assert_indirect<V: Vtable<Storage = Indirect<V>>>() {}

#[test]
fn test_storage_selection() {
    assert_inline::<BriefVt>();
    assert_indirect::<VerboseVt>();
}

#[test]
fn test_handles_are_two_pointers_either_way() {
    let word = std::mem::size_of::<usize>();
    assert_eq!(std::mem::size_of::<DynRef<'_, BriefVt>>(), 2 * word);
    assert_eq!(std::mem::size_of::<DynRef<'_, VerboseVt>>(), 2 * word);
}

#[test]
fn test_dispatch_is_layout_independent() {
    let cell = Cell(21);
    let brief = DynRef::<BriefVt>::new(&cell);
    let verbose = DynRef::<VerboseVt>::new(&cell);

    assert_eq!(BriefExt::get(&brief), 21);
    assert_eq!(VerboseExt::get(&verbose), 21);
    assert_eq!(verbose.doubled(), 42);
    assert_eq!(verbose.described(), "cell 21");
}

#[test]
fn test_inline_copies_are_slot_identical() {
    // An embedded table is copied out of the singleton, so every handle of
    // the pair carries the same slot values.
    let a = Cell(1);
    let b = Cell(2);
    let ha = DynRef::<BriefVt>::new(&a);
    let hb = DynRef::<BriefVt>::new(&b);
    assert_eq!(ha.table().get as usize, hb.table().get as usize);
}

#[test]
fn test_indirect_handles_share_one_table() {
    let a = Cell(1);
    let b = Cell(2);
    let ha = DynRef::<VerboseVt>::new(&a);
    let hb = DynRef::<VerboseVt>::new(&b);
    assert!(std::ptr::eq(ha.table(), hb.table()));
}

#[test]
fn test_pointer_handles_match_ref_width() {
    let word = std::mem::size_of::<usize>();
    // Nullability rides on the data pointer; the table side uses the niche.
    assert!(std::mem::size_of::<DynPtr<VerboseVt>>() <= 3 * word);
    let p = DynPtr::<BriefVt>::null();
    assert!(p.is_null());
}
