//! Compile-fail tests for the #[interface] macro
//!
//! These tests verify that malformed interface declarations are rejected
//! with the macro's own diagnostics.

#[test]
fn ui() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/ui/*.rs");
}
