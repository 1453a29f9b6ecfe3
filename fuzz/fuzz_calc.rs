//! Fuzz target for the arithmetic evaluator.
//!
//! Run with: cargo +nightly fuzz run fuzz_calc
//!
//! Any input must evaluate to a finite number or a `CalcError`; deep nesting
//! must be rejected rather than overflow the stack.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(value) = covermate_core::calc::evaluate(s)
    {
        assert!(value.is_finite(), "non-finite result for {s:?}");
    }
});
