//! Field tokenizing and typed conversion.

pub mod convert;
pub mod fields;
