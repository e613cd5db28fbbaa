#![warn(rust_2018_idioms)]

//! Structural validation of OpenType layout tables.
//!
//! Fonts are untrusted input: a single malformed offset or count inside
//! the BASE, GDEF, GPOS, GSUB, JSTF or MATH tables can send a shaping or
//! positioning engine reading out of bounds. This crate walks every
//! offset-addressed sub-structure reachable from each table's root,
//! confirms that every read stays inside the table, that every
//! count-driven array is fully present, and that every glyph, lookup,
//! feature and class reference stays within the bounds established by its
//! sibling tables. No table semantics are interpreted; the only product
//! is a pass/fail verdict and, on success, the raw table bytes for
//! consumers that may then skip per-access checks.

pub mod base;
/// Reading and writing of binary data.
pub mod binary;
pub mod error;
pub mod gdef;
pub mod gpos;
pub mod gsub;
pub mod jstf;
pub mod layout;
pub mod math;
pub mod size;
pub mod tag;
pub mod validate;

pub use crate::error::{ValidateError, ValidationError};
pub use crate::layout::ValidationLevel;
pub use crate::validate::{validate, FontSource, TableFlags, ValidatedTables};
