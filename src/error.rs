//! Error types

use crate::binary::read::ReadEof;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors raised while validating the binary data of one table.
///
/// Any error aborts validation of the current table immediately; there is
/// no partial result.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum ValidateError {
    /// A read would cross the end of the table's byte range.
    TooShort,
    /// An enumerated format or type tag has an unrecognized value.
    InvalidFormat,
    /// A field violates a structural invariant: bad ordering, overlapping
    /// ranges, a count mismatch, or an index out of bound.
    InvalidData,
    /// An optional sub-table offset too small to hold its target, raised
    /// under paranoid validation only.
    InvalidOffset,
}

impl From<ReadEof> for ValidateError {
    fn from(_error: ReadEof) -> Self {
        ValidateError::TooShort
    }
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidateError::TooShort => write!(f, "table data ended unexpectedly"),
            ValidateError::InvalidFormat => write!(f, "unrecognized format or type value"),
            ValidateError::InvalidData => write!(f, "invalid value or index"),
            ValidateError::InvalidOffset => write!(f, "invalid sub-table offset"),
        }
    }
}

impl std::error::Error for ValidateError {}

/// Error returned from [`crate::validate::validate`]: the table that failed
/// and the kind of failure.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ValidationError {
    /// Tag of the table that failed validation.
    pub table: u32,
    pub error: ValidateError,
}

impl ValidationError {
    pub fn new(table: u32, error: ValidateError) -> ValidationError {
        ValidationError { table, error }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' table failed validation: {}",
            DisplayTag(self.table),
            self.error
        )
    }
}

impl std::error::Error for ValidationError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
        }
    }
}

impl std::error::Error for WriteError {}
