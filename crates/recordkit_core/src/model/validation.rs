//! Declarative field constraints checked before any store write.
//!
//! # Responsibility
//! - Let each record kind declare `field -> {required, min, max}` rules.
//! - Check them with one generic validator and aggregate every violation.
//!
//! # Invariants
//! - Lengths are counted in Unicode scalar values, not bytes.
//! - A missing required field is reported once; its length rules are skipped.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Constraint row for one textual field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldConstraint {
    pub field: &'static str,
    pub required: bool,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

impl FieldConstraint {
    pub const fn required(field: &'static str) -> Self {
        Self {
            field,
            required: true,
            min_len: None,
            max_len: None,
        }
    }

    pub const fn optional(field: &'static str) -> Self {
        Self {
            field,
            required: false,
            min_len: None,
            max_len: None,
        }
    }

    pub const fn min_len(mut self, min: usize) -> Self {
        self.min_len = Some(min);
        self
    }

    pub const fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }
}

/// Capability of records that can be checked by [`validate`].
pub trait Validatable {
    /// Human-readable kind name used in error messages.
    const KIND: &'static str;

    fn constraints() -> &'static [FieldConstraint];

    /// Returns the text of `field`, or `None` when the field is unknown.
    fn field_text(&self, field: &str) -> Option<&str>;
}

/// One failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Missing {
        field: &'static str,
    },
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}

impl Violation {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field } | Self::TooShort { field, .. } | Self::TooLong { field, .. } => {
                *field
            }
        }
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "{field}: non zero value required"),
            Self::TooShort { field, min, actual } => {
                write!(f, "{field}: length {actual} is shorter than minimum {min}")
            }
            Self::TooLong { field, max, actual } => {
                write!(f, "{field}: length {actual} is longer than maximum {max}")
            }
        }
    }
}

/// Aggregated validation failure for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: &'static str,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Returns the first violation reported for `field`.
    pub fn violation_for(&self, field: &str) -> Option<&Violation> {
        self.violations
            .iter()
            .find(|violation| violation.field() == field)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "validate {} error: ", self.kind)?;
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl Error for ValidationError {}

/// Checks `record` against its kind's constraint table.
pub fn validate<V: Validatable>(record: &V) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    for constraint in V::constraints() {
        let text = record.field_text(constraint.field).unwrap_or("");
        if text.trim().is_empty() {
            if constraint.required {
                violations.push(Violation::Missing {
                    field: constraint.field,
                });
            }
            continue;
        }

        let actual = text.chars().count();
        if let Some(min) = constraint.min_len {
            if actual < min {
                violations.push(Violation::TooShort {
                    field: constraint.field,
                    min,
                    actual,
                });
            }
        }
        if let Some(max) = constraint.max_len {
            if actual > max {
                violations.push(Violation::TooLong {
                    field: constraint.field,
                    max,
                    actual,
                });
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            kind: V::KIND,
            violations,
        })
    }
}
