//! Diagnostic codes with category prefixes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Errors, prefixed with `E`.
    Error,
    /// Warnings, prefixed with `W`.
    Warning,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
        }
    }
}

/// A category prefix plus a three-digit number, displayed as e.g. `E101`.
///
/// The hundreds digit groups codes by pipeline stage: 1 = graph,
/// 2 = transform, 3 = emit, 4 = cache.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

/// The codes Kiln emits.
pub mod codes {
    use super::{Category, DiagnosticCode};

    /// An invariant inside Kiln was broken.
    pub const INTERNAL_ERROR: DiagnosticCode = DiagnosticCode::new(Category::Error, 1);
    /// Configuration was rejected after loading, e.g. transform options.
    pub const INVALID_CONFIG: DiagnosticCode = DiagnosticCode::new(Category::Error, 2);
    /// A reference specifier matched no file.
    pub const UNRESOLVED_REFERENCE: DiagnosticCode = DiagnosticCode::new(Category::Error, 101);
    /// The dependency graph contains a cycle.
    pub const CYCLIC_DEPENDENCY: DiagnosticCode = DiagnosticCode::new(Category::Error, 102);
    /// A source file could not be read.
    pub const UNREADABLE_SOURCE: DiagnosticCode = DiagnosticCode::new(Category::Error, 103);
    /// A module's type could not be determined.
    pub const UNSUPPORTED_ASSET_TYPE: DiagnosticCode = DiagnosticCode::new(Category::Error, 201);
    /// A transform step failed.
    pub const TRANSFORM_STEP_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Error, 202);
    /// A module was skipped because a prerequisite failed.
    pub const PREREQUISITE_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Error, 203);
    /// Output could not be written.
    pub const EMIT_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Error, 301);
    /// A cache entry was corrupt and ignored.
    pub const CACHE_CORRUPTION: DiagnosticCode = DiagnosticCode::new(Category::Warning, 401);
    /// The cache could not be persisted.
    pub const CACHE_PERSIST_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 402);
}
