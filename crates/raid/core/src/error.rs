//! Common error infrastructure for raid-core.
//!
//! Domain errors (`LoadoutError`, `LedgerError`) live next to the operations
//! that raise them. This module provides the shared severity classification
//! so callers can pick a recovery strategy without matching every variant.

/// Severity level of an error, used for categorization and recovery strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Temporary condition; retrying the same request may succeed.
    Recoverable,

    /// Invalid input or a request against a raid that no longer accepts it.
    Validation,

    /// Unexpected state inconsistency. Indicates a bug.
    Internal,

    /// Raid record is corrupted and cannot be used.
    Fatal,
}

/// Common trait for all raid-core errors.
pub trait RaidError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static identifier for this error variant.
    ///
    /// Useful for metrics and for asserting on failures in tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
