//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3       | Universal        | I/O error reading input or writing output|
//! | 10-19   | export           | Test case export failures                |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use crate::export::ExportError;
use casegrid_engine::EngineError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// I/O error - input unreadable or output unwritable.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Export (10-19)
// =============================================================================

/// Request rejected: missing or malformed test cases, unknown format or strategy.
pub const EXIT_EXPORT_INVALID: u8 = 10;

/// No test case array could be recovered from the model response.
pub const EXIT_EXPORT_UNRECOVERABLE: u8 = 11;

/// The input held no test cases.
pub const EXIT_EXPORT_EMPTY: u8 = 12;

/// The artifact could not be produced (spreadsheet serialization).
pub const EXIT_EXPORT_RENDER: u8 = 13;

// =============================================================================
// Error mapping
// =============================================================================

/// Map an EngineError to its exit code.
pub fn engine_exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::Unrecoverable { .. } => EXIT_EXPORT_UNRECOVERABLE,
        EngineError::NoTestCases => EXIT_EXPORT_EMPTY,
    }
}

/// Map an ExportError to its exit code.
pub fn export_exit_code(err: &ExportError) -> u8 {
    match err {
        ExportError::Validation(_) => EXIT_EXPORT_INVALID,
        ExportError::Engine(e) => engine_exit_code(e),
        ExportError::Render(_) => EXIT_EXPORT_RENDER,
    }
}
