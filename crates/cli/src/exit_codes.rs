//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success, no discrepancies                |
//! | 1       | Universal        | Discrepancies found                      |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 6-9     | run              | Reconciliation setup and runtime codes   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` or the relevant command

use parcelrec_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - both sources agree on every compared field.
pub const EXIT_SUCCESS: u8 = 0;

/// Records missing on a side or field mismatches were found.
/// Like `diff(1)`, exit 1 means "sources differ."
pub const EXIT_DISCREPANCIES: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (6-9)
// =============================================================================

/// Config could not be parsed or validated, or a key column is missing.
pub const EXIT_INVALID_CONFIG: u8 = 6;

/// Input could not be read or loaded, or reports could not be written.
pub const EXIT_RUNTIME: u8 = 7;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    if err.is_config_error() {
        EXIT_INVALID_CONFIG
    } else {
        EXIT_RUNTIME
    }
}
