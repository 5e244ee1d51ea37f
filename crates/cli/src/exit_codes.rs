//! CLI Exit Code Registry
//!
//! Single source of truth for `larder` exit codes. Scripts and CI jobs gate
//! on these, so they are part of the command-line contract.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                 |
//! |------|---------------------------------------------------------|
//! | 0    | Success (findings are reported but do not fail the run) |
//! | 1    | Findings present and `--strict` was given               |
//! | 2    | CLI usage error (bad args, no input paths)              |
//! | 3    | Invalid configuration                                   |
//! | 4    | Runtime error (IO, unreadable CSV, missing column)      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant with a doc comment saying what triggers it
//! 2. Update the table above
//! 3. Wire it into the command's error mapping

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - the audit ran to completion.
pub const EXIT_SUCCESS: u8 = 0;

/// Findings present under `--strict`: flagged items, duplicate clusters,
/// unresolved ingredients, incompatible units, cost outliers or recipes
/// whose cost could not be determined.
pub const EXIT_FINDINGS: u8 = 1;

/// Usage error - bad arguments, or no items/recipes path in flags or config.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Audit (3-4)
// =============================================================================

/// Config file could not be parsed or failed validation.
/// Raised before any CSV row is read.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Runtime failure: unreadable file, malformed CSV, missing mapped column,
/// report or JSON write failure.
pub const EXIT_RUNTIME: u8 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_FINDINGS, EXIT_USAGE, EXIT_INVALID_CONFIG, EXIT_RUNTIME];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
