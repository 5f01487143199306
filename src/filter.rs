//! Routine relevance filtering
//!
//! Decides which discovered routines are worth an entry hook. Startup
//! glue, PLT trampolines and double-underscore internals are noise for a
//! "which functions actually ran" question, so they are never instrumented.

/// Routine names that are never instrumented
pub const EXCLUDED_NAMES: [&str; 4] = ["main", "_init", "_start", ".plt.got"];

/// Suffix carried by Procedure Linkage Table stubs (e.g. `printf@plt`)
pub const PLT_SUFFIX: &str = "@plt";

/// Prefix of compiler-generated and libc-internal symbols
pub const INTERNAL_PREFIX: &str = "__";

/// Check if a routine should be instrumented
///
/// Total over all strings: the empty name is neither excluded, a PLT
/// stub, nor internal, so it is relevant.
pub fn is_relevant(function_name: &str) -> bool {
    if EXCLUDED_NAMES.contains(&function_name) {
        return false;
    }

    // PLT stubs and internal functions (usually prefixed with __)
    if function_name.ends_with(PLT_SUFFIX) || function_name.starts_with(INTERNAL_PREFIX) {
        return false;
    }

    true
}
