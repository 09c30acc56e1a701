//! Response text classification.
//!
//! The execution server answers 2xx even when a task inside the run fails,
//! reporting the failure only in the text it returns. A response containing
//! any of [`FAILURE_INDICATORS`] (case-insensitively) is treated as a failed
//! run. This misclassifies benign output that mentions e.g. "error"; the
//! server offers no structured status to use instead.

/// Substrings that mark a response as a failed run. Matched against the
/// lowercased response text.
pub const FAILURE_INDICATORS: &[&str] = &["❌", "exception", "error", "failed"];

/// Whether `body` reports a failed run.
pub fn looks_like_failure(body: &str) -> bool {
    let lowered = body.to_lowercase();
    FAILURE_INDICATORS.iter().any(|needle| lowered.contains(needle))
}
