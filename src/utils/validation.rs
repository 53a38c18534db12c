//! Input validation primitives.

/// Predicate form used by required-value checks.
pub fn is_non_blank(value: &str) -> bool {
    !value.trim().is_empty()
}
