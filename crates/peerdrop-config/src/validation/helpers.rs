//! Shared validation helpers used by the section validators.

/// Push an error if `value` is outside `[min, max]`.
pub(crate) fn validate_range(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error if `value` exceeds `max`. Zero means disabled and always passes.
pub(crate) fn validate_optional_max(errors: &mut Vec<String>, name: &str, value: u64, max: u64) {
    if value > max {
        errors.push(format!("{name} = {value} exceeds maximum {max} (0 disables)"));
    }
}

/// Push an error if `value` is blank.
pub(crate) fn validate_not_empty(errors: &mut Vec<String>, name: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(format!("{name} must not be empty"));
    }
}
