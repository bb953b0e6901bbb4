//! Input checks shared by the public forms and management editors.
//!
//! Each returns the cleaned value or a message that the calling service
//! wraps in its own validation error.

/// Trimmed non-empty value
pub fn required(value: &str, field: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} is required", field));
    }
    Ok(value.to_string())
}

/// Trimmed value, with blank treated as absent
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lowercased address with a local part and a dotted domain
pub fn email(value: &str) -> Result<String, String> {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return Err("Email is required".to_string());
    }
    match value.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.') =>
        {
            Ok(value)
        }
        _ => Err("Invalid email format".to_string()),
    }
}

/// Three-letter currency code, uppercased
pub fn currency(value: &str) -> Result<String, String> {
    let value = value.trim().to_uppercase();
    if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("Currency must be a three-letter code".to_string());
    }
    Ok(value)
}
