//! Qualified device name grammar.
//!
//! A fully qualified device name has the form `<vendor>/<class>=<device>`,
//! for example `vendor.com/gpu=gpu0`. The vendor is typically a domain
//! name, the class a device category, and the device a plugin-chosen
//! identifier.

use devinject_common::error::{DevinjectError, Result};

/// Returns the fully qualified name built from the given parts.
#[must_use]
pub fn qualified_name(vendor: &str, class: &str, device: &str) -> String {
    format!("{vendor}/{class}={device}")
}

/// Returns true if the given name is a valid fully qualified device name.
#[must_use]
pub fn is_qualified_name(device: &str) -> bool {
    parse_qualified_name(device).is_ok()
}

/// Parses a fully qualified device name into vendor, class, and device
/// parts.
///
/// # Errors
///
/// Fails if any part is missing or violates its grammar.
pub fn parse_qualified_name(device: &str) -> Result<(&str, &str, &str)> {
    let (vendor, class, name) = parse_device(device);

    if vendor.is_empty() {
        return Err(malformed(device, "unqualified name, missing vendor"));
    }
    if class.is_empty() {
        return Err(malformed(device, "unqualified name, missing class"));
    }
    if name.is_empty() {
        return Err(malformed(device, "unqualified name, missing device"));
    }

    validate_vendor_name(vendor).map_err(|e| malformed(device, &e.to_string()))?;
    validate_class_name(class).map_err(|e| malformed(device, &e.to_string()))?;
    validate_device_name(name)?;

    Ok((vendor, class, name))
}

/// Splits a device name into vendor, class, and device parts without
/// validating them. Missing parts are returned as empty strings.
#[must_use]
pub fn parse_device(device: &str) -> (&str, &str, &str) {
    if device.is_empty() || device.starts_with('/') {
        return ("", "", device);
    }
    let Some((qualifier, name)) = device.split_once('=') else {
        return ("", "", device);
    };
    if qualifier.is_empty() || name.is_empty() {
        return ("", "", device);
    }
    let (vendor, class) = parse_qualifier(qualifier);
    if vendor.is_empty() {
        return ("", "", device);
    }
    (vendor, class, name)
}

/// Splits a `vendor/class` qualifier into its parts. If the argument is
/// not a valid qualifier the vendor is returned empty and the class holds
/// the whole input.
#[must_use]
pub fn parse_qualifier(kind: &str) -> (&str, &str) {
    match kind.split_once('/') {
        Some((vendor, class))
            if !vendor.is_empty() && !class.is_empty() && !class.contains('/') =>
        {
            (vendor, class)
        }
        _ => ("", kind),
    }
}

/// Validates a vendor name: starts with a letter, ends alphanumeric,
/// interior characters alphanumeric or `-`, `_`, `.`.
///
/// # Errors
///
/// Fails with a description of the first violation.
pub fn validate_vendor_name(vendor: &str) -> Result<()> {
    validate_vendor_or_class_name(vendor)
}

/// Validates a class name with the same grammar as vendor names.
///
/// # Errors
///
/// Fails with a description of the first violation.
pub fn validate_class_name(class: &str) -> Result<()> {
    validate_vendor_or_class_name(class)
}

/// Validates a bare device name: starts and ends alphanumeric, interior
/// characters alphanumeric or `-`, `_`, `.`, `:`.
///
/// # Errors
///
/// Fails with [`DevinjectError::MalformedDeviceName`] on the first
/// violation.
pub fn validate_device_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(malformed(name, "empty device name"));
    }
    if !name.chars().next().is_some_and(is_alpha_numeric) {
        return Err(malformed(name, "should start with a letter or digit"));
    }
    for c in name[1..].chars().take(name.chars().count().saturating_sub(2)) {
        if !(is_alpha_numeric(c) || matches!(c, '-' | '_' | '.' | ':')) {
            return Err(malformed(name, &format!("invalid character '{c}'")));
        }
    }
    if let Some(last) = name.chars().last() {
        if !is_alpha_numeric(last) {
            return Err(malformed(name, "should end with a letter or digit"));
        }
    }
    Ok(())
}

fn validate_vendor_or_class_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(malformed(name, "empty name"));
    }
    if !name.chars().next().is_some_and(is_letter) {
        return Err(malformed(name, "should start with a letter"));
    }
    for c in name[1..].chars().take(name.chars().count().saturating_sub(2)) {
        if !(is_alpha_numeric(c) || matches!(c, '-' | '_' | '.')) {
            return Err(malformed(name, &format!("invalid character '{c}'")));
        }
    }
    if let Some(last) = name.chars().last() {
        if !is_alpha_numeric(last) {
            return Err(malformed(name, "should end with a letter or digit"));
        }
    }
    Ok(())
}

/// Returns true for ASCII letters.
#[must_use]
pub const fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// Returns true for ASCII letters and digits.
#[must_use]
pub const fn is_alpha_numeric(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

fn malformed(name: &str, message: &str) -> DevinjectError {
    DevinjectError::MalformedDeviceName {
        name: name.to_owned(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_qualified_name() {
        let (vendor, class, device) =
            parse_qualified_name("vendor.com/gpu=gpu0").expect("should parse");
        assert_eq!(vendor, "vendor.com");
        assert_eq!(class, "gpu");
        assert_eq!(device, "gpu0");
    }

    #[test]
    fn parse_device_name_with_colon() {
        assert!(is_qualified_name("vendor.com/net=eth0:1"));
    }

    #[test]
    fn parse_unqualified_name_fails() {
        assert!(parse_qualified_name("gpu0").is_err());
        assert!(parse_qualified_name("/dev/gpu0").is_err());
        assert!(parse_qualified_name("vendor.com/gpu").is_err());
        assert!(parse_qualified_name("=gpu0").is_err());
        assert!(parse_qualified_name("").is_err());
    }

    #[test]
    fn parse_qualifier_splits_vendor_and_class() {
        assert_eq!(parse_qualifier("vendor.com/gpu"), ("vendor.com", "gpu"));
        assert_eq!(parse_qualifier("no-separator"), ("", "no-separator"));
        assert_eq!(parse_qualifier("a/b/c"), ("", "a/b/c"));
    }

    #[test]
    fn vendor_name_must_start_with_letter() {
        assert!(validate_vendor_name("vendor.com").is_ok());
        let err = validate_vendor_name("0vendor").unwrap_err();
        assert!(err.to_string().contains("start with a letter"), "got: {err}");
    }

    #[test]
    fn vendor_name_must_end_alphanumeric() {
        let err = validate_vendor_name("vendor.").unwrap_err();
        assert!(err.to_string().contains("end with a letter"), "got: {err}");
    }

    #[test]
    fn class_name_rejects_invalid_interior_character() {
        assert!(validate_class_name("net-device").is_ok());
        assert!(validate_class_name("net device").is_err());
    }

    #[test]
    fn device_name_may_start_with_digit() {
        assert!(validate_device_name("0").is_ok());
        assert!(validate_device_name("0gpu").is_ok());
        assert!(validate_device_name("_gpu").is_err());
    }

    #[test]
    fn qualified_name_round_trips_through_parts() {
        let full = qualified_name("vendor.com", "gpu", "gpu0");
        assert_eq!(full, "vendor.com/gpu=gpu0");
        assert!(is_qualified_name(&full));
    }
}
