//! Annotation encode/decode protocol.
//!
//! Device plugins advertise which devices they injected by writing
//! namespaced key/value pairs into the container's annotation map. The key
//! identifies the plugin and allocation, the value lists the fully
//! qualified names of the injected devices.

use std::collections::BTreeMap;

use devinject_common::constants::{ANNOTATION_PREFIX, MAX_ANNOTATION_KEY_LEN};
use devinject_common::error::{DevinjectError, Result};

use crate::name;

/// Builds a unique annotation key for a device allocation by the given
/// plugin. By convention the plugin name is `vendor.device-type`; the
/// device ID distinguishes multiple allocations by one plugin.
///
/// # Errors
///
/// Fails with [`DevinjectError::MalformedKey`] if either argument is
/// empty, the key would exceed the length limit, or the name portion
/// contains invalid characters.
pub fn annotation_key(plugin: &str, device_id: &str) -> Result<String> {
    if plugin.is_empty() {
        return Err(malformed_key("empty plugin name"));
    }
    if device_id.is_empty() {
        return Err(malformed_key("empty device ID"));
    }

    let name = format!("{plugin}_{}", device_id.replace('/', "_"));

    if ANNOTATION_PREFIX.len() + name.len() > MAX_ANNOTATION_KEY_LEN {
        return Err(malformed_key(&format!(
            "plugin+deviceID {name:?} too long"
        )));
    }

    if let Some(first) = name.chars().next() {
        if !name::is_alpha_numeric(first) {
            return Err(malformed_key(&format!(
                "name {name:?}, first character '{first}' should be alphanumeric"
            )));
        }
    }
    for c in interior_chars(&name) {
        if !(name::is_alpha_numeric(c) || matches!(c, '_' | '-' | '.')) {
            return Err(malformed_key(&format!(
                "name {name:?}, invalid character '{c}'"
            )));
        }
    }
    if let Some(last) = name.chars().last() {
        if !name::is_alpha_numeric(last) {
            return Err(malformed_key(&format!(
                "name {name:?}, last character '{last}' should be alphanumeric"
            )));
        }
    }

    Ok(format!("{ANNOTATION_PREFIX}{name}"))
}

/// Builds an annotation value for the given devices: their fully
/// qualified names joined by commas.
///
/// # Errors
///
/// Fails with [`DevinjectError::MalformedDeviceName`] on the first device
/// that is not a fully qualified name.
pub fn annotation_value(devices: &[String]) -> Result<String> {
    for device in devices {
        let _ = name::parse_qualified_name(device)?;
    }
    Ok(devices.join(","))
}

/// Records a device-injection request for the given plugin allocation in
/// the annotation map.
///
/// On any failure the map is left unmodified.
///
/// # Errors
///
/// Fails with [`DevinjectError::MalformedKey`] or
/// [`DevinjectError::MalformedDeviceName`] if key or value cannot be
/// built, and with [`DevinjectError::KeyCollision`] if the key is already
/// present.
pub fn update_annotations(
    annotations: &mut BTreeMap<String, String>,
    plugin: &str,
    device_id: &str,
    devices: &[String],
) -> Result<()> {
    let key = annotation_key(plugin, device_id)?;
    if annotations.contains_key(&key) {
        return Err(DevinjectError::KeyCollision { key });
    }
    let value = annotation_value(devices)?;

    tracing::debug!(key = %key, devices = devices.len(), "recording device injection request");
    let _ = annotations.insert(key, value);
    Ok(())
}

/// Scans the annotation map for device-injection requests, collecting the
/// matching keys and the requested devices across all namespaced entries.
///
/// # Errors
///
/// Fails atomically with [`DevinjectError::MalformedDeviceName`] — no
/// partial results — if any device token in any matching entry is not a
/// fully qualified device name.
pub fn parse_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<(Vec<String>, Vec<String>)> {
    let mut keys = Vec::new();
    let mut devices = Vec::new();

    for (key, value) in annotations {
        if !key.starts_with(ANNOTATION_PREFIX) {
            continue;
        }
        for device in value.split(',') {
            if !name::is_qualified_name(device) {
                return Err(DevinjectError::MalformedDeviceName {
                    name: device.to_owned(),
                    message: "not a fully qualified device name".to_owned(),
                });
            }
            devices.push(device.to_owned());
        }
        keys.push(key.clone());
    }

    Ok((keys, devices))
}

/// Checks the syntax of every annotation key in the map at the given
/// scope (a descriptor kind or a fully qualified device name).
///
/// A key is `[prefix/]name` where the name is at most 63 characters,
/// starts and ends alphanumeric, and uses only alphanumerics and
/// `_`, `-`, `.` in between.
///
/// # Errors
///
/// Fails with [`DevinjectError::MalformedKey`] on the first invalid key.
pub fn validate_spec_annotations(
    scope: &str,
    annotations: &BTreeMap<String, String>,
) -> Result<()> {
    for key in annotations.keys() {
        let name = key.rsplit_once('/').map_or(key.as_str(), |(prefix, name)| {
            if prefix.is_empty() {
                key.as_str()
            } else {
                name
            }
        });
        if name.is_empty() || name.len() > MAX_ANNOTATION_KEY_LEN {
            return Err(malformed_key(&format!(
                "{scope}: annotation key {key:?} has invalid length"
            )));
        }
        let valid_ends = name
            .chars()
            .next()
            .is_some_and(name::is_alpha_numeric)
            && name.chars().last().is_some_and(name::is_alpha_numeric);
        if !valid_ends {
            return Err(malformed_key(&format!(
                "{scope}: annotation key {key:?} should start and end alphanumeric"
            )));
        }
        for c in interior_chars(name) {
            if !(name::is_alpha_numeric(c) || matches!(c, '_' | '-' | '.')) {
                return Err(malformed_key(&format!(
                    "{scope}: annotation key {key:?} has invalid character '{c}'"
                )));
            }
        }
    }
    Ok(())
}

fn interior_chars(name: &str) -> impl Iterator<Item = char> + '_ {
    let count = name.chars().count();
    name.chars().skip(1).take(count.saturating_sub(2))
}

fn malformed_key(message: &str) -> DevinjectError {
    DevinjectError::MalformedKey {
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn key_carries_namespace_prefix() {
        let key = annotation_key("vendor.gpu", "gpu0").expect("key");
        assert_eq!(key, format!("{ANNOTATION_PREFIX}vendor.gpu_gpu0"));
    }

    #[test]
    fn key_replaces_slashes_in_device_id() {
        let key = annotation_key("vendor.gpu", "card/0").expect("key");
        assert!(key.ends_with("vendor.gpu_card_0"));
    }

    #[test]
    fn key_rejects_empty_arguments() {
        assert!(annotation_key("", "gpu0").is_err());
        assert!(annotation_key("vendor.gpu", "").is_err());
    }

    #[test]
    fn key_rejects_overlong_name() {
        let device_id = "d".repeat(MAX_ANNOTATION_KEY_LEN);
        let err = annotation_key("plugin", &device_id).unwrap_err();
        assert!(err.to_string().contains("too long"), "got: {err}");
    }

    #[test]
    fn key_length_bound_counts_the_prefix() {
        // plugin + '_' + device_id exactly fills the budget left after
        // the prefix; one more character must fail.
        let budget = MAX_ANNOTATION_KEY_LEN - ANNOTATION_PREFIX.len();
        let plugin = "p".repeat(budget - 2);
        assert!(annotation_key(&plugin, "d").is_ok());
        assert!(annotation_key(&plugin, "dd").is_err());
    }

    #[test]
    fn key_rejects_non_alphanumeric_edges() {
        assert!(annotation_key("_vendor", "gpu0").is_err());
        assert!(annotation_key("vendor", "gpu0-").is_err());
    }

    #[test]
    fn key_rejects_invalid_interior_character() {
        let err = annotation_key("ven dor", "gpu0").unwrap_err();
        assert!(err.to_string().contains("invalid character"), "got: {err}");
    }

    #[test]
    fn value_joins_devices_with_commas() {
        let value = annotation_value(&devices(&[
            "vendor.com/gpu=gpu0",
            "vendor.com/gpu=gpu1",
        ]))
        .expect("value");
        assert_eq!(value, "vendor.com/gpu=gpu0,vendor.com/gpu=gpu1");
    }

    #[test]
    fn value_rejects_unqualified_device() {
        assert!(annotation_value(&devices(&["gpu0"])).is_err());
    }

    #[test]
    fn update_then_parse_round_trips() {
        let mut annotations = BTreeMap::new();
        update_annotations(
            &mut annotations,
            "vendor.dev",
            "id0",
            &devices(&["vendor.com/class=dev0"]),
        )
        .expect("update");

        let (keys, parsed) = parse_annotations(&annotations).expect("parse");
        assert_eq!(keys.len(), 1);
        assert_eq!(parsed, devices(&["vendor.com/class=dev0"]));
    }

    #[test]
    fn update_fails_on_key_collision_and_leaves_map_unchanged() {
        let mut annotations = BTreeMap::new();
        update_annotations(
            &mut annotations,
            "vendor.dev",
            "id0",
            &devices(&["vendor.com/class=dev0"]),
        )
        .expect("first update");
        let before = annotations.clone();

        let err = update_annotations(
            &mut annotations,
            "vendor.dev",
            "id0",
            &devices(&["vendor.com/class=dev1"]),
        )
        .unwrap_err();
        assert!(matches!(err, DevinjectError::KeyCollision { .. }));
        assert_eq!(annotations, before);
    }

    #[test]
    fn update_with_bad_device_leaves_map_unchanged() {
        let mut annotations = BTreeMap::new();
        let err = update_annotations(
            &mut annotations,
            "vendor.dev",
            "id0",
            &devices(&["not-qualified"]),
        )
        .unwrap_err();
        assert!(matches!(err, DevinjectError::MalformedDeviceName { .. }));
        assert!(annotations.is_empty());
    }

    #[test]
    fn parse_skips_foreign_keys() {
        let mut annotations = BTreeMap::new();
        let _ = annotations.insert("other.io/key".to_owned(), "whatever".to_owned());
        update_annotations(
            &mut annotations,
            "vendor.dev",
            "id0",
            &devices(&["vendor.com/class=dev0"]),
        )
        .expect("update");

        let (keys, parsed) = parse_annotations(&annotations).expect("parse");
        assert_eq!(keys.len(), 1);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn parse_fails_atomically_on_any_invalid_token() {
        let mut annotations = BTreeMap::new();
        update_annotations(
            &mut annotations,
            "vendor.dev",
            "id0",
            &devices(&["vendor.com/class=dev0"]),
        )
        .expect("update");
        let _ = annotations.insert(
            format!("{ANNOTATION_PREFIX}vendor.dev_id1"),
            "vendor.com/class=dev1,bogus".to_owned(),
        );

        assert!(parse_annotations(&annotations).is_err());
    }

    #[test]
    fn spec_annotation_keys_validate() {
        let mut annotations = BTreeMap::new();
        let _ = annotations.insert("vendor.com/note".to_owned(), "x".to_owned());
        let _ = annotations.insert("plain-key".to_owned(), "y".to_owned());
        assert!(validate_spec_annotations("vendor.com/gpu", &annotations).is_ok());

        let _ = annotations.insert("vendor.com/bad key".to_owned(), "z".to_owned());
        let err = validate_spec_annotations("vendor.com/gpu", &annotations).unwrap_err();
        assert!(matches!(err, DevinjectError::MalformedKey { .. }));
    }
}
