//! The top-level device-injection descriptor document.

use std::collections::BTreeMap;

use devinject_common::constants::CURRENT_VERSION;
use serde::{Deserialize, Serialize};

use crate::edits::EditSet;

/// A device-injection descriptor: the document a device plugin authors to
/// declare a vendor/class of injectable devices and the container edits
/// each of them requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Descriptor document version.
    pub version: String,
    /// Vendor/class qualifier, e.g. `vendor.com/gpu`.
    pub kind: String,
    /// Free-form annotations at descriptor scope.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Edits applied alongside every device injected from this descriptor.
    #[serde(default, skip_serializing_if = "EditSet::is_empty")]
    pub container_edits: EditSet,
    /// The injectable devices, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<Device>,
}

impl Descriptor {
    /// Creates an empty descriptor of the given kind at the current
    /// document version.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            version: CURRENT_VERSION.to_owned(),
            kind: kind.into(),
            ..Self::default()
        }
    }
}

/// A single injectable device within a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device name, unique within the descriptor.
    pub name: String,
    /// Free-form annotations at device scope.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Edits required by this device; must not be empty.
    #[serde(default, skip_serializing_if = "EditSet::is_empty")]
    pub container_edits: EditSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edits::Mount;

    #[test]
    fn new_descriptor_uses_current_version() {
        let desc = Descriptor::new("vendor.com/gpu");
        assert_eq!(desc.version, CURRENT_VERSION);
        assert_eq!(desc.kind, "vendor.com/gpu");
        assert!(desc.devices.is_empty());
    }

    #[test]
    fn descriptor_serde_round_trip() {
        let desc = Descriptor {
            devices: vec![Device {
                name: "gpu0".into(),
                container_edits: EditSet {
                    env: vec!["GPU=0".into()],
                    mounts: vec![Mount {
                        host_path: "/opt/gpu".into(),
                        container_path: "/opt/gpu".into(),
                        mount_type: "bind".into(),
                        options: vec!["ro".into()],
                    }],
                    ..EditSet::default()
                },
                ..Device::default()
            }],
            ..Descriptor::new("vendor.com/gpu")
        };
        let json = serde_json::to_string(&desc).expect("serialize");
        let back: Descriptor = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, desc);
    }

    #[test]
    fn empty_fields_are_omitted_from_the_document() {
        let json = serde_json::to_string(&Descriptor::new("vendor.com/gpu")).expect("serialize");
        assert!(!json.contains("annotations"));
        assert!(!json.contains("containerEdits"));
        assert!(!json.contains("devices"));
    }
}
