//! Container edit primitives and their merge semantics.
//!
//! An [`EditSet`] is a pure value: the bundle of environment variables,
//! device nodes, hooks, mounts, resource-control configuration, and
//! supplementary GIDs a device needs injected into a container. Edit sets
//! from several devices are merged by concatenation and consumed exactly
//! once by the apply engine.

use serde::{Deserialize, Serialize};

/// An ordered collection of edits to apply to a container spec.
///
/// Edits can be specific to a single device, or they can belong to the
/// descriptor as a whole, in which case they accompany every device
/// injected from that descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSet {
    /// Environment entries of the form `KEY=VALUE`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Device nodes to create inside the container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_nodes: Vec<DeviceNode>,
    /// Lifecycle hooks to register.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<Hook>,
    /// Filesystem mounts to add.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,
    /// Resource-control block, replacing any block already on the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_control: Option<ResourceControl>,
    /// Supplementary group IDs to add to the container process.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_gids: Vec<u32>,
}

impl EditSet {
    /// Returns true if this edit set carries no edits at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.env.is_empty()
            && self.device_nodes.is_empty()
            && self.hooks.is_empty()
            && self.mounts.is_empty()
            && self.resource_control.is_none()
            && self.additional_gids.is_empty()
    }

    /// Appends the edits of `other` onto this edit set.
    ///
    /// List-valued fields concatenate in call order; the resource-control
    /// block uses last-non-none-wins. Call order across devices determines
    /// both idempotent-replace winners and mount ordering tie-breaks at
    /// apply time, so callers must merge in precedence order.
    pub fn append(&mut self, other: &Self) {
        self.env.extend(other.env.iter().cloned());
        self.device_nodes.extend(other.device_nodes.iter().cloned());
        self.hooks.extend(other.hooks.iter().cloned());
        self.mounts.extend(other.mounts.iter().cloned());
        if let Some(rc) = &other.resource_control {
            self.resource_control = Some(rc.clone());
        }
        self.additional_gids.extend(other.additional_gids.iter().copied());
    }
}

/// A device node to create inside the container.
///
/// Fields left unset by the producer (type, major/minor, file mode) are
/// derived by inspecting `host_path` when the edits are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceNode {
    /// Path of the node inside the container.
    pub path: String,
    /// Path of the node on the host; defaults to `path` when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_path: String,
    /// Device type: `b` (block), `c` (char), `u` (unbuffered char),
    /// `p` (fifo), or empty for unset.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub node_type: String,
    /// Major number; 0 means unset.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub major: i64,
    /// Minor number; 0 means unset.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub minor: i64,
    /// File mode bits for the created node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<u32>,
    /// Cgroup access permissions, a subset of `rwm`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub permissions: String,
    /// Owning user ID of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    /// Owning group ID of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

/// A filesystem mount to add to the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    /// Source path on the host.
    pub host_path: String,
    /// Destination path inside the container.
    pub container_path: String,
    /// Mount type, e.g. `bind`.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub mount_type: String,
    /// Mount options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// A lifecycle hook to register on the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    /// Lifecycle point, one of the six recognized hook names.
    pub hook_name: String,
    /// Path of the hook executable.
    pub path: String,
    /// Arguments passed to the hook.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment entries of the form `KEY=VALUE` for the hook process.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
}

/// Resource-control configuration carried by an edit set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceControl {
    /// Class-of-service identifier; must be a valid single path component.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub clos_id: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_edit_set_is_empty() {
        assert!(EditSet::default().is_empty());
    }

    #[test]
    fn edit_set_with_only_gids_is_not_empty() {
        let edits = EditSet {
            additional_gids: vec![5],
            ..EditSet::default()
        };
        assert!(!edits.is_empty());
    }

    #[test]
    fn append_concatenates_in_call_order() {
        let mut merged = EditSet {
            env: vec!["A=1".into()],
            ..EditSet::default()
        };
        merged.append(&EditSet {
            env: vec!["B=2".into()],
            additional_gids: vec![7],
            ..EditSet::default()
        });
        merged.append(&EditSet {
            env: vec!["C=3".into()],
            ..EditSet::default()
        });
        assert_eq!(merged.env, vec!["A=1", "B=2", "C=3"]);
        assert_eq!(merged.additional_gids, vec![7]);
    }

    #[test]
    fn append_empty_is_a_no_op() {
        let mut merged = EditSet {
            env: vec!["A=1".into()],
            ..EditSet::default()
        };
        let before = merged.clone();
        merged.append(&EditSet::default());
        assert_eq!(merged, before);
    }

    #[test]
    fn append_resource_control_last_non_none_wins() {
        let mut merged = EditSet {
            resource_control: Some(ResourceControl {
                clos_id: "first".into(),
            }),
            ..EditSet::default()
        };
        merged.append(&EditSet {
            resource_control: Some(ResourceControl {
                clos_id: "second".into(),
            }),
            ..EditSet::default()
        });
        merged.append(&EditSet::default());
        assert_eq!(
            merged.resource_control,
            Some(ResourceControl {
                clos_id: "second".into()
            })
        );
    }

    #[test]
    fn device_node_serde_round_trip() {
        let node = DeviceNode {
            path: "/dev/gpu0".into(),
            node_type: "c".into(),
            major: 226,
            minor: 0,
            permissions: "rw".into(),
            ..DeviceNode::default()
        };
        let json = serde_json::to_string(&node).expect("serialize");
        assert!(json.contains("\"type\":\"c\""));
        let back: DeviceNode = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, node);
    }
}
