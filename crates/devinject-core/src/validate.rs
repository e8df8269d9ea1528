//! Schema and semantic validation of descriptors and their parts.
//!
//! Every entity that can be merged or applied has a `validate` method.
//! All checks are fail-fast (first violation wins), read-only, and free
//! of side effects, so validation can run concurrently on distinct
//! inputs.

use std::collections::HashSet;

use devinject_common::constants::{HOOK_NAMES, MAX_CLOS_ID_LEN, VALID_VERSIONS};
use devinject_common::error::{DevinjectError, Result};

use crate::annotations::validate_spec_annotations;
use crate::descriptor::{Descriptor, Device};
use crate::edits::{DeviceNode, EditSet, Hook, Mount, ResourceControl};
use crate::name;

/// Validates a descriptor before it is persisted or its devices injected.
pub trait SpecValidator {
    /// Checks the descriptor for schema and semantic violations.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    fn validate_descriptor(&self, descriptor: &Descriptor) -> Result<()>;
}

/// The default validator: full schema and semantic checks as implemented
/// by [`Descriptor::validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl SpecValidator for DefaultValidator {
    fn validate_descriptor(&self, descriptor: &Descriptor) -> Result<()> {
        descriptor.validate()
    }
}

impl Descriptor {
    /// Validates the whole descriptor document.
    ///
    /// Checks the version, the `vendor/class` qualifier, annotation key
    /// syntax, the descriptor-level edit set, device name uniqueness,
    /// and every device in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        tracing::debug!(kind = %self.kind, "validating descriptor");
        validate_version(&self.version)?;

        let (vendor, class) = name::parse_qualifier(&self.kind);
        if vendor.is_empty() {
            return Err(DevinjectError::InvalidQualifier {
                kind: self.kind.clone(),
                message: "missing vendor/class separator".to_owned(),
            });
        }
        name::validate_vendor_name(vendor).map_err(|e| DevinjectError::InvalidQualifier {
            kind: self.kind.clone(),
            message: e.to_string(),
        })?;
        name::validate_class_name(class).map_err(|e| DevinjectError::InvalidQualifier {
            kind: self.kind.clone(),
            message: e.to_string(),
        })?;

        validate_spec_annotations(&self.kind, &self.annotations)?;
        self.container_edits.validate()?;

        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.name.as_str()) {
                return Err(DevinjectError::DuplicateDeviceName {
                    name: device.name.clone(),
                });
            }
            device.validate(vendor, class)?;
        }
        Ok(())
    }
}

impl Device {
    /// Validates a single device within the named vendor/class.
    ///
    /// # Errors
    ///
    /// Fails on an invalid device name, invalid annotation keys, an empty
    /// edit set, or any violation inside the edit set.
    pub fn validate(&self, vendor: &str, class: &str) -> Result<()> {
        name::validate_device_name(&self.name)?;

        let qualified = name::qualified_name(vendor, class, &self.name);
        validate_spec_annotations(&qualified, &self.annotations)?;

        if self.container_edits.is_empty() {
            return Err(DevinjectError::EmptyEditSet {
                device: self.name.clone(),
            });
        }
        self.container_edits.validate()
    }
}

impl EditSet {
    /// Validates every edit primitive in the set.
    ///
    /// An empty edit set is valid here; the non-empty requirement applies
    /// to devices only and is enforced by [`Device::validate`].
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        validate_env(&self.env)?;
        for node in &self.device_nodes {
            node.validate()?;
        }
        for hook in &self.hooks {
            hook.validate()?;
        }
        for mount in &self.mounts {
            mount.validate()?;
        }
        if let Some(rc) = &self.resource_control {
            rc.validate()?;
        }
        Ok(())
    }
}

impl DeviceNode {
    /// Validates a device node: non-empty path, recognized type, and
    /// permissions drawn from `rwm`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidPath`, `InvalidDeviceType`, or
    /// `InvalidPermissions`.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(DevinjectError::InvalidPath {
                message: "empty device path".to_owned(),
            });
        }
        if !matches!(self.node_type.as_str(), "" | "b" | "c" | "u" | "p") {
            return Err(DevinjectError::InvalidDeviceType {
                path: self.path.clone(),
                node_type: self.node_type.clone(),
            });
        }
        if self.permissions.chars().any(|c| !matches!(c, 'r' | 'w' | 'm')) {
            return Err(DevinjectError::InvalidPermissions {
                path: self.path.clone(),
                permissions: self.permissions.clone(),
            });
        }
        Ok(())
    }
}

impl Hook {
    /// Validates a hook: recognized lifecycle name, non-empty path, and
    /// well-formed environment.
    ///
    /// # Errors
    ///
    /// Fails with `UnknownHookName`, `InvalidPath`, or `InvalidEnv`.
    pub fn validate(&self) -> Result<()> {
        if !HOOK_NAMES.contains(&self.hook_name.as_str()) {
            return Err(DevinjectError::UnknownHookName {
                name: self.hook_name.clone(),
            });
        }
        if self.path.is_empty() {
            return Err(DevinjectError::InvalidPath {
                message: format!("hook {:?} has empty path", self.hook_name),
            });
        }
        validate_env(&self.env)
    }
}

impl Mount {
    /// Validates a mount: both host and container paths must be present.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidPath`.
    pub fn validate(&self) -> Result<()> {
        if self.host_path.is_empty() {
            return Err(DevinjectError::InvalidPath {
                message: "mount has empty host path".to_owned(),
            });
        }
        if self.container_path.is_empty() {
            return Err(DevinjectError::InvalidPath {
                message: "mount has empty container path".to_owned(),
            });
        }
        Ok(())
    }
}

impl ResourceControl {
    /// Validates the class-of-service identifier as a single path
    /// component: no separators or newlines, not `.` or `..`, and shorter
    /// than the filesystem name limit.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidClosId`.
    pub fn validate(&self) -> Result<()> {
        if self.clos_id.len() >= MAX_CLOS_ID_LEN
            || self.clos_id == "."
            || self.clos_id == ".."
            || self.clos_id.contains('/')
            || self.clos_id.contains('\n')
        {
            return Err(DevinjectError::InvalidClosId {
                clos_id: self.clos_id.clone(),
            });
        }
        Ok(())
    }
}

/// Checks that the descriptor version is present and recognized.
///
/// # Errors
///
/// Fails with [`DevinjectError::InvalidVersion`].
pub fn validate_version(version: &str) -> Result<()> {
    if !VALID_VERSIONS.contains(&version) {
        return Err(DevinjectError::InvalidVersion {
            version: version.to_owned(),
        });
    }
    Ok(())
}

fn validate_env(env: &[String]) -> Result<()> {
    for entry in env {
        if !entry.find('=').is_some_and(|i| i > 0) {
            return Err(DevinjectError::InvalidEnv {
                entry: entry.clone(),
            });
        }
    }
    Ok(())
}
