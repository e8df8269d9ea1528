//! The apply engine: mutating a container spec from a merged edit set.
//!
//! Application is deterministic and staged: environment, device nodes,
//! mounts, hooks, resource-control block, supplementary GIDs. Stages
//! mutate the target incrementally with no rollback; a mid-apply failure
//! leaves the edits of earlier stages in place. Callers needing
//! all-or-nothing semantics should apply onto a copy of the target and
//! swap it in on success.

use std::path::PathBuf;

use devinject_common::constants::{
    CREATE_CONTAINER_HOOK, CREATE_RUNTIME_HOOK, POSTSTART_HOOK, POSTSTOP_HOOK, PRESTART_HOOK,
    START_CONTAINER_HOOK,
};
use devinject_common::error::{DevinjectError, Result};

use crate::edits::{DeviceNode, EditSet, Hook, Mount};
use crate::oci;

impl EditSet {
    /// Applies this edit set to the given container spec, in place.
    ///
    /// An empty edit set is a no-op. Device nodes and mounts use
    /// idempotent replace keyed by container path; hooks are append-only;
    /// the resource-control block replaces any existing one wholesale;
    /// additional GIDs are appended, skipping the sentinel value 0.
    ///
    /// # Errors
    ///
    /// Fails with [`DevinjectError::DeviceInfoUnavailable`] if a device
    /// node's missing fields cannot be derived from its host path, or
    /// with [`DevinjectError::UnknownHookName`] on an unrecognized hook.
    /// Edits applied by earlier stages are not rolled back.
    pub fn apply(&self, spec: &mut oci::Spec) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            env = self.env.len(),
            devices = self.device_nodes.len(),
            mounts = self.mounts.len(),
            hooks = self.hooks.len(),
            "applying container edits"
        );

        if !self.env.is_empty() {
            spec.process_mut().env.extend(self.env.iter().cloned());
        }

        for node in &self.device_nodes {
            let mut node = node.clone();
            node.fill_missing_info()?;
            let mut device = node.to_oci();
            if let Some(process) = &spec.process {
                if device.uid.is_none() && process.user.uid > 0 {
                    device.uid = Some(process.user.uid);
                }
                if device.gid.is_none() && process.user.gid > 0 {
                    device.gid = Some(process.user.gid);
                }
            }

            let linux = spec.linux_mut();
            linux.devices.retain(|d| d.path != device.path);
            if device.node_type == "b" || device.node_type == "c" {
                let access = if node.permissions.is_empty() {
                    "rwm".to_owned()
                } else {
                    node.permissions.clone()
                };
                linux.resources_mut().devices.push(oci::LinuxDeviceCgroup {
                    allow: true,
                    node_type: device.node_type.clone(),
                    major: Some(device.major),
                    minor: Some(device.minor),
                    access,
                });
            }
            linux.devices.push(device);
        }

        if !self.mounts.is_empty() {
            for mount in &self.mounts {
                spec.mounts.retain(|m| m.destination != mount.container_path);
                spec.mounts.push(mount.to_oci());
            }
            sort_mounts(&mut spec.mounts);
        }

        for hook in &self.hooks {
            let entry = hook.to_oci();
            match hook.hook_name.as_str() {
                PRESTART_HOOK => spec.hooks_mut().prestart.push(entry),
                CREATE_RUNTIME_HOOK => spec.hooks_mut().create_runtime.push(entry),
                CREATE_CONTAINER_HOOK => spec.hooks_mut().create_container.push(entry),
                START_CONTAINER_HOOK => spec.hooks_mut().start_container.push(entry),
                POSTSTART_HOOK => spec.hooks_mut().poststart.push(entry),
                POSTSTOP_HOOK => spec.hooks_mut().poststop.push(entry),
                _ => {
                    return Err(DevinjectError::UnknownHookName {
                        name: hook.hook_name.clone(),
                    });
                }
            }
        }

        if let Some(rc) = &self.resource_control {
            spec.linux_mut().rdt = Some(oci::LinuxRdt {
                clos_id: rc.clos_id.clone(),
            });
        }

        for gid in &self.additional_gids {
            // 0 is the "unset" sentinel, never a real supplementary group.
            if *gid == 0 {
                continue;
            }
            spec.process_mut().user.additional_gids.push(*gid);
        }

        Ok(())
    }
}

impl DeviceNode {
    /// Fills in fields the producer left unset, without overwriting
    /// explicit values: an empty host path defaults to the container
    /// path, and a missing type or major/minor pair is derived by
    /// inspecting the host device node.
    ///
    /// # Errors
    ///
    /// Fails with [`DevinjectError::DeviceInfoUnavailable`] if the host
    /// path cannot be inspected.
    pub fn fill_missing_info(&mut self) -> Result<()> {
        if self.host_path.is_empty() {
            self.host_path = self.path.clone();
        }
        if !self.node_type.is_empty() && (self.major != 0 || self.node_type == "p") {
            return Ok(());
        }

        let (node_type, major, minor) = device_info_from_path(&self.host_path)?;
        if self.node_type.is_empty() {
            self.node_type = node_type;
        }
        if self.major == 0 && self.node_type != "p" {
            self.major = major;
            self.minor = minor;
        }
        Ok(())
    }

    /// Translates this node into the container-spec device shape.
    #[must_use]
    pub fn to_oci(&self) -> oci::LinuxDevice {
        oci::LinuxDevice {
            path: self.path.clone(),
            node_type: self.node_type.clone(),
            major: self.major,
            minor: self.minor,
            file_mode: self.file_mode,
            uid: self.uid,
            gid: self.gid,
        }
    }
}

impl Mount {
    /// Translates this mount into the container-spec mount shape.
    #[must_use]
    pub fn to_oci(&self) -> oci::Mount {
        oci::Mount {
            destination: self.container_path.clone(),
            mount_type: self.mount_type.clone(),
            source: self.host_path.clone(),
            options: self.options.clone(),
        }
    }
}

impl Hook {
    /// Translates this hook into the container-spec hook shape.
    #[must_use]
    pub fn to_oci(&self) -> oci::Hook {
        oci::Hook {
            path: self.path.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
        }
    }
}

/// Sorts mounts so that shallower mount points precede mounts nested
/// beneath them: primary key is the separator count of the normalized
/// destination, ties break lexicographically.
pub fn sort_mounts(mounts: &mut [oci::Mount]) {
    mounts.sort_by(|a, b| {
        path_depth(&a.destination)
            .cmp(&path_depth(&b.destination))
            .then_with(|| a.destination.cmp(&b.destination))
    });
}

fn path_depth(path: &str) -> usize {
    clean_path(path).matches('/').count()
}

/// Lexically normalizes a path: collapses repeated separators and
/// resolves `.` and `..` components without touching the filesystem.
fn clean_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    let _ = parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }
    if absolute {
        format!("/{}", parts.join("/"))
    } else if parts.is_empty() {
        ".".to_owned()
    } else {
        parts.join("/")
    }
}

#[cfg(target_os = "linux")]
#[allow(clippy::cast_possible_wrap)]
fn device_info_from_path(path: &str) -> Result<(String, i64, i64)> {
    use nix::libc::{S_IFBLK, S_IFCHR, S_IFIFO, S_IFMT};
    use nix::sys::stat::{major, minor, stat};

    let st = stat(path).map_err(|errno| DevinjectError::DeviceInfoUnavailable {
        path: PathBuf::from(path),
        source: errno.into(),
    })?;

    let node_type = match st.st_mode & S_IFMT {
        kind if kind == S_IFBLK => "b",
        kind if kind == S_IFCHR => "c",
        kind if kind == S_IFIFO => "p",
        _ => {
            return Err(DevinjectError::DeviceInfoUnavailable {
                path: PathBuf::from(path),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "not a device node",
                ),
            });
        }
    };
    Ok((
        node_type.to_owned(),
        major(st.st_rdev) as i64,
        minor(st.st_rdev) as i64,
    ))
}

#[cfg(not(target_os = "linux"))]
fn device_info_from_path(path: &str) -> Result<(String, i64, i64)> {
    Err(DevinjectError::DeviceInfoUnavailable {
        path: PathBuf::from(path),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "device node inspection requires Linux",
        ),
    })
}
