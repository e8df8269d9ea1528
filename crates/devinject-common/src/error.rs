//! Unified error types for the devinject workspace.
//!
//! Every fallible operation in the workspace returns one of these
//! categorical variants. Failures are terminal for the call that raised
//! them; nothing in this workspace retries internally.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum DevinjectError {
    /// An annotation key could not be built or is syntactically invalid.
    #[error("malformed annotation key: {message}")]
    MalformedKey {
        /// Description of the violation.
        message: String,
    },

    /// A device name is not a valid (fully qualified) device name.
    #[error("invalid device name {name:?}: {message}")]
    MalformedDeviceName {
        /// The offending name.
        name: String,
        /// Description of the violation.
        message: String,
    },

    /// An annotation key is already present in the target map.
    #[error("annotation key {key:?} already used")]
    KeyCollision {
        /// The colliding key.
        key: String,
    },

    /// A hook references a lifecycle point outside the recognized set.
    #[error("unknown hook name {name:?}")]
    UnknownHookName {
        /// The unrecognized hook name.
        name: String,
    },

    /// A device declares no edits at all.
    #[error("device {device:?} has empty container edits")]
    EmptyEditSet {
        /// Name of the offending device.
        device: String,
    },

    /// Two devices in one descriptor share a name.
    #[error("duplicate device name {name:?}")]
    DuplicateDeviceName {
        /// The duplicated device name.
        name: String,
    },

    /// The descriptor version is missing or unrecognized.
    #[error("invalid descriptor version {version:?}")]
    InvalidVersion {
        /// The rejected version string.
        version: String,
    },

    /// The descriptor kind is not a valid `vendor/class` qualifier.
    #[error("invalid qualifier {kind:?}: {message}")]
    InvalidQualifier {
        /// The rejected kind string.
        kind: String,
        /// Description of the violation.
        message: String,
    },

    /// A device node, hook, or mount path is empty.
    #[error("invalid path: {message}")]
    InvalidPath {
        /// Description of the violation.
        message: String,
    },

    /// A device node declares a type outside the recognized set.
    #[error("device {path:?}: invalid type {node_type:?}")]
    InvalidDeviceType {
        /// Path of the offending device node.
        path: String,
        /// The rejected type string.
        node_type: String,
    },

    /// A device node declares permission characters outside `rwm`.
    #[error("device {path:?}: invalid permissions {permissions:?}")]
    InvalidPermissions {
        /// Path of the offending device node.
        path: String,
        /// The rejected permission string.
        permissions: String,
    },

    /// An environment entry is not of the form `KEY=VALUE`.
    #[error("invalid environment variable {entry:?}")]
    InvalidEnv {
        /// The rejected entry.
        entry: String,
    },

    /// A resource-control class-of-service identifier is not a valid
    /// single path component.
    #[error("invalid ClosID {clos_id:?}")]
    InvalidClosId {
        /// The rejected identifier.
        clos_id: String,
    },

    /// A device node's host path could not be inspected to derive its
    /// missing type or major/minor numbers.
    #[error("failed to stat host device {path}: {source}")]
    DeviceInfoUnavailable {
        /// Host path that could not be inspected.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Descriptor validation failed before persistence.
    #[error("descriptor validation failed: {source}")]
    ValidationFailed {
        /// The underlying validation error.
        source: Box<DevinjectError>,
    },

    /// The destination file already exists and overwriting is disallowed.
    #[error("refusing to overwrite existing file {path}")]
    AlreadyExists {
        /// The existing destination path.
        path: PathBuf,
    },

    /// Serializing a descriptor to its textual encoding failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Writing a descriptor document to durable storage failed.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DevinjectError>;
