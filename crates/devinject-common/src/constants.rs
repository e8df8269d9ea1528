//! Workspace-wide constants: annotation namespace, hook names, and
//! descriptor versions.

/// Namespace prefix for device-injection container annotation keys.
pub const ANNOTATION_PREFIX: &str = "devinject.io/";

/// Maximum length of an annotation key, prefix included.
pub const MAX_ANNOTATION_KEY_LEN: usize = 63;

/// Name of the "prestart" lifecycle hook.
pub const PRESTART_HOOK: &str = "prestart";
/// Name of the "createRuntime" lifecycle hook.
pub const CREATE_RUNTIME_HOOK: &str = "createRuntime";
/// Name of the "createContainer" lifecycle hook.
pub const CREATE_CONTAINER_HOOK: &str = "createContainer";
/// Name of the "startContainer" lifecycle hook.
pub const START_CONTAINER_HOOK: &str = "startContainer";
/// Name of the "poststart" lifecycle hook.
pub const POSTSTART_HOOK: &str = "poststart";
/// Name of the "poststop" lifecycle hook.
pub const POSTSTOP_HOOK: &str = "poststop";

/// The recognized lifecycle hook names, shared by the validator and the
/// apply engine so the two accepted sets cannot drift apart.
pub const HOOK_NAMES: [&str; 6] = [
    PRESTART_HOOK,
    CREATE_RUNTIME_HOOK,
    CREATE_CONTAINER_HOOK,
    START_CONTAINER_HOOK,
    POSTSTART_HOOK,
    POSTSTOP_HOOK,
];

/// Current descriptor document version.
pub const CURRENT_VERSION: &str = "0.2.0";

/// Descriptor document versions accepted by the validator.
pub const VALID_VERSIONS: [&str; 2] = ["0.1.0", "0.2.0"];

/// Maximum length of a resource-control class-of-service identifier.
pub const MAX_CLOS_ID_LEN: usize = 4096;
