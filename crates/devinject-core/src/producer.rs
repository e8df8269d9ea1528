//! Atomic persistence of validated descriptor documents.
//!
//! A [`Producer`] serializes a descriptor to one of two textual encodings
//! and writes it to durable storage via a temporary file in the target
//! directory followed by a rename, so readers never observe a partially
//! written document and no orphaned artifacts remain on failure.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};

use devinject_common::error::{DevinjectError, Result};

use crate::descriptor::Descriptor;
use crate::validate::{DefaultValidator, SpecValidator};

/// Textual encodings a descriptor document can be persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    /// JSON encoding, `.json` extension.
    Json,
    /// YAML encoding with a document-start marker, `.yaml` extension.
    Yaml,
}

impl SpecFormat {
    /// Returns the filename extension for this format, dot included.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => ".json",
            Self::Yaml => ".yaml",
        }
    }

    /// Determines the format implied by a filename extension, if any.
    #[must_use]
    pub fn from_filename(filename: &Path) -> Option<Self> {
        match filename.extension().and_then(OsStr::to_str) {
            Some("json") => Some(Self::Json),
            Some("yaml" | "yml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

impl Default for SpecFormat {
    fn default() -> Self {
        Self::Yaml
    }
}

/// Configuration for a [`Producer`].
pub struct ProducerConfig {
    /// Encoding used when the filename does not imply one.
    pub format: SpecFormat,
    /// Whether an existing destination file may be replaced.
    pub overwrite: bool,
    /// Validator run before anything is written; `None` disables
    /// validation entirely.
    pub validator: Option<Box<dyn SpecValidator + Send + Sync>>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            format: SpecFormat::default(),
            overwrite: false,
            validator: Some(Box::new(DefaultValidator)),
        }
    }
}

impl std::fmt::Debug for ProducerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerConfig")
            .field("format", &self.format)
            .field("overwrite", &self.overwrite)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Writes descriptor documents to durable storage.
#[derive(Debug, Default)]
pub struct Producer {
    config: ProducerConfig,
}

impl Producer {
    /// Creates a producer with the given configuration.
    #[must_use]
    pub fn new(config: ProducerConfig) -> Self {
        Self { config }
    }

    /// Validates the descriptor and writes it atomically to the given
    /// filename, appending the configured encoding's extension unless the
    /// filename already carries a recognized one. A recognized extension
    /// overrides the configured encoding. Returns the final path.
    ///
    /// # Errors
    ///
    /// Fails with `ValidationFailed` (nothing written), `Serialization`,
    /// `AlreadyExists` if the destination exists and overwriting is
    /// disallowed, or `Persistence` on other I/O failures. The temporary
    /// file is removed on every failure path.
    pub fn save_spec(
        &self,
        descriptor: &Descriptor,
        filename: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        if let Some(validator) = &self.config.validator {
            validator
                .validate_descriptor(descriptor)
                .map_err(|e| DevinjectError::ValidationFailed {
                    source: Box::new(e),
                })?;
        }

        let filename = self.normalize_filename(filename.as_ref());
        let format = SpecFormat::from_filename(&filename).unwrap_or(self.config.format);
        let data = contents(descriptor, format)?;

        self.write_atomically(&filename, &data)?;
        tracing::info!(path = %filename.display(), "descriptor saved");
        Ok(filename)
    }

    fn normalize_filename(&self, filename: &Path) -> PathBuf {
        if SpecFormat::from_filename(filename).is_some() {
            return filename.to_path_buf();
        }
        let mut name = filename.as_os_str().to_owned();
        name.push(self.config.format.extension());
        PathBuf::from(name)
    }

    fn write_atomically(&self, filename: &Path, data: &[u8]) -> Result<()> {
        let dir = match filename.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| DevinjectError::Persistence {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut tmp = tempfile::Builder::new()
            .prefix("spec.")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| DevinjectError::Persistence {
                path: dir.to_path_buf(),
                source: e,
            })?;
        // Dropping `tmp` on any early return below removes the file.
        tmp.write_all(data).map_err(|e| DevinjectError::Persistence {
            path: filename.to_path_buf(),
            source: e,
        })?;

        let persisted = if self.config.overwrite {
            tmp.persist(filename)
        } else {
            tmp.persist_noclobber(filename)
        };
        match persisted {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(DevinjectError::AlreadyExists {
                    path: filename.to_path_buf(),
                })
            }
            Err(e) => Err(DevinjectError::Persistence {
                path: filename.to_path_buf(),
                source: e.error,
            }),
        }
    }
}

/// Serializes a descriptor in the given format. The YAML encoding is
/// prefixed with a document-start marker line.
fn contents(descriptor: &Descriptor, format: SpecFormat) -> Result<Vec<u8>> {
    match format {
        SpecFormat::Json => {
            serde_json::to_vec(descriptor).map_err(|e| DevinjectError::Serialization {
                message: e.to_string(),
            })
        }
        SpecFormat::Yaml => {
            let body =
                serde_yaml::to_string(descriptor).map_err(|e| DevinjectError::Serialization {
                    message: e.to_string(),
                })?;
            Ok(format!("---\n{body}").into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Device;
    use crate::edits::EditSet;

    fn sample_descriptor() -> Descriptor {
        Descriptor {
            devices: vec![Device {
                name: "gpu0".into(),
                container_edits: EditSet {
                    env: vec!["GPU=0".into()],
                    ..EditSet::default()
                },
                ..Device::default()
            }],
            ..Descriptor::new("vendor.com/gpu")
        }
    }

    fn no_tmp_files_remain(dir: &Path) {
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .expect("read_dir")
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "leftover temp files: {leftovers:?}");
    }

    #[test]
    fn save_appends_configured_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let producer = Producer::default();
        let path = producer
            .save_spec(&sample_descriptor(), dir.path().join("gpu"))
            .expect("save");
        assert_eq!(path.extension().and_then(OsStr::to_str), Some("yaml"));
        assert!(path.exists());
        no_tmp_files_remain(dir.path());
    }

    #[test]
    fn yaml_document_carries_start_marker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Producer::default()
            .save_spec(&sample_descriptor(), dir.path().join("gpu.yaml"))
            .expect("save");
        let text = std::fs::read_to_string(path).expect("read");
        assert!(text.starts_with("---\n"), "got: {text}");
    }

    #[test]
    fn filename_extension_overrides_configured_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Producer configured for YAML; the .json filename must win.
        let path = Producer::default()
            .save_spec(&sample_descriptor(), dir.path().join("gpu.json"))
            .expect("save");
        let text = std::fs::read_to_string(path).expect("read");
        let parsed: Descriptor = serde_json::from_str(&text).expect("valid JSON");
        assert_eq!(parsed.kind, "vendor.com/gpu");
    }

    #[test]
    fn save_without_overwrite_fails_and_preserves_existing_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("gpu.yaml");
        std::fs::write(&target, "original contents").expect("seed file");

        let err = Producer::default()
            .save_spec(&sample_descriptor(), &target)
            .unwrap_err();
        assert!(matches!(err, DevinjectError::AlreadyExists { .. }));
        assert_eq!(
            std::fs::read_to_string(&target).expect("read"),
            "original contents"
        );
        no_tmp_files_remain(dir.path());
    }

    #[test]
    fn save_with_overwrite_replaces_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("gpu.yaml");
        std::fs::write(&target, "original contents").expect("seed file");

        let producer = Producer::new(ProducerConfig {
            overwrite: true,
            ..ProducerConfig::default()
        });
        producer
            .save_spec(&sample_descriptor(), &target)
            .expect("save");
        let text = std::fs::read_to_string(&target).expect("read");
        assert!(text.contains("vendor.com/gpu"));
        no_tmp_files_remain(dir.path());
    }

    #[test]
    fn invalid_descriptor_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut descriptor = sample_descriptor();
        descriptor.kind = "not-a-qualifier".into();

        let err = Producer::default()
            .save_spec(&descriptor, dir.path().join("gpu"))
            .unwrap_err();
        assert!(matches!(err, DevinjectError::ValidationFailed { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }

    #[test]
    fn disabled_validator_saves_invalid_descriptor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut descriptor = sample_descriptor();
        descriptor.kind = "not-a-qualifier".into();

        let producer = Producer::new(ProducerConfig {
            validator: None,
            ..ProducerConfig::default()
        });
        let path = producer
            .save_spec(&descriptor, dir.path().join("gpu"))
            .expect("save");
        assert!(path.exists());
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("descriptors").join("gpu.json");
        let path = Producer::default()
            .save_spec(&sample_descriptor(), &nested)
            .expect("save");
        assert!(path.exists());
    }

    #[test]
    fn saved_yaml_round_trips_through_serde() {
        let dir = tempfile::tempdir().expect("tempdir");
        let descriptor = sample_descriptor();
        let path = Producer::default()
            .save_spec(&descriptor, dir.path().join("gpu.yaml"))
            .expect("save");
        let text = std::fs::read_to_string(path).expect("read");
        let parsed: Descriptor = serde_yaml::from_str(&text).expect("valid YAML");
        assert_eq!(parsed, descriptor);
    }
}
