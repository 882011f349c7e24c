//! Function project manifest.
//!
//! One `manifest.json` lives in every project root. It is written atomically
//! (temp file in the same directory, then rename) and only after validation.

use crate::utils::errors::{CtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Manifest file name in the project root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Persisted description of a function project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Command line executed by the host per request; first element is the executable.
    pub run: Vec<String>,

    #[serde(default)]
    pub output_headers: BTreeMap<String, String>,

    #[serde(with = "duration_str")]
    pub time_limit: Duration,

    /// Upper bound on request/response body size in bytes.
    pub maximum_payload: u64,

    #[serde(default)]
    pub public: bool,
}

/// Options for a freshly scaffolded manifest.
#[derive(Debug, Clone)]
pub struct BareOptions {
    pub git: bool,
    pub description: String,
    pub private: bool,
    pub time_limit: Duration,
    pub max_payload: u64,
}

impl Default for BareOptions {
    fn default() -> Self {
        Self {
            git: false,
            description: "Bare project".to_string(),
            private: false,
            time_limit: Duration::from_secs(10),
            max_payload: 8192,
        }
    }
}

impl Manifest {
    /// Build the default manifest of a bare project. The result is validated.
    pub fn bare(name: &str, options: &BareOptions) -> Result<Self> {
        let manifest = Manifest {
            name: name.to_string(),
            description: options.description.clone(),
            run: vec!["/bin/echo".to_string(), r#"["hello", "world"]"#.to_string()],
            output_headers: BTreeMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
            time_limit: options.time_limit,
            maximum_payload: options.max_payload,
            public: !options.private,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CtlError::NotFound(format!("manifest {}", path.display())));
            }
            Err(e) => return Err(CtlError::io("reading", path)(e)),
        };
        serde_json::from_str(&content).map_err(|e| CtlError::MalformedManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse a manifest received from the remote host.
    pub fn from_slice(origin: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CtlError::MalformedManifest {
            path: origin.into(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CtlError::InvalidManifest("name must not be empty".into()));
        }
        if self.run.is_empty() || self.run[0].is_empty() {
            return Err(CtlError::InvalidManifest("run command must not be empty".into()));
        }
        if self.time_limit.is_zero() {
            return Err(CtlError::InvalidManifest("time limit must be positive".into()));
        }
        Ok(())
    }

    /// Validate, then atomically replace the file at `path`.
    pub fn save_as(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let mut content = serde_json::to_vec_pretty(self).map_err(|e| CtlError::InvalidManifest(e.to_string()))?;
        content.push(b'\n');
        write_atomic(path, &content)
    }
}

/// Write `content` to a temp file beside `path` and rename it into place.
///
/// The destination is untouched if any step before the rename fails.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".lambda-ctl-")
        .tempfile_in(parent)
        .map_err(CtlError::io("creating temp file in", parent))?;
    tmp.write_all(content).map_err(CtlError::io("writing", tmp.path().to_path_buf()))?;
    tmp.as_file().sync_all().map_err(CtlError::io("syncing", tmp.path().to_path_buf()))?;
    tmp.persist(path).map_err(|e| CtlError::io("replacing", path)(e.error))?;
    Ok(())
}

/// Durations as human-readable strings (`"10s"`, `"1m 30s"`).
mod duration_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}
