//! Tracking relationship between a local directory and a remote function.

use crate::manifest::write_atomic;
use crate::utils::errors::{CtlError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Tracking record file name in the project root.
pub const TRACKING_FILE: &str = ".lambda-ctl.json";

/// A function on a remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIdentity {
    pub url: String,
    pub name: String,
}

impl RemoteIdentity {
    pub fn new(url: &str, name: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            name: name.to_string(),
        }
    }

    pub fn same_as(&self, other: &RemoteIdentity) -> bool {
        self.url.trim_end_matches('/') == other.url.trim_end_matches('/') && self.name == other.name
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.url)
    }
}

/// Persisted record written by `clone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    #[serde(flatten)]
    pub remote: RemoteIdentity,
    pub cloned_at: DateTime<Utc>,
}

impl TrackingRecord {
    pub fn new(remote: RemoteIdentity) -> Self {
        Self {
            remote,
            cloned_at: Utc::now(),
        }
    }
}

pub fn record_path(dir: &Path) -> PathBuf {
    dir.join(TRACKING_FILE)
}

/// Read the tracking record of `dir`, if any.
pub fn load(dir: &Path) -> Result<Option<TrackingRecord>> {
    let path = record_path(dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CtlError::io("reading", path)(e)),
    };

    let record = serde_json::from_str(&content).map_err(|e| CtlError::MalformedRecord {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(Some(record))
}

/// Atomically write (or replace) the tracking record of `dir`.
pub fn save(dir: &Path, record: &TrackingRecord) -> Result<()> {
    let path = record_path(dir);
    let mut content = serde_json::to_vec_pretty(record).map_err(|e| CtlError::MalformedRecord {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    content.push(b'\n');
    write_atomic(&path, &content)
}
