//! Project archives: tar streams compressed with zstd.
//!
//! Packing writes into an anonymous temp file so a failed pack never leaves a
//! half-written archive anywhere a caller would pick it up.

use crate::fs::walker::{walk_directory, WalkOptions};
use crate::utils::errors::{CtlError, Result};
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// zstd level used for uploads.
const COMPRESSION_LEVEL: i32 = 3;

/// A packed project ready to send.
pub struct PackedArchive {
    pub file: NamedTempFile,
    pub files: usize,
    pub source_bytes: u64,
    pub archive_bytes: u64,
}

/// Package `root` into a temporary tar+zstd archive.
pub fn pack_directory(root: &Path, options: &WalkOptions) -> Result<PackedArchive> {
    let files = walk_directory(root, options)
        .map_err(|e| CtlError::PackagingError(format!("walking {}: {}", root.display(), e)))?;

    let mut tmp = tempfile::Builder::new()
        .prefix("lambda-ctl-upload-")
        .suffix(".tar.zst")
        .tempfile()
        .map_err(|e| CtlError::PackagingError(format!("creating temp archive: {}", e)))?;

    let encoder = zstd::Encoder::new(tmp.as_file_mut(), COMPRESSION_LEVEL)
        .map_err(|e| CtlError::PackagingError(format!("starting compression: {}", e)))?;
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(true);

    let mut source_bytes = 0u64;
    for file in &files {
        debug!("Packing {}", file.relative_path.display());
        builder
            .append_path_with_name(&file.path, &file.relative_path)
            .map_err(|e| CtlError::PackagingError(format!("adding {}: {}", file.path.display(), e)))?;
        source_bytes += file.size;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| CtlError::PackagingError(format!("finishing tar stream: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| CtlError::PackagingError(format!("finishing compression: {}", e)))?;

    let archive_bytes = tmp
        .as_file_mut()
        .seek(SeekFrom::End(0))
        .map_err(|e| CtlError::PackagingError(format!("sizing archive: {}", e)))?;

    Ok(PackedArchive {
        file: tmp,
        files: files.len(),
        source_bytes,
        archive_bytes,
    })
}

/// Extract a tar+zstd archive into `dest`, overwriting existing files.
///
/// Entries that would escape `dest` are rejected by `tar`.
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(CtlError::io("opening", archive))?;
    let decoder = zstd::Decoder::new(file)
        .map_err(|e| CtlError::PackagingError(format!("reading {}: {}", archive.display(), e)))?;

    let mut tar = tar::Archive::new(decoder);
    tar.set_overwrite(true);
    tar.unpack(dest)
        .map_err(|e| CtlError::PackagingError(format!("extracting into {}: {}", dest.display(), e)))
}
