//! Moving function content between a project directory and a remote host.
//!
//! Downloads land in a temp file next to their destination and are renamed
//! into place only once the whole body has arrived. An interrupted transfer
//! therefore never leaves a partial file behind.

use crate::context::ExecContext;
use crate::fs::walker::WalkOptions;
use crate::manifest::MANIFEST_FILE;
use crate::project::ignore::IgnoreList;
use crate::project::tracking::{self, RemoteIdentity, TrackingRecord, TRACKING_FILE};
use crate::project::IGNORE_FILE;
use crate::remote::RemoteClient;
use crate::transfer::archive::{pack_directory, unpack_archive};
use crate::utils::errors::{CtlError, Result};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Where downloaded content goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    File(PathBuf),
    Stdout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub files: usize,
    pub source_bytes: u64,
    pub archive_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneReport {
    pub dir: PathBuf,
    pub record: TrackingRecord,
    pub archive_bytes: u64,
}

/// Work out which remote function a command addresses.
///
/// An explicit `--name` wins (with `--url`, or `default_url`). Otherwise the
/// tracking record of `dir` supplies the identity, with `--url` still able to
/// override the host.
pub fn resolve_identity(
    dir: &Path,
    url: Option<&str>,
    name: Option<&str>,
    default_url: &str,
) -> Result<RemoteIdentity> {
    if let Some(name) = name {
        return Ok(RemoteIdentity::new(url.unwrap_or(default_url), name));
    }

    match tracking::load(dir)? {
        Some(record) => Ok(match url {
            Some(url) => RemoteIdentity::new(url, &record.remote.name),
            None => record.remote,
        }),
        None => Err(CtlError::NotFound(format!(
            "{} is not tracking a remote function; pass --name or clone it first",
            dir.display()
        ))),
    }
}

/// Fetch the packaged content of `name` into `target`. Returns the byte count.
pub async fn download(
    ctx: &ExecContext,
    client: &RemoteClient,
    name: &str,
    target: &DownloadTarget,
) -> Result<u64> {
    match target {
        DownloadTarget::Stdout => {
            let mut stdout = tokio::io::stdout();
            stream_content(ctx, client, name, &mut stdout, Path::new("<stdout>")).await
        }
        DownloadTarget::File(path) => {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let (tmp, bytes) = fetch_to_temp(ctx, client, name, parent).await?;
            tmp.persist(path)
                .map_err(|e| CtlError::io("renaming download to", path)(e.error))?;
            info!("Downloaded {} ({} bytes) to {}", name, bytes, path.display());
            Ok(bytes)
        }
    }
}

/// Package `dir` and replace the remote content of `name` with it.
///
/// Honors `.lambdaignore`; the tracking record is never shipped.
pub async fn upload(
    ctx: &ExecContext,
    client: &RemoteClient,
    name: &str,
    dir: &Path,
) -> Result<UploadReport> {
    let options = WalkOptions {
        follow_links: false,
        ignore: IgnoreList::load(&dir.join(IGNORE_FILE))?,
        always_exclude: vec![PathBuf::from(TRACKING_FILE)],
    };

    ctx.check()?;
    let root = dir.to_path_buf();
    let packed = tokio::task::spawn_blocking(move || pack_directory(&root, &options))
        .await
        .map_err(|e| CtlError::PackagingError(format!("packing task failed: {}", e)))??;
    debug!(
        "Packed {} files ({} bytes, {} compressed)",
        packed.files, packed.source_bytes, packed.archive_bytes
    );

    client.put_content(ctx, name, &packed).await?;

    Ok(UploadReport {
        files: packed.files,
        source_bytes: packed.source_bytes,
        archive_bytes: packed.archive_bytes,
    })
}

/// Materialize the remote function `name` into `dir` and start tracking it.
///
/// Repeating a clone into a directory that already tracks the same function
/// refreshes its content and record. Nothing is created locally until the
/// manifest and the whole archive have been fetched.
pub async fn clone(
    ctx: &ExecContext,
    client: &RemoteClient,
    name: &str,
    dir: &Path,
) -> Result<CloneReport> {
    let identity = RemoteIdentity::new(&client.base_url(), name);

    if let Some(existing) = tracking::load(dir)? {
        if !existing.remote.same_as(&identity) {
            return Err(CtlError::AlreadyTrackedElsewhere {
                dir: dir.to_path_buf(),
                existing: existing.remote.to_string(),
                requested: identity.to_string(),
            });
        }
        debug!("{} already tracks {}, refreshing", dir.display(), identity);
    }

    let manifest = client.fetch_manifest(ctx, name).await?;
    manifest.validate()?;
    let (archive, archive_bytes) = fetch_to_temp(ctx, client, name, &std::env::temp_dir()).await?;
    ctx.check()?;

    std::fs::create_dir_all(dir).map_err(CtlError::io("creating", dir))?;
    let dest = dir.to_path_buf();
    tokio::task::spawn_blocking(move || unpack_archive(archive.path(), &dest))
        .await
        .map_err(|e| CtlError::PackagingError(format!("unpacking task failed: {}", e)))??;

    manifest.save_as(&dir.join(MANIFEST_FILE))?;
    let record = TrackingRecord::new(identity);
    tracking::save(dir, &record)?;
    info!("Cloned {} into {}", record.remote, dir.display());

    Ok(CloneReport {
        dir: dir.to_path_buf(),
        record,
        archive_bytes,
    })
}

/// Stream the content of `name` into a new temp file inside `dir`.
async fn fetch_to_temp(
    ctx: &ExecContext,
    client: &RemoteClient,
    name: &str,
    dir: &Path,
) -> Result<(NamedTempFile, u64)> {
    let tmp = tempfile::Builder::new()
        .prefix(".lambda-ctl-download-")
        .tempfile_in(dir)
        .map_err(CtlError::io("creating temp file in", dir))?;
    let std_file = tmp
        .reopen()
        .map_err(CtlError::io("opening", tmp.path()))?;
    let mut file = tokio::fs::File::from_std(std_file);

    let bytes = stream_content(ctx, client, name, &mut file, tmp.path()).await?;
    file.sync_all().await.map_err(CtlError::io("syncing", tmp.path()))?;
    drop(file);

    Ok((tmp, bytes))
}

async fn stream_content<W>(
    ctx: &ExecContext,
    client: &RemoteClient,
    name: &str,
    out: &mut W,
    label: &Path,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut response = client.fetch_content(ctx, name).await?;
    let mut total = 0u64;
    while let Some(chunk) = client.next_chunk(ctx, &mut response).await? {
        out.write_all(&chunk).await.map_err(CtlError::io("writing", label))?;
        total += chunk.len() as u64;
    }
    out.flush().await.map_err(CtlError::io("flushing", label))?;
    Ok(total)
}
