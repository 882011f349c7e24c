//! Project directory traversal for packaging.
//!
//! Walks a project root, pruning whole subtrees excluded by the ignore list,
//! and returns regular files with paths relative to the root.

use crate::project::ignore::IgnoreList;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Patterns excluded from the walk
    pub ignore: IgnoreList,

    /// Relative paths always excluded (e.g. the tracking record)
    pub always_exclude: Vec<PathBuf>,
}

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// For symlinks, resolves to the target to get the real file size.
    /// Returns None if the symlink target is a directory or cannot be resolved.
    fn from_entry(entry: &DirEntry, relative_path: PathBuf) -> std::io::Result<Option<Self>> {
        let path = entry.path().to_path_buf();

        let metadata = if entry.path_is_symlink() {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_dir() => return Ok(None),
                Ok(resolved) => resolved,
                // Broken symlink
                Err(_) => return Ok(None),
            }
        } else {
            entry.metadata()?
        };

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            relative_path,
            size: metadata.len(),
        }))
    }
}

/// Walk a project tree and collect all packageable files, sorted by relative path.
pub fn walk_directory(root: &Path, options: &WalkOptions) -> std::io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !should_exclude(entry, root, options));

    for entry in walker {
        let entry = entry?;

        if entry.file_type().is_dir() {
            continue;
        }

        let relative_path = relative(entry.path(), root);
        if let Some(file_info) = FileInfo::from_entry(&entry, relative_path)? {
            files.push(file_info);
        }
    }

    Ok(files)
}

fn relative(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Check if a directory entry should be excluded
fn should_exclude(entry: &DirEntry, root: &Path, options: &WalkOptions) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    let relative_path = relative(entry.path(), root);
    options.always_exclude.iter().any(|p| *p == relative_path) || options.ignore.is_ignored(&relative_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn relative_paths(files: &[FileInfo]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_walk_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let files = walk_directory(temp_dir.path(), &WalkOptions::default())?;
        assert_eq!(files.len(), 0);
        Ok(())
    }

    #[test]
    fn test_walk_with_subdirectories() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("subdir"))?;
        fs::write(temp_dir.path().join("file1.txt"), b"content1")?;
        fs::write(temp_dir.path().join("subdir/file2.txt"), b"content22")?;

        let files = walk_directory(temp_dir.path(), &WalkOptions::default())?;
        assert_eq!(relative_paths(&files), vec!["file1.txt", "subdir/file2.txt"]);
        assert_eq!(files[1].size, 9);

        Ok(())
    }

    #[test]
    fn test_ignore_list_prunes_subtrees() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir_all(temp_dir.path().join("target/debug"))?;
        fs::write(temp_dir.path().join("target/debug/app"), b"bin")?;
        fs::write(temp_dir.path().join("main.sh"), b"echo")?;
        fs::write(temp_dir.path().join("trace.log"), b"log")?;

        let options = WalkOptions {
            ignore: IgnoreList::parse("target\n*.log\n"),
            ..WalkOptions::default()
        };
        let files = walk_directory(temp_dir.path(), &options)?;
        assert_eq!(relative_paths(&files), vec!["main.sh"]);

        Ok(())
    }

    #[test]
    fn test_always_exclude() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join(".lambda-ctl.json"), b"{}")?;
        fs::write(temp_dir.path().join("manifest.json"), b"{}")?;

        let options = WalkOptions {
            always_exclude: vec![PathBuf::from(".lambda-ctl.json")],
            ..WalkOptions::default()
        };
        let files = walk_directory(temp_dir.path(), &options)?;
        assert_eq!(relative_paths(&files), vec!["manifest.json"]);

        Ok(())
    }
}
