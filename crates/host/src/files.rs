//! Read-only filesystem browsing
//!
//! Paths arriving here are already cleaned and checked against the path
//! allow-list. Nothing in this module writes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, Metadata};
use std::io::{ErrorKind, Read};
use std::path::Path;
use walkdir::WalkDir;
use warden_core::{Error, Result};

/// Largest prefix of a file that will be returned
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;
/// Directory listings stop after this many entries
pub const MAX_DIR_ENTRIES: usize = 1000;
const LARGEST_FILES: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mode: String,
    pub mod_time: Option<DateTime<Utc>>,
    pub is_dir: bool,
    pub is_symlink: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
    pub owner: String,
    pub group: String,
    pub permissions: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryListing {
    pub path: String,
    pub files: Vec<FileInfo>,
    pub total: usize,
    pub can_read: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub size: u64,
    /// `utf-8`, or `base64` for binary content
    pub encoding: String,
    pub is_binary: bool,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LargeFile {
    pub name: String,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskUsageInfo {
    pub path: String,
    pub total_size: u64,
    pub file_count: usize,
    pub dir_count: usize,
    pub largest_files: Vec<LargeFile>,
}

#[derive(Debug, Clone, Default)]
pub struct FileBrowser;

impl FileBrowser {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_directory(&self, path: &Path) -> Result<DirectoryListing> {
        let path = path.to_path_buf();
        blocking(move || list_directory(&path)).await
    }

    pub async fn read_file(&self, path: &Path) -> Result<FileContent> {
        let path = path.to_path_buf();
        blocking(move || read_file(&path)).await
    }

    pub async fn disk_usage(&self, path: &Path) -> Result<DiskUsageInfo> {
        let path = path.to_path_buf();
        blocking(move || disk_usage(&path)).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("file operation panicked: {e}")))?
}

fn stat(path: &Path) -> Result<Metadata> {
    fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::not_found(
            path.display().to_string(),
            format!("path '{}' not found", path.display()),
        ),
        ErrorKind::PermissionDenied => Error::forbidden(
            path.display().to_string(),
            format!("permission denied for '{}'", path.display()),
        ),
        _ => Error::file_system(path, "stat", e),
    })
}

fn list_directory(path: &Path) -> Result<DirectoryListing> {
    if !stat(path)?.is_dir() {
        return Err(Error::bad_request(format!(
            "path '{}' is not a directory",
            path.display()
        )));
    }

    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "directory not readable");
            return Ok(DirectoryListing {
                path: path.display().to_string(),
                files: Vec::new(),
                total: 0,
                can_read: false,
            });
        }
    };

    let mut files: Vec<FileInfo> = entries
        .filter_map(std::result::Result::ok)
        .take(MAX_DIR_ENTRIES)
        .filter_map(|entry| file_info(&entry.path()).ok())
        .collect();

    files.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    Ok(DirectoryListing {
        path: path.display().to_string(),
        total: files.len(),
        files,
        can_read: true,
    })
}

fn read_file(path: &Path) -> Result<FileContent> {
    let metadata = stat(path)?;
    if metadata.is_dir() {
        return Err(Error::bad_request(format!(
            "path '{}' is a directory",
            path.display()
        )));
    }

    let size = metadata.len();
    let mut content = Vec::new();
    File::open(path)
        .and_then(|f| f.take(MAX_FILE_SIZE).read_to_end(&mut content))
        .map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => Error::forbidden(
                path.display().to_string(),
                format!("permission denied for '{}'", path.display()),
            ),
            _ => Error::file_system(path, "read", e),
        })?;
    let truncated = size > MAX_FILE_SIZE;

    let (content, encoding, is_binary) = decode(content, truncated);
    Ok(FileContent {
        path: path.display().to_string(),
        content,
        size,
        encoding: encoding.to_string(),
        is_binary,
        truncated,
    })
}

/// UTF-8 text as-is; anything else base64. A multi-byte character cut by
/// truncation does not make a text file binary.
fn decode(bytes: Vec<u8>, truncated: bool) -> (String, &'static str, bool) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, "utf-8", false),
        Err(e) => {
            let utf8 = e.utf8_error();
            if truncated && utf8.error_len().is_none() {
                let mut bytes = e.into_bytes();
                bytes.truncate(utf8.valid_up_to());
                (String::from_utf8_lossy(&bytes).into_owned(), "utf-8", false)
            } else {
                (STANDARD.encode(e.as_bytes()), "base64", true)
            }
        }
    }
}

fn disk_usage(path: &Path) -> Result<DiskUsageInfo> {
    stat(path)?;

    let mut total_size = 0;
    let mut file_count = 0;
    let mut dir_count = 0;
    let mut files = Vec::new();

    for entry in WalkDir::new(path).into_iter().filter_map(std::result::Result::ok) {
        if entry.file_type().is_dir() {
            dir_count += 1;
            continue;
        }
        file_count += 1;
        if let Ok(metadata) = entry.metadata() {
            total_size += metadata.len();
            files.push(LargeFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().display().to_string(),
                size: metadata.len(),
            });
        }
    }

    files.sort_by(|a, b| b.size.cmp(&a.size));
    files.truncate(LARGEST_FILES);

    Ok(DiskUsageInfo {
        path: path.display().to_string(),
        total_size,
        file_count,
        dir_count,
        largest_files: files,
    })
}

fn file_info(path: &Path) -> std::io::Result<FileInfo> {
    let metadata = fs::symlink_metadata(path)?;
    let is_symlink = metadata.file_type().is_symlink();
    let (mode, owner, group) = ownership(&metadata);

    Ok(FileInfo {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.display().to_string(),
        size: metadata.len(),
        mode: mode_string(mode, metadata.is_dir(), is_symlink),
        mod_time: metadata.modified().ok().map(DateTime::<Utc>::from),
        is_dir: metadata.is_dir(),
        is_symlink,
        link_target: if is_symlink {
            fs::read_link(path).ok().map(|t| t.display().to_string())
        } else {
            None
        },
        owner,
        group,
        permissions: permission_bits(mode),
    })
}

#[cfg(unix)]
fn ownership(metadata: &Metadata) -> (u32, String, String) {
    use std::os::unix::fs::MetadataExt;
    (
        metadata.mode(),
        metadata.uid().to_string(),
        metadata.gid().to_string(),
    )
}

#[cfg(not(unix))]
fn ownership(metadata: &Metadata) -> (u32, String, String) {
    let mode = if metadata.permissions().readonly() { 0o444 } else { 0o644 };
    (mode, String::new(), String::new())
}

/// `rwxr-x---`
fn permission_bits(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|(bit, c)| if mode & bit != 0 { *c } else { '-' })
        .collect()
}

/// `drwxr-xr-x`, `Lrwxrwxrwx`, `-rw-r--r--`
fn mode_string(mode: u32, is_dir: bool, is_symlink: bool) -> String {
    let kind = if is_symlink {
        'L'
    } else if is_dir {
        'd'
    } else {
        '-'
    };
    format!("{kind}{}", permission_bits(mode))
}
