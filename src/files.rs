//! File references flowing through handler pipelines

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

/// Attribute flags captured at enumeration time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    pub readonly: bool,
    pub hidden: bool,
    pub directory: bool,
    /// The entry itself is a symbolic link (other flags describe its target)
    #[serde(default)]
    pub symlink: bool,
}

/// Immutable snapshot of a filesystem entry
///
/// Snapshots may go stale; effectful handlers re-check existence before acting.
/// Planned entries (produced by rename planners) carry the on-disk path they
/// were derived from in `origin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: PathBuf,
    pub name: String,
    pub extension: Option<String>,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub attributes: FileAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<PathBuf>,
}

impl FileRef {
    /// Stat `path` and build a snapshot (symlinks are followed)
    pub async fn stat(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = std::path::absolute(path.as_ref())?;
        let metadata = tokio::fs::metadata(&path).await?;
        let link = tokio::fs::symlink_metadata(&path).await?;

        let mut file = Self::from_metadata(path, &metadata);
        file.attributes.symlink = link.file_type().is_symlink();
        Ok(file)
    }

    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let name = file_name_of(&path);
        let attributes = FileAttributes {
            readonly: metadata.permissions().readonly(),
            hidden: is_hidden(&name, metadata),
            directory: metadata.is_dir(),
            symlink: false,
        };
        let extension = if attributes.directory {
            None
        } else {
            split_name(&name).1.map(str::to_string)
        };

        Self {
            extension,
            size: if attributes.directory { 0 } else { metadata.len() },
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            attributes,
            name,
            path,
            origin: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.directory
    }

    /// A directory that can be descended into without following a link
    pub fn is_real_dir(&self) -> bool {
        self.attributes.directory && !self.attributes.symlink
    }

    /// Name without its last suffix (`archive.tar.gz` -> `archive.tar`)
    pub fn stem(&self) -> &str {
        if self.is_dir() {
            &self.name
        } else {
            split_name(&self.name).0
        }
    }

    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// The on-disk path this entry stands for
    pub fn source_path(&self) -> &Path {
        self.origin.as_deref().unwrap_or(&self.path)
    }

    /// Plan a rename within the same directory without touching the disk
    pub fn renamed(&self, new_name: &str) -> Self {
        let extension = if self.is_dir() {
            None
        } else {
            split_name(new_name).1.map(str::to_string)
        };

        Self {
            path: self.parent().join(new_name),
            name: new_name.to_string(),
            extension,
            size: self.size,
            modified: self.modified,
            attributes: self.attributes,
            origin: Some(self.source_path().to_path_buf()),
        }
    }

    /// Fresh snapshot of this entry after it was committed to `path`
    ///
    /// Falls back to the old snapshot under the new path if the entry can
    /// no longer be read.
    pub async fn relocated(&self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::stat(&path).await {
            Ok(fresh) => fresh,
            Err(_) => {
                let name = file_name_of(&path);
                let extension = if self.is_dir() {
                    None
                } else {
                    split_name(&name).1.map(str::to_string)
                };
                Self {
                    path,
                    name,
                    extension,
                    origin: None,
                    ..self.clone()
                }
            }
        }
    }
}

/// Split a file name into stem and suffix on the last dot
///
/// Leading dots do not start a suffix, so `.bashrc` has no suffix.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Join a stem and optional suffix back into a file name
pub fn join_name(stem: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{stem}.{suffix}"),
        None => stem.to_string(),
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(windows)]
fn is_hidden(_name: &str, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    use windows_sys::Win32::Storage::FileSystem::FILE_ATTRIBUTE_HIDDEN;

    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn is_hidden(name: &str, _metadata: &Metadata) -> bool {
    name.starts_with('.')
}
