//! Async filesystem primitives used by the effectful handlers
//!
//! Every failure carries the operation label and the path it happened on,
//! so per-file outcomes can be reported without further context.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::files::FileRef;

#[derive(Debug, Error)]
#[error("{operation} failed for {}: {source}", path.display())]
pub struct FsError {
    pub operation: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FsError {
    pub fn new(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn walkdir(operation: &'static str, root: &Path, err: walkdir::Error) -> Self {
        let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
        Self::new(operation, path, io::Error::from(err))
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// Whether anything (file, directory or dangling symlink) exists at `path`
pub async fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Whether `a` and `b` name the same filesystem entry
pub async fn same_entry(a: &Path, b: &Path) -> bool {
    let (Ok(left), Ok(right)) = (fs::metadata(a).await, fs::metadata(b).await) else {
        return false;
    };
    same_identity(a, &left, b, &right)
}

#[cfg(unix)]
fn same_identity(_a: &Path, left: &std::fs::Metadata, _b: &Path, right: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    left.dev() == right.dev() && left.ino() == right.ino()
}

#[cfg(not(unix))]
fn same_identity(a: &Path, _left: &std::fs::Metadata, b: &Path, _right: &std::fs::Metadata) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

/// Names present in `dir`; a missing directory has no names
pub async fn list_names(dir: &Path) -> FsResult<HashSet<String>> {
    let mut reader = match fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(source) => return Err(FsError::new("list_names", dir, source)),
    };

    let mut names = HashSet::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|source| FsError::new("list_names.entry", dir, source))?
    {
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// How [`walk`] traverses a tree
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Deepest level returned; `Some(1)` lists direct children only
    pub max_depth: Option<usize>,
    /// Yield a directory's contents before the directory itself
    pub contents_first: bool,
}

impl WalkOptions {
    pub fn children_only() -> Self {
        Self {
            max_depth: Some(1),
            ..Self::default()
        }
    }

    pub fn contents_first() -> Self {
        Self {
            contents_first: true,
            ..Self::default()
        }
    }
}

/// Entries found below a root, and the ones that could not be read
#[derive(Debug, Default)]
pub struct Walk {
    pub entries: Vec<FileRef>,
    pub errors: Vec<FsError>,
}

/// Every entry below `root` (the root excluded), sorted by name per level
///
/// Symbolic links are returned as entries and never descended into. An
/// unreadable entry or directory lands in [`Walk::errors`] and the walk
/// goes on.
pub async fn walk(root: &Path, options: WalkOptions) -> FsResult<Walk> {
    let owned = root.to_path_buf();
    tokio::task::spawn_blocking(move || walk_blocking(&owned, options))
        .await
        .map_err(|join| FsError::new("walk", root, io::Error::other(join)))
}

fn walker(root: &Path, options: WalkOptions) -> WalkDir {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .contents_first(options.contents_first)
        .sort_by_file_name();
    match options.max_depth {
        Some(depth) => walker.max_depth(depth),
        None => walker,
    }
}

fn walk_blocking(root: &Path, options: WalkOptions) -> Walk {
    let mut walk = Walk::default();
    for entry in walker(root, options) {
        let described = entry
            .map_err(|err| FsError::walkdir("walk", root, err))
            .and_then(|entry| {
                entry_ref(&entry).map_err(|source| FsError::new("walk.stat", entry.path(), source))
            });
        match described {
            Ok(file) => walk.entries.push(file),
            Err(err) => walk.errors.push(err),
        }
    }
    walk
}

/// Snapshot a walked entry; links report their target, dangling ones themselves
fn entry_ref(entry: &DirEntry) -> io::Result<FileRef> {
    let path = entry.path().to_path_buf();
    if !entry.path_is_symlink() {
        let metadata = entry.metadata().map_err(io::Error::from)?;
        return Ok(FileRef::from_metadata(path, &metadata));
    }

    let metadata = match std::fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(_) => std::fs::symlink_metadata(&path)?,
    };
    let mut file = FileRef::from_metadata(path, &metadata);
    file.attributes.symlink = true;
    Ok(file)
}

pub async fn create_dir(path: &Path) -> FsResult<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| FsError::new("create_dir", path, source))
}

/// Whether copying `source` onto the existing `target` can overwrite it in
/// place: both are directories or both are non-link files
pub async fn same_kind(source: &Path, target: &Path) -> bool {
    let (Ok(from), Ok(to)) = (fs::metadata(source).await, fs::symlink_metadata(target).await) else {
        return false;
    };
    !to.file_type().is_symlink() && from.is_dir() == to.is_dir()
}

/// Copy a file or a whole directory tree to `destination`
///
/// Existing files in the destination are overwritten. Symbolic links inside
/// a tree are recreated as links, never followed.
pub async fn copy_entry(source: &Path, destination: &Path) -> FsResult<()> {
    let (from, to) = (source.to_path_buf(), destination.to_path_buf());
    tokio::task::spawn_blocking(move || copy_tree(&from, &to))
        .await
        .map_err(|join| FsError::new("copy", source, io::Error::other(join)))?
}

fn copy_tree(source: &Path, destination: &Path) -> FsResult<()> {
    let metadata = std::fs::metadata(source).map_err(|err| FsError::new("copy.stat", source, err))?;

    if !metadata.is_dir() {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|err| FsError::new("copy.create_parent", parent, err))?;
        }
        std::fs::copy(source, destination).map_err(|err| FsError::new("copy.file", destination, err))?;
        return Ok(());
    }

    std::fs::create_dir_all(destination).map_err(|err| FsError::new("copy.create_dir", destination, err))?;

    for entry in walker(source, WalkOptions::default()) {
        let entry = entry.map_err(|err| FsError::walkdir("copy.walk", source, err))?;
        let relative = entry.path().strip_prefix(source).map_err(|_| {
            FsError::new(
                "copy.relative",
                entry.path(),
                io::Error::new(io::ErrorKind::InvalidInput, "entry outside the copied tree"),
            )
        })?;
        let target = destination.join(relative);

        let kind = entry.file_type();
        if kind.is_dir() {
            std::fs::create_dir_all(&target).map_err(|err| FsError::new("copy.create_dir", &target, err))?;
        } else if kind.is_symlink() {
            copy_link(entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|err| FsError::new("copy.entry", &target, err))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_link(link: &Path, target: &Path) -> FsResult<()> {
    let points_to = std::fs::read_link(link).map_err(|err| FsError::new("copy.read_link", link, err))?;
    if std::fs::symlink_metadata(target).is_ok() {
        std::fs::remove_file(target).map_err(|err| FsError::new("copy.replace_link", target, err))?;
    }
    std::os::unix::fs::symlink(points_to, target).map_err(|err| FsError::new("copy.link", target, err))
}

#[cfg(not(unix))]
fn copy_link(link: &Path, target: &Path) -> FsResult<()> {
    match std::fs::metadata(link) {
        Ok(metadata) if metadata.is_file() => std::fs::copy(link, target)
            .map(|_| ())
            .map_err(|err| FsError::new("copy.entry", target, err)),
        _ => {
            debug!(path = %link.display(), "skipping directory or dangling link");
            Ok(())
        }
    }
}

/// Remove a file or a whole directory tree
pub async fn remove_entry(path: &Path) -> FsResult<()> {
    let metadata = fs::symlink_metadata(path)
        .await
        .map_err(|source| FsError::new("remove.stat", path, source))?;

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    result.map_err(|source| FsError::new("remove", path, source))
}

/// Rename in place; fails instead of crossing volumes
pub async fn rename_entry(source: &Path, destination: &Path) -> FsResult<()> {
    fs::rename(source, destination)
        .await
        .map_err(|err| FsError::new("rename", source, err))
}

/// Move `source` to `destination`, falling back to copy and delete when
/// the two live on different volumes
pub async fn move_entry(source: &Path, destination: &Path) -> FsResult<()> {
    let renamed = fs::rename(source, destination).await;
    finish_move(renamed, source, destination).await
}

/// Settle a move after the rename attempt
async fn finish_move(renamed: io::Result<()>, source: &Path, destination: &Path) -> FsResult<()> {
    match renamed {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                "cross-volume move, copying"
            );
            copy_entry(source, destination).await?;
            remove_entry(source).await
        }
        Err(err) => Err(FsError::new("move", source, err)),
    }
}

/// Set or clear the read-only flag
pub async fn set_readonly(path: &Path, readonly: bool) -> FsResult<()> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|source| FsError::new("readonly.stat", path, source))?;
    let mut permissions = metadata.permissions();
    apply_readonly(&mut permissions, readonly);
    fs::set_permissions(path, permissions)
        .await
        .map_err(|source| FsError::new("readonly.set", path, source))
}

#[cfg(unix)]
fn apply_readonly(permissions: &mut std::fs::Permissions, readonly: bool) {
    use std::os::unix::fs::PermissionsExt;
    let mode = permissions.mode();
    let mode = if readonly { mode & !0o222 } else { mode | 0o200 };
    permissions.set_mode(mode);
}

#[cfg(not(unix))]
fn apply_readonly(permissions: &mut std::fs::Permissions, readonly: bool) {
    permissions.set_readonly(readonly);
}

/// Set or clear the hidden flag, returning the entry's path afterwards
///
/// Unix has no hidden attribute: the entry is renamed to add or drop the
/// leading dot, and an existing entry with the target name is a failure.
#[cfg(not(windows))]
pub async fn set_hidden(path: &Path, hidden: bool) -> FsResult<PathBuf> {
    let name = crate::files::file_name_of(path);
    let target_name = match (hidden, name.strip_prefix('.')) {
        (true, None) => format!(".{name}"),
        (false, Some(visible)) if !visible.is_empty() => visible.to_string(),
        _ => return Ok(path.to_path_buf()),
    };

    let target = path.with_file_name(target_name);
    if exists(&target).await {
        return Err(FsError::new(
            "hidden.rename",
            &target,
            io::Error::new(io::ErrorKind::AlreadyExists, "target name already exists"),
        ));
    }
    rename_entry(path, &target).await?;
    Ok(target)
}

#[cfg(windows)]
pub async fn set_hidden(path: &Path, hidden: bool) -> FsResult<PathBuf> {
    use std::os::windows::ffi::OsStrExt;
    use std::os::windows::fs::MetadataExt;
    use windows_sys::Win32::Storage::FileSystem::{FILE_ATTRIBUTE_HIDDEN, SetFileAttributesW};

    let metadata = fs::metadata(path)
        .await
        .map_err(|source| FsError::new("hidden.stat", path, source))?;
    let attributes = if hidden {
        metadata.file_attributes() | FILE_ATTRIBUTE_HIDDEN
    } else {
        metadata.file_attributes() & !FILE_ATTRIBUTE_HIDDEN
    };

    let owned = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        let wide: Vec<u16> = owned.as_os_str().encode_wide().chain(Some(0)).collect();
        // SAFETY: `wide` is a NUL-terminated UTF-16 path that outlives the call.
        let ok = unsafe { SetFileAttributesW(wide.as_ptr(), attributes) };
        if ok == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
    })
    .await
    .map_err(|join| FsError::new("hidden.set", path, io::Error::other(join)))?;

    result.map_err(|source| FsError::new("hidden.set", path, source))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_list_names_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let names = list_names(&temp_dir.path().join("nope")).await.unwrap();
        assert!(names.is_empty());
    }

    fn names(walk: &Walk) -> Vec<&str> {
        walk.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_walk_sorted_depth_first() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("b.txt"), "b");
        touch(&temp_dir.path().join("a.txt"), "a");
        touch(&temp_dir.path().join("c/d.txt"), "d");

        let walk = walk(temp_dir.path(), WalkOptions::default()).await.unwrap();
        assert_eq!(names(&walk), vec!["a.txt", "b.txt", "c", "d.txt"]);
        assert!(walk.errors.is_empty());
        assert!(walk.entries[2].is_real_dir());

        let walk = super::walk(temp_dir.path(), WalkOptions::children_only()).await.unwrap();
        assert_eq!(names(&walk), vec!["a.txt", "b.txt", "c"]);

        let walk = super::walk(temp_dir.path(), WalkOptions::contents_first()).await.unwrap();
        assert_eq!(names(&walk), vec!["a.txt", "b.txt", "d.txt", "c"]);
    }

    #[tokio::test]
    async fn test_walk_missing_root_is_an_error_entry() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        let walk = walk(&missing, WalkOptions::default()).await.unwrap();
        assert!(walk.entries.is_empty());
        assert_eq!(walk.errors.len(), 1);
        assert_eq!(walk.errors[0].kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_walk_does_not_follow_links() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("real/a.txt"), "a");
        std::os::unix::fs::symlink(temp_dir.path().join("real"), temp_dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("gone"), temp_dir.path().join("dangling")).unwrap();

        let walk = walk(temp_dir.path(), WalkOptions::default()).await.unwrap();
        assert_eq!(names(&walk), vec!["dangling", "link", "real", "a.txt"]);
        let link = &walk.entries[1];
        assert!(link.is_dir() && link.attributes.symlink);
        assert!(!link.is_real_dir());
        assert!(walk.entries[0].attributes.symlink);
    }

    #[tokio::test]
    async fn test_copy_tree() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        touch(&source.join("one.txt"), "1");
        touch(&source.join("nested/two.txt"), "2");

        let destination = temp_dir.path().join("dst");
        copy_entry(&source, &destination).await.unwrap();

        assert_eq!(std::fs::read_to_string(destination.join("one.txt")).unwrap(), "1");
        assert_eq!(
            std::fs::read_to_string(destination.join("nested/two.txt")).unwrap(),
            "2"
        );
        assert!(source.join("one.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_tree_recreates_links() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("tree");
        touch(&source.join("real/a.txt"), "a");
        std::os::unix::fs::symlink("real", source.join("link")).unwrap();

        let destination = temp_dir.path().join("out/tree");
        copy_entry(&source, &destination).await.unwrap();

        assert_eq!(std::fs::read_to_string(destination.join("real/a.txt")).unwrap(), "a");
        let link = destination.join("link");
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&link).unwrap(), PathBuf::from("real"));
        assert_eq!(std::fs::read_to_string(link.join("a.txt")).unwrap(), "a");
    }

    #[tokio::test]
    async fn test_copy_tree_merges_into_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        touch(&source.join("a.txt"), "new");
        let destination = temp_dir.path().join("dst");
        touch(&destination.join("a.txt"), "old");
        touch(&destination.join("keep.txt"), "keep");

        copy_entry(&source, &destination).await.unwrap();
        assert_eq!(std::fs::read_to_string(destination.join("a.txt")).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(destination.join("keep.txt")).unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_cross_volume_move_copies_then_removes() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        touch(&source.join("a.txt"), "a");
        touch(&source.join("nested/b.txt"), "b");
        let destination = temp_dir.path().join("elsewhere/src");

        let crossed = Err(io::Error::from(io::ErrorKind::CrossesDevices));
        finish_move(crossed, &source, &destination).await.unwrap();

        assert!(!exists(&source).await);
        assert_eq!(std::fs::read_to_string(destination.join("a.txt")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(destination.join("nested/b.txt")).unwrap(), "b");
    }

    #[tokio::test]
    async fn test_failed_move_keeps_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.txt");
        touch(&source, "a");
        let destination = temp_dir.path().join("b.txt");

        let denied = Err(io::Error::from(io::ErrorKind::PermissionDenied));
        let err = finish_move(denied, &source, &destination).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(exists(&source).await);
        assert!(!exists(&destination).await);
    }

    #[tokio::test]
    async fn test_same_kind() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        let other = temp_dir.path().join("b.txt");
        let dir = temp_dir.path().join("d");
        touch(&file, "a");
        touch(&other, "b");
        std::fs::create_dir(&dir).unwrap();

        assert!(same_kind(&file, &other).await);
        assert!(same_kind(&dir, &dir).await);
        assert!(!same_kind(&file, &dir).await);
        assert!(!same_kind(&file, &temp_dir.path().join("missing")).await);
    }

    #[tokio::test]
    async fn test_move_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.txt");
        touch(&source, "x");
        let destination = temp_dir.path().join("moved/a.txt");
        create_dir(destination.parent().unwrap()).await.unwrap();

        move_entry(&source, &destination).await.unwrap();
        assert!(!source.exists());
        assert!(destination.exists());

        remove_entry(&destination).await.unwrap();
        assert!(!exists(&destination).await);
        assert!(remove_entry(&destination).await.is_err());
    }

    #[tokio::test]
    async fn test_set_readonly_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("ro.txt");
        touch(&file, "x");

        set_readonly(&file, true).await.unwrap();
        assert!(std::fs::metadata(&file).unwrap().permissions().readonly());
        set_readonly(&file, false).await.unwrap();
        assert!(!std::fs::metadata(&file).unwrap().permissions().readonly());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_set_hidden_renames_with_dot() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("secret.txt");
        touch(&file, "x");

        let hidden = set_hidden(&file, true).await.unwrap();
        assert_eq!(hidden, temp_dir.path().join(".secret.txt"));
        assert!(hidden.exists());

        let visible = set_hidden(&hidden, false).await.unwrap();
        assert_eq!(visible, file);
        assert_eq!(set_hidden(&visible, false).await.unwrap(), file);
    }

    #[tokio::test]
    async fn test_same_entry() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");
        touch(&a, "a");
        touch(&b, "b");
        assert!(same_entry(&a, &a).await);
        assert!(!same_entry(&a, &b).await);
        assert!(!same_entry(&a, &temp_dir.path().join("missing")).await);
    }
}
