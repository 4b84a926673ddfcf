use std::{
    fs,
    io::{self, Write},
    path::Path,
};

const STAGING_PREFIX: &str = ".kickstack-";
const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// A symbolic link, whatever it points at.
    Symlink,
    /// Sockets, devices and the like.
    Other,
}

/// The filesystem operations the materialization engine relies on.
pub trait Filesystem {
    /// What currently occupies `path`, without following a symlink. `Ok(None)` when nothing does.
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>>;
    /// Creates a single directory whose parent already exists.
    fn create_dir(&self, path: &Path) -> io::Result<()>;
    /// Writes a new file, failing with [`io::ErrorKind::AlreadyExists`] rather than clobbering.
    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    /// Atomically replaces the content of an existing file.
    fn replace(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// The real filesystem. Writes are staged in a sibling temp file and moved into place, so a
/// target is never observed half-written.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    fn stage(path: &Path, contents: &[u8]) -> io::Result<tempfile::NamedTempFile> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory")
        })?;

        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(parent)?;

        staged.write_all(contents)?;
        staged.as_file().sync_all()?;

        Ok(staged)
    }
}

impl Filesystem for LocalFilesystem {
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_symlink() => Ok(Some(EntryKind::Symlink)),
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(meta) if meta.is_file() => Ok(Some(EntryKind::File)),
            Ok(_) => Ok(Some(EntryKind::Other)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let staged = Self::stage(path, contents)?;

        staged.persist_noclobber(path).map_err(|err| err.error)?;

        Ok(())
    }

    fn replace(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let staged = Self::stage(path, contents)?;

        if let Ok(meta) = fs::metadata(path) {
            staged.as_file().set_permissions(meta.permissions())?;
        }

        staged.persist(path).map_err(|err| err.error)?;

        Ok(())
    }
}
