use crate::{
    config::{Configuration, OverwritePolicy},
    errors::{FileOperation, IoError},
    exit_codes,
    filesystem::{EntryKind, Filesystem},
    template::TemplateError,
    vfs::{PathEscape, RelativePath, Scaffold, VirtualFile},
};
use miette::Diagnostic;
use std::{
    fmt, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MaterializeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    PathEscape(#[from] PathEscape),

    #[error("'{path}' is in the way, expected {expected}")]
    #[diagnostic(
        code(kickstack::materialize::filesystem_conflict),
        help("Move or remove the conflicting entry, then re-run")
    )]
    FilesystemConflict {
        path: PathBuf,
        expected: &'static str,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists,
}
impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "already exists"),
        }
    }
}

/// What happened to a single virtual file.
#[derive(Debug)]
pub enum WriteOutcome {
    Created,
    Skipped(SkipReason),
    Overwritten,
    Failed(MaterializeError),
}
impl WriteOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::Skipped(_) => "skip",
            Self::Overwritten => "overwrite",
            Self::Failed(_) => "fail",
        }
    }
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub path: RelativePath,
    /// `None` when the path could not be resolved under the root.
    pub target: Option<PathBuf>,
    pub outcome: WriteOutcome,
}

/// Per-file outcomes of one run, in scaffold order.
#[derive(Debug)]
pub struct RunSummary {
    pub root: PathBuf,
    pub files: Vec<FileReport>,
    /// Directories that did not exist before the run, in creation order.
    pub directories_created: Vec<PathBuf>,
}
impl RunSummary {
    fn count(&self, predicate: impl Fn(&WriteOutcome) -> bool) -> usize {
        self.files
            .iter()
            .filter(|report| predicate(&report.outcome))
            .count()
    }
    pub fn created(&self) -> usize {
        self.count(|outcome| matches!(outcome, WriteOutcome::Created))
    }
    pub fn overwritten(&self) -> usize {
        self.count(|outcome| matches!(outcome, WriteOutcome::Overwritten))
    }
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, WriteOutcome::Skipped(_)))
    }
    pub fn failed(&self) -> usize {
        self.count(WriteOutcome::is_failed)
    }
    pub fn has_failures(&self) -> bool {
        self.files.iter().any(|report| report.outcome.is_failed())
    }
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            exit_codes::FILE_FAILED
        } else {
            exit_codes::OK
        }
    }
}

/// Writes every file of `scaffold` under the configured root.
///
/// Files are independent: a failure is recorded as [`WriteOutcome::Failed`] for that file and
/// the remaining files are still processed. Existing files are only replaced under
/// [`OverwritePolicy::Force`], and always through an atomic rename.
pub fn materialize<F: Filesystem>(
    scaffold: &Scaffold,
    config: &Configuration,
    fs: &F,
) -> RunSummary {
    let mut directories_created = Vec::new();
    let mut files = Vec::with_capacity(scaffold.len());

    for file in scaffold.files() {
        let (target, result) = match file.path().resolve_under(config.root()) {
            Ok(target) => {
                let result = write_virtual_file(file, &target, config, fs, &mut directories_created);
                (Some(target), result)
            }
            Err(escape) => (None, Err(MaterializeError::from(escape))),
        };

        let outcome = result.unwrap_or_else(|error| {
            log::warn!("failed to materialize {}: {}", file.path(), error);
            WriteOutcome::Failed(error)
        });

        log::debug!("{}: {}", outcome.label(), file.path());

        files.push(FileReport {
            path: file.path().clone(),
            target,
            outcome,
        });
    }

    RunSummary {
        root: config.root().to_path_buf(),
        files,
        directories_created,
    }
}

fn write_virtual_file<F: Filesystem>(
    file: &VirtualFile,
    target: &Path,
    config: &Configuration,
    fs: &F,
    directories_created: &mut Vec<PathBuf>,
) -> Result<WriteOutcome, MaterializeError> {
    for (directory, links) in directory_chain(config.root(), file.path()) {
        ensure_directory(fs, &directory, links, directories_created)?;
    }

    match (stat(fs, target)?, config.overwrite()) {
        (None, _) => {
            let contents = file.produce(config)?;

            match fs.write_new(target, &contents) {
                Ok(()) => Ok(WriteOutcome::Created),
                // appeared since the stat; never clobber it
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                    Ok(WriteOutcome::Skipped(SkipReason::AlreadyExists))
                }
                Err(error) => {
                    Err(IoError::new(FileOperation::Write, target.to_path_buf(), error).into())
                }
            }
        }
        (Some(_), OverwritePolicy::KeepExisting) => {
            Ok(WriteOutcome::Skipped(SkipReason::AlreadyExists))
        }
        (Some(EntryKind::File), OverwritePolicy::Force) => {
            let contents = file.produce(config)?;

            fs.replace(target, &contents)
                .map_err(|error| IoError::new(FileOperation::Replace, target.to_path_buf(), error))?;

            Ok(WriteOutcome::Overwritten)
        }
        (Some(_), OverwritePolicy::Force) => Err(MaterializeError::FilesystemConflict {
            path: target.to_path_buf(),
            expected: "a regular file",
        }),
    }
}

/// Whether a symlink may stand in for a directory at a given spot in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Links {
    /// The root and its ancestors.
    Follow,
    /// Directories below the root.
    Refuse,
}

fn serves_as_directory(kind: EntryKind, links: Links) -> bool {
    matches!(
        (kind, links),
        (EntryKind::Directory, _) | (EntryKind::Symlink, Links::Follow)
    )
}

/// Creates `directory` unless it already exists. Its parent must already exist.
fn ensure_directory<F: Filesystem>(
    fs: &F,
    directory: &Path,
    links: Links,
    directories_created: &mut Vec<PathBuf>,
) -> Result<(), MaterializeError> {
    match stat(fs, directory)? {
        Some(kind) if serves_as_directory(kind, links) => Ok(()),
        Some(_) => Err(MaterializeError::FilesystemConflict {
            path: directory.to_path_buf(),
            expected: "a directory",
        }),
        None => {
            fs.create_dir(directory)
                .map_err(|error| IoError::new(FileOperation::Mkdir, directory.to_path_buf(), error))?;

            log::debug!("...created dir: {}", directory.display());
            directories_created.push(directory.to_path_buf());

            Ok(())
        }
    }
}

/// Every directory that must exist before `path` can be written, outermost first: the root's
/// ancestors, the root, then the file's parent directories below it.
fn directory_chain(root: &Path, path: &RelativePath) -> Vec<(PathBuf, Links)> {
    let mut chain: Vec<(PathBuf, Links)> = root
        .ancestors()
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .map(|ancestor| (ancestor.to_path_buf(), Links::Follow))
        .collect();
    chain.reverse();

    let mut directory = root.to_path_buf();
    for segment in path.parent_segments() {
        directory.push(segment);
        chain.push((directory.clone(), Links::Refuse));
    }

    chain
}

fn stat<F: Filesystem>(fs: &F, path: &Path) -> Result<Option<EntryKind>, MaterializeError> {
    fs.entry_kind(path)
        .map_err(|error| IoError::new(FileOperation::Stat, path.to_path_buf(), error).into())
}

/// The action a run would take for one file, computed without writing anything.
#[derive(Debug)]
pub enum PlannedAction {
    Create,
    Skip(SkipReason),
    Overwrite,
    Reject(MaterializeError),
}
impl PlannedAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Skip(_) => "skip",
            Self::Overwrite => "overwrite",
            Self::Reject(_) => "reject",
        }
    }
}

#[derive(Debug)]
pub struct PlannedFile {
    pub path: RelativePath,
    pub action: PlannedAction,
}

/// Read-only dry run of [`materialize`].
pub fn plan<F: Filesystem>(
    scaffold: &Scaffold,
    config: &Configuration,
    fs: &F,
) -> Vec<PlannedFile> {
    scaffold
        .files()
        .iter()
        .map(|file| {
            let action = plan_file(file, config, fs).unwrap_or_else(PlannedAction::Reject);

            PlannedFile {
                path: file.path().clone(),
                action,
            }
        })
        .collect()
}

fn plan_file<F: Filesystem>(
    file: &VirtualFile,
    config: &Configuration,
    fs: &F,
) -> Result<PlannedAction, MaterializeError> {
    let target = file.path().resolve_under(config.root())?;

    for (directory, links) in directory_chain(config.root(), file.path()) {
        match stat(fs, &directory)? {
            Some(kind) if serves_as_directory(kind, links) => {}
            Some(_) => {
                return Err(MaterializeError::FilesystemConflict {
                    path: directory,
                    expected: "a directory",
                })
            }
            // nothing below a missing directory can exist yet
            None => return Ok(PlannedAction::Create),
        }
    }

    match (stat(fs, &target)?, config.overwrite()) {
        (None, _) => Ok(PlannedAction::Create),
        (Some(_), OverwritePolicy::KeepExisting) => {
            Ok(PlannedAction::Skip(SkipReason::AlreadyExists))
        }
        (Some(EntryKind::File), OverwritePolicy::Force) => Ok(PlannedAction::Overwrite),
        (Some(_), OverwritePolicy::Force) => Err(MaterializeError::FilesystemConflict {
            path: target,
            expected: "a regular file",
        }),
    }
}
