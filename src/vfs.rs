use crate::{
    config::Configuration,
    template::{ContentProducer, TemplateError},
};
use miette::Diagnostic;
use std::{
    fmt,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("path '{path}' escapes the target root")]
#[diagnostic(
    code(kickstack::vfs::path_escape),
    help("Scaffold paths are relative and may not contain '..', '.', empty or absolute segments")
)]
pub struct PathEscape {
    pub path: String,
}

/// A path below the target root, kept as `/`-separated segments.
///
/// Construction does not validate; [`RelativePath::resolve_under`] does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelativePath {
    segments: Vec<String>,
}
impl RelativePath {
    pub fn new(path: &str) -> Self {
        Self {
            segments: path.split('/').map(String::from).collect(),
        }
    }
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
    /// The segments naming the directories that contain the file.
    pub fn parent_segments(&self) -> &[String] {
        match self.segments.split_last() {
            Some((_, parents)) => parents,
            None => &[],
        }
    }
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
    /// Joins the path onto `root`, refusing every segment that is not a single plain name.
    pub fn resolve_under(&self, root: &Path) -> Result<PathBuf, PathEscape> {
        let mut target = root.to_path_buf();

        for segment in &self.segments {
            let mut components = Path::new(segment).components();

            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => target.push(name),
                _ => {
                    return Err(PathEscape {
                        path: self.to_string(),
                    })
                }
            }
        }

        Ok(target)
    }
}
impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A file staged in memory, not yet written to disk.
#[derive(Debug)]
pub struct VirtualFile {
    path: RelativePath,
    producer: Box<dyn ContentProducer>,
}
impl VirtualFile {
    pub fn new(path: &str, producer: impl ContentProducer + 'static) -> Self {
        Self {
            path: RelativePath::new(path),
            producer: Box::new(producer),
        }
    }
    pub fn path(&self) -> &RelativePath {
        &self.path
    }
    pub fn produce(&self, config: &Configuration) -> Result<Vec<u8>, TemplateError> {
        self.producer.produce(config)
    }
}

/// The ordered set of [`VirtualFile`]s written by one run.
#[derive(Debug, Default)]
pub struct Scaffold {
    files: Vec<VirtualFile>,
}
impl Scaffold {
    pub fn new(files: Vec<VirtualFile>) -> Self {
        Self { files }
    }
    pub fn files(&self) -> &[VirtualFile] {
        &self.files
    }
    pub fn len(&self) -> usize {
        self.files.len()
    }
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
