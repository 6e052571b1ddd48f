//! Defines the [`ContentStore`] trait, which lists and reads the raw content
//! files of a collection, and [`FsStore`], its filesystem implementation.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// The extensions recognized as content files.
pub const CONTENT_EXTENSIONS: [&str; 2] = ["md", "mdx"];

/// A single content file within a collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    /// The path of the file relative to the collection directory (e.g.,
    /// `2021/hello.md`). This is what slugs are derived from.
    pub relative_path: PathBuf,

    /// The location the store reads the file from.
    pub full_path: PathBuf,
}

/// Lists and reads the content files belonging to named collections. The
/// listing must be deterministic so that aggregation output is stable from
/// one build to the next.
pub trait ContentStore: Sync {
    /// Returns the content files of `collection`, in enumeration order.
    fn list(&self, collection: &str) -> Result<Vec<Source>>;

    /// Reads the full text of a single content file.
    fn read(&self, source: &Source) -> io::Result<String>;
}

/// A [`ContentStore`] backed by a directory on disk. Each collection is a
/// subdirectory of `root`; content files may be nested arbitrarily deep.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> FsStore {
        FsStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentStore for FsStore {
    fn list(&self, collection: &str) -> Result<Vec<Source>> {
        let dir = self.root.join(collection);
        if !dir.is_dir() {
            return Err(Error::MissingCollection(dir));
        }

        let mut sources = Vec::new();
        for result in WalkDir::new(&dir).sort_by_file_name() {
            let entry = result?;
            if !entry.file_type().is_file() || !is_content_file(entry.path()) {
                continue;
            }
            // strip_prefix can't fail, WalkDir only yields descendants of `dir`
            let relative_path = match entry.path().strip_prefix(&dir) {
                Ok(p) => p.to_owned(),
                Err(_) => continue,
            };
            sources.push(Source {
                relative_path,
                full_path: entry.path().to_owned(),
            });
        }
        Ok(sources)
    }

    fn read(&self, source: &Source) -> io::Result<String> {
        std::fs::read_to_string(&source.full_path)
    }
}

/// Reports whether `path` carries one of the [`CONTENT_EXTENSIONS`].
pub fn is_content_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| CONTENT_EXTENSIONS.contains(&ext))
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to list a collection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the collection's directory doesn't exist.
    #[error("collection directory `{}` does not exist", .0.display())]
    MissingCollection(PathBuf),

    /// Returned for I/O errors while walking the collection directory.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
}
