//! Defines [`AuthorProfile`] and the [`Resolver`] which maps author ids to
//! profiles. A missing or broken author file never fails a build: the
//! resolver degrades to a stub profile named after the id and logs a warning.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::entry::{parse_yaml, split_frontmatter, ErrorKind};
use crate::store::{is_content_file, CONTENT_EXTENSIONS};

/// One author's metadata, loaded from `<authors_directory>/<id>.md`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorProfile {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,

    /// The body of the author file, unparsed.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bio: String,
}

impl AuthorProfile {
    /// The degraded profile used when an author can't be loaded.
    pub fn stub(id: &str) -> AuthorProfile {
        AuthorProfile {
            id: id.to_owned(),
            name: id.to_owned(),
            avatar: None,
            occupation: None,
            company: None,
            email: None,
            twitter: None,
            linkedin: None,
            github: None,
            bio: String::new(),
        }
    }

    fn parse(id: &str, input: &str) -> std::result::Result<AuthorProfile, ErrorKind> {
        let (yaml, body) = split_frontmatter(input)?;
        let fm: AuthorFrontmatter = parse_yaml(yaml)?;
        Ok(AuthorProfile {
            id: id.to_owned(),
            name: fm.name.ok_or(ErrorKind::MissingField("name"))?,
            avatar: fm.avatar,
            occupation: fm.occupation,
            company: fm.company,
            email: fm.email,
            twitter: fm.twitter,
            linkedin: fm.linkedin,
            github: fm.github,
            bio: body.trim().to_owned(),
        })
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AuthorFrontmatter {
    name: Option<String>,
    avatar: Option<String>,
    occupation: Option<String>,
    company: Option<String>,
    email: Option<String>,
    twitter: Option<String>,
    linkedin: Option<String>,
    github: Option<String>,
}

/// The outcome of resolving an author id. Kept distinct from
/// [`AuthorProfile`] so callers (and tests) can tell a loaded profile from a
/// degraded one without inspecting field values.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Found(Arc<AuthorProfile>),
    Stub(String),
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    /// Collapses the resolution into a single profile shape.
    pub fn into_profile(self) -> AuthorProfile {
        match self {
            Resolution::Found(profile) => (*profile).clone(),
            Resolution::Stub(id) => AuthorProfile::stub(&id),
        }
    }
}

/// Resolves author ids against a directory of author files. Results are
/// cached for the lifetime of the resolver, which is one build pass; the
/// author files are assumed not to change during that time.
pub struct Resolver {
    directory: PathBuf,
    cache: RwLock<HashMap<String, Resolution>>,
}

impl Resolver {
    pub fn new(directory: impl Into<PathBuf>) -> Resolver {
        Resolver {
            directory: directory.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Resolves `id`, consulting the cache first. Two threads racing on the
    /// same uncached id both load it and store equal values.
    pub fn resolve(&self, id: &str) -> Resolution {
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(id) {
                return hit.clone();
            }
        }

        let resolution = match self.load(id) {
            Ok(profile) => Resolution::Found(Arc::new(profile)),
            Err(err) => {
                tracing::warn!(author = id, %err, "using stub author profile");
                Resolution::Stub(id.to_owned())
            }
        };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id.to_owned(), resolution.clone());
        }
        resolution
    }

    /// Resolves `id` and collapses the result to a profile. Never fails.
    pub fn profile(&self, id: &str) -> AuthorProfile {
        self.resolve(id).into_profile()
    }

    /// Lists the ids of every author file in the directory, sorted. A missing
    /// directory yields no ids.
    pub fn list_ids(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids = Vec::new();
        for result in entries {
            let path = result?.path();
            if !path.is_file() || !is_content_file(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_owned());
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn load(&self, id: &str) -> std::result::Result<AuthorProfile, Lookup> {
        if !is_valid_id(id) {
            return Err(Lookup::InvalidId(id.to_owned()));
        }

        for ext in CONTENT_EXTENSIONS {
            let path = self.directory.join(format!("{}.{}", id, ext));
            match fs::read_to_string(&path) {
                Ok(contents) => {
                    return AuthorProfile::parse(id, &contents)
                        .map_err(|kind| Lookup::Malformed { path, kind });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Lookup::Io { path, err: e }),
            }
        }
        Err(Lookup::NotFound(id.to_owned()))
    }
}

/// Reports whether `id` can name an author file: non-empty, with no path
/// separators and no `..`.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

/// Why an author lookup degraded to a stub. Only ever logged, never returned
/// from the public API.
#[derive(Debug, thiserror::Error)]
enum Lookup {
    #[error("author file not found for `{0}`")]
    NotFound(String),

    #[error("`{0}` is not a valid author id")]
    InvalidId(String),

    #[error("reading `{}`: {}", .path.display(), .err)]
    Io { path: PathBuf, err: io::Error },

    #[error("malformed author file `{}`: {}", .path.display(), .kind)]
    Malformed { path: PathBuf, kind: ErrorKind },
}
