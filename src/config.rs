//! Loads the project configuration from a `broadsheet.yaml` file. Relative
//! paths in the project file are resolved against the file's directory.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::paginate::DEFAULT_PAGE_SIZE;

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "broadsheet.yaml";

#[derive(Deserialize)]
struct PageSize(NonZeroUsize);

impl Default for PageSize {
    fn default() -> Self {
        PageSize(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Deserialize)]
struct Project {
    title: String,

    #[serde(default)]
    description: String,

    site_url: Url,

    #[serde(default)]
    author: Option<String>,

    #[serde(default)]
    email: Option<String>,

    #[serde(default = "default_content_directory")]
    content_directory: PathBuf,

    #[serde(default = "default_authors_directory")]
    authors_directory: PathBuf,

    #[serde(default = "default_output_directory")]
    output_directory: PathBuf,

    #[serde(default = "default_authors_route")]
    authors_route: String,

    #[serde(default)]
    page_size: PageSize,

    #[serde(default = "default_collections")]
    collections: Vec<CollectionProject>,
}

#[derive(Deserialize)]
struct CollectionProject {
    name: String,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    feed: Option<PathBuf>,

    #[serde(default)]
    tags: Option<String>,

    #[serde(default)]
    page_size: Option<NonZeroUsize>,
}

fn default_content_directory() -> PathBuf {
    PathBuf::from("data")
}

fn default_authors_directory() -> PathBuf {
    PathBuf::from("data/authors")
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("public")
}

fn default_authors_route() -> String {
    String::from("authors")
}

fn default_collections() -> Vec<CollectionProject> {
    vec![
        CollectionProject {
            name: String::from("blog"),
            title: Some(String::from("All Posts")),
            feed: Some(PathBuf::from("feed.xml")),
            tags: Some(String::from("tags")),
            page_size: None,
        },
        CollectionProject {
            name: String::from("newsletters"),
            title: None,
            feed: None,
            tags: None,
            page_size: None,
        },
    ]
}

/// The site author, credited on feeds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: Option<String>,
}

/// One named collection of content files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collection {
    /// The collection's directory name under the content directory. Also its
    /// route: listing pages live under `{output}/{name}/`.
    pub name: String,

    /// The heading of the collection's listing pages.
    pub title: String,

    /// The feed location, relative to the output directory.
    pub feed: PathBuf,

    /// The route tag pages and tag feeds are written under. `None` means the
    /// collection isn't tag-indexed.
    pub tags_route: Option<String>,

    pub page_size: NonZeroUsize,
}

/// The resolved build configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub description: String,

    /// The site's root URL, always with a trailing slash.
    pub site_url: Url,

    pub author: Option<Author>,
    pub content_directory: PathBuf,
    pub authors_directory: PathBuf,
    pub output_directory: PathBuf,
    pub authors_route: String,
    pub collections: Vec<Collection>,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a [`PROJECT_FILE`]
    /// and loads the first one found. `output_directory` overrides the
    /// project's own output directory.
    pub fn from_directory(dir: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let path = dir.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path, output_directory);
            }
            current = dir.parent();
        }
        Err(Error::NotFound(dir.to_owned()))
    }

    /// Loads the project file at `path`.
    pub fn from_project_file(path: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let file = File::open(path).map_err(|err| Error::Open {
            path: path.to_owned(),
            err,
        })?;
        let project: Project = serde_yaml::from_reader(file).map_err(|err| Error::Yaml {
            path: path.to_owned(),
            err,
        })?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Config::from_project(project, root, output_directory)
    }

    fn from_project(
        project: Project,
        root: &Path,
        output_directory: Option<&Path>,
    ) -> Result<Config> {
        let mut names = HashSet::new();
        let mut collections = Vec::with_capacity(project.collections.len());
        for c in project.collections {
            if !is_route(&c.name) {
                return Err(Error::InvalidRoute(c.name));
            }
            if !names.insert(c.name.clone()) {
                return Err(Error::DuplicateCollection(c.name));
            }
            if let Some(tags) = &c.tags {
                if !is_route(tags) {
                    return Err(Error::InvalidRoute(tags.clone()));
                }
            }
            collections.push(Collection {
                title: c.title.unwrap_or_else(|| capitalize(&c.name)),
                feed: c
                    .feed
                    .unwrap_or_else(|| Path::new(&c.name).join("feed.xml")),
                tags_route: c.tags,
                page_size: c.page_size.unwrap_or(project.page_size.0),
                name: c.name,
            });
        }
        if !is_route(&project.authors_route) {
            return Err(Error::InvalidRoute(project.authors_route));
        }

        Ok(Config {
            title: project.title,
            description: project.description,
            site_url: with_trailing_slash(project.site_url),
            author: project.author.map(|name| Author {
                name,
                email: project.email,
            }),
            content_directory: root.join(project.content_directory),
            authors_directory: root.join(project.authors_directory),
            output_directory: match output_directory {
                Some(dir) => dir.to_owned(),
                None => root.join(project.output_directory),
            },
            authors_route: project.authors_route,
            collections,
        })
    }

    /// The URL of `route` under the site root. Directory routes should end
    /// in `/` so that further joins nest beneath them.
    pub fn url(&self, route: &str) -> std::result::Result<Url, url::ParseError> {
        self.site_url.join(route)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Reports whether `route` is usable as a relative output path: non-empty,
/// `/`-separated segments, none of which is `.` or `..`.
fn is_route(route: &str) -> bool {
    !route.is_empty()
        && !route.starts_with('/')
        && route
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != ".." && !seg.contains('\\'))
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the project configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when no project file exists in the directory or any parent.
    #[error("could not find `{}` in `{}` or any parent directory", PROJECT_FILE, .0.display())]
    NotFound(PathBuf),

    #[error("opening project file `{}`: {}", .path.display(), .err)]
    Open {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("parsing project file `{}`: {}", .path.display(), .err)]
    Yaml {
        path: PathBuf,
        #[source]
        err: serde_yaml::Error,
    },

    #[error("`{0}` is not a valid route")]
    InvalidRoute(String),

    #[error("collection `{0}` is configured twice")]
    DuplicateCollection(String),
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PROJECT_FILE),
            "title: Example\nsite_url: https://example.com/blog-root\n",
        )
        .unwrap();

        let nested = dir.path().join("data").join("blog");
        fs::create_dir_all(&nested).unwrap();
        let config = Config::from_directory(&nested, None)?;

        assert_eq!(config.site_url.as_str(), "https://example.com/blog-root/");
        assert_eq!(config.content_directory, dir.path().join("data"));
        assert_eq!(config.authors_directory, dir.path().join("data/authors"));
        assert_eq!(config.output_directory, dir.path().join("public"));
        assert_eq!(config.author, None);

        let names: Vec<&str> = config.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["blog", "newsletters"]);
        assert_eq!(config.collections[0].feed, PathBuf::from("feed.xml"));
        assert_eq!(config.collections[0].title, "All Posts");
        assert_eq!(config.collections[1].title, "Newsletters");
        assert_eq!(config.collections[0].tags_route.as_deref(), Some("tags"));
        assert_eq!(config.collections[1].feed, PathBuf::from("newsletters/feed.xml"));
        assert_eq!(config.collections[1].page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(
            config.url("blog/").unwrap().as_str(),
            "https://example.com/blog-root/blog/"
        );
        Ok(())
    }

    #[test]
    fn test_explicit_settings() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE);
        fs::write(
            &path,
            "title: Example
site_url: https://example.com/
author: Jane
email: jane@example.com
page_size: 10
collections:
  - name: posts
    tags: topics
    page_size: 5
",
        )
        .unwrap();

        let out = dir.path().join("elsewhere");
        let config = Config::from_project_file(&path, Some(&out))?;
        assert_eq!(config.output_directory, out);
        assert_eq!(
            config.author,
            Some(Author {
                name: "Jane".to_owned(),
                email: Some("jane@example.com".to_owned()),
            })
        );
        assert_eq!(
            config.collections,
            vec![Collection {
                name: "posts".to_owned(),
                title: "Posts".to_owned(),
                feed: PathBuf::from("posts/feed.xml"),
                tags_route: Some("topics".to_owned()),
                page_size: NonZeroUsize::new(5).unwrap(),
            }]
        );
        Ok(())
    }

    #[test]
    fn test_rejects_zero_page_size_and_bad_routes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE);

        fs::write(&path, "title: T\nsite_url: https://e.com/\npage_size: 0\n").unwrap();
        assert!(matches!(
            Config::from_project_file(&path, None),
            Err(Error::Yaml { .. })
        ));

        fs::write(
            &path,
            "title: T\nsite_url: https://e.com/\ncollections:\n  - name: ../escape\n",
        )
        .unwrap();
        assert!(matches!(
            Config::from_project_file(&path, None),
            Err(Error::InvalidRoute(_))
        ));

        fs::write(
            &path,
            "title: T\nsite_url: https://e.com/\ncollections:\n  - name: a\n  - name: a\n",
        )
        .unwrap();
        assert!(matches!(
            Config::from_project_file(&path, None),
            Err(Error::DuplicateCollection(_))
        ));
    }

    #[test]
    fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        // The temp dir's ancestors are assumed not to contain a project file.
        assert!(matches!(
            Config::from_directory(dir.path(), None),
            Err(Error::NotFound(_))
        ));
    }
}
