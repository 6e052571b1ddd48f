//! Defines the [`ContentEntry`] type and the front-matter parsing logic which
//! turns a content file's raw text into one. Front-matter is validated once,
//! here; everything downstream can rely on required fields being present and
//! dates being real calendar dates.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};

/// The author id used when a content file doesn't declare `authors`.
pub const DEFAULT_AUTHOR: &str = "default";

/// One content file's parsed representation.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentEntry {
    /// Unique within the collection. Derived from the file's path relative to
    /// the collection directory: lowercased, extension stripped, components
    /// joined with `/` (e.g., `Guides/Intro.mdx` becomes `guides/intro`).
    pub slug: String,

    pub title: String,

    /// The publication date.
    pub date: EntryDate,

    /// The `lastmod` front-matter value, if any.
    pub last_modified: Option<EntryDate>,

    /// The tags as written in the source, trimmed. `None` when the `tags` key
    /// is absent, which is distinct from an empty list.
    pub tags: Option<Vec<String>>,

    /// Author ids in declaration order. Defaults to [`DEFAULT_AUTHOR`].
    pub author_ids: Vec<String>,

    pub draft: bool,

    pub summary: Option<String>,

    /// The raw content following the front-matter. Not interpreted here.
    pub body: String,

    /// The source file, relative to the collection directory.
    pub source_path: PathBuf,
}

impl ContentEntry {
    /// Parses a content file. `relative_path` is the file's path relative to
    /// its collection directory and is used both to derive the slug and to
    /// annotate errors.
    ///
    /// The file must be structured as follows:
    ///
    /// 1. Initial frontmatter fence (`---`)
    /// 2. YAML frontmatter with fields `title`, `date`, and optionally
    ///    `lastmod`, `tags`, `authors`, `draft` and `summary`
    /// 3. Terminal frontmatter fence (`---`)
    /// 4. Body
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// date: 2021-04-16
    /// tags: [greet]
    /// ---
    /// # Hello
    /// ```
    pub fn parse(relative_path: &Path, input: &str) -> Result<ContentEntry> {
        let annotate = |kind| Error::Malformed {
            path: relative_path.to_owned(),
            kind,
        };

        let (yaml, body) = split_frontmatter(input).map_err(annotate)?;
        let frontmatter: Frontmatter = parse_yaml(yaml).map_err(annotate)?;

        let title = frontmatter
            .title
            .ok_or(ErrorKind::MissingField("title"))
            .map_err(annotate)?;
        let date = frontmatter
            .date
            .ok_or(ErrorKind::MissingField("date"))
            .and_then(|raw| EntryDate::parse(&raw))
            .map_err(annotate)?;
        let last_modified = frontmatter
            .lastmod
            .map(|raw| EntryDate::parse(&raw))
            .transpose()
            .map_err(annotate)?;

        Ok(ContentEntry {
            slug: slug_from_path(relative_path).map_err(annotate)?,
            title,
            date,
            last_modified,
            tags: frontmatter.tags.map(|tags| {
                tags.iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect()
            }),
            author_ids: frontmatter
                .authors
                .unwrap_or_else(|| vec![DEFAULT_AUTHOR.to_owned()]),
            draft: frontmatter.draft,
            summary: frontmatter.summary,
            body: body.to_owned(),
            source_path: relative_path.to_owned(),
        })
    }

    /// The tags, or an empty slice when the entry declares none.
    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }

    /// The most recent of `lastmod` and `date`.
    pub fn updated(&self) -> &EntryDate {
        match &self.last_modified {
            Some(lastmod) if lastmod.value > self.date.value => lastmod,
            _ => &self.date,
        }
    }
}

/// A validated front-matter date. The raw text is kept so page data shows
/// exactly what the author wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryDate {
    pub raw: String,
    pub value: DateTime<FixedOffset>,
}

impl EntryDate {
    /// Parses an ISO-8601 date (`2021-04-16`, midnight UTC) or date-time
    /// (RFC 3339, or a naive `2021-04-16T09:30:00` read as UTC).
    pub fn parse(raw: &str) -> std::result::Result<EntryDate, ErrorKind> {
        let trimmed = raw.trim();
        let utc = FixedOffset::east_opt(0).ok_or_else(|| ErrorKind::InvalidDate(raw.to_owned()))?;

        let value = if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            dt
        } else if let Some(naive) = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        {
            naive.and_utc().with_timezone(&utc)
        } else {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc().with_timezone(&utc))
                .ok_or_else(|| ErrorKind::InvalidDate(raw.to_owned()))?
        };

        Ok(EntryDate {
            raw: trimmed.to_owned(),
            value,
        })
    }
}

impl Serialize for EntryDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Frontmatter {
    title: Option<String>,
    date: Option<String>,
    lastmod: Option<String>,
    tags: Option<Vec<String>>,
    authors: Option<Vec<String>>,
    draft: bool,
    summary: Option<String>,
}

/// Splits a content file into its YAML front-matter and body.
pub(crate) fn split_frontmatter(input: &str) -> std::result::Result<(&str, &str), ErrorKind> {
    const FENCE: &str = "---";

    let input = input.trim_start_matches('\u{feff}').trim_start();
    let mut lines = input.split_inclusive('\n');
    let opening = lines.next().unwrap_or_default();
    if opening.trim_end() != FENCE {
        return Err(ErrorKind::MissingStartFence);
    }

    // Only a line which is exactly `---` (trailing whitespace aside) closes
    // the front-matter.
    let start = opening.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == FENCE {
            let body = &input[offset + line.len()..];
            return Ok((&input[start..offset], body.trim_start_matches(['\r', '\n'])));
        }
        offset += line.len();
    }
    Err(ErrorKind::MissingEndFence)
}

/// Deserializes front-matter YAML, treating an empty block as all defaults.
pub(crate) fn parse_yaml<T>(yaml: &str) -> std::result::Result<T, ErrorKind>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if yaml.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(yaml).map_err(ErrorKind::Yaml)
}

/// Derives a slug from a path relative to the collection directory.
pub fn slug_from_path(relative_path: &Path) -> std::result::Result<String, ErrorKind> {
    let stem = relative_path.with_extension("");
    let mut parts = Vec::new();
    for component in stem.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| ErrorKind::InvalidFileName(relative_path.to_owned()))?;
        parts.push(part.to_lowercase());
    }
    if parts.is_empty() {
        return Err(ErrorKind::InvalidFileName(relative_path.to_owned()));
    }
    Ok(parts.join("/"))
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a content file whose front-matter is missing, incomplete, or
/// unparsable. Fatal for that one file only.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed front-matter in `{}`: {}", .path.display(), .kind)]
    Malformed { path: PathBuf, kind: ErrorKind },
}

impl Error {
    /// The offending file, relative to its collection directory.
    pub fn path(&self) -> &Path {
        match self {
            Error::Malformed { path, .. } => path,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        match self {
            Error::Malformed { kind, .. } => kind,
        }
    }
}

/// What exactly was wrong with a content file.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Returned when a source file is missing its starting frontmatter fence
    /// (`---`).
    #[error("content must begin with `---`")]
    MissingStartFence,

    /// Returned when the starting fence was found but the terminal one was
    /// missing.
    #[error("missing closing `---`")]
    MissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    #[error(transparent)]
    Yaml(serde_yaml::Error),

    /// Returned when a required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// Returned when a date doesn't name a valid calendar date.
    #[error("invalid date `{0}`")]
    InvalidDate(String),

    /// Returned when a path isn't valid UTF-8 or has no file name.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(PathBuf),
}
