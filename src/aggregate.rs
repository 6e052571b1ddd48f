//! Loads a whole collection and joins each entry with its authors. Parsing and
//! author resolution run in parallel; output order always matches the
//! store's enumeration order. The aggregator never sorts: see
//! [`sort_newest_first`] for the ordering the build applies afterwards.

use std::collections::HashMap;
use std::path::PathBuf;

use rayon::prelude::*;

use crate::author::{AuthorProfile, Resolver};
use crate::entry::{self, ContentEntry};
use crate::store::{self, ContentStore, Source};

/// A [`ContentEntry`] joined with its resolved author profiles.
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichedEntry {
    pub entry: ContentEntry,

    /// One profile per `entry.author_ids` element, in the same order. `None`
    /// when the entry names no authors at all.
    pub authors: Option<Vec<AuthorProfile>>,
}

/// The result of aggregating one collection.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Successfully parsed entries, in enumeration order.
    pub entries: Vec<EnrichedEntry>,

    /// Files which couldn't be read or parsed. Each one only loses its own
    /// contribution.
    pub failures: Vec<SourceError>,
}

/// Parses collections out of a [`ContentStore`] and resolves their authors.
pub struct Aggregator<'a, S: ContentStore> {
    store: &'a S,
    resolver: &'a Resolver,
}

impl<'a, S: ContentStore> Aggregator<'a, S> {
    pub fn new(store: &'a S, resolver: &'a Resolver) -> Aggregator<'a, S> {
        Aggregator { store, resolver }
    }

    /// Loads every entry in `collection`, joined with its authors. Fails only
    /// when the collection can't be listed or when two entries share a slug;
    /// individual unreadable or malformed files are reported in
    /// [`Aggregate::failures`].
    pub fn aggregate(&self, collection: &str) -> Result<Aggregate> {
        let sources = self.store.list(collection).map_err(|err| Error::List {
            collection: collection.to_owned(),
            err,
        })?;
        tracing::debug!(collection, files = sources.len(), "aggregating");

        let parsed: Vec<std::result::Result<ContentEntry, SourceError>> =
            sources.par_iter().map(|source| self.load(source)).collect();

        let mut aggregate = Aggregate::default();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();
        let mut entries = Vec::with_capacity(parsed.len());
        for result in parsed {
            match result {
                Ok(entry) => {
                    let previous = seen.insert(entry.slug.clone(), entry.source_path.clone());
                    if let Some(first) = previous {
                        return Err(Error::DuplicateSlug {
                            collection: collection.to_owned(),
                            slug: entry.slug,
                            first,
                            second: entry.source_path,
                        });
                    }
                    entries.push(entry);
                }
                Err(failure) => aggregate.failures.push(failure),
            }
        }

        aggregate.entries = entries
            .into_par_iter()
            .map(|entry| self.enrich(entry))
            .collect();
        Ok(aggregate)
    }

    fn load(&self, source: &Source) -> std::result::Result<ContentEntry, SourceError> {
        let contents = self.store.read(source).map_err(|err| SourceError::Read {
            path: source.full_path.clone(),
            err,
        })?;
        Ok(ContentEntry::parse(&source.relative_path, &contents)?)
    }

    fn enrich(&self, entry: ContentEntry) -> EnrichedEntry {
        let authors = match entry.author_ids.is_empty() {
            true => None,
            false => Some(
                entry
                    .author_ids
                    .par_iter()
                    .map(|id| self.resolver.profile(id))
                    .collect(),
            ),
        };
        EnrichedEntry { entry, authors }
    }
}

/// Sorts entries by date, most recent first. Stable, so entries sharing a
/// date keep their enumeration order.
pub fn sort_newest_first(entries: &mut [EnrichedEntry]) {
    entries.sort_by(|a, b| b.entry.date.value.cmp(&a.entry.date.value));
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure that aborts aggregation of a collection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the collection can't be enumerated.
    #[error("listing collection `{collection}`: {err}")]
    List {
        collection: String,
        #[source]
        err: store::Error,
    },

    /// Returned when two files in one collection map to the same slug. Routing
    /// would be ambiguous, so this is never resolved silently.
    #[error(
        "duplicate slug `{slug}` in collection `{collection}`: `{}` and `{}`",
        .first.display(),
        .second.display()
    )]
    DuplicateSlug {
        collection: String,
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Represents a single content file that couldn't be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("reading `{}`: {}", .path.display(), .err)]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error(transparent)]
    FrontMatter(#[from] entry::Error),
}
