//! Serializes listing pages, entry pages, tag pages and author pages as JSON
//! page data for an external renderer. Every page lands at a fixed path below
//! the output directory:
//!
//! * `{collection}/index.json`, `{collection}/page/{n}.json`: listings
//! * `{collection}/{slug}.json`: single entries, with their neighbours
//! * `{tags_route}/index.json`, `{tags_route}/{tag}/index.json`: tags
//! * `{authors_route}/index.json`, `{authors_route}/{id}.json`: authors

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::aggregate::EnrichedEntry;
use crate::author::{is_valid_id, AuthorProfile, Resolver};
use crate::entry::EntryDate;
use crate::paginate::{page_path, pages, paginate, Pagination};
use crate::tag::TagIndex;

/// A listing-sized view of an entry: everything but the body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary<'a> {
    pub slug: &'a str,
    pub title: &'a str,
    pub date: &'a EntryDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<&'a EntryDate>,
    pub tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a str>,
    pub draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_details: Option<&'a [AuthorProfile]>,
}

impl<'a> From<&'a EnrichedEntry> for EntrySummary<'a> {
    fn from(e: &'a EnrichedEntry) -> EntrySummary<'a> {
        EntrySummary {
            slug: &e.entry.slug,
            title: &e.entry.title,
            date: &e.entry.date,
            lastmod: e.entry.last_modified.as_ref(),
            tags: e.entry.tags(),
            summary: e.entry.summary.as_deref(),
            draft: e.entry.draft,
            author_details: e.authors.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ListingPage<'a> {
    title: &'a str,
    entries: Vec<EntrySummary<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
}

#[derive(Serialize)]
struct Neighbour<'a> {
    slug: &'a str,
    title: &'a str,
}

impl<'a> From<&'a EnrichedEntry> for Neighbour<'a> {
    fn from(e: &'a EnrichedEntry) -> Neighbour<'a> {
        Neighbour {
            slug: &e.entry.slug,
            title: &e.entry.title,
        }
    }
}

#[derive(Serialize)]
struct EntryPage<'a> {
    #[serde(flatten)]
    entry: EntrySummary<'a>,
    body: &'a str,
    /// The next older published entry.
    prev: Option<Neighbour<'a>>,
    /// The next newer published entry.
    next: Option<Neighbour<'a>>,
}

#[derive(Serialize)]
struct TagDirectory<'a> {
    tags: BTreeMap<&'a str, usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorCard {
    #[serde(flatten)]
    profile: AuthorProfile,
    post_count: usize,
}

#[derive(Serialize)]
struct AuthorDirectory {
    authors: Vec<AuthorCard>,
}

#[derive(Serialize)]
struct AuthorPage<'a> {
    author: &'a AuthorProfile,
    collections: BTreeMap<&'a str, Vec<EntrySummary<'a>>>,
}

/// Writes page data below a single output directory.
pub struct Writer<'a> {
    /// The directory all page routes are relative to.
    pub output_directory: &'a Path,

    /// Directories already created during this build.
    seen_dirs: HashSet<PathBuf>,
}

impl<'a> Writer<'a> {
    pub fn new(output_directory: &'a Path) -> Writer<'a> {
        Writer {
            output_directory,
            seen_dirs: HashSet::new(),
        }
    }

    /// Writes every listing page for `entries` under `route`. An empty
    /// collection still gets its canonical first page. Returns the number of
    /// pages written.
    pub fn write_listing(
        &mut self,
        route: &str,
        title: &str,
        entries: &[EnrichedEntry],
        page_size: NonZeroUsize,
    ) -> Result<usize> {
        let base = Path::new(route);
        if entries.is_empty() {
            let (_, pagination) = paginate(entries, page_size, NonZeroUsize::MIN);
            self.write_listing_page(&page_path(base, 1), title, &[], Some(pagination))?;
            return Ok(1);
        }

        let mut written = 0;
        for (chunk, pagination) in pages(entries, page_size) {
            let path = page_path(base, pagination.current_page);
            self.write_listing_page(&path, title, chunk, Some(pagination))?;
            written += 1;
        }
        Ok(written)
    }

    /// Writes one page per entry under `route`. `published` must already be in
    /// listing order; its entries link to their neighbours. Drafts are written
    /// too, so they stay reachable by slug, but without neighbours.
    pub fn write_entries(
        &mut self,
        route: &str,
        published: &[EnrichedEntry],
        drafts: &[EnrichedEntry],
    ) -> Result<()> {
        for (i, e) in published.iter().enumerate() {
            let page = EntryPage {
                entry: e.into(),
                body: &e.entry.body,
                prev: published.get(i + 1).map(Neighbour::from),
                next: match i {
                    0 => None,
                    _ => published.get(i - 1).map(Neighbour::from),
                },
            };
            self.write_json(&entry_path(route, &e.entry.slug), &page)?;
        }
        for e in drafts {
            let page = EntryPage {
                entry: e.into(),
                body: &e.entry.body,
                prev: None,
                next: None,
            };
            self.write_json(&entry_path(route, &e.entry.slug), &page)?;
        }
        Ok(())
    }

    /// Writes the tag directory and one unpaginated listing per tag.
    pub fn write_tags(
        &mut self,
        route: &str,
        index: &TagIndex,
        entries: &[EnrichedEntry],
    ) -> Result<()> {
        let base = Path::new(route);
        self.write_json(
            &base.join("index.json"),
            &TagDirectory {
                tags: index.counts(),
            },
        )?;

        let by_slug = by_slug(entries);
        for (tag, slugs) in index.iter() {
            let tagged: Vec<EntrySummary> = slugs
                .iter()
                .filter_map(|slug| by_slug.get(slug.as_str()))
                .map(|e| EntrySummary::from(*e))
                .collect();
            self.write_json(
                &base.join(tag).join("index.json"),
                &ListingPage {
                    title: tag,
                    entries: tagged,
                    pagination: None,
                },
            )?;
        }
        Ok(())
    }

    /// Writes the author directory and one page per author. Every author file
    /// gets a page, as does every id referenced by an entry even when its
    /// file is missing. `collections` pairs each collection name with its
    /// published entries; author pages group entries by collection. The
    /// directory is ordered by post count, most first, then by name.
    pub fn write_authors(
        &mut self,
        route: &str,
        resolver: &Resolver,
        collections: &[(&str, &[EnrichedEntry])],
    ) -> Result<()> {
        let base = Path::new(route);

        let mut ids: Vec<String> = resolver.list_ids().map_err(|err| Error::Io {
            path: resolver.directory().to_owned(),
            err,
        })?;
        for (_, entries) in collections {
            for e in entries.iter() {
                for id in &e.entry.author_ids {
                    if is_valid_id(id) && !ids.contains(id) {
                        ids.push(id.clone());
                    }
                }
            }
        }

        let mut cards = Vec::with_capacity(ids.len());
        for id in &ids {
            let profile = resolver.profile(id);
            let mut by_collection: BTreeMap<&str, Vec<EntrySummary>> = BTreeMap::new();
            let mut post_count = 0;
            for (name, entries) in collections {
                let written: Vec<EntrySummary> = entries
                    .iter()
                    .filter(|e| e.entry.author_ids.contains(id))
                    .map(EntrySummary::from)
                    .collect();
                if !written.is_empty() {
                    post_count += written.len();
                    by_collection.insert(*name, written);
                }
            }
            self.write_json(
                &base.join(format!("{}.json", id)),
                &AuthorPage {
                    author: &profile,
                    collections: by_collection,
                },
            )?;
            cards.push(AuthorCard {
                profile,
                post_count,
            });
        }

        sort_author_cards(&mut cards);
        self.write_json(
            &base.join("index.json"),
            &AuthorDirectory { authors: cards },
        )
    }

    fn write_listing_page(
        &mut self,
        path: &Path,
        title: &str,
        entries: &[EnrichedEntry],
        pagination: Option<Pagination>,
    ) -> Result<()> {
        self.write_json(
            path,
            &ListingPage {
                title,
                entries: entries.iter().map(EntrySummary::from).collect(),
                pagination,
            },
        )
    }

    /// Serializes `value` to `{output_directory}/{relative}`, creating parent
    /// directories on first use.
    fn write_json<T: Serialize>(&mut self, relative: &Path, value: &T) -> Result<()> {
        let path = self.output_directory.join(relative);
        let json = serde_json::to_vec_pretty(value).map_err(|err| Error::Json {
            path: path.clone(),
            err,
        })?;
        if let Some(dir) = path.parent() {
            if self.seen_dirs.insert(dir.to_owned()) {
                std::fs::create_dir_all(dir).map_err(|err| Error::Io {
                    path: dir.to_owned(),
                    err,
                })?;
            }
        }
        std::fs::write(&path, json).map_err(|err| Error::Io { path, err })
    }
}

fn entry_path(route: &str, slug: &str) -> PathBuf {
    Path::new(route).join(format!("{}.json", slug))
}

fn by_slug(entries: &[EnrichedEntry]) -> HashMap<&str, &EnrichedEntry> {
    entries.iter().map(|e| (e.entry.slug.as_str(), e)).collect()
}

fn sort_author_cards(cards: &mut [AuthorCard]) {
    cards.sort_by(|a, b| {
        b.post_count
            .cmp(&a.post_count)
            .then_with(|| a.profile.name.cmp(&b.profile.name))
    });
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error serializing page data.
    #[error("serializing `{}`: {}", .path.display(), .err)]
    Json {
        path: PathBuf,
        #[source]
        err: serde_json::Error,
    },

    /// An error writing the output files.
    #[error("writing `{}`: {}", .path.display(), .err)]
    Io {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
}
