//! Support for creating Atom feeds from a list of entries. Feeds are always
//! regenerated in full; an existing feed file is simply overwritten.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use atom_syndication::{Category, Entry, Feed, FixedDateTime, Link, Person, Text};
use chrono::Utc;
use url::Url;

use crate::aggregate::EnrichedEntry;
use crate::config::Author;

/// Bundled configuration for creating a feed.
#[derive(Clone, Debug)]
pub struct FeedMeta {
    pub title: String,

    /// The feed's description, emitted as the Atom subtitle.
    pub description: String,

    /// The feed's unique id. Conventionally the URL of the feed itself.
    pub id: String,

    /// The page the feed is an alternate representation of.
    pub home_page: Url,

    /// The URL entry links live below: each entry's link is this URL with
    /// the slug's segments appended.
    pub entries_url: Url,

    pub author: Option<Author>,
}

/// Renders `entries` as an Atom feed and writes it to `destination`, creating
/// any missing parent directories first.
pub fn emit(meta: &FeedMeta, entries: &[EnrichedEntry], destination: &Path) -> Result<()> {
    let mut buffer = Vec::new();
    feed(meta, entries)?.write_to(&mut buffer)?;

    let persist = |err| Error::Persistence {
        path: destination.to_owned(),
        err,
    };
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(persist)?;
    }
    fs::write(destination, buffer).map_err(persist)?;
    tracing::debug!(path = %destination.display(), entries = entries.len(), "wrote feed");
    Ok(())
}

/// Builds the in-memory [`Feed`] for `entries`.
pub fn feed(meta: &FeedMeta, entries: &[EnrichedEntry]) -> Result<Feed> {
    let mut feed = Feed::default();
    feed.set_title(Text::plain(meta.title.clone()));
    feed.set_subtitle(Some(Text::plain(meta.description.clone())));
    feed.set_id(meta.id.clone());
    feed.set_updated(
        entries
            .iter()
            .map(|e| e.entry.updated().value)
            .max()
            .unwrap_or_else(now),
    );
    feed.set_authors(author_to_people(meta.author.as_ref()));
    feed.set_links(vec![alternate_link(meta.home_page.as_str())]);
    feed.set_entries(feed_entries(meta, entries)?);
    Ok(feed)
}

fn feed_entries(meta: &FeedMeta, entries: &[EnrichedEntry]) -> Result<Vec<Entry>> {
    let mut items = Vec::with_capacity(entries.len());

    for enriched in entries {
        let entry = &enriched.entry;
        let url = url_below(&meta.entries_url, &entry.slug)?;

        let mut item = Entry::default();
        item.set_id(url.to_string());
        item.set_title(Text::plain(entry.title.clone()));
        item.set_published(Some(entry.date.value));
        item.set_updated(entry.updated().value);
        item.set_links(vec![alternate_link(url.as_str())]);
        item.set_summary(entry.summary.clone().map(Text::plain));
        item.set_categories(
            entry
                .tags()
                .iter()
                .map(|tag| {
                    let mut category = Category::default();
                    category.set_term(crate::tag::normalize_tag(tag));
                    category.set_label(Some(tag.clone()));
                    category
                })
                .collect::<Vec<_>>(),
        );
        item.set_authors(match &enriched.authors {
            Some(authors) => authors
                .iter()
                .map(|a| {
                    let mut person = Person::default();
                    person.set_name(a.name.clone());
                    person.set_email(a.email.clone());
                    person
                })
                .collect(),
            None => author_to_people(meta.author.as_ref()),
        });
        items.push(item);
    }
    Ok(items)
}

/// Appends the `/`-separated segments of `path` to `base`, percent-encoding
/// each one, so a slug like `notes:rust` or `c#` stays a path below `base`.
pub fn url_below(base: &Url, path: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Url {
            path: path.to_owned(),
            base: base.clone(),
        })?
        .pop_if_empty()
        .extend(path.split('/'));
    Ok(url)
}

fn alternate_link(href: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.clone());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

fn now() -> FixedDateTime {
    Utc::now().fixed_offset()
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating or persisting a feed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the feed can't be written to its destination (missing
    /// permissions, read-only filesystem, and so on).
    #[error("writing feed `{}`: {}", .path.display(), .err)]
    Persistence {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when the feed can't be serialized.
    #[error(transparent)]
    Atom(#[from] atom_syndication::Error),

    /// Returned when a URL can't have path segments appended (e.g., a
    /// `mailto:` URL).
    #[error("building URL for `{path}`: `{base}` can't be a base")]
    Url { path: String, base: Url },
}
