//! Exports the [`build_site`] function which stitches together the high-level
//! steps of a build: aggregating each collection ([`crate::aggregate`]),
//! writing page data ([`crate::write`]), and emitting Atom feeds
//! ([`crate::feed`]). [`check`] runs only the first step.
//!
//! A file that fails to parse, or a feed that fails to persist, only loses its
//! own output: both are logged and collected into the [`BuildReport`]. Every
//! other failure aborts the build, leaving whatever was already written in
//! place.

use std::path::Path;

use rayon::prelude::*;

use crate::aggregate::{self, sort_newest_first, Aggregator, EnrichedEntry, SourceError};
use crate::author::Resolver;
use crate::config::{Collection, Config};
use crate::feed::{self, FeedMeta};
use crate::paginate::total_pages;
use crate::store::{ContentStore, FsStore};
use crate::tag::{self, TagIndex};
use crate::write::{self, Writer};

/// What a build (or check) did for one collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub name: String,
    pub published: usize,
    pub drafts: usize,

    /// Listing pages, including the canonical first page of an empty
    /// collection.
    pub pages: usize,

    /// Distinct tags. Always `0` for collections without a tag route.
    pub tags: usize,
}

/// The outcome of a build which didn't fail outright.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub collections: Vec<CollectionSummary>,

    /// Content files left out of the build, by collection.
    pub skipped: Vec<(String, SourceError)>,

    /// Feeds which couldn't be written.
    pub feed_failures: Vec<feed::Error>,
}

impl BuildReport {
    /// Reports whether nothing was skipped and every feed was written.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.feed_failures.is_empty()
    }
}

/// One collection after aggregation, split into published entries (newest
/// first) and drafts.
struct Loaded<'a> {
    collection: &'a Collection,
    published: Vec<EnrichedEntry>,
    drafts: Vec<EnrichedEntry>,
    tags: Option<TagIndex>,
}

impl Loaded<'_> {
    fn summary(&self, pages: usize) -> CollectionSummary {
        CollectionSummary {
            name: self.collection.name.clone(),
            published: self.published.len(),
            drafts: self.drafts.len(),
            pages,
            tags: self.tags.as_ref().map_or(0, TagIndex::len),
        }
    }
}

/// Builds the site described by `config` into its output directory: listing,
/// entry, tag and author page data, then the collection and tag feeds.
pub fn build_site(config: &Config) -> Result<BuildReport> {
    let store = FsStore::new(&config.content_directory);
    let resolver = Resolver::new(&config.authors_directory);

    let mut report = BuildReport::default();
    let loaded = load(config, &store, &resolver, &mut report)?;

    tracing::debug!(output = %config.output_directory.display(), "writing pages");
    let mut writer = Writer::new(&config.output_directory);
    for c in &loaded {
        let route = &c.collection.name;
        let pages = writer.write_listing(
            route,
            &c.collection.title,
            &c.published,
            c.collection.page_size,
        )?;
        writer.write_entries(route, &c.published, &c.drafts)?;
        if let (Some(tags_route), Some(index)) = (&c.collection.tags_route, &c.tags) {
            writer.write_tags(tags_route, index, &c.published)?;
        }
        report.collections.push(c.summary(pages));
    }
    let published: Vec<(&str, &[EnrichedEntry])> = loaded
        .iter()
        .map(|c| (c.collection.name.as_str(), c.published.as_slice()))
        .collect();
    writer.write_authors(&config.authors_route, &resolver, &published)?;

    tracing::debug!("emitting feeds");
    for c in &loaded {
        for err in emit_feeds(config, c)? {
            tracing::error!(%err, "feed not written");
            report.feed_failures.push(err);
        }
    }

    tracing::info!(
        collections = report.collections.len(),
        skipped = report.skipped.len(),
        feed_failures = report.feed_failures.len(),
        "build finished"
    );
    Ok(report)
}

/// Parses every collection and validates its tags without writing anything.
/// Page counts in the report are the ones a build would write.
pub fn check(config: &Config) -> Result<BuildReport> {
    let store = FsStore::new(&config.content_directory);
    let resolver = Resolver::new(&config.authors_directory);

    let mut report = BuildReport::default();
    for c in load(config, &store, &resolver, &mut report)? {
        let pages = total_pages(c.published.len(), c.collection.page_size).max(1);
        report.collections.push(c.summary(pages));
    }
    Ok(report)
}

fn load<'a, S: ContentStore>(
    config: &'a Config,
    store: &S,
    resolver: &Resolver,
    report: &mut BuildReport,
) -> Result<Vec<Loaded<'a>>> {
    let aggregator = Aggregator::new(store, resolver);
    let mut loaded = Vec::with_capacity(config.collections.len());

    for collection in &config.collections {
        let aggregate = aggregator.aggregate(&collection.name)?;
        for failure in aggregate.failures {
            tracing::error!(collection = %collection.name, err = %failure, "skipping file");
            report.skipped.push((collection.name.clone(), failure));
        }

        let mut entries = aggregate.entries;
        sort_newest_first(&mut entries);
        let (drafts, published): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| e.entry.draft);
        for e in published.iter().chain(&drafts) {
            if shadows_listing(&e.entry.slug) {
                tracing::warn!(
                    collection = %collection.name,
                    slug = %e.entry.slug,
                    "entry page shares a path with a listing page"
                );
            }
        }

        let tags = match &collection.tags_route {
            Some(_) => Some(TagIndex::build(&published).map_err(|err| Error::Tags {
                collection: collection.name.clone(),
                err,
            })?),
            None => None,
        };

        tracing::debug!(
            collection = %collection.name,
            published = published.len(),
            drafts = drafts.len(),
            "loaded collection"
        );
        loaded.push(Loaded {
            collection,
            published,
            drafts,
            tags,
        });
    }
    Ok(loaded)
}

/// Listing pages live at `index.json` and `page/{n}.json` beside the entry
/// pages, so these slugs would overwrite (or be overwritten by) a listing.
fn shadows_listing(slug: &str) -> bool {
    slug == "index" || slug.starts_with("page/")
}

/// Emits the collection feed and, for tag-indexed collections, one feed per
/// tag. Returns the feeds which failed; only URL construction for the
/// collection itself is fatal.
fn emit_feeds(config: &Config, c: &Loaded) -> Result<Vec<feed::Error>> {
    let collection = c.collection;
    let entries_route = format!("{}/", collection.name);
    let entries_url = config.url(&entries_route).map_err(|err| Error::Url {
        route: entries_route.clone(),
        err,
    })?;
    let feed_route = route_of(&collection.feed);
    let feed_url = config.url(&feed_route).map_err(|err| Error::Url {
        route: feed_route.clone(),
        err,
    })?;

    let meta = FeedMeta {
        title: format!("{} - {}", config.title, collection.title),
        description: config.description.clone(),
        id: feed_url.to_string(),
        home_page: config.site_url.clone(),
        entries_url,
        author: config.author.clone(),
    };

    let mut failures = Vec::new();
    if let Err(err) = feed::emit(
        &meta,
        &c.published,
        &config.output_directory.join(&collection.feed),
    ) {
        failures.push(err);
    }

    let (Some(tags_route), Some(index)) = (&collection.tags_route, &c.tags) else {
        return Ok(failures);
    };
    let tags_route_url = format!("{}/", tags_route);
    let tags_url = config.url(&tags_route_url).map_err(|err| Error::Url {
        route: tags_route_url.clone(),
        err,
    })?;
    let tags: Vec<(&str, &[String])> = index.iter().collect();
    let tag_failures: Vec<feed::Error> = tags
        .into_par_iter()
        .filter_map(|(tag, slugs)| {
            let entries: Vec<EnrichedEntry> = slugs
                .iter()
                .filter_map(|slug| c.published.iter().find(|e| &e.entry.slug == slug))
                .cloned()
                .collect();
            let id = match feed::url_below(&tags_url, &format!("{}/feed.xml", tag)) {
                Ok(url) => url.to_string(),
                Err(err) => return Some(err),
            };
            let tag_meta = FeedMeta {
                title: format!("{} - {}", config.title, tag),
                id,
                ..meta.clone()
            };
            let relative = Path::new(tags_route).join(tag).join("feed.xml");
            feed::emit(&tag_meta, &entries, &config.output_directory.join(&relative)).err()
        })
        .collect();
    failures.extend(tag_failures);
    Ok(failures)
}

/// Renders a relative output path as a URL route.
fn route_of(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Per-file and per-feed problems are
/// collected in the [`BuildReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a collection can't be listed or has duplicate slugs.
    #[error(transparent)]
    Aggregate(#[from] aggregate::Error),

    /// Returned when a tag-indexed collection has entries without tags.
    #[error("indexing tags for collection `{collection}`: {err}")]
    Tags {
        collection: String,
        #[source]
        err: tag::Error,
    },

    /// Returned for errors writing page data to disk.
    #[error(transparent)]
    Write(#[from] write::Error),

    /// Returned when a configured route doesn't form a valid URL.
    #[error("building URL for `{route}`: {err}")]
    Url {
        route: String,
        #[source]
        err: url::ParseError,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn project(posts: &[(&str, &str)]) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join(crate::config::PROJECT_FILE),
            "title: Example\nsite_url: https://example.com/\nauthor: Owner\npage_size: 2\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("data/blog")).unwrap();
        fs::create_dir_all(root.join("data/newsletters")).unwrap();
        fs::create_dir_all(root.join("data/authors")).unwrap();
        fs::write(root.join("data/authors/default.md"), "---\nname: Owner\n---\n").unwrap();
        for (name, contents) in posts {
            fs::write(root.join("data/blog").join(name), contents).unwrap();
        }
        let config = Config::from_directory(root, None).unwrap();
        (dir, config)
    }

    #[test]
    fn test_build_writes_pages_and_feeds() -> Result<()> {
        let (_dir, config) = project(&[
            ("one.md", "---\ntitle: One\ndate: 2021-01-01\ntags: [Rust]\n---\n"),
            ("two.md", "---\ntitle: Two\ndate: 2021-02-01\ntags: [rust, Go]\n---\n"),
            ("three.md", "---\ntitle: Three\ndate: 2021-03-01\ntags: []\n---\n"),
            ("wip.md", "---\ntitle: WIP\ndate: 2022-01-01\ntags: [Rust]\ndraft: true\n---\n"),
        ]);
        let report = build_site(&config)?;
        assert!(report.is_clean());

        let blog = &report.collections[0];
        assert_eq!(
            blog,
            &CollectionSummary {
                name: "blog".to_owned(),
                published: 3,
                drafts: 1,
                pages: 2,
                tags: 2,
            }
        );
        assert_eq!(report.collections[1].pages, 1);

        let out = &config.output_directory;
        assert!(out.join("blog/index.json").is_file());
        assert!(out.join("blog/page/2.json").is_file());
        assert!(out.join("blog/wip.json").is_file());
        assert!(out.join("newsletters/index.json").is_file());
        assert!(out.join("tags/rust/index.json").is_file());
        assert!(out.join("authors/default.json").is_file());

        let feed = fs::read_to_string(out.join("feed.xml")).unwrap();
        assert!(feed.contains("https://example.com/blog/three"));
        assert!(!feed.contains("https://example.com/blog/wip"));

        let rust = fs::read_to_string(out.join("tags/rust/feed.xml")).unwrap();
        assert!(rust.contains("https://example.com/blog/one"));
        assert!(!rust.contains("https://example.com/blog/three"));
        assert!(out.join("newsletters/feed.xml").is_file());
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_reported() -> Result<()> {
        let (_dir, config) = project(&[
            ("good.md", "---\ntitle: Good\ndate: 2021-01-01\ntags: []\n---\n"),
            ("bad.md", "---\ndate: 2021-01-01\n---\n"),
        ]);
        let report = build_site(&config)?;
        assert!(!report.is_clean());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "blog");
        assert_eq!(report.collections[0].published, 1);
        Ok(())
    }

    #[test]
    fn test_untagged_entry_fails_tag_indexed_collection() {
        let (_dir, config) = project(&[("bare.md", "---\ntitle: Bare\ndate: 2021-01-01\n---\n")]);
        match check(&config) {
            Err(Error::Tags { collection, .. }) => assert_eq!(collection, "blog"),
            other => panic!("expected tag error, got {:?}", other),
        }
    }

    #[test]
    fn test_check_writes_nothing() -> Result<()> {
        let (_dir, config) = project(&[(
            "one.md",
            "---\ntitle: One\ndate: 2021-01-01\ntags: []\n---\n",
        )]);
        let report = check(&config)?;
        assert_eq!(report.collections[0].published, 1);
        assert_eq!(report.collections[0].pages, 1);
        assert!(!config.output_directory.exists());
        Ok(())
    }

    #[test]
    fn test_feed_failure_is_collected() -> Result<()> {
        let (_dir, config) = project(&[(
            "one.md",
            "---\ntitle: One\ndate: 2021-01-01\ntags: []\n---\n",
        )]);
        // A directory where the blog feed should go.
        fs::create_dir_all(config.output_directory.join("feed.xml")).unwrap();
        let report = build_site(&config)?;
        assert_eq!(report.feed_failures.len(), 1);
        assert!(matches!(report.feed_failures[0], feed::Error::Persistence { .. }));
        Ok(())
    }

    #[test]
    fn test_every_listed_tag_has_a_page_and_feed() -> Result<()> {
        let (_dir, config) = project(&[(
            "langs.md",
            "---\ntitle: Langs\ndate: 2021-01-01\ntags: [C/C++, C#, '..']\n---\n",
        )]);
        let report = build_site(&config)?;
        let out = &config.output_directory;

        let directory: serde_json::Value =
            serde_json::from_slice(&fs::read(out.join("tags/index.json")).unwrap()).unwrap();
        let listed: Vec<&String> = directory["tags"].as_object().unwrap().keys().collect();
        assert_eq!(listed, vec!["c#", "c-c++"]);
        assert_eq!(report.collections[0].tags, listed.len());
        for tag in listed {
            assert!(out.join("tags").join(tag).join("index.json").is_file());
            assert!(out.join("tags").join(tag).join("feed.xml").is_file());
        }

        let sharp = fs::read_to_string(out.join("tags/c#/feed.xml")).unwrap();
        assert!(sharp.contains("https://example.com/tags/c%23/feed.xml"));
        Ok(())
    }

    #[test]
    fn test_shadows_listing() {
        assert!(shadows_listing("index"));
        assert!(shadows_listing("page/2"));
        assert!(!shadows_listing("pages"));
    }
}
