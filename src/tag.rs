//! Defines the [`TagIndex`], which maps normalized tag names to the slugs of
//! the entries carrying them.

use std::collections::BTreeMap;

use crate::aggregate::EnrichedEntry;

/// Normalizes a tag for indexing so e.g. `Release Notes` and `release-notes`
/// land in the same bucket: lowercased, with each run of whitespace and each
/// path separator replaced by a `-` (`C/C++` becomes `c-c++`). Normalizing an
/// already-normalized tag is a no-op.
pub fn normalize_tag(tag: &str) -> String {
    tag.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
        .replace(['/', '\\'], "-")
}

/// Reports whether a normalized tag can be used as a single path segment for
/// its tag page and feed.
pub fn is_path_safe(tag: &str) -> bool {
    !tag.is_empty() && tag != "." && tag != ".." && !tag.contains(['/', '\\'])
}

/// Maps each normalized tag to the slugs carrying it, in first-seen order.
/// Every key is [path safe](is_path_safe), so each tag in the index gets a
/// page and a feed. Always rebuilt from scratch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagIndex {
    buckets: BTreeMap<String, Vec<String>>,
}

impl TagIndex {
    /// Builds the index for `entries`. Every entry must declare a `tags`
    /// field (an empty list is fine); this is checked for all entries before
    /// anything is indexed.
    pub fn build(entries: &[EnrichedEntry]) -> Result<TagIndex> {
        let untagged: Vec<String> = entries
            .iter()
            .filter(|e| e.entry.tags.is_none())
            .map(|e| e.entry.slug.clone())
            .collect();
        if !untagged.is_empty() {
            return Err(Error::MissingTags { slugs: untagged });
        }

        let mut buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for enriched in entries {
            let slug = &enriched.entry.slug;
            for tag in enriched.entry.tags() {
                let key = normalize_tag(tag);
                if !is_path_safe(&key) {
                    if !key.is_empty() {
                        tracing::warn!(%tag, %slug, "ignoring tag, it can't name a page");
                    }
                    continue;
                }
                let bucket = buckets.entry(key).or_default();
                // An entry may spell the same tag twice; slugs within a bucket
                // stay unique.
                if bucket.last() != Some(slug) {
                    bucket.push(slug.clone());
                }
            }
        }
        Ok(TagIndex { buckets })
    }

    /// The slugs carrying `tag`. The lookup key is normalized first.
    pub fn get(&self, tag: &str) -> Option<&[String]> {
        self.buckets.get(&normalize_tag(tag)).map(Vec::as_slice)
    }

    /// Iterates over `(tag, slugs)` in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets.iter().map(|(t, s)| (t.as_str(), s.as_slice()))
    }

    /// The number of entries per tag.
    pub fn counts(&self) -> BTreeMap<&str, usize> {
        self.iter().map(|(tag, slugs)| (tag, slugs.len())).collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when indexable entries don't declare a `tags` field.
    #[error("entries without a `tags` field can't be indexed: {}", .slugs.join(", "))]
    MissingTags { slugs: Vec<String> },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entry::ContentEntry;
    use std::path::Path;

    fn entry(slug: &str, tags: Option<&str>) -> EnrichedEntry {
        let tags_line = match tags {
            Some(tags) => format!("tags: {}\n", tags),
            None => String::new(),
        };
        let input = format!("---\ntitle: {}\ndate: 2021-01-01\n{}---\n", slug, tags_line);
        EnrichedEntry {
            entry: ContentEntry::parse(Path::new(&format!("{}.md", slug)), &input).unwrap(),
            authors: None,
        }
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("Release Notes"), "release-notes");
        assert_eq!(normalize_tag("release-notes"), "release-notes");
        assert_eq!(normalize_tag("  Big \t Data  "), "big-data");
        let once = normalize_tag("Machine  Learning");
        assert_eq!(normalize_tag(&once), once);
    }

    #[test]
    fn test_path_separators_are_normalized() {
        assert_eq!(normalize_tag("C/C++"), "c-c++");
        assert_eq!(normalize_tag("a\\b"), "a-b");
        assert_eq!(normalize_tag("c-c++"), "c-c++");
    }

    #[test]
    fn test_is_path_safe() {
        assert!(is_path_safe("release-notes"));
        assert!(!is_path_safe(".."));
        assert!(!is_path_safe("c/c++"));
    }

    #[test]
    fn test_every_indexed_tag_is_path_safe() -> Result<()> {
        let entries = vec![
            entry("first", Some("[C/C++, '..', '.']")),
            entry("second", Some("[c-c++]")),
        ];
        let index = TagIndex::build(&entries)?;
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("C/C++"), Some(&["first".to_owned(), "second".to_owned()][..]));
        assert!(index.iter().all(|(tag, _)| is_path_safe(tag)));
        Ok(())
    }

    #[test]
    fn test_case_variants_share_a_bucket() -> Result<()> {
        let entries = vec![
            entry("first", Some("[Go]")),
            entry("second", Some("[go]")),
            entry("third", Some("[Rust]")),
        ];
        let index = TagIndex::build(&entries)?;
        assert_eq!(index.get("go"), Some(&["first".to_owned(), "second".to_owned()][..]));
        assert_eq!(index.get("Rust"), Some(&["third".to_owned()][..]));
        assert_eq!(index.len(), 2);
        Ok(())
    }

    #[test]
    fn test_duplicate_tags_within_an_entry() -> Result<()> {
        let entries = vec![entry("post", Some("[Release Notes, release-notes]"))];
        let index = TagIndex::build(&entries)?;
        assert_eq!(index.get("release-notes").map(<[String]>::len), Some(1));
        assert_eq!(index.counts().get("release-notes"), Some(&1));
        Ok(())
    }

    #[test]
    fn test_missing_tags_field_is_rejected_up_front() {
        let entries = vec![
            entry("tagged", Some("[a]")),
            entry("bare", None),
            entry("empty", Some("[]")),
        ];
        match TagIndex::build(&entries) {
            Err(Error::MissingTags { slugs }) => assert_eq!(slugs, vec!["bare"]),
            other => panic!("expected missing tags, got {:?}", other),
        }
    }
}
