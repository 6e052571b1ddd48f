use std::fs;
use std::path::{Path, PathBuf};

use broadsheet::build::{build_site, check};
use broadsheet::config::Config;
use serde_json::Value;
use walkdir::WalkDir;

/// Copies the fixture project into a fresh temporary directory so builds
/// never touch the checked-in tree.
fn fixture() -> (tempfile::TempDir, Config) {
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/site");
    let dir = tempfile::tempdir().unwrap();
    for entry in WalkDir::new(&source) {
        let entry = entry.unwrap();
        let target = dir.path().join(entry.path().strip_prefix(&source).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
    let config = Config::from_directory(dir.path(), None).unwrap();
    (dir, config)
}

fn json(out: &Path, relative: &str) -> Value {
    let path: PathBuf = out.join(relative);
    serde_json::from_slice(&fs::read(&path).unwrap())
        .unwrap_or_else(|e| panic!("parsing {}: {}", path.display(), e))
}

fn slugs(page: &Value) -> Vec<String> {
    page["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["slug"].as_str().unwrap().to_owned())
        .collect()
}

#[test]
fn test_build_fixture_site() {
    let (_dir, config) = fixture();
    let report = build_site(&config).unwrap();
    let out = &config.output_directory;

    // broken.md has no title; it's reported, not fatal.
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].1.to_string().contains("broken.md"));
    assert!(report.feed_failures.is_empty());
    assert!(!report.is_clean());

    let blog = &report.collections[0];
    assert_eq!((blog.published, blog.drafts, blog.pages, blog.tags), (3, 1, 2, 3));

    // Listings: newest first, two per page.
    let first = json(out, "blog/index.json");
    assert_eq!(first["title"], "All Posts");
    assert_eq!(slugs(&first), vec!["2021/engines", "guest-post"]);
    assert_eq!(first["pagination"]["totalPages"], 2);
    assert_eq!(slugs(&json(out, "blog/page/2.json")), vec!["hello-world"]);

    // Entry pages, including the draft.
    let guest = json(out, "blog/guest-post.json");
    assert_eq!(guest["prev"]["slug"], "hello-world");
    assert_eq!(guest["next"]["slug"], "2021/engines");
    assert_eq!(guest["date"], "2021-02-14T09:30:00+02:00");
    assert_eq!(guest["authorDetails"][0]["name"], "Ada Lovelace");
    assert_eq!(guest["authorDetails"][1]["name"], "guest");
    assert_eq!(json(out, "blog/2021/engines.json")["lastmod"], "2021-04-01");
    assert_eq!(json(out, "blog/upcoming.json")["draft"], true);

    // Tags: case and whitespace variants share a bucket, drafts are left out.
    let tags = json(out, "tags/index.json");
    assert_eq!(tags["tags"]["machine-learning"], 2);
    assert_eq!(tags["tags"]["announcements"], 1);
    assert_eq!(
        slugs(&json(out, "tags/machine-learning/index.json")),
        vec!["2021/engines", "guest-post"]
    );

    // Authors: by post count, then name; a missing profile still gets a page.
    let authors = json(out, "authors/index.json");
    let ids: Vec<&str> = authors["authors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["ada", "default", "guest"]);
    // hello-world has no `authors` key; issue-1 is a newsletter.
    assert_eq!(authors["authors"][1]["postCount"], 2);
    let default = json(out, "authors/default.json");
    assert_eq!(default["collections"]["blog"][0]["slug"], "hello-world");
    assert_eq!(default["collections"]["newsletters"][0]["slug"], "issue-1");
    assert_eq!(json(out, "authors/guest.json")["author"]["name"], "guest");

    // Feeds.
    let feed = fs::read_to_string(out.join("feed.xml")).unwrap();
    assert!(feed.contains("Example Blog - All Posts"));
    assert!(feed.contains("https://example.com/blog/2021/engines"));
    assert!(!feed.contains("https://example.com/blog/upcoming"));
    let history = fs::read_to_string(out.join("tags/history/feed.xml")).unwrap();
    assert!(history.contains("https://example.com/blog/2021/engines"));
    assert!(!history.contains("https://example.com/blog/hello-world"));
    assert!(out.join("newsletters/feed.xml").is_file());
}

#[test]
fn test_check_fixture_site() {
    let (_dir, config) = fixture();
    let report = check(&config).unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.collections[1].name, "newsletters");
    assert_eq!(report.collections[1].published, 1);
    assert!(!config.output_directory.exists());
}
