//! The library code for the `broadsheet` content pipeline. A build turns
//! collections of Markdown files with YAML front-matter into the data a site
//! renderer needs, in three steps:
//!
//! 1. Loading each collection ([`crate::aggregate`]): every file in the
//!    collection is read from a [`crate::store::ContentStore`], its
//!    front-matter parsed ([`crate::entry`]), and its authors resolved
//!    ([`crate::author`]). A file which fails to parse is reported and left
//!    out; a missing author degrades to a stub profile.
//! 2. Writing page data ([`crate::write`]): paginated listings
//!    ([`crate::paginate`]), single entry pages, tag pages built from the
//!    [`crate::tag::TagIndex`], and author pages, all as JSON.
//! 3. Emitting Atom feeds ([`crate::feed`]) for each collection and each tag.
//!
//! [`crate::build`] stitches the steps together from a [`crate::config::Config`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod aggregate;
pub mod author;
pub mod build;
pub mod config;
pub mod entry;
pub mod feed;
pub mod paginate;
pub mod store;
pub mod tag;
pub mod write;
