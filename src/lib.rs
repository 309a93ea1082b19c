//! The library code for the `bloggy` static site generator. A build turns a
//! directory of dated Markdown posts into a directory of HTML pages:
//!
//! 1. Loading posts from source files on disk ([`crate::post`]). A post's
//!    slug and date come from its `YYYY-MM-DD-{slug}.md` file name.
//! 2. Rendering each post ([`crate::render`]): the first line is the title,
//!    the second line must be `---`, and the rest is Markdown
//!    ([`crate::markdown`]) which is substituted into the post template
//!    ([`crate::template`]).
//! 3. Highlighting the code blocks of each rendered page
//!    ([`crate::highlight`]). Highlighting shells out to an external program,
//!    so results are cached on disk by a hash of each block's markup and
//!    reused across builds.
//! 4. Rendering the index page from the sorted posts ([`crate::index`]).
//! 5. Writing every page to disk ([`crate::write`]), plus an Atom feed
//!    ([`crate::feed`]) and the static assets.
//!
//! [`crate::build::build_site`] ties the steps together. Everything happens
//! sequentially on one thread, and any error aborts the whole build.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod highlight;
pub mod index;
pub mod markdown;
pub mod post;
pub mod render;
pub mod template;
pub mod value;
pub mod write;
