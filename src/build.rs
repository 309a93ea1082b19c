//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading the posts
//! ([`crate::post`]), rendering post and index pages ([`crate::render`],
//! [`crate::index`]), writing them ([`crate::write`]), generating the Atom
//! feed, and copying the static assets into the output directory.

use crate::config::Config;
use crate::feed::{self, FeedConfig};
use crate::highlight::{HighlightCache, Highlighter};
use crate::index::build_index;
use crate::post::{self, Post};
use crate::render::{self, Renderer};
use crate::template::{self, parse_template};
use crate::write::{self, index_path, post_path, write_page};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The name of the Atom feed file in the build directory.
pub const FEED_FILE_NAME: &str = "feed.atom";

/// Builds the site from a [`Config`] object, highlighting code blocks with
/// the configured external program.
pub fn build_site(config: &Config) -> Result<()> {
    build_site_with(config, &config.highlighter)
}

/// Builds the site from a [`Config`] object with an explicit
/// [`Highlighter`].
///
/// Every page is rendered in memory before anything is written, so a
/// malformed post aborts the build without touching the build directory.
pub fn build_site_with<H: Highlighter>(config: &Config, highlighter: H) -> Result<()> {
    let mut posts = post::load_posts(&config.posts_directory)?;
    log::info!(
        "loaded {} posts from `{}`",
        posts.len(),
        config.posts_directory.display()
    );

    let post_template = parse_template(&config.post_layout)?;
    let index_template = parse_template(&config.index_layout)?;

    std::fs::create_dir_all(&config.cache_directory).map_err(|err| Error::Io {
        path: config.cache_directory.clone(),
        err,
    })?;
    let cache = HighlightCache::new(&config.cache_directory, highlighter);

    let pages = render_posts(
        &Renderer {
            template: &post_template,
            highlighter: &cache,
        },
        &mut posts,
    )?;
    let index = build_index(&index_template, &posts, config.index_limit)?;

    for (slug, page) in pages.iter() {
        write_page(&post_path(&config.build_directory, slug), page)?;
    }
    write_page(&index_path(&config.build_directory), &index)?;

    if let Some(site_url) = &config.site_url {
        let path = config.build_directory.join(FEED_FILE_NAME);
        let file = File::create(&path).map_err(|err| Error::Io {
            path: path.clone(),
            err,
        })?;
        feed::write_feed(
            &FeedConfig {
                title: &config.title,
                site_url,
                author: config.author.as_ref(),
            },
            &posts,
            file,
        )?;
        log::info!("wrote `{}`", path.display());
    }

    copy_static(&config.static_directory, &config.build_directory)?;

    log::info!(
        "built {} posts ({} code blocks highlighted, {} from cache)",
        posts.len(),
        cache.misses(),
        cache.hits()
    );
    Ok(())
}

fn render_posts<H: Highlighter>(
    renderer: &Renderer<H>,
    posts: &mut [Post],
) -> Result<Vec<(String, Vec<u8>)>> {
    let mut pages = Vec::with_capacity(posts.len());
    for post in posts.iter_mut() {
        log::debug!("rendering `{}`", post.source_path.display());
        let page = renderer.render(post)?;
        pages.push((post.slug.clone(), page));
    }
    Ok(pages)
}

/// Copies `src` into `build_directory` (as `{build_directory}/{name of src}`),
/// overwriting existing files. A missing `src` is skipped.
fn copy_static(src: &Path, build_directory: &Path) -> Result<()> {
    if !src.is_dir() {
        log::debug!("no static directory at `{}`", src.display());
        return Ok(());
    }
    let dst = match src.file_name() {
        Some(name) => build_directory.join(name),
        None => build_directory.to_owned(),
    };

    for result in WalkDir::new(src) {
        let entry = result?;
        // strip_prefix() can't fail since every entry is below `src`
        let target = dst.join(entry.path().strip_prefix(src).unwrap());
        let io_error = |err: std::io::Error| Error::Io {
            path: target.clone(),
            err,
        };
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(io_error)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(io_error)?;
        }
    }
    log::info!("copied `{}` to `{}`", src.display(), dst.display());
    Ok(())
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during loading,
/// rendering, templating, writing, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors discovering or loading posts.
    Post(post::Error),

    /// Returned for errors rendering posts.
    Render(render::Error),

    /// Returned for errors loading templates or rendering the index.
    Template(template::Error),

    /// Returned for errors writing pages to disk.
    Write(write::Error),

    /// Returned for errors writing the feed.
    Feed(feed::Error),

    /// Returned for errors walking the static directory.
    WalkDir(walkdir::Error),

    /// Returned for other I/O errors.
    Io { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Post(err) => write!(f, "loading posts: {}", err),
            Error::Render(err) => write!(f, "rendering posts: {}", err),
            Error::Template(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Feed(err) => write!(f, "writing feed: {}", err),
            Error::WalkDir(err) => write!(f, "copying static files: {}", err),
            Error::Io { path, err } => write!(f, "'{}': {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Post(err) => Some(err),
            Error::Render(err) => Some(err),
            Error::Template(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}

impl From<post::Error> for Error {
    /// Converts [`post::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: post::Error) -> Error {
        Error::Post(err)
    }
}

impl From<render::Error> for Error {
    /// Converts [`render::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: render::Error) -> Error {
        Error::Render(err)
    }
}

impl From<template::Error> for Error {
    /// Converts [`template::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<write::Error> for Error {
    /// Converts [`write::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: write::Error) -> Error {
        Error::Write(err)
    }
}

impl From<feed::Error> for Error {
    /// Converts [`feed::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts [`walkdir::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
