//! Defines the [`Post`] type and the logic for discovering and loading posts
//! from the file system. A post's identity (its slug, URL, and date) comes
//! entirely from its file name, which must look like
//! `YYYY-MM-DD-{slug}.md`. The title and body are filled in later by
//! [`crate::render::Renderer`].

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The extension a file must have to be considered a post source.
pub const MARKDOWN_EXTENSION: &str = ".md";

/// The length of the `YYYY-MM-DD` date prefix on post file names.
const DATE_PREFIX_LEN: usize = 10;

/// The [`chrono`] format of the date prefix.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Represents a single article.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// The file the post was loaded from.
    pub source_path: PathBuf,

    /// The file name less the date prefix, separator, and extension.
    pub slug: String,

    /// The site-relative URL for the post (`/{slug}`).
    pub url: String,

    /// The first line of the source file. Empty until the post is rendered.
    pub title: String,

    /// The date from the file name prefix.
    pub date: NaiveDate,

    /// The post body converted to HTML. Empty until the post is rendered.
    pub content: String,
}

/// Lists the post source files (extension = `.md`) directly inside
/// `directory`, sorted by file name. Subdirectories are not searched.
pub fn discover(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for result in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = result?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(MARKDOWN_EXTENSION)
        {
            log::debug!("discovered post source `{}`", entry.path().display());
            paths.push(entry.path().to_owned());
        }
    }
    Ok(paths)
}

/// Builds a [`Post`] from its source path. Only the file name is inspected;
/// the file itself is read at render time.
pub fn load(path: &Path) -> Result<Post> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::FileName(path.to_owned()))?;

    let stem = match file_name.strip_suffix(MARKDOWN_EXTENSION) {
        Some(stem) if stem.is_char_boundary(DATE_PREFIX_LEN) => stem,
        _ => return Err(Error::FileName(path.to_owned())),
    };

    let (date_part, rest) = stem.split_at(DATE_PREFIX_LEN);

    // `rest` begins with the separator character (usually `-`), which may be
    // any single character.
    let mut chars = rest.chars();
    let slug = match chars.next() {
        Some(_) => chars.as_str(),
        None => return Err(Error::FileName(path.to_owned())),
    };
    if slug.is_empty() {
        return Err(Error::FileName(path.to_owned()));
    }

    let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|err| {
        Error::Date {
            path: path.to_owned(),
            err,
        }
    })?;

    Ok(Post {
        source_path: path.to_owned(),
        slug: slug.to_owned(),
        url: format!("/{}", slug),
        title: String::default(),
        date,
        content: String::default(),
    })
}

/// Searches `directory` for post files and returns the loaded [`Post`]s
/// sorted by date (most recent first). Posts sharing a date keep their
/// file-name order. Two posts with the same slug would overwrite each other's
/// output, so that is an error.
pub fn load_posts(directory: &Path) -> Result<Vec<Post>> {
    let mut posts = discover(directory)?
        .iter()
        .map(|path| load(path))
        .collect::<Result<Vec<Post>>>()?;

    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for post in posts.iter() {
        if let Some(first) = seen.insert(post.slug.as_str(), post.source_path.as_path()) {
            return Err(Error::DuplicateSlug {
                slug: post.slug.clone(),
                first: first.to_owned(),
                second: post.source_path.clone(),
            });
        }
    }

    sort(&mut posts);
    Ok(posts)
}

/// Sorts posts by date, most recent first. The sort is stable.
pub fn sort(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Returns the first `n` posts, or all of them if there are fewer than `n`.
pub fn limit(posts: &[Post], n: usize) -> &[Post] {
    &posts[..n.min(posts.len())]
}

/// Represents the result of a [`Post`]-load operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error discovering or loading a [`Post`].
#[derive(Debug)]
pub enum Error {
    /// Returned when a file name doesn't have the
    /// `YYYY-MM-DD-{slug}.md` structure.
    FileName(PathBuf),

    /// Returned when the date prefix isn't a valid calendar date.
    Date {
        path: PathBuf,
        err: chrono::ParseError,
    },

    /// Returned when two source files resolve to the same slug.
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Returned for errors listing the posts directory.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FileName(path) => write!(
                f,
                "invalid post file name `{}`: expected `YYYY-MM-DD-{{slug}}{}`",
                path.display(),
                MARKDOWN_EXTENSION,
            ),
            Error::Date { path, err } => write!(
                f,
                "invalid date prefix on post `{}`: {}",
                path.display(),
                err
            ),
            Error::DuplicateSlug {
                slug,
                first,
                second,
            } => write!(
                f,
                "posts `{}` and `{}` share the slug `{}`",
                first.display(),
                second.display(),
                slug
            ),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FileName(_) => None,
            Error::Date { err, .. } => Some(err),
            Error::DuplicateSlug { .. } => None,
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for directory listings.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
