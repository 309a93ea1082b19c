//! Support for creating Atom feeds from a list of posts.

use crate::config::Author;
use crate::post::Post;
use atom_syndication::{Content, Entry, Error as AtomError, Feed, Link, Person};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;
use std::io::Write;
use url::Url;

type FixedDateTime = DateTime<FixedOffset>;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,
    pub site_url: &'a Url,
    pub author: Option<&'a Author>,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and a list of
/// [`Post`]s (most recent first) and writes the result to a
/// [`std::io::Write`].
pub fn write_feed<W: Write>(config: &FeedConfig, posts: &[Post], w: W) -> Result<()> {
    feed(config, posts)?.write_to(w)?;
    Ok(())
}

fn feed(config: &FeedConfig, posts: &[Post]) -> Result<Feed> {
    let mut feed = Feed::default();
    feed.set_title(config.title);
    feed.set_id(config.site_url.to_string());
    feed.set_updated(match posts.first() {
        Some(post) => midnight(post.date),
        None => DateTime::<Utc>::UNIX_EPOCH.into(),
    });
    feed.set_authors(author_to_people(config.author));
    feed.set_links(vec![alternate(config.site_url.to_string())]);
    feed.set_entries(
        posts
            .iter()
            .map(|post| feed_entry(config, post))
            .collect::<Result<Vec<Entry>>>()?,
    );
    Ok(feed)
}

fn feed_entry(config: &FeedConfig, post: &Post) -> Result<Entry> {
    // post slugs have no trailing slash, so `join` treats them as a path
    // segment of the site root rather than replacing its last segment
    let url = config.site_url.join(&format!("{}/", post.slug))?;
    let date = midnight(post.date);

    let mut content = Content::default();
    content.set_content_type(Some("html".to_owned()));
    content.set_value(Some(post.content.clone()));

    let mut entry = Entry::default();
    entry.set_id(url.to_string());
    entry.set_title(post.title.as_str());
    entry.set_updated(date);
    entry.set_published(Some(date));
    entry.set_authors(author_to_people(config.author));
    entry.set_links(vec![alternate(url.to_string())]);
    entry.set_content(Some(content));
    Ok(entry)
}

/// Post dates have no time component; feeds want one, so use midnight UTC.
fn midnight(date: NaiveDate) -> FixedDateTime {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)).into()
}

fn alternate(href: String) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => {
            let mut person = Person::default();
            person.set_name(author.name.as_str());
            person.set_email(author.email.clone());
            vec![person]
        }
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants include Atom and URL
/// issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an Atom-related error.
    Atom(AtomError),

    /// Returned when a post URL can't be built from the site URL.
    Url(url::ParseError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Atom(err) => err.fmt(f),
            Error::Url(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Atom(err) => Some(err),
            Error::Url(err) => Some(err),
        }
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts [`url::ParseError`]s into [`Error`]. This allows us to use
    /// the `?` operator when joining URLs.
    fn from(err: url::ParseError) -> Error {
        Error::Url(err)
    }
}
