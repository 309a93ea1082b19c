//! Renders [`Post`]s into complete HTML documents. A post source file is
//! structured as follows:
//!
//! 1. The title, on the first line
//! 2. The separator line, `---`
//! 3. The Markdown body
//!
//! For example:
//!
//! ```md
//! Hello, world!
//! ---
//! # Hello
//!
//! World
//! ```

use crate::highlight::{self, HighlightCache, Highlighter};
use crate::markdown;
use crate::post::Post;
use crate::template;
use gtmpl::{Template, Value};
use std::fmt;
use std::path::PathBuf;

/// The line separating the title from the body.
pub const SEPARATOR: &str = "---";

/// Applies the post template and the highlight pass to posts.
pub struct Renderer<'a, H> {
    /// The template for post pages.
    pub template: &'a Template,

    /// The cache through which every rendered page is highlighted.
    pub highlighter: &'a HighlightCache<H>,
}

impl<H: Highlighter> Renderer<'_, H> {
    /// Reads `post`'s source file, fills in its `title` and `content`, and
    /// returns the finished page.
    pub fn render(&self, post: &mut Post) -> Result<Vec<u8>> {
        let source = std::fs::read_to_string(&post.source_path).map_err(|err| Error::Io {
            path: post.source_path.clone(),
            err,
        })?;
        let (title, body) = split_source(&source).ok_or_else(|| Error::MissingSeparator {
            path: post.source_path.clone(),
        })?;

        post.title = title.to_owned();
        post.content.clear();
        markdown::to_html(&mut post.content, body);

        let page = template::execute(self.template, Value::from(&*post))?;
        Ok(self.highlighter.highlight(&page)?)
    }
}

/// Splits a post source into its title and body. Returns [`None`] if the
/// second line isn't the [`SEPARATOR`].
pub fn split_source(source: &str) -> Option<(&str, &str)> {
    let mut parts = source.splitn(3, '\n');
    let title = parts.next()?.trim_end_matches('\r');
    let separator = parts.next()?.trim_end_matches('\r');
    if separator != SEPARATOR {
        return None;
    }
    Some((title, parts.next().unwrap_or_default()))
}

/// The result of a fallible render operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error rendering a post.
#[derive(Debug)]
pub enum Error {
    /// Returned when the line after the title isn't the separator.
    MissingSeparator { path: PathBuf },

    /// Returned for errors reading the source file.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned for errors during templating.
    Template(template::Error),

    /// Returned for errors highlighting code blocks.
    Highlight(highlight::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingSeparator { path } => write!(
                f,
                "Improperly formatted post `{}`: the second line must be `{}`",
                path.display(),
                SEPARATOR
            ),
            Error::Io { path, err } => {
                write!(f, "Reading post `{}`: {}", path.display(), err)
            }
            Error::Template(err) => err.fmt(f),
            Error::Highlight(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingSeparator { .. } => None,
            Error::Io { err, .. } => Some(err),
            Error::Template(err) => Some(err),
            Error::Highlight(err) => Some(err),
        }
    }
}

impl From<template::Error> for Error {
    /// Converts a [`template::Error`] into an [`Error`]. This allows us to
    /// use the `?` operator for template operations.
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<highlight::Error> for Error {
    /// Converts a [`highlight::Error`] into an [`Error`]. This allows us to
    /// use the `?` operator for highlighting.
    fn from(err: highlight::Error) -> Error {
        Error::Highlight(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::highlight::test::FakeHighlighter;
    use crate::post;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        template: Template,
        fake: FakeHighlighter,
    }

    impl Fixture {
        fn new() -> Fixture {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir(dir.path().join("cache")).unwrap();
            let layout = dir.path().join("post.html");
            std::fs::write(
                &layout,
                "<title>{{.Title}}</title><a href=\"{{.Url}}\">{{.Date}}</a>{{.Content}}",
            )
            .unwrap();
            Fixture {
                template: template::parse_template(&layout).unwrap(),
                dir,
                fake: FakeHighlighter::default(),
            }
        }

        fn post(&self, name: &str, contents: &str) -> Post {
            let path = self.dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            post::load(&path).unwrap()
        }

        fn render(&self, post: &mut Post) -> Result<String> {
            let cache = HighlightCache::new(&self.dir.path().join("cache"), &self.fake);
            let renderer = Renderer {
                template: &self.template,
                highlighter: &cache,
            };
            Ok(String::from_utf8(renderer.render(post)?).unwrap())
        }
    }

    #[test]
    fn test_split_source() {
        assert_eq!(split_source("T\n---\nbody\nmore"), Some(("T", "body\nmore")));
        assert_eq!(split_source("T\r\n---\r\nbody"), Some(("T", "body")));
        assert_eq!(split_source("T\n---"), Some(("T", "")));
        assert_eq!(split_source("T\n--\nbody"), None);
        assert_eq!(split_source("T"), None);
    }

    #[test]
    fn test_render_hello() -> Result<()> {
        let fixture = Fixture::new();
        let mut post = fixture.post("2023-05-01-hello.md", "Hello World\n---\n# Hi\n");
        let page = fixture.render(&mut post)?;

        assert_eq!(post.title, "Hello World");
        assert_eq!(post.content, "<h1>Hi</h1>\n");
        assert_eq!(
            page,
            "<title>Hello World</title><a href=\"/hello\">2023-05-01</a><h1>Hi</h1>\n"
        );
        Ok(())
    }

    #[test]
    fn test_render_highlights_code_blocks() -> Result<()> {
        let fixture = Fixture::new();
        let mut post = fixture.post(
            "2023-05-02-code.md",
            "Code\n---\n```rust\nlet a = 1 < 2;\n```\n",
        );
        let page = fixture.render(&mut post)?;

        assert!(page.contains("<div class=\"hl rust\">"));
        assert!(!page.contains("<pre><code"));
        // the post keeps the unhighlighted markup
        assert!(post.content.contains("<pre><code class=\"language-rust\">"));
        assert_eq!(
            fixture.fake.calls.borrow()[0],
            (String::from("rust"), String::from("let a = 1 < 2;\n"))
        );
        Ok(())
    }

    #[test]
    fn test_render_rejects_missing_separator() {
        let fixture = Fixture::new();
        let mut post = fixture.post("2023-05-03-bad.md", "Title\nno separator\nbody\n");
        match fixture.render(&mut post) {
            Err(Error::MissingSeparator { path }) => {
                assert_eq!(path.file_name(), Path::new("2023-05-03-bad.md").file_name())
            }
            other => panic!("expected separator error, got {:?}", other),
        }
    }
}
