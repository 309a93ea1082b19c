//! Syntax highlighting for rendered pages. Code blocks are handed to an
//! external [`Highlighter`] (by default `pygmentize`), which is slow, so every
//! result is persisted in a cache directory keyed by a hash of the block's
//! raw markup. Cache entries are never validated, expired, or deleted; a key
//! that is already on disk is served verbatim.
//!
//! The key covers the whole matched block (tags and class attribute
//! included), not just the code, so the same code under a different language
//! tag gets its own entry.

use regex::bytes::{Captures, Regex};
use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Matches a fenced code block rendered with a language class. The inner
/// content is matched non-greedily and may span lines.
const CODE_BLOCK_PATTERN: &str = r#"(?ms)<pre><code class="(.*?)">(.*?)</code></pre>"#;

/// The class prefix the markdown renderer puts in front of the language.
const LANGUAGE_CLASS_PREFIX: &str = "language-";

const FNV32_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV32_PRIME: u32 = 16_777_619;

/// Produces highlighted HTML for a snippet of source code.
pub trait Highlighter {
    /// Highlights `code` written in `language`, returning an HTML fragment.
    fn highlight(&self, language: &str, code: &str) -> Result<Vec<u8>>;
}

impl<H: Highlighter + ?Sized> Highlighter for &H {
    fn highlight(&self, language: &str, code: &str) -> Result<Vec<u8>> {
        (**self).highlight(language, code)
    }
}

/// A [`Highlighter`] that runs an external program once per snippet. The
/// language is appended as the final argument, the code is written to the
/// program's stdin, and its stdout is the highlighted fragment.
#[derive(Clone, Debug)]
pub struct CommandHighlighter {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CommandHighlighter {
    /// `pygmentize -f html -l {language}`
    fn default() -> Self {
        CommandHighlighter {
            program: String::from("pygmentize"),
            args: vec![String::from("-f"), String::from("html"), String::from("-l")],
        }
    }
}

impl Highlighter for CommandHighlighter {
    fn highlight(&self, language: &str, code: &str) -> Result<Vec<u8>> {
        let process_error = |err: io::Error| Error::Process {
            program: self.program.clone(),
            err,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(language)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(process_error)?;

        // Feed stdin from its own thread so a program that streams output
        // can't fill the stdout pipe while we are still writing. Dropping
        // stdin at the end of the thread closes the pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let code = code.to_owned();
            std::thread::spawn(move || stdin.write_all(code.as_bytes()))
        });

        let output = child.wait_with_output().map_err(process_error)?;
        let written = match writer {
            Some(writer) => writer
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            None => Ok(()),
        };
        if !output.status.success() {
            return Err(Error::Exit {
                program: self.program.clone(),
                language: language.to_owned(),
                status: output.status,
            });
        }
        written.map_err(process_error)?;
        Ok(output.stdout)
    }
}

/// Computes the cache key for a raw code block: the 32-bit FNV-1 hash of the
/// bytes, in decimal.
pub fn cache_key(raw: &[u8]) -> String {
    raw.iter()
        .fold(FNV32_OFFSET_BASIS, |hash, byte| {
            hash.wrapping_mul(FNV32_PRIME) ^ u32::from(*byte)
        })
        .to_string()
}

/// Replaces the code blocks of whole documents with highlighted markup,
/// consulting and filling the on-disk cache.
pub struct HighlightCache<H> {
    directory: PathBuf,
    highlighter: H,
    pattern: Regex,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl<H: Highlighter> HighlightCache<H> {
    /// Creates a cache rooted at `directory`. The directory must exist before
    /// the first miss is persisted.
    pub fn new(directory: &Path, highlighter: H) -> Self {
        HighlightCache {
            directory: directory.to_owned(),
            highlighter,
            // the pattern is a constant, so this can only fail if it is edited
            pattern: Regex::new(CODE_BLOCK_PATTERN).unwrap(),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// The number of blocks served from disk.
    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    /// The number of blocks sent to the highlighter.
    pub fn misses(&self) -> usize {
        self.misses.get()
    }

    /// Highlights every code block in `document`. Bytes outside of code
    /// blocks are copied through untouched.
    pub fn highlight(&self, document: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(document.len());
        let mut last = 0;
        for m in self.pattern.find_iter(document) {
            output.extend_from_slice(&document[last..m.start()]);
            output.extend_from_slice(&self.highlight_block(m.as_bytes())?);
            last = m.end();
        }
        output.extend_from_slice(&document[last..]);
        Ok(output)
    }

    /// Highlights a single raw code block, e.g.
    /// `<pre><code class="language-rust">fn main() {}</code></pre>`.
    pub fn highlight_block(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let key = cache_key(raw);
        let path = self.directory.join(&key);

        match std::fs::read(&path) {
            Ok(cached) => {
                log::debug!("highlight cache hit `{}`", key);
                self.hits.set(self.hits.get() + 1);
                return Ok(cached);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(Error::Io { path, err }),
        }

        let captures = self
            .pattern
            .captures(raw)
            .ok_or_else(|| Error::NotACodeBlock(String::from_utf8_lossy(raw).into_owned()))?;
        let (language, code) = split_block(&captures)?;
        log::debug!("highlight cache miss `{}` ({})", key, language);

        let highlighted = self.highlighter.highlight(language, &code)?;
        self.misses.set(self.misses.get() + 1);

        std::fs::write(&path, &highlighted).map_err(|err| Error::Io { path, err })?;
        Ok(highlighted)
    }
}

/// Pulls the language and the unescaped code out of a matched block.
fn split_block<'a>(captures: &Captures<'a>) -> Result<(&'a str, String)> {
    let group = |i| captures.get(i).map(|m| m.as_bytes()).unwrap_or_default();

    let class = std::str::from_utf8(group(1)).map_err(|_| Error::Utf8)?;
    let language = class.strip_prefix(LANGUAGE_CLASS_PREFIX).unwrap_or(class);

    let inner = std::str::from_utf8(group(2)).map_err(|_| Error::Utf8)?;
    Ok((language, unescape(inner).into_owned()))
}

/// Reverses the HTML escaping applied to code block contents. Named HTML5
/// entities and numeric character references are decoded; anything else,
/// including a bare `&` or an unknown entity, is copied through unchanged.
pub fn unescape(escaped: &str) -> Cow<str> {
    if !escaped.contains('&') {
        return Cow::Borrowed(escaped);
    }

    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_reference(rest) {
            Some((decoded, len)) => {
                out.push_str(&decoded);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes the `&...;` reference at the start of `s`, returning the text it
/// stands for and the number of bytes it spans.
fn decode_reference(s: &str) -> Option<(Cow<'static, str>, usize)> {
    let end = s.find(';')?;
    let name = &s[1..end];
    let decoded = match name.strip_prefix('#') {
        Some(number) => {
            let code = match number.strip_prefix(&['x', 'X'][..]) {
                Some(hex) if is_digits(hex, 16) => u32::from_str_radix(hex, 16).ok()?,
                None if is_digits(number, 10) => number.parse().ok()?,
                _ => return None,
            };
            // NUL, surrogates and out-of-range code points decode to U+FFFD
            let c = char::from_u32(code)
                .filter(|&c| c != '\0')
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            Cow::Owned(c.to_string())
        }
        None => Cow::Borrowed(quick_xml::escape::resolve_html5_entity(name)?),
    };
    Some((decoded, end + 1))
}

fn is_digits(s: &str, radix: u32) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_digit(radix))
}

/// The result of a fallible highlighting operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error highlighting a code block.
#[derive(Debug)]
pub enum Error {
    /// Returned when the highlighter program can't be started or piped to.
    Process { program: String, err: io::Error },

    /// Returned when the highlighter program exits unsuccessfully.
    Exit {
        program: String,
        language: String,
        status: ExitStatus,
    },

    /// Returned when a block's language or contents aren't valid UTF-8.
    Utf8,

    /// Returned when [`HighlightCache::highlight_block`] is given something
    /// other than a code block.
    NotACodeBlock(String),

    /// Returned for errors reading or writing cache entries.
    Io { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Process { program, err } => {
                write!(f, "running highlighter `{}`: {}", program, err)
            }
            Error::Exit {
                program,
                language,
                status,
            } => write!(
                f,
                "highlighter `{}` failed for language `{}`: {}",
                program, language, status
            ),
            Error::Utf8 => write!(f, "code block is not valid UTF-8"),
            Error::NotACodeBlock(raw) => write!(f, "not a code block: {}", raw),
            Error::Io { path, err } => {
                write!(f, "highlight cache entry `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Process { err, .. } => Some(err),
            Error::Io { err, .. } => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Wraps code in a `<span>` tagged with the language and records every
    /// call.
    #[derive(Default)]
    pub struct FakeHighlighter {
        pub calls: RefCell<Vec<(String, String)>>,
    }

    impl Highlighter for FakeHighlighter {
        fn highlight(&self, language: &str, code: &str) -> Result<Vec<u8>> {
            self.calls
                .borrow_mut()
                .push((language.to_owned(), code.to_owned()));
            Ok(format!(r#"<div class="hl {}">{}</div>"#, language, code.len()).into_bytes())
        }
    }

    const DOCUMENT: &str = concat!(
        "<html><body>\n",
        "<p>before</p>\n",
        "<pre><code class=\"language-rust\">fn main() {\n",
        "    println!(&quot;a &lt; b &amp;&amp; c&quot;);\n",
        "}\n",
        "</code></pre>\n",
        "<p>between</p>\n",
        "<pre><code>untagged</code></pre>\n",
        "<pre><code class=\"language-sh\">echo hi\n</code></pre>\n",
        "</body></html>\n",
    );

    #[test]
    fn test_cache_key_is_fnv1_32() {
        // Reference values for FNV-1 (not FNV-1a), 32 bits.
        assert_eq!(cache_key(b""), "2166136261");
        assert_eq!(cache_key(b"a"), "84696446");
        assert_eq!(cache_key(b"foobar"), "837857890");
    }

    #[test]
    fn test_highlight_replaces_only_tagged_blocks() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let fake = FakeHighlighter::default();
        let cache = HighlightCache::new(dir.path(), &fake);

        let output = String::from_utf8(cache.highlight(DOCUMENT.as_bytes())?).unwrap();

        assert!(output.starts_with("<html><body>\n<p>before</p>\n<div class=\"hl rust\">"));
        assert!(output.contains("<p>between</p>\n<pre><code>untagged</code></pre>\n"));
        assert!(output.contains("<div class=\"hl sh\">8</div>\n</body></html>\n"));
        assert!(!output.contains("language-"));

        let calls = fake.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "rust");
        assert_eq!(calls[1], (String::from("sh"), String::from("echo hi\n")));
        Ok(())
    }

    #[test]
    fn test_highlight_unescapes_code_before_highlighting() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let fake = FakeHighlighter::default();
        let cache = HighlightCache::new(dir.path(), &fake);
        cache.highlight(DOCUMENT.as_bytes())?;

        assert_eq!(
            fake.calls.borrow()[0].1,
            "fn main() {\n    println!(\"a < b && c\");\n}\n"
        );
        Ok(())
    }

    #[test]
    fn test_highlight_is_idempotent_and_second_pass_hits_cache() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let fake = FakeHighlighter::default();
        let cache = HighlightCache::new(dir.path(), &fake);

        let first = cache.highlight(DOCUMENT.as_bytes())?;
        assert_eq!(fake.calls.borrow().len(), 2);
        assert_eq!(cache.misses(), 2);

        let second = cache.highlight(DOCUMENT.as_bytes())?;
        assert_eq!(first, second);
        assert_eq!(fake.calls.borrow().len(), 2);
        assert_eq!(cache.hits(), 2);
        Ok(())
    }

    #[test]
    fn test_cache_survives_across_instances() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let first = HighlightCache::new(dir.path(), FakeHighlighter::default())
            .highlight(DOCUMENT.as_bytes())?;

        let fake = FakeHighlighter::default();
        let cache = HighlightCache::new(dir.path(), &fake);
        assert_eq!(cache.highlight(DOCUMENT.as_bytes())?, first);
        assert!(fake.calls.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_cache_hit_is_served_verbatim() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let raw = br#"<pre><code class="language-rust">let x = 1;</code></pre>"#;
        std::fs::write(dir.path().join(cache_key(raw)), "planted").unwrap();

        let fake = FakeHighlighter::default();
        let cache = HighlightCache::new(dir.path(), &fake);
        assert_eq!(cache.highlight_block(raw)?, b"planted".to_vec());
        assert!(fake.calls.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_same_code_under_different_languages_gets_two_entries() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let fake = FakeHighlighter::default();
        let cache = HighlightCache::new(dir.path(), &fake);

        let document = concat!(
            "<pre><code class=\"language-python\">print(1)\n</code></pre>",
            "<pre><code class=\"language-ruby\">print(1)\n</code></pre>",
        );
        cache.highlight(document.as_bytes())?;

        assert_eq!(fake.calls.borrow().len(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
        Ok(())
    }

    #[test]
    fn test_class_without_prefix_is_used_as_language() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let fake = FakeHighlighter::default();
        let cache = HighlightCache::new(dir.path(), &fake);
        cache.highlight_block(br#"<pre><code class="go">x := 1</code></pre>"#)?;
        assert_eq!(fake.calls.borrow()[0].0, "go");
        Ok(())
    }

    #[test]
    fn test_unescape_round_trip() -> Result<()> {
        let original = "if a < b && c > d { \"quoted\" } 'single'";
        let mut escaped = String::new();
        pulldown_cmark::escape::escape_html(&mut escaped, original).unwrap();
        assert_ne!(escaped, original);
        assert_eq!(unescape(&escaped), original);
        assert_eq!(unescape("&#39;&#x41;&nbsp;"), "'A\u{a0}");
        Ok(())
    }

    #[test]
    fn test_unescape_copies_malformed_references_through() {
        assert_eq!(unescape("if (a && b) {}"), "if (a && b) {}");
        assert_eq!(unescape("&foo; &copy &amp;"), "&foo; &copy &");
        assert_eq!(unescape("a & b; c &lt; d"), "a & b; c < d");
        assert_eq!(unescape("&#; &#x; &#12a; &;"), "&#; &#x; &#12a; &;");
        assert_eq!(unescape("&#0;&#xD800;&#99999999;"), "\u{fffd}\u{fffd}\u{fffd}");
        assert!(matches!(unescape("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_raw_html_block_with_bare_ampersands_is_highlighted() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let fake = FakeHighlighter::default();
        let cache = HighlightCache::new(dir.path(), &fake);

        let output = cache.highlight(br#"<pre><code class="c">if (a && b) {}</code></pre>"#)?;
        assert_eq!(output, br#"<div class="hl c">14</div>"#.to_vec());
        assert_eq!(
            fake.calls.borrow()[0],
            (String::from("c"), String::from("if (a && b) {}"))
        );
        Ok(())
    }

    #[test]
    fn test_failed_highlighter_is_an_error_and_caches_nothing() {
        struct Failing;
        impl Highlighter for Failing {
            fn highlight(&self, _: &str, _: &str) -> Result<Vec<u8>> {
                Err(Error::Utf8)
            }
        }

        let dir = TempDir::new().unwrap();
        let cache = HighlightCache::new(dir.path(), Failing);
        assert!(cache.highlight(DOCUMENT.as_bytes()).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_highlighter_pipes_code_through_program() -> Result<()> {
        // `sh -c 'cat' sh {language}` echoes stdin back.
        let highlighter = CommandHighlighter {
            program: String::from("sh"),
            args: vec![String::from("-c"), String::from("cat"), String::from("sh")],
        };
        assert_eq!(highlighter.highlight("rust", "fn main() {}")?, b"fn main() {}".to_vec());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_command_highlighter_handles_output_larger_than_pipe_buffer() -> Result<()> {
        let highlighter = CommandHighlighter {
            program: String::from("sh"),
            args: vec![String::from("-c"), String::from("cat"), String::from("sh")],
        };
        let code = "let x = 1;\n".repeat(100_000);
        assert_eq!(highlighter.highlight("rust", &code)?, code.into_bytes());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_command_highlighter_nonzero_exit_is_fatal() {
        let highlighter = CommandHighlighter {
            program: String::from("sh"),
            args: vec![String::from("-c"), String::from("exit 3"), String::from("sh")],
        };
        match highlighter.highlight("rust", "") {
            Err(Error::Exit { language, .. }) => assert_eq!(language, "rust"),
            other => panic!("expected exit error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_a_process_error() {
        let highlighter = CommandHighlighter {
            program: String::from("definitely-not-a-real-highlighter"),
            args: Vec::new(),
        };
        assert!(matches!(
            highlighter.highlight("rust", "x"),
            Err(Error::Process { .. })
        ));
    }
}
