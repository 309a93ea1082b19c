//! Writes rendered pages to disk. Pages are always rewritten in full; only
//! the highlight cache persists between builds.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// The file name every page is written to inside its directory.
pub const PAGE_FILE_NAME: &str = "index.html";

/// The output location for a post: `{build_directory}/{slug}/index.html`.
pub fn post_path(build_directory: &Path, slug: &str) -> PathBuf {
    build_directory.join(slug).join(PAGE_FILE_NAME)
}

/// The output location for the index: `{build_directory}/index.html`.
pub fn index_path(build_directory: &Path) -> PathBuf {
    build_directory.join(PAGE_FILE_NAME)
}

/// Writes `contents` to `path`, creating parent directories as needed and
/// replacing whatever was there before.
pub fn write_page(path: &Path, contents: &[u8]) -> Result<()> {
    let annotate = |err: io::Error| Error {
        path: path.to_owned(),
        err,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(annotate)?;
    }
    std::fs::write(path, contents).map_err(annotate)?;
    log::info!("wrote `{}`", path.display());
    Ok(())
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error writing a page, annotated with the offending path.
#[derive(Debug)]
pub struct Error {
    pub path: PathBuf,
    pub err: io::Error,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Writing '{}': {}", self.path.display(), self.err)
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let build = Path::new("public");
        assert_eq!(post_path(build, "hello"), Path::new("public/hello/index.html"));
        assert_eq!(index_path(build), Path::new("public/index.html"));
    }

    #[test]
    fn test_write_page_creates_directories_and_overwrites() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = post_path(dir.path(), "hello");

        write_page(&path, b"first")?;
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        write_page(&path, b"second")?;
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        Ok(())
    }

    #[test]
    fn test_write_page_reports_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "a file, not a directory").unwrap();

        let err = write_page(&blocker.join("index.html"), b"x").unwrap_err();
        assert_eq!(err.path, blocker.join("index.html"));
    }
}
