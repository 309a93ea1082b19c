//! Loading and executing page templates. Templates use Go's `text/template`
//! syntax (via [`gtmpl`]) and perform no escaping, so HTML in context values
//! is substituted verbatim.

use gtmpl::{Context, Template, Value};
use std::fmt;
use std::path::{Path, PathBuf};

/// Reads and parses the template at `path`.
pub fn parse_template(path: &Path) -> Result<Template> {
    let contents = std::fs::read_to_string(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })?;

    let mut template = Template::default();
    template.parse(&contents).map_err(|err| Error::Parse {
        path: path.to_owned(),
        err,
    })?;
    Ok(template)
}

/// Executes `template` against `value`, returning the resulting document.
pub fn execute(template: &Template, value: Value) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let context = Context::from(value).map_err(Error::Execute)?;
    template
        .execute(&mut buffer, &context)
        .map_err(Error::Execute)?;
    Ok(buffer)
}

/// The result of a fallible template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or executing a template.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while opening template files.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    Parse { path: PathBuf, err: String },

    /// Returned for errors during templating.
    Execute(String),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::Parse { path, err } => {
                write!(f, "Parsing template file '{}': {}", path.display(), err)
            }
            Error::Execute(err) => write!(f, "Executing template: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Parse { .. } => None,
            Error::Execute(_) => None,
        }
    }
}
