//! Build configuration. Every path has a default relative to the project
//! root, so a project needs no configuration file at all; `bloggy.yaml` only
//! overrides what it mentions.

use crate::highlight::CommandHighlighter;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the optional project file.
pub const PROJECT_FILE_NAME: &str = "bloggy.yaml";

/// Author information for the Atom feed.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct Highlighter {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Project {
    posts_directory: Option<PathBuf>,
    build_directory: Option<PathBuf>,
    post_layout: Option<PathBuf>,
    index_layout: Option<PathBuf>,
    static_directory: Option<PathBuf>,
    cache_directory: Option<PathBuf>,
    index_limit: Option<usize>,
    title: Option<String>,
    site_url: Option<Url>,
    author: Option<Author>,
    highlighter: Option<Highlighter>,
}

/// Everything a build needs to know. Paths are absolute or relative to the
/// working directory; [`Config::with_root`] resolves the defaults against a
/// project root.
#[derive(Clone, Debug)]
pub struct Config {
    /// The directory searched for `YYYY-MM-DD-{slug}.md` files.
    pub posts_directory: PathBuf,

    /// The root of the rendered site.
    pub build_directory: PathBuf,

    /// The template applied to every post.
    pub post_layout: PathBuf,

    /// The template for the index page.
    pub index_layout: PathBuf,

    /// Copied verbatim into the build directory, if it exists.
    pub static_directory: PathBuf,

    /// Where highlighted code blocks are cached between builds.
    pub cache_directory: PathBuf,

    /// The maximum number of posts listed on the index page.
    pub index_limit: Option<usize>,

    /// The site title, used for the feed.
    pub title: String,

    /// The absolute URL the site is served from. The Atom feed is only
    /// written when this is set, since feed links must be absolute.
    pub site_url: Option<Url>,

    /// The feed author.
    pub author: Option<Author>,

    /// The external program used to highlight code blocks.
    pub highlighter: CommandHighlighter,
}

impl Config {
    /// The default layout rooted at `root`: `posts/`, `public/`,
    /// `layouts/post.html`, `layouts/index.html`, `static/`, and
    /// `.pygments-cache/`.
    pub fn with_root(root: &Path) -> Config {
        Config {
            posts_directory: root.join("posts"),
            build_directory: root.join("public"),
            post_layout: root.join("layouts").join("post.html"),
            index_layout: root.join("layouts").join("index.html"),
            static_directory: root.join("static"),
            cache_directory: root.join(".pygments-cache"),
            index_limit: None,
            title: String::default(),
            site_url: None,
            author: None,
            highlighter: CommandHighlighter::default(),
        }
    }

    /// Searches `dir` and its parents for a project file and loads the first
    /// one found. Without a project file, the defaults rooted at `dir` are
    /// used. `dir` is made absolute first, so a relative path such as `.`
    /// still reaches its parents.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let dir = dir.canonicalize().map_err(|err| Error::Directory {
            path: dir.to_owned(),
            err,
        })?;
        for ancestor in dir.ancestors() {
            let path = ancestor.join(PROJECT_FILE_NAME);
            if path.is_file() {
                log::debug!("using project file `{}`", path.display());
                return Config::from_project_file(&path);
            }
        }
        log::debug!(
            "no `{}` found; using defaults rooted at `{}`",
            PROJECT_FILE_NAME,
            dir.display()
        );
        Ok(Config::with_root(&dir))
    }

    /// Loads a project file. Relative paths inside it are resolved against
    /// the directory containing the file.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path).map_err(|err| Error::Open {
            path: path.to_owned(),
            err,
        })?;
        // an empty document deserializes as null
        let project: Project = match contents.trim().is_empty() {
            true => Project::default(),
            false => serde_yaml::from_str(&contents).map_err(|err| Error::Parse {
                path: path.to_owned(),
                err,
            })?,
        };

        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let mut config = Config::with_root(root);
        let resolve = |relative: Option<PathBuf>, default: &mut PathBuf| {
            if let Some(relative) = relative {
                *default = root.join(relative);
            }
        };
        resolve(project.posts_directory, &mut config.posts_directory);
        resolve(project.build_directory, &mut config.build_directory);
        resolve(project.post_layout, &mut config.post_layout);
        resolve(project.index_layout, &mut config.index_layout);
        resolve(project.static_directory, &mut config.static_directory);
        resolve(project.cache_directory, &mut config.cache_directory);

        config.index_limit = project.index_limit;
        config.title = project.title.unwrap_or_default();
        config.site_url = project.site_url;
        config.author = project.author;
        if let Some(highlighter) = project.highlighter {
            config.highlighter = CommandHighlighter {
                program: highlighter.program,
                args: highlighter.args,
            };
        }
        Ok(config)
    }
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when the directory to search from can't be resolved.
    Directory { path: PathBuf, err: std::io::Error },

    /// Returned when the project file can't be read.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned when the project file isn't valid YAML for a project.
    Parse {
        path: PathBuf,
        err: serde_yaml::Error,
    },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Directory { path, err } => {
                write!(f, "Resolving project directory `{}`: {}", path.display(), err)
            }
            Error::Open { path, err } => {
                write!(f, "Opening project file `{}`: {}", path.display(), err)
            }
            Error::Parse { path, err } => {
                write!(f, "Loading configuration `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Directory { err, .. } => Some(err),
            Error::Open { err, .. } => Some(err),
            Error::Parse { err, .. } => Some(err),
        }
    }
}
