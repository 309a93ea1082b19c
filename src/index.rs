//! Builds the index page: a single listing of the most recent posts.

use crate::post::{self, Post};
use crate::template;
use crate::value::posts_to_value;
use gtmpl::{Template, Value};
use std::collections::HashMap;

/// The name under which the post list is exposed to the index template.
pub const RECENT_KEY: &str = "Recent";

/// Renders the index page. `posts` must already be sorted most recent first;
/// if `limit` is given only that many posts are listed. The template sees a
/// single field, `Recent`, holding the list.
pub fn build_index(
    template: &Template,
    posts: &[Post],
    limit: Option<usize>,
) -> template::Result<Vec<u8>> {
    let recent = match limit {
        Some(n) => post::limit(posts, n),
        None => posts,
    };

    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert(RECENT_KEY.to_owned(), posts_to_value(recent));
    template::execute(template, Value::Object(m))
}
