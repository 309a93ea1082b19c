use crate::post::Post;
use gtmpl_value::Value;
use std::collections::HashMap;

/// The human-friendly date format exposed to templates as `DisplayDate`.
const DISPLAY_DATE_FORMAT: &str = "%B %-d, %Y";

impl From<&Post> for Value {
    /// Converts a [`Post`] into a template object. Field names are
    /// capitalized: `Title`, `Slug`, `Url`, `Date` (`YYYY-MM-DD`),
    /// `DisplayDate`, `Content`, and `SourcePath`.
    fn from(p: &Post) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("Title".to_owned(), Value::String(p.title.clone()));
        m.insert("Slug".to_owned(), Value::String(p.slug.clone()));
        m.insert("Url".to_owned(), Value::String(p.url.clone()));
        m.insert("Date".to_owned(), Value::String(p.date.to_string()));
        m.insert(
            "DisplayDate".to_owned(),
            Value::String(p.date.format(DISPLAY_DATE_FORMAT).to_string()),
        );
        m.insert("Content".to_owned(), Value::String(p.content.clone()));
        m.insert(
            "SourcePath".to_owned(),
            Value::String(p.source_path.display().to_string()),
        );
        Value::Object(m)
    }
}

/// Converts a list of posts into a template array.
pub fn posts_to_value(posts: &[Post]) -> Value {
    Value::Array(posts.iter().map(Value::from).collect())
}
