use pulldown_cmark::*;
use regex::Regex;

/// Converts markdown to HTML, appending the result to `out`. Besides the
/// CommonMark basics this enables tables, strikethrough, footnotes, and task
/// lists, and turns bare `http(s)://` URLs in running text into links.
/// Fenced code blocks with an info string are rendered as
/// `<pre><code class="language-{lang}">`.
pub fn to_html(out: &mut String, markdown: &str) {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut autolinker = Autolinker::new();
    let events = Parser::new_ext(markdown, options).flat_map(|ev| autolinker.convert(ev));
    html::push_html(out, events);
}

/// Splits text events containing bare URLs into link events. Text inside of
/// links and code blocks is left alone.
///
/// The parser breaks running text at entities and emphasis delimiters, so a
/// single URL can span several text events. Adjacent text is buffered and
/// scanned as a whole when the next non-text event arrives; every text event
/// sits inside a block, so that event always comes.
struct Autolinker {
    url_pattern: Regex,
    link_depth: usize,
    in_code_block: bool,
    pending: String,
}

impl Autolinker {
    fn new() -> Self {
        Autolinker {
            // constant pattern; this can't fail
            url_pattern: Regex::new(r#"https?://[^\s<>"]*[^\s<>".,;:!?)\]'*]"#).unwrap(),
            link_depth: 0,
            in_code_block: false,
            pending: String::new(),
        }
    }

    fn convert<'a>(&mut self, ev: Event<'a>) -> Vec<Event<'a>> {
        if let Event::Text(text) = &ev {
            if self.link_depth == 0 && !self.in_code_block {
                self.pending.push_str(text);
                return Vec::new();
            }
        }

        let mut events = self.flush();
        match &ev {
            Event::Start(Tag::Link(..)) => self.link_depth += 1,
            Event::End(Tag::Link(..)) => self.link_depth = self.link_depth.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => self.in_code_block = true,
            Event::End(Tag::CodeBlock(_)) => self.in_code_block = false,
            _ => {}
        }
        events.push(ev);
        events
    }

    fn flush<'a>(&mut self) -> Vec<Event<'a>> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let text = std::mem::take(&mut self.pending);
        self.link_text(&text)
    }

    fn link_text<'a>(&self, text: &str) -> Vec<Event<'a>> {
        let mut events = Vec::new();
        let mut last = 0;
        for m in self.url_pattern.find_iter(text) {
            let end = balance_parens(text, m.start(), m.end());
            if m.start() > last {
                events.push(Event::Text(CowStr::from(text[last..m.start()].to_owned())));
            }
            let url = CowStr::from(text[m.start()..end].to_owned());
            let link = Tag::Link(LinkType::Autolink, url.clone(), CowStr::from(""));
            events.push(Event::Start(link.clone()));
            events.push(Event::Text(url));
            events.push(Event::End(link));
            last = end;
        }
        if last < text.len() {
            events.push(Event::Text(CowStr::from(text[last..].to_owned())));
        }
        events
    }
}

/// Extends a URL match over closing parentheses that pair with opening ones
/// inside it, e.g. `https://en.wikipedia.org/wiki/Foo_(bar)`.
fn balance_parens(text: &str, start: usize, mut end: usize) -> usize {
    let url = &text[start..end];
    let open = url.matches('(').count();
    let mut closed = url.matches(')').count();
    while open > closed && text[end..].starts_with(')') {
        end += 1;
        closed += 1;
    }
    end
}

#[cfg(test)]
mod test {
    use super::*;

    fn render(markdown: &str) -> String {
        let mut out = String::new();
        to_html(&mut out, markdown);
        out
    }

    #[test]
    fn test_heading() {
        assert_eq!(render("# Hi\n"), "<h1>Hi</h1>\n");
    }

    #[test]
    fn test_fenced_code_block_carries_language_class() {
        let html = render("```rust\nlet x = a < b;\n```\n");
        assert_eq!(
            html,
            "<pre><code class=\"language-rust\">let x = a &lt; b;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_tables() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_bare_urls_are_linked() {
        let html = render("See https://example.org/x, then stop.\n");
        assert_eq!(
            html,
            "<p>See <a href=\"https://example.org/x\">https://example.org/x</a>, then stop.</p>\n"
        );
    }

    #[test]
    fn test_url_spanning_entities_and_delimiters_is_linked_whole() {
        let html = render("See https://example.org/a_b_c?x=1&amp;y=2 now\n");
        assert_eq!(
            html,
            concat!(
                "<p>See <a href=\"https://example.org/a_b_c?x=1&amp;y=2\">",
                "https://example.org/a_b_c?x=1&amp;y=2</a> now</p>\n"
            )
        );
    }

    #[test]
    fn test_url_keeps_balanced_parentheses() {
        let html = render("Read https://en.wikipedia.org/wiki/Foo_(bar) now.\n");
        assert!(html.contains(
            "<a href=\"https://en.wikipedia.org/wiki/Foo_(bar)\">https://en.wikipedia.org/wiki/Foo_(bar)</a> now."
        ));

        let html = render("(see https://example.org/x)\n");
        assert_eq!(
            html,
            "<p>(see <a href=\"https://example.org/x\">https://example.org/x</a>)</p>\n"
        );
    }

    #[test]
    fn test_text_around_inline_markup_is_preserved() {
        assert_eq!(
            render("a *b* c `d` e\n"),
            "<p>a <em>b</em> c <code>d</code> e</p>\n"
        );
    }

    #[test]
    fn test_existing_links_and_code_are_not_relinked() {
        let html = render("[site](https://example.org)\n\n```\nhttps://example.org\n```\n");
        assert_eq!(html.matches("<a ").count(), 1);
        assert!(html.contains("<pre><code>https://example.org\n</code></pre>"));
    }
}
