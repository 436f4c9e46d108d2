//! HTML to markdown conversion for newsletter pages.
//!
//! Only the structure the summarizers care about survives: headers, paragraphs,
//! list items and links. Every `href` is resolved against the page URL so the
//! model sees absolute links it can copy verbatim.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "main", "#content", ".content", "body"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid content selector"))
        .collect()
});

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "nav", "footer", "form", "button", "iframe",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "blockquote", "ul", "ol", "table",
    "tr", "pre", "figure", "dl", "dd", "dt",
];

/// Words in a class or id that mark page chrome rather than content.
const BOILERPLATE_MARKERS: &[&str] = &["navbar", "sidebar", "cookie", "consent", "subscribe-form"];

/// Convert the main content of `html` to markdown.
pub fn html_to_markdown(html: &str, base: &Url) -> String {
    let document = Html::parse_document(html);
    let root = CONTENT_SELECTORS
        .iter()
        .find_map(|s| document.select(s).next())
        .unwrap_or_else(|| document.root_element());

    let mut renderer = Renderer {
        base,
        out: String::new(),
    };
    renderer.children(root);
    tidy(&renderer.out)
}

struct Renderer<'a> {
    base: &'a Url,
    out: String,
}

impl Renderer<'_> {
    fn children(&mut self, el: ElementRef) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.text(text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el);
                    }
                }
                _ => {}
            }
        }
    }

    fn text(&mut self, raw: &str) {
        let collapsed = collapse_spaces(raw);
        if collapsed.trim().is_empty() {
            if !self.out.ends_with([' ', '\n']) && !self.out.is_empty() {
                self.out.push(' ');
            }
            return;
        }
        self.out.push_str(&collapsed);
    }

    fn element(&mut self, el: ElementRef) {
        let name = el.value().name();
        if SKIPPED_TAGS.contains(&name) || is_boilerplate(&el) {
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(2);
                let title = inline_text(&el);
                if !title.is_empty() {
                    self.block_break();
                    self.out.push_str(&"#".repeat(level));
                    self.out.push(' ');
                    self.out.push_str(&title);
                    self.block_break();
                }
            }
            "li" => {
                self.line_break();
                self.out.push_str("- ");
                self.children(el);
                self.line_break();
            }
            "br" => self.line_break(),
            "hr" => {
                self.block_break();
                self.out.push_str("---");
                self.block_break();
            }
            "a" => self.link(el),
            "img" => self.image(el),
            "strong" | "b" => self.wrap(el, "**"),
            "em" | "i" => self.wrap(el, "*"),
            "code" => self.wrap(el, "`"),
            _ if BLOCK_TAGS.contains(&name) => {
                self.block_break();
                self.children(el);
                self.block_break();
            }
            _ => self.children(el),
        }
    }

    fn link(&mut self, el: ElementRef) {
        let text = inline_text(&el);
        let href = el.value().attr("href").map(str::trim).unwrap_or("");
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            self.out.push_str(&text);
            return;
        }
        let Ok(url) = self.base.join(href) else {
            self.out.push_str(&text);
            return;
        };
        if text.is_empty() {
            return;
        }
        self.out.push_str(&format!("[{}]({})", escape_brackets(&text), url));
    }

    fn image(&mut self, el: ElementRef) {
        let Some(src) = el.value().attr("src") else {
            return;
        };
        if let Ok(url) = self.base.join(src) {
            let alt = el.value().attr("alt").unwrap_or("").trim();
            self.out
                .push_str(&format!("![{}]({})", escape_brackets(alt), url));
        }
    }

    fn wrap(&mut self, el: ElementRef, marker: &str) {
        let text = inline_text(&el);
        if text.is_empty() {
            return;
        }
        // Links inside emphasis still need their targets.
        if el.select(&ANCHOR).next().is_some() {
            self.children(el);
            return;
        }
        self.out.push_str(marker);
        self.out.push_str(&text);
        self.out.push_str(marker);
    }

    fn line_break(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn block_break(&mut self) {
        self.line_break();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }
}

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

fn is_boilerplate(el: &ElementRef) -> bool {
    let mut marks = String::new();
    for attr in ["class", "id"] {
        if let Some(v) = el.value().attr(attr) {
            marks.push_str(&v.to_ascii_lowercase());
            marks.push(' ');
        }
    }
    BOILERPLATE_MARKERS.iter().any(|m| marks.contains(m))
}

fn inline_text(el: &ElementRef) -> String {
    collapse_spaces(&el.text().collect::<String>()).trim().to_string()
}

fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn escape_brackets(s: &str) -> String {
    s.replace('[', "(").replace(']', ")")
}

/// Trim each line and keep at most one blank line between blocks.
fn tidy(raw: &str) -> String {
    let mut out = String::new();
    let mut blank = 0;
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            blank += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank = 0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://news.smol.ai/issues/25-09-01-not-much").unwrap()
    }

    #[test]
    fn test_headers_paragraphs_and_lists() {
        let html = r#"<html><body><article>
            <h1>AI News</h1>
            <p>Quiet   day.</p>
            <h2>AI Twitter Recap</h2>
            <ul><li>first <strong>item</strong></li><li>second</li></ul>
        </article></body></html>"#;
        let md = html_to_markdown(html, &base());
        assert_eq!(
            md,
            "# AI News\n\nQuiet day.\n\n## AI Twitter Recap\n\n- first **item**\n- second"
        );
    }

    #[test]
    fn test_links_are_absolute() {
        let html = r#"<article><p>See <a href="/issues/25-08-31">yesterday</a> and
            <a href="https://x.com/a/status/1961129789944627207">this</a>.</p></article>"#;
        let md = html_to_markdown(html, &base());
        assert!(md.contains("[yesterday](https://news.smol.ai/issues/25-08-31)"));
        assert!(md.contains("[this](https://x.com/a/status/1961129789944627207)"));
    }

    #[test]
    fn test_skips_chrome() {
        let html = r#"<body><nav><a href="/">Home</a></nav>
            <div class="sidebar">ads</div>
            <main><p>content</p><script>var x = 1;</script></main>
            <footer>bye</footer></body>"#;
        assert_eq!(html_to_markdown(html, &base()), "content");
    }

    #[test]
    fn test_anchor_fragments_become_text() {
        let html = r##"<article><p><a href="#top">Back</a></p></article>"##;
        assert_eq!(html_to_markdown(html, &base()), "Back");
    }

    #[test]
    fn test_images_and_dividers() {
        let html = r#"<article><img src="/cover.png" alt="Cover"><hr><p>text</p></article>"#;
        let md = html_to_markdown(html, &base());
        assert_eq!(md, "![Cover](https://news.smol.ai/cover.png)\n\n---\n\ntext");
    }

    #[test]
    fn test_emphasis_around_link_keeps_target() {
        let html = r#"<article><p><strong><a href="https://a.io/x">bold link</a></strong></p></article>"#;
        assert_eq!(html_to_markdown(html, &base()), "[bold link](https://a.io/x)");
    }
}
