//! Styled Markdown rendering
//!
//! Converts an article's Markdown body into the inline-styled HTML the
//! Official Account editor accepts. The platform strips `<style>` blocks
//! and external stylesheets, so a theme's rules are injected as a `style`
//! attribute on every element the theme knows about.
//!
//! Styling happens on the parser's event stream: structural tags are
//! replaced with raw HTML carrying the resolved style attribute, and the
//! text between them flows through the regular HTML writer (which keeps
//! escaping correct). No regex ever touches the rendered HTML.
//!
//! Two platform quirks are handled here:
//! - arbitrary outbound links are not allowed in article bodies, so any
//!   anchor not targeting the platform's own domain is demoted to a styled
//!   `<span>`
//! - code blocks are highlighted with inline styles (the language comes
//!   from the fence tag, `plaintext` when absent)

use pulldown_cmark::{html, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::sync::Arc;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::config::RenderConfig;
use crate::theme::{StyleMap, StyleTheme};

/// Links into the platform's own domain survive as real anchors.
const PLATFORM_LINK_PREFIX: &str = "https://mp.weixin.qq.com";

/// Fallback syntax-highlighting theme when the configured one is unknown.
const DEFAULT_CODE_THEME: &str = "InspiredGitHub";

/// Renders Markdown to inline-styled HTML.
///
/// Rendering is deterministic: the same input and theme always produce
/// byte-identical output. Malformed Markdown never errors; whatever the
/// parser cannot interpret degrades to literal text.
#[derive(Clone)]
pub struct StyleRenderer {
    styles: StyleMap,
    syntax_set: SyntaxSet,
    theme_set: Arc<ThemeSet>,
    code_theme: String,
}

impl StyleRenderer {
    /// Creates a renderer from a theme and render configuration.
    ///
    /// An unknown `code_theme` falls back to the default rather than
    /// failing; code styling is cosmetic.
    pub fn new(theme: &StyleTheme, options: &RenderConfig) -> Self {
        let styles = theme.resolve(&options.fonts, &options.font_size);
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme_set = ThemeSet::load_defaults();

        let code_theme = if theme_set.themes.contains_key(&options.code_theme) {
            options.code_theme.clone()
        } else {
            DEFAULT_CODE_THEME.to_string()
        };

        Self {
            styles,
            syntax_set,
            theme_set: Arc::new(theme_set),
            code_theme,
        }
    }

    /// Renders with the built-in theme and default options.
    pub fn with_defaults() -> Self {
        Self::new(&StyleTheme::builtin(), &RenderConfig::default())
    }

    /// Renders Markdown text to styled HTML.
    pub fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);

        let parser = Parser::new_ext(markdown, options);
        let events = self.process_events(parser);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Walks the event stream, swapping styled tags in for the parser's
    /// plain ones.
    fn process_events<'a>(&self, parser: Parser<'a>) -> Vec<Event<'a>> {
        let mut events = Vec::new();

        let mut in_code_block = false;
        let mut code_lang: Option<String> = None;
        let mut code_content = String::new();

        let mut in_image = false;
        let mut image_dest = String::new();
        let mut image_alt = String::new();

        let mut blockquote_depth = 0usize;
        let mut link_closers: Vec<&'static str> = Vec::new();
        let mut in_table_head = false;

        for event in parser {
            // image alt text is whatever renders between the image tags
            if in_image {
                match event {
                    Event::End(TagEnd::Image) => {
                        in_image = false;
                        events.push(Event::Html(self.image_html(&image_dest, &image_alt).into()));
                    }
                    Event::Text(text) | Event::Code(text) => image_alt.push_str(&text),
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::Heading { level, .. }) => match heading_rank(level) {
                    Some(rank) => events.push(Event::Html(
                        format!("<h{rank} style=\"{}\">", self.styles.attr(&format!("h{rank}")))
                            .into(),
                    )),
                    None => events.push(Event::Start(Tag::Heading {
                        level,
                        id: None,
                        classes: Vec::new(),
                        attrs: Vec::new(),
                    })),
                },
                Event::End(TagEnd::Heading(level)) => match heading_rank(level) {
                    Some(rank) => events.push(Event::Html(format!("</h{rank}>").into())),
                    None => events.push(Event::End(TagEnd::Heading(level))),
                },

                Event::Start(Tag::Paragraph) => {
                    let kind = if blockquote_depth > 0 && self.styles.declares("blockquote_p") {
                        "blockquote_p"
                    } else {
                        "p"
                    };
                    events.push(Event::Html(
                        format!("<p style=\"{}\">", self.styles.attr(kind)).into(),
                    ));
                }
                Event::End(TagEnd::Paragraph) => events.push(Event::Html("</p>".into())),

                Event::Start(Tag::BlockQuote) => {
                    blockquote_depth += 1;
                    events.push(Event::Html(
                        format!("<blockquote style=\"{}\">", self.styles.attr("blockquote"))
                            .into(),
                    ));
                }
                Event::End(TagEnd::BlockQuote) => {
                    blockquote_depth = blockquote_depth.saturating_sub(1);
                    events.push(Event::Html("</blockquote>".into()));
                }

                Event::Start(Tag::List(start)) => match start {
                    Some(1) => events.push(Event::Html(
                        format!("<ol style=\"{}\">", self.styles.attr("ol")).into(),
                    )),
                    Some(n) => events.push(Event::Html(
                        format!("<ol start=\"{n}\" style=\"{}\">", self.styles.attr("ol")).into(),
                    )),
                    None => events.push(Event::Html(
                        format!("<ul style=\"{}\">", self.styles.attr("ul")).into(),
                    )),
                },
                Event::End(TagEnd::List(ordered)) => {
                    events.push(Event::Html(if ordered { "</ol>" } else { "</ul>" }.into()))
                }
                Event::Start(Tag::Item) => events.push(Event::Html(
                    format!("<li style=\"{}\">", self.styles.attr("listitem")).into(),
                )),
                Event::End(TagEnd::Item) => events.push(Event::Html("</li>".into())),

                Event::Start(Tag::Image { dest_url, .. }) => {
                    in_image = true;
                    image_dest = dest_url.to_string();
                    image_alt.clear();
                }

                Event::Start(Tag::Link { dest_url, .. }) => {
                    if dest_url.starts_with(PLATFORM_LINK_PREFIX) {
                        events.push(Event::Html(
                            format!(
                                "<a href=\"{}\" style=\"{}\">",
                                escape_html(&dest_url),
                                self.styles.attr("wx_link")
                            )
                            .into(),
                        ));
                        link_closers.push("</a>");
                    } else {
                        // outbound links are not allowed in article bodies
                        events.push(Event::Html(
                            format!("<span style=\"{}\">", self.styles.attr("link")).into(),
                        ));
                        link_closers.push("</span>");
                    }
                }
                Event::End(TagEnd::Link) => {
                    let closer = link_closers.pop().unwrap_or("</span>");
                    events.push(Event::Html(closer.into()));
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_content.clear();
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                            Some(lang.to_string())
                        }
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let lang = code_lang.take().unwrap_or_else(|| "plaintext".to_string());
                    events.push(Event::Html(self.code_block_html(&code_content, &lang).into()));
                }
                Event::Text(text) if in_code_block => code_content.push_str(&text),

                Event::Code(text) => events.push(Event::Html(
                    format!(
                        "<code style=\"{}\">{}</code>",
                        self.styles.attr("codespan"),
                        escape_html(&text)
                    )
                    .into(),
                )),

                Event::Start(Tag::Strong) if self.styles.declares("strong") => {
                    // declared_attr is Some here
                    let attr = self.styles.declared_attr("strong").unwrap_or_default();
                    events.push(Event::Html(format!("<strong style=\"{attr}\">").into()));
                }
                Event::End(TagEnd::Strong) if self.styles.declares("strong") => {
                    events.push(Event::Html("</strong>".into()))
                }

                Event::Start(Tag::Table(_)) => {
                    let attr = self
                        .styles
                        .declared_attr("table")
                        .map(|a| format!(" style=\"{a}\""))
                        .unwrap_or_default();
                    events.push(Event::Html(format!("<table{attr}>").into()));
                }
                Event::End(TagEnd::Table) => {
                    events.push(Event::Html("</tbody></table>".into()))
                }
                Event::Start(Tag::TableHead) => {
                    in_table_head = true;
                    let attr = self
                        .styles
                        .declared_attr("thead")
                        .map(|a| format!(" style=\"{a}\""))
                        .unwrap_or_default();
                    events.push(Event::Html(format!("<thead{attr}><tr>").into()));
                }
                Event::End(TagEnd::TableHead) => {
                    in_table_head = false;
                    events.push(Event::Html("</tr></thead><tbody>".into()));
                }
                Event::Start(Tag::TableRow) => events.push(Event::Html("<tr>".into())),
                Event::End(TagEnd::TableRow) => events.push(Event::Html("</tr>".into())),
                Event::Start(Tag::TableCell) => {
                    let attr = self
                        .styles
                        .declared_attr("td")
                        .map(|a| format!(" style=\"{a}\""))
                        .unwrap_or_default();
                    let tag = if in_table_head { "th" } else { "td" };
                    events.push(Event::Html(format!("<{tag}{attr}>").into()));
                }
                Event::End(TagEnd::TableCell) => {
                    let tag = if in_table_head { "th" } else { "td" };
                    events.push(Event::Html(format!("</{tag}>").into()));
                }

                Event::Rule => match self.styles.declared_attr("hr") {
                    Some(attr) => events.push(Event::Html(format!("<hr style=\"{attr}\" />").into())),
                    None => events.push(Event::Rule),
                },

                other => events.push(other),
            }
        }

        events
    }

    /// Builds the `<figure><img/></figure>` wrapper for an image.
    fn image_html(&self, dest: &str, alt: &str) -> String {
        format!(
            "<figure style=\"{}\"><img src=\"{}\" alt=\"{}\" style=\"{}\"/></figure>",
            self.styles.attr("figure"),
            escape_html(dest),
            escape_html(alt),
            self.styles.attr("image"),
        )
    }

    /// Highlights a code block and wraps it in the themed `<pre>`.
    fn code_block_html(&self, code: &str, lang: &str) -> String {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang));

        let inner = match syntax {
            Some(syntax) => self.highlight_code(code, syntax).unwrap_or_else(|| {
                format!("<code>{}</code>", escape_html(code))
            }),
            None => format!("<code>{}</code>", escape_html(code)),
        };

        format!("<pre style=\"{}\">{}</pre>", self.code_pre_attr(), inner)
    }

    /// Line-by-line syntect highlighting with inline styles. Returns `None`
    /// on any highlighting error so the caller can fall back to plain code.
    fn highlight_code(&self, code: &str, syntax: &syntect::parsing::SyntaxReference) -> Option<String> {
        let theme = &self.theme_set.themes[&self.code_theme];
        let mut highlighter = HighlightLines::new(syntax, theme);

        let code_attr = self
            .styles
            .declared_attr("code")
            .map(|a| format!(" style=\"{a}\""))
            .unwrap_or_default();

        let mut html = format!("<code{code_attr}>");
        for line in LinesWithEndings::from(code) {
            let regions = highlighter.highlight_line(line, &self.syntax_set).ok()?;
            let rendered =
                styled_line_to_highlighted_html(&regions[..], IncludeBackground::No).ok()?;
            html.push_str(&rendered);
        }
        html.push_str("</code>");
        Some(html)
    }

    /// The `code_pre` style plus the highlight theme's background color.
    fn code_pre_attr(&self) -> String {
        let mut attr = self.styles.attr("code_pre");
        if let Some(bg) = self.theme_set.themes[&self.code_theme].settings.background {
            if !attr.is_empty() {
                attr.push(';');
            }
            attr.push_str(&format!("background:#{:02x}{:02x}{:02x}", bg.r, bg.g, bg.b));
        }
        attr
    }
}

/// Converts a heading level to its rank, for the levels themes style.
fn heading_rank(level: HeadingLevel) -> Option<u8> {
    match level {
        HeadingLevel::H1 => Some(1),
        HeadingLevel::H2 => Some(2),
        HeadingLevel::H3 => Some(3),
        HeadingLevel::H4 => Some(4),
        _ => None,
    }
}

/// Escapes HTML special characters in a string.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> StyleRenderer {
        StyleRenderer::with_defaults()
    }

    #[test]
    fn test_render_heading_carries_theme_style() {
        let html = renderer().render("# Heading 1");
        assert!(html.contains("<h1 style=\""));
        assert!(html.contains("border-bottom:2px solid rgba(0, 152, 116, 0.9)"));
        assert!(html.contains("Heading 1"));
        assert!(html.contains("</h1>"));
    }

    #[test]
    fn test_render_h5_passes_through_unstyled() {
        let html = renderer().render("##### Deep heading");
        assert!(html.contains("<h5>"));
        assert!(!html.contains("<h5 style"));
    }

    #[test]
    fn test_render_paragraph_styled() {
        let html = renderer().render("Just a paragraph.");
        assert!(html.contains("<p style=\""));
        assert!(html.contains("letter-spacing:0.05em"));
    }

    #[test]
    fn test_render_blockquote_styled() {
        let html = renderer().render("> quoted text");
        assert!(html.contains("<blockquote style=\""));
        assert!(html.contains("background:#f7f7f7"));
        // nested paragraph takes the blockquote_p style
        assert!(html.contains("font-size:0.9em"));
    }

    #[test]
    fn test_render_lists_styled() {
        let html = renderer().render("- a\n- b\n\n1. x\n2. y");
        assert!(html.contains("<ul style=\""));
        assert!(html.contains("list-style:circle"));
        assert!(html.contains("<ol style=\""));
        assert!(html.contains("<li style=\""));
        assert!(html.contains("text-indent:-0.8em"));
    }

    #[test]
    fn test_render_ordered_list_start_preserved() {
        let html = renderer().render("3. third\n4. fourth");
        assert!(html.contains("<ol start=\"3\" style=\""));
    }

    #[test]
    fn test_render_inline_code_styled() {
        let html = renderer().render("Use `let x` here");
        assert!(html.contains("<code style=\""));
        assert!(html.contains("font-size:85%"));
        assert!(html.contains("let x"));
    }

    #[test]
    fn test_render_image_wrapped_in_figure() {
        let html = renderer().render("![A chart](images/chart.png)");
        assert!(html.contains("<figure style=\""));
        assert!(html.contains("<img src=\"images/chart.png\" alt=\"A chart\""));
        assert!(html.contains("width:100% !important"));
        assert!(html.contains("</figure>"));
    }

    #[test]
    fn test_platform_link_stays_anchor() {
        let html = renderer().render("[old post](https://mp.weixin.qq.com/s/abc)");
        assert!(html.contains("<a href=\"https://mp.weixin.qq.com/s/abc\" style=\""));
        assert!(html.contains("text-decoration:none"));
        assert!(html.contains("old post</a>"));
    }

    #[test]
    fn test_outbound_link_demoted_to_span() {
        let html = renderer().render("[docs](https://example.com/docs)");
        assert!(!html.contains("<a "));
        assert!(!html.contains("example.com"));
        assert!(html.contains("<span style=\""));
        assert!(html.contains("docs</span>"));
    }

    #[test]
    fn test_code_block_highlighted_with_inline_styles() {
        let html = renderer().render("```rust\nfn main() {}\n```");
        assert!(html.contains("<pre style=\""));
        // syntect emits inline-styled spans
        assert!(html.contains("<span style=\""));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_code_block_unknown_language_degrades_to_plain() {
        let html = renderer().render("```nosuchlang\nweird <tokens>\n```");
        assert!(html.contains("<pre style=\""));
        assert!(html.contains("&lt;tokens&gt;"));
    }

    #[test]
    fn test_code_block_without_language_is_plaintext() {
        let html = renderer().render("```\nplain text body\n```");
        assert!(html.contains("<pre style=\""));
        assert!(html.contains("plain text body"));
    }

    #[test]
    fn test_strong_styled_when_declared() {
        let html = renderer().render("some **bold** text");
        assert!(html.contains("<strong style=\""));
        assert!(html.contains("rgba(15, 76, 129, 0.9)"));
    }

    #[test]
    fn test_table_rendered_with_styles() {
        let html = renderer().render("| A | B |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table style=\""));
        assert!(html.contains("<thead style=\""));
        assert!(html.contains("<th"));
        assert!(html.contains("<td style=\""));
        assert!(html.contains("</tbody></table>"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let markdown = "# T\n\npara **bold** `code`\n\n```rust\nfn x() {}\n```\n\n- item\n";
        let r = renderer();
        assert_eq!(r.render(markdown), r.render(markdown));
    }

    #[test]
    fn test_malformed_markdown_never_errors() {
        let html = renderer().render("[unclosed](   ``` *** >>>");
        assert!(!html.is_empty());
    }

    #[test]
    fn test_code_block_content_is_escaped() {
        let html = renderer().render("```\n<script>alert('x')</script>\n```");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_unknown_code_theme_falls_back() {
        let mut options = RenderConfig::default();
        options.code_theme = "no-such-theme".to_string();
        let renderer = StyleRenderer::new(&StyleTheme::builtin(), &options);
        assert_eq!(renderer.code_theme, DEFAULT_CODE_THEME);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<>&\"'"), "&lt;&gt;&amp;&quot;&#x27;");
    }
}
