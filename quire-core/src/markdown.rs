use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::HighlightMode;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Language class used when a code block does not name one.
const PLAIN_LANGUAGE: &str = "plaintext";

/// How fenced and indented code blocks are turned into HTML.
#[derive(Debug, Clone)]
pub struct CodeBlocks {
    mode: HighlightMode,
    theme: String,
}

impl CodeBlocks {
    pub fn new(mode: HighlightMode, theme: impl Into<String>) -> Self {
        Self {
            mode,
            theme: theme.into(),
        }
    }

    fn render(&self, lang: Option<&str>, code: &str) -> String {
        match self.mode {
            HighlightMode::Client => hljs_pre(lang, code),
            HighlightMode::Server => self.highlight(lang, code),
        }
    }

    fn highlight(&self, lang: Option<&str>, code: &str) -> String {
        let syntax = lang.and_then(|lang| {
            SYNTAX_SET.find_syntax_by_token(lang).or_else(|| {
                // Fallback mappings for unsupported languages
                match lang {
                    "elm" | "haskell" => SYNTAX_SET.find_syntax_by_name("Haskell"),
                    "nix" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
                    "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
                    _ => None,
                }
            })
        });

        let theme = THEME_SET
            .themes
            .get(&self.theme)
            .or_else(|| THEME_SET.themes.get("base16-ocean.dark"));

        match (syntax, theme) {
            (Some(syntax), Some(theme)) => {
                highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme)
                    .unwrap_or_else(|_| plain_pre(code))
            }
            _ => plain_pre(code),
        }
    }
}

impl Default for CodeBlocks {
    fn default() -> Self {
        Self::new(HighlightMode::Client, "base16-ocean.dark")
    }
}

/// `<hljs-pre>` carries the escaped code in `value`; the client turns it into
/// a `<code>` child and highlights that.
fn hljs_pre(lang: Option<&str>, code: &str) -> String {
    let lang = lang.unwrap_or(PLAIN_LANGUAGE);
    let inner = html_escape::encode_text(code);
    format!(
        "<hljs-pre class=\"{}\" value=\"{}\"></hljs-pre>\n",
        html_escape::encode_quoted_attribute(lang),
        html_escape::encode_quoted_attribute(&inner)
    )
}

fn plain_pre(code: &str) -> String {
    format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(code))
}

/// Markdown to HTML, with code blocks handled by `code_blocks`.
pub fn render_markdown(source: &str, code_blocks: &CodeBlocks) -> String {
    let parser = Parser::new_ext(source, Options::all());

    let events: Vec<Event> = parser.collect();
    let mut processed_events = Vec::with_capacity(events.len());
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };

                // Collect all text events until the end of the code block
                let mut code_content = String::new();
                i += 1;
                while i < events.len() {
                    match &events[i] {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code_content.push_str(text),
                        _ => {}
                    }
                    i += 1;
                }

                let rendered = code_blocks.render(lang.as_deref(), &code_content);
                processed_events.push(Event::Html(rendered.into()));
            }
            event => processed_events.push(event.clone()),
        }
        i += 1;
    }

    let mut out = String::new();
    html::push_html(&mut out, processed_events.into_iter());
    out
}
