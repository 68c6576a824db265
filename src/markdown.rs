//! Markdown to HTML conversion.
//!
//! Rendering runs in three stages over the `pulldown-cmark` event stream:
//!
//! 1. a line based pre-pass rewriting `[[phrase]]` into annotated spans
//!    (before any link syntax is looked at),
//! 2. parsing, followed by trailing `{: .class #id key=value}` attribute
//!    lists on paragraphs, headings, list items and table cells,
//! 3. optionally lifting the first top level `<h1>` out as the post title.

use std::sync::OnceLock;

use log::{debug, warn};
use maud::html;
use pulldown_cmark::{
    Alignment, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd,
    TextMergeStream,
};
use regex::{Captures, Regex};

use crate::error::{BlogError, ErrorKind, Result};

pub(crate) const UNTITLED: &str = "Untitled";

static ANNOTATION_REGEX: OnceLock<Regex> = OnceLock::new();
static ATTR_LIST_REGEX: OnceLock<Regex> = OnceLock::new();
static IMAGE_REGEX: OnceLock<Regex> = OnceLock::new();

fn annotation_regex() -> &'static Regex {
    ANNOTATION_REGEX.get_or_init(|| Regex::new(r"\[\[(.*?)\]\]").expect("static regex"))
}

fn attr_list_regex() -> &'static Regex {
    ATTR_LIST_REGEX
        .get_or_init(|| Regex::new(r"\{:[ \t]*([^{}\n]*?)[ \t]*\}[ \t]*\z").expect("static regex"))
}

fn image_regex() -> &'static Regex {
    IMAGE_REGEX.get_or_init(|| Regex::new(r"!\[(.*?)\]\((.*?)\)").expect("static regex"))
}

/// Escapes text for use in HTML content or a quoted attribute.
pub(crate) fn escape_html(text: &str) -> String {
    html! { (text) }.into_string()
}

fn annotated_span(phrase: &str) -> String {
    html! { span.annotated-word data-word=(phrase) { (phrase) } }.into_string()
}

/// Replaces every `[[phrase]]` with an annotated `<span>`, line by line.
///
/// Matching is non-greedy, so `[[a [[b]] c]]` annotates `a [[b` and leaves
/// ` c]]` as text. Lines inside fenced code blocks are left alone.
pub(crate) fn annotate(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut fence: Option<&'static str> = None;

    for line in markdown.split_inclusive('\n') {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
                out.push_str(line);
            }
            None if trimmed.starts_with("```") || trimmed.starts_with("~~~") => {
                fence = Some(if trimmed.starts_with("```") { "```" } else { "~~~" });
                out.push_str(line);
            }
            None => {
                let replaced =
                    annotation_regex().replace_all(line, |caps: &Captures| annotated_span(&caps[1]));
                out.push_str(&replaced);
            }
        }
    }

    out
}

/// Logs every image reference; paths are emitted unchanged.
pub(crate) fn log_image_paths(markdown: &str) {
    for caps in image_regex().captures_iter(markdown) {
        debug!("Processing image path: {}", &caps[2]);
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct AttrList {
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
}

impl AttrList {
    fn parse(src: &str) -> Result<Self> {
        let mut list = AttrList::default();
        for token in tokenize_attrs(src)? {
            if let Some(class) = token.strip_prefix('.') {
                if class.is_empty() {
                    return Err(BlogError::new(ErrorKind::Render, format!("empty class in {{: {src}}}")));
                }
                list.classes.push(class.to_string());
            } else if let Some(id) = token.strip_prefix('#') {
                if id.is_empty() {
                    return Err(BlogError::new(ErrorKind::Render, format!("empty id in {{: {src}}}")));
                }
                list.id = Some(id.to_string());
            } else if let Some((key, value)) = token.split_once('=') {
                if key.is_empty() {
                    return Err(BlogError::new(
                        ErrorKind::Render,
                        format!("attribute without a name in {{: {src}}}"),
                    ));
                }
                list.attrs.push((key.to_string(), unquote(value).to_string()));
            } else {
                list.attrs.push((token, String::new()));
            }
        }
        Ok(list)
    }

    fn to_html_attrs(&self) -> String {
        let mut out = String::new();
        if let Some(id) = &self.id {
            out.push_str(&format!(" id=\"{}\"", escape_html(id)));
        }
        if !self.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", escape_html(&self.classes.join(" "))));
        }
        for (key, value) in &self.attrs {
            out.push_str(&format!(" {}=\"{}\"", escape_html(key), escape_html(value)));
        }
        out
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

fn tokenize_attrs(src: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in src.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                current.push(c);
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }

    if quote.is_some() {
        return Err(BlogError::new(
            ErrorKind::Render,
            format!("unterminated quote in attribute list {{: {src}}}"),
        ));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Removes a trailing `{: ...}` from the block opened at `start` and
/// returns it parsed. A line holding nothing but the list is dropped along
/// with the line break before it. A list that does not parse stays as text.
fn strip_trailing_attr_list(events: &mut Vec<Event<'_>>, start: usize) -> Option<AttrList> {
    if events.len() <= start + 1 {
        return None;
    }
    let Some(Event::Text(text)) = events.last() else {
        return None;
    };
    let caps = attr_list_regex().captures(text)?;

    let list = match AttrList::parse(&caps[1]) {
        Ok(list) => list,
        Err(e) => {
            warn!("Leaving attribute list as text: {e}");
            return None;
        }
    };
    let rest = text[..caps.get(0).map_or(0, |m| m.start())].trim_end().to_string();

    events.pop();
    if rest.is_empty() {
        if matches!(events.last(), Some(Event::SoftBreak | Event::HardBreak)) && events.len() > start + 1 {
            events.pop();
        }
    } else {
        events.push(Event::Text(CowStr::from(rest)));
    }
    Some(list)
}

/// Language of a fence written as `{ .lang #id }`. Only the first class
/// survives; the renderer has no place for the other attributes.
fn braced_fence_language(info: &str) -> Option<String> {
    let inner = info.trim().strip_prefix('{')?.strip_suffix('}')?;
    let inner = inner.strip_prefix(':').unwrap_or(inner);
    match AttrList::parse(inner) {
        Ok(list) => Some(list.classes.into_iter().next().unwrap_or_default()),
        Err(e) => {
            warn!("Ignoring fence attributes: {e}");
            Some(String::new())
        }
    }
}

/// Block that may end in an attribute list.
enum AttrTarget {
    Paragraph,
    Heading,
    Item,
    /// Opening tag name and alignment style of a table cell.
    Cell(&'static str, &'static str),
}

/// Where the next table cell sits, so its opening tag can be rebuilt.
#[derive(Default)]
struct TablePosition {
    alignments: Vec<Alignment>,
    in_head: bool,
    column: usize,
}

impl TablePosition {
    fn observe(&mut self, event: &Event<'_>) {
        match event {
            Event::Start(Tag::Table(alignments)) => {
                self.alignments = alignments.clone();
                self.in_head = false;
                self.column = 0;
            }
            Event::Start(Tag::TableHead) => {
                self.in_head = true;
                self.column = 0;
            }
            Event::End(TagEnd::TableHead) => {
                self.in_head = false;
                self.column = 0;
            }
            Event::Start(Tag::TableRow) => self.column = 0,
            Event::End(TagEnd::TableCell) => self.column += 1,
            _ => {}
        }
    }

    fn cell(&self) -> AttrTarget {
        let name = if self.in_head { "th" } else { "td" };
        let style = match self.alignments.get(self.column) {
            Some(Alignment::Left) => " style=\"text-align: left\"",
            Some(Alignment::Center) => " style=\"text-align: center\"",
            Some(Alignment::Right) => " style=\"text-align: right\"",
            _ => "",
        };
        AttrTarget::Cell(name, style)
    }
}

fn apply_attr_lists(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out: Vec<Event<'_>> = Vec::with_capacity(events.len());
    let mut open: Vec<(usize, AttrTarget)> = Vec::new();
    let mut table = TablePosition::default();

    for event in events {
        let target = match &event {
            Event::Start(Tag::Paragraph) => Some(AttrTarget::Paragraph),
            Event::Start(Tag::Heading { .. }) => Some(AttrTarget::Heading),
            Event::Start(Tag::Item) => Some(AttrTarget::Item),
            Event::Start(Tag::TableCell) => Some(table.cell()),
            _ => None,
        };
        table.observe(&event);
        if let Some(target) = target {
            open.push((out.len(), target));
            out.push(event);
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let info = match braced_fence_language(&info) {
                    Some(lang) => CowStr::from(lang),
                    None => info,
                };
                out.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))));
            }
            Event::End(
                end @ (TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::TableCell),
            ) => {
                let Some((start, target)) = open.pop() else {
                    out.push(Event::End(end));
                    continue;
                };
                let Some(list) = strip_trailing_attr_list(&mut out, start) else {
                    out.push(Event::End(end));
                    continue;
                };

                match target {
                    AttrTarget::Heading => {
                        if let Event::Start(Tag::Heading { id, classes, attrs, .. }) = &mut out[start] {
                            if let Some(new_id) = list.id {
                                *id = Some(new_id.into());
                            }
                            classes.extend(list.classes.into_iter().map(CowStr::from));
                            attrs.extend(
                                list.attrs
                                    .into_iter()
                                    .map(|(k, v)| (CowStr::from(k), Some(CowStr::from(v)))),
                            );
                        }
                        out.push(Event::End(end));
                    }
                    AttrTarget::Paragraph => {
                        out[start] = Event::Html(format!("<p{}>", list.to_html_attrs()).into());
                        out.push(Event::Html("</p>\n".into()));
                    }
                    AttrTarget::Item => {
                        out[start] = Event::Html(format!("<li{}>", list.to_html_attrs()).into());
                        out.push(Event::End(end));
                    }
                    AttrTarget::Cell(name, style) => {
                        out[start] =
                            Event::Html(format!("<{name}{style}{}>", list.to_html_attrs()).into());
                        out.push(Event::End(end));
                    }
                }
            }
            other => out.push(other),
        }
    }

    out
}

/// Removes the first top level `<h1>` from `events` and returns its text.
pub(crate) fn take_title(events: &mut Vec<Event<'_>>) -> Option<String> {
    let mut depth = 0usize;
    let mut start = None;
    for (i, event) in events.iter().enumerate() {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) if depth == 0 => {
                start = Some(i);
                break;
            }
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    let start = start?;
    let end = start
        + events[start..]
            .iter()
            .position(|e| matches!(e, Event::End(TagEnd::Heading(HeadingLevel::H1))))?;

    let title: String = events
        .drain(start..=end)
        .filter_map(|e| match e {
            Event::Text(t) | Event::Code(t) => Some(t.into_string()),
            Event::SoftBreak | Event::HardBreak => Some(" ".to_string()),
            _ => None,
        })
        .collect();
    Some(title.trim().to_string())
}

/// A post body converted to HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rendered {
    /// Text of the first top level heading, or [`UNTITLED`].
    pub title: String,
    /// HTML with the title heading removed.
    pub content: String,
    /// HTML of the whole body.
    pub html: String,
}

pub(crate) struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        Self { options }
    }

    /// Parses already annotated markdown into events with attribute lists
    /// applied.
    pub fn events<'a>(&self, annotated: &'a str) -> Result<Vec<Event<'a>>> {
        let events: Vec<Event<'a>> =
            TextMergeStream::new(Parser::new_ext(annotated, self.options)).collect();
        Ok(apply_attr_lists(events))
    }

    pub fn render(&self, body: &str) -> Result<Rendered> {
        let annotated = annotate(body);
        let mut events = self.events(&annotated)?;

        let mut html = String::new();
        pulldown_cmark::html::push_html(&mut html, events.iter().cloned());

        let (title, content) = match take_title(&mut events) {
            Some(title) => {
                let mut content = String::new();
                pulldown_cmark::html::push_html(&mut content, events.into_iter());
                (title, content)
            }
            None => (UNTITLED.to_string(), html.clone()),
        };

        Ok(Rendered {
            title,
            content,
            html,
        })
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(body: &str) -> Rendered {
        MarkdownRenderer::new().render(body).unwrap()
    }

    #[test]
    fn annotation_becomes_span() {
        let out = annotate("the [[quick]] fox");
        assert_eq!(
            out,
            r#"the <span class="annotated-word" data-word="quick">quick</span> fox"#
        );
        let rendered = render("the [[quick]] fox");
        assert!(rendered
            .content
            .contains(r#"<span class="annotated-word" data-word="quick">quick</span>"#));
    }

    #[test]
    fn single_brackets_are_untouched() {
        assert_eq!(annotate("a [link](x.html) and [b]"), "a [link](x.html) and [b]");
        let rendered = render("a [link](x.html)");
        assert!(rendered.content.contains(r#"<a href="x.html">link</a>"#));
        assert!(!rendered.content.contains("annotated-word"));
    }

    #[test]
    fn annotation_is_non_greedy() {
        let out = annotate("[[one]] and [[two words]]");
        assert!(out.contains(r#"data-word="one">one</span>"#));
        assert!(out.contains(r#"data-word="two words">two words</span>"#));

        let nested = annotate("[[a [[b]] c]]");
        assert!(nested.starts_with(r#"<span class="annotated-word" data-word="a [[b">a [[b</span>"#));
        assert!(nested.ends_with(" c]]"));
    }

    #[test]
    fn annotation_escapes_phrase() {
        let out = annotate("[[<b>&]]");
        assert!(out.contains(r#"data-word="&lt;b&gt;&amp;""#));
    }

    #[test]
    fn fenced_code_is_not_annotated() {
        let body = "```\nlet [[x]] = 1;\n```\n[[y]]\n";
        let out = annotate(body);
        assert!(out.contains("let [[x]] = 1;"));
        assert!(out.contains(r#"data-word="y""#));
    }

    #[test]
    fn fenced_code_keeps_language() {
        let rendered = render("```rust\nfn main() {}\n```\n");
        assert!(rendered
            .content
            .contains(r#"<pre><code class="language-rust">fn main() {}"#));
    }

    #[test]
    fn title_is_lifted_out() {
        let rendered = render("# Hello *big* `world`\n\nBody text.\n");
        assert_eq!(rendered.title, "Hello big world");
        assert!(!rendered.content.contains("<h1>"));
        assert!(rendered.content.contains("<p>Body text.</p>"));
        assert!(rendered.html.contains("<h1>"));
    }

    #[test]
    fn untitled_without_h1() {
        let rendered = render("## Second level\n\ntext\n");
        assert_eq!(rendered.title, UNTITLED);
        assert_eq!(rendered.content, rendered.html);
        assert!(rendered.content.contains("<h2>"));
    }

    #[test]
    fn nested_h1_is_not_a_title() {
        let rendered = render("> # Quoted\n\nplain\n");
        assert_eq!(rendered.title, UNTITLED);
    }

    #[test]
    fn only_first_h1_is_removed() {
        let rendered = render("# One\n\n# Two\n");
        assert_eq!(rendered.title, "One");
        assert!(rendered.content.contains("<h1>Two</h1>"));
    }

    #[test]
    fn attr_list_on_paragraph() {
        let rendered = render("A note.\n{: .callout #first }\n");
        assert!(rendered
            .content
            .contains(r#"<p id="first" class="callout">A note.</p>"#));
    }

    #[test]
    fn inline_attr_list_on_heading() {
        let rendered = render("## Section {: #sec .wide data-x=\"1 2\"}\n");
        assert!(rendered.content.contains("id=\"sec\""));
        assert!(rendered.content.contains("class=\"wide\""));
        assert!(rendered.content.contains("data-x=\"1 2\""));
        assert!(rendered.content.contains(">Section</h2>"));
    }

    #[test]
    fn braces_without_colon_are_text() {
        let rendered = render("set {a}\n");
        assert!(rendered.content.contains("<p>set {a}</p>"));
    }

    #[test]
    fn malformed_attr_list_stays_text() {
        let rendered = render("Text ends {: \"}\n");
        assert!(rendered.content.starts_with("<p>Text ends {: "));
        assert!(rendered.content.ends_with("}</p>\n"));

        let rendered = render("text\n{: title=\"open }\n");
        assert!(rendered.content.contains("{: title="));
        assert!(rendered.content.contains("open }</p>"));
        assert!(!rendered.content.contains("title=\"open"));
    }

    #[test]
    fn attr_list_on_tight_list_item() {
        let rendered = render("- item {: .x}\n- other\n");
        assert_eq!(
            rendered.content,
            "<ul>\n<li class=\"x\">item</li>\n<li>other</li>\n</ul>\n"
        );
    }

    #[test]
    fn attr_list_on_table_cell() {
        let rendered = render("| a | b {: .wide} |\n|:--|---|\n| c {: #cell} | d |\n");
        assert!(rendered.content.contains(r#"<th class="wide">b</th>"#));
        assert!(rendered
            .content
            .contains(r#"<td style="text-align: left" id="cell">c</td>"#));
        assert!(rendered.content.contains("<td>d</td>"));
    }

    #[test]
    fn braced_fence_info_gives_language() {
        let rendered = render("```{ .python #snippet }\nx = 1\n```\n");
        assert!(rendered
            .content
            .contains(r#"<pre><code class="language-python">x = 1"#));

        let rendered = render("```{#only-id}\nx\n```\n");
        assert!(rendered.content.contains("<pre><code>x"));
    }

    #[test]
    fn attr_list_parsing() {
        let list = AttrList::parse(".a .b #c k='v w' flag").unwrap();
        assert_eq!(list.id.as_deref(), Some("c"));
        assert_eq!(list.classes, vec!["a", "b"]);
        assert_eq!(
            list.attrs,
            vec![
                ("k".to_string(), "v w".to_string()),
                ("flag".to_string(), String::new())
            ]
        );
        assert!(AttrList::parse(". x").is_err());
        assert!(AttrList::parse("=v").is_err());
    }
}
