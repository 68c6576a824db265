//! Plain text previews of post bodies for the listing page.

use std::sync::OnceLock;

use log::warn;
use pulldown_cmark::{Event, Tag, TagEnd};
use regex::Regex;

use crate::markdown::{annotate, take_title, MarkdownRenderer};

pub(crate) const ELLIPSIS: &str = "...";
const BULLET: &str = "•";
/// Rough characters per word used to bound the degraded excerpt.
const FALLBACK_CHARS_PER_WORD: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExcerptLimits {
    pub words: usize,
    pub cjk_chars: usize,
}

impl Default for ExcerptLimits {
    fn default() -> Self {
        Self {
            words: 100,
            cjk_chars: 100,
        }
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn cjk_count(text: &str) -> usize {
    text.chars().filter(|&c| is_cjk(c)).count()
}

fn latin_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).count()
}

macro_rules! static_regex {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($re).expect("static regex"))
        }
    };
}

static_regex!(tag_regex, r"<[^>]+>");
static_regex!(newline_regex, r"\r\n?");
static_regex!(hspace_regex, r"[ \t\x0B\x0C]+");
static_regex!(blank_lines_regex, r"\n{3,}");
static_regex!(list_marker_regex, r"^[-*+]\s+(.*)$");
static_regex!(fenced_code_regex, r"(?s)```.*?```");
static_regex!(inline_code_regex, r"`[^`]*`");
static_regex!(image_regex, r"!\[[^\]]*\]\([^)]*\)");
static_regex!(link_regex, r"\[[^\]]*\]\([^)]*\)");

/// Flattens rendered events to text. Block boundaries become line breaks;
/// code and images disappear; list items get a bullet.
fn flatten(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    let mut hidden = 0usize;

    for event in events {
        match event {
            Event::Start(Tag::CodeBlock(_) | Tag::Image { .. }) => hidden += 1,
            Event::End(TagEnd::CodeBlock | TagEnd::Image) => hidden = hidden.saturating_sub(1),
            _ if hidden > 0 => {}
            Event::Start(Tag::Item) => {
                text.push('\n');
                text.push_str(BULLET);
                text.push(' ');
            }
            Event::Start(Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. }) => {}
            Event::End(TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link) => {}
            Event::Start(_) | Event::End(_) | Event::Rule => text.push('\n'),
            Event::Text(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::Html(h) => {
                text.push('\n');
                text.push_str(&tag_regex().replace_all(h, " "));
                text.push('\n');
            }
            Event::InlineHtml(h) => text.push_str(&tag_regex().replace_all(h, "")),
            _ => {}
        }
    }

    text
}

/// CRLF to LF, horizontal whitespace runs to one space, at most one blank
/// line in a row, trimmed.
fn normalize(text: &str) -> String {
    let text = newline_regex().replace_all(text, "\n");
    let text = hspace_regex().replace_all(&text, " ");
    let text = blank_lines_regex().replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Non-empty trimmed lines, with a lone bullet joined to the line after it.
fn preview_lines(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut merged = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let lone_bullet = lines[i] == BULLET || lines[i] == "-";
        match lines.get(i + 1) {
            Some(next) if lone_bullet && !next.starts_with(BULLET) => {
                merged.push(format!("{BULLET} {next}"));
                i += 2;
            }
            _ => {
                merged.push(lines[i].to_string());
                i += 1;
            }
        }
    }
    merged
}

fn render_bullet(line: &str) -> String {
    match list_marker_regex().captures(line) {
        Some(caps) => format!("{BULLET} {}", &caps[1]),
        None => line.to_string(),
    }
}

fn mark_truncated(out: &mut [String]) {
    if let Some(last) = out.last_mut() {
        last.push_str(ELLIPSIS);
    }
}

fn truncate_cjk(lines: &[String], limit: usize) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut seen = 0usize;

    for line in lines {
        let line_cjk = cjk_count(line);
        if seen + line_cjk <= limit {
            out.push(render_bullet(line));
            seen += line_cjk;
            continue;
        }

        let remaining = limit - seen;
        if remaining == 0 {
            mark_truncated(&mut out);
            break;
        }

        let mut kept = 0usize;
        let mut sliced = String::new();
        for c in line.chars() {
            if is_cjk(c) {
                if kept >= remaining {
                    break;
                }
                kept += 1;
            }
            sliced.push(c);
        }
        out.push(render_bullet(sliced.trim_end()) + ELLIPSIS);
        break;
    }

    out.join("\n")
}

fn truncate_words(lines: &[String], limit: usize) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut seen = 0usize;

    for line in lines {
        let words: Vec<&str> = line.split_whitespace().collect();
        if seen + words.len() <= limit {
            out.push(render_bullet(line));
            seen += words.len();
            continue;
        }

        let remaining = limit - seen;
        if remaining == 0 {
            mark_truncated(&mut out);
            break;
        }

        out.push(render_bullet(&words[..remaining].join(" ")) + ELLIPSIS);
        break;
    }

    out.join("\n")
}

/// Used when the body cannot be rendered: strips code, images, links and
/// tags textually and cuts at a character budget.
fn fallback_excerpt(body: &str, limits: ExcerptLimits) -> String {
    let text = fenced_code_regex().replace_all(body, " ");
    let text = inline_code_regex().replace_all(&text, " ");
    let text = image_regex().replace_all(&text, " ");
    let text = link_regex().replace_all(&text, " ");
    let text = tag_regex().replace_all(&text, " ");
    let text = normalize(&text);

    let budget = limits.words.max(limits.cjk_chars) * FALLBACK_CHARS_PER_WORD;
    if text.chars().count() <= budget {
        return text;
    }
    let cut: String = text.chars().take(budget).collect();
    cut.trim_end().to_string() + ELLIPSIS
}

/// Builds the listing preview for a raw markdown body (front matter already
/// removed). Never fails; an unrenderable body takes the textual fallback.
pub(crate) fn build_post_excerpt(
    renderer: &MarkdownRenderer,
    body: &str,
    limits: ExcerptLimits,
) -> String {
    let annotated = annotate(body);
    let text = match renderer.events(&annotated) {
        Ok(mut events) => {
            take_title(&mut events);
            normalize(&flatten(&events))
        }
        Err(e) => {
            warn!("Falling back to plain excerpt: {e}");
            return fallback_excerpt(body, limits);
        }
    };
    if text.is_empty() {
        return String::new();
    }

    let lines = preview_lines(&text);
    let cjk = cjk_count(&text);
    if cjk > 0 && cjk >= latin_count(&text) {
        truncate_cjk(&lines, limits.cjk_chars)
    } else {
        truncate_words(&lines, limits.words)
    }
}
