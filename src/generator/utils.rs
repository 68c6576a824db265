use std::{cmp::Ordering, fs, path::Path};

use chrono::{DateTime, Local, NaiveDateTime};
use log::error;
use maud::{html, Markup};
use url::form_urlencoded;

use crate::{cache::TIMESTAMP_FORMAT, context::Languages};

use super::data::{Pairing, Post};

const MARKDOWN_EXTENSION: &str = ".md";

pub(super) fn timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// `topic.md` -> `topic.html`, `topic.en.md` -> `topic.en.html`.
pub(super) fn output_file(markdown: &str) -> String {
    let stem = markdown.strip_suffix(MARKDOWN_EXTENSION).unwrap_or(markdown);
    format!("{stem}.html")
}

/// Source name of the sibling translation and the label linking to it.
pub(super) fn paired_source(markdown: &str, languages: &Languages) -> (String, String) {
    let secondary_suffix = format!(".{}{MARKDOWN_EXTENSION}", languages.secondary_marker);
    match markdown.strip_suffix(&secondary_suffix) {
        Some(stem) => (
            format!("{stem}{MARKDOWN_EXTENSION}"),
            languages.primary_label.clone(),
        ),
        None => {
            let stem = markdown.strip_suffix(MARKDOWN_EXTENSION).unwrap_or(markdown);
            (
                format!("{stem}{secondary_suffix}"),
                languages.secondary_label.clone(),
            )
        }
    }
}

/// The sibling translation, if its source file exists in `dir`.
pub(super) fn find_pairing(dir: &Path, markdown: &str, languages: &Languages) -> Option<Pairing> {
    let (paired, label) = paired_source(markdown, languages);
    dir.join(&paired).exists().then(|| Pairing {
        file: output_file(&paired),
        label,
    })
}

/// Local modification time of `path`; falls back to now.
pub(super) fn modified_time(path: &Path) -> NaiveDateTime {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => DateTime::<Local>::from(time).naive_local(),
        Err(e) => {
            error!("Error getting file times for {path:?}: {e}");
            Local::now().naive_local()
        }
    }
}

/// Newest first; equal dates keep their processing order.
pub(super) fn sort_posts(a: &&Post, b: &&Post) -> Ordering {
    b.created.cmp(&a.created)
}

/// Consecutive posts sharing a calendar month, labelled like `May 2024`.
pub(super) fn group_by_month<'a>(posts: &[&'a Post]) -> Vec<(String, Vec<&'a Post>)> {
    let mut groups: Vec<(String, Vec<&'a Post>)> = Vec::new();
    for &post in posts {
        let month = post.created.format("%B %Y").to_string();
        if let Some((last, members)) = groups.last_mut() {
            if *last == month {
                members.push(post);
                continue;
            }
        }
        groups.push((month, vec![post]));
    }
    groups
}

/// Percent-encodes a tag for use as a fragment. Letters, digits and
/// `_.-~/` are kept as is.
fn tag_anchor(tag: &str) -> String {
    form_urlencoded::byte_serialize(tag.as_bytes())
        .collect::<String>()
        .replace('*', "%2A")
        .replace('+', "%20")
        .replace("%7E", "~")
        .replace("%2F", "/")
}

pub(super) fn render_tags(tags: &[String], tags_href: &str, preview: bool) -> Markup {
    html! {
        ul.tag-list.blog-preview-tags[preview] {
            @for tag in tags {
                li { a href={ (tags_href) "#" (tag_anchor(tag)) } { (tag) } }
            }
        }
    }
}

pub(super) fn render_lang_switch(pairing: Option<&Pairing>) -> Markup {
    html! {
        @if let Some(pairing) = pairing {
            div.lang-switch {
                a.lang-switch-link href=(pairing.file) { (pairing.label) }
            }
        }
    }
}

pub(super) fn render_preview(post: &Post, excerpt: &str, posts_href: &str, tags_href: &str) -> Markup {
    let href = format!("{posts_href}{}", post.file);
    html! {
        article.blog-preview {
            h4 { a href=(href) { (post.title()) } }
            p.post-meta { "Posted on " (post.created.format("%B %d, %Y").to_string()) }
            @if !post.metadata.tags.is_empty() {
                (render_tags(&post.metadata.tags, tags_href, true))
            }
            p.blog-excerpt { (excerpt) }
            a.read-more href=(href) { "Read more" }
        }
    }
}
