use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{markdown::Rendered, metadata::Metadata};

/// Link to the same post in the other language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Pairing {
    pub file: String,
    pub label: String,
}

/// One source file after the first pass.
#[derive(Debug, Clone)]
pub(super) struct Post {
    /// Source file name, e.g. `topic.en.md`.
    pub markdown: String,
    /// Output file name, e.g. `topic.en.html`.
    pub file: String,
    pub path: PathBuf,
    pub metadata: Metadata,
    /// Markdown after the front matter.
    pub body: String,
    pub rendered: Rendered,
    pub pairing: Option<Pairing>,
    /// Front matter date if it parses, otherwise the modification time.
    pub created: NaiveDateTime,
    pub updated: NaiveDateTime,
}

impl Post {
    pub fn title(&self) -> &str {
        &self.rendered.title
    }
}

/// Entry of `blog_data.json`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub(super) struct PostRecord {
    pub title: String,
    pub file: String,
    pub markdown: String,
    pub html_content: String,
    pub date: String,
}

impl From<&Post> for PostRecord {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title().to_string(),
            file: post.file.clone(),
            markdown: post.markdown.clone(),
            html_content: post.rendered.html.clone(),
            date: post.metadata.date.clone().unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Debug)]
pub(super) struct BlogData<'a> {
    pub last_updated: &'a str,
    pub posts: &'a [PostRecord],
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(super) struct PostPageData<'a> {
    pub title: String,
    pub content: &'a str,
    pub created: String,
    pub updated: String,
    pub backlinks: String,
    pub tags: String,
    pub lang_switch: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(super) struct ListingPageData {
    pub blog_listings: String,
}
