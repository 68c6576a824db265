use std::sync::OnceLock;

use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;

static LINK_REGEX: OnceLock<Regex> = OnceLock::new();

fn link_regex() -> &'static Regex {
    LINK_REGEX.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)]+\.html)\)").expect("static regex"))
}

/// Targets of every markdown link in `body` pointing at an `.html` page.
pub(crate) fn find_links(body: &str) -> Vec<&str> {
    link_regex()
        .captures_iter(body)
        .filter_map(|caps| caps.get(2).map(|m| m.as_str()))
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct PostRef {
    pub title: String,
    pub file: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeriesRef {
    pub title: String,
    pub file: String,
    /// Empty when the post has no `series_part`.
    pub part: String,
}

/// Tag, series and backlink indexes over every post of a run.
///
/// Keys and entries keep first-seen order; nothing is sorted or deduplicated.
#[derive(Debug, Default)]
pub(crate) struct Relations {
    pub tags: IndexMap<String, Vec<PostRef>>,
    pub series: IndexMap<String, Vec<SeriesRef>>,
    /// Keyed by link target as written in the linking post.
    pub backlinks: IndexMap<String, Vec<PostRef>>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one post's tags, series membership and outgoing links.
    pub fn record(&mut self, title: &str, file: &str, metadata: &Metadata, body: &str) {
        let post_ref = || PostRef {
            title: title.to_string(),
            file: file.to_string(),
        };

        for tag in &metadata.tags {
            debug!("{file}: tag {tag:?}");
            self.tags.entry(tag.clone()).or_default().push(post_ref());
        }

        if let Some(series) = metadata.series.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            self.series.entry(series.to_string()).or_default().push(SeriesRef {
                title: title.to_string(),
                file: file.to_string(),
                part: metadata.series_part.clone().unwrap_or_default(),
            });
        }

        for target in find_links(body) {
            debug!("{file}: links to {target}");
            self.backlinks.entry(target.to_string()).or_default().push(post_ref());
        }
    }

    pub fn backlinks_for(&self, file: &str) -> &[PostRef] {
        self.backlinks.get(file).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(tags: &[&str]) -> Metadata {
        Metadata {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn tags_keep_processing_order() {
        let mut rel = Relations::new();
        rel.record("First", "first.html", &meta(&["a", "b"]), "");
        rel.record("Second", "second.html", &meta(&["b"]), "");

        assert_eq!(rel.tags.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(rel.tags["a"].len(), 1);
        let b: Vec<&str> = rel.tags["b"].iter().map(|r| r.file.as_str()).collect();
        assert_eq!(b, vec!["first.html", "second.html"]);
    }

    #[test]
    fn series_entries_carry_part() {
        let mut rel = Relations::new();
        let mut m = meta(&[]);
        m.series = Some("Intro".into());
        m.series_part = Some("2".into());
        rel.record("Part two", "two.html", &m, "");

        let mut untagged = meta(&[]);
        untagged.series = Some("Intro".into());
        rel.record("Part one", "one.html", &untagged, "");

        assert_eq!(
            rel.series["Intro"],
            vec![
                SeriesRef {
                    title: "Part two".into(),
                    file: "two.html".into(),
                    part: "2".into(),
                },
                SeriesRef {
                    title: "Part one".into(),
                    file: "one.html".into(),
                    part: String::new(),
                },
            ]
        );
    }

    #[test]
    fn blank_series_is_ignored() {
        let mut rel = Relations::new();
        let mut m = meta(&[]);
        m.series = Some("   ".into());
        rel.record("T", "t.html", &m, "");
        assert!(rel.series.is_empty());
    }

    #[test]
    fn backlinks_point_at_linking_post() {
        let mut rel = Relations::new();
        rel.record("X", "x.html", &meta(&[]), "[see also](y.html) and [other](z.html)");
        rel.record("W", "w.html", &meta(&[]), "again [y](y.html)");

        let y = rel.backlinks_for("y.html");
        assert_eq!(
            y,
            &[
                PostRef {
                    title: "X".into(),
                    file: "x.html".into()
                },
                PostRef {
                    title: "W".into(),
                    file: "w.html".into()
                },
            ]
        );
        assert_eq!(rel.backlinks_for("z.html").len(), 1);
        assert!(rel.backlinks_for("x.html").is_empty());
    }

    #[test]
    fn only_html_links_count() {
        assert_eq!(
            find_links("[a](a.html) [b](https://e.org/b) [c](c.md) ![i](i.png) [d](../d.html)"),
            vec!["a.html", "../d.html"]
        );
    }
}
