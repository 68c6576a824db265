use std::sync::OnceLock;

use chrono::NaiveDate;
use log::{debug, warn};
use regex::Regex;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d"];

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---(?:\r?\n|\z)").expect("static regex")
    })
}

/// Front matter of a post. Every field is optional in the source file;
/// absent keys leave the empty default in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Metadata {
    /// Comma separated in the source, trimmed and with empty items dropped.
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub series_part: Option<String>,
    /// Kept verbatim; see [`parse_frontmatter_date`].
    pub date: Option<String>,
}

impl Metadata {
    pub fn date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_frontmatter_date)
    }

    fn set(&mut self, key: &str, value: &str) {
        let non_empty = || (!value.is_empty()).then(|| value.to_string());
        match key {
            "tags" => {
                self.tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect();
            }
            "series" => self.series = non_empty(),
            "series_part" => self.series_part = non_empty(),
            "date" => self.date = non_empty(),
            _ => debug!("ignoring unknown front matter key {key:?}"),
        }
    }
}

/// Splits `content` into its front matter and the remaining body.
///
/// The block must open the file: a `---` line, `key: value` lines, and a
/// closing `---` line. Lines without a colon are skipped. Without a block
/// the whole text is the body and the metadata stays at its defaults.
pub(crate) fn parse_metadata(content: &str) -> (Metadata, &str) {
    let mut metadata = Metadata::default();

    let Some(caps) = frontmatter_regex().captures(content) else {
        warn!("No metadata found in markdown file");
        return (metadata, content);
    };

    for line in caps[1].lines() {
        if let Some((key, value)) = line.split_once(':') {
            metadata.set(key.trim(), value.trim());
        }
    }

    let body_start = caps.get(0).map_or(0, |m| m.end());
    (metadata, &content[body_start..])
}

/// Accepts `YYYY-MM-DD`, `YYYY.MM.DD` and `YYYY/MM/DD`.
pub(crate) fn parse_frontmatter_date(date: &str) -> Option<NaiveDate> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let content = "---\ntags: rust, web , ,blog\nseries: Intro\nseries_part: 2\ndate: 2024-03-01\n---\n# Hello\n\nBody";
        let (meta, body) = parse_metadata(content);
        assert_eq!(meta.tags, vec!["rust", "web", "blog"]);
        assert_eq!(meta.series.as_deref(), Some("Intro"));
        assert_eq!(meta.series_part.as_deref(), Some("2"));
        assert_eq!(meta.date.as_deref(), Some("2024-03-01"));
        assert_eq!(body, "# Hello\n\nBody");
    }

    #[test]
    fn value_may_contain_colons() {
        let (meta, _) = parse_metadata("---\nseries: Part: One\n---\nx");
        assert_eq!(meta.series.as_deref(), Some("Part: One"));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let (meta, body) = parse_metadata("---\nthis line has no colon\ntags: a\n---\nbody");
        assert_eq!(meta.tags, vec!["a"]);
        assert_eq!(body, "body");
    }

    #[test]
    fn missing_block_returns_everything() {
        let content = "# Title\n\nNo front matter here.";
        let (meta, body) = parse_metadata(content);
        assert_eq!(meta, Metadata::default());
        assert_eq!(body, content);
    }

    #[test]
    fn unterminated_block_is_not_front_matter() {
        let content = "---\ntags: a\n# never closed";
        let (meta, body) = parse_metadata(content);
        assert!(meta.tags.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn reparsing_body_finds_no_block() {
        let content = "---\ntags: a\n---\n# Title\n\ntext\n\n---\n\nmore";
        let (_, body) = parse_metadata(content);
        let (meta, again) = parse_metadata(body);
        assert_eq!(meta, Metadata::default());
        assert_eq!(again, body);
    }

    #[test]
    fn crlf_front_matter() {
        let (meta, body) = parse_metadata("---\r\ntags: a, b\r\n---\r\nbody");
        assert_eq!(meta.tags, vec!["a", "b"]);
        assert_eq!(body, "body");
    }

    #[test]
    fn accepted_date_formats_agree() {
        let expected = NaiveDate::from_ymd_opt(2023, 7, 9);
        assert_eq!(parse_frontmatter_date("2023-07-09"), expected);
        assert_eq!(parse_frontmatter_date("2023.07.09"), expected);
        assert_eq!(parse_frontmatter_date("2023/07/09"), expected);
        assert_eq!(parse_frontmatter_date(" 2023-07-09 "), expected);
    }

    #[test]
    fn other_dates_are_rejected() {
        assert_eq!(parse_frontmatter_date(""), None);
        assert_eq!(parse_frontmatter_date("09/07/2023"), None);
        assert_eq!(parse_frontmatter_date("July 9, 2023"), None);
        assert_eq!(parse_frontmatter_date("2023-13-01"), None);
    }
}
