use std::path::PathBuf;

use crate::excerpt::ExcerptLimits;

/// Filename conventions and link labels for bilingual posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Languages {
    /// Marker of the secondary language, as in `<slug>.en.md`.
    pub secondary_marker: String,
    /// Shown on a secondary post, linking to its primary sibling.
    pub primary_label: String,
    /// Shown on a primary post, linking to its secondary sibling.
    pub secondary_label: String,
}

impl Default for Languages {
    fn default() -> Self {
        Self {
            secondary_marker: "en".to_string(),
            primary_label: "中文".to_string(),
            secondary_label: "English".to_string(),
        }
    }
}

/// Settings of one run. Built once in `main` and passed down by reference.
#[derive(Debug)]
pub(crate) struct Context {
    pub blogs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub listing_path: PathBuf,

    /// Prefix from the listing page to a post page.
    pub posts_href: String,
    /// Page holding one anchor per tag.
    pub tags_href: String,

    pub limits: ExcerptLimits,
    pub languages: Languages,

    pub handlebars: handlebars::Handlebars<'static>,
}
