use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::{BlogError, ErrorKind, Result, ResultExt};

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize, Debug)]
struct StoredPost {
    #[serde(default)]
    markdown: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum StoredBlogData {
    Current {
        #[serde(default)]
        last_updated: Option<String>,
        posts: Vec<StoredPost>,
    },
    /// Older runs wrote the bare post list.
    Legacy(Vec<StoredPost>),
}

/// What the previous run left in `blog_data.json`.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PreviousRun {
    pub last_updated: Option<String>,
    pub markdown: HashSet<String>,
}

impl From<StoredBlogData> for PreviousRun {
    fn from(data: StoredBlogData) -> Self {
        let (last_updated, posts) = match data {
            StoredBlogData::Current {
                last_updated,
                posts,
            } => (last_updated, posts),
            StoredBlogData::Legacy(posts) => (None, posts),
        };
        Self {
            last_updated: last_updated.filter(|s| !s.is_empty()),
            markdown: posts.into_iter().filter_map(|p| p.markdown).collect(),
        }
    }
}

/// Reads the previous `blog_data.json`. A missing or unreadable file counts
/// as no previous run.
pub(crate) fn load_previous_run(path: &Path) -> PreviousRun {
    if !path.exists() {
        info!("{path:?} does not exist. starting fresh");
        return PreviousRun::default();
    }

    let parsed = File::open(path)
        .map_err(serde_json::Error::io)
        .and_then(|fd| serde_json::from_reader::<_, StoredBlogData>(BufReader::new(fd)));
    match parsed {
        Ok(data) => data.into(),
        Err(e) => {
            error!("Error loading {path:?}: {e}");
            PreviousRun::default()
        }
    }
}

/// Keeps the previous stamp unless a markdown file appeared that the
/// previous run did not know, or there is no previous stamp.
pub(crate) fn resolve_last_updated<'a>(
    previous: &PreviousRun,
    current: impl IntoIterator<Item = &'a str>,
    now: &str,
) -> String {
    let new_post = current
        .into_iter()
        .any(|name| !previous.markdown.contains(name));
    match &previous.last_updated {
        Some(stamp) if !new_post => stamp.clone(),
        _ => now.to_string(),
    }
}

pub(crate) fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let fd = File::create(path).or_blog(ErrorKind::Output, || format!("creating {path:?}"))?;
    let mut writer = BufWriter::new(fd);
    serde_json::to_writer_pretty(&mut writer, data)
        .or_blog(ErrorKind::Output, || format!("serializing {path:?}"))?;
    writer
        .flush()
        .map_err(|e| BlogError::output(format!("writing {path:?}"), e))?;

    info!("Successfully saved {path:?}");
    Ok(())
}
