use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{command, Arg, ArgMatches};
use context::{Context, Languages};
use excerpt::ExcerptLimits;
use generator::generate;
use log::{error, info};

mod cache;
mod context;
mod error;
mod excerpt;
mod generator;
mod markdown;
mod metadata;
mod relations;
mod renderer;

fn get<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> anyhow::Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("missing argument {id}"))
}

fn ensure_directory(dir: &Path) -> anyhow::Result<()> {
    fs_extra::dir::create_all(dir, false).with_context(|| format!("creating {dir:?}"))?;
    info!("Checked directory: {dir:?}");
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let matches = command!()
        .args(&[
            Arg::new("blogs_dir")
                .long("blogs-dir")
                .help("Directory of markdown posts. Post pages are written next to them.")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("blogs"),
            Arg::new("data_dir")
                .long("data-dir")
                .help("Directory for the JSON indexes")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("data"),
            Arg::new("template_dir")
                .long("template-dir")
                .help("Directory holding blog-template.html and blogs-listing-template.html")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("templates"),
            Arg::new("listing")
                .long("listing")
                .help("Path of the generated listing page")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("blogs.html"),
            Arg::new("posts_href")
                .long("posts-href")
                .help("Link prefix from the listing page to post pages")
                .default_value("blogs/"),
            Arg::new("tags_href")
                .long("tags-href")
                .help("Page holding one anchor per tag")
                .default_value("tags.html"),
            Arg::new("word_limit")
                .long("word-limit")
                .help("Words kept in a listing excerpt")
                .value_parser(clap::value_parser!(usize))
                .default_value("100"),
            Arg::new("cjk_char_limit")
                .long("cjk-char-limit")
                .help("CJK characters kept in a listing excerpt")
                .value_parser(clap::value_parser!(usize))
                .default_value("100"),
            Arg::new("primary_label")
                .long("primary-label")
                .env("BLOG_PRIMARY_LABEL")
                .help("Label of the link to the primary language version")
                .default_value("中文"),
            Arg::new("secondary_label")
                .long("secondary-label")
                .env("BLOG_SECONDARY_LABEL")
                .help("Label of the link to the secondary language version")
                .default_value("English"),
        ])
        .get_matches();

    let blogs_dir: PathBuf = get(&matches, "blogs_dir")?;
    let data_dir: PathBuf = get(&matches, "data_dir")?;
    ensure_directory(&blogs_dir)?;
    ensure_directory(&data_dir)?;

    let template_dir: PathBuf = get(&matches, "template_dir")?;
    let handlebars = renderer::generate_renderer(&template_dir)?;

    let ctx = Context {
        blogs_dir,
        data_dir,
        listing_path: get(&matches, "listing")?,
        posts_href: get(&matches, "posts_href")?,
        tags_href: get(&matches, "tags_href")?,
        limits: ExcerptLimits {
            words: get(&matches, "word_limit")?,
            cjk_chars: get(&matches, "cjk_char_limit")?,
        },
        languages: Languages {
            primary_label: get(&matches, "primary_label")?,
            secondary_label: get(&matches, "secondary_label")?,
            ..Languages::default()
        },
        handlebars,
    };

    generate(&ctx)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("Blog generation failed: {e:#}");
        return Err(e);
    }
    Ok(())
}
