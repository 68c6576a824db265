use std::{fs::File, path::Path};

use chrono::Local;
use log::{error, info, warn};

use crate::{
    cache::{self, TIMESTAMP_FORMAT},
    context::Context,
    error::{BlogError, ErrorKind, Result, ResultExt},
    excerpt::build_post_excerpt,
    markdown::{log_image_paths, MarkdownRenderer},
    metadata::parse_metadata,
    relations::Relations,
    renderer::{LISTING_TEMPLATE, POST_TEMPLATE},
};

mod data;
mod utils;

use data::{BlogData, ListingPageData, Post, PostPageData, PostRecord};
use utils::{
    find_pairing, group_by_month, modified_time, output_file, render_lang_switch, render_preview,
    render_tags, sort_posts, timestamp,
};

pub(crate) const BLOG_DATA_FILE: &str = "blog_data.json";
pub(crate) const TAGS_DATA_FILE: &str = "tags_data.json";
pub(crate) const SERIES_DATA_FILE: &str = "series_data.json";
pub(crate) const BACKLINKS_DATA_FILE: &str = "backlinks_data.json";

/// Markdown file names directly inside `dir`, in directory listing order.
fn list_markdown_files(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| BlogError::setup(format!("reading directory {dir:?}"), e))?;

    let mut files = vec![];
    for entry in entries {
        let entry = entry.map_err(|e| BlogError::setup(format!("reading directory {dir:?}"), e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".md") && entry.path().is_file() {
            files.push(name);
        }
    }
    Ok(files)
}

/// First pass over one source file: front matter, rendering, dates and
/// the translation sibling.
fn preprocess_file(ctx: &Context, renderer: &MarkdownRenderer, markdown: &str) -> Result<Post> {
    let path = ctx.blogs_dir.join(markdown);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| BlogError::content(format!("reading {path:?}"), e))?;

    let (metadata, body) = parse_metadata(&content);
    log_image_paths(body);
    let rendered = renderer
        .render(body)
        .map_err(|e| e.context(format!("Markdown conversion failed for {markdown}")))?;

    let updated = modified_time(&path);
    let created = metadata
        .date()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(updated);

    Ok(Post {
        markdown: markdown.to_string(),
        file: output_file(markdown),
        pairing: find_pairing(&ctx.blogs_dir, markdown, &ctx.languages),
        path,
        body: body.to_string(),
        metadata,
        rendered,
        created,
        updated,
    })
}

fn generate_post_page(ctx: &Context, post: &Post, relations: &Relations) -> Result<()> {
    let backlinks = serde_json::to_string(relations.backlinks_for(&post.file))
        .or_blog(ErrorKind::Content, || format!("serializing backlinks of {}", post.file))?;
    let tags_href = format!("../{}", ctx.tags_href);

    let data = PostPageData {
        title: crate::markdown::escape_html(post.title()),
        content: &post.rendered.content,
        created: timestamp(&post.created),
        updated: timestamp(&post.updated),
        backlinks,
        tags: render_tags(&post.metadata.tags, &tags_href, false).into_string(),
        lang_switch: render_lang_switch(post.pairing.as_ref()).into_string(),
    };

    let out_path = ctx.blogs_dir.join(&post.file);
    let fd = File::create(&out_path)
        .map_err(|e| BlogError::content(format!("creating {out_path:?}"), e))?;
    ctx.handlebars
        .render_to_write(POST_TEMPLATE, &data, fd)
        .map_err(|e| BlogError::content(format!("while generating {:?}", post.path), e))?;

    info!("Generated {out_path:?}");
    Ok(())
}

fn generate_listing(ctx: &Context, renderer: &MarkdownRenderer, posts: &[Post]) -> Result<()> {
    let mut sorted: Vec<&Post> = posts.iter().collect();
    sorted.sort_by(sort_posts);

    let mut sections = vec![];
    for (month, group) in group_by_month(&sorted) {
        sections.push(format!("<h3>{month}</h3>"));
        for post in group {
            let excerpt = build_post_excerpt(renderer, &post.body, ctx.limits);
            sections.push(render_preview(post, &excerpt, &ctx.posts_href, &ctx.tags_href).into_string());
        }
    }

    let data = ListingPageData {
        blog_listings: sections.join("\n"),
    };
    let fd = File::create(&ctx.listing_path)
        .map_err(|e| BlogError::output(format!("creating {:?}", ctx.listing_path), e))?;
    ctx.handlebars
        .render_to_write(LISTING_TEMPLATE, &data, fd)
        .map_err(|e| BlogError::output("while generating blogs listing", e))?;

    info!("Successfully generated blogs listing page");
    Ok(())
}

fn save_data(ctx: &Context, relations: &Relations, records: &[PostRecord]) -> Result<()> {
    fs_extra::dir::create_all(&ctx.data_dir, false)
        .map_err(|e| BlogError::output(format!("creating {:?}", ctx.data_dir), e))?;

    let blog_data_path = ctx.data_dir.join(BLOG_DATA_FILE);
    let previous = cache::load_previous_run(&blog_data_path);
    let now = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let last_updated =
        cache::resolve_last_updated(&previous, records.iter().map(|r| r.markdown.as_str()), &now);

    cache::save_json(
        &blog_data_path,
        &BlogData {
            last_updated: &last_updated,
            posts: records,
        },
    )?;
    cache::save_json(&ctx.data_dir.join(SERIES_DATA_FILE), &relations.series)?;
    cache::save_json(&ctx.data_dir.join(TAGS_DATA_FILE), &relations.tags)?;
    cache::save_json(&ctx.data_dir.join(BACKLINKS_DATA_FILE), &relations.backlinks)?;
    Ok(())
}

/// Runs the whole build.
///
/// Every post is parsed and indexed before any page is written, so each
/// page embeds the complete backlink list no matter the listing order.
pub(crate) fn generate(ctx: &Context) -> Result<()> {
    let renderer = MarkdownRenderer::new();
    let sources = list_markdown_files(&ctx.blogs_dir)?;
    if sources.is_empty() {
        warn!("No markdown files found in {:?}", ctx.blogs_dir);
    }

    let mut relations = Relations::new();
    let mut posts = vec![];
    for markdown in &sources {
        match preprocess_file(ctx, &renderer, markdown) {
            Ok(post) => {
                relations.record(post.title(), &post.file, &post.metadata, &post.body);
                posts.push(post);
            }
            Err(e) if e.kind.is_fatal() => return Err(e),
            Err(e) => error!("Error processing {markdown}: {}", e.report()),
        }
    }

    for post in &posts {
        match generate_post_page(ctx, post, &relations) {
            Ok(()) => {}
            Err(e) if e.kind.is_fatal() => return Err(e),
            Err(e) => error!("Error generating blog post {}: {}", post.markdown, e.report()),
        }
    }

    let records: Vec<PostRecord> = posts.iter().map(PostRecord::from).collect();
    save_data(ctx, &relations, &records)?;
    generate_listing(ctx, &renderer, &posts)?;

    info!("Blog pages and data generated successfully ({} posts)", posts.len());
    Ok(())
}
