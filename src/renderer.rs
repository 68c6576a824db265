use std::path::Path;

use handlebars::Handlebars;

use crate::error::{BlogError, Result};

pub(crate) const POST_TEMPLATE: &str = "post";
pub(crate) const LISTING_TEMPLATE: &str = "listing";

const POST_TEMPLATE_FILE: &str = "blog-template.html";
const LISTING_TEMPLATE_FILE: &str = "blogs-listing-template.html";

/// Registers the per-post and listing templates found in `template_dir`.
///
/// Templates are plain HTML with `{{PLACEHOLDER}}` tokens. Values are
/// inserted verbatim: anything user supplied is escaped before it reaches
/// the template, and unknown placeholders render empty. Single braces are
/// plain text; a literal `{{` has to be written `\{{`, otherwise the
/// template does not parse and the run aborts.
pub(crate) fn generate_renderer(template_dir: &Path) -> Result<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    for (name, file) in [
        (POST_TEMPLATE, POST_TEMPLATE_FILE),
        (LISTING_TEMPLATE, LISTING_TEMPLATE_FILE),
    ] {
        let path = template_dir.join(file);
        handlebars
            .register_template_file(name, &path)
            .map_err(|e| BlogError::setup(format!("Template file not usable: {path:?}"), e))?;
    }

    Ok(handlebars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn write_templates(dir: &Path) {
        std::fs::write(
            dir.join(POST_TEMPLATE_FILE),
            "<h1>{{TITLE}}</h1>{{CONTENT}}<i>{{MISSING}}</i>",
        )
        .unwrap();
        std::fs::write(dir.join(LISTING_TEMPLATE_FILE), "<main>{{BLOG_LISTINGS}}</main>").unwrap();
    }

    #[test]
    fn placeholders_are_substituted_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        write_templates(dir.path());
        let hb = generate_renderer(dir.path()).unwrap();

        let out = hb
            .render(
                POST_TEMPLATE,
                &json!({"TITLE": "A &amp; B", "CONTENT": "<p>x</p>"}),
            )
            .unwrap();
        assert_eq!(out, "<h1>A &amp; B</h1><p>x</p><i></i>");

        let listing = hb
            .render(LISTING_TEMPLATE, &json!({"BLOG_LISTINGS": "<h3>May 2024</h3>"}))
            .unwrap();
        assert_eq!(listing, "<main><h3>May 2024</h3></main>");
    }

    #[test]
    fn braces_in_inline_scripts() {
        let dir = tempfile::tempdir().unwrap();
        write_templates(dir.path());
        std::fs::write(
            dir.path().join(POST_TEMPLATE_FILE),
            "<script>function f() { return {a: 1}; } var t = '\\{{raw}}';</script>{{TITLE}}",
        )
        .unwrap();
        let hb = generate_renderer(dir.path()).unwrap();
        let out = hb.render(POST_TEMPLATE, &json!({"TITLE": "T"})).unwrap();
        assert_eq!(
            out,
            "<script>function f() { return {a: 1}; } var t = '{{raw}}';</script>T"
        );

        std::fs::write(dir.path().join(POST_TEMPLATE_FILE), "<script>if (a) {{ b(); }</script>")
            .unwrap();
        let err = generate_renderer(dir.path()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Setup);
    }

    #[test]
    fn missing_template_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(POST_TEMPLATE_FILE), "{{TITLE}}").unwrap();
        let err = generate_renderer(dir.path()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Setup);
        assert!(err.to_string().contains(LISTING_TEMPLATE_FILE));
    }
}
