use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};

const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Renders model output for display. Raw HTML in the Markdown is shown as
/// text, never passed through, and links or images with any scheme other
/// than http, https or mailto point at `#` instead.
pub fn render_markdown(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Relative and fragment URLs pass; absolute ones need an allowed scheme.
fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let path_start = url.find(['/', '?', '#']).unwrap_or(url.len());
    let Some(colon) = url[..path_start].find(':') else {
        return url;
    };
    // Browsers ignore whitespace and control characters inside a scheme.
    let scheme: String = url[..colon]
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if SAFE_SCHEMES.contains(&scheme.as_str()) {
        url
    } else {
        log::debug!("Dropped link with scheme '{}'", scheme);
        CowStr::Borrowed("#")
    }
}
