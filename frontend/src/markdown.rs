use pulldown_cmark::{html, Event, Options, Parser};

/// Renders chat text to HTML. Called again on every chunk, so it has to cope
/// with half-written markdown (unclosed emphasis, open code fences).
///
/// Raw HTML in the source is emitted as escaped text, never as markup.
pub fn render(source: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
