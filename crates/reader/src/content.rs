use shared::domain::{Content, ContentKind, Params};
use widgets::template::{escape_html, parse_html_with_params};

/// Renders content blocks to a single HTML fragment.
pub fn export_content_to_html(content: &[Content], params: &Params) -> String {
    content
        .iter()
        .map(|block| match block.kind {
            ContentKind::Text => parse_html_with_params(&block.value, params),
            ContentKind::Image => format!(
                "<img class=\"oppia-content-image\" src=\"/images/{}\">",
                escape_html(&block.value)
            ),
            ContentKind::Video => format!(
                "<iframe class=\"oppia-content-video\" src=\"https://www.youtube.com/embed/{}\" allowfullscreen></iframe>",
                escape_html(&block.value)
            ),
        })
        .collect()
}

/// Feedback lines are joined with `<br>` and rendered as one text block.
pub fn feedback_to_html(feedback: &str, params: &Params) -> String {
    if feedback.is_empty() {
        return String::new();
    }
    let joined = feedback.split('\n').collect::<Vec<_>>().join("<br>");
    export_content_to_html(&[Content::text(joined)], params)
}

#[cfg(test)]
#[path = "tests/content_tests.rs"]
mod tests;
