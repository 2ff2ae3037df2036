//! Answer formatting.
//!
//! Model output is either already HTML (passed through) or plain text that
//! is escaped and wrapped into paragraphs and bullet lists. The "Read More"
//! sources block is appended separately, once per turn.

use std::sync::LazyLock;

use regex::Regex;

use super::types::SourceCitation;

static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Any opening, closing or self-closing tag.
    Regex::new(r"</?[A-Za-z][A-Za-z0-9]*(?:\s[^<>]*)?/?>").expect("valid regex")
});

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn bullet_item(line: &str) -> Option<&str> {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("• "))
        .map(str::trim)
}

/// Turns raw model output into HTML. Idempotent on HTML input.
pub fn format_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    if HTML_TAG_RE.is_match(trimmed) {
        return trimmed.to_string();
    }

    let mut html = String::new();
    for paragraph in split_paragraphs(trimmed) {
        let mut text_lines: Vec<&str> = Vec::new();
        let mut items: Vec<&str> = Vec::new();

        for line in paragraph {
            match bullet_item(line) {
                Some(item) => {
                    flush_paragraph(&mut html, &mut text_lines);
                    items.push(item);
                }
                None => {
                    flush_list(&mut html, &mut items);
                    text_lines.push(line);
                }
            }
        }
        flush_paragraph(&mut html, &mut text_lines);
        flush_list(&mut html, &mut items);
    }
    html
}

fn split_paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

fn flush_paragraph(html: &mut String, lines: &mut Vec<&str>) {
    if lines.is_empty() {
        return;
    }
    html.push_str("<p>");
    html.push_str(&escape_html(&lines.join(" ")));
    html.push_str("</p>");
    lines.clear();
}

fn flush_list(html: &mut String, items: &mut Vec<&str>) {
    if items.is_empty() {
        return;
    }
    html.push_str("<ul>");
    for item in items.iter() {
        html.push_str("<li>");
        html.push_str(&escape_html(item));
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    items.clear();
}

/// Appends the "Read More" block. No citations, no block.
pub fn append_sources(html: &str, citations: &[SourceCitation]) -> String {
    if citations.is_empty() {
        return html.to_string();
    }

    let mut out = String::from(html);
    out.push_str("<div class=\"sources\"><p><strong>Read More:</strong></p><ul>");
    for citation in citations {
        out.push_str(&format!(
            "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></li>",
            escape_html(&citation.url),
            escape_html(&citation.title)
        ));
    }
    out.push_str("</ul></div>");
    out
}

pub fn format_response(raw: &str, citations: &[SourceCitation]) -> String {
    append_sources(&format_answer(raw), citations)
}
