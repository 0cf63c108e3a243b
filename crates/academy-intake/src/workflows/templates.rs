//! Shared HTML email scaffolding.

/// Escapes text for interpolation into HTML bodies and attributes.
pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Wraps an already-escaped body in the branded layout.
pub(crate) fn frame(brand: &str, heading: &str, body_html: &str) -> String {
    format!(
        "<!DOCTYPE html>\
         <html><body style=\"font-family:Arial,sans-serif;color:#222;\">\
         <div style=\"max-width:600px;margin:auto;padding:24px;\">\
         <h2 style=\"color:#1a3d7c;\">{heading}</h2>\
         {body_html}\
         <hr style=\"border:none;border-top:1px solid #ddd;margin-top:32px;\"/>\
         <p style=\"font-size:12px;color:#777;\">{brand}</p>\
         </div></body></html>",
        heading = escape_html(heading),
        brand = escape_html(brand),
    )
}

pub(crate) fn paragraph(text: &str) -> String {
    format!("<p>{}</p>", escape_html(text))
}

pub(crate) fn link(href: &str, label: &str) -> String {
    format!(
        "<p><a href=\"{}\" style=\"color:#1a3d7c;\">{}</a></p>",
        escape_html(href),
        escape_html(label)
    )
}
