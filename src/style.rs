//! Style helpers – inline declarations for the style directive, and the
//! page-level CSS injected when a document is wrapped into its template.

use serde_json::Value;

use crate::expr::{renderable, truthy, EvalError};

// ---------------------------------------------------------------------------
// Inline declarations
// ---------------------------------------------------------------------------

/// Build a CSS declaration list from a style source.
///
/// Objects become `key:value;` pairs joined by a space, skipping falsy values
/// and turning `_` in keys into `-`. Strings are used verbatim. Falsy sources
/// yield an empty string. Any other source is a type error.
pub fn declarations(source: &Value) -> Result<String, EvalError> {
    match source {
        Value::Object(map) => Ok(map
            .iter()
            .filter(|(_, value)| truthy(value))
            .map(|(key, value)| format!("{}:{};", key.replace('_', "-"), declaration_value(value)))
            .collect::<Vec<_>>()
            .join(" ")),
        Value::String(s) => Ok(s.clone()),
        other if !truthy(other) => Ok(String::new()),
        other => Err(EvalError::Type(format!(
            "style source must be an object or a string, got {other}"
        ))),
    }
}

fn declaration_value(value: &Value) -> String {
    renderable(value).unwrap_or_else(|| match value {
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// Output of a style directive: nothing for empty declarations, otherwise the
/// declarations (or a `style` attribute when `spread`) padded by spaces.
pub fn style_output(declarations: &str, spread: bool) -> String {
    if declarations.is_empty() {
        String::new()
    } else if spread {
        format!(" style=\"{declarations}\" ")
    } else {
        format!(" {declarations} ")
    }
}

// ---------------------------------------------------------------------------
// Page CSS
// ---------------------------------------------------------------------------

/// Supported paper sizes, dimensions in centimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paper {
    A4,
    A3,
    A1,
    Letter,
}

impl Paper {
    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "A4" => Some(Self::A4),
            "A3" => Some(Self::A3),
            "A1" => Some(Self::A1),
            "LETTER" => Some(Self::Letter),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::A3 => "A3",
            Self::A1 => "A1",
            Self::Letter => "LETTER",
        }
    }

    /// (width, height) in cm.
    pub fn size_cm(self) -> (f64, f64) {
        match self {
            Self::A4 => (21.0, 29.7),
            Self::A3 => (29.7, 42.0),
            Self::A1 => (59.4, 84.1),
            Self::Letter => (21.59, 27.94),
        }
    }
}

/// `@page` rule plus body dimensions for `paper`.
///
/// Margins are CSS lengths; only bare numbers are subtracted from the page
/// height, anything else (e.g. `0.3cm`) counts as zero.
pub fn paper_css(paper: Paper, margin_top: &str, margin_bottom: &str) -> String {
    let (width, height) = paper.size_cm();
    let numeric = |m: &str| m.trim().parse::<f64>().unwrap_or(0.0);
    let body_height = height - numeric(margin_top) - numeric(margin_bottom);
    format!(
        "\n<style>\n\n    @page {{\n        size: \"{name}\";\n        margin-top: {margin_top};\n        \
         margin-bottom: {margin_bottom};\n    }}\n\n    body, html {{\n    width: {width}cm;\n    \
         height: {body_height}cm;\n    }}\n\n</style>\n",
        name = paper.name(),
        width = crate::expr::value::format_number(width),
        body_height = crate::expr::value::format_number(body_height),
    )
}

/// Insert `snippet` in front of the first `</head>`; documents without a head
/// are returned unchanged.
pub fn inject_before_head_end(html: &str, snippet: &str) -> String {
    match html.find("</head>") {
        Some(at) => format!("{}{snippet}{}", &html[..at], &html[at..]),
        None => {
            log::warn!("no </head> in template, dropping injected style");
            html.to_string()
        }
    }
}

/// A `<style>` block holding `css`.
pub fn style_block(css: &str) -> String {
    format!("\n<style>\n{css}\n</style>\n")
}
