//! Document skeleton: the JSON request describing one document.
//!
//! ```json
//! {
//!   "template": { "name": "invoice", "margin": { "top": "1cm" }, "header": { "title": "Q4" } },
//!   "data": { "customer": "ACME" },
//!   "content": [ { "type": "title", "text": "Invoice" } ],
//!   "style": { "wrap": true, "paper": "A4", "load_css": true },
//!   "save": { "dir": "out", "rendered_template": true }
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skeleton {
    pub template: TemplateSpec,
    /// Free-form document data, saved as `data.json` when requested.
    pub data: Value,
    /// The content tree.
    pub content: Value,
    pub style: DocumentStyle,
    /// Skip PDF generation even when a printer is available.
    pub no_printer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save: Option<SaveOptions>,
}

impl Skeleton {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Which template to use and its page furniture. Accepts either a bare
/// template name or an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TemplateRepr")]
pub struct TemplateSpec {
    pub name: String,
    pub margin: Margins,
    /// Header node; its `section` field names the section (default `header`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Value>,
    /// Footer node; its `section` field names the section (default `footer`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Value>,
}

impl TemplateSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateRepr {
    Name(String),
    Full(TemplateFields),
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct TemplateFields {
    name: String,
    margin: Margins,
    header: Option<Value>,
    footer: Option<Value>,
}

impl From<TemplateRepr> for TemplateSpec {
    fn from(repr: TemplateRepr) -> Self {
        match repr {
            TemplateRepr::Name(name) => Self::named(name),
            TemplateRepr::Full(fields) => Self {
                name: fields.name,
                margin: fields.margin,
                header: fields.header,
                footer: fields.footer,
            },
        }
    }
}

/// Page margins as CSS lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
}

/// Post-processing applied to the rendered body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStyle {
    /// Extra CSS injected into the wrapped document's head.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    /// Paper size name (`A4`, `A3`, `A1`, `LETTER`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    pub load_css: bool,
    /// Place the rendered body into the template document.
    pub wrap: bool,
    pub load_images: bool,
    pub load_images_as_urls: bool,
}

/// Which artefacts to persist, and where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub data: bool,
    pub skeleton: bool,
    pub rendered_template: bool,
    pub pdf: bool,
}
