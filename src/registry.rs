//! Named section templates extracted from template markup.
//!
//! Two equivalent syntaxes declare a section:
//!
//! ```text
//! $$[invoice-row]$$ ...markup... !![invoice-row]!!
//! <a-define-section [invoice-row]> ...markup... </a-define-section [invoice-row]>
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::marker::{lit, Marker, Piece};

static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\$\[([^\n]*?)\]\$\$|<a-define-section\s*\[([^\n]*?)\]\s*>")
        .expect("section definition regex is valid")
});

/// Map from section name to the markup that renders it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionRegistry {
    sections: HashMap<String, String>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `markup` for section definitions in both syntaxes.
    ///
    /// Definitions are matched left to right without overlapping; a later
    /// definition of the same name replaces an earlier one. Definitions with
    /// an empty name or an empty body, or with no matching closer, are ignored.
    pub fn extract(markup: &str) -> Self {
        let mut registry = Self::new();
        let mut pos = 0;
        while let Some(caps) = DEFINITION.captures_at(markup, pos) {
            let Some(head) = caps.get(0) else { break };
            let (name, closer) = match (caps.get(1), caps.get(2)) {
                (Some(name), _) => (
                    name.as_str(),
                    Marker::new(vec![lit(format!("!![{}]!!", name.as_str()))]),
                ),
                (None, Some(name)) => (
                    name.as_str(),
                    Marker::new(vec![
                        lit("</a-define-section"),
                        Piece::Ws,
                        lit(format!("[{}]", name.as_str())),
                        Piece::Ws,
                        lit(">"),
                    ]),
                ),
                (None, None) => break,
            };

            match closer.find(markup, head.end()) {
                Some((_, close_end)) if name.is_empty() => {
                    log::warn!("ignoring section definition with an empty name");
                    pos = close_end;
                }
                Some((body_end, close_end)) if body_end == head.end() => {
                    log::warn!("ignoring section `{name}` with an empty body");
                    pos = close_end;
                }
                Some((body_end, close_end)) => {
                    registry.insert(name, &markup[head.end()..body_end]);
                    pos = close_end;
                }
                None => {
                    log::debug!("section `{name}` has no closing marker");
                    // the head starts with an ASCII byte
                    pos = head.start() + 1;
                }
            }
        }
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, markup: impl Into<String>) {
        self.sections.insert(name.into(), markup.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Section names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl<N: Into<String>, M: Into<String>> FromIterator<(N, M)> for SectionRegistry {
    fn from_iter<I: IntoIterator<Item = (N, M)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (name, markup) in iter {
            registry.insert(name, markup);
        }
        registry
    }
}
