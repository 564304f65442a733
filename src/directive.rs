//! Directive tokenizer.
//!
//! Section markup is scanned once, left to right. At each position the
//! directive forms are tried in priority order (conditional, loop, section
//! inclusion, style, expression) in whichever dialect the position opens;
//! anything that does not form a complete directive is literal text. Both
//! dialects normalise to the same [`Directive`] values, so the renderer has a
//! single code path per directive kind.
//!
//! Bodies are kept as raw text and tokenized again when they are rendered.
//! Closing markers are the first matching marker after the opener, so nested
//! directives of the same kind need distinct numeric ids (`%%if1{..}%%` ..
//! `%%endif1%%`).

use std::sync::LazyLock;

use regex::Regex;

use crate::marker::{lit, Marker, Piece};

/// A lexical unit of section markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    Text(&'a str),
    /// `{{ expr }}`
    Expression(&'a str),
    /// `%%style[selector, spread]%%` / `<a-style[selector, spread]/>`
    Style { selector: Option<&'a str>, spread: bool },
    /// `%%section[expr]%%` / `<a-section[expr]/>`
    Section(&'a str),
    Loop(Loop<'a>),
    Conditional(Conditional<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop<'a> {
    pub element: &'a str,
    pub index: Option<&'a str>,
    pub array: &'a str,
    pub body: &'a str,
}

/// An `if` with its `else-if` chain, in source order, and optional `else`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional<'a> {
    pub branches: Vec<Branch<'a>>,
    pub otherwise: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch<'a> {
    pub condition: &'a str,
    pub body: &'a str,
}

macro_rules! head {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect("directive regex is valid"));
    };
}

head!(BRACKET_IF, r"(?i)\A%%if([1-9]{1,2})?\s*\{");
head!(TAG_IF, r#"(?i)\A<a-if([1-9]{1,2})?\s*condition\s*=\s*['"]"#);
head!(
    BRACKET_FOR,
    r"(?i)\A%%for([1-9]{1,2})?\s*\[\s*([a-z_$][\w$]*)(?:\s*,\s*([a-z_$][\w$]*))?\s*\]\s*\{"
);
head!(
    TAG_FOR,
    r#"(?i)\A<a-for([1-9]{1,2})?\s*\[\s*([a-z_$][\w$]*)(?:\s*,\s*([a-z_$][\w$]*))?\s*\]\s*array\s*=\s*['"]"#
);
head!(BRACKET_SECTION, r"(?i)\A%%section([1-9]{1,2})?\s*\[");
head!(TAG_SECTION, r"(?i)\A<a-section([1-9]{1,2})?\s*\[");
head!(BRACKET_STYLE, r"(?i)\A%%style\s*");
head!(TAG_STYLE, r"(?i)\A<a-style\s*");
head!(STYLE_PARAMS, r"(?is)\A(.*?)\s*,\s*(true|false)\s*\z");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Bracket,
    Tag,
}

impl Dialect {
    fn if_head(self) -> &'static Regex {
        match self {
            Self::Bracket => &BRACKET_IF,
            Self::Tag => &TAG_IF,
        }
    }

    fn for_head(self) -> &'static Regex {
        match self {
            Self::Bracket => &BRACKET_FOR,
            Self::Tag => &TAG_FOR,
        }
    }

    fn section_head(self) -> &'static Regex {
        match self {
            Self::Bracket => &BRACKET_SECTION,
            Self::Tag => &TAG_SECTION,
        }
    }

    fn style_head(self) -> &'static Regex {
        match self {
            Self::Bracket => &BRACKET_STYLE,
            Self::Tag => &TAG_STYLE,
        }
    }

    /// Ends an `if` condition or a loop's array expression.
    fn expression_close(self) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit("}"), Piece::Ws, lit("%%")]),
            Self::Tag => Marker::new(vec![Piece::Quote, Piece::Ws, lit(">")]),
        }
    }

    fn else_if_open(self, id: &str) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit(format!("%%else-if{id}")), Piece::Ws, lit("{")]),
            Self::Tag => Marker::new(vec![
                lit(format!("<a-else-if{id}")),
                Piece::Ws,
                lit("condition"),
                Piece::Ws,
                lit("="),
                Piece::Ws,
                Piece::Quote,
            ]),
        }
    }

    fn else_if_close(self) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit("}"), Piece::Ws, lit("%%")]),
            Self::Tag => Marker::new(vec![Piece::Quote, Piece::Ws, Piece::OptSlash, lit(">")]),
        }
    }

    fn else_marker(self, id: &str) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit(format!("%%else{id}")), Piece::Ws, lit("%%")]),
            Self::Tag => Marker::new(vec![
                lit(format!("<a-else{id}")),
                Piece::Ws,
                Piece::OptSlash,
                lit(">"),
            ]),
        }
    }

    fn endif(self, id: &str) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit(format!("%%endif{id}")), Piece::Ws, lit("%%")]),
            Self::Tag => Marker::new(vec![lit(format!("</a-if{id}")), Piece::Ws, lit(">")]),
        }
    }

    fn endfor(self, id: &str) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit(format!("%%endfor{id}")), Piece::Ws, lit("%%")]),
            Self::Tag => Marker::new(vec![lit(format!("</a-for{id}")), Piece::Ws, lit(">")]),
        }
    }

    fn section_close(self) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit("]"), Piece::Ws, lit("%%")]),
            Self::Tag => Marker::new(vec![lit("]"), Piece::Ws, Piece::OptSlash, lit(">")]),
        }
    }

    /// Closes a style directive without parameters.
    fn style_bare_close(self) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit("%%")]),
            Self::Tag => Marker::new(vec![lit("/>")]),
        }
    }

    fn style_params_close(self) -> Marker {
        match self {
            Self::Bracket => Marker::new(vec![lit("]"), Piece::Ws, lit("%%")]),
            Self::Tag => Marker::new(vec![lit("]"), Piece::Ws, lit("/>")]),
        }
    }
}

/// Split `markup` into directives and literal text. Never fails: malformed or
/// unterminated directives are returned as text.
pub fn tokenize(markup: &str) -> Vec<Directive<'_>> {
    let bytes = markup.as_bytes();
    let mut directives = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        let next = bytes.get(pos + 1).copied();
        let parsed = match (bytes[pos], next) {
            (b'%', Some(b'%')) => directive_at(markup, pos, Dialect::Bracket),
            (b'<', Some(b'a' | b'A')) => directive_at(markup, pos, Dialect::Tag),
            (b'{', Some(b'{')) => expression_at(markup, pos),
            _ => None,
        };
        match parsed {
            Some((directive, end)) => {
                if text_start < pos {
                    directives.push(Directive::Text(&markup[text_start..pos]));
                }
                directives.push(directive);
                pos = end;
                text_start = end;
            }
            None => pos += 1,
        }
    }
    if text_start < markup.len() {
        directives.push(Directive::Text(&markup[text_start..]));
    }
    directives
}

type Parsed<'a> = Option<(Directive<'a>, usize)>;

fn directive_at(text: &str, at: usize, dialect: Dialect) -> Parsed<'_> {
    conditional_at(text, at, dialect)
        .or_else(|| loop_at(text, at, dialect))
        .or_else(|| section_at(text, at, dialect))
        .or_else(|| style_at(text, at, dialect))
}

fn expression_at(text: &str, at: usize) -> Parsed<'_> {
    let (close, end) = Marker::new(vec![lit("}}")]).find(text, at + 2)?;
    Some((Directive::Expression(&text[at + 2..close]), end))
}

fn conditional_at(text: &str, at: usize, dialect: Dialect) -> Parsed<'_> {
    let caps = dialect.if_head().captures(&text[at..])?;
    let id = caps.get(1).map_or("", |m| m.as_str());
    let head_end = at + caps.get(0)?.end();
    let (condition_end, body_start) = dialect.expression_close().find(text, head_end)?;
    let (end, after) = dialect.endif(id).find(text, body_start)?;

    let else_if_open = dialect.else_if_open(id);
    let else_if_close = dialect.else_if_close();
    let else_marker = dialect.else_marker(id);

    let mut branches = Vec::new();
    let mut condition = &text[head_end..condition_end];
    let mut body_start = body_start;
    let mut search = body_start;
    let mut otherwise = None;

    loop {
        let next_else_if = else_if_open.find(text, search).filter(|&(start, _)| start < end);
        let next_else = else_marker.find(text, search).filter(|&(_, close)| close <= end);
        match (next_else_if, next_else) {
            (Some((start, open_end)), other) if other.map_or(true, |(e, _)| start < e) => {
                match else_if_close.find(text, open_end) {
                    Some((close, close_end)) if close_end <= end => {
                        branches.push(Branch {
                            condition,
                            body: &text[body_start..start],
                        });
                        condition = &text[open_end..close];
                        body_start = close_end;
                        search = close_end;
                    }
                    // not a complete marker; it stays in the body
                    _ => search = start + 1,
                }
            }
            (_, Some((start, close))) => {
                branches.push(Branch {
                    condition,
                    body: &text[body_start..start],
                });
                otherwise = Some(&text[close..end]);
                break;
            }
            _ => {
                branches.push(Branch {
                    condition,
                    body: &text[body_start..end],
                });
                break;
            }
        }
    }

    Some((Directive::Conditional(Conditional { branches, otherwise }), after))
}

fn loop_at(text: &str, at: usize, dialect: Dialect) -> Parsed<'_> {
    let caps = dialect.for_head().captures(&text[at..])?;
    let id = caps.get(1).map_or("", |m| m.as_str());
    let element = caps.get(2)?.as_str();
    let index = caps.get(3).map(|m| m.as_str());
    let head_end = at + caps.get(0)?.end();
    let (array_end, body_start) = dialect.expression_close().find(text, head_end)?;
    let (body_end, after) = dialect.endfor(id).find(text, body_start)?;

    Some((
        Directive::Loop(Loop {
            element,
            index,
            array: &text[head_end..array_end],
            body: &text[body_start..body_end],
        }),
        after,
    ))
}

fn section_at(text: &str, at: usize, dialect: Dialect) -> Parsed<'_> {
    let head_end = at + dialect.section_head().find(&text[at..])?.end();
    let (close, after) = dialect.section_close().find(text, head_end)?;
    let expression = &text[head_end..close];
    if expression.contains(['\n', '\r']) {
        return None;
    }
    Some((Directive::Section(expression), after))
}

fn style_at(text: &str, at: usize, dialect: Dialect) -> Parsed<'_> {
    let head_end = at + dialect.style_head().find(&text[at..])?.end();
    if let Some(after) = dialect.style_bare_close().match_at(text, head_end) {
        return Some((
            Directive::Style {
                selector: None,
                spread: false,
            },
            after,
        ));
    }
    if text.as_bytes().get(head_end) != Some(&b'[') {
        return None;
    }
    let (close, after) = dialect.style_params_close().find(text, head_end + 1)?;
    let params = &text[head_end + 1..close];

    let (selector, spread) = match STYLE_PARAMS.captures(params) {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()),
            caps.get(2).is_some_and(|m| m.as_str().eq_ignore_ascii_case("true")),
        ),
        None => (params, false),
    };
    let selector = selector.trim();
    Some((
        Directive::Style {
            selector: (!selector.is_empty()).then_some(selector),
            spread,
        },
        after,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single(markup: &str) -> Directive<'_> {
        let mut directives = tokenize(markup);
        assert_eq!(directives.len(), 1, "{directives:?}");
        directives.remove(0)
    }

    #[test]
    fn plain_text_is_one_token() {
        let markup = "<p class=\"a\">50% off {not an expression} <abbr>x</abbr></p>";
        assert_eq!(tokenize(markup), vec![Directive::Text(markup)]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn expressions_split_text() {
        assert_eq!(
            tokenize("<b>{{ $.name }}</b>"),
            vec![
                Directive::Text("<b>"),
                Directive::Expression(" $.name "),
                Directive::Text("</b>"),
            ]
        );
    }

    #[test]
    fn loops_normalise_across_dialects() {
        let expected = Directive::Loop(Loop {
            element: "row",
            index: Some("i"),
            array: "$.rows",
            body: "<td>{{row}}</td>",
        });
        assert_eq!(single("%%for[row, i]{$.rows}%%<td>{{row}}</td>%%endfor%%"), expected);
        assert_eq!(
            single("<a-for [row,i] array=\"$.rows\"><td>{{row}}</td></a-for>"),
            expected
        );
    }

    #[test]
    fn conditional_chain_normalises_across_dialects() {
        let expected = Directive::Conditional(Conditional {
            branches: vec![
                Branch { condition: "$.a", body: "A" },
                Branch { condition: "$.b", body: "B" },
                Branch { condition: "$.c", body: "C" },
            ],
            otherwise: Some("D"),
        });
        assert_eq!(
            single("%%if{$.a}%%A%%else-if{$.b}%%B%%else-if {$.c} %%C%%else%%D%%endif%%"),
            expected
        );
        assert_eq!(
            single(
                "<a-if condition=\"$.a\">A<a-else-if condition=\"$.b\"/>B\
                 <a-else-if condition='$.c' />C<a-else/>D</a-if>"
            ),
            expected
        );
    }

    #[test]
    fn conditional_without_else() {
        assert_eq!(
            single("%%IF{$.x > 1}%%big%%ENDIF%%"),
            Directive::Conditional(Conditional {
                branches: vec![Branch { condition: "$.x > 1", body: "big" }],
                otherwise: None,
            })
        );
    }

    #[test]
    fn numeric_ids_keep_nested_conditionals_apart() {
        let inner = "%%if2{$.b}%%B%%else2%%C%%endif2%%";
        let markup = format!("%%if1{{$.a}}%%<{inner}>%%else1%%D%%endif1%%");
        let Directive::Conditional(outer) = single(&markup) else {
            panic!("expected a conditional");
        };
        assert_eq!(outer.branches.len(), 1);
        assert_eq!(outer.branches[0].body, format!("<{inner}>"));
        assert_eq!(outer.otherwise, Some("D"));

        let Directive::Conditional(nested) = single(inner) else {
            panic!("expected a conditional");
        };
        assert_eq!(nested.otherwise, Some("C"));
    }

    #[test]
    fn markers_with_other_ids_stay_in_the_body() {
        let markup = "%%if{$.a}%%x%%else1%%y%%endif%%";
        assert_eq!(
            single(markup),
            Directive::Conditional(Conditional {
                branches: vec![Branch { condition: "$.a", body: "x%%else1%%y" }],
                otherwise: None,
            })
        );
    }

    #[test]
    fn sections_in_both_dialects() {
        assert_eq!(single("%%section[$.content]%%"), Directive::Section("$.content"));
        assert_eq!(single("<a-section [$.items[0]] />"), Directive::Section("$.items[0]"));
        assert_eq!(single("<a-section[$.content]>"), Directive::Section("$.content"));
    }

    #[test]
    fn styles_with_and_without_parameters() {
        let bare = Directive::Style { selector: None, spread: false };
        assert_eq!(single("%%style%%"), bare);
        assert_eq!(single("<a-style />"), bare);
        assert_eq!(single("%%style[]%%"), bare);
        assert_eq!(
            single("%%style[$.style.box, true]%%"),
            Directive::Style { selector: Some("$.style.box"), spread: true }
        );
        assert_eq!(
            single("<a-style[$.style.box]/>"),
            Directive::Style { selector: Some("$.style.box"), spread: false }
        );
        assert_eq!(
            single("<a-style[, true]/>"),
            Directive::Style { selector: None, spread: true }
        );
    }

    #[test]
    fn incomplete_directives_are_text() {
        for markup in [
            "%%if{$.a}%% never closed",
            "%%for[x]{$.xs}%% no end",
            "{{ unclosed",
            "%%section[$.a\n]%%",
            "<a-if condition=\"x\">a</a-if2>",
            "%%style[$.s]",
        ] {
            assert_eq!(tokenize(markup), vec![Directive::Text(markup)], "{markup}");
        }
    }

    #[test]
    fn text_around_directives_is_preserved_exactly() {
        let markup = "é %%section[$.a]%% ü {{1}}";
        let rebuilt: Vec<&str> = tokenize(markup)
            .iter()
            .map(|d| match d {
                Directive::Text(t) => *t,
                _ => "#",
            })
            .collect();
        assert_eq!(rebuilt.concat(), "é # ü #");
    }
}
