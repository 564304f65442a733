//! Directive interpreter and content processor.
//!
//! [`Renderer::render`] turns one section's markup into HTML against a
//! runtime context; [`Renderer::process`] walks a content tree and renders
//! each node with the section its `type` names. Section inclusion directives
//! call back into `process`, so nested content renders recursively with the
//! same registry.
//!
//! Nothing here fails: evaluation errors, missing sections and malformed
//! content are logged and contribute no output.

use std::cell::Cell;

use serde_json::Value;

use crate::context::Scope;
use crate::directive::{tokenize, Branch, Conditional, Directive, Loop};
use crate::expr::{renderable, EvalError, ExpressionEvaluator, SafeEvaluator};
use crate::registry::SectionRegistry;
use crate::style::{declarations, style_output};

/// Section inclusions nested deeper than this are skipped. A section that
/// includes itself would otherwise recurse until the stack overflows.
pub const MAX_SECTION_DEPTH: usize = 64;

/// Renders sections from one registry with one expression evaluator.
pub struct Renderer<'r> {
    registry: &'r SectionRegistry,
    evaluator: &'r dyn ExpressionEvaluator,
    depth: Cell<usize>,
}

impl<'r> Renderer<'r> {
    pub fn new(registry: &'r SectionRegistry, evaluator: &'r dyn ExpressionEvaluator) -> Self {
        Self {
            registry,
            evaluator,
            depth: Cell::new(0),
        }
    }

    pub fn registry(&self) -> &SectionRegistry {
        self.registry
    }

    /// Render `markup` against `scope`.
    pub fn render(&self, scope: &Scope<'_>, markup: &str) -> String {
        let mut out = String::with_capacity(markup.len());
        for directive in tokenize(markup) {
            match directive {
                Directive::Text(text) => out.push_str(text),
                Directive::Expression(expression) => self.expression(scope, expression, &mut out),
                Directive::Style { selector, spread } => self.style(scope, selector, spread, &mut out),
                Directive::Section(expression) => self.section(scope, expression, &mut out),
                Directive::Loop(repeat) => self.repeat(scope, &repeat, &mut out),
                Directive::Conditional(conditional) => self.conditional(scope, &conditional, &mut out),
            }
        }
        out
    }

    /// Render every node of a content tree and join the results with `\n`.
    ///
    /// Nested arrays are processed recursively and contribute one joined
    /// entry. Nodes whose `type` has no section are skipped with a warning.
    pub fn process(&self, content: &Value) -> String {
        let Value::Array(entries) = content else {
            log::warn!("invalid content to process, expected an array: {}", summary(content));
            return String::new();
        };

        let mut rendered = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                Value::Array(_) => rendered.push(self.process(entry)),
                Value::Object(node) => {
                    let section_type = node.get("type").and_then(Value::as_str);
                    match section_type.and_then(|name| self.registry.get(name)) {
                        Some(markup) => rendered.push(self.render(&Scope::node(entry), markup)),
                        None => log::warn!(
                            "section `{}` not found, skipping node",
                            section_type.unwrap_or("<no type>")
                        ),
                    }
                }
                other => log::warn!("skipping content entry that is not a node: {}", summary(other)),
            }
        }
        rendered.join("\n")
    }

    // -----------------------------------------------------------------------
    // Directives
    // -----------------------------------------------------------------------

    fn expression(&self, scope: &Scope<'_>, expression: &str, out: &mut String) {
        match self.evaluator.evaluate(expression, scope) {
            Ok(value) => {
                if let Some(text) = renderable(&value) {
                    out.push_str(&text);
                }
            }
            Err(e) => log::error!("expression `{{{{{expression}}}}}` failed: {e}"),
        }
    }

    fn style(&self, scope: &Scope<'_>, selector: Option<&str>, spread: bool, out: &mut String) {
        let source = match selector {
            Some(selector) => self.evaluator.evaluate(selector, scope),
            None => Ok(scope.style().unwrap_or(Value::Null)),
        };
        match source.and_then(|source| declarations(&source)) {
            Ok(decls) => out.push_str(&style_output(&decls, spread)),
            Err(e) => log::warn!(
                "style directive `{}` produced no style: {e}",
                selector.unwrap_or("$.style")
            ),
        }
    }

    fn section(&self, scope: &Scope<'_>, expression: &str, out: &mut String) {
        let depth = self.depth.get();
        if depth >= MAX_SECTION_DEPTH {
            log::error!(
                "section inclusion `{expression}` skipped: nested more than {MAX_SECTION_DEPTH} levels deep"
            );
            return;
        }
        let tree = match self.evaluator.evaluate(expression, scope) {
            // a single node is a one-entry tree
            Ok(node @ Value::Object(_)) => Value::Array(vec![node]),
            Ok(tree) => tree,
            Err(e) => {
                log::error!("section inclusion `{expression}` failed: {e}");
                return;
            }
        };
        self.depth.set(depth + 1);
        out.push_str(&self.process(&tree));
        self.depth.set(depth);
    }

    fn repeat(&self, scope: &Scope<'_>, repeat: &Loop<'_>, out: &mut String) {
        let items = match self.evaluator.evaluate(repeat.array, scope) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                log::error!(
                    "for statement over `{}` skipped: not an array ({})",
                    repeat.array,
                    summary(&other)
                );
                return;
            }
            Err(e) => {
                log::error!("for statement over `{}` failed: {e}", repeat.array);
                return;
            }
        };
        for (index, element) in items.iter().enumerate() {
            let frame = Scope::frame(scope, repeat.element, element, repeat.index, index);
            out.push_str(&self.render(&frame, repeat.body));
        }
    }

    fn conditional(&self, scope: &Scope<'_>, conditional: &Conditional<'_>, out: &mut String) {
        match self.select_branch(scope, &conditional.branches, conditional.otherwise) {
            Ok(Some(body)) => out.push_str(&self.render(scope, body)),
            Ok(None) => {}
            Err(e) => log::error!("if statement failed, rendering nothing: {e}"),
        }
    }

    /// First branch whose condition holds, in source order; later conditions
    /// are not evaluated.
    fn select_branch<'m>(
        &self,
        scope: &Scope<'_>,
        branches: &[Branch<'m>],
        otherwise: Option<&'m str>,
    ) -> Result<Option<&'m str>, EvalError> {
        for branch in branches {
            if self.evaluator.test(branch.condition, scope)? {
                return Ok(Some(branch.body));
            }
        }
        Ok(otherwise)
    }
}

/// Short description of a value for log records.
fn summary(value: &Value) -> String {
    let text = value.to_string();
    match text.char_indices().nth(80) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Render `markup` against `node` with the sandboxed evaluator.
pub fn render(node: &Value, markup: &str, registry: &SectionRegistry) -> String {
    Renderer::new(registry, &SafeEvaluator).render(&Scope::node(node), markup)
}

/// Process a content tree with the sandboxed evaluator.
pub fn process(content: &Value, registry: &SectionRegistry) -> String {
    Renderer::new(registry, &SafeEvaluator).process(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;

    /// Records every expression it is asked to evaluate.
    #[derive(Default)]
    struct Recording {
        seen: RefCell<Vec<String>>,
    }

    impl ExpressionEvaluator for Recording {
        fn evaluate(&self, expression: &str, scope: &Scope<'_>) -> Result<Value, EvalError> {
            self.seen.borrow_mut().push(expression.trim().to_string());
            SafeEvaluator.evaluate(expression, scope)
        }
    }

    fn empty() -> SectionRegistry {
        SectionRegistry::new()
    }

    #[test]
    fn markup_without_directives_is_unchanged() {
        let markup = "<div class=\"x\">100% {plain} <abbr>a</abbr>\n</div>";
        assert_eq!(render(&json!({}), markup, &empty()), markup);
    }

    #[test]
    fn loop_renders_each_element_in_order() {
        let markup = "%%for[item]{$.list}%%<li>{{item}}</li>%%endfor%%";
        assert_eq!(render(&json!({"list": ["a", "b"]}), markup, &empty()), "<li>a</li><li>b</li>");
        assert_eq!(render(&json!({"list": []}), markup, &empty()), "");
    }

    #[test]
    fn loop_index_and_root_access() {
        let markup = "<a-for [row, i] array=\"$.rows\">{{i + 1}}.{{row.name}}@{{$.root.shop}};</a-for>";
        let node = json!({"shop": "north", "rows": [{"name": "x"}, {"name": "y"}]});
        assert_eq!(render(&node, markup, &empty()), "1.x@north;2.y@north;");
    }

    #[test]
    fn loop_over_non_array_renders_nothing() {
        let markup = "[%%for[x]{$.n}%%body%%endfor%%]";
        assert_eq!(render(&json!({"n": 3}), markup, &empty()), "[]");
        assert_eq!(render(&json!({}), markup, &empty()), "[]");
    }

    #[test]
    fn conditional_branching() {
        let markup = "%%if{$.x>1}%%big%%else%%small%%endif%%";
        assert_eq!(render(&json!({"x": 5}), markup, &empty()), "big");
        assert_eq!(render(&json!({"x": 0}), markup, &empty()), "small");
    }

    #[test]
    fn else_if_short_circuits() {
        let markup = "%%if{$.a}%%A%%else-if{$.b}%%B%%else-if{$.c.touch()}%%C%%endif%%";
        let node = json!({"a": false, "b": true, "c": true});
        let registry = empty();
        let evaluator = Recording::default();
        let out = Renderer::new(&registry, &evaluator).render(&Scope::node(&node), markup);
        assert_eq!(out, "B");
        assert_eq!(*evaluator.seen.borrow(), ["$.a", "$.b"]);
    }

    #[test]
    fn conditional_error_renders_nothing() {
        let markup = "<%%if{$.a}%%A%%else-if{$.missing.deep}%%B%%else%%C%%endif%%>";
        assert_eq!(render(&json!({"a": 0}), markup, &empty()), "<>");
    }

    #[test]
    fn tag_conditional_matches_bracket_conditional() {
        let markup = "<a-if condition=\"$.n === 1\">one<a-else-if condition=\"$.n === 2\"/>two<a-else/>many</a-if>";
        for (n, expected) in [(1, "one"), (2, "two"), (7, "many")] {
            assert_eq!(render(&json!({"n": n}), markup, &empty()), expected);
        }
    }

    #[test]
    fn nested_conditionals_with_ids() {
        let markup = "%%if1{$.a}%%[%%if2{$.b}%%ab%%else2%%a%%endif2%%]%%else1%%none%%endif1%%";
        assert_eq!(render(&json!({"a": true, "b": true}), markup, &empty()), "[ab]");
        assert_eq!(render(&json!({"a": true, "b": false}), markup, &empty()), "[a]");
        assert_eq!(render(&json!({"a": false, "b": true}), markup, &empty()), "none");
    }

    #[test]
    fn style_omits_falsy_entries() {
        let node = json!({"style": {"color": "red", "display": null}});
        assert_eq!(render(&node, "<p%%style%%>", &empty()), "<p color:red; >");
        assert_eq!(
            render(&node, "<p<a-style[$.style, true]/>>", &empty()),
            "<p style=\"color:red;\" >"
        );
    }

    #[test]
    fn style_from_selector_and_empty_sources() {
        let node = json!({"styles": {"box": "margin:0"}, "style": null});
        assert_eq!(render(&node, "<div%%style[$.styles.box, true]%%>", &empty()), "<div style=\"margin:0\" >");
        assert_eq!(render(&node, "<div%%style%%>", &empty()), "<div>");
        assert_eq!(render(&json!({"style": 5}), "<div%%style%%>", &empty()), "<div>");
    }

    #[test]
    fn expressions_render_strings_and_numbers_only() {
        let node = json!({"s": "x", "n": 2, "b": true, "o": {}});
        assert_eq!(render(&node, "{{$.s}}{{$.n}}{{$.b}}{{$.o}}{{$.nope.x}}|", &empty()), "x2|");
    }

    #[test]
    fn process_joins_nodes_and_flattens_nested_arrays() {
        let registry: SectionRegistry = [("p", "<p>{{$.text}}</p>")].into_iter().collect();
        let content = json!([
            {"type": "p", "text": "a"},
            [{"type": "p", "text": "b"}, {"type": "p", "text": "c"}],
            {"type": "p", "text": "d"}
        ]);
        assert_eq!(process(&content, &registry), "<p>a</p>\n<p>b</p>\n<p>c</p>\n<p>d</p>");
    }

    #[test]
    fn missing_section_and_bad_shapes_yield_nothing() {
        assert_eq!(process(&json!([{"type": "ghost"}]), &empty()), "");
        assert_eq!(process(&json!({"type": "ghost"}), &empty()), "");
        assert_eq!(process(&json!("text"), &empty()), "");

        let registry: SectionRegistry = [("p", "P")].into_iter().collect();
        assert_eq!(process(&json!([1, {"type": "p"}, null]), &registry), "P");
    }

    #[test]
    fn section_inclusion_recurses_with_same_registry() {
        let registry = SectionRegistry::extract(
            "$$[list]$$<ul>%%section[$.content]%%</ul>!![list]!!\
             $$[item]$$<li>{{$.label}}</li>!![item]!!\
             <a-define-section [card]><div><a-section [$.body] /></div></a-define-section [card]>",
        );
        let content = json!([
            {"type": "list", "content": [{"type": "item", "label": "one"}, {"type": "item", "label": "two"}]},
            {"type": "card", "body": {"type": "item", "label": "solo"}}
        ]);
        assert_eq!(
            process(&content, &registry),
            "<ul><li>one</li>\n<li>two</li></ul>\n<div><li>solo</li></div>"
        );
    }

    #[test]
    fn self_including_section_stops_at_depth_limit() {
        let registry = SectionRegistry::extract("$$[a]$$<i>%%section[[$]]%%</i>!![a]!!");
        let out = process(&json!([{"type": "a"}]), &registry);
        assert_eq!(out.matches("<i>").count(), MAX_SECTION_DEPTH + 1);
        assert_eq!(out.matches("</i>").count(), MAX_SECTION_DEPTH + 1);
    }

    #[test]
    fn recursion_below_depth_limit_renders_fully() {
        let registry = SectionRegistry::extract(
            "$$[n]$${{$.k}}%%section[$.k > 0 ? [{type: 'n', k: $.k - 1}] : []]%%!![n]!!",
        );
        assert_eq!(process(&json!([{"type": "n", "k": 3}]), &registry), "3210");
    }

    #[test]
    fn nan_condition_is_falsy() {
        let markup = "%%if{$.a / $.b}%%yes%%else%%no%%endif%%|{{$.a / $.b}}|{{1 / $.b}}";
        assert_eq!(render(&json!({"a": 0, "b": 0}), markup, &empty()), "no|NaN|Infinity");
        assert_eq!(
            render(&json!({"a": 1, "b": 0}), "%%if{$.a / $.b > 100}%%BIG%%else%%SMALL%%endif%%", &empty()),
            "BIG"
        );
    }

    #[test]
    fn sections_can_build_content_inline() {
        let registry = SectionRegistry::extract(
            "$$[row]$$%%section[[{type: 'cell', v: $.a}, {type: 'cell', v: $.b}]]%%!![row]!!\
             $$[cell]$$<td>{{$.v}}</td>!![cell]!!",
        );
        assert_eq!(process(&json!([{"type": "row", "a": 1, "b": 2}]), &registry), "<td>1</td>\n<td>2</td>");
    }
}
