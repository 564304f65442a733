//! Runtime context (`$`) that directives are evaluated against.
//!
//! A [`Scope`] is either the content node currently being rendered or a loop
//! frame derived from it. Loop frames borrow their enclosing scope instead of
//! copying it, so nesting `for` directives never clones the outer data.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// Field name under which a loop frame exposes its enclosing scope.
pub const ROOT_FIELD: &str = "root";

/// The data in scope for one render call.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// A content node: its fields are the context fields.
    Node(&'a Value),
    /// A loop iteration derived from an enclosing scope.
    Frame(Frame<'a>),
}

/// One iteration of a `for` directive.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    element_name: &'a str,
    element: &'a Value,
    index_name: Option<&'a str>,
    index: usize,
    root: &'a Scope<'a>,
}

/// A field looked up in a scope.
#[derive(Debug, Clone)]
pub enum Binding<'a> {
    Value(Cow<'a, Value>),
    /// `root` of a loop frame: the enclosing scope itself.
    Scope(&'a Scope<'a>),
}

impl<'a> Scope<'a> {
    pub fn node(node: &'a Value) -> Self {
        Scope::Node(node)
    }

    /// Derive the context for one loop iteration:
    /// `{ [index_name]: index, [element_name]: element, root: parent }`.
    pub fn frame(
        root: &'a Scope<'a>,
        element_name: &'a str,
        element: &'a Value,
        index_name: Option<&'a str>,
        index: usize,
    ) -> Self {
        Scope::Frame(Frame {
            element_name,
            element,
            index_name,
            index,
            root,
        })
    }

    /// Own field of this scope (`$.key`). Does not look through `root`.
    pub fn get(&self, key: &str) -> Option<Binding<'a>> {
        match *self {
            Scope::Node(value) => value.get(key).map(|v| Binding::Value(Cow::Borrowed(v))),
            Scope::Frame(frame) => {
                if key == ROOT_FIELD {
                    Some(Binding::Scope(frame.root))
                } else if key == frame.element_name {
                    Some(Binding::Value(Cow::Borrowed(frame.element)))
                } else if frame.index_name == Some(key) {
                    Some(Binding::Value(Cow::Owned(Value::from(frame.index))))
                } else {
                    None
                }
            }
        }
    }

    /// Resolve a bare identifier: own fields first, then the enclosing
    /// scopes of loop frames from the innermost outwards.
    pub fn resolve(&self, name: &str) -> Option<Binding<'a>> {
        match *self {
            Scope::Node(_) => self.get(name),
            Scope::Frame(frame) => self.get(name).or_else(|| frame.root.resolve(name)),
        }
    }

    /// The scope's `style` field, if any.
    pub fn style(&self) -> Option<Value> {
        match self.get("style")? {
            Binding::Value(v) => Some(v.into_owned()),
            Binding::Scope(scope) => Some(scope.to_value()),
        }
    }

    /// Materialise the scope as a plain value.
    pub fn to_value(&self) -> Value {
        match *self {
            Scope::Node(value) => value.clone(),
            Scope::Frame(frame) => {
                let mut object = Map::new();
                if let Some(index_name) = frame.index_name {
                    object.insert(index_name.to_string(), Value::from(frame.index));
                }
                object.insert(frame.element_name.to_string(), frame.element.clone());
                object.insert(ROOT_FIELD.to_string(), frame.root.to_value());
                Value::Object(object)
            }
        }
    }
}

impl Binding<'_> {
    pub fn into_value(self) -> Value {
        match self {
            Binding::Value(v) => v.into_owned(),
            Binding::Scope(scope) => scope.to_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_exposes_element_index_and_root() {
        let node = json!({"title": "Report", "rows": [1, 2]});
        let outer = Scope::node(&node);
        let element = json!("a");
        let frame = Scope::frame(&outer, "item", &element, Some("i"), 3);

        assert_eq!(frame.get("item").map(Binding::into_value), Some(json!("a")));
        assert_eq!(frame.get("i").map(Binding::into_value), Some(json!(3)));
        assert!(matches!(frame.get("root"), Some(Binding::Scope(_))));
        assert!(frame.get("title").is_none());
    }

    #[test]
    fn resolve_walks_enclosing_scopes() {
        let node = json!({"title": "Report"});
        let outer = Scope::node(&node);
        let row = json!({"id": 7});
        let frame = Scope::frame(&outer, "row", &row, None, 0);
        let cell = json!("x");
        let inner = Scope::frame(&frame, "cell", &cell, None, 0);

        assert_eq!(inner.resolve("row").map(Binding::into_value), Some(json!({"id": 7})));
        assert_eq!(inner.resolve("title").map(Binding::into_value), Some(json!("Report")));
        assert!(inner.resolve("missing").is_none());
    }

    #[test]
    fn root_field_shadows_element_named_root() {
        let node = json!({"k": 1});
        let outer = Scope::node(&node);
        let element = json!("shadowed");
        let frame = Scope::frame(&outer, "root", &element, None, 0);
        assert_eq!(frame.get("root").map(Binding::into_value), Some(json!({"k": 1})));
    }

    #[test]
    fn frame_materialises_to_object() {
        let node = json!({"k": 1});
        let outer = Scope::node(&node);
        let element = json!("a");
        let frame = Scope::frame(&outer, "el", &element, Some("idx"), 2);
        assert_eq!(
            frame.to_value(),
            json!({"idx": 2, "el": "a", "root": {"k": 1}})
        );
    }
}
