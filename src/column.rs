use std::fmt;
use std::sync::Arc;

use derive_setters::Setters;

use crate::record::{Record, Value, field, value_text};

/// Pure display function over (field value, whole record).
pub type Renderer = Arc<dyn Fn(&Value, &Record) -> String + Send + Sync>;

/// How one field is labeled, sorted and rendered in a table.
#[derive(Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ColumnDescriptor {
    #[setters(skip)]
    pub key: String,
    #[setters(skip)]
    pub label: String,
    pub sortable: bool,
    #[setters(skip)]
    pub render: Option<Renderer>,
    #[setters(strip_option)]
    pub style: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        ColumnDescriptor {
            key: key.into(),
            label: label.into(),
            sortable: false,
            render: None,
            style: None,
        }
    }

    /// Sortable column, the common case for plain data fields.
    pub fn sorted(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label).with_sortable(true)
    }

    pub fn with_render<F>(mut self, render: F) -> Self
    where
        F: Fn(&Value, &Record) -> String + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    /// Display text of this column for `record`.
    pub fn display(&self, record: &Record) -> String {
        let value = field(record, &self.key);
        match &self.render {
            Some(render) => render(value, record),
            None => value_text(value).into_owned(),
        }
    }
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("sortable", &self.sortable)
            .field("render", &self.render.as_ref().map(|_| "fn"))
            .field("style", &self.style)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn raw_value_without_renderer() {
        let col = ColumnDescriptor::sorted("age", "Age");
        assert!(col.sortable);
        assert_eq!(col.display(&rec(json!({"age": 30}))), "30");
        assert_eq!(col.display(&rec(json!({}))), "");
    }

    #[test]
    fn renderer_sees_value_and_record() {
        let col = ColumnDescriptor::new("first", "Name")
            .with_render(|v, r| format!("{} {}", value_text(v), value_text(field(r, "last"))));
        let r = rec(json!({"first": "Ada", "last": "Lovelace"}));
        assert_eq!(col.display(&r), "Ada Lovelace");
        assert!(!col.sortable);
    }

    #[test]
    fn style_hint_is_opaque() {
        let col = ColumnDescriptor::new("total", "Total").with_style("currency".to_string());
        assert_eq!(col.style.as_deref(), Some("currency"));
    }
}
