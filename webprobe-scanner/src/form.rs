use crate::request::Method;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENCTYPE: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_ENCTYPE: &str = "multipart/form-data";

/// Field types that carry user-typed text.
const FREE_TEXT_TYPES: &[&str] = &["text", "search", "password", "email", "textarea"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into().to_ascii_lowercase(),
            value: value.into(),
        }
    }

    pub fn is_free_text(&self) -> bool {
        FREE_TEXT_TYPES.contains(&self.field_type.as_str())
    }

    pub fn is_hidden(&self) -> bool {
        self.field_type == "hidden"
    }

    pub fn is_file(&self) -> bool {
        self.field_type == "file"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormDescriptor {
    pub method: Method,
    pub action: Resource,
    pub enctype: String,
    pub fields: Vec<FieldDescriptor>,
}

impl FormDescriptor {
    pub fn new(method: Method, action: Resource) -> Self {
        Self {
            method,
            action,
            enctype: DEFAULT_ENCTYPE.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_enctype(mut self, enctype: impl Into<String>) -> Self {
        self.enctype = enctype.into().to_ascii_lowercase();
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn is_multipart(&self) -> bool {
        self.enctype == MULTIPART_ENCTYPE
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name/value pairs as the browser would submit them untouched.
    pub fn default_values(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_text_classification() {
        assert!(FieldDescriptor::new("q", "TEXT", "").is_free_text());
        assert!(FieldDescriptor::new("body", "textarea", "").is_free_text());
        assert!(!FieldDescriptor::new("csrf", "hidden", "x").is_free_text());
        assert!(!FieldDescriptor::new("go", "submit", "Go").is_free_text());
    }

    #[test]
    fn test_default_values_keep_field_order() {
        let action = Resource::parse("http://example.com/login").unwrap();
        let form = FormDescriptor::new(Method::Post, action)
            .with_field(FieldDescriptor::new("user", "text", "bob"))
            .with_field(FieldDescriptor::new("pass", "password", ""));
        assert_eq!(
            form.default_values(),
            vec![
                ("user".to_string(), "bob".to_string()),
                ("pass".to_string(), String::new())
            ]
        );
    }
}
