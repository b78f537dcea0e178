//! Schema - declared shapes for persisted JSON and their validator.
//!
//! Validation semantics:
//! - values must match the declared type exactly (no coercion)
//! - required properties must be present
//! - keys not declared (by name or by key rule) are rejected unless the
//!   object allows additional properties
//! - the first violation is reported with its JSON path

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A rule that object keys must satisfy to be validated by a pattern node.
#[derive(Clone, Copy)]
pub struct KeyRule {
    pub name: &'static str,
    pub accepts: fn(&str) -> bool,
}

impl fmt::Debug for KeyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl KeyRule {
    pub const ANY: KeyRule = KeyRule {
        name: "any",
        accepts: any_key,
    };

    pub const DIGITS: KeyRule = KeyRule {
        name: "digits",
        accepts: digits_key,
    };
}

fn any_key(_: &str) -> bool {
    true
}

fn digits_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Object shape: named properties, optional key-rule properties.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    properties: BTreeMap<String, SchemaNode>,
    required: Vec<String>,
    patterns: Vec<(KeyRule, SchemaNode)>,
    additional: bool,
}

/// A declared JSON shape.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Any,
    Null,
    Boolean,
    String,
    Integer { minimum: Option<i64> },
    Array(Box<SchemaNode>),
    OneOf(Vec<SchemaNode>),
    Object(ObjectSchema),
}

impl SchemaNode {
    /// An object that rejects undeclared keys until told otherwise.
    pub fn object() -> Self {
        SchemaNode::Object(ObjectSchema::default())
    }

    pub fn non_negative_integer() -> Self {
        SchemaNode::Integer { minimum: Some(0) }
    }

    pub fn array_of(items: SchemaNode) -> Self {
        SchemaNode::Array(Box::new(items))
    }

    pub fn property(self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.with_object(|obj| {
            obj.properties.insert(name.into(), node);
        })
    }

    pub fn required(self, name: impl Into<String>) -> Self {
        self.with_object(|obj| obj.required.push(name.into()))
    }

    pub fn pattern(self, rule: KeyRule, node: SchemaNode) -> Self {
        self.with_object(|obj| obj.patterns.push((rule, node)))
    }

    pub fn allow_additional(self) -> Self {
        self.with_object(|obj| obj.additional = true)
    }

    fn with_object(mut self, f: impl FnOnce(&mut ObjectSchema)) -> Self {
        if let SchemaNode::Object(obj) = &mut self {
            f(obj);
        }
        self
    }

    /// Validate `value` against this shape.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at(value, "$")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        match self {
            SchemaNode::Any => Ok(()),
            SchemaNode::Null => expect_type(value.is_null(), "null", value, path),
            SchemaNode::Boolean => expect_type(value.is_boolean(), "boolean", value, path),
            SchemaNode::String => expect_type(value.is_string(), "string", value, path),
            SchemaNode::Integer { minimum } => {
                let Some(n) = value.as_i64() else {
                    // u64 beyond i64::MAX is above any minimum
                    return expect_type(value.is_u64(), "integer", value, path);
                };
                match minimum {
                    Some(min) if n < *min => Err(SchemaViolation::new(
                        path,
                        ViolationKind::BelowMinimum {
                            minimum: *min,
                            actual: n,
                        },
                    )),
                    _ => Ok(()),
                }
            }
            SchemaNode::Array(items) => {
                let Some(array) = value.as_array() else {
                    return expect_type(false, "array", value, path);
                };
                for (index, entry) in array.iter().enumerate() {
                    items.validate_at(entry, &format!("{}[{}]", path, index))?;
                }
                Ok(())
            }
            SchemaNode::OneOf(variants) => {
                if variants.iter().any(|v| v.validate_at(value, path).is_ok()) {
                    Ok(())
                } else {
                    Err(SchemaViolation::new(path, ViolationKind::NoVariantMatched))
                }
            }
            SchemaNode::Object(schema) => {
                let Some(object) = value.as_object() else {
                    return expect_type(false, "object", value, path);
                };
                schema.validate_object(object, path)
            }
        }
    }
}

impl ObjectSchema {
    fn validate_object(&self, object: &Map<String, Value>, path: &str) -> Result<(), SchemaViolation> {
        for name in &self.required {
            if !object.contains_key(name) {
                return Err(SchemaViolation::new(
                    path,
                    ViolationKind::MissingField(name.clone()),
                ));
            }
        }

        for (key, value) in object {
            let child_path = format!("{}.{}", path, key);

            if let Some(node) = self.properties.get(key) {
                node.validate_at(value, &child_path)?;
                continue;
            }

            let mut matched = false;
            for (rule, node) in &self.patterns {
                if (rule.accepts)(key) {
                    matched = true;
                    node.validate_at(value, &child_path)?;
                }
            }

            if !matched && !self.additional {
                return Err(SchemaViolation::new(
                    path,
                    ViolationKind::UnexpectedField(key.clone()),
                ));
            }
        }

        Ok(())
    }
}

fn expect_type(
    ok: bool,
    expected: &'static str,
    value: &Value,
    path: &str,
) -> Result<(), SchemaViolation> {
    if ok {
        Ok(())
    } else {
        Err(SchemaViolation::new(
            path,
            ViolationKind::TypeMismatch {
                expected,
                actual: json_type_name(value),
            },
        ))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The first place where a value departed from its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {kind}")]
pub struct SchemaViolation {
    pub path: String,
    pub kind: ViolationKind,
}

impl SchemaViolation {
    fn new(path: &str, kind: ViolationKind) -> Self {
        SchemaViolation {
            path: path.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("undeclared field `{0}`")]
    UnexpectedField(String),
    #[error("value {actual} is below minimum {minimum}")]
    BelowMinimum { minimum: i64, actual: i64 },
    #[error("value matches none of the allowed shapes")]
    NoVariantMatched,
}
