use std::fmt;

use serde_json::Value;

use crate::error::SystemError;
use crate::json::path::{Key, Path};

/// One (actual, expected) pair at a position in the two trees.
///
/// Items are created per visited node during a single validation pass and
/// dropped on unwind; the parent link is a borrow into the recursion
/// stack, used only to reconstruct paths for diagnostics and ignore
/// matching.
pub(crate) struct ValidationItem<'a, 'p> {
    pub actual: &'a Value,
    pub expected: &'a Value,
    name: Option<&'a str>,
    index: Option<usize>,
    parent: Option<&'p ValidationItem<'a, 'p>>,
}

impl<'a, 'p> ValidationItem<'a, 'p> {
    pub(crate) fn root(actual: &'a Value, expected: &'a Value) -> Self {
        Self {
            actual,
            expected,
            name: None,
            index: None,
            parent: None,
        }
    }

    pub(crate) fn entry(
        actual: &'a Value,
        expected: &'a Value,
        name: &'a str,
        parent: &'p ValidationItem<'a, '_>,
    ) -> Self {
        Self {
            actual,
            expected,
            name: Some(name),
            index: None,
            parent: Some(parent),
        }
    }

    pub(crate) fn element(
        actual: &'a Value,
        expected: &'a Value,
        index: usize,
        parent: &'p ValidationItem<'a, '_>,
    ) -> Self {
        Self {
            actual,
            expected,
            name: None,
            index: Some(index),
            parent: Some(parent),
        }
    }

    pub(crate) fn name(&self) -> Option<&'a str> {
        self.name
    }

    /// Position rendered in JSONPath bracket notation: `$['a']['b'][2]`.
    pub(crate) fn path(&self) -> String {
        let mut out = String::from("$");
        self.write_path(&mut out);
        out
    }

    fn write_path(&self, out: &mut String) {
        if let Some(parent) = self.parent {
            parent.write_path(out);
        }
        if let Some(name) = self.name {
            out.push_str(&format!("['{}']", name));
        } else if let Some(index) = self.index {
            out.push_str(&format!("[{}]", index));
        }
    }

    /// Member names joined with dots; array positions contribute nothing,
    /// so elements share the path of their array.
    pub(crate) fn dotted_path(&self) -> String {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names.join(".")
    }

    fn collect_names(&self, names: &mut Vec<&'a str>) {
        if let Some(parent) = self.parent {
            parent.collect_names(names);
        }
        if let Some(name) = self.name {
            names.push(name);
        }
    }

    /// The concrete key path of this node, for matching against parsed
    /// JSONPath expressions.
    pub(crate) fn key_path(&self) -> Path<'a> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        if keys.is_empty() {
            Path::Root
        } else {
            Path::Keys(keys)
        }
    }

    fn collect_keys(&self, keys: &mut Vec<Key<'a>>) {
        if let Some(parent) = self.parent {
            parent.collect_keys(keys);
        }
        if let Some(name) = self.name {
            keys.push(Key::Field(name));
        } else if let Some(index) = self.index {
            keys.push(Key::Idx(index));
        }
    }
}

/// Structural kind of a JSON value. Kinds must be equal before any
/// element-by-element descent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Object,
    Array,
    Integer,
    Float,
    String,
    Boolean,
    Null,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TokenKind::Object => "Object",
            TokenKind::Array => "Array",
            TokenKind::Integer => "Integer",
            TokenKind::Float => "Float",
            TokenKind::String => "String",
            TokenKind::Boolean => "Boolean",
            TokenKind::Null => "Null",
        };
        write!(f, "{}", name)
    }
}

pub(crate) fn token_kind(value: &Value) -> Result<TokenKind, SystemError> {
    match value {
        Value::Object(_) => Ok(TokenKind::Object),
        Value::Array(_) => Ok(TokenKind::Array),
        Value::String(_) => Ok(TokenKind::String),
        Value::Bool(_) => Ok(TokenKind::Boolean),
        Value::Null => Ok(TokenKind::Null),
        Value::Number(number) => {
            if number.is_i64() || number.is_u64() {
                Ok(TokenKind::Integer)
            } else if number.is_f64() {
                Ok(TokenKind::Float)
            } else {
                // only reachable with an arbitrary-precision parser
                Err(SystemError::UnsupportedTokenType(number.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_reconstruction() {
        let value = json!({"a": {"b": [1, 2, 3]}});
        let root = ValidationItem::root(&value, &value);
        assert_eq!(root.path(), "$");

        let a = ValidationItem::entry(&value["a"], &value["a"], "a", &root);
        let b = ValidationItem::entry(&value["a"]["b"], &value["a"]["b"], "b", &a);
        let third = ValidationItem::element(&value["a"]["b"][2], &value["a"]["b"][2], 2, &b);
        assert_eq!(third.path(), "$['a']['b'][2]");
    }

    #[test]
    fn test_dotted_path_skips_indices() {
        let value = json!({"Numbers": {"NumberItem": [{"AreaCode": 612}]}});
        let root = ValidationItem::root(&value, &value);
        let numbers = ValidationItem::entry(
            &value["Numbers"],
            &value["Numbers"],
            "Numbers",
            &root,
        );
        let items = ValidationItem::entry(
            &value["Numbers"]["NumberItem"],
            &value["Numbers"]["NumberItem"],
            "NumberItem",
            &numbers,
        );
        let first = ValidationItem::element(
            &value["Numbers"]["NumberItem"][0],
            &value["Numbers"]["NumberItem"][0],
            0,
            &items,
        );
        let code = ValidationItem::entry(
            &value["Numbers"]["NumberItem"][0]["AreaCode"],
            &value["Numbers"]["NumberItem"][0]["AreaCode"],
            "AreaCode",
            &first,
        );
        assert_eq!(code.dotted_path(), "Numbers.NumberItem.AreaCode");
        assert_eq!(code.path(), "$['Numbers']['NumberItem'][0]['AreaCode']");
    }

    #[test]
    fn test_token_kinds() {
        assert_eq!(token_kind(&json!({})).unwrap(), TokenKind::Object);
        assert_eq!(token_kind(&json!([])).unwrap(), TokenKind::Array);
        assert_eq!(token_kind(&json!(1)).unwrap(), TokenKind::Integer);
        assert_eq!(token_kind(&json!(1.5)).unwrap(), TokenKind::Float);
        assert_eq!(token_kind(&json!("x")).unwrap(), TokenKind::String);
        assert_eq!(token_kind(&json!(true)).unwrap(), TokenKind::Boolean);
        assert_eq!(token_kind(&json!(null)).unwrap(), TokenKind::Null);
    }
}
