//! Element-by-element validation of a received JSON payload against a
//! control payload.
//!
//! The walk is depth-first over the control tree and fails fast: the first
//! mismatch aborts the whole call. Strict mode additionally requires entry
//! and element counts to match exactly.

mod item;
pub(crate) mod path;

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::context::ValidationContext;
use crate::error::{Error, Result, SystemError};
use crate::matcher;
use crate::report;
use crate::variables::replace_dynamic_content;

use item::{token_kind, ValidationItem};
use path::{JsonPath, Key, Path};

/// Validates `received` against `control` under the given context.
///
/// Both payloads are parsed fresh per call; a malformed payload is a
/// [`SystemError`], not a failed assertion. Dynamic content in the control
/// payload is resolved before parsing.
pub fn validate(received: &str, control: &str, ctx: &ValidationContext) -> Result<()> {
    tracing::debug!("validating JSON payload");

    let control = replace_dynamic_content(control, ctx.variables())?;
    let actual: Value = serde_json::from_str(received).map_err(SystemError::InvalidJson)?;
    let expected: Value = serde_json::from_str(&control).map_err(SystemError::InvalidJson)?;

    let resolver = IgnoreResolver::new(ctx.ignore_expressions(), &expected)?;
    let root = ValidationItem::root(&actual, &expected);
    validate_item(&root, &resolver, ctx)
}

fn validate_item(
    item: &ValidationItem<'_, '_>,
    resolver: &IgnoreResolver<'_>,
    ctx: &ValidationContext,
) -> Result<()> {
    if let Value::String(expected) = item.expected {
        if matcher::is_ignore_placeholder(expected) {
            return Ok(());
        }
    }

    if resolver.is_ignored(item) {
        tracing::trace!(path = %item.path(), "entry ignored");
        return Ok(());
    }

    if let Value::String(expected) = item.expected {
        if matcher::is_matcher_expression(expected) {
            return matcher::resolve(&item.path(), &scalar_text(item.actual), expected, ctx);
        }
    }

    let expected_kind = token_kind(item.expected)?;
    let actual_kind = token_kind(item.actual)?;
    if expected_kind != actual_kind {
        return Err(report::value_mismatch(
            &format!("Type mismatch for entry '{}'", item.path()),
            expected_kind,
            actual_kind,
        )
        .into());
    }

    match (item.expected, item.actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            validate_object(item, actual, expected, resolver, ctx)
        }
        (Value::Array(expected), Value::Array(actual)) => {
            validate_array(item, actual, expected, resolver, ctx)
        }
        (expected, actual) => {
            if actual != expected {
                return Err(report::value_mismatch(
                    &format!("Values not equal for entry '{}'", item.path()),
                    scalar_text(expected),
                    scalar_text(actual),
                )
                .into());
            }
            Ok(())
        }
    }
}

fn validate_object(
    item: &ValidationItem<'_, '_>,
    actual: &Map<String, Value>,
    expected: &Map<String, Value>,
    resolver: &IgnoreResolver<'_>,
    ctx: &ValidationContext,
) -> Result<()> {
    if ctx.is_strict() && expected.len() != actual.len() {
        return Err(report::value_mismatch(
            &format!("Number of entries is not equal for entry '{}'", item.path()),
            expected.len(),
            actual.len(),
        )
        .into());
    }

    for (key, expected_value) in expected {
        let Some(actual_value) = actual.get(key) else {
            let available = actual.keys().cloned().collect::<Vec<_>>();
            return Err(report::failure(format!(
                "Missing entry '{}' for entry '{}', available entries [{}]",
                key,
                item.path(),
                available.join(", ")
            ))
            .into());
        };

        let child = ValidationItem::entry(actual_value, expected_value, key, item);
        validate_item(&child, resolver, ctx)?;
    }

    Ok(())
}

/// Matches control elements against received elements with a cursor that
/// only moves forward: a received element, once passed over or consumed, is
/// never reconsidered for a later control element. This is a greedy
/// left-to-right assignment, not a full bipartite search.
fn validate_array(
    item: &ValidationItem<'_, '_>,
    actual: &[Value],
    expected: &[Value],
    resolver: &IgnoreResolver<'_>,
    ctx: &ValidationContext,
) -> Result<()> {
    if ctx.is_strict() && expected.len() != actual.len() {
        return Err(report::value_mismatch(
            &format!("Number of entries is not equal for entry '{}'", item.path()),
            expected.len(),
            actual.len(),
        )
        .into());
    }

    let mut cursor = 0;
    for (expected_index, expected_element) in expected.iter().enumerate() {
        let mut matched = None;
        for (position, actual_element) in actual.iter().enumerate().skip(cursor) {
            let candidate = ValidationItem::element(actual_element, expected_element, position, item);
            match validate_item(&candidate, resolver, ctx) {
                Ok(()) => {
                    matched = Some(position);
                    break;
                }
                Err(Error::Validation(_)) => continue,
                Err(err) => return Err(err),
            }
        }

        match matched {
            Some(position) => cursor = position + 1,
            None => {
                let candidates = actual
                    .iter()
                    .map(|element| element.to_string())
                    .collect::<Vec<_>>();
                return Err(report::not_in_collection(
                    &format!(
                        "Item at index {} is missing for entry '{}'",
                        expected_index,
                        item.path()
                    ),
                    &candidates,
                )
                .into());
            }
        }
    }

    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Decides whether a node is excluded from validation. Expressions are
/// tried in order of exact dotted path, short name, then JSONPath
/// membership; any match suppresses the node and its subtree.
struct IgnoreResolver<'a> {
    dotted: Vec<&'a str>,
    short_first: HashMap<&'a str, Option<Path<'a>>>,
    queries: Vec<Path<'a>>,
}

impl<'a> IgnoreResolver<'a> {
    fn new(expressions: &'a [String], control: &'a Value) -> Result<Self> {
        let mut dotted = Vec::new();
        let mut short_first = HashMap::new();
        let mut queries = Vec::new();

        for expression in expressions {
            if expression.starts_with('$') {
                queries.push(expression.jsonpath()?);
            } else {
                dotted.push(expression.as_str());
                if !expression.contains('.') {
                    short_first.insert(
                        expression.as_str(),
                        find_first_named(control, expression),
                    );
                }
            }
        }

        Ok(Self {
            dotted,
            short_first,
            queries,
        })
    }

    fn is_ignored(&self, item: &ValidationItem<'_, '_>) -> bool {
        if self.dotted.is_empty() && self.queries.is_empty() {
            return false;
        }

        let dotted_path = item.dotted_path();
        if !dotted_path.is_empty() && self.dotted.iter().any(|e| *e == dotted_path) {
            return true;
        }

        if let Some(name) = item.name() {
            if let Some(Some(first)) = self.short_first.get(name) {
                if *first == item.key_path() {
                    return true;
                }
            }
        }

        if !self.queries.is_empty() {
            let key_path = item.key_path();
            if self.queries.iter().any(|query| query.prefixes(&key_path)) {
                return true;
            }
        }

        false
    }
}

/// Concrete path of the first node in document order whose member name is
/// `name`. When the same short name occurs at several paths, the first
/// occurrence wins.
fn find_first_named<'a>(control: &'a Value, name: &str) -> Option<Path<'a>> {
    fn walk<'a>(value: &'a Value, name: &str, prefix: &mut Vec<Key<'a>>) -> Option<Vec<Key<'a>>> {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    prefix.push(Key::Field(key));
                    if key == name {
                        return Some(prefix.clone());
                    }
                    if let Some(found) = walk(child, name, prefix) {
                        return Some(found);
                    }
                    prefix.pop();
                }
                None
            }
            Value::Array(elements) => {
                for (index, child) in elements.iter().enumerate() {
                    prefix.push(Key::Idx(index));
                    if let Some(found) = walk(child, name, prefix) {
                        return Some(found);
                    }
                    prefix.pop();
                }
                None
            }
            _ => None,
        }
    }

    let mut prefix = Vec::new();
    walk(control, name, &mut prefix).map(Path::Keys)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(result: Result<()>) -> String {
        match result.unwrap_err() {
            Error::Validation(err) => err.message().to_string(),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_identical_objects_pass_strict() {
        let payload = r#"{"id": 1, "name": "John", "tags": ["a", "b"]}"#;
        let ctx = ValidationContext::new();
        assert!(validate(payload, payload, &ctx).is_ok());
    }

    #[test]
    fn test_extra_entries_pass_lenient_but_fail_strict() {
        let received = r#"{"a": 1, "b": 2}"#;
        let control = r#"{"a": 1}"#;

        let lenient = ValidationContext::new().strict(false);
        assert!(validate(received, control, &lenient).is_ok());

        let strict = ValidationContext::new();
        let msg = message(validate(received, control, &strict));
        assert!(msg.contains("Number of entries is not equal"), "{}", msg);
        assert!(msg.contains("expected '1' but was '2'"), "{}", msg);
    }

    #[test]
    fn test_missing_entry_lists_available_keys() {
        let msg = message(validate(
            r#"{"a": 1, "c": 3}"#,
            r#"{"a": 1, "b": 2}"#,
            &ValidationContext::new(),
        ));
        assert!(msg.contains("Missing entry 'b'"), "{}", msg);
        assert!(msg.contains("available entries [a, c]"), "{}", msg);
    }

    #[test]
    fn test_scalar_mismatch_reports_path() {
        let msg = message(validate(
            r#"{"a": {"b": 2}}"#,
            r#"{"a": {"b": 3}}"#,
            &ValidationContext::new(),
        ));
        assert_eq!(
            msg,
            "Values not equal for entry '$['a']['b']', expected '3' but was '2'"
        );
    }

    #[test]
    fn test_type_mismatch_is_terminal() {
        let msg = message(validate(
            r#"{"a": [1]}"#,
            r#"{"a": {"b": 1}}"#,
            &ValidationContext::new(),
        ));
        assert!(msg.contains("Type mismatch for entry '$['a']'"), "{}", msg);
        assert!(msg.contains("expected 'Object' but was 'Array'"), "{}", msg);
    }

    #[test]
    fn test_integer_and_float_are_distinct_kinds() {
        let msg = message(validate(
            r#"{"a": 1.0}"#,
            r#"{"a": 1}"#,
            &ValidationContext::new(),
        ));
        assert!(msg.contains("expected 'Integer' but was 'Float'"), "{}", msg);
    }

    #[test]
    fn test_matcher_expression_in_control_payload() {
        let ctx = ValidationContext::new();
        assert!(validate(
            r#"{"id": "x123456789x"}"#,
            r#"{"id": "@contains('123456789')@"}"#,
            &ctx
        )
        .is_ok());

        let msg = message(validate(
            r#"{"id": "abc"}"#,
            r#"{"id": "@contains('123')@"}"#,
            &ctx,
        ));
        assert!(msg.contains("Validation matcher 'contains' failed"), "{}", msg);
    }

    #[test]
    fn test_greedy_array_cursor_skips_unmatched_elements() {
        let ctx = ValidationContext::new().strict(false);
        assert!(validate(r#"["A", "B", "C"]"#, r#"["A", "C"]"#, &ctx).is_ok());
    }

    #[test]
    fn test_greedy_array_cursor_never_looks_back() {
        // "B" consumes the cursor past "A", so a control order of B, A
        // cannot match even though a different assignment exists
        let ctx = ValidationContext::new();
        let msg = message(validate(r#"["A", "B"]"#, r#"["B", "A"]"#, &ctx));
        assert!(
            msg.contains("expected value to be in collection [\"A\", \"B\"], but was not found"),
            "{}",
            msg
        );
    }

    #[test]
    fn test_array_length_mismatch_in_strict_mode() {
        let msg = message(validate(
            r#"["A", "B", "C"]"#,
            r#"["A", "C"]"#,
            &ValidationContext::new(),
        ));
        assert!(msg.contains("Number of entries is not equal"), "{}", msg);
    }

    #[test]
    fn test_array_of_objects_matches_greedily() {
        let ctx = ValidationContext::new().strict(false);
        let received = r#"[{"id": 1, "kind": "x"}, {"id": 2, "kind": "y"}, {"id": 3, "kind": "y"}]"#;
        let control = r#"[{"id": 1, "kind": "x"}, {"id": 3, "kind": "y"}]"#;
        assert!(validate(received, control, &ctx).is_ok());
    }

    #[test]
    fn test_ignore_placeholder_suppresses_subtree() {
        let ctx = ValidationContext::new();
        assert!(validate(
            r#"{"id": 99, "payload": {"deep": [1, 2]}}"#,
            r#"{"id": 99, "payload": "@ignore@"}"#,
            &ctx
        )
        .is_ok());
    }

    #[test]
    fn test_ignore_by_dotted_path() {
        let ctx = ValidationContext::new().ignore("Numbers.NumberItem.AreaCode");
        assert!(validate(
            r#"{"Numbers": {"NumberItem": [{"AreaCode": 612}]}}"#,
            r#"{"Numbers": {"NumberItem": [{"AreaCode": 999}]}}"#,
            &ctx
        )
        .is_ok());
    }

    #[test]
    fn test_ignore_by_short_name_matches_first_occurrence_only() {
        let ctx = ValidationContext::new().ignore("AreaCode");
        // first occurrence in document order is ignored
        assert!(validate(
            r#"{"first": {"AreaCode": 612}, "second": {"AreaCode": 20}}"#,
            r#"{"first": {"AreaCode": 999}, "second": {"AreaCode": 20}}"#,
            &ctx
        )
        .is_ok());
        // the second occurrence is still validated
        assert!(validate(
            r#"{"first": {"AreaCode": 612}, "second": {"AreaCode": 21}}"#,
            r#"{"first": {"AreaCode": 999}, "second": {"AreaCode": 20}}"#,
            &ctx
        )
        .is_err());
    }

    #[test]
    fn test_ignore_by_jsonpath_expression() {
        let ctx = ValidationContext::new().ignore("$.user.comments[*].timestamp");
        assert!(validate(
            r#"{"user": {"comments": [{"timestamp": 1}, {"timestamp": 2}]}}"#,
            r#"{"user": {"comments": [{"timestamp": 0}, {"timestamp": 0}]}}"#,
            &ctx
        )
        .is_ok());
    }

    #[test]
    fn test_invalid_jsonpath_ignore_expression_is_a_system_error() {
        let ctx = ValidationContext::new().ignore("$.a.b[");
        let result = validate(r#"{"a": 1}"#, r#"{"a": 1}"#, &ctx);
        assert!(matches!(
            result,
            Err(Error::System(SystemError::InvalidPathExpression { .. }))
        ));
    }

    #[test]
    fn test_malformed_payload_is_a_system_error() {
        let result = validate("{not json", r#"{"a": 1}"#, &ValidationContext::new());
        assert!(matches!(
            result,
            Err(Error::System(SystemError::InvalidJson(_)))
        ));
    }

    #[test]
    fn test_round_trip_of_identical_tree() {
        let parsed: Value =
            serde_json::from_str(r#"{"a": [1, 2.5, null, true], "b": {"c": "x"}}"#).unwrap();
        let serialized = parsed.to_string();
        assert!(validate(
            &serialized,
            r#"{ "a" : [1, 2.5, null, true], "b" : {"c": "x"} }"#,
            &ValidationContext::new()
        )
        .is_ok());
    }

    #[test]
    fn test_control_payload_variables_are_resolved() {
        let ctx = ValidationContext::new().variable("name", "John");
        assert!(validate(
            r#"{"name": "John"}"#,
            r#"{"name": "${name}"}"#,
            &ctx
        )
        .is_ok());
    }
}
