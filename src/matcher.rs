//! Validation matchers: `@name('argument')@` expressions in control
//! payloads that replace literal comparison with a condition check.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::ValidationContext;
use crate::error::{Result, SystemError, ValidationError};
use crate::report;
use crate::variables::replace_dynamic_content;

static MATCHER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@([A-Za-z][A-Za-z0-9]*)(?:\((.*)\))?@$").unwrap());

/// The placeholder that unconditionally suppresses validation of a value
/// or subtree.
pub(crate) fn is_ignore_placeholder(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("@ignore@")
}

pub(crate) fn is_matcher_expression(value: &str) -> bool {
    let trimmed = value.trim();
    !is_ignore_placeholder(trimmed) && MATCHER_RE.is_match(trimmed)
}

/// Checks `actual` against the matcher expression found in the control
/// payload at `path`. Success is silent; a failed condition is reported
/// like any other mismatch.
pub(crate) fn resolve(
    path: &str,
    actual: &str,
    expression: &str,
    ctx: &ValidationContext,
) -> Result<()> {
    let trimmed = expression.trim();
    let captures = MATCHER_RE
        .captures(trimmed)
        .ok_or_else(|| SystemError::InvalidMatcherExpression(trimmed.to_string()))?;
    let name = &captures[1];
    let arguments = match captures.get(2) {
        Some(raw) => parse_arguments(raw.as_str(), ctx)?,
        None => Vec::new(),
    };

    let matched = match name.to_ascii_lowercase().as_str() {
        "equals" => {
            let control = single_argument(trimmed, &arguments)?;
            check(actual == control, path, name, control, actual)
        }
        "equalsignorecase" => {
            let control = single_argument(trimmed, &arguments)?;
            check(actual.eq_ignore_ascii_case(control), path, name, control, actual)
        }
        "contains" => {
            let control = single_argument(trimmed, &arguments)?;
            check(actual.contains(control), path, name, control, actual)
        }
        "containsignorecase" => {
            let control = single_argument(trimmed, &arguments)?;
            check(
                actual.to_ascii_lowercase().contains(&control.to_ascii_lowercase()),
                path,
                name,
                control,
                actual,
            )
        }
        "startswith" => {
            let control = single_argument(trimmed, &arguments)?;
            check(actual.starts_with(control), path, name, control, actual)
        }
        "endswith" => {
            let control = single_argument(trimmed, &arguments)?;
            check(actual.ends_with(control), path, name, control, actual)
        }
        "matches" => {
            let pattern = single_argument(trimmed, &arguments)?;
            let re = Regex::new(&format!("^(?:{})$", pattern))
                .map_err(|_| SystemError::InvalidMatcherExpression(trimmed.to_string()))?;
            check(re.is_match(actual), path, name, pattern, actual)
        }
        "isnumber" => check(
            actual.trim().parse::<f64>().is_ok(),
            path,
            name,
            "a number",
            actual,
        ),
        "empty" => check(actual.trim().is_empty(), path, name, "an empty value", actual),
        "notempty" => check(
            !actual.trim().is_empty(),
            path,
            name,
            "a non-empty value",
            actual,
        ),
        _ => return Err(SystemError::UnknownMatcher(name.to_string()).into()),
    };

    matched.map_err(Into::into)
}

fn check(
    matched: bool,
    path: &str,
    name: &str,
    control: &str,
    actual: &str,
) -> std::result::Result<(), ValidationError> {
    if matched {
        Ok(())
    } else {
        Err(report::value_mismatch(
            &format!("Validation matcher '{}' failed for entry '{}'", name, path),
            control,
            actual,
        ))
    }
}

fn single_argument<'a>(
    expression: &str,
    arguments: &'a [String],
) -> std::result::Result<&'a str, SystemError> {
    match arguments {
        [only] => Ok(only.as_str()),
        _ => Err(SystemError::InvalidMatcherExpression(expression.to_string())),
    }
}

/// Splits the argument list on commas outside single quotes, strips the
/// quotes and resolves `${name}` placeholders in each argument.
fn parse_arguments(raw: &str, ctx: &ValidationContext) -> Result<Vec<String>> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in raw.chars() {
        match c {
            '\'' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                arguments.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !arguments.is_empty() {
        arguments.push(current.trim().to_string());
    }

    arguments
        .into_iter()
        .map(|argument| {
            replace_dynamic_content(&argument, ctx.variables()).map_err(Into::into)
        })
        .collect()
}
