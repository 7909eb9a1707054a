use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SystemError;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}").unwrap());

/// Named values substituted into control payloads and matcher arguments
/// before comparison.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    map: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Substitutes every `${name}` placeholder in `input`. A placeholder with
/// no matching variable is an authoring defect, not a failed assertion.
pub fn replace_dynamic_content(input: &str, variables: &Variables) -> Result<String, SystemError> {
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for found in PLACEHOLDER_RE.find_iter(input) {
        // strip the surrounding "${" and "}"
        let name = &input[found.start() + 2..found.end() - 1];
        let value = variables
            .get(name)
            .ok_or_else(|| SystemError::UnresolvedPlaceholder(input.to_string()))?;
        out.push_str(&input[last..found.start()]);
        out.push_str(value);
        last = found.end();
    }
    out.push_str(&input[last..]);

    Ok(out)
}
