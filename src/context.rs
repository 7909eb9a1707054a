use crate::variables::Variables;

/// Immutable per-call validation configuration.
///
/// Built once with the consuming fluent methods and then shared by
/// reference; a validation call never mutates it, so one context can back
/// concurrent validations of independent payloads.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    strict: bool,
    ignore_expressions: Vec<String>,
    namespaces: Vec<(String, String)>,
    variables: Variables,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self {
            strict: true,
            ignore_expressions: Vec::new(),
            namespaces: Vec::new(),
            variables: Variables::new(),
        }
    }

    /// In strict mode entry, attribute and child-element counts must match
    /// exactly; in lenient mode the received payload may carry extras.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add an ignore expression: a full dotted path, a short node name, or
    /// a path query (JSONPath for JSON payloads, XPath for XML payloads).
    pub fn ignore(mut self, expression: impl Into<String>) -> Self {
        self.ignore_expressions.push(expression.into());
        self
    }

    /// Declare an expected namespace binding. The declaration order is kept.
    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push((prefix.into(), uri.into()));
        self
    }

    /// Bind a variable for `${name}` substitution in control payloads and
    /// matcher arguments.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.set(name, value);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn ignore_expressions(&self) -> &[String] {
        &self.ignore_expressions
    }

    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new()
    }
}
