//! Validation of a received XML payload against a control payload.
//!
//! The two DOM trees are walked in lock-step. Child elements are compared
//! strictly by position, attributes by name and namespace regardless of
//! order. Comments never take part in the comparison and processing
//! instructions are logged and skipped.

mod dom;
mod xpath;

use std::collections::HashMap;

use crate::context::ValidationContext;
use crate::error::{Result, SystemError};
use crate::matcher;
use crate::report;
use crate::variables::replace_dynamic_content;

use dom::{ElementData, NodeId, XmlAttribute, XmlDocument, XmlNode};
use xpath::{Selection, XpathExpression};

/// Validates `received` against `control` under the given context.
///
/// When the context declares expected namespaces, the declarations on the
/// received root element are validated up front. Dynamic content in the
/// control payload is resolved before parsing.
pub fn validate(received: &str, control: &str, ctx: &ValidationContext) -> Result<()> {
    tracing::debug!("validating XML payload");

    let control = replace_dynamic_content(control, ctx.variables())?;
    let actual = XmlDocument::parse(received)?;
    let expected = XmlDocument::parse(&control)?;

    if !ctx.namespaces().is_empty() {
        validate_namespace_declarations(ctx.namespaces(), &actual)?;
    }
    validate_doctype(&actual, &expected)?;

    let resolver = IgnoreResolver::new(ctx.ignore_expressions(), &expected, ctx.namespaces())?;
    validate_element(&actual, actual.root(), &expected, expected.root(), &resolver, ctx)
}

/// Validates the namespace declarations on the received root element
/// against the full expected set: same count, same prefixes, same URIs.
/// Extra declarations are as much a failure as missing ones.
pub fn validate_namespaces(expected: &[(String, String)], received: &str) -> Result<()> {
    let doc = XmlDocument::parse(received)?;
    validate_namespace_declarations(expected, &doc)
}

/// Validates header fragments positionally: the counts must be equal and
/// each pair is compared with the full tree algorithm.
pub fn validate_header_fragments(
    received: &[String],
    control: &[String],
    ctx: &ValidationContext,
) -> Result<()> {
    if received.len() != control.len() {
        return Err(report::failure(format!(
            "Number of header fragments not equal, found {} expected {}",
            received.len(),
            control.len()
        ))
        .into());
    }
    for (received, control) in received.iter().zip(control.iter()) {
        validate(received, control, ctx)?;
    }
    Ok(())
}

fn validate_namespace_declarations(
    expected: &[(String, String)],
    doc: &XmlDocument,
) -> Result<()> {
    tracing::debug!("validating namespace declarations");

    let root = doc.element(doc.root());
    let found = &root.namespace_declarations;
    if found.len() != expected.len() {
        return Err(report::failure(format!(
            "Number of namespace declarations not equal for node '{}', found {} expected {}",
            root.qualified_name(),
            found.len(),
            expected.len()
        ))
        .into());
    }

    for (prefix, uri) in expected {
        let declared = found.iter().find(|(declared, _)| match declared {
            Some(declared) => declared == prefix,
            None => prefix.is_empty(),
        });
        match declared {
            Some((_, declared_uri)) if declared_uri == uri => {}
            Some((_, declared_uri)) => {
                return Err(report::value_mismatch(
                    &format!(
                        "Namespace '{}' values not equal for node '{}'",
                        prefix,
                        root.qualified_name()
                    ),
                    uri,
                    declared_uri,
                )
                .into());
            }
            None => {
                return Err(report::failure(format!(
                    "Missing namespace '{}({})' for node '{}'",
                    prefix,
                    uri,
                    root.qualified_name()
                ))
                .into());
            }
        }
    }

    Ok(())
}

fn validate_doctype(actual: &XmlDocument, expected: &XmlDocument) -> Result<()> {
    match (&actual.doctype, &expected.doctype) {
        (None, None) => Ok(()),
        (Some(actual), None) => Err(report::failure(format!(
            "Document type declaration '{}' not expected",
            actual.name
        ))
        .into()),
        (None, Some(expected)) => Err(report::failure(format!(
            "Document type declaration '{}' is missing",
            expected.name
        ))
        .into()),
        (Some(actual), Some(expected)) => {
            validate_doctype_id("public", actual.public_id.as_deref(), expected.public_id.as_deref())?;
            validate_doctype_id("system", actual.system_id.as_deref(), expected.system_id.as_deref())
        }
    }
}

fn validate_doctype_id(kind: &str, actual: Option<&str>, expected: Option<&str>) -> Result<()> {
    let base = format!("Document type {} identifier not equal", kind);
    match expected {
        Some(expected) if matcher::is_ignore_placeholder(expected) => Ok(()),
        Some(expected) => match actual {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(report::value_mismatch(&base, expected, actual).into()),
            None => Err(report::value_mismatch(&base, expected, "none").into()),
        },
        None => match actual {
            None => Ok(()),
            Some(actual) => Err(report::value_mismatch(&base, "none", actual).into()),
        },
    }
}

fn validate_element(
    adoc: &XmlDocument,
    aid: NodeId,
    edoc: &XmlDocument,
    eid: NodeId,
    resolver: &IgnoreResolver<'_>,
    ctx: &ValidationContext,
) -> Result<()> {
    let actual = adoc.element(aid);
    let expected = edoc.element(eid);
    let entry = edoc.dotted_path(eid);

    if actual.local_name != expected.local_name {
        return Err(report::value_mismatch(
            &format!("Element names not equal for entry '{}'", entry),
            &expected.local_name,
            &actual.local_name,
        )
        .into());
    }

    if actual.namespace != expected.namespace {
        return Err(report::value_mismatch(
            &format!("Element namespaces not equal for entry '{}'", entry),
            expected.namespace.as_deref().unwrap_or("none"),
            actual.namespace.as_deref().unwrap_or("none"),
        )
        .into());
    }

    if resolver.is_ignored(eid) {
        tracing::trace!(entry = %entry, "element ignored");
        return Ok(());
    }

    validate_attributes(actual, adoc, aid, expected, edoc, eid, &entry, resolver, ctx)?;

    let expected_text = edoc.text(eid);
    if matcher::is_ignore_placeholder(&expected_text) {
        return Ok(());
    }
    if matcher::is_matcher_expression(&expected_text) {
        return matcher::resolve(&entry, &adoc.text(aid), &expected_text, ctx);
    }
    let actual_text = adoc.text(aid);
    if actual_text != expected_text {
        return Err(report::value_mismatch(
            &format!("Node value not equal for entry '{}'", entry),
            &expected_text,
            &actual_text,
        )
        .into());
    }

    for child in &actual.children {
        if let XmlNode::ProcessingInstruction(instruction) = adoc.node(*child) {
            tracing::debug!(instruction = %instruction, "skipping processing instruction");
        }
    }

    let actual_children = adoc.child_elements(aid);
    let expected_children = edoc.child_elements(eid);
    if actual_children.len() != expected_children.len()
        && (ctx.is_strict() || actual_children.len() < expected_children.len())
    {
        return Err(report::value_mismatch(
            &format!("Number of child elements not equal for entry '{}'", entry),
            expected_children.len(),
            actual_children.len(),
        )
        .into());
    }

    for (actual_child, expected_child) in actual_children.iter().zip(expected_children.iter()) {
        validate_element(adoc, *actual_child, edoc, *expected_child, resolver, ctx)?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn validate_attributes(
    actual: &ElementData,
    adoc: &XmlDocument,
    aid: NodeId,
    expected: &ElementData,
    edoc: &XmlDocument,
    eid: NodeId,
    entry: &str,
    resolver: &IgnoreResolver<'_>,
    ctx: &ValidationContext,
) -> Result<()> {
    if ctx.is_strict() {
        if actual.attributes.len() != expected.attributes.len() {
            return Err(report::value_mismatch(
                &format!("Number of attributes not equal for entry '{}'", entry),
                expected.attributes.len(),
                actual.attributes.len(),
            )
            .into());
        }
        for actual_attribute in &actual.attributes {
            let Some(expected_attribute) = expected.attribute(
                &actual_attribute.local_name,
                actual_attribute.namespace.as_deref(),
            ) else {
                return Err(report::failure(format!(
                    "Attribute '{}' not expected for entry '{}'",
                    actual_attribute.qualified_name(),
                    entry
                ))
                .into());
            };
            validate_attribute_value(
                adoc, aid, actual_attribute, edoc, eid, expected_attribute, entry, resolver, ctx,
            )?;
        }
    } else {
        for expected_attribute in &expected.attributes {
            let Some(actual_attribute) = actual.attribute(
                &expected_attribute.local_name,
                expected_attribute.namespace.as_deref(),
            ) else {
                return Err(report::failure(format!(
                    "Missing attribute '{}' for entry '{}'",
                    expected_attribute.qualified_name(),
                    entry
                ))
                .into());
            };
            validate_attribute_value(
                adoc, aid, actual_attribute, edoc, eid, expected_attribute, entry, resolver, ctx,
            )?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn validate_attribute_value(
    adoc: &XmlDocument,
    aid: NodeId,
    actual: &XmlAttribute,
    edoc: &XmlDocument,
    eid: NodeId,
    expected: &XmlAttribute,
    entry: &str,
    resolver: &IgnoreResolver<'_>,
    ctx: &ValidationContext,
) -> Result<()> {
    if matcher::is_ignore_placeholder(&expected.value) {
        return Ok(());
    }
    if resolver.is_attribute_ignored(eid, &expected.local_name) {
        tracing::trace!(entry = %entry, attribute = %expected.local_name, "attribute ignored");
        return Ok(());
    }
    if matcher::is_matcher_expression(&expected.value) {
        return matcher::resolve(
            &format!("{}@{}", entry, expected.qualified_name()),
            &actual.value,
            &expected.value,
            ctx,
        );
    }

    // values like "ns:Foo" compare by resolved namespace, not by prefix
    if let (Some((actual_prefix, actual_local)), Some((expected_prefix, expected_local))) =
        (actual.value.split_once(':'), expected.value.split_once(':'))
    {
        if let Some(actual_uri) = adoc.resolve_prefix(aid, actual_prefix) {
            let Some(expected_uri) = edoc.resolve_prefix(eid, expected_prefix) else {
                return Err(report::failure(format!(
                    "Attribute '{}' value '{}' carries a namespace prefix but the control value '{}' does not resolve to one, for entry '{}'",
                    expected.qualified_name(),
                    actual.value,
                    expected.value,
                    entry
                ))
                .into());
            };
            if actual_uri != expected_uri {
                return Err(report::value_mismatch(
                    &format!(
                        "Attribute '{}' value namespaces not equal for entry '{}'",
                        expected.qualified_name(),
                        entry
                    ),
                    expected_uri,
                    actual_uri,
                )
                .into());
            }
            if actual_local != expected_local {
                return Err(report::value_mismatch(
                    &format!(
                        "Attribute '{}' values not equal for entry '{}'",
                        expected.qualified_name(),
                        entry
                    ),
                    expected_local,
                    actual_local,
                )
                .into());
            }
            return Ok(());
        }
        // an unresolvable received prefix falls back to the literal comparison
    }

    if actual.value != expected.value {
        return Err(report::value_mismatch(
            &format!(
                "Attribute '{}' values not equal for entry '{}'",
                expected.qualified_name(),
                entry
            ),
            &expected.value,
            &actual.value,
        )
        .into());
    }

    Ok(())
}

/// Decides whether a control element or attribute is excluded from
/// validation: exact dotted path, short element name (first occurrence in
/// document order) or XPath selection, first match wins.
struct IgnoreResolver<'a> {
    doc: &'a XmlDocument,
    dotted: Vec<&'a str>,
    short_first: HashMap<&'a str, Option<NodeId>>,
    selection: Selection,
}

impl<'a> IgnoreResolver<'a> {
    fn new(
        expressions: &'a [String],
        control: &'a XmlDocument,
        namespaces: &[(String, String)],
    ) -> std::result::Result<Self, SystemError> {
        let mut dotted = Vec::new();
        let mut short_first = HashMap::new();
        let mut selection = Selection::default();

        for expression in expressions {
            if expression.starts_with('/') {
                let selected = XpathExpression::parse(expression)?.select(control, namespaces);
                selection.elements.extend(selected.elements);
                selection.attributes.extend(selected.attributes);
            } else {
                dotted.push(expression.as_str());
                if !expression.contains('.') {
                    short_first.insert(expression.as_str(), control.find_first_named(expression));
                }
            }
        }

        Ok(Self {
            doc: control,
            dotted,
            short_first,
            selection,
        })
    }

    fn is_ignored(&self, id: NodeId) -> bool {
        if !self.dotted.is_empty() {
            let dotted_path = self.doc.dotted_path(id);
            if self.dotted.iter().any(|e| *e == dotted_path) {
                return true;
            }
            let local_name = &self.doc.element(id).local_name;
            if let Some(Some(first)) = self.short_first.get(local_name.as_str()) {
                if *first == id {
                    return true;
                }
            }
        }
        self.selection.elements.contains(&id)
    }

    fn is_attribute_ignored(&self, id: NodeId, local_name: &str) -> bool {
        self.selection
            .attributes
            .contains(&(id, local_name.to_string()))
    }
}
