//! A path-query subset for selecting elements and attributes to ignore:
//! rooted paths (`/a/b`), descendant searches (`//b`), wildcards (`*`),
//! 1-based positional predicates (`[2]`) and a trailing attribute step
//! (`/@id`). Prefixes in a query are resolved through the namespace
//! bindings configured on the validation context.

use std::collections::HashSet;

use crate::error::SystemError;
use crate::xml::dom::{NodeId, XmlDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XpathExpression {
    steps: Vec<Step>,
    attribute: Option<AttributeTest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    index: Option<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named {
        prefix: Option<String>,
        local: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeTest {
    prefix: Option<String>,
    local: String,
}

/// Everything one expression selects in one document.
#[derive(Debug, Default)]
pub(crate) struct Selection {
    pub elements: HashSet<NodeId>,
    pub attributes: HashSet<(NodeId, String)>,
}

impl XpathExpression {
    pub(crate) fn parse(expression: &str) -> Result<Self, SystemError> {
        let invalid = |reason: &str| SystemError::InvalidPathExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        if !expression.starts_with('/') {
            return Err(invalid("not an XPath"));
        }

        let mut steps = Vec::new();
        let mut attribute = None;
        let mut rest = expression;

        while !rest.is_empty() {
            let axis = if let Some(after) = rest.strip_prefix("//") {
                rest = after;
                Axis::Descendant
            } else if let Some(after) = rest.strip_prefix('/') {
                rest = after;
                Axis::Child
            } else {
                return Err(invalid("expected '/'"));
            };

            if let Some(after) = rest.strip_prefix('@') {
                if axis == Axis::Descendant
                    || steps.is_empty()
                    || after.is_empty()
                    || !after.chars().all(is_name_char)
                {
                    return Err(invalid("malformed attribute step"));
                }
                let (prefix, local) = split_prefixed(after);
                attribute = Some(AttributeTest { prefix, local });
                rest = "";
                break;
            }

            let token_end = rest
                .find(|c: char| c == '/' || c == '[')
                .unwrap_or(rest.len());
            let token = &rest[..token_end];
            rest = &rest[token_end..];

            let test = if token == "*" {
                NameTest::Any
            } else if !token.is_empty() && token.chars().all(is_name_char) {
                let (prefix, local) = split_prefixed(token);
                NameTest::Named { prefix, local }
            } else {
                return Err(invalid("malformed step"));
            };

            let index = if let Some(after) = rest.strip_prefix('[') {
                let Some(end) = after.find(']') else {
                    return Err(invalid("unterminated position predicate"));
                };
                let position: usize = after[..end]
                    .parse()
                    .map_err(|_| invalid("position predicate is not a number"))?;
                if position == 0 {
                    return Err(invalid("positions are 1-based"));
                }
                rest = &after[end + 1..];
                Some(position)
            } else {
                None
            };

            steps.push(Step { axis, test, index });
        }

        if steps.is_empty() {
            return Err(invalid("empty expression"));
        }

        Ok(Self { steps, attribute })
    }

    pub(crate) fn select(
        &self,
        doc: &XmlDocument,
        namespaces: &[(String, String)],
    ) -> Selection {
        let mut current: Vec<NodeId> = Vec::new();

        for (position, step) in self.steps.iter().enumerate() {
            let groups: Vec<Vec<NodeId>> = if position == 0 {
                match step.axis {
                    // the first child step starts at the virtual document
                    // node, so its only candidate is the root element
                    Axis::Child => vec![vec![doc.root()]],
                    Axis::Descendant => vec![doc.elements_in_document_order()],
                }
            } else {
                current
                    .iter()
                    .map(|id| match step.axis {
                        Axis::Child => doc.child_elements(*id),
                        Axis::Descendant => descendants(doc, *id),
                    })
                    .collect()
            };

            let mut next = Vec::new();
            for group in groups {
                let matching: Vec<NodeId> = group
                    .into_iter()
                    .filter(|id| test_matches(doc, *id, &step.test, namespaces))
                    .collect();
                match step.index {
                    Some(wanted) => {
                        if let Some(id) = matching.get(wanted - 1) {
                            next.push(*id);
                        }
                    }
                    None => next.extend(matching),
                }
            }
            next.sort_unstable();
            next.dedup();
            current = next;

            if current.is_empty() {
                return Selection::default();
            }
        }

        match &self.attribute {
            None => Selection {
                elements: current.into_iter().collect(),
                attributes: HashSet::new(),
            },
            Some(test) => {
                let mut attributes = HashSet::new();
                for id in current {
                    let wanted_namespace = test
                        .prefix
                        .as_deref()
                        .and_then(|p| lookup_prefix(namespaces, p));
                    for attribute in &doc.element(id).attributes {
                        if attribute.local_name != test.local {
                            continue;
                        }
                        if test.prefix.is_some()
                            && attribute.namespace.as_deref() != wanted_namespace
                        {
                            continue;
                        }
                        attributes.insert((id, attribute.local_name.clone()));
                    }
                }
                Selection {
                    elements: HashSet::new(),
                    attributes,
                }
            }
        }
    }
}

fn descendants(doc: &XmlDocument, from: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut pending = doc.child_elements(from);
    pending.reverse();
    while let Some(id) = pending.pop() {
        out.push(id);
        let children = doc.child_elements(id);
        for child in children.into_iter().rev() {
            pending.push(child);
        }
    }
    out
}

fn test_matches(
    doc: &XmlDocument,
    id: NodeId,
    test: &NameTest,
    namespaces: &[(String, String)],
) -> bool {
    match test {
        NameTest::Any => true,
        NameTest::Named { prefix, local } => {
            let element = doc.element(id);
            if element.local_name != *local {
                return false;
            }
            match prefix {
                // unprefixed tests select by local name alone
                None => true,
                Some(prefix) => match lookup_prefix(namespaces, prefix) {
                    Some(uri) => element.namespace.as_deref() == Some(uri),
                    None => false,
                },
            }
        }
    }
}

fn lookup_prefix<'a>(namespaces: &'a [(String, String)], prefix: &str) -> Option<&'a str> {
    namespaces
        .iter()
        .find(|(declared, _)| declared == prefix)
        .map(|(_, uri)| uri.as_str())
}

fn split_prefixed(token: &str) -> (Option<String>, String) {
    match token.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, token.to_string()),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':'
}
