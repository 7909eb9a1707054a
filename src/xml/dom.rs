//! A small in-memory DOM built from quick-xml events.
//!
//! The validation walk needs node identity, parent links, per-element
//! namespace declaration lists and doctype identifiers, none of which a
//! streaming reader exposes, so the events are materialized into an arena
//! of nodes addressed by index.

use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use crate::error::SystemError;

/// Implicit binding of the reserved `xml` prefix.
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

static DOCTYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)^\s*(?P<name>[^\s\[>]+)\s*(?:PUBLIC\s+["'](?P<public>[^"']*)["']\s+["'](?P<public_system>[^"']*)["']|SYSTEM\s+["'](?P<system>[^"']*)["'])?"#,
    )
    .unwrap()
});

pub(crate) type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Doctype {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlAttribute {
    pub prefix: Option<String>,
    pub local_name: String,
    /// Resolved namespace URI; unprefixed attributes carry none.
    pub namespace: Option<String>,
    pub value: String,
}

impl XmlAttribute {
    pub(crate) fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementData {
    pub prefix: Option<String>,
    pub local_name: String,
    /// Resolved namespace URI of the element itself.
    pub namespace: Option<String>,
    /// Regular attributes in document order; `xmlns` attributes are kept
    /// separately as namespace declarations.
    pub attributes: Vec<XmlAttribute>,
    /// Declarations made on this element; a `None` prefix is the default
    /// namespace.
    pub namespace_declarations: Vec<(Option<String>, String)>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl ElementData {
    pub(crate) fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }

    pub(crate) fn attribute(&self, local_name: &str, namespace: Option<&str>) -> Option<&XmlAttribute> {
        self.attributes
            .iter()
            .find(|a| a.local_name == local_name && a.namespace.as_deref() == namespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum XmlNode {
    Element(ElementData),
    Text(String),
    Comment(String),
    ProcessingInstruction(String),
}

#[derive(Debug, Clone)]
pub(crate) struct XmlDocument {
    pub doctype: Option<Doctype>,
    nodes: Vec<XmlNode>,
    root: NodeId,
}

impl XmlDocument {
    pub(crate) fn parse(xml: &str) -> Result<Self, SystemError> {
        let mut reader = Reader::from_str(xml);
        let mut nodes: Vec<XmlNode> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut doctype = None;
        let mut root = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| SystemError::InvalidXml(e.to_string()))?;
            match event {
                Event::Eof => break,
                Event::Decl(_) => {}
                Event::DocType(text) => {
                    let raw = String::from_utf8_lossy(&text).to_string();
                    doctype = Some(parse_doctype(&raw)?);
                }
                Event::Start(start) => {
                    let id = begin_element(&mut nodes, &stack, &mut root, &start)?;
                    stack.push(id);
                }
                Event::Empty(start) => {
                    begin_element(&mut nodes, &stack, &mut root, &start)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|e| SystemError::InvalidXml(e.to_string()))?
                        .to_string();
                    if !value.trim().is_empty() {
                        append_child(&mut nodes, &stack, XmlNode::Text(value));
                    }
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data).to_string();
                    if !value.trim().is_empty() {
                        append_child(&mut nodes, &stack, XmlNode::Text(value));
                    }
                }
                Event::Comment(text) => {
                    let value = String::from_utf8_lossy(&text).to_string();
                    append_child(&mut nodes, &stack, XmlNode::Comment(value));
                }
                Event::PI(content) => {
                    let value = String::from_utf8_lossy(&content).to_string();
                    append_child(&mut nodes, &stack, XmlNode::ProcessingInstruction(value));
                }
                _ => {}
            }
        }

        let root = root.ok_or_else(|| SystemError::InvalidXml("missing root element".to_string()))?;

        Ok(Self {
            doctype,
            nodes,
            root,
        })
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn node(&self, id: NodeId) -> &XmlNode {
        &self.nodes[id]
    }

    pub(crate) fn element(&self, id: NodeId) -> &ElementData {
        match &self.nodes[id] {
            XmlNode::Element(element) => element,
            other => unreachable!("node {} is not an element: {:?}", id, other),
        }
    }

    /// Resolves a namespace prefix through the declarations in scope at
    /// `id`, from the element itself up to the root.
    pub(crate) fn resolve_prefix(&self, id: NodeId, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        let mut current = Some(id);
        while let Some(node) = current {
            let element = self.element(node);
            for (declared, uri) in element.namespace_declarations.iter().rev() {
                if declared.as_deref() == Some(prefix) {
                    return Some(uri);
                }
            }
            current = element.parent;
        }
        None
    }

    /// Direct text content of an element: the concatenated text children,
    /// trimmed. Text inside child elements does not contribute.
    pub(crate) fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in &self.element(id).children {
            if let XmlNode::Text(text) = &self.nodes[*child] {
                out.push_str(text);
            }
        }
        out.trim().to_string()
    }

    /// Child element ids in document order; text, comments and processing
    /// instructions are not included.
    pub(crate) fn child_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.element(id)
            .children
            .iter()
            .copied()
            .filter(|child| matches!(self.nodes[*child], XmlNode::Element(_)))
            .collect()
    }

    /// Every element id, depth-first in document order.
    pub(crate) fn elements_in_document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            out.push(id);
            let children = self.child_elements(id);
            for child in children.into_iter().rev() {
                pending.push(child);
            }
        }
        out
    }

    /// Element local names from the root down to `id`, joined with dots.
    pub(crate) fn dotted_path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let element = self.element(node);
            names.push(element.local_name.as_str());
            current = element.parent;
        }
        names.reverse();
        names.join(".")
    }

    /// The first element in document order bearing the given local name.
    pub(crate) fn find_first_named(&self, local_name: &str) -> Option<NodeId> {
        self.elements_in_document_order()
            .into_iter()
            .find(|id| self.element(*id).local_name == local_name)
    }
}

fn append_child(nodes: &mut Vec<XmlNode>, stack: &[NodeId], node: XmlNode) {
    let Some(parent) = stack.last().copied() else {
        // content outside the root element carries no validation meaning
        return;
    };
    let id = nodes.len();
    nodes.push(node);
    if let XmlNode::Element(element) = &mut nodes[parent] {
        element.children.push(id);
    }
}

fn begin_element(
    nodes: &mut Vec<XmlNode>,
    stack: &[NodeId],
    root: &mut Option<NodeId>,
    start: &BytesStart,
) -> Result<NodeId, SystemError> {
    let raw_name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let (prefix, local_name) = split_qname(&raw_name);

    let mut raw_attributes = Vec::new();
    let mut declarations = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| SystemError::InvalidXml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| SystemError::InvalidXml(e.to_string()))?
            .to_string();
        if key == "xmlns" {
            declarations.push((None, value));
        } else if let Some(declared) = key.strip_prefix("xmlns:") {
            declarations.push((Some(declared.to_string()), value));
        } else {
            let (attribute_prefix, attribute_local) = split_qname(&key);
            raw_attributes.push((attribute_prefix, attribute_local, value));
        }
    }

    let parent = stack.last().copied();
    if parent.is_none() && root.is_some() {
        return Err(SystemError::InvalidXml(
            "multiple root elements".to_string(),
        ));
    }

    let id = nodes.len();
    nodes.push(XmlNode::Element(ElementData {
        prefix: prefix.clone(),
        local_name,
        namespace: None,
        attributes: Vec::new(),
        namespace_declarations: declarations,
        children: Vec::new(),
        parent,
    }));
    match parent {
        Some(parent) => {
            if let XmlNode::Element(element) = &mut nodes[parent] {
                element.children.push(id);
            }
        }
        None => *root = Some(id),
    }

    // resolution needs the declarations and the parent chain in place first
    let namespace = match &prefix {
        Some(p) => resolve_prefix_in(nodes, id, p).map(str::to_string),
        None => default_namespace_in(nodes, id).map(str::to_string),
    };
    let attributes = raw_attributes
        .into_iter()
        .map(|(attribute_prefix, attribute_local, value)| {
            let namespace = attribute_prefix
                .as_deref()
                .and_then(|p| resolve_prefix_in(nodes, id, p))
                .map(str::to_string);
            XmlAttribute {
                prefix: attribute_prefix,
                local_name: attribute_local,
                namespace,
                value,
            }
        })
        .collect::<Vec<_>>();

    if let XmlNode::Element(element) = &mut nodes[id] {
        element.namespace = namespace;
        element.attributes = attributes;
    }

    Ok(id)
}

fn resolve_prefix_in<'n>(nodes: &'n [XmlNode], from: NodeId, prefix: &str) -> Option<&'n str> {
    if prefix == "xml" {
        return Some(XML_NAMESPACE);
    }
    let mut current = Some(from);
    while let Some(id) = current {
        let XmlNode::Element(element) = &nodes[id] else {
            return None;
        };
        for (declared, uri) in element.namespace_declarations.iter().rev() {
            if declared.as_deref() == Some(prefix) {
                return Some(uri);
            }
        }
        current = element.parent;
    }
    None
}

fn default_namespace_in<'n>(nodes: &'n [XmlNode], from: NodeId) -> Option<&'n str> {
    let mut current = Some(from);
    while let Some(id) = current {
        let XmlNode::Element(element) = &nodes[id] else {
            return None;
        };
        for (declared, uri) in element.namespace_declarations.iter().rev() {
            if declared.is_none() {
                if uri.is_empty() {
                    return None;
                }
                return Some(uri);
            }
        }
        current = element.parent;
    }
    None
}

fn split_qname(raw: &str) -> (Option<String>, String) {
    match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw.to_string()),
    }
}

fn parse_doctype(raw: &str) -> Result<Doctype, SystemError> {
    let captures = DOCTYPE_RE
        .captures(raw)
        .ok_or_else(|| SystemError::InvalidXml(format!("malformed doctype '{}'", raw)))?;
    let name = captures
        .name("name")
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SystemError::InvalidXml(format!("malformed doctype '{}'", raw)))?;

    let (public_id, system_id) = match (captures.name("public"), captures.name("public_system")) {
        (Some(public), Some(system)) => (
            Some(public.as_str().to_string()),
            Some(system.as_str().to_string()),
        ),
        _ => (
            None,
            captures.name("system").map(|m| m.as_str().to_string()),
        ),
    };

    Ok(Doctype {
        name,
        public_id,
        system_id,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_basic_tree() {
        let doc = XmlDocument::parse("<a><b>text</b><c attr=\"v\"/></a>").unwrap();
        let root = doc.element(doc.root());
        assert_eq!(root.local_name, "a");

        let children = doc.child_elements(doc.root());
        assert_eq!(children.len(), 2);
        assert_eq!(doc.element(children[0]).local_name, "b");
        assert_eq!(doc.text(children[0]), "text");
        assert_eq!(doc.element(children[1]).attributes.len(), 1);
        assert_eq!(doc.element(children[1]).attributes[0].value, "v");
    }

    #[test]
    fn test_namespace_resolution() {
        let doc = XmlDocument::parse(
            "<a xmlns=\"urn:default\" xmlns:ns1=\"urn:one\"><ns1:b/><c/></a>",
        )
        .unwrap();
        let root = doc.element(doc.root());
        assert_eq!(root.namespace.as_deref(), Some("urn:default"));
        assert_eq!(root.namespace_declarations.len(), 2);

        let children = doc.child_elements(doc.root());
        assert_eq!(doc.element(children[0]).namespace.as_deref(), Some("urn:one"));
        assert_eq!(
            doc.element(children[1]).namespace.as_deref(),
            Some("urn:default")
        );
    }

    #[test]
    fn test_unprefixed_attributes_have_no_namespace() {
        let doc = XmlDocument::parse(
            "<a xmlns=\"urn:default\" xmlns:ns1=\"urn:one\" plain=\"1\" ns1:scoped=\"2\"/>",
        )
        .unwrap();
        let root = doc.element(doc.root());
        assert_eq!(root.attributes.len(), 2);
        assert_eq!(root.attributes[0].namespace, None);
        assert_eq!(root.attributes[1].namespace.as_deref(), Some("urn:one"));
    }

    #[test]
    fn test_dotted_path_and_first_named() {
        let doc = XmlDocument::parse(
            "<Numbers><NumberItem><AreaCode>612</AreaCode></NumberItem><AreaCode>20</AreaCode></Numbers>",
        )
        .unwrap();
        let first = doc.find_first_named("AreaCode").unwrap();
        assert_eq!(doc.dotted_path(first), "Numbers.NumberItem.AreaCode");
    }

    #[test]
    fn test_doctype_parsing() {
        let doc = XmlDocument::parse(
            "<!DOCTYPE note PUBLIC \"-//OASIS//DTD DocBook\" \"http://docbook.org/docbook.dtd\"><note/>",
        )
        .unwrap();
        let doctype = doc.doctype.unwrap();
        assert_eq!(doctype.name, "note");
        assert_eq!(doctype.public_id.as_deref(), Some("-//OASIS//DTD DocBook"));
        assert_eq!(
            doctype.system_id.as_deref(),
            Some("http://docbook.org/docbook.dtd")
        );

        let doc = XmlDocument::parse("<!DOCTYPE note SYSTEM \"note.dtd\"><note/>").unwrap();
        let doctype = doc.doctype.unwrap();
        assert_eq!(doctype.public_id, None);
        assert_eq!(doctype.system_id.as_deref(), Some("note.dtd"));
    }

    #[test]
    fn test_comments_and_processing_instructions_are_kept_apart() {
        let doc = XmlDocument::parse("<a><!-- note --><?pi data?><b/></a>").unwrap();
        assert_eq!(doc.child_elements(doc.root()).len(), 1);
        let children = &doc.element(doc.root()).children;
        assert_eq!(children.len(), 3);
        assert!(matches!(doc.node(children[0]), XmlNode::Comment(_)));
        assert!(matches!(
            doc.node(children[1]),
            XmlNode::ProcessingInstruction(_)
        ));
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("no xml here").is_err());
    }
}
