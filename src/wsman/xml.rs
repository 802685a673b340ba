//! Namespace-aware XML element tree.
//!
//! WS-Management responses are small, so they are read into a fully owned tree
//! and queried by `(namespace, local name)`. Outgoing envelopes are built as the
//! same tree and serialized with generated prefixes.

use std::collections::HashMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Writer};
use thiserror::Error;

use super::{NS_SOAP, NS_WSA, NS_WSMAN};

/// Errors raised while reading or writing XML.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// The input is not well-formed XML.
    #[error("malformed XML: {0}")]
    Parse(String),

    /// The input uses a prefix that was never declared.
    #[error("undeclared namespace prefix '{0}'")]
    UnknownPrefix(String),

    /// The input held no root element.
    #[error("document has no root element")]
    NoRoot,

    /// Serialization failed.
    #[error("failed to write XML: {0}")]
    Write(String),
}

/// An attribute on an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Namespace URI, `None` for unqualified attributes
    pub namespace: Option<String>,
    /// Local name
    pub name: String,
    /// Unescaped value
    pub value: String,
}

/// A node of the XML tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Namespace URI, `None` for unqualified elements
    pub namespace: Option<String>,
    /// Local name
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<Attribute>,
    /// Text content directly inside this element
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element in `namespace`.
    pub fn new(namespace: &str, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Create a leaf element holding `text`.
    pub fn leaf(namespace: &str, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(namespace, name).with_text(text)
    }

    /// Set the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add an unqualified attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            namespace: None,
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a namespace-qualified attribute.
    pub fn with_ns_attribute(
        mut self,
        namespace: &str,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.push(Attribute {
            namespace: Some(namespace.to_string()),
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Whether this element has the given namespace and local name.
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Depth-first, document-order search of this element and its descendants.
    pub fn find_first(&self, namespace: &str, name: &str) -> Option<&Element> {
        if self.is(namespace, name) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_first(namespace, name))
    }

    /// First direct child with the given name.
    pub fn child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(namespace, name))
    }

    /// Value of the first attribute with the given local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Direct text, trimmed.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim)
    }

    /// All text below this element, trimmed and joined with single spaces.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        if let Some(text) = self.text() {
            if !text.is_empty() {
                parts.push(text);
            }
        }
        for child in &self.children {
            child.collect_text(parts);
        }
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, XmlError> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (resolved, event) = reader
                .read_resolved_event()
                .map_err(|e| XmlError::Parse(e.to_string()))?;
            let namespace = owned_namespace(resolved)?;

            match event {
                Event::Start(ref e) => {
                    let element = open_element(&reader, namespace, e)?;
                    stack.push(element);
                }
                Event::Empty(ref e) => {
                    let element = open_element(&reader, namespace, e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Parse("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(ref e) => {
                    let text = e.unescape().map_err(|e| XmlError::Parse(e.to_string()))?;
                    append_text(&mut stack, &text);
                }
                Event::CData(ref e) => {
                    append_text(&mut stack, &String::from_utf8_lossy(e));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Parse("unexpected end of document".to_string()));
        }
        root.ok_or(XmlError::NoRoot)
    }

    /// Serialize as a standalone document with an XML declaration.
    ///
    /// Every namespace used in the tree is declared on the root element. The
    /// SOAP, WS-Addressing and WS-Management namespaces get their conventional
    /// `s`, `a` and `w` prefixes; any other namespace is numbered `n0`, `n1`, ...
    pub fn to_xml(&self) -> Result<String, XmlError> {
        let prefixes = self.prefix_map();
        let mut writer = Writer::new(Vec::new());

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        self.write_into(&mut writer, &prefixes, true)?;

        String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
    }

    fn prefix_map(&self) -> Vec<(String, String)> {
        let mut namespaces: Vec<String> = Vec::new();
        self.collect_namespaces(&mut namespaces);

        let mut next = 0;
        namespaces
            .into_iter()
            .map(|ns| {
                let prefix = match ns.as_str() {
                    NS_SOAP => "s".to_string(),
                    NS_WSA => "a".to_string(),
                    NS_WSMAN => "w".to_string(),
                    _ => {
                        let prefix = format!("n{}", next);
                        next += 1;
                        prefix
                    }
                };
                (ns, prefix)
            })
            .collect()
    }

    fn collect_namespaces(&self, out: &mut Vec<String>) {
        let attribute_namespaces = self.attributes.iter().filter_map(|a| a.namespace.as_ref());
        for ns in self.namespace.iter().chain(attribute_namespaces) {
            if !out.contains(ns) {
                out.push(ns.clone());
            }
        }
        for child in &self.children {
            child.collect_namespaces(out);
        }
    }

    fn write_into(
        &self,
        writer: &mut Writer<Vec<u8>>,
        prefixes: &[(String, String)],
        is_root: bool,
    ) -> Result<(), XmlError> {
        let lookup: HashMap<&str, &str> = prefixes
            .iter()
            .map(|(ns, prefix)| (ns.as_str(), prefix.as_str()))
            .collect();
        let qualify = |namespace: &Option<String>, name: &str| match namespace
            .as_deref()
            .and_then(|ns| lookup.get(ns))
        {
            Some(prefix) => format!("{}:{}", prefix, name),
            None => name.to_string(),
        };

        let tag = qualify(&self.namespace, &self.name);
        let mut start = BytesStart::new(tag.as_str());
        if is_root {
            for (ns, prefix) in prefixes {
                let key = format!("xmlns:{}", prefix);
                start.push_attribute((key.as_str(), ns.as_str()));
            }
        }
        for attr in &self.attributes {
            let key = qualify(&attr.namespace, &attr.name);
            start.push_attribute((key.as_str(), attr.value.as_str()));
        }

        if self.text.is_none() && self.children.is_empty() {
            return writer
                .write_event(Event::Empty(start))
                .map_err(|e| XmlError::Write(e.to_string()));
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        if let Some(text) = &self.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| XmlError::Write(e.to_string()))?;
        }
        for child in &self.children {
            child.write_into(writer, prefixes, false)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(tag.as_str())))
            .map_err(|e| XmlError::Write(e.to_string()))
    }
}

fn owned_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>, XmlError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(XmlError::UnknownPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn open_element<R>(
    reader: &NsReader<R>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> Result<Element, XmlError> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = owned_namespace(resolved)?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?;
        attributes.push(Attribute {
            namespace,
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            value: value.into_owned(),
        });
    }

    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        text: None,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => {
            return Err(XmlError::Parse("multiple root elements".to_string()));
        }
        None => *root = Some(element),
    }
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
}
