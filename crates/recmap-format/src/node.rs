//! XML record tree.
//!
//! A record in an XML stream is one element subtree. The external reader
//! hands the engine an [`XmlNode`]; marshalling produces one wrapped in an
//! [`XmlDocument`].

use serde::{Deserialize, Serialize};

/// An element in an XML record tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlNode {
    /// Local element name
    pub name: String,

    /// Namespace URI, if any
    pub namespace: Option<String>,

    /// Preferred prefix for the namespace (default namespace when `None`)
    pub prefix: Option<String>,

    /// Attributes in document order
    pub attributes: Vec<XmlAttribute>,

    /// Child elements in document order
    pub children: Vec<XmlNode>,

    /// Character content
    pub text: Option<String>,
}

/// An attribute on an [`XmlNode`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlAttribute {
    pub name: String,
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub value: String,
}

/// Where a field lives relative to its record element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XmlKind {
    /// Child element holding the text
    #[default]
    Element,
    /// Attribute of the record element
    Attribute,
    /// Character content of the record element
    Text,
}

/// XML binding of a record or field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlBinding {
    #[serde(default)]
    pub kind: XmlKind,
    /// Local name (defaults to the record or field name)
    #[serde(default)]
    pub name: Option<String>,
    /// Namespace URI; `None` matches any namespace when reading
    #[serde(default)]
    pub namespace: Option<String>,
    /// Prefix used when writing a namespaced node
    #[serde(default)]
    pub prefix: Option<String>,
}

impl XmlBinding {
    /// Bind to a child element
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            kind: XmlKind::Element,
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Bind to an attribute
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            kind: XmlKind::Attribute,
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Bind to the element's character content
    pub fn text() -> Self {
        Self {
            kind: XmlKind::Text,
            ..Self::default()
        }
    }

    /// Set namespace and prefix
    pub fn in_namespace(mut self, namespace: impl Into<String>, prefix: Option<&str>) -> Self {
        self.namespace = Some(namespace.into());
        self.prefix = prefix.map(str::to_string);
        self
    }

    /// The local name, falling back to `default`
    pub fn local_name<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }

    /// Whether a node with this namespace and name matches the binding
    pub fn matches(&self, default_name: &str, namespace: Option<&str>, name: &str) -> bool {
        name == self.local_name(default_name)
            && self
                .namespace
                .as_deref()
                .is_none_or(|expected| namespace == Some(expected))
    }
}

impl XmlNode {
    /// Create an element without namespace
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set namespace and prefix
    pub fn in_namespace(mut self, namespace: impl Into<String>, prefix: Option<&str>) -> Self {
        self.namespace = Some(namespace.into());
        self.prefix = prefix.map(str::to_string);
        self
    }

    /// Set character content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add an unqualified attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(XmlAttribute {
            name: name.into(),
            namespace: None,
            prefix: None,
            value: value.into(),
        });
        self
    }

    /// Add a child element
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add a child element
    pub fn add_child(&mut self, child: XmlNode) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Set (or replace) an attribute.
    ///
    /// Unprefixed attributes never take a default namespace, so a namespaced
    /// attribute without a prefix is given one: the element's own prefix for
    /// that namespace, one already used by a sibling attribute, or `ns0`,
    /// `ns1`, ... otherwise.
    pub fn set_attribute(&mut self, mut attribute: XmlAttribute) -> &mut Self {
        if let (Some(uri), None) = (attribute.namespace.as_deref(), &attribute.prefix) {
            attribute.prefix = Some(self.attribute_prefix(uri));
        }
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name == attribute.name && a.namespace == attribute.namespace)
        {
            Some(existing) => existing.value = attribute.value,
            None => self.attributes.push(attribute),
        }
        self
    }

    fn attribute_prefix(&self, uri: &str) -> String {
        if self.namespace.as_deref() == Some(uri) {
            if let Some(prefix) = &self.prefix {
                return prefix.clone();
            }
        }
        if let Some(prefix) = self
            .attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(uri))
            .and_then(|a| a.prefix.clone())
        {
            return prefix;
        }
        let taken = |candidate: &str| {
            self.prefix.as_deref() == Some(candidate)
                || self.attributes.iter().any(|a| a.prefix.as_deref() == Some(candidate))
        };
        (0..)
            .map(|n| format!("ns{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_default()
    }

    /// Find the value of an attribute matching a binding
    pub fn attribute(&self, binding: &XmlBinding, default_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| binding.matches(default_name, a.namespace.as_deref(), &a.name))
            .map(|a| a.value.as_str())
    }

    /// Find the nth child element matching a binding
    pub fn nth_child(&self, binding: &XmlBinding, default_name: &str, n: usize) -> Option<&XmlNode> {
        self.children
            .iter()
            .filter(|c| binding.matches(default_name, c.namespace.as_deref(), &c.name))
            .nth(n)
    }

    /// Find a child by local name
    pub fn find_child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Serialize the subtree as XML text
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        let mut scope = Vec::new();
        write_element(self, &mut scope, &mut out);
        out
    }
}

/// A marshalled XML record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlDocument {
    /// The record element
    pub root: XmlNode,
}

impl XmlDocument {
    /// Wrap a record element
    pub fn new(root: XmlNode) -> Self {
        Self { root }
    }

    /// Serialize the document without an XML declaration
    pub fn to_xml_string(&self) -> String {
        self.root.to_xml_string()
    }
}

impl std::fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

type Scope<'a> = Vec<(Option<&'a str>, &'a str)>;

fn lookup<'a>(scope: &Scope<'a>, prefix: Option<&str>) -> Option<&'a str> {
    scope
        .iter()
        .rev()
        .find(|(p, _)| *p == prefix)
        .map(|(_, uri)| *uri)
}

fn push_qualified(out: &mut String, prefix: Option<&str>, name: &str) {
    if let Some(prefix) = prefix {
        out.push_str(prefix);
        out.push(':');
    }
    out.push_str(name);
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn write_element<'a>(node: &'a XmlNode, scope: &mut Scope<'a>, out: &mut String) {
    let mark = scope.len();
    let mut declarations: Scope<'a> = Vec::new();

    match node.namespace.as_deref() {
        Some(uri) => {
            let prefix = node.prefix.as_deref();
            if lookup(scope, prefix) != Some(uri) {
                scope.push((prefix, uri));
                declarations.push((prefix, uri));
            }
        }
        None => {
            // an unqualified child of a default-namespaced parent resets it
            if lookup(scope, None).is_some_and(|uri| !uri.is_empty()) {
                scope.push((None, ""));
                declarations.push((None, ""));
            }
        }
    }
    for attribute in &node.attributes {
        if let (Some(uri), Some(prefix)) = (attribute.namespace.as_deref(), attribute.prefix.as_deref())
        {
            if lookup(scope, Some(prefix)) != Some(uri) {
                scope.push((Some(prefix), uri));
                declarations.push((Some(prefix), uri));
            }
        }
    }

    let element_prefix = node.namespace.as_ref().and(node.prefix.as_deref());
    out.push('<');
    push_qualified(out, element_prefix, &node.name);
    for (prefix, uri) in &declarations {
        out.push_str(" xmlns");
        if let Some(prefix) = prefix {
            out.push(':');
            out.push_str(prefix);
        }
        out.push_str("=\"");
        escape_into(uri, out);
        out.push('"');
    }
    for attribute in &node.attributes {
        out.push(' ');
        let prefix = attribute.namespace.as_ref().and(attribute.prefix.as_deref());
        push_qualified(out, prefix, &attribute.name);
        out.push_str("=\"");
        escape_into(&attribute.value, out);
        out.push('"');
    }

    if node.children.is_empty() && node.text.is_none() {
        out.push_str("/>");
    } else {
        out.push('>');
        if let Some(text) = &node.text {
            escape_into(text, out);
        }
        for child in &node.children {
            write_element(child, scope, out);
        }
        out.push_str("</");
        push_qualified(out, element_prefix, &node.name);
        out.push('>');
    }

    scope.truncate(mark);
}
