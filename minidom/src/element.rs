// Copyright (c) 2020 lumi <lumi@pew.im>
// Copyright (c) 2020 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
// Copyright (c) 2020 Bastien Orivel <eijebong+minidom@bananium.fr>
// Copyright (c) 2020 Astro <astro@spaceboyz.net>
// Copyright (c) 2020 Maxime “pep” Buquet <pep@bouah.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A small, owned DOM tree, the subset of XML useful for XMPP stanzas.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, Read};
use std::str::FromStr;

use crate::convert::IntoAttributeValue;
use crate::error::{Error, Result};

/// Map from declared prefix (`None` for the default namespace) to the
/// namespace URI it is bound to, as seen at a given element.
pub type PrefixMap = BTreeMap<Option<String>, String>;

/// A child node of an [`Element`]: either text or a nested element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// An element.
    Element(Element),
    /// A text node.
    Text(String),
}

impl From<Element> for Node {
    fn from(el: Element) -> Node {
        Node::Element(el)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Node {
        Node::Text(text)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Node {
        Node::Text(text.to_owned())
    }
}

/// An XML element: a qualified name, a bag of attributes, a prefix map
/// valid at this point in the tree, and an ordered list of child nodes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Element {
    name: String,
    ns: String,
    attributes: BTreeMap<String, String>,
    /// Namespace prefixes declared as in-scope at this element, keyed by
    /// prefix (`None` is the default namespace).
    pub prefixes: PrefixMap,
    children: Vec<Node>,
}

impl Element {
    /// Start building a new element with the given local name and
    /// namespace.
    pub fn builder<N: Into<String>, NS: Into<String>>(name: N, namespace: NS) -> ElementBuilder {
        ElementBuilder {
            element: Element {
                name: name.into(),
                ns: namespace.into(),
                attributes: BTreeMap::new(),
                prefixes: PrefixMap::new(),
                children: Vec::new(),
            },
        }
    }

    /// Construct a bare element with no attributes, prefixes or children.
    pub fn bare<N: Into<String>, NS: Into<String>>(name: N, namespace: NS) -> Element {
        Element::builder(name, namespace).build()
    }

    /// The local name of this element.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespace this element lives in.
    pub fn ns(&self) -> String {
        self.ns.clone()
    }

    /// `true` if this element's name and namespace match the given values.
    pub fn is<N: AsRef<str>, NS: AsRef<str>>(&self, name: N, namespace: NS) -> bool {
        self.name == name.as_ref() && self.ns == namespace.as_ref()
    }

    /// Look up an attribute by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set (or remove, via `None`) an attribute.
    pub fn set_attr<N: Into<String>, V: IntoAttributeValue>(&mut self, name: N, value: V) {
        let name = name.into();
        match value.into_attribute_value() {
            Some(value) => {
                self.attributes.insert(name, value);
            }
            None => {
                self.attributes.remove(&name);
            }
        }
    }

    /// Iterate over this element's attributes as `(name, value)` pairs.
    pub fn attrs(&self) -> Attrs<'_> {
        Attrs(self.attributes.iter())
    }

    /// Iterate over all child nodes (text and elements).
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes(self.children.iter())
    }

    /// Take all child nodes out of this element, leaving it childless.
    pub fn take_nodes(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    /// Iterate over child elements only, skipping text nodes.
    pub fn children(&self) -> Children<'_> {
        Children(self.children.iter())
    }

    /// Iterate over text node contents only, skipping child elements.
    pub fn texts(&self) -> Texts<'_> {
        Texts(self.children.iter())
    }

    /// The first child element matching `name`/`namespace`, if any.
    pub fn get_child<N: AsRef<str>, NS: AsRef<str>>(
        &self,
        name: N,
        namespace: NS,
    ) -> Option<&Element> {
        self.children()
            .find(|child| child.is(name.as_ref(), namespace.as_ref()))
    }

    /// `true` if a child element matching `name`/`namespace` exists.
    pub fn has_child<N: AsRef<str>, NS: AsRef<str>>(&self, name: N, namespace: NS) -> bool {
        self.get_child(name, namespace).is_some()
    }

    /// Concatenate all direct text node children.
    pub fn text(&self) -> String {
        self.texts().collect()
    }

    /// Append a child element, returning a mutable reference to it.
    pub fn append_child(&mut self, child: Element) -> &mut Element {
        self.children.push(Node::Element(child));
        match self.children.last_mut() {
            Some(Node::Element(el)) => el,
            _ => unreachable!(),
        }
    }

    /// Append a text node.
    pub fn append_text_node<S: Into<String>>(&mut self, text: S) {
        self.children.push(Node::Text(text.into()));
    }

    /// Parse an `Element` (and everything below it) out of a reader.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Element> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf).map_err(Error::from)?;
        Self::from_str(&buf)
    }

    fn render(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        if !self.ns.is_empty() {
            out.push_str(" xmlns=\"");
            escape_into(&self.ns, out, true);
            out.push('"');
        }
        for (prefix, ns) in &self.prefixes {
            out.push_str(" xmlns");
            if let Some(prefix) = prefix {
                out.push(':');
                out.push_str(prefix);
            }
            out.push_str("=\"");
            escape_into(ns, out, true);
            out.push('"');
        }
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(value, out, true);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                Node::Text(text) => escape_into(text, out, false),
                Node::Element(el) => el.render(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape_into(s: &str, out: &mut String, is_attr: bool) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if is_attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out);
        f.write_str(&out)
    }
}

/// Builder for [`Element`].
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    /// Set an attribute. Dropped entirely if `value` maps to `None`.
    pub fn attr<N: Into<String>, V: IntoAttributeValue>(mut self, name: N, value: V) -> Self {
        self.element.set_attr(name, value);
        self
    }

    /// Declare a namespace prefix in scope for this element.
    pub fn prefix(mut self, prefix: Option<String>, namespace: String) -> Result<Self> {
        if self.element.prefixes.contains_key(&prefix) {
            return Err(Error::DuplicatePrefix);
        }
        self.element.prefixes.insert(prefix, namespace);
        Ok(self)
    }

    /// Append a child node (element or text).
    pub fn append<N: Into<Node>>(mut self, node: N) -> Self {
        self.element.children.push(node.into());
        self
    }

    /// Append every item of an iterator as a child node.
    pub fn append_all<T: IntoIterator<Item = I>, I: Into<Node>>(mut self, iter: T) -> Self {
        for item in iter {
            self.element.children.push(item.into());
        }
        self
    }

    /// Finish building.
    pub fn build(self) -> Element {
        self.element
    }
}

impl From<ElementBuilder> for Element {
    fn from(builder: ElementBuilder) -> Element {
        builder.build()
    }
}

impl From<ElementBuilder> for Node {
    fn from(builder: ElementBuilder) -> Node {
        Node::Element(builder.build())
    }
}

/// Iterator over an [`Element`]'s attributes.
pub struct Attrs<'a>(std::collections::btree_map::Iter<'a, String, String>);

impl<'a> Iterator for Attrs<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Iterator over an [`Element`]'s child nodes.
pub struct Nodes<'a>(std::slice::Iter<'a, Node>);

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

/// Iterator over an [`Element`]'s child elements, skipping text.
pub struct Children<'a>(std::slice::Iter<'a, Node>);

impl<'a> Iterator for Children<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.0.next()? {
                Node::Element(el) => return Some(el),
                Node::Text(_) => continue,
            }
        }
    }
}

/// Iterator over an [`Element`]'s text node contents, skipping child
/// elements.
pub struct Texts<'a>(std::slice::Iter<'a, Node>);

impl<'a> Iterator for Texts<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.0.next()? {
                Node::Text(text) => return Some(text.as_str()),
                Node::Element(_) => continue,
            }
        }
    }
}

/// A single frame while parsing, tracking an element whose header has been
/// seen but whose footer has not.
struct OpenFrame {
    name: String,
    ns: String,
    attributes: BTreeMap<String, String>,
    prefixes: PrefixMap,
    children: Vec<Node>,
}

impl FromStr for Element {
    type Err = Error;

    /// Parse a single root element (and its descendants) out of a complete
    /// XML document or fragment.
    ///
    /// This is a small, self-contained recursive-descent parser: it exists
    /// so that tests and call sites can go from wire text straight to an
    /// [`Element`] without routing through the streaming `xso` machinery.
    fn from_str(s: &str) -> Result<Element> {
        let mut parser = MiniParser::new(s);
        parser.parse_document()
    }
}

/// A tiny, purpose-built XML tokenizer sufficient for the well-formed,
/// namespace-qualified subset of XML that XMPP stanzas use: no DTDs, no
/// processing instructions beyond the XML declaration, no CDATA sections.
struct MiniParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> MiniParser<'a> {
    fn new(input: &'a str) -> Self {
        MiniParser { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.rest().chars().next() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn parse_document(&mut self) -> Result<Element> {
        self.skip_whitespace();
        if self.rest().starts_with("<?") {
            let end = self.rest().find("?>").ok_or(Error::EndOfDocument)?;
            self.pos += end + 2;
            self.skip_whitespace();
        }
        self.parse_element(&PrefixMap::new())
    }

    fn parse_element(&mut self, parent_prefixes: &PrefixMap) -> Result<Element> {
        self.skip_whitespace();
        if !self.rest().starts_with('<') {
            return Err(Error::EndOfDocument);
        }
        self.pos += 1;
        let qname = self.parse_name()?;

        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            match self.rest().chars().next() {
                Some('/') | Some('>') => break,
                Some(_) => {
                    let aname = self.parse_name()?;
                    self.skip_whitespace();
                    self.expect_char('=')?;
                    self.skip_whitespace();
                    let value = self.parse_attr_value()?;
                    attrs.push((aname, value));
                }
                None => return Err(Error::EndOfDocument),
            }
        }

        let mut prefixes = parent_prefixes.clone();
        let mut plain_attrs = BTreeMap::new();
        let mut own_ns: Option<String> = None;
        for (name, value) in attrs {
            if name == "xmlns" {
                prefixes.insert(None, value.clone());
                own_ns = Some(value);
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                prefixes.insert(Some(prefix.to_owned()), value);
            } else {
                plain_attrs.insert(name, value);
            }
        }

        let (name_prefix, local_name) = split_qname(&qname);
        let ns = if let Some(prefix) = name_prefix {
            prefixes
                .get(&Some(prefix.to_owned()))
                .cloned()
                .ok_or(Error::MissingNamespace)?
        } else {
            own_ns
                .or_else(|| prefixes.get(&None).cloned())
                .unwrap_or_default()
        };

        let mut frame = OpenFrame {
            name: local_name.to_owned(),
            ns,
            attributes: plain_attrs,
            prefixes: prefixes.clone(),
            children: Vec::new(),
        };

        if self.rest().starts_with("/>") {
            self.pos += 2;
            return Ok(frame_into_element(frame));
        }
        self.expect_char('>')?;

        loop {
            if self.rest().starts_with("</") {
                self.pos += 2;
                let closing = self.parse_name()?;
                self.skip_whitespace();
                self.expect_char('>')?;
                let (_, closing_local) = split_qname(&closing);
                if closing_local != frame.name {
                    return Err(Error::EndOfDocument);
                }
                return Ok(frame_into_element(frame));
            } else if self.rest().starts_with('<') {
                let child = self.parse_element(&prefixes)?;
                frame.children.push(Node::Element(child));
            } else if self.rest().is_empty() {
                return Err(Error::EndOfDocument);
            } else {
                let text_end = self.rest().find('<').unwrap_or(self.rest().len());
                let text = unescape_text(&self.rest()[..text_end]);
                self.pos += text_end;
                if !text.is_empty() {
                    frame.children.push(Node::Text(text));
                }
            }
        }
    }

    fn parse_name(&mut self) -> Result<String> {
        let end = self
            .rest()
            .find(|c: char| c.is_whitespace() || c == '=' || c == '>' || c == '/')
            .unwrap_or(self.rest().len());
        if end == 0 {
            return Err(Error::EndOfDocument);
        }
        let name = self.rest()[..end].to_owned();
        self.pos += end;
        Ok(name)
    }

    fn parse_attr_value(&mut self) -> Result<String> {
        let quote = self.rest().chars().next().ok_or(Error::EndOfDocument)?;
        if quote != '"' && quote != '\'' {
            return Err(Error::EndOfDocument);
        }
        self.pos += 1;
        let end = self.rest().find(quote).ok_or(Error::EndOfDocument)?;
        let value = unescape_text(&self.rest()[..end]);
        self.pos += end + 1;
        Ok(value)
    }

    fn expect_char(&mut self, c: char) -> Result<()> {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(Error::EndOfDocument)
        }
    }
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

fn frame_into_element(frame: OpenFrame) -> Element {
    Element {
        name: frame.name,
        ns: frame.ns,
        attributes: frame.attributes,
        prefixes: frame.prefixes,
        children: frame.children,
    }
}

fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }
        let mut entity = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == ';' {
                closed = true;
                break;
            }
            entity.push(c);
        }
        if !closed {
            out.push('&');
            out.push_str(&entity);
            continue;
        }
        match entity.as_str() {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            other if other.starts_with("#x") || other.starts_with("#X") => {
                if let Ok(code) = u32::from_str_radix(&other[2..], 16) {
                    if let Some(c) = char::from_u32(code) {
                        out.push(c);
                    }
                }
            }
            other if other.starts_with('#') => {
                if let Ok(code) = other[1..].parse::<u32>() {
                    if let Some(c) = char::from_u32(code) {
                        out.push(c);
                    }
                }
            }
            other => {
                out.push('&');
                out.push_str(other);
                out.push(';');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_element() {
        let el: Element = "<foo xmlns='urn:a'/>".parse().unwrap();
        assert_eq!(el.name(), "foo");
        assert_eq!(el.ns(), "urn:a");
    }

    #[test]
    fn parses_attributes_and_children() {
        let el: Element = "<foo xmlns='urn:a' a='b'><bar/>text</foo>".parse().unwrap();
        assert_eq!(el.attr("a"), Some("b"));
        assert_eq!(el.children().count(), 1);
        assert_eq!(el.text(), "text");
    }

    #[test]
    fn prefixed_child_inherits_namespace() {
        let el: Element = "<foo xmlns='urn:a' xmlns:b='urn:b'><b:bar/></foo>"
            .parse()
            .unwrap();
        let child = el.children().next().unwrap();
        assert_eq!(child.name(), "bar");
        assert_eq!(child.ns(), "urn:b");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let el: Element = "<foo xmlns=\"urn:a\" a=\"b\"><child a=\"x\"/></foo>"
            .parse()
            .unwrap();
        let rendered = el.to_string();
        let reparsed: Element = rendered.parse().unwrap();
        assert_eq!(el, reparsed);
    }

    #[test]
    fn builder_and_attrs() {
        let el = Element::builder("foo", "urn:a").attr("a", "b").build();
        assert_eq!(el.attr("a"), Some("b"));
    }
}
