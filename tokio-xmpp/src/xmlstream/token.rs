// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Typed XML token stream primitives.
//!
//! This is the layer the [negotiator][`crate::xmlstream::negotiator`] and the
//! [session core][`crate::session`] are built on. It sits below the
//! higher-level, fully-typed [`XmlStream`][`super::XmlStream`]: instead of
//! decoding directly into one `FromXml` type, a [`TokenReader`] exposes the
//! individual lexical units of the document so a caller can inspect a
//! `<features/>` element or a single stanza without committing to its exact
//! shape up front.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use minidom::Element;

use crate::error::{Error, ProtocolError};

/// One lexical unit of an XML document stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// The opening tag of an element, with its fully-qualified name
    /// (`{namespace}local`) and its attributes in document order.
    StartElement {
        /// `{namespace}local-name`.
        name: String,
        /// Attribute name/value pairs, in document order.
        attrs: Vec<(String, String)>,
    },

    /// The closing tag matching a previously emitted [`StartElement`][`Self::StartElement`].
    EndElement {
        /// `{namespace}local-name` of the element being closed.
        name: String,
    },

    /// A run of character data.
    CharData(String),

    /// An XML comment.
    Comment(String),

    /// A processing instruction.
    ProcInst {
        /// Target of the processing instruction.
        target: String,
        /// Raw data of the processing instruction.
        data: String,
    },

    /// A document type declaration or other top-level directive.
    Directive(String),
}

impl Token {
    /// Build the element local name out of a fully-qualified `{ns}local` tag,
    /// mirroring the convention `minidom` uses for matching.
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Token::StartElement { name, .. } | Token::EndElement { name } => {
                Some(match name.rfind('}') {
                    Some(idx) => &name[idx + 1..],
                    None => name.as_str(),
                })
            }
            _ => None,
        }
    }
}

/// Typed XML token reader: `token() → Token | EOF | error`.
///
/// Implementors are expected to be cheap to poll repeatedly; `Ok(None)` means
/// the reader is exhausted (clean EOF), not an error.
#[async_trait]
pub trait TokenReader: Send {
    /// Read the next token, or `Ok(None)` at the end of this reader's scope.
    async fn token(&mut self) -> Result<Option<Token>, Error>;
}

/// Typed XML token writer: the dual of [`TokenReader`].
#[async_trait]
pub trait TokenWriter: Send {
    /// Write a single token.
    async fn write_token(&mut self, token: Token) -> Result<(), Error>;
}

#[async_trait]
impl TokenReader for VecDeque<Token> {
    async fn token(&mut self) -> Result<Option<Token>, Error> {
        Ok(self.pop_front())
    }
}

/// `Wrap(inner, start)`: emits `start`, then `inner`, then the matching
/// `EndElement` synthesized from `start`'s name.
pub struct Wrap<R> {
    start: Option<Token>,
    end_name: Option<String>,
    inner: R,
    inner_done: bool,
}

impl<R: TokenReader> Wrap<R> {
    /// Wrap `inner` between a synthesized start and end element.
    pub fn new(name: impl Into<String>, attrs: Vec<(String, String)>, inner: R) -> Self {
        let name = name.into();
        Wrap {
            start: Some(Token::StartElement {
                name: name.clone(),
                attrs,
            }),
            end_name: Some(name),
            inner,
            inner_done: false,
        }
    }
}

#[async_trait]
impl<R: TokenReader> TokenReader for Wrap<R> {
    async fn token(&mut self) -> Result<Option<Token>, Error> {
        if let Some(start) = self.start.take() {
            return Ok(Some(start));
        }
        if !self.inner_done {
            match self.inner.token().await? {
                Some(tok) => return Ok(Some(tok)),
                None => self.inner_done = true,
            }
        }
        Ok(self.end_name.take().map(|name| Token::EndElement { name }))
    }
}

/// `MultiReader(rs…)`: concatenation; exhaustion of one reader transparently
/// advances to the next.
pub struct MultiReader<R> {
    readers: VecDeque<R>,
}

impl<R: TokenReader> MultiReader<R> {
    /// Build a reader over the concatenation of `readers`, in order.
    pub fn new(readers: impl IntoIterator<Item = R>) -> Self {
        MultiReader {
            readers: readers.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<R: TokenReader> TokenReader for MultiReader<R> {
    async fn token(&mut self) -> Result<Option<Token>, Error> {
        loop {
            let Some(front) = self.readers.front_mut() else {
                return Ok(None);
            };
            match front.token().await? {
                Some(tok) => return Ok(Some(tok)),
                None => {
                    self.readers.pop_front();
                }
            }
        }
    }
}

/// `Inner(r)`: yields the children of the outermost open element in `r` and
/// stops just before its close, without consuming it.
///
/// `r` must already be positioned right after the outer element's start tag
/// (i.e. the first token it yields is the outer element's first child, or
/// directly its closing tag if the element is empty).
pub struct Inner<R> {
    inner: R,
    depth: u32,
    end: Option<Token>,
    done: bool,
}

impl<R: TokenReader> Inner<R> {
    /// Wrap `inner`, which must be positioned at the start of the outer
    /// element's content.
    pub fn new(inner: R) -> Self {
        Inner {
            inner,
            depth: 0,
            end: None,
            done: false,
        }
    }

    /// The outer element's closing tag, available once [`token`][`TokenReader::token`]
    /// has returned `Ok(None)`.
    pub fn take_end(&mut self) -> Option<Token> {
        self.end.take()
    }

    /// Recover the underlying reader, positioned right after the outer
    /// element's closing tag has been consumed by this `Inner`.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R: TokenReader> TokenReader for Inner<R> {
    async fn token(&mut self) -> Result<Option<Token>, Error> {
        if self.done {
            return Ok(None);
        }
        loop {
            let tok = match self.inner.token().await? {
                Some(tok) => tok,
                None => {
                    self.done = true;
                    return Err(ProtocolError::InvalidToken.into());
                }
            };
            match &tok {
                Token::StartElement { .. } => {
                    self.depth += 1;
                    return Ok(Some(tok));
                }
                Token::EndElement { .. } => {
                    if self.depth == 0 {
                        self.end = Some(tok);
                        self.done = true;
                        return Ok(None);
                    }
                    self.depth -= 1;
                    return Ok(Some(tok));
                }
                _ => return Ok(Some(tok)),
            }
        }
    }
}

/// A child positioned by an [`Iter`], with a reader scoped to its content.
pub struct IterChild<R> {
    pub start: Token,
    shared: Arc<AsyncMutex<R>>,
    depth: u32,
    done: bool,
}

#[async_trait]
impl<R: TokenReader> TokenReader for IterChild<R> {
    async fn token(&mut self) -> Result<Option<Token>, Error> {
        if self.done {
            return Ok(None);
        }
        let mut guard = self.shared.lock().await;
        loop {
            let tok = match guard.token().await? {
                Some(tok) => tok,
                None => {
                    self.done = true;
                    return Err(ProtocolError::InvalidToken.into());
                }
            };
            match &tok {
                Token::StartElement { .. } => {
                    self.depth += 1;
                    return Ok(Some(tok));
                }
                Token::EndElement { .. } => {
                    if self.depth == 0 {
                        self.done = true;
                        return Ok(None);
                    }
                    self.depth -= 1;
                    return Ok(Some(tok));
                }
                _ => return Ok(Some(tok)),
            }
        }
    }
}

impl<R: TokenReader + 'static> IterChild<R> {
    /// Drain any unread tokens of this child so the parent [`Iter`] can
    /// advance past it.
    pub async fn close(mut self) -> Result<(), Error> {
        while self.token().await?.is_some() {}
        Ok(())
    }

    /// Collect the remainder of this child's content into a [`minidom::Element`]
    /// rebuilt from `self.start`, for use with the `TryFrom<Element>` stanza
    /// codecs.
    pub async fn into_element(mut self) -> Result<Element, Error> {
        let element = build_element(self.start.clone(), &mut self).await?;
        Ok(element)
    }
}

/// Build a [`minidom::Element`] out of a `start` token and the reader
/// positioned right after it, consuming tokens up to (and including) the
/// matching end tag.
async fn build_element<R: TokenReader>(start: Token, reader: &mut R) -> Result<Element, Error> {
    let Token::StartElement { name, attrs } = start else {
        return Err(ProtocolError::InvalidToken.into());
    };
    let (ns, local) = split_name(&name);
    let mut builder = Element::builder(local, ns);
    for (key, value) in attrs {
        builder = builder.attr(key, value);
    }
    let mut element = builder.build();
    loop {
        match reader.token().await? {
            Some(Token::StartElement { name, attrs }) => {
                let child_start = Token::StartElement { name, attrs };
                let child = Box::pin(build_element(child_start, reader)).await?;
                element.append_child(child);
            }
            Some(Token::EndElement { .. }) | None => break,
            Some(Token::CharData(text)) => element.append_text_node(text),
            Some(Token::Comment(_)) | Some(Token::ProcInst { .. }) | Some(Token::Directive(_)) => {
                continue
            }
        }
    }
    Ok(element)
}

fn split_name(name: &str) -> (&str, &str) {
    if let Some(rest) = name.strip_prefix('{') {
        if let Some(idx) = rest.find('}') {
            return (&rest[..idx], &rest[idx + 1..]);
        }
    }
    ("", name)
}

/// `Iter(r)`: call [`next`][`Self::next`] to position on the next child
/// start, [`current`][`Self::current`] to obtain `(start, reader-limited-to-
/// that-child)`. [`close`][`Self::close`] must be called after the final
/// use.
pub struct Iter<R> {
    shared: Arc<AsyncMutex<R>>,
    current: Option<Token>,
    err: Option<Error>,
    exhausted: bool,
}

impl<R: TokenReader + 'static> Iter<R> {
    /// Wrap `inner`, which must be positioned at the start of the container
    /// element's content (see [`Inner::new`]).
    pub fn new(inner: R) -> Self {
        Iter {
            shared: Arc::new(AsyncMutex::new(inner)),
            current: None,
            err: None,
            exhausted: false,
        }
    }

    /// Advance to the next child start element.
    ///
    /// Returns `false` at end-of-stream or on error; call [`err`][`Self::err`]
    /// to tell the two apart.
    pub async fn next(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        loop {
            let mut guard = self.shared.lock().await;
            let tok = match guard.token().await {
                Ok(tok) => tok,
                Err(e) => {
                    drop(guard);
                    self.err = Some(e);
                    self.exhausted = true;
                    self.current = None;
                    return false;
                }
            };
            drop(guard);
            match tok {
                Some(start @ Token::StartElement { .. }) => {
                    self.current = Some(start);
                    return true;
                }
                Some(Token::EndElement { .. }) | None => {
                    self.exhausted = true;
                    self.current = None;
                    return false;
                }
                // Whitespace/comments between children: skip transparently.
                Some(_) => continue,
            }
        }
    }

    /// The child the iterator is currently positioned on, paired with a
    /// reader scoped to its content.
    pub fn current(&self) -> Option<(&Token, IterChild<R>)> {
        let start = self.current.as_ref()?;
        Some((
            start,
            IterChild {
                start: start.clone(),
                shared: Arc::clone(&self.shared),
                depth: 0,
                done: false,
            },
        ))
    }

    /// The error which caused [`next`][`Self::next`] to return `false`, if any.
    pub fn err(&mut self) -> Option<Error> {
        self.err.take()
    }

    /// Drain the remainder of the container, discarding any unvisited
    /// children.
    pub async fn close(mut self) -> Result<(), Error> {
        while self.next().await {}
        if let Some(e) = self.err.take() {
            return Err(e);
        }
        Ok(())
    }
}

fn qualified_name(element: &Element) -> String {
    match element.ns().as_str() {
        "" => element.name().to_string(),
        ns => format!("{{{}}}{}", ns, element.name()),
    }
}

fn push_element(buf: &mut VecDeque<Token>, element: &Element) {
    let name = qualified_name(element);
    let attrs = element
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    buf.push_back(Token::StartElement {
        name: name.clone(),
        attrs,
    });
    push_content(buf, element);
    buf.push_back(Token::EndElement { name });
}

fn push_content(buf: &mut VecDeque<Token>, element: &Element) {
    for node in element.nodes() {
        match node {
            minidom::Node::Element(child) => push_element(buf, child),
            minidom::Node::Text(text) => buf.push_back(Token::CharData(text.clone())),
        }
    }
}

/// Flatten an already-decoded element's content into a replayable token
/// reader, positioned as [`Iter::new`] expects: inside the element, not at
/// its own start tag.
///
/// Used to recover a token-level view (e.g. for [`Iter`]) from a stanza
/// whose payload has already been fully decoded into a [`minidom::Element`],
/// such as an IQ result surfaced by [`crate::session::Session::send_iq`].
pub fn replay_content(element: &Element) -> VecDeque<Token> {
    let mut buf = VecDeque::new();
    push_content(&mut buf, element);
    buf
}

/// `Pipe()`: a paired `(reader, writer)` where tokens written by one task are
/// observed by the reader task.
pub struct PipeReader {
    rx: mpsc::UnboundedReceiver<Result<Token, Error>>,
}

/// The writer half of a [`Pipe`].
pub struct PipeWriter {
    tx: mpsc::UnboundedSender<Result<Token, Error>>,
}

/// Create a paired in-process token channel.
pub fn pipe() -> (PipeReader, PipeWriter) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PipeReader { rx }, PipeWriter { tx })
}

#[async_trait]
impl TokenReader for PipeReader {
    async fn token(&mut self) -> Result<Option<Token>, Error> {
        match self.rx.recv().await {
            Some(Ok(tok)) => Ok(Some(tok)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

impl PipeWriter {
    /// Push a token to the paired reader.
    pub fn send(&self, token: Token) -> Result<(), Error> {
        self.tx
            .send(Ok(token))
            .map_err(|_| ProtocolError::InvalidToken.into())
    }

    /// Close the pipe, causing the reader to surface `e` once it has drained
    /// any tokens sent before this call.
    pub fn close_with_error(self, e: Error) {
        let _ = self.tx.send(Err(e));
    }
}

/// `Copy(w, r)`: pump tokens from `r` to `w` until EOF.
pub async fn copy<R: TokenReader, W: TokenWriter>(w: &mut W, r: &mut R) -> Result<(), Error> {
    while let Some(tok) = r.token().await? {
        w.write_token(tok).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(name: &str) -> Token {
        Token::StartElement {
            name: name.to_string(),
            attrs: vec![],
        }
    }

    fn end(name: &str) -> Token {
        Token::EndElement {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn wrap_synthesizes_matching_end() {
        let inner: VecDeque<Token> = vec![Token::CharData("hi".into())].into();
        let mut wrapped = Wrap::new("greeting", vec![], inner);
        assert_eq!(wrapped.token().await.unwrap(), Some(start("greeting")));
        assert_eq!(
            wrapped.token().await.unwrap(),
            Some(Token::CharData("hi".into()))
        );
        assert_eq!(wrapped.token().await.unwrap(), Some(end("greeting")));
        assert_eq!(wrapped.token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn multi_reader_concatenates() {
        let a: VecDeque<Token> = vec![start("a")].into();
        let b: VecDeque<Token> = vec![start("b")].into();
        let mut multi = MultiReader::new(vec![a, b]);
        assert_eq!(multi.token().await.unwrap(), Some(start("a")));
        assert_eq!(multi.token().await.unwrap(), Some(start("b")));
        assert_eq!(multi.token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn iter_positions_on_children_and_scopes_readers() {
        let body: VecDeque<Token> = vec![
            start("foo"),
            Token::CharData("x".into()),
            end("foo"),
            start("bar"),
            end("bar"),
            end("container"),
        ]
        .into();
        let mut iter = Iter::new(body);
        assert!(iter.next().await);
        {
            let (tok, mut child) = iter.current().unwrap();
            assert_eq!(tok, &start("foo"));
            assert_eq!(
                child.token().await.unwrap(),
                Some(Token::CharData("x".into()))
            );
            assert_eq!(child.token().await.unwrap(), None);
            child.close().await.unwrap();
        }
        assert!(iter.next().await);
        {
            let (tok, child) = iter.current().unwrap();
            assert_eq!(tok, &start("bar"));
            child.close().await.unwrap();
        }
        assert!(!iter.next().await);
        assert!(iter.err().is_none());
    }

    #[tokio::test]
    async fn pipe_delivers_tokens_and_propagates_error() {
        let (mut reader, writer) = pipe();
        writer.send(start("a")).unwrap();
        writer.close_with_error(ProtocolError::InvalidToken.into());
        assert_eq!(reader.token().await.unwrap(), Some(start("a")));
        assert!(reader.token().await.is_err());
    }
}
